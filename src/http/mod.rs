pub(crate) mod client;
pub(crate) mod preview;
pub(crate) mod retry;

pub use client::{HttpClient, RetryPolicy};
pub use retry::LinearBackoff;
