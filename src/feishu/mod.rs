mod client;
mod format;
mod models;
mod token;

pub use client::FeishuClient;
pub use format::{format_start_time, render_text};
pub use models::Message;
pub use token::TokenProvider;
