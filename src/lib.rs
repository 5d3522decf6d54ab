#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod error;
pub mod feishu;
pub mod grafana;
pub mod http;
pub mod pipeline;
pub mod prometheus;
pub mod server;
pub mod telemetry;
pub mod types;

pub type Result<T> = std::result::Result<T, error::Error>;
