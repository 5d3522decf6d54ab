use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Feishu(#[from] FeishuError),
    #[error(transparent)]
    Grafana(#[from] GrafanaError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("webhook server failed")]
    Server(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("missing required configuration field: {field}")]
    MissingField { field: &'static str },
    #[error("invalid configuration for {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
    #[error("configuration error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("failed to build HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    #[error("request failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("invalid JSON payload: {message}")]
    Json { message: String },
    #[error("request to {url} failed after {attempts} attempts")]
    RetryExhausted {
        url: String,
        attempts: usize,
        #[source]
        source: Box<HttpError>,
    },
}

#[derive(Debug, Error)]
pub enum FeishuError {
    #[error("Feishu API error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("tenant token is not a valid header value")]
    InvalidToken,
    #[error("missing field in Feishu response: {field}")]
    MissingField { field: &'static str },
    #[error("failed to read image {path}")]
    Image {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum GrafanaError {
    #[error("alert carries no panel_id")]
    MissingPanel,
    #[error("failed to write rendered panel to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for HttpError {
    fn from(source: reqwest::Error) -> Self {
        if source.is_status() {
            if let Some(status) = source.status() {
                let url = source
                    .url()
                    .map_or_else(String::new, ToString::to_string);
                return Self::HttpStatus { status, url };
            }
        }
        Self::Request { source }
    }
}

impl Error {
    /// Transport and status failures may succeed on another attempt; API
    /// rejections and local failures will not.
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Http(HttpError::Request { .. } | HttpError::HttpStatus { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, FeishuError, HttpError};

    #[test]
    fn business_errors_are_not_retriable() {
        let err = Error::from(FeishuError::Api {
            code: 99_991_663,
            message: "app secret invalid".to_string(),
        });
        assert!(!err.is_retriable());
    }

    #[test]
    fn exhausted_retries_are_not_retriable() {
        let err = Error::from(HttpError::RetryExhausted {
            url: "http://grafana.local".to_string(),
            attempts: 3,
            source: Box::new(HttpError::Json {
                message: "boom".to_string(),
            }),
        });
        assert!(!err.is_retriable());
        assert_eq!(
            err.to_string(),
            "request to http://grafana.local failed after 3 attempts"
        );
    }
}
