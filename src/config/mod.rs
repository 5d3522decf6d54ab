use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::Result;
use crate::error::Error as BridgeError;

mod defaults;
mod duration;
mod env;
mod raw;

use duration::HumantimeDuration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerSettings,
    pub grafana: GrafanaSettings,
    pub feishu: FeishuSettings,
    pub prometheus: Option<PrometheusSettings>,
    pub http: HttpSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub listen: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct GrafanaSettings {
    pub url: Url,
    pub token: SecretString,
    pub dashboard_id: String,
    pub image_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    pub org_id: u32,
}

#[derive(Debug, Clone)]
pub struct FeishuSettings {
    pub app_id: String,
    pub app_secret: SecretString,
    pub webhook: Url,
    pub api_base: Url,
    pub cache_tokens: bool,
}

#[derive(Debug, Clone)]
pub struct PrometheusSettings {
    pub url: Url,
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub max_attempts: usize,
    pub backoff_unit: Duration,
    pub verify_tls: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub poll_timeout: Duration,
    pub cooldown: Duration,
    pub settle_delay: Duration,
}

impl Config {
    /// Load configuration from a file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is missing or malformed, when
    /// environment overrides are invalid, or when the resulting values fail
    /// validation.
    pub fn from_env_and_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut raw = raw::load(path).map_err(BridgeError::from)?;
        raw.apply_env_overrides().map_err(BridgeError::from)?;
        raw.validate_and_build()
    }
}

impl ServerSettings {
    pub fn bind_target(&self) -> (&str, u16) {
        (self.listen.as_str(), self.port)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: defaults::default_http_timeout(),
            max_attempts: defaults::default_max_attempts(),
            backoff_unit: defaults::default_backoff_unit(),
            verify_tls: false,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            poll_timeout: defaults::default_poll_timeout(),
            cooldown: defaults::default_cooldown(),
            settle_delay: defaults::default_settle_delay(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::error::{ConfigError, Error};
    use std::io::Write;
    use std::time::Duration;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = match tempfile::Builder::new().suffix(".toml").tempfile() {
            Ok(file) => file,
            Err(err) => panic!("failed to create temp config: {err}"),
        };
        if let Err(err) = file.write_all(body.as_bytes()) {
            panic!("failed to write temp config: {err}");
        }
        file
    }

    const FULL: &str = r#"
[server]
listen = "127.0.0.1"
port = 5000

[grafana]
url = "http://grafana.local:3000"
token = "Bearer glsa_test"
dashboard_id = "node-exporter"
image_dir = "/tmp/alertbridge"

[feishu]
app_id = "cli_test"
app_secret = "secret"
webhook = "https://open.feishu.cn/open-apis/bot/v2/hook/test"

[http]
timeout = "3s"
max_attempts = 5

[pipeline]
cooldown = "250ms"
"#;

    #[test]
    fn loads_file_with_defaults() {
        let file = write_config(FULL);
        let config = match Config::from_env_and_file(file.path()) {
            Ok(config) => config,
            Err(err) => panic!("config should load: {err}"),
        };
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.grafana.dashboard_id, "node-exporter");
        assert_eq!(config.grafana.width, 1000);
        assert_eq!(config.grafana.height, 500);
        assert_eq!(config.http.timeout, Duration::from_secs(3));
        assert_eq!(config.http.max_attempts, 5);
        assert_eq!(config.http.backoff_unit, Duration::from_secs(1));
        assert!(!config.http.verify_tls);
        assert_eq!(config.pipeline.cooldown, Duration::from_millis(250));
        assert_eq!(config.pipeline.poll_timeout, Duration::from_secs(1));
        assert_eq!(config.pipeline.settle_delay, Duration::from_secs(10));
        assert_eq!(
            config.feishu.api_base.as_str(),
            "https://open.feishu.cn/open-apis"
        );
        assert!(config.prometheus.is_none());
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = match Config::from_env_and_file("/nonexistent/alertbridge.toml") {
            Ok(_) => panic!("missing file must not load"),
            Err(err) => err,
        };
        assert!(matches!(err, Error::Config(ConfigError::FileRead { .. })));
    }

    #[test]
    fn malformed_file_is_fatal() {
        let file = write_config("[server\nlisten = ");
        assert!(Config::from_env_and_file(file.path()).is_err());
    }

    #[test]
    fn missing_listen_address_is_rejected() {
        let body = FULL.replace("listen = \"127.0.0.1\"\n", "");
        let file = write_config(&body);
        match Config::from_env_and_file(file.path()) {
            Err(Error::Config(ConfigError::MissingField { field })) => {
                assert_eq!(field, "server.listen");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
