use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::FileFormat;
use serde::Deserialize;
use serde_with::serde_as;
use url::Url;

use crate::Result;
use crate::error::ConfigError;

use super::defaults::{
    default_backoff_unit, default_cooldown, default_feishu_api_base, default_height,
    default_http_timeout, default_image_dir, default_max_attempts, default_org_id,
    default_poll_timeout, default_settle_delay, default_true, default_width,
};
use super::env::{env_bool, env_string};
use super::{
    Config, FeishuSettings, GrafanaSettings, HttpSettings, HumantimeDuration, PipelineSettings,
    PrometheusSettings, ServerSettings,
};

/// Charge le fichier TOML puis la surcouche `ALERTBRIDGE__*`; fichier absent = erreur.
pub(super) fn load(path: impl AsRef<Path>) -> std::result::Result<RawConfig, ConfigError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ConfigError::FileRead {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "configuration file not found"),
        });
    }

    ::config::Config::builder()
        .add_source(::config::File::from(path).format(FileFormat::Toml).required(true))
        .add_source(
            ::config::Environment::with_prefix("ALERTBRIDGE")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|err| ConfigError::Parse(err.to_string()))?
        .try_deserialize()
        .map_err(|err| ConfigError::Parse(err.to_string()))
}

#[derive(Debug, Deserialize)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub(super) server: RawServer,
    #[serde(default)]
    pub(super) grafana: RawGrafana,
    #[serde(default)]
    pub(super) feishu: RawFeishu,
    #[serde(default)]
    pub(super) prometheus: RawPrometheus,
    #[serde(default)]
    pub(super) http: RawHttp,
    #[serde(default)]
    pub(super) pipeline: RawPipeline,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawServer {
    pub(super) listen: Option<String>,
    pub(super) port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawGrafana {
    pub(super) url: Option<String>,
    pub(super) token: Option<String>,
    pub(super) dashboard_id: Option<String>,
    #[serde(default = "default_image_dir")]
    pub(super) image_dir: PathBuf,
    #[serde(default = "default_width")]
    pub(super) width: u32,
    #[serde(default = "default_height")]
    pub(super) height: u32,
    #[serde(default = "default_org_id")]
    pub(super) org_id: u32,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawFeishu {
    pub(super) app_id: Option<String>,
    pub(super) app_secret: Option<String>,
    pub(super) webhook: Option<String>,
    #[serde(default = "default_feishu_api_base")]
    pub(super) api_base: String,
    #[serde(default = "default_true")]
    pub(super) cache_tokens: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawPrometheus {
    pub(super) url: Option<String>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawHttp {
    #[serde(default = "default_http_timeout")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) timeout: Duration,
    #[serde(default = "default_max_attempts")]
    pub(super) max_attempts: usize,
    #[serde(default = "default_backoff_unit")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) backoff_unit: Duration,
    #[serde(default)]
    pub(super) verify_tls: bool,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawPipeline {
    #[serde(default = "default_poll_timeout")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) poll_timeout: Duration,
    #[serde(default = "default_cooldown")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) cooldown: Duration,
    #[serde(default = "default_settle_delay")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) settle_delay: Duration,
}

impl RawConfig {
    pub(super) fn apply_env_overrides(&mut self) -> std::result::Result<(), ConfigError> {
        if let Some(token) = env_string("GRAFANA_TOKEN")? {
            self.grafana.token = Some(token);
        }
        if let Some(app_id) = env_string("FEISHU_APP_ID")? {
            self.feishu.app_id = Some(app_id);
        }
        if let Some(secret) = env_string("FEISHU_APP_SECRET")? {
            self.feishu.app_secret = Some(secret);
        }
        if let Some(webhook) = env_string("FEISHU_WEBHOOK")? {
            self.feishu.webhook = Some(webhook);
        }
        if let Some(verify) = env_bool("ALERTBRIDGE_VERIFY_TLS")? {
            self.http.verify_tls = verify;
        }
        Ok(())
    }

    pub(super) fn validate_and_build(self) -> Result<Config> {
        let listen = required(self.server.listen, "server.listen")?;
        let port = self.server.port.ok_or(ConfigError::MissingField {
            field: "server.port",
        })?;

        let grafana_url = parse_url(
            &required(self.grafana.url, "grafana.url")?,
            "grafana.url",
        )?;
        let grafana_token = required(self.grafana.token, "grafana.token")?;
        let dashboard_id = required(self.grafana.dashboard_id, "grafana.dashboard_id")?;
        if self.grafana.width == 0 || self.grafana.height == 0 {
            return Err(ConfigError::InvalidField {
                field: "grafana.width",
                message: "render dimensions must be greater than zero".to_string(),
            }
            .into());
        }

        let app_id = required(self.feishu.app_id, "feishu.app_id")?;
        let app_secret = required(self.feishu.app_secret, "feishu.app_secret")?;
        let webhook = parse_url(
            &required(self.feishu.webhook, "feishu.webhook")?,
            "feishu.webhook",
        )?;
        let api_base = parse_url(&self.feishu.api_base, "feishu.api_base")?;

        let prometheus = self
            .prometheus
            .url
            .filter(|url| !url.trim().is_empty())
            .map(|url| parse_url(&url, "prometheus.url"))
            .transpose()?
            .map(|url| PrometheusSettings { url });

        if self.http.max_attempts == 0 {
            return Err(ConfigError::InvalidField {
                field: "http.max_attempts",
                message: "at least one attempt is required".to_string(),
            }
            .into());
        }
        if self.http.timeout.is_zero() {
            return Err(ConfigError::InvalidField {
                field: "http.timeout",
                message: "timeout must be greater than zero".to_string(),
            }
            .into());
        }
        if self.pipeline.poll_timeout.is_zero() {
            return Err(ConfigError::InvalidField {
                field: "pipeline.poll_timeout",
                message: "poll timeout must be greater than zero".to_string(),
            }
            .into());
        }

        Ok(Config {
            server: ServerSettings { listen, port },
            grafana: GrafanaSettings {
                url: grafana_url,
                token: grafana_token.into(),
                dashboard_id,
                image_dir: self.grafana.image_dir,
                width: self.grafana.width,
                height: self.grafana.height,
                org_id: self.grafana.org_id,
            },
            feishu: FeishuSettings {
                app_id,
                app_secret: app_secret.into(),
                webhook,
                api_base,
                cache_tokens: self.feishu.cache_tokens,
            },
            prometheus,
            http: HttpSettings {
                timeout: self.http.timeout,
                max_attempts: self.http.max_attempts,
                backoff_unit: self.http.backoff_unit,
                verify_tls: self.http.verify_tls,
            },
            pipeline: PipelineSettings {
                poll_timeout: self.pipeline.poll_timeout,
                cooldown: self.pipeline.cooldown,
                settle_delay: self.pipeline.settle_delay,
            },
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> std::result::Result<String, ConfigError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingField { field }),
    }
}

fn parse_url(raw: &str, field: &'static str) -> std::result::Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|err| ConfigError::InvalidField {
        field,
        message: err.to_string(),
    })
}

impl Default for RawGrafana {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            dashboard_id: None,
            image_dir: default_image_dir(),
            width: default_width(),
            height: default_height(),
            org_id: default_org_id(),
        }
    }
}

impl Default for RawFeishu {
    fn default() -> Self {
        Self {
            app_id: None,
            app_secret: None,
            webhook: None,
            api_base: default_feishu_api_base(),
            cache_tokens: default_true(),
        }
    }
}

impl Default for RawHttp {
    fn default() -> Self {
        Self {
            timeout: default_http_timeout(),
            max_attempts: default_max_attempts(),
            backoff_unit: default_backoff_unit(),
            verify_tls: false,
        }
    }
}

impl Default for RawPipeline {
    fn default() -> Self {
        Self {
            poll_timeout: default_poll_timeout(),
            cooldown: default_cooldown(),
            settle_delay: default_settle_delay(),
        }
    }
}
