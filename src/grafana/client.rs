use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use tracing::{info, warn};
use url::Url;

use crate::Result;
use crate::config::GrafanaSettings;
use crate::error::{ConfigError, GrafanaError, HttpError};
use crate::http::HttpClient;
use crate::pipeline::PanelRenderer;
use crate::types::AlertContext;

/// Downloads rendered dashboard panels from Grafana.
#[derive(Clone)]
pub struct DashboardClient {
    http: HttpClient,
    base: Url,
    headers: HeaderMap,
    dashboard_id: String,
    image_dir: PathBuf,
    width: u32,
    height: u32,
    org_id: u32,
}

impl DashboardClient {
    /// # Errors
    ///
    /// Fails when the configured token cannot be used as a header value.
    pub fn new(http: HttpClient, settings: &GrafanaSettings) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&authorization_value(settings.token.expose_secret()))
            .map_err(|err| ConfigError::InvalidField {
                field: "grafana.token",
                message: err.to_string(),
            })?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        Ok(Self {
            http,
            base: settings.url.clone(),
            headers,
            dashboard_id: settings.dashboard_id.clone(),
            image_dir: settings.image_dir.clone(),
            width: settings.width,
            height: settings.height,
            org_id: settings.org_id,
        })
    }

    pub fn dashboard_url(&self) -> String {
        format!(
            "{}/api/dashboards/uid/{}",
            trimmed(&self.base),
            self.dashboard_id
        )
    }

    pub fn render_url(&self) -> String {
        format!("{}/render/d-solo/{}/", trimmed(&self.base), self.dashboard_id)
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Validate the dashboard, render `panel_id` and store the PNG on disk.
    ///
    /// # Errors
    ///
    /// Returns the HTTP error when Grafana is unreachable after retries, or
    /// a write error when the image cannot be stored.
    pub async fn download_panel(&self, panel_id: &str) -> Result<PathBuf> {
        if panel_id.trim().is_empty() {
            return Err(GrafanaError::MissingPanel.into());
        }

        self.http
            .get(&self.dashboard_url(), &[] as &[(&str, &str)], &self.headers)
            .await?;

        let query = [
            ("orgId", self.org_id.to_string()),
            ("panelId", panel_id.to_string()),
            ("width", self.width.to_string()),
            ("height", self.height.to_string()),
        ];
        let image = self
            .http
            .get(&self.render_url(), &query, &self.headers)
            .await?
            .bytes()
            .await
            .map_err(HttpError::from)?;

        let path = self
            .image_dir
            .join(image_file_name(panel_id, Utc::now().timestamp()));
        tokio::fs::create_dir_all(&self.image_dir)
            .await
            .map_err(|source| GrafanaError::Write {
                path: self.image_dir.clone(),
                source,
            })?;
        tokio::fs::write(&path, &image)
            .await
            .map_err(|source| GrafanaError::Write {
                path: path.clone(),
                source,
            })?;

        info!(panel_id, path = %path.display(), bytes = image.len(), "panel image downloaded");
        Ok(path)
    }
}

#[async_trait]
impl PanelRenderer for DashboardClient {
    async fn fetch_panel_image(&self, ctx: &AlertContext) -> Option<PathBuf> {
        let panel_id = ctx.panel_id.as_deref()?;
        match self.download_panel(panel_id).await {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(
                    alertname = %ctx.alert_name,
                    instance = %ctx.instance,
                    panel_id,
                    error = %err,
                    "panel image unavailable"
                );
                None
            }
        }
    }
}

/// `alert_<panel>_<unix seconds>.png`, with path separators and other
/// unsafe characters in the panel id replaced.
pub fn image_file_name(panel_id: &str, timestamp: i64) -> String {
    let panel: String = panel_id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("alert_{panel}_{timestamp}.png")
}

fn authorization_value(token: &str) -> String {
    let token = token.trim();
    // Tokens configured with an explicit scheme ("Bearer ...", "Basic ...") pass through.
    if token.contains(' ') {
        token.to_string()
    } else {
        format!("Bearer {token}")
    }
}

fn trimmed(url: &Url) -> &str {
    url.as_str().trim_end_matches('/')
}
