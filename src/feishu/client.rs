use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use url::Url;

use crate::Result;
use crate::config::FeishuSettings;
use crate::error::{FeishuError, HttpError};
use crate::http::HttpClient;
use crate::pipeline::Notifier;
use crate::types::{Alert, LABEL_ALERTNAME};

use super::format::render_text;
use super::models::{ImageUploadResponse, Message, WebhookResponse};
use super::token::TokenProvider;

/// Bot client for a Feishu group webhook plus the image upload API.
pub struct FeishuClient {
    http: HttpClient,
    tokens: TokenProvider,
    webhook: Url,
    images_url: String,
}

impl FeishuClient {
    pub fn new(http: HttpClient, settings: &FeishuSettings) -> Self {
        let base = settings.api_base.as_str().trim_end_matches('/');
        let tokens = TokenProvider::new(
            http.clone(),
            format!("{base}/auth/v3/tenant_access_token/internal"),
            settings.app_id.clone(),
            settings.app_secret.clone(),
            settings.cache_tokens,
        );
        Self {
            http,
            tokens,
            webhook: settings.webhook.clone(),
            images_url: format!("{base}/im/v1/images"),
        }
    }

    /// Post the rendered status block for `alert` to the webhook.
    ///
    /// # Errors
    ///
    /// Token, transport, status and API failures are all returned.
    pub async fn send_text(&self, alert: &Alert) -> Result<()> {
        let message = Message::Text {
            text: render_text(alert),
        };
        self.post_message(&message).await?;
        info!(
            alertname = alert.label(LABEL_ALERTNAME).unwrap_or_default(),
            "text notification sent"
        );
        Ok(())
    }

    /// Upload the PNG at `path` and return the platform's image key.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, the upload is rejected, or the
    /// response carries no `image_key`.
    pub async fn upload_image(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| FeishuError::Image {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map_or_else(|| "alert.png".to_string(), |n| n.to_string_lossy().into_owned());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")
            .map_err(HttpError::from)?;
        let form = Form::new().text("image_type", "message").part("image", part);

        let token = self.tokens.tenant_token().await?;
        let body = self
            .http
            .post_multipart(&self.images_url, form, &bearer(&token)?)
            .await?
            .bytes()
            .await
            .map_err(HttpError::from)?;
        let response: ImageUploadResponse = parse(&body)?;
        if response.code != 0 {
            return Err(FeishuError::Api {
                code: response.code,
                message: response.msg,
            }
            .into());
        }
        let key = response
            .data
            .map(|data| data.image_key)
            .filter(|key| !key.is_empty())
            .ok_or(FeishuError::MissingField {
                field: "data.image_key",
            })?;
        debug!(path = %path.display(), image_key = %key, "image uploaded");
        Ok(key)
    }

    /// Upload the image, then post a message referencing it.
    ///
    /// # Errors
    ///
    /// Any failure of either step.
    pub async fn push_image(&self, path: &Path) -> Result<()> {
        let image_key = self.upload_image(path).await?;
        self.post_message(&Message::Image { image_key }).await?;
        info!(path = %path.display(), "image notification sent");
        Ok(())
    }

    async fn post_message(&self, message: &Message) -> Result<()> {
        let token = self.tokens.tenant_token().await?;
        let body = self
            .http
            .post_json(self.webhook.as_str(), message, &bearer(&token)?)
            .await?
            .bytes()
            .await
            .map_err(HttpError::from)?;
        // Some webhook deployments answer with an empty body.
        let response: WebhookResponse = if body.is_empty() {
            WebhookResponse::default()
        } else {
            parse(&body)?
        };
        if let Some((code, message)) = response.failure() {
            return Err(FeishuError::Api { code, message }.into());
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for FeishuClient {
    async fn send_text(&self, alert: &Alert) -> Result<()> {
        Self::send_text(self, alert).await
    }

    async fn push_image(&self, path: &Path) -> Result<()> {
        Self::push_image(self, path).await
    }
}

fn bearer(token: &SecretString) -> Result<HeaderMap> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
        .map_err(|_| FeishuError::InvalidToken)?;
    value.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

fn parse<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|err| {
        HttpError::Json {
            message: err.to_string(),
        }
        .into()
    })
}
