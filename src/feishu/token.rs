use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::Result;
use crate::error::{FeishuError, HttpError};
use crate::http::HttpClient;

use super::models::{TokenRequest, TokenResponse};

/// Tokens are dropped this long before the platform says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
    value: SecretString,
    expires_at: Instant,
}

/// Obtains tenant access tokens from the app credentials.
///
/// With caching enabled a token is reused until shortly before the `expire`
/// the platform reported for it. Responses without `expire` are never
/// cached, so every call fetches a fresh token.
pub struct TokenProvider {
    http: HttpClient,
    url: String,
    app_id: String,
    app_secret: SecretString,
    cache: Option<Mutex<Option<CachedToken>>>,
}

impl TokenProvider {
    pub fn new(
        http: HttpClient,
        url: String,
        app_id: String,
        app_secret: SecretString,
        cache_tokens: bool,
    ) -> Self {
        Self {
            http,
            url,
            app_id,
            app_secret,
            cache: cache_tokens.then(|| Mutex::new(None)),
        }
    }

    /// # Errors
    ///
    /// Transport and status failures surface as [`HttpError`]; a non-zero
    /// `code` in a successful response is a [`FeishuError::Api`].
    pub async fn tenant_token(&self) -> Result<SecretString> {
        if let Some(token) = self.cached() {
            debug!("reusing cached tenant token");
            return Ok(token);
        }

        let request = TokenRequest {
            app_id: &self.app_id,
            app_secret: self.app_secret.expose_secret(),
        };
        let body = self
            .http
            .post_json(&self.url, &request, &HeaderMap::new())
            .await?
            .bytes()
            .await
            .map_err(HttpError::from)?;
        let response: TokenResponse =
            serde_json::from_slice(&body).map_err(|err| HttpError::Json {
                message: err.to_string(),
            })?;

        if response.code != 0 {
            warn!(code = response.code, msg = %response.msg, "tenant token rejected");
            return Err(FeishuError::Api {
                code: response.code,
                message: response.msg,
            }
            .into());
        }
        let token: SecretString = response
            .tenant_access_token
            .filter(|t| !t.is_empty())
            .ok_or(FeishuError::MissingField {
                field: "tenant_access_token",
            })?
            .into();
        info!("tenant access token obtained");

        self.store(&token, response.expire);
        Ok(token)
    }

    fn cached(&self) -> Option<SecretString> {
        let slot = self.cache.as_ref()?;
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|cached| Instant::now() < cached.expires_at)
            .map(|cached| cached.value.clone())
    }

    fn store(&self, token: &SecretString, expire: Option<u64>) {
        let Some(slot) = self.cache.as_ref() else {
            return;
        };
        let lifetime = expire
            .map(Duration::from_secs)
            .and_then(|ttl| ttl.checked_sub(EXPIRY_MARGIN))
            .filter(|ttl| !ttl.is_zero());
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = lifetime.map(|ttl| CachedToken {
            value: token.clone(),
            expires_at: Instant::now() + ttl,
        });
    }
}
