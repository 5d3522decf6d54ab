use serde::{Deserialize, Serialize};

/// Outbound bot message, serialized as `{"msg_type": ..., "content": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "msg_type", content = "content", rename_all = "lowercase")]
pub enum Message {
    Text { text: String },
    Image { image_key: String },
}

#[derive(Serialize)]
pub(super) struct TokenRequest<'a> {
    pub(super) app_id: &'a str,
    pub(super) app_secret: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub(super) code: i64,
    #[serde(default)]
    pub(super) msg: String,
    #[serde(default)]
    pub(super) tenant_access_token: Option<String>,
    /// Seconds until the token expires.
    #[serde(default)]
    pub(super) expire: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ImageUploadResponse {
    #[serde(default)]
    pub(super) code: i64,
    #[serde(default)]
    pub(super) msg: String,
    #[serde(default)]
    pub(super) data: Option<ImageData>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ImageData {
    pub(super) image_key: String,
}

/// Bot webhooks answer with `code`/`msg`, the legacy
/// `StatusCode`/`StatusMessage` pair, or both at once.
#[derive(Debug, Default, Deserialize)]
pub(super) struct WebhookResponse {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default, rename = "StatusCode")]
    status_code: Option<i64>,
    #[serde(default, rename = "StatusMessage")]
    status_message: Option<String>,
}

impl WebhookResponse {
    /// First non-zero code with its message, or `None` on success.
    pub(super) fn failure(self) -> Option<(i64, String)> {
        [(self.code, self.msg), (self.status_code, self.status_message)]
            .into_iter()
            .find_map(|(code, msg)| {
                code.filter(|c| *c != 0)
                    .map(|c| (c, msg.unwrap_or_default()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{Message, WebhookResponse};
    use serde_json::json;

    fn webhook(body: &str) -> WebhookResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn webhook_response_accepts_both_code_pairs() {
        let both = webhook(
            r#"{"StatusCode":0,"StatusMessage":"success","code":0,"data":{},"msg":"success"}"#,
        );
        assert_eq!(both.failure(), None);
        assert_eq!(webhook(r#"{"StatusCode":0}"#).failure(), None);
        assert_eq!(webhook("{}").failure(), None);
    }

    #[test]
    fn webhook_response_reports_any_non_zero_code() {
        assert_eq!(
            webhook(r#"{"code":19021,"msg":"sign match fail"}"#).failure(),
            Some((19021, "sign match fail".to_string()))
        );
        assert_eq!(
            webhook(r#"{"StatusCode":9499,"StatusMessage":"Bad Request","code":0}"#).failure(),
            Some((9499, "Bad Request".to_string()))
        );
    }

    #[test]
    fn text_message_wire_shape() {
        let message = Message::Text {
            text: "hello".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap_or_default(),
            json!({"msg_type": "text", "content": {"text": "hello"}})
        );
    }
}
