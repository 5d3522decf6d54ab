//! Read-only lookup of the alerting rules Prometheus has loaded.

use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::Result;
use crate::error::HttpError;
use crate::http::HttpClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSummary {
    pub name: String,
    pub query: String,
    pub duration: String,
}

#[derive(Debug, Deserialize)]
struct RulesEnvelope {
    data: RulesData,
}

#[derive(Debug, Deserialize)]
struct RulesData {
    #[serde(default)]
    groups: Vec<RuleGroup>,
}

#[derive(Debug, Deserialize)]
struct RuleGroup {
    #[serde(default)]
    rules: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(default)]
    name: String,
    #[serde(default)]
    query: String,
    #[serde(default)]
    duration: Value,
}

#[derive(Clone)]
pub struct RulesClient {
    http: HttpClient,
    base: Url,
}

impl RulesClient {
    pub const fn new(http: HttpClient, base: Url) -> Self {
        Self { http, base }
    }

    pub fn rules_url(&self) -> String {
        format!("{}/api/v1/rules", self.base.as_str().trim_end_matches('/'))
    }

    /// Every rule across every group, in the order Prometheus lists them.
    ///
    /// # Errors
    ///
    /// Returns the HTTP error after retries, or a JSON error when the body
    /// does not have the `data.groups[].rules[]` shape.
    pub async fn rules(&self) -> Result<Vec<RuleSummary>> {
        let body = self
            .http
            .get(&self.rules_url(), &[] as &[(&str, &str)], &HeaderMap::new())
            .await?
            .bytes()
            .await
            .map_err(HttpError::from)?;
        let envelope: RulesEnvelope =
            serde_json::from_slice(&body).map_err(|err| HttpError::Json {
                message: err.to_string(),
            })?;

        Ok(envelope
            .data
            .groups
            .into_iter()
            .flat_map(|group| group.rules)
            .map(|rule| RuleSummary {
                name: rule.name,
                query: rule.query,
                duration: match rule.duration {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                },
            })
            .collect())
    }

    /// The first rule of the first group, if any.
    ///
    /// # Errors
    ///
    /// Same as [`RulesClient::rules`].
    pub async fn first_rule(&self) -> Result<Option<RuleSummary>> {
        Ok(self.rules().await?.into_iter().next())
    }
}
