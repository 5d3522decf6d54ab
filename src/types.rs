use std::collections::HashMap;
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

pub const LABEL_ALERTNAME: &str = "alertname";
pub const LABEL_INSTANCE: &str = "instance";
pub const LABEL_PANEL_ID: &str = "panel_id";
pub const LABEL_SEVERITY: &str = "severity";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Firing,
    Resolved,
}

impl AlertStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Firing => "firing",
            Self::Resolved => "resolved",
        }
    }
}

impl Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "firing" => Ok(Self::Firing),
            "resolved" => Ok(Self::Resolved),
            other => Err(format!("unknown alert status: {other}")),
        }
    }
}

// Alertmanager only emits the two states; anything else is treated as firing.
impl<'de> Deserialize<'de> for AlertStatus {
    fn deserialize<D>(de: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(de)?;
        Ok(raw
            .as_deref()
            .and_then(|s| Self::from_str(s).ok())
            .unwrap_or_default())
    }
}

/// One alert instance as delivered by Alertmanager.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Alert {
    #[serde(default)]
    pub status: AlertStatus,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(rename = "startsAt", default)]
    pub starts_at: String,
    #[serde(rename = "endsAt", default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<String>,
    #[serde(
        rename = "generatorURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub generator_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl Alert {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn panel_id(&self) -> Option<&str> {
        self.label(LABEL_PANEL_ID).filter(|id| !id.trim().is_empty())
    }
}

/// The body of one Alertmanager webhook call. Only `alerts` is consumed.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AlertBatch {
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(rename = "groupKey", default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
}

impl AlertBatch {
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

/// Per-alert metadata handed down the pipeline to the image step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AlertContext {
    pub alert_name: String,
    pub instance: String,
    pub query: String,
    pub panel_id: Option<String>,
}

impl AlertContext {
    pub fn from_alert(alert: &Alert) -> Self {
        Self {
            alert_name: alert
                .label(LABEL_ALERTNAME)
                .unwrap_or("Unknown Alert")
                .to_string(),
            instance: alert.label(LABEL_INSTANCE).unwrap_or("none").to_string(),
            query: alert.annotation("query").unwrap_or_default().to_string(),
            panel_id: alert.panel_id().map(str::to_string),
        }
    }
}
