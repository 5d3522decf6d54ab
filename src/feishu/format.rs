use chrono::DateTime;

use crate::types::{
    Alert, AlertStatus, LABEL_ALERTNAME, LABEL_INSTANCE, LABEL_SEVERITY,
};

const UNKNOWN: &str = "Unknown";

/// Human-readable status block posted as the text notification.
pub fn render_text(alert: &Alert) -> String {
    let status = match alert.status {
        AlertStatus::Firing => "🚨告警触发",
        AlertStatus::Resolved => "✅告警恢复",
    };
    let mut lines = vec![
        format!("告警状态: {status}"),
        format!("告警名称: {}", alert.label(LABEL_ALERTNAME).unwrap_or(UNKNOWN)),
        format!("告警级别: {}", alert.label(LABEL_SEVERITY).unwrap_or(UNKNOWN)),
        format!("告警实例: {}", alert.label(LABEL_INSTANCE).unwrap_or(UNKNOWN)),
        format!("告警时间: {}", format_start_time(&alert.starts_at)),
        format!(
            "告警详情: {}",
            alert.annotation("description").unwrap_or("No description")
        ),
    ];
    if let Some(value) = alert.annotation("value").filter(|v| !v.is_empty()) {
        lines.push(format!("当前值: {value}"));
    }
    lines.join("\n")
}

/// `startsAt` as `YYYY-mm-dd HH:MM:SS` in the offset it was sent with.
/// Unparsable input is returned unchanged.
pub fn format_start_time(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw.trim()).map_or_else(
        |_| raw.to_string(),
        |ts| ts.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::{format_start_time, render_text};
    use crate::types::{Alert, AlertStatus};
    use std::collections::HashMap;

    fn alert(status: AlertStatus, value: Option<&str>) -> Alert {
        let mut labels = HashMap::new();
        labels.insert("alertname".to_string(), "HighCpu".to_string());
        labels.insert("instance".to_string(), "node-1:9100".to_string());
        labels.insert("severity".to_string(), "critical".to_string());
        let mut annotations = HashMap::new();
        annotations.insert("description".to_string(), "cpu above 90%".to_string());
        if let Some(value) = value {
            annotations.insert("value".to_string(), value.to_string());
        }
        Alert {
            status,
            labels,
            annotations,
            starts_at: "2024-05-01T10:15:30.123456789Z".to_string(),
            ..Alert::default()
        }
    }

    #[test]
    fn firing_alert_with_value() {
        let text = render_text(&alert(AlertStatus::Firing, Some("93.5")));
        assert_eq!(
            text,
            "告警状态: 🚨告警触发\n\
             告警名称: HighCpu\n\
             告警级别: critical\n\
             告警实例: node-1:9100\n\
             告警时间: 2024-05-01 10:15:30\n\
             告警详情: cpu above 90%\n\
             当前值: 93.5"
        );
    }

    #[test]
    fn resolved_alert_without_value_omits_the_line() {
        let text = render_text(&alert(AlertStatus::Resolved, None));
        assert!(text.starts_with("告警状态: ✅告警恢复\n"));
        assert!(!text.contains("当前值"));
    }

    #[test]
    fn missing_fields_render_placeholders() {
        let text = render_text(&Alert::default());
        assert!(text.contains("告警名称: Unknown"));
        assert!(text.contains("告警详情: No description"));
        assert!(text.contains("告警时间: \n"));
    }

    #[test]
    fn start_time_keeps_the_sender_offset() {
        assert_eq!(
            format_start_time("2024-05-01T18:00:00+08:00"),
            "2024-05-01 18:00:00"
        );
        assert_eq!(format_start_time("yesterday"), "yesterday");
    }
}
