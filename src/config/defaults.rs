use std::time::Duration;

pub(super) const fn default_http_timeout() -> Duration {
    Duration::from_secs(10)
}

pub(super) const fn default_max_attempts() -> usize {
    3
}

pub(super) const fn default_backoff_unit() -> Duration {
    Duration::from_secs(1)
}

pub(super) const fn default_poll_timeout() -> Duration {
    Duration::from_secs(1)
}

pub(super) const fn default_cooldown() -> Duration {
    Duration::from_secs(5)
}

pub(super) const fn default_settle_delay() -> Duration {
    Duration::from_secs(10)
}

pub(super) const fn default_width() -> u32 {
    1000
}

pub(super) const fn default_height() -> u32 {
    500
}

pub(super) const fn default_org_id() -> u32 {
    1
}

pub(super) fn default_image_dir() -> std::path::PathBuf {
    std::env::temp_dir().join("alertbridge")
}

pub(super) fn default_feishu_api_base() -> String {
    "https://open.feishu.cn/open-apis".to_string()
}

pub(super) const fn default_true() -> bool {
    true
}
