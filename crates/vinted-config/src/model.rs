use std::collections::BTreeMap;

use serde_json::Value;

/// How a setting must be written in the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    /// Native `true`/`false`, stored as `True`/`False`.
    Bool,
    /// Integer or float, or a string holding an integer.
    Number,
    /// JSON text, or a native list/mapping that is serialized to JSON.
    Json,
    /// Anything else, stored as its textual form.
    Text,
}

/// Every key the settings file may set, grouped as in the web UI.
pub const KNOWN_SETTINGS: &[(&str, SettingKind)] = &[
    // Telegram
    ("telegram_enabled", SettingKind::Bool),
    ("telegram_token", SettingKind::Text),
    ("telegram_chat_id", SettingKind::Text),
    // RSS
    ("rss_enabled", SettingKind::Bool),
    ("rss_port", SettingKind::Number),
    ("rss_max_items", SettingKind::Number),
    // Discord
    ("discord_enabled", SettingKind::Bool),
    ("discord_webhook_url", SettingKind::Text),
    // System
    ("items_per_query", SettingKind::Number),
    ("query_refresh_delay", SettingKind::Number),
    ("query_delay", SettingKind::Number),
    ("banwords", SettingKind::Text),
    // Proxy
    ("check_proxies", SettingKind::Bool),
    ("proxy_list", SettingKind::Text),
    ("proxy_list_link", SettingKind::Text),
    // Advanced
    ("message_template", SettingKind::Text),
    ("user_agents", SettingKind::Json),
    ("default_headers", SettingKind::Json),
];

/// Settings whose change invalidates the application's proxy cache.
pub const PROXY_SETTINGS: &[&str] = &["check_proxies", "proxy_list", "proxy_list_link"];

/// Parameter the application compares against to decide when proxies were
/// last verified. Setting it to `1` forces a fresh check.
pub const PROXY_CHECK_TIME_KEY: &str = "last_proxy_check_time";

pub fn kind_of(key: &str) -> Option<SettingKind> {
    KNOWN_SETTINGS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, kind)| *kind)
}

/// The top-level mapping of a settings file, as written by the operator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: BTreeMap<String, Value>,
}

impl Settings {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn touches_proxies(&self) -> bool {
        PROXY_SETTINGS.iter().any(|key| self.values.contains_key(*key))
    }
}

impl FromIterator<(String, Value)> for Settings {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn kinds_follow_the_known_table() {
        assert_eq!(kind_of("discord_enabled"), Some(SettingKind::Bool));
        assert_eq!(kind_of("query_delay"), Some(SettingKind::Number));
        assert_eq!(kind_of("user_agents"), Some(SettingKind::Json));
        assert_eq!(kind_of("proxy_list"), Some(SettingKind::Text));
        assert_eq!(kind_of("version"), None);
        assert_eq!(kind_of("retention_months"), None);
    }

    #[test]
    fn proxy_detection() {
        let settings: Settings = [("proxy_list_link".to_string(), json!("http://x"))]
            .into_iter()
            .collect();
        assert!(settings.touches_proxies());

        let settings: Settings = [("rss_port".to_string(), json!(8080))].into_iter().collect();
        assert!(!settings.touches_proxies());
    }
}
