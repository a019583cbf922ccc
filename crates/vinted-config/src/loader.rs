use std::path::Path;

use serde_json::Value;
use tracing::debug;
use vinted_common::{Error, Result};

use crate::model::Settings;

/// Settings file read when no path is given.
pub const DEFAULT_SETTINGS_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    Yaml,
    Toml,
}

impl SettingsFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yml" | "yaml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            other => Err(Error::Config(format!(
                "unsupported settings file extension: {other:?}"
            ))),
        }
    }
}

/// Reads settings files into a [`Settings`] mapping.
pub struct SettingsLoader;

impl SettingsLoader {
    pub fn load(path: &Path) -> Result<Settings> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "settings file not found: {}",
                path.display()
            )));
        }

        let format = SettingsFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        debug!("loading {format:?} settings from {}", path.display());
        Self::parse(&contents, format)
    }

    pub fn parse(contents: &str, format: SettingsFormat) -> Result<Settings> {
        if contents.trim().is_empty() {
            return Err(Error::Config("settings file is empty".into()));
        }

        let document: Value = match format {
            SettingsFormat::Yaml => serde_yaml::from_str(contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}")))?,
            SettingsFormat::Toml => toml::from_str(contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}")))?,
        };

        let settings: Settings = match document {
            Value::Object(map) => map.into_iter().collect(),
            Value::Null => Settings::default(),
            other => {
                return Err(Error::Config(format!(
                    "settings file must contain a mapping of keys to values, found {}",
                    crate::validate::type_name(&other)
                )));
            }
        };

        if settings.is_empty() {
            return Err(Error::Config("settings file has no settings".into()));
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            SettingsFormat::from_path(Path::new("config.yaml")).unwrap(),
            SettingsFormat::Yaml
        );
        assert_eq!(
            SettingsFormat::from_path(Path::new("a/b.yml")).unwrap(),
            SettingsFormat::Yaml
        );
        assert_eq!(
            SettingsFormat::from_path(Path::new("config.toml")).unwrap(),
            SettingsFormat::Toml
        );
        assert!(SettingsFormat::from_path(Path::new("config.json")).is_err());
        assert!(SettingsFormat::from_path(Path::new("config")).is_err());
    }

    #[test]
    fn parses_yaml_scalars_natively() {
        let settings = SettingsLoader::parse(
            "discord_enabled: true\nquery_delay: 2.5\ntelegram_chat_id: '12345'\n",
            SettingsFormat::Yaml,
        )
        .unwrap();

        assert_eq!(settings.get("discord_enabled"), Some(&json!(true)));
        assert_eq!(settings.get("query_delay"), Some(&json!(2.5)));
        assert_eq!(settings.get("telegram_chat_id"), Some(&json!("12345")));
    }

    #[test]
    fn parses_toml_tables() {
        let settings = SettingsLoader::parse(
            "rss_enabled = false\nrss_port = 8080\nuser_agents = [\"a\", \"b\"]\n",
            SettingsFormat::Toml,
        )
        .unwrap();

        assert_eq!(settings.len(), 3);
        assert_eq!(settings.get("rss_port"), Some(&json!(8080)));
        assert_eq!(settings.get("user_agents"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn rejects_empty_or_non_mapping_documents() {
        assert!(SettingsLoader::parse("", SettingsFormat::Yaml).is_err());
        assert!(SettingsLoader::parse("  \n# nothing\n", SettingsFormat::Yaml).is_err());
        assert!(SettingsLoader::parse("- a\n- b\n", SettingsFormat::Yaml).is_err());
        assert!(SettingsLoader::parse("{}", SettingsFormat::Yaml).is_err());
    }

    #[test]
    fn reports_parse_errors_as_configuration_errors() {
        let err = SettingsLoader::parse("rss_port: [1, 2", SettingsFormat::Yaml).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("YAML"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = SettingsLoader::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
