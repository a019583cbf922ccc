use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("version gap: no migration path from stored version {current} to {target}")]
    VersionGap { current: String, target: String },

    #[error("migration {migration} failed: {reason}")]
    Migration { migration: String, reason: String },

    #[error("validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A single rejected key from a settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub key: String,
    pub message: String,
}

impl FieldError {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::{Error, FieldError};

    #[test]
    fn error_display_includes_context() {
        let e = Error::Config("bad yaml".into());
        assert_eq!(e.to_string(), "configuration error: bad yaml");

        let e = Error::Database("disk full".into());
        assert_eq!(e.to_string(), "database error: disk full");

        let e = Error::Migration {
            migration: "1.0.5.4 -> 1.0.5.5".into(),
            reason: "locked".into(),
        };
        assert_eq!(e.to_string(), "migration 1.0.5.4 -> 1.0.5.5 failed: locked");
    }

    #[test]
    fn version_gap_names_both_versions() {
        let e = Error::VersionGap {
            current: "1.0.5.5".into(),
            target: "1.0.5.7".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("1.0.5.5"));
        assert!(msg.contains("1.0.5.7"));
    }

    #[test]
    fn validation_lists_every_field() {
        let e = Error::Validation(vec![
            FieldError::new("discord_enabled", "must be a boolean"),
            FieldError::new("user_agents", "must be valid JSON"),
        ]);
        assert_eq!(
            e.to_string(),
            "validation failed: discord_enabled: must be a boolean; user_agents: must be valid JSON"
        );
    }
}
