//! Versioned migrations for the `parameters` table.
//!
//! Each migration file is named `<from>_<to>.sql` and adds default
//! parameters before moving the `version` watermark from `<from>` to `<to>`.
//! A migration is applied in one transaction: either every default and the
//! version bump land, or none of them do and the next run retries it whole.

use std::fmt;
use std::path::Path;

use tracing::{debug, info, warn};
use vinted_common::{Error, Result};

use crate::parameter_store::{ParameterStore, VERSION_KEY};
use crate::script::parse_script;
use crate::version::Version;

/// A migration script compiled into the binary.
pub struct EmbeddedMigration {
    pub name: &'static str,
    pub sql: &'static str,
}

/// Migrations shipped with this release, oldest first.
pub const BUILTIN_MIGRATIONS: &[EmbeddedMigration] = &[
    EmbeddedMigration {
        name: "1.0.5.4_1.0.5.5.sql",
        sql: include_str!("../migrations/1.0.5.4_1.0.5.5.sql"),
    },
    EmbeddedMigration {
        name: "1.0.5.5_1.0.5.6.sql",
        sql: include_str!("../migrations/1.0.5.5_1.0.5.6.sql"),
    },
    EmbeddedMigration {
        name: "1.0.5.6_1.0.5.7.sql",
        sql: include_str!("../migrations/1.0.5.6_1.0.5.7.sql"),
    },
];

const MIGRATION_EXTENSION: &str = "sql";

/// One step of the version chain.
#[derive(Debug, Clone)]
pub struct Migration {
    pub name: String,
    pub from: Version,
    pub to: Version,
    /// Defaults inserted only when the key is absent, in file order.
    pub defaults: Vec<(String, String)>,
}

impl Migration {
    /// Parse a migration from its file name and SQL body.
    pub fn parse(name: &str, sql: &str) -> Result<Self> {
        let (from, to) = versions_from_name(name)?;
        let script = parse_script(name, sql)?;

        let declared: Version = script.version.parse()?;
        if declared != to {
            return Err(Error::Config(format!(
                "{name}: sets version to {declared} but the file name targets {to}"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            from,
            to,
            defaults: script.defaults,
        })
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.from, self.to, self.name)
    }
}

fn versions_from_name(name: &str) -> Result<(Version, Version)> {
    // Versions contain dots, so only a literal `.sql` suffix is dropped.
    let stem = name
        .strip_suffix(MIGRATION_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(name);

    let (from, to) = stem.split_once('_').ok_or_else(|| {
        Error::Config(format!(
            "{name}: migration file names must look like <from>_<to>.{MIGRATION_EXTENSION}"
        ))
    })?;

    let from: Version = from
        .parse()
        .map_err(|e| Error::Config(format!("{name}: bad source version: {e}")))?;
    let to: Version = to
        .parse()
        .map_err(|e| Error::Config(format!("{name}: bad target version: {e}")))?;

    Ok((from, to))
}

/// An ordered, validated collection of migrations.
#[derive(Debug, Clone, Default)]
pub struct MigrationSet {
    migrations: Vec<Migration>,
}

impl MigrationSet {
    /// Sort by source version and reject sets with ambiguous or backwards
    /// steps.
    pub fn new(mut migrations: Vec<Migration>) -> Result<Self> {
        for migration in &migrations {
            if migration.to <= migration.from {
                return Err(Error::Config(format!(
                    "{}: target version must be newer than source version",
                    migration.name
                )));
            }
        }

        migrations.sort_by(|a, b| a.from.cmp(&b.from));
        for pair in migrations.windows(2) {
            if pair[0].from == pair[1].from {
                return Err(Error::Config(format!(
                    "migrations {} and {} both start at version {}",
                    pair[0].name, pair[1].name, pair[0].from
                )));
            }
        }

        Ok(Self { migrations })
    }

    pub fn builtin() -> Result<Self> {
        let migrations = BUILTIN_MIGRATIONS
            .iter()
            .map(|m| Migration::parse(m.name, m.sql))
            .collect::<Result<Vec<_>>>()?;
        Self::new(migrations)
    }

    /// Load every `<from>_<to>.sql` file in `dir`. Other files are skipped.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            Error::Config(format!(
                "failed to read migrations directory {}: {e}",
                dir.display()
            ))
        })?;

        let mut migrations = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(MIGRATION_EXTENSION) {
                warn!("ignoring non-migration file {}", path.display());
                continue;
            }

            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    Error::Config(format!("non UTF-8 migration file name: {}", path.display()))
                })?
                .to_string();
            let sql = std::fs::read_to_string(&path)?;
            debug!("discovered migration {name}");
            migrations.push(Migration::parse(&name, &sql)?);
        }

        Self::new(migrations)
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// The version assumed when the store has no `version` row yet.
    pub fn earliest(&self) -> Option<&Version> {
        self.migrations.first().map(|m| &m.from)
    }

    pub fn latest(&self) -> Option<&Version> {
        self.migrations.iter().map(|m| &m.to).max()
    }

    fn starting_at(&self, version: &Version) -> Option<&Migration> {
        self.migrations.iter().find(|m| &m.from == version)
    }

    /// Resolve the chain of migrations leading from `current` to the latest
    /// known version. A missing `current` starts from the earliest version.
    pub fn plan(&self, current: Option<&str>) -> Result<Vec<&Migration>> {
        let (Some(earliest), Some(latest)) = (self.earliest(), self.latest()) else {
            return Ok(Vec::new());
        };

        let mut version = match current {
            Some(raw) => raw.parse::<Version>()?,
            None => earliest.clone(),
        };

        let mut chain = Vec::new();
        while &version != latest {
            let next = self
                .starting_at(&version)
                .ok_or_else(|| Error::VersionGap {
                    current: version.to_string(),
                    target: latest.to_string(),
                })?;
            chain.push(next);
            version = next.to.clone();
        }
        Ok(chain)
    }
}

/// Outcome of [`Migrator::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Names of the migrations applied, in order.
    pub applied: Vec<String>,
    pub version: Option<String>,
}

/// Applies a [`MigrationSet`] to a [`ParameterStore`].
pub struct Migrator<'a> {
    store: &'a ParameterStore,
    set: &'a MigrationSet,
}

impl<'a> Migrator<'a> {
    pub fn new(store: &'a ParameterStore, set: &'a MigrationSet) -> Self {
        Self { store, set }
    }

    pub fn pending(&self) -> Result<Vec<&'a Migration>> {
        let current = self.store.version()?;
        self.set.plan(current.as_deref())
    }

    /// Apply every pending migration in order, stopping at the first
    /// failure.
    pub fn run(&self) -> Result<MigrationReport> {
        let pending = self.pending()?;
        if pending.is_empty() {
            info!(
                "parameters already at version {}",
                self.store.version()?.as_deref().unwrap_or("<unset>")
            );
        }

        let mut report = MigrationReport::default();
        for migration in pending {
            self.apply_one(migration)?;
            report.applied.push(migration.name.clone());
        }

        report.version = self.store.version()?;
        Ok(report)
    }

    /// Apply a single migration. The stored version must match the
    /// migration's source version, otherwise nothing is written.
    pub fn apply_one(&self, migration: &Migration) -> Result<()> {
        self.store
            .transaction(|tx| {
                let current = match tx.get(VERSION_KEY)? {
                    Some(raw) => raw.parse::<Version>()?,
                    None => self.set.earliest().cloned().ok_or_else(|| {
                        Error::Config("no migrations known to start from".into())
                    })?,
                };
                if current != migration.from {
                    return Err(Error::VersionGap {
                        current: current.to_string(),
                        target: migration.to.to_string(),
                    });
                }

                for (key, default) in &migration.defaults {
                    if tx.upsert_if_absent(key, default)? {
                        debug!("added parameter {key} = {default:?}");
                    } else {
                        debug!("kept existing parameter {key}");
                    }
                }
                tx.set(VERSION_KEY, migration.to.as_str())
            })
            .map_err(|e| match e {
                Error::VersionGap { .. } => e,
                other => Error::Migration {
                    migration: migration.to_string(),
                    reason: other.to_string(),
                },
            })?;

        info!("applied migration {migration}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migration(name: &str, sql: &str) -> Migration {
        Migration::parse(name, sql).unwrap()
    }

    fn step(from: &str, to: &str) -> Migration {
        migration(
            &format!("{from}_{to}.sql"),
            &format!("UPDATE parameters SET value = '{to}' WHERE key = 'version';"),
        )
    }

    #[test]
    fn builtin_set_chains_to_latest() {
        let set = MigrationSet::builtin().unwrap();
        assert_eq!(set.migrations().len(), 3);
        assert_eq!(set.earliest().unwrap().as_str(), "1.0.5.4");
        assert_eq!(set.latest().unwrap().as_str(), "1.0.5.7");

        let plan = set.plan(Some("1.0.5.4")).unwrap();
        let names: Vec<_> = plan.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            ["1.0.5.4_1.0.5.5.sql", "1.0.5.5_1.0.5.6.sql", "1.0.5.6_1.0.5.7.sql"]
        );
    }

    #[test]
    fn plan_from_middle_and_from_latest() {
        let set = MigrationSet::builtin().unwrap();
        assert_eq!(set.plan(Some("1.0.5.6")).unwrap().len(), 1);
        assert!(set.plan(Some("1.0.5.7")).unwrap().is_empty());
    }

    #[test]
    fn plan_without_version_starts_at_earliest() {
        let set = MigrationSet::builtin().unwrap();
        assert_eq!(set.plan(None).unwrap().len(), 3);
    }

    #[test]
    fn plan_reports_gap_for_unknown_version() {
        let set = MigrationSet::builtin().unwrap();
        match set.plan(Some("1.0.5.2")) {
            Err(Error::VersionGap { current, target }) => {
                assert_eq!(current, "1.0.5.2");
                assert_eq!(target, "1.0.5.7");
            }
            other => panic!("expected version gap, got {other:?}"),
        }
        assert!(matches!(
            set.plan(Some("1.0.6")),
            Err(Error::VersionGap { .. })
        ));
    }

    #[test]
    fn set_with_hole_reports_gap() {
        let set = MigrationSet::new(vec![step("1.0", "1.1"), step("1.2", "1.3")]).unwrap();
        assert!(matches!(
            set.plan(Some("1.0")),
            Err(Error::VersionGap { ref current, .. }) if current == "1.1"
        ));
    }

    #[test]
    fn duplicate_source_version_is_rejected() {
        let err = MigrationSet::new(vec![step("1.0", "1.1"), step("1.0", "1.2")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn backwards_step_is_rejected() {
        let err = MigrationSet::new(vec![step("1.1", "1.0")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn file_name_and_version_update_must_agree() {
        let err = Migration::parse(
            "1.0.5.4_1.0.5.5.sql",
            "UPDATE parameters SET value = '1.0.5.6' WHERE key = 'version';",
        )
        .unwrap_err();
        assert!(err.to_string().contains("1.0.5.5"));

        assert!(Migration::parse(
            "latest.sql",
            "UPDATE parameters SET value = '1' WHERE key = 'version';"
        )
        .is_err());
    }

    #[test]
    fn dotted_versions_survive_without_extension() {
        let migration = Migration::parse(
            "1.0_1.1",
            "UPDATE parameters SET value = '1.1' WHERE key = 'version';",
        )
        .unwrap();
        assert_eq!(migration.from.as_str(), "1.0");
        assert_eq!(migration.to.as_str(), "1.1");

        let migration = Migration::parse(
            "1.0.5.6_1.0.5.7.sql",
            "UPDATE parameters SET value = '1.0.5.7' WHERE key = 'version';",
        )
        .unwrap();
        assert_eq!(migration.to.as_str(), "1.0.5.7");
    }

    #[test]
    fn empty_set_has_nothing_to_do() {
        let set = MigrationSet::default();
        assert!(set.is_empty());
        assert!(set.plan(Some("anything")).unwrap().is_empty());
    }

    #[test]
    fn run_applies_builtin_chain() {
        let store = ParameterStore::in_memory().unwrap();
        store.set(VERSION_KEY, "1.0.5.4").unwrap();
        let set = MigrationSet::builtin().unwrap();

        let report = Migrator::new(&store, &set).run().unwrap();
        assert_eq!(report.applied.len(), 3);
        assert_eq!(report.version.as_deref(), Some("1.0.5.7"));

        let again = Migrator::new(&store, &set).run().unwrap();
        assert!(again.applied.is_empty());
        assert_eq!(again.version.as_deref(), Some("1.0.5.7"));
    }

    #[test]
    fn apply_one_rejects_out_of_order_migration() {
        let store = ParameterStore::in_memory().unwrap();
        store.set(VERSION_KEY, "1.0.5.5").unwrap();
        let set = MigrationSet::builtin().unwrap();
        let last = &set.migrations()[2];

        let err = Migrator::new(&store, &set).apply_one(last).unwrap_err();
        assert!(matches!(err, Error::VersionGap { .. }));
        assert_eq!(store.version().unwrap().as_deref(), Some("1.0.5.5"));
        assert!(store.get("discord_enabled").unwrap().is_none());
    }
}
