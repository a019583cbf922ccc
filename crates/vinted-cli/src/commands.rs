use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::info;
use vinted_config::update_from_file;
use vinted_db::{MigrationSet, Migrator, ParameterStore};

use crate::cli::{GlobalArgs, MigrateArgs, MigrationSourceArgs, UpdateConfigArgs};

const DB_FILE_NAME: &str = "vinted_notifications.db";

/// `--db`, or the per-user data directory when not given.
pub fn database_path(global: &GlobalArgs) -> PathBuf {
    global.db.clone().unwrap_or_else(|| {
        dirs::data_local_dir()
            .map(|dir| dir.join("vinted-notifications"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DB_FILE_NAME)
    })
}

fn open_store(global: &GlobalArgs) -> Result<ParameterStore> {
    let path = database_path(global);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    ParameterStore::open(&path).with_context(|| format!("failed to open {}", path.display()))
}

fn load_migrations(source: &MigrationSourceArgs) -> Result<MigrationSet> {
    match &source.dir {
        Some(dir) => MigrationSet::from_dir(dir)
            .with_context(|| format!("failed to load migrations from {}", dir.display())),
        None => MigrationSet::builtin().context("built-in migrations are invalid"),
    }
}

pub fn migrate(args: &MigrateArgs, global: &GlobalArgs) -> Result<()> {
    let store = open_store(global)?;
    let set = load_migrations(&args.source)?;
    let migrator = Migrator::new(&store, &set);

    if args.dry_run {
        let pending = migrator.pending()?;
        if pending.is_empty() {
            println!("Nothing to apply.");
        }
        for migration in pending {
            println!("would apply {migration}");
        }
        return Ok(());
    }

    let report = migrator.run().context("migration run aborted")?;
    for name in &report.applied {
        println!("applied {name}");
    }
    println!(
        "Parameters at version {}",
        report.version.as_deref().unwrap_or("<unset>")
    );
    Ok(())
}

pub fn status(source: &MigrationSourceArgs, global: &GlobalArgs) -> Result<()> {
    let store = open_store(global)?;
    let set = load_migrations(source)?;
    let current = store.version()?;

    println!("Stored version:  {}", current.as_deref().unwrap_or("<unset>"));
    println!(
        "Latest version:  {}",
        set.latest().map(|v| v.as_str()).unwrap_or("<none>")
    );

    let discord = store
        .get_bool("discord_enabled")
        .context("stored discord_enabled is unreadable")?;
    if let Some(enabled) = discord {
        let state = if enabled { "enabled" } else { "disabled" };
        println!("Discord:         {state}");
    }
    let retention = store
        .get_i64("retention_months")
        .context("stored retention_months is unreadable")?;
    if let Some(months) = retention {
        println!("Retention:       {months} months");
    }

    let pending = Migrator::new(&store, &set).pending()?;
    if pending.is_empty() {
        println!("Up to date.");
    } else {
        println!("Pending:");
        for migration in pending {
            println!("  {migration}");
        }
    }
    Ok(())
}

pub fn update_config(args: &UpdateConfigArgs, global: &GlobalArgs) -> Result<()> {
    let store = open_store(global)?;
    let report = update_from_file(&store, &args.file)
        .with_context(|| format!("configuration update from {} failed", args.file.display()))?;

    println!("{} parameters updated", report.updated.len());
    if report.proxy_cache_reset {
        println!("Proxy cache reset.");
    }
    Ok(())
}

pub fn get(key: &str, global: &GlobalArgs) -> Result<()> {
    let store = open_store(global)?;
    match store.get(key)? {
        Some(value) => {
            println!("{value}");
            Ok(())
        }
        None => bail!("parameter {key} is not set"),
    }
}

pub fn set(key: &str, value: &str, global: &GlobalArgs) -> Result<()> {
    let store = open_store(global)?;
    store.set(key, value)?;
    info!("set {key}");
    Ok(())
}

pub fn list(json: bool, global: &GlobalArgs) -> Result<()> {
    let store = open_store(global)?;
    let parameters = store.list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&parameters)?);
        return Ok(());
    }

    let width = parameters.iter().map(|p| p.key.len()).max().unwrap_or(0);
    for parameter in &parameters {
        println!("{:<width$}  {}", parameter.key, parameter.value);
    }
    Ok(())
}
