use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vinted_config::DEFAULT_SETTINGS_FILE;

/// Maintain the parameters table of a Vinted Notifications installation.
#[derive(Parser, Debug)]
#[command(name = "vinted")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to the application database
    #[arg(long, global = true, env = "VINTED_DB")]
    pub db: Option<PathBuf>,

    /// Log filter, e.g. `info` or `vinted_db=debug`
    #[arg(long, global = true, env = "VINTED_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply pending parameter migrations
    Migrate(MigrateArgs),

    /// Show the stored version and pending migrations
    Status(MigrationSourceArgs),

    /// Apply a settings file to the parameters table
    UpdateConfig(UpdateConfigArgs),

    /// Print a single parameter
    Get { key: String },

    /// Overwrite a single parameter
    Set { key: String, value: String },

    /// List every parameter
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct MigrationSourceArgs {
    /// Load migrations from this directory instead of the built-in set
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub source: MigrationSourceArgs,

    /// Only list what would be applied
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct UpdateConfigArgs {
    /// Settings file (.yaml, .yml or .toml)
    #[arg(default_value = DEFAULT_SETTINGS_FILE)]
    pub file: PathBuf,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn update_config_defaults_to_config_yaml() {
        let cli = Cli::try_parse_from(["vinted", "update-config"]).unwrap();
        match cli.command {
            Commands::UpdateConfig(args) => assert_eq!(args.file, PathBuf::from("config.yaml")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli =
            Cli::try_parse_from(["vinted", "migrate", "--dry-run", "--db", "/tmp/x.db"]).unwrap();
        assert_eq!(cli.global.db, Some(PathBuf::from("/tmp/x.db")));
        match cli.command {
            Commands::Migrate(args) => {
                assert!(args.dry_run);
                assert!(args.source.dir.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
