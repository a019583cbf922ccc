pub mod migrations;
pub mod parameter_store;
mod script;
pub mod version;

pub use migrations::{Migration, MigrationReport, MigrationSet, Migrator};
pub use parameter_store::{Parameter, ParameterStore, ParameterTx, VERSION_KEY};
pub use version::Version;
