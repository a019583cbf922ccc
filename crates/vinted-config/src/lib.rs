pub mod loader;
pub mod model;
pub mod update;
pub mod validate;

pub use loader::{DEFAULT_SETTINGS_FILE, SettingsFormat, SettingsLoader};
pub use model::{SettingKind, Settings};
pub use update::{UpdateReport, apply_settings, update_from_file};
pub use validate::{SettingUpdate, validate};
