use std::path::Path;

use tracing::{debug, info};
use vinted_common::Result;
use vinted_db::ParameterStore;

use crate::loader::SettingsLoader;
use crate::model::{PROXY_CHECK_TIME_KEY, Settings};
use crate::validate::validate;

/// What an update wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Keys written, in key order.
    pub updated: Vec<String>,
    /// Whether the proxy check timestamp was reset.
    pub proxy_cache_reset: bool,
}

/// Validate `settings` and write them in one transaction. Keys absent from
/// `settings` are left untouched.
pub fn apply_settings(store: &ParameterStore, settings: &Settings) -> Result<UpdateReport> {
    let updates = validate(settings)?;
    let proxy_cache_reset = settings.touches_proxies();

    store.transaction(|tx| {
        for update in &updates {
            tx.set(&update.key, &update.value)?;
            debug!("{} = {:?}", update.key, update.value);
        }
        if proxy_cache_reset {
            tx.set(PROXY_CHECK_TIME_KEY, "1")?;
        }
        Ok(())
    })?;

    for update in &updates {
        info!("updated {}", update.key);
    }
    if proxy_cache_reset {
        info!("proxy cache reset (proxy settings were updated)");
    }

    Ok(UpdateReport {
        updated: updates.into_iter().map(|u| u.key).collect(),
        proxy_cache_reset,
    })
}

/// Load a settings file and apply it to `store`.
pub fn update_from_file(store: &ParameterStore, path: &Path) -> Result<UpdateReport> {
    info!("reading settings from {}", path.display());
    let settings = SettingsLoader::load(path)?;
    let report = apply_settings(store, &settings)?;
    info!(
        "configuration update complete: {} parameters updated",
        report.updated.len()
    );
    Ok(report)
}
