//! Sheet store backends
//!
//! Concrete [`SheetStore`] implementations:
//! - [`GoogleSheetStore`] for a Google spreadsheet range
//! - [`JsonFileStore`] for a local JSON file
//!
//! [`open_store`] picks one from a [`StoreConfig`].

#![warn(unreachable_pub)]

pub mod file;
pub mod google;

pub use file::JsonFileStore;
pub use google::GoogleSheetStore;

use std::sync::Arc;
use triage_core::{ConfigError, SheetStore, StoreConfig};

/// Build the store named by the configuration
///
/// # Errors
/// Returns `ConfigError` if a required secret is missing or a field is invalid
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn SheetStore>, ConfigError> {
    let store: Arc<dyn SheetStore> = match config {
        StoreConfig::Json { path } => Arc::new(JsonFileStore::new(path.clone())),
        StoreConfig::Google {
            spreadsheet_id,
            range,
            token_env,
        } => Arc::new(GoogleSheetStore::from_config(spreadsheet_id, range, token_env)?),
    };
    tracing::debug!(store = %store.describe(), "sheet store opened");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn json_store_from_config() {
        let store = open_store(&StoreConfig::Json {
            path: PathBuf::from("incidents.json"),
        })
        .unwrap();
        assert_eq!(store.describe(), "json file incidents.json");
    }

    #[test]
    fn google_store_needs_token() {
        let err = open_store(&StoreConfig::Google {
            spreadsheet_id: "abc".into(),
            range: "Sheet1".into(),
            token_env: "TRIAGE_TEST_TOKEN_THAT_IS_NEVER_SET".into(),
        })
        .err().unwrap();
        assert!(matches!(err, ConfigError::MissingSecret(var) if var == "TRIAGE_TEST_TOKEN_THAT_IS_NEVER_SET"));
    }
}
