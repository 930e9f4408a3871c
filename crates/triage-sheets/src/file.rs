//! Local JSON file store
//!
//! Holds the sheet as `{ "columns": [...], "rows": [[...], ...] }`. Useful for
//! running the loop without a spreadsheet account, and as a fixture format.
//! Commits write a sibling temp file and rename it over the original, so a
//! reader never sees a half-written sheet.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use triage_core::{SheetStore, StoreError, Table};

/// Store backed by a JSON file on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create store for a file path
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SheetStore for JsonFileStore {
    async fn load(&self) -> Result<Table, StoreError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| StoreError::io_error(&self.path, e))?;
        let table: Table =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Decode(e.to_string()))?;
        // Hand-edited files may hold ragged or blank records
        Ok(Table::from_grid(table.to_grid()))
    }

    async fn commit(&self, table: &Table) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec_pretty(table).map_err(|e| StoreError::Decode(e.to_string()))?;
        let temp = self.temp_path();

        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| StoreError::io_error(&temp, e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| StoreError::io_error(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), rows = table.len(), "sheet file written");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sheet() -> Table {
        Table::new(["Message", "Hash Value"])
            .with_row(["pothole on Main St", "r1"])
            .with_row(["smoke near the pier", "f1"])
    }

    #[tokio::test]
    async fn commit_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("incidents.json"));

        store.commit(&sheet()).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded, sheet());
        assert!(!store.temp_path().exists(), "temp file renamed away");
    }

    #[tokio::test]
    async fn commit_replaces_existing_content() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("incidents.json"));
        store.commit(&sheet()).await.unwrap();

        let smaller = Table::new(["Message", "Hash Value"]).with_row(["only row", "x"]);
        store.commit(&smaller).await.unwrap();

        assert_eq!(store.load().await.unwrap(), smaller);
    }

    #[tokio::test]
    async fn load_normalizes_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("incidents.json");
        std::fs::write(
            &path,
            r#"{"columns":["Message","Hash Value"],"rows":[["a"],["",""],["  ","b"]]}"#,
        )
        .unwrap();

        let table = JsonFileStore::new(&path).load().await.unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0], ["a", ""]);
        assert_eq!(table.cell(1, 1), "b");
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[tokio::test]
    async fn garbage_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("incidents.json");
        std::fs::write(&path, "not json").unwrap();

        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[test]
    fn temp_path_is_sibling() {
        let store = JsonFileStore::new("/data/incidents.json");
        assert_eq!(store.temp_path(), PathBuf::from("/data/incidents.json.tmp"));
    }
}
