//! Sheet storage boundary
//!
//! The store is the only shared state between this process and the people
//! editing the sheet. It offers whole-table reads and whole-table writes;
//! there is no row-level write primitive.

use crate::error::StoreError;
use crate::table::Table;
use async_trait::async_trait;

/// Whole-table read/write access to the incident sheet
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Load all non-empty rows, with the header taken from the first row
    ///
    /// # Errors
    /// Any transient I/O or remote failure
    async fn load(&self) -> Result<Table, StoreError>;

    /// Overwrite the backing sheet with `table` in one call
    ///
    /// # Errors
    /// Any transient I/O or remote failure
    async fn commit(&self, table: &Table) -> Result<(), StoreError>;

    /// Short description for log lines
    fn describe(&self) -> String {
        "sheet".to_string()
    }
}
