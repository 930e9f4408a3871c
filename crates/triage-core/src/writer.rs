//! Merge/persist writer
//!
//! Folds the engine's outputs into the most recent copy of the sheet and
//! commits it. Only the four output cells of rows classified this pass are
//! written; every other cell comes from the fresh read, so edits made by
//! people since the cycle's first load survive, including corrections to
//! rows that were already processed.
//!
//! The window between the fresh read and the commit is not protected.

use crate::config::SchemaConfig;
use crate::error::TriageError;
use crate::store::SheetStore;
use crate::table::{Schema, Table};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// What one merge did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Rows whose output cells were copied into the latest table
    pub rows_written: usize,
    /// Updated rows with no counterpart in the latest table
    pub rows_missing: usize,
    /// Updated rows without identity (never written)
    pub rows_unkeyed: usize,
    /// Output columns created in the latest table
    pub columns_created: usize,
}

/// Copy output cells of every `updated` row into `latest`, matching rows by identity
///
/// The n-th row carrying a given identity in `updated` pairs with the n-th
/// row carrying it in `latest`. Non-output columns and unmatched rows of
/// `latest` are left as they are.
pub fn merge_outputs(
    latest: &mut Table,
    latest_schema: &Schema,
    updated: &Table,
    updated_schema: &Schema,
) -> MergeReport {
    merge_selected(latest, latest_schema, updated, updated_schema, |_| true)
}

/// Like [`merge_outputs`], restricted to the `updated` rows at `rows`
///
/// Unselected rows still take part in identity pairing, so duplicates keep
/// their order.
pub fn merge_rows(
    latest: &mut Table,
    latest_schema: &Schema,
    updated: &Table,
    updated_schema: &Schema,
    rows: &[usize],
) -> MergeReport {
    let selected: HashSet<usize> = rows.iter().copied().collect();
    merge_selected(latest, latest_schema, updated, updated_schema, |row| {
        selected.contains(&row)
    })
}

fn merge_selected(
    latest: &mut Table,
    latest_schema: &Schema,
    updated: &Table,
    updated_schema: &Schema,
    selected: impl Fn(usize) -> bool,
) -> MergeReport {
    let mut report = MergeReport {
        columns_created: latest_schema.created,
        ..MergeReport::default()
    };

    let mut positions: HashMap<String, VecDeque<usize>> = HashMap::new();
    for row in 0..latest.len() {
        let id = latest_schema.identity(latest, row);
        if !id.is_empty() {
            positions.entry(id.to_string()).or_default().push_back(row);
        }
    }

    for row in 0..updated.len() {
        let wanted = selected(row);
        let id = updated_schema.identity(updated, row);
        if id.is_empty() {
            if wanted {
                report.rows_unkeyed += 1;
            }
            continue;
        }
        let target = positions.get_mut(id).and_then(VecDeque::pop_front);
        if !wanted {
            continue;
        }
        let Some(target) = target else {
            report.rows_missing += 1;
            tracing::debug!(row_id = %id, "row vanished from sheet before merge");
            continue;
        };
        let outputs = updated_schema.outputs(updated, row);
        latest_schema.write_outputs(latest, target, &outputs);
        report.rows_written += 1;
    }

    report
}

/// Re-reads the sheet, merges outputs and commits
#[derive(Clone)]
pub struct MergeWriter {
    store: Arc<dyn SheetStore>,
    schema: SchemaConfig,
}

impl MergeWriter {
    /// Create writer over a store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn SheetStore>, schema: SchemaConfig) -> Self {
        Self { store, schema }
    }

    /// Merge `updated` into the latest sheet contents and commit once
    ///
    /// # Arguments
    /// * `updated` - Table produced by the update engine this cycle
    /// * `updated_schema` - Column positions in `updated`
    /// * `rows` - Positions in `updated` whose outputs were written this cycle
    ///
    /// # Errors
    /// - `TriageError::Store` if the re-read or the commit fails
    /// - `TriageError::Schema` if the sheet lost a required column meanwhile
    pub async fn merge_and_persist(
        &self,
        updated: &Table,
        updated_schema: &Schema,
        rows: &[usize],
    ) -> Result<MergeReport, TriageError> {
        let mut latest = self.store.load().await?;
        let latest_schema = Schema::resolve(&mut latest, &self.schema)?;

        let report = merge_rows(&mut latest, &latest_schema, updated, updated_schema, rows);
        self.store.commit(&latest).await?;

        tracing::debug!(
            written = report.rows_written,
            missing = report.rows_missing,
            rows = latest.len(),
            "merged table committed"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for MergeWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeWriter")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}
