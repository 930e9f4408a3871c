//! Incremental update engine
//!
//! One pass over a freshly loaded table. A row is a candidate when its
//! department cell is empty and its identity has not been classified in this
//! process. Candidates are classified sequentially, in table order.

use crate::classifier::ClassifierAdapter;
use crate::table::{Schema, Table};
use crate::tracker::ProcessedSet;

/// What one update pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Rows examined
    pub scanned: usize,
    /// Rows skipped because a department is already set
    pub already_processed: usize,
    /// Rows skipped because the tracker already saw their identity
    pub tracked: usize,
    /// Rows skipped for lack of an identity
    pub missing_identity: usize,
    /// Rows skipped for lack of a message
    pub empty_message: usize,
    /// Classifier invocations
    pub invocations: usize,
    /// Rows whose outputs were written
    pub classified: usize,
    /// Model calls that produced no result
    pub failed: usize,
    /// Replies that could not be parsed
    pub malformed: usize,
}

/// Scans a table and fills in missing outputs
#[derive(Debug)]
pub struct UpdateEngine {
    adapter: ClassifierAdapter,
    tracker: ProcessedSet,
    /// Rows written by the latest pass, with their identities
    last_pass: Vec<(usize, String)>,
}

impl UpdateEngine {
    /// Create engine with an empty tracker
    #[inline]
    #[must_use]
    pub fn new(adapter: ClassifierAdapter) -> Self {
        Self {
            adapter,
            tracker: ProcessedSet::new(),
            last_pass: Vec::new(),
        }
    }

    /// Processed identities seen so far
    #[inline]
    #[must_use]
    pub fn tracker(&self) -> &ProcessedSet {
        &self.tracker
    }

    /// Row positions written by the latest [`update`](Self::update), ascending
    #[must_use]
    pub fn written_rows(&self) -> Vec<usize> {
        self.last_pass.iter().map(|(row, _)| *row).collect()
    }

    /// Release the identities marked by the latest pass
    ///
    /// Called when that pass's outputs could not be persisted, so the rows
    /// are classified again on the next pass. Returns how many were released.
    pub fn release_last_pass(&mut self) -> usize {
        let released = self.last_pass.len();
        for (_, id) in self.last_pass.drain(..) {
            self.tracker.forget(&id);
        }
        released
    }

    /// Classify every candidate row and write its outputs
    ///
    /// # Arguments
    /// * `table` - Table loaded this cycle, owned for the duration of the pass
    /// * `schema` - Column positions resolved against `table`
    ///
    /// # Returns
    /// The updated table and a report of what happened
    pub async fn update(&mut self, mut table: Table, schema: &Schema) -> (Table, UpdateReport) {
        let mut report = UpdateReport::default();
        self.last_pass.clear();

        for row in 0..table.len() {
            report.scanned += 1;

            if schema.is_processed(&table, row) {
                report.already_processed += 1;
                continue;
            }

            let id = schema.identity(&table, row).to_string();
            if id.is_empty() {
                report.missing_identity += 1;
                tracing::warn!(row, "skipping row without identity");
                continue;
            }
            if self.tracker.has_processed(&id) {
                report.tracked += 1;
                tracing::debug!(row_id = %id, "already classified in this process");
                continue;
            }

            let message = schema.message(&table, row).trim().to_string();
            if message.is_empty() {
                report.empty_message += 1;
                tracing::warn!(row_id = %id, "skipping row without message");
                continue;
            }

            report.invocations += 1;
            let Some(result) = self.adapter.classify(&message).await else {
                report.failed += 1;
                continue;
            };
            if result.is_malformed() {
                report.malformed += 1;
                tracing::warn!(row_id = %id, "reply had no usable fields, leaving row for next cycle");
                continue;
            }

            schema.write_outputs(&mut table, row, &result.to_outputs());
            self.tracker.mark_processed(id.as_str());
            report.classified += 1;
            if result.known_department().is_none() && result.department.as_deref() != Some("") {
                tracing::warn!(
                    row_id = %id,
                    department = result.department.as_deref().unwrap_or_default(),
                    "department outside the known list, kept verbatim"
                );
            }
            tracing::info!(
                row_id = %id,
                department = result.department.as_deref().unwrap_or_default(),
                urgency = ?result.urgency.map(|u| u.value()),
                "row classified"
            );
            self.last_pass.push((row, id));
        }

        (table, report)
    }
}
