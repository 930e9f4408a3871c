//! Poll loop
//!
//! Fixed-delay scheduling: each cycle loads the sheet, resolves the schema,
//! runs the update engine and merges the result back. The next cycle starts
//! one poll interval after the previous one finished, so cycles never
//! overlap and the engine's tracker has a single mutator.

use crate::config::{SchemaConfig, TriageConfig};
use crate::engine::{UpdateEngine, UpdateReport};
use crate::error::TriageError;
use crate::store::SheetStore;
use crate::table::Schema;
use crate::writer::{MergeReport, MergeWriter};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Summary of one completed cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Cycle number, starting at 1
    pub cycle: u64,
    /// When the cycle started
    pub started_at: DateTime<Utc>,
    /// Rows in the loaded table
    pub rows: usize,
    /// Update pass outcome
    pub update: UpdateReport,
    /// Merge outcome
    pub merge: MergeReport,
    /// Wall time spent on the cycle
    pub elapsed: Duration,
}

/// Result of a pre-flight check against the sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetSummary {
    /// Rows in the sheet
    pub rows: usize,
    /// Rows with a department already set
    pub processed: usize,
    /// Rows without identity
    pub missing_identity: usize,
    /// Output columns the first cycle will create
    pub columns_to_create: usize,
}

/// The load, update, merge loop
///
/// Owns the engine (and through it the tracker) and a handle to the store;
/// constructed once at startup.
pub struct PollLoop {
    store: Arc<dyn SheetStore>,
    engine: UpdateEngine,
    writer: MergeWriter,
    schema: SchemaConfig,
    interval: Duration,
    cycles: u64,
}

impl PollLoop {
    /// Create loop from its parts
    #[must_use]
    pub fn new(
        store: Arc<dyn SheetStore>,
        engine: UpdateEngine,
        schema: SchemaConfig,
        interval: Duration,
    ) -> Self {
        let writer = MergeWriter::new(Arc::clone(&store), schema.clone());
        Self {
            store,
            engine,
            writer,
            schema,
            interval,
            cycles: 0,
        }
    }

    /// Create loop using the schema and schedule sections of a config
    #[must_use]
    pub fn from_config(store: Arc<dyn SheetStore>, engine: UpdateEngine, config: &TriageConfig) -> Self {
        Self::new(
            store,
            engine,
            config.schema.clone(),
            config.schedule.poll_interval(),
        )
    }

    /// Engine driving this loop
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &UpdateEngine {
        &self.engine
    }

    /// Cycles started so far
    #[inline]
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Load the sheet once and check it can be worked on
    ///
    /// # Errors
    /// Store failures and schema errors, both meant to abort startup
    pub async fn preflight(&self) -> Result<SheetSummary, TriageError> {
        let mut table = self.store.load().await?;
        let schema = Schema::resolve(&mut table, &self.schema)?;

        let processed = (0..table.len())
            .filter(|&row| schema.is_processed(&table, row))
            .count();
        let missing_identity = (0..table.len())
            .filter(|&row| schema.identity(&table, row).is_empty())
            .count();

        Ok(SheetSummary {
            rows: table.len(),
            processed,
            missing_identity,
            columns_to_create: schema.created,
        })
    }

    /// Run one load, update, merge pass
    ///
    /// # Errors
    /// - `TriageError::Store` if loading or committing fails (cycle abandoned)
    /// - `TriageError::Schema` if a required column is missing
    pub async fn run_cycle(&mut self) -> Result<CycleReport, TriageError> {
        self.cycles += 1;
        let cycle = self.cycles;
        let span = tracing::info_span!("cycle", cycle);
        self.cycle_inner(cycle).instrument(span).await
    }

    async fn cycle_inner(&mut self, cycle: u64) -> Result<CycleReport, TriageError> {
        let started_at = Utc::now();
        let start = Instant::now();

        let mut table = self.store.load().await?;
        let schema = Schema::resolve(&mut table, &self.schema)?;
        let rows = table.len();

        let (table, update) = self.engine.update(table, &schema).await;
        let written = self.engine.written_rows();
        let merge = match self.writer.merge_and_persist(&table, &schema, &written).await {
            Ok(merge) => merge,
            Err(e) => {
                let released = self.engine.release_last_pass();
                if released > 0 {
                    tracing::warn!(released, "classified rows not persisted, they will be retried");
                }
                return Err(e);
            }
        };

        let report = CycleReport {
            cycle,
            started_at,
            rows,
            update,
            merge,
            elapsed: start.elapsed(),
        };
        tracing::info!(
            rows,
            classified = update.classified,
            failed = update.failed,
            malformed = update.malformed,
            written = merge.rows_written,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "cycle complete"
        );
        Ok(report)
    }

    /// Run cycles until `shutdown` resolves or a fatal error occurs
    ///
    /// Non-fatal errors are logged and the loop carries on; the next cycle
    /// retries naturally because unwritten rows still have no department.
    /// Shutdown is only observed while sleeping between cycles.
    ///
    /// # Errors
    /// The first fatal error (see [`TriageError::is_fatal`])
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), TriageError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!(interval_secs = self.interval.as_secs(), "poll loop started");

        loop {
            match self.run_cycle().await {
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, "fatal error, stopping poll loop");
                    return Err(e);
                }
                Err(TriageError::Store(e)) if !e.is_retryable() => {
                    tracing::error!(error = %e, "store rejected the request, retrying next cycle anyway");
                }
                Err(e) => tracing::warn!(error = %e, "cycle failed, retrying next cycle"),
            }

            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!(cycles = self.cycles, "shutdown requested, poll loop stopped");
                    return Ok(());
                }
                () = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

impl std::fmt::Debug for PollLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollLoop")
            .field("engine", &self.engine)
            .field("schema", &self.schema)
            .field("interval", &self.interval)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierAdapter, MockLanguageModel};
    use crate::error::StoreError;
    use crate::store::MockSheetStore;
    use crate::table::Table;

    fn engine_without_calls() -> UpdateEngine {
        let mut model = MockLanguageModel::new();
        model.expect_complete().times(0);
        UpdateEngine::new(ClassifierAdapter::new(Arc::new(model)))
    }

    #[tokio::test]
    async fn preflight_summarizes_sheet() {
        let mut store = MockSheetStore::new();
        store.expect_load().returning(|| {
            Ok(Table::new(["Message", "Hash Value", "Department"])
                .with_row(["a", "r1", "Police"])
                .with_row(["b", "", ""])
                .with_row(["c", "r3", ""]))
        });
        let poll = PollLoop::new(
            Arc::new(store),
            engine_without_calls(),
            SchemaConfig::default(),
            Duration::from_secs(1),
        );

        let summary = poll.preflight().await.unwrap();
        assert_eq!(
            summary,
            SheetSummary {
                rows: 3,
                processed: 1,
                missing_identity: 1,
                columns_to_create: 3,
            }
        );
    }

    #[tokio::test]
    async fn load_failure_ends_cycle_without_commit() {
        let mut store = MockSheetStore::new();
        store
            .expect_load()
            .times(1)
            .returning(|| Err(StoreError::Unavailable("quota".into())));
        store.expect_commit().times(0);
        let mut poll = PollLoop::new(
            Arc::new(store),
            engine_without_calls(),
            SchemaConfig::default(),
            Duration::from_secs(1),
        );

        let err = poll.run_cycle().await.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(poll.cycles(), 1);
    }

    #[tokio::test]
    async fn run_stops_on_fatal_schema_error() {
        let mut store = MockSheetStore::new();
        store
            .expect_load()
            .times(1)
            .returning(|| Ok(Table::new(["Message"]).with_row(["no identity column"])));
        store.expect_commit().times(0);
        let mut poll = PollLoop::new(
            Arc::new(store),
            engine_without_calls(),
            SchemaConfig::default(),
            Duration::from_millis(1),
        );

        let err = poll.run(std::future::pending()).await.unwrap_err();
        assert!(matches!(err, TriageError::Schema(_)));
    }

    #[tokio::test]
    async fn failed_commit_releases_classified_rows() {
        let mut model = MockLanguageModel::new();
        model.expect_complete().times(1).returning(|_| {
            Ok(r#"{"place":[],"keywords":["pothole"],"urgency":"3","department":"Public Works"}"#.to_string())
        });
        let mut store = MockSheetStore::new();
        store
            .expect_load()
            .times(2)
            .returning(|| Ok(Table::new(["Message", "Hash Value"]).with_row(["pothole", "r1"])));
        store
            .expect_commit()
            .times(1)
            .returning(|_| Err(StoreError::Status { status: 503, body: String::new() }));
        let mut poll = PollLoop::new(
            Arc::new(store),
            UpdateEngine::new(ClassifierAdapter::new(Arc::new(model))),
            SchemaConfig::default(),
            Duration::from_secs(1),
        );

        let err = poll.run_cycle().await.unwrap_err();

        assert!(matches!(err, TriageError::Store(_)));
        assert!(!poll.engine().tracker().has_processed("r1"));
    }
}
