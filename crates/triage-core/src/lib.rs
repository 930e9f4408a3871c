//! Triage Core - incremental incident classification
//!
//! Polls a sheet of free-text incident reports and fills in four output
//! columns (place, keywords, urgency, department) using a language model:
//! - Decides which rows still need classification
//! - Avoids duplicate model calls within one process lifetime
//! - Merges outputs into the freshest copy of the sheet before committing
//! - Projects the sheet onto a per-department board
//!
//! # Example
//!
//! ```rust,ignore
//! use triage_core::prelude::*;
//!
//! # async fn example(store: Arc<dyn SheetStore>, model: Arc<dyn LanguageModel>) -> Result<(), TriageError> {
//! let config = TriageConfig::new();
//! let engine = UpdateEngine::new(ClassifierAdapter::new(model));
//! let mut poll = PollLoop::from_config(store, engine, &config);
//!
//! let report = poll.run_cycle().await?;
//! println!("classified {} rows", report.update.classified);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod board;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod observability;
pub mod scheduler;
pub mod store;
pub mod table;
pub mod tracker;
pub mod types;
pub mod writer;

// Re-exports for convenience
pub use board::{Board, Card, Lane};
pub use classifier::{build_prompt, parse_reply, ClassifierAdapter, LanguageModel};
pub use config::{ModelConfig, ScheduleConfig, SchemaConfig, StoreConfig, TriageConfig};
pub use engine::{UpdateEngine, UpdateReport};
pub use error::{ColumnRole, ConfigError, ModelError, SchemaError, StoreError, TriageError};
pub use scheduler::{CycleReport, PollLoop, SheetSummary};
pub use store::SheetStore;
pub use table::{Schema, Table, OUTPUT_COLUMNS};
pub use tracker::ProcessedSet;
pub use types::{ClassificationResult, Department, RowOutputs, Urgency};
pub use writer::{merge_outputs, merge_rows, MergeReport, MergeWriter};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for wiring a triage loop
    pub use crate::{
        ClassifierAdapter, LanguageModel, PollLoop, SheetStore, Table, TriageConfig, TriageError,
        UpdateEngine,
    };
    pub use std::sync::Arc;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
