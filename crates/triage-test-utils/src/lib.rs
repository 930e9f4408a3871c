//! Testing utilities for the triage workspace
//!
//! Shared test doubles and fixtures:
//! - [`ScriptedModel`]: a language model with canned replies and a call log
//! - [`MemoryStore`]: an in-memory sheet with failure and concurrent-edit hooks

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use triage_core::{LanguageModel, ModelError, SheetStore, StoreError, Table};

/// Reply for "pothole on Main St"
pub const PUBLIC_WORKS_REPLY: &str =
    r#"{"place":["Main St"],"keywords":["pothole"],"urgency":"4","department":"Public Works"}"#;

/// Reply for a fire report
pub const FIRE_REPLY: &str =
    r#"{"place":["Pier 9"],"keywords":["smoke","fire"],"urgency":9,"department":"Fire Department"}"#;

/// Reply deciding no department applies
pub const NO_DEPARTMENT_REPLY: &str =
    r#"{"place":[],"keywords":["compliment"],"urgency":"1","department":""}"#;

/// Sheet with a timestamp, message and identity column, and no outputs yet
pub fn incident_sheet(rows: &[(&str, &str)]) -> Table {
    rows.iter().enumerate().fold(
        Table::new(["Timestamp", "Message", "Hash Value"]),
        |table, (i, (message, id))| table.with_row([format!("2024-05-0{} 09:00", i + 1), (*message).to_string(), (*id).to_string()]),
    )
}

type Reply = Result<String, ModelError>;

#[derive(Default)]
struct ModelState {
    rules: Vec<(String, Reply)>,
    queue: VecDeque<Reply>,
    fallback: Option<Reply>,
    prompts: Vec<String>,
}

/// Language model double with canned replies
///
/// Lookup order per call: the first rule whose needle occurs in the prompt,
/// then the next queued reply, then the fallback. With none of those the
/// call fails with a transport error.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    state: Arc<Mutex<ModelState>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reply
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.state.lock().queue.push_back(Ok(text.into()));
        self
    }

    /// Queue one failure
    pub fn fail(self, error: ModelError) -> Self {
        self.state.lock().queue.push_back(Err(error));
        self
    }

    /// Always answer prompts containing `needle` with `reply`
    pub fn on_message(self, needle: impl Into<String>, reply: Reply) -> Self {
        self.state.lock().rules.push((needle.into(), reply));
        self
    }

    /// Reply used once rules and queue are exhausted
    pub fn otherwise(self, reply: Reply) -> Self {
        self.state.lock().fallback = Some(reply);
        self
    }

    /// Number of calls made
    pub fn calls(&self) -> usize {
        self.state.lock().prompts.len()
    }

    /// Prompts received, in order
    pub fn prompts(&self) -> Vec<String> {
        self.state.lock().prompts.clone()
    }

    /// Number of calls whose prompt contained `needle`
    pub fn calls_mentioning(&self, needle: &str) -> usize {
        self.state
            .lock()
            .prompts
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }

    pub fn into_model(self) -> Arc<dyn LanguageModel> {
        Arc::new(self)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let mut state = self.state.lock();
        state.prompts.push(prompt.to_string());

        if let Some((_, reply)) = state.rules.iter().find(|(needle, _)| prompt.contains(needle.as_str())) {
            return reply.clone();
        }
        if let Some(reply) = state.queue.pop_front() {
            return reply;
        }
        state
            .fallback
            .clone()
            .unwrap_or_else(|| Err(ModelError::Transport("no scripted reply".into())))
    }
}

type Edit = Box<dyn FnOnce(&mut Table) + Send>;

#[derive(Default)]
struct StoreState {
    table: Table,
    loads: usize,
    commits: usize,
    failing_loads: usize,
    failing_commits: usize,
    edits: Vec<(usize, Edit)>,
}

/// In-memory sheet
///
/// Clones share the same sheet, so a test can keep a handle while the loop
/// owns another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new(table: Table) -> Self {
        let store = Self::default();
        store.state.lock().table = table;
        store
    }

    /// Current sheet contents
    pub fn snapshot(&self) -> Table {
        self.state.lock().table.clone()
    }

    pub fn loads(&self) -> usize {
        self.state.lock().loads
    }

    pub fn commits(&self) -> usize {
        self.state.lock().commits
    }

    /// Make the next `n` loads fail
    pub fn fail_next_loads(&self, n: usize) {
        self.state.lock().failing_loads = n;
    }

    /// Make the next `n` commits fail
    pub fn fail_next_commits(&self, n: usize) {
        self.state.lock().failing_commits = n;
    }

    /// Edit the sheet now, as a person would
    pub fn edit(&self, f: impl FnOnce(&mut Table)) {
        f(&mut self.state.lock().table);
    }

    /// Edit the sheet right before the `load_number`-th load (1-based)
    ///
    /// Simulates someone editing between the cycle's first read and the
    /// writer's re-read.
    pub fn edit_before_load(&self, load_number: usize, f: impl FnOnce(&mut Table) + Send + 'static) {
        self.state.lock().edits.push((load_number, Box::new(f)));
    }

    pub fn into_store(self) -> Arc<dyn SheetStore> {
        Arc::new(self)
    }
}

#[async_trait]
impl SheetStore for MemoryStore {
    async fn load(&self) -> Result<Table, StoreError> {
        let mut state = self.state.lock();
        state.loads += 1;
        let current = state.loads;

        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut state.edits)
            .into_iter()
            .partition(|(n, _)| *n == current);
        state.edits = pending;
        for (_, edit) in due {
            edit(&mut state.table);
        }

        if state.failing_loads > 0 {
            state.failing_loads -= 1;
            return Err(StoreError::Unavailable("scripted load failure".into()));
        }
        let mut table = state.table.clone();
        table.drop_blank_rows();
        Ok(table)
    }

    async fn commit(&self, table: &Table) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.failing_commits > 0 {
            state.failing_commits -= 1;
            return Err(StoreError::Transport("scripted commit failure".into()));
        }
        state.commits += 1;
        state.table = table.clone();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
