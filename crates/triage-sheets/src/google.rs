//! Google Sheets values API store
//!
//! Reads and writes one A1 range (usually a whole worksheet) with an OAuth
//! access token. Token acquisition is left to the operator: the token is
//! read from the environment variable named in the config.
//!
//! Cells are read as formulas and written as user-entered input, so formula
//! columns and numbers survive a read/write round trip. A commit always
//! covers the whole extent of the last read: blank rows dropped on load and
//! rows past the end of the written table are cleared, never left behind.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use triage_core::config::secret_from_env;
use triage_core::{ConfigError, SheetStore, StoreError, Table};

/// Default API root
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/";

/// Longest error body kept in a [`StoreError::Status`]
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeUpdate<'a> {
    range: &'a str,
    major_dimension: &'a str,
    values: Vec<Vec<String>>,
}

/// Render a cell as text
fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Rows and columns occupied in the sheet, header included
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Extent {
    rows: usize,
    columns: usize,
}

/// Decode a values API response into a table and the extent it occupied
fn decode_values(body: &str) -> Result<(Table, Extent), StoreError> {
    let range: ValueRange =
        serde_json::from_str(body).map_err(|e| StoreError::Decode(e.to_string()))?;
    let extent = Extent {
        rows: range.values.len(),
        columns: range.values.iter().map(Vec::len).max().unwrap_or(0),
    };
    let grid = range
        .values
        .into_iter()
        .map(|row| row.into_iter().map(cell_text).collect())
        .collect();
    Ok((Table::from_grid(grid), extent))
}

/// Grid for a commit, padded with empty cells to cover `extent`
fn padded_grid(table: &Table, extent: Extent) -> Vec<Vec<String>> {
    let mut grid = table.to_grid();
    let width = extent.columns.max(table.columns().len());
    for row in &mut grid {
        row.resize(width, String::new());
    }
    while grid.len() < extent.rows {
        grid.push(vec![String::new(); width]);
    }
    grid
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

/// Store backed by one range of a Google spreadsheet
#[derive(Clone)]
pub struct GoogleSheetStore {
    client: reqwest::Client,
    url: Url,
    range: String,
    token: String,
    extent: Arc<Mutex<Extent>>,
}

impl GoogleSheetStore {
    /// Create store for a spreadsheet range
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the base URL is unusable
    pub fn new(
        spreadsheet_id: &str,
        range: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, StoreError> {
        Self::with_base_url(SHEETS_API_BASE, spreadsheet_id, range, token)
    }

    /// Create store against a different API root (proxies, tests)
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if `base` is not a usable URL
    pub fn with_base_url(
        base: &str,
        spreadsheet_id: &str,
        range: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let range = range.into();
        let mut url = Url::parse(base).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| StoreError::Unavailable(format!("cannot use {base} as API root")))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range.as_str()]);

        Ok(Self {
            client: reqwest::Client::new(),
            url,
            range,
            token: token.into(),
            extent: Arc::default(),
        })
    }

    /// Create store from config fields, reading the token from the environment
    ///
    /// # Errors
    /// - `ConfigError::MissingSecret` if the token variable is unset
    /// - `ConfigError::Invalid` if the spreadsheet id is blank
    pub fn from_config(spreadsheet_id: &str, range: &str, token_env: &str) -> Result<Self, ConfigError> {
        if spreadsheet_id.trim().is_empty() {
            return Err(ConfigError::Invalid("store.spreadsheet_id is blank".into()));
        }
        let token = secret_from_env(token_env)?;
        Self::new(spreadsheet_id, range, token).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Values endpoint for the configured range
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// URL for reads: formulas as written, dates as displayed
    #[must_use]
    pub fn read_url(&self) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "FORMULA")
            .append_pair("dateTimeRenderOption", "FORMATTED_STRING");
        url
    }

    /// URL for writes: values are parsed as if typed into the sheet
    #[must_use]
    pub fn write_url(&self) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");
        url
    }

    fn update_body<'a>(&'a self, table: &Table) -> ValueRangeUpdate<'a> {
        ValueRangeUpdate {
            range: &self.range,
            major_dimension: "ROWS",
            values: padded_grid(table, *self.extent.lock()),
        }
    }

    async fn read_body(response: reqwest::Response) -> Result<String, StoreError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(StoreError::Status {
                status: status.as_u16(),
                body: truncate(body),
            })
        }
    }
}

#[async_trait]
impl SheetStore for GoogleSheetStore {
    async fn load(&self) -> Result<Table, StoreError> {
        let response = self
            .client
            .get(self.read_url())
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let body = Self::read_body(response).await?;
        let (table, extent) = decode_values(&body)?;
        *self.extent.lock() = extent;
        Ok(table)
    }

    async fn commit(&self, table: &Table) -> Result<(), StoreError> {
        let update = self.update_body(table);

        let response = self
            .client
            .put(self.write_url())
            .bearer_auth(&self.token)
            .json(&update)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Self::read_body(response).await?;
        tracing::debug!(range = %self.range, rows = table.len(), "sheet range updated");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("google sheet range '{}'", self.range)
    }
}

impl std::fmt::Debug for GoogleSheetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSheetStore")
            .field("url", &self.url.as_str())
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}
