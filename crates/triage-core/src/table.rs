//! Tabular sheet model
//!
//! A [`Table`] is a header plus text records, exactly as the sheet stores
//! them. [`Schema`] resolves where the message, identity and output columns
//! live in a particular table, since their positions can differ between two
//! reads of the same sheet.

use crate::config::SchemaConfig;
use crate::error::{ColumnRole, SchemaError};
use crate::types::RowOutputs;
use serde::{Deserialize, Serialize};

/// Output column holding comma-joined places
pub const PLACE_COLUMN: &str = "place";
/// Output column holding comma-joined keywords
pub const KEYWORDS_COLUMN: &str = "keywords";
/// Output column holding the urgency score
pub const URGENCY_COLUMN: &str = "urgency";
/// Output column holding the department
pub const DEPARTMENT_COLUMN: &str = "department";

/// The four model output columns, in creation order
pub const OUTPUT_COLUMNS: [&str; 4] = [
    PLACE_COLUMN,
    KEYWORDS_COLUMN,
    URGENCY_COLUMN,
    DEPARTMENT_COLUMN,
];

/// Compare two column names the way the sheet header is matched
#[inline]
#[must_use]
pub fn column_matches(header: &str, name: &str) -> bool {
    header.trim().eq_ignore_ascii_case(name.trim())
}

/// Header plus ordered text records
///
/// Every record is kept exactly as wide as the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Create empty table with the given header
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build from a raw grid whose first row is the header
    ///
    /// Records are padded or truncated to the header width, and records with
    /// only blank cells are dropped.
    #[must_use]
    pub fn from_grid(grid: Vec<Vec<String>>) -> Self {
        let mut iter = grid.into_iter();
        let Some(header) = iter.next() else {
            return Self::default();
        };
        let mut table = Self {
            columns: header,
            rows: Vec::new(),
        };
        for record in iter {
            table.push_row(record);
        }
        table.drop_blank_rows();
        table
    }

    /// Flatten back into a grid whose first row is the header
    #[must_use]
    pub fn to_grid(&self) -> Vec<Vec<String>> {
        std::iter::once(self.columns.clone())
            .chain(self.rows.iter().cloned())
            .collect()
    }

    /// Append a record, fitting it to the header width
    pub fn push_row(&mut self, mut record: Vec<String>) {
        record.resize(self.columns.len(), String::new());
        self.rows.push(record);
    }

    /// With an extra record (builder)
    #[must_use]
    pub fn with_row<I, S>(mut self, record: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_row(record.into_iter().map(Into::into).collect());
        self
    }

    /// Remove records whose cells are all blank
    pub fn drop_blank_rows(&mut self) {
        self.rows
            .retain(|r| r.iter().any(|cell| !cell.trim().is_empty()));
    }

    /// Header names
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All records
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no records
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, matched case-insensitively
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| column_matches(c, name))
    }

    /// Position of a column, appending it (empty) if missing
    ///
    /// Returns the index and whether the column was created.
    pub fn ensure_column(&mut self, name: &str) -> (usize, bool) {
        if let Some(idx) = self.column_index(name) {
            return (idx, false);
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        (self.columns.len() - 1, true)
    }

    /// Cell text, or `""` when out of range
    #[inline]
    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map_or("", String::as_str)
    }

    /// Overwrite a cell; out-of-range positions are ignored
    pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = value.into();
        }
    }
}

/// Resolved column positions for one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    /// Message column
    pub message: usize,
    /// Identity column
    pub identity: usize,
    /// `place` column
    pub place: usize,
    /// `keywords` column
    pub keywords: usize,
    /// `urgency` column
    pub urgency: usize,
    /// `department` column
    pub department: usize,
    /// Number of output columns created while resolving
    pub created: usize,
}

impl Schema {
    /// Ensure output columns exist and locate every column
    ///
    /// Missing output columns are appended empty. A missing message or
    /// identity column is a [`SchemaError`]; the table is left with the
    /// created output columns in that case.
    ///
    /// # Errors
    /// - `SchemaError::EmptyHeader` if the table has no header
    /// - `SchemaError::MissingColumn` if message or identity is absent
    pub fn resolve(table: &mut Table, config: &SchemaConfig) -> Result<Self, SchemaError> {
        if table.columns().is_empty() {
            return Err(SchemaError::EmptyHeader);
        }

        let mut created = 0;
        let mut ensure = |name: &str| {
            let (idx, added) = table.ensure_column(name);
            created += usize::from(added);
            idx
        };
        let place = ensure(PLACE_COLUMN);
        let keywords = ensure(KEYWORDS_COLUMN);
        let urgency = ensure(URGENCY_COLUMN);
        let department = ensure(DEPARTMENT_COLUMN);

        let message = table
            .column_index(&config.message_column)
            .ok_or_else(|| SchemaError::missing(ColumnRole::Message, &config.message_column))?;
        let identity = table
            .column_index(&config.identity_column)
            .ok_or_else(|| SchemaError::missing(ColumnRole::Identity, &config.identity_column))?;

        Ok(Self {
            message,
            identity,
            place,
            keywords,
            urgency,
            department,
            created,
        })
    }

    /// Identity of a row, trimmed
    #[inline]
    #[must_use]
    pub fn identity<'t>(&self, table: &'t Table, row: usize) -> &'t str {
        table.cell(row, self.identity).trim()
    }

    /// Message of a row
    #[inline]
    #[must_use]
    pub fn message<'t>(&self, table: &'t Table, row: usize) -> &'t str {
        table.cell(row, self.message)
    }

    /// Check if a row already carries a department
    #[inline]
    #[must_use]
    pub fn is_processed(&self, table: &Table, row: usize) -> bool {
        !table.cell(row, self.department).trim().is_empty()
    }

    /// Read the four output cells
    #[must_use]
    pub fn outputs(&self, table: &Table, row: usize) -> RowOutputs {
        RowOutputs {
            place: table.cell(row, self.place).to_string(),
            keywords: table.cell(row, self.keywords).to_string(),
            urgency: table.cell(row, self.urgency).to_string(),
            department: table.cell(row, self.department).to_string(),
        }
    }

    /// Overwrite the four output cells, leaving every other cell alone
    pub fn write_outputs(&self, table: &mut Table, row: usize, outputs: &RowOutputs) {
        table.set_cell(row, self.place, outputs.place.as_str());
        table.set_cell(row, self.keywords, outputs.keywords.as_str());
        table.set_cell(row, self.urgency, outputs.urgency.as_str());
        table.set_cell(row, self.department, outputs.department.as_str());
    }
}
