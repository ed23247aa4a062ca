//! Core data model for sampled tables.
//!
//! Readers load every supported format into a [`RawTable`]: ordered column names plus rows of
//! raw cell text. Nothing is coerced at read time; typing is the job of
//! [`crate::inference`] and [`crate::validation`].

/// In-memory tabular data with every cell kept as text.
///
/// Rows are stored as `Vec<Vec<Option<String>>>` in the same order as [`RawTable::columns`].
/// Empty or whitespace-only cells are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawTable {
    /// Column names in file order.
    pub columns: Vec<String>,
    /// Row-major cell storage.
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Create a table from column names and rows.
    ///
    /// Rows shorter than the header are padded with `None`; longer rows are truncated.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Number of rows in the table.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns in the table.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the index of a column by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate the cells of one column, top to bottom.
    pub fn column_cells(&self, idx: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(idx).and_then(|c| c.as_deref()))
    }

    /// Non-null cells of one column, top to bottom.
    pub fn non_null_values(&self, idx: usize) -> Vec<&str> {
        self.column_cells(idx).flatten().collect()
    }

    /// Number of null cells in one column.
    pub fn null_count(&self, idx: usize) -> usize {
        self.column_cells(idx).filter(|c| c.is_none()).count()
    }
}

/// Normalize a raw cell: trim, and map empty text to `None`.
pub(crate) fn normalize_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}
