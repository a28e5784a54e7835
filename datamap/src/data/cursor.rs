//! Forward-only result cursors
//!
//! The storage driver owns the real cursor; the mapper only needs to step
//! through rows, read raw cells and release the cursor when done.

use std::collections::VecDeque;

/// Boxed driver error carried through the mapper unchanged
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Raw row cursor exposed by a storage driver
pub trait Cursor {
    /// Column names of the result set, in row order
    fn columns(&self) -> Result<Vec<String>, BoxError>;

    /// Step to the next row. `false` once exhausted or failed.
    fn advance(&mut self) -> bool;

    /// Raw cells of the current row; `None` is a database NULL
    fn values(&mut self) -> Result<Vec<Option<Vec<u8>>>, BoxError>;

    /// Error that stopped iteration, if any
    fn take_error(&mut self) -> Option<BoxError>;

    /// Release the underlying resource
    fn close(&mut self) -> Result<(), BoxError>;
}

/// In-memory cursor over owned rows
///
/// Used by the CLI to feed rows read from JSON, and by tests. An optional
/// terminal error is reported once the rows run out.
#[derive(Debug, Default)]
pub struct MemoryCursor {
    columns: Vec<String>,
    rows: VecDeque<Vec<Option<String>>>,
    current: Option<Vec<Option<String>>>,
    error: Option<String>,
    close_count: usize,
}

impl MemoryCursor {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            ..Default::default()
        }
    }

    /// Convenience constructor for literal fixtures
    pub fn from_rows(columns: &[&str], rows: &[&[Option<&str>]]) -> Self {
        Self::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|cell| cell.map(str::to_string)).collect())
                .collect(),
        )
    }

    /// Report `message` as the driver error once the rows run out
    pub fn with_error(mut self, message: &str) -> Self {
        self.error = Some(message.to_string());
        self
    }

    pub fn is_closed(&self) -> bool {
        self.close_count > 0
    }

    pub fn close_count(&self) -> usize {
        self.close_count
    }

    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl Cursor for MemoryCursor {
    fn columns(&self) -> Result<Vec<String>, BoxError> {
        Ok(self.columns.clone())
    }

    fn advance(&mut self) -> bool {
        if self.is_closed() {
            self.current = None;
            return false;
        }
        self.current = self.rows.pop_front();
        self.current.is_some()
    }

    fn values(&mut self) -> Result<Vec<Option<Vec<u8>>>, BoxError> {
        let row = self.current.as_ref().ok_or("no current row")?;
        if row.len() != self.columns.len() {
            return Err(format!(
                "row has {} values but result set has {} columns",
                row.len(),
                self.columns.len()
            )
            .into());
        }
        Ok(row
            .iter()
            .map(|cell| cell.as_ref().map(|s| s.as_bytes().to_vec()))
            .collect())
    }

    fn take_error(&mut self) -> Option<BoxError> {
        if !self.rows.is_empty() {
            return None;
        }
        self.error.take().map(BoxError::from)
    }

    fn close(&mut self) -> Result<(), BoxError> {
        self.close_count += 1;
        self.rows.clear();
        self.current = None;
        Ok(())
    }
}
