//! Forward-only result cursors.

use crate::error::{MapError, MapResult};
use crate::value::DbValue;

/// A forward-only, single-pass result set positioned on one row at a time.
///
/// A fresh cursor is positioned before the first row; [`advance`](Self::advance) moves to
/// the next row and reports whether one exists.
pub trait ResultCursor {
    fn advance(&mut self) -> MapResult<bool>;

    fn field_count(&self) -> usize;

    fn field_name(&self, ordinal: usize) -> &str;

    /// Value at `ordinal` in the current row.
    fn value(&self, ordinal: usize) -> MapResult<DbValue>;

    /// Case-insensitive ordinal lookup.
    fn ordinal(&self, name: &str) -> Option<usize> {
        (0..self.field_count()).find(|&i| self.field_name(i).eq_ignore_ascii_case(name))
    }

    fn has_column(&self, name: &str) -> bool {
        self.ordinal(name).is_some()
    }
}

impl<T: ResultCursor + ?Sized> ResultCursor for &mut T {
    fn advance(&mut self) -> MapResult<bool> {
        (**self).advance()
    }

    fn field_count(&self) -> usize {
        (**self).field_count()
    }

    fn field_name(&self, ordinal: usize) -> &str {
        (**self).field_name(ordinal)
    }

    fn value(&self, ordinal: usize) -> MapResult<DbValue> {
        (**self).value(ordinal)
    }
}

/// In-memory cursor over column names and rows of [`DbValue`].
#[derive(Debug, Clone, Default)]
pub struct MemoryCursor {
    columns: Vec<String>,
    rows: Vec<Vec<DbValue>>,
    position: Option<usize>,
}

impl MemoryCursor {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            position: None,
        }
    }

    /// Append a row. Missing trailing values read as null.
    pub fn row(mut self, values: impl IntoIterator<Item = DbValue>) -> Self {
        self.push_row(values);
        self
    }

    pub fn push_row(&mut self, values: impl IntoIterator<Item = DbValue>) {
        self.rows.push(values.into_iter().collect());
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rewind to before the first row.
    pub fn reset(&mut self) {
        self.position = None;
    }
}

impl ResultCursor for MemoryCursor {
    fn advance(&mut self) -> MapResult<bool> {
        let next = self.position.map_or(0, |p| p + 1);
        if next < self.rows.len() {
            self.position = Some(next);
            Ok(true)
        } else {
            self.position = Some(self.rows.len());
            Ok(false)
        }
    }

    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn field_name(&self, ordinal: usize) -> &str {
        self.columns.get(ordinal).map_or("", String::as_str)
    }

    fn value(&self, ordinal: usize) -> MapResult<DbValue> {
        if ordinal >= self.columns.len() {
            return Err(MapError::Other(format!(
                "ordinal {ordinal} is out of range for {} columns",
                self.columns.len()
            )));
        }
        let row = self
            .position
            .and_then(|p| self.rows.get(p))
            .ok_or_else(|| MapError::Other("cursor is not positioned on a row".to_string()))?;
        Ok(row.get(ordinal).cloned().unwrap_or(DbValue::Null))
    }
}

/// Build a row of [`DbValue`]s from anything convertible into one.
///
/// ```ignore
/// let cursor = MemoryCursor::new(["ID", "Name"]).row(row![1, "Ann"]);
/// ```
#[macro_export]
macro_rules! row {
    () => {
        ::std::vec::Vec::<$crate::DbValue>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::DbValue::from($value)),+]
    };
}
