use once_cell::sync::OnceCell;
use std::fmt;
use std::time::Duration;

use crate::dialect::{Dialect, V7};
use crate::line_data::LineData;
use crate::LineType;

/// One line of client log text.
///
/// Type, timestamp and data are derived from the raw text on first access
/// and memoized, so a line nobody inspects costs nothing beyond its text.
#[derive(Clone)]
pub struct LogLine {
    index: u64,
    raw: String,
    dialect: &'static dyn Dialect,
    line_type: OnceCell<LineType>,
    timestamp: OnceCell<Option<Duration>>,
    data: OnceCell<LineData>,
}

impl LogLine {
    /// Create a line interpreted by the v7 dialect.
    pub fn new(index: u64, raw: impl Into<String>) -> Self {
        Self::with_dialect(index, raw, &V7)
    }

    pub fn with_dialect(index: u64, raw: impl Into<String>, dialect: &'static dyn Dialect) -> Self {
        Self {
            index,
            raw: raw.into(),
            dialect,
            line_type: OnceCell::new(),
            timestamp: OnceCell::new(),
            data: OnceCell::new(),
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    pub fn line_type(&self) -> LineType {
        *self.line_type.get_or_init(|| self.dialect.classify(&self.raw))
    }

    /// Time of day the line was written.
    pub fn timestamp(&self) -> Option<Duration> {
        *self
            .timestamp
            .get_or_init(|| self.dialect.parse_timestamp(&self.raw))
    }

    pub fn data(&self) -> &LineData {
        self.data
            .get_or_init(|| self.dialect.parse_data(self.line_type(), &self.raw))
    }

    /// True when the line's type implies data that could not be parsed.
    pub fn is_parse_error(&self) -> bool {
        self.data().is_error()
    }

    pub(crate) fn set_index(&mut self, index: u64) {
        self.index = index;
    }
}

impl fmt::Debug for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogLine")
            .field("index", &self.index)
            .field("raw", &self.raw)
            .field("line_type", &self.line_type.get())
            .finish()
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
