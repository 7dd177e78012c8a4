//! Line sources: number raw text lines read from a blocking or async stream.

use std::io::{self, BufRead};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::dialect::{Dialect, V7};
use crate::log_line::LogLine;

/// Blocking line source over any [`BufRead`].
pub struct LogReader<R> {
    inner: R,
    dialect: &'static dyn Dialect,
    next_index: u64,
    buf: Vec<u8>,
}

impl<R: BufRead> LogReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_dialect(inner, &V7)
    }

    pub fn with_dialect(inner: R, dialect: &'static dyn Dialect) -> Self {
        Self {
            inner,
            dialect,
            next_index: 0,
            buf: Vec::new(),
        }
    }

    /// Read the next line, or `None` at end of stream.
    pub fn read_line(&mut self) -> io::Result<Option<LogLine>> {
        self.buf.clear();
        if self.inner.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(self.take_line()))
    }

    /// Index the next line will be given.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    fn take_line(&mut self) -> LogLine {
        let line = LogLine::with_dialect(self.next_index, decode(&self.buf), self.dialect);
        self.next_index += 1;
        line
    }
}

impl<R: BufRead> Iterator for LogReader<R> {
    type Item = io::Result<LogLine>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_line().transpose()
    }
}

/// Async line source over any tokio [`AsyncBufRead`]. Yields exactly the
/// lines [`LogReader`] would for the same bytes.
pub struct AsyncLogReader<R> {
    inner: R,
    dialect: &'static dyn Dialect,
    next_index: u64,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> AsyncLogReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_dialect(inner, &V7)
    }

    pub fn with_dialect(inner: R, dialect: &'static dyn Dialect) -> Self {
        Self {
            inner,
            dialect,
            next_index: 0,
            buf: Vec::new(),
        }
    }

    pub async fn read_line(&mut self) -> io::Result<Option<LogLine>> {
        self.buf.clear();
        if self.inner.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }
        let line = LogLine::with_dialect(self.next_index, decode(&self.buf), self.dialect);
        self.next_index += 1;
        Ok(Some(line))
    }

    pub fn next_index(&self) -> u64 {
        self.next_index
    }
}

/// Strip the line terminator and decode, replacing invalid UTF-8.
fn decode(bytes: &[u8]) -> String {
    let mut end = bytes.len();
    if end > 0 && bytes[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && bytes[end - 1] == b'\r' {
        end -= 1;
    }
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
