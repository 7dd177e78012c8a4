//! # foldlog-core
//!
//! Streaming parser for folding client logs.
//!
//! Lines are read one at a time, classified, and filed into a tree of
//! client runs, slot runs and unit runs while the stream is still being
//! read. Each node replays its lines on demand to produce derived data.
//!
//! ## Key Types
//!
//! - [`FoldingLog`] - Builds the run tree from a line source
//! - [`LogLine`] - One line with lazily parsed type, timestamp and data
//! - [`Dialect`] - Classifier and data parsers for one client version
//! - [`ClientRun`], [`SlotRun`], [`UnitRun`] - Run tree nodes
//!
//! ## Example
//!
//! ```
//! use foldlog_core::FoldingLog;
//!
//! let log = FoldingLog::from_text("10:00:00:WU00:FS00:Starting\n10:00:05:WU00:FS00:Cleaning up\n");
//! let unit = &log.client_runs()[0].slot_runs()[0].unit_runs()[0];
//! assert!(unit.is_complete());
//! ```

mod aggregate;
mod dialect;
mod error;
mod line_data;
mod line_type;
mod log;
mod log_line;
mod parsers;
mod reader;
mod run;

pub use aggregate::{rollover_delta, ClientRunData, SlotRunData, UnitRunData};
pub use dialect::{Dialect, V7Dialect, V7};
pub use error::{LogError, Result};
pub use line_data::{
    format_elapsed, format_time_of_day, FrameSample, LineData, LineParseError, ProjectInfo,
    UnitResult,
};
pub use line_type::LineType;
pub use log::FoldingLog;
pub use log_line::LogLine;
pub use parsers::UnitTag;
pub use reader::{AsyncLogReader, LogReader};
pub use run::{ClientRun, SlotRun, UnitRun};
