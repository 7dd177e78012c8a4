use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::num::ParseIntError;
use std::time::Duration;
use thiserror::Error;

use crate::LineType;

/// Data parsed from the text of a [`LogLine`](crate::LogLine).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LineData {
    /// The line type carries no data
    #[default]
    None,
    /// The line type should carry data but the text could not be parsed
    Error(LineParseError),
    Project(ProjectInfo),
    Frame(FrameSample),
    CoreVersion(String),
    UnitResult(UnitResult),
    Platform(String),
    LogOpened(DateTime<Utc>),
}

impl LineData {
    pub fn is_error(&self) -> bool {
        matches!(self, LineData::Error(_))
    }
}

impl fmt::Display for LineData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineData::None => Ok(()),
            LineData::Error(e) => write!(f, "parse error: {}", e),
            LineData::Project(p) => write!(f, "{}", p),
            LineData::Frame(frame) => write!(f, "{}", frame),
            LineData::CoreVersion(v) => f.write_str(v),
            LineData::UnitResult(r) => write!(f, "{}", r),
            LineData::Platform(p) => f.write_str(p),
            LineData::LogOpened(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

/// Reasons a typed line failed to yield its data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineParseError {
    #[error("no {0} data found in line")]
    NoMatch(LineType),

    #[error("invalid number: {0}")]
    InvalidNumber(#[from] ParseIntError),

    #[error("completed {completed} of {total} steps does not match {percent}%")]
    OutOfTolerance {
        completed: u64,
        total: u64,
        percent: u8,
    },

    #[error("frame step total is zero")]
    ZeroTotal,

    #[error("frame percent {0} is above 100")]
    PercentOutOfRange(u32),
}

/// Project, run, clone and gen identifying a unit of work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ProjectInfo {
    pub id: u32,
    pub run: u32,
    pub clone: u32,
    pub gen: u32,
}

impl fmt::Display for ProjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P{} (R{}, C{}, G{})",
            self.id, self.run, self.clone, self.gen
        )
    }
}

/// One frame (percent complete) progress sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameSample {
    /// Percent marker, 0 - 100
    pub id: u8,
    pub raw_complete: u64,
    pub raw_total: u64,
    /// Time of day the frame was logged
    #[serde(serialize_with = "duration_secs")]
    pub timestamp: Duration,
    /// Time since the preceding frame; zero when there is none
    #[serde(serialize_with = "duration_secs")]
    pub duration: Duration,
}

impl fmt::Display for FrameSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {} ({} of {}) at {}, took {}",
            self.id,
            self.raw_complete,
            self.raw_total,
            format_time_of_day(self.timestamp),
            format_elapsed(self.duration)
        )
    }
}

/// Terminal outcome token reported for a work unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UnitResult {
    FinishedUnit,
    EarlyUnitEnd,
    UnstableMachine,
    Interrupted,
    BadWorkUnit,
    UnknownEnum,
    CoreRestart,
    BadFrameChecksum,
    /// Any token this library does not recognize
    Unknown(String),
}

impl UnitResult {
    pub fn from_token(token: &str) -> Self {
        match token.trim() {
            "FINISHED_UNIT" => UnitResult::FinishedUnit,
            "EARLY_UNIT_END" => UnitResult::EarlyUnitEnd,
            "UNSTABLE_MACHINE" => UnitResult::UnstableMachine,
            "INTERRUPTED" => UnitResult::Interrupted,
            "BAD_WORK_UNIT" => UnitResult::BadWorkUnit,
            "UNKNOWN_ENUM" => UnitResult::UnknownEnum,
            "CORE_RESTART" => UnitResult::CoreRestart,
            "BAD_FRAME_CHECKSUM" => UnitResult::BadFrameChecksum,
            other => UnitResult::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            UnitResult::FinishedUnit => "FINISHED_UNIT",
            UnitResult::EarlyUnitEnd => "EARLY_UNIT_END",
            UnitResult::UnstableMachine => "UNSTABLE_MACHINE",
            UnitResult::Interrupted => "INTERRUPTED",
            UnitResult::BadWorkUnit => "BAD_WORK_UNIT",
            UnitResult::UnknownEnum => "UNKNOWN_ENUM",
            UnitResult::CoreRestart => "CORE_RESTART",
            UnitResult::BadFrameChecksum => "BAD_FRAME_CHECKSUM",
            UnitResult::Unknown(token) => token,
        }
    }

    /// Results counted as a failed unit on the slot.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            UnitResult::EarlyUnitEnd | UnitResult::UnstableMachine | UnitResult::BadWorkUnit
        )
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, UnitResult::FinishedUnit)
    }

    /// Results after which the observed frame count starts over.
    pub fn resets_frames_observed(&self) -> bool {
        matches!(
            self,
            UnitResult::Interrupted
                | UnitResult::UnknownEnum
                | UnitResult::Unknown(_)
                | UnitResult::CoreRestart
        )
    }
}

impl fmt::Display for UnitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for UnitResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Format a time-of-day offset as `HH:MM:SS`.
pub fn format_time_of_day(time: Duration) -> String {
    let secs = time.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Format an elapsed duration as `1h 2m 3s`, `2m 3s` or `3s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs / 60) % 60, secs % 60)
    }
}

pub(crate) fn duration_secs<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    duration.as_secs_f64().serialize(serializer)
}

pub(crate) fn option_duration_secs<S>(
    duration: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    duration.map(|d| d.as_secs_f64()).serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_result_tokens() {
        assert_eq!(UnitResult::from_token("FINISHED_UNIT"), UnitResult::FinishedUnit);
        assert_eq!(UnitResult::from_token("CORE_RESTART "), UnitResult::CoreRestart);
        assert_eq!(
            UnitResult::from_token("GPU_MEMTEST_ERROR"),
            UnitResult::Unknown("GPU_MEMTEST_ERROR".to_string())
        );
        assert_eq!(UnitResult::from_token("GPU_MEMTEST_ERROR").as_str(), "GPU_MEMTEST_ERROR");
    }

    #[test]
    fn test_unit_result_failure_set() {
        assert!(UnitResult::EarlyUnitEnd.is_failure());
        assert!(UnitResult::UnstableMachine.is_failure());
        assert!(UnitResult::BadWorkUnit.is_failure());
        assert!(!UnitResult::BadFrameChecksum.is_failure());
        assert!(!UnitResult::Interrupted.is_failure());
        assert!(!UnitResult::CoreRestart.is_failure());
        assert!(!UnitResult::FinishedUnit.is_failure());
    }

    #[test]
    fn test_unit_result_serializes_as_token() {
        let json = serde_json::to_string(&UnitResult::BadFrameChecksum).unwrap();
        assert_eq!(json, "\"BAD_FRAME_CHECKSUM\"");
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_time_of_day(Duration::from_secs(3 * 3600 + 4 * 60 + 5)), "03:04:05");
        assert_eq!(format_elapsed(Duration::from_secs(42)), "42s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_elapsed(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
