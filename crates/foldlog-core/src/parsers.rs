//! Text patterns and the per-type data parsers of the v7 client dialect.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::time::Duration;
use tracing::debug;

use crate::line_data::{FrameSample, LineData, LineParseError, ProjectInfo, UnitResult};
use crate::LineType;

static TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[?(?P<timestamp>\d{2}:\d{2}:\d{2})[\]|:]").expect("valid pattern")
});

static UNIT_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<timestamp>\d{2}:\d{2}:\d{2}):(?:.+:)?WU(?P<queue>\d{2}):FS(?P<slot>\d{2}):",
    )
    .expect("valid pattern")
});

static LOG_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*{23} Log Started (?P<start>.+) \*+").expect("valid pattern")
});

static PROJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\[?\d{2}:\d{2}:\d{2}[\]|:].*Project: (?P<project>\d+) \(Run (?P<run>\d+), Clone (?P<clone>\d+), Gen (?P<gen>\d+)\)",
    )
    .expect("valid pattern")
});

static CORE_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[?\d{2}:\d{2}:\d{2}[\]|:].*Version:?\s+(?P<version>\d+\.\d+(?:\.\d+)?)")
        .expect("valid pattern")
});

static FRAME_STEPS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\[?(?P<timestamp>\d{2}:\d{2}:\d{2})[\]|:].*Completed (?P<completed>.*) out of (?P<total>.*) steps {1,2}\((?P<percent>.*)%\)",
    )
    .expect("valid pattern")
});

static FRAME_PERCENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[?(?P<timestamp>\d{2}:\d{2}:\d{2})[\]|:].*Completed (?P<percent>[0-9]{1,3})%")
        .expect("valid pattern")
});

static PERCENT_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<percent>[0-9]{1,3})").expect("valid pattern"));

static CORE_SHUTDOWN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[?\d{2}:\d{2}:\d{2}[\]|:].*Folding@home Core Shutdown: (?P<result>.*)")
        .expect("valid pattern")
});

static CORE_RETURN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{2}:\d{2}:\d{2}:(?:.+:)?WU\d{2}:FS\d{2}:FahCore returned: (?P<result>\w+)")
        .expect("valid pattern")
});

static PLATFORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Platform:\s*(?P<platform>[A-Za-z][A-Za-z0-9_.\-]*)").expect("valid pattern")
});

/// Percent and step-derived percent may differ by at most this much.
const FRAME_PERCENT_TOLERANCE: f64 = 0.1;

const LEGACY_LOG_OPEN_FORMAT: &str = "%d/%b/%Y-%H:%M:%S";

/// Queue index and folding slot carried by a work unit scoped line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitTag {
    pub queue_index: u8,
    pub folding_slot: u32,
}

pub(crate) fn parse_unit_tag(raw: &str) -> Option<UnitTag> {
    let caps = UNIT_TAG.captures(raw)?;
    Some(UnitTag {
        queue_index: caps["queue"].parse().ok()?,
        folding_slot: caps["slot"].parse().ok()?,
    })
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<Duration> {
    let caps = TIMESTAMP.captures(raw)?;
    time_of_day(&caps["timestamp"])
}

/// Parse `HH:MM:SS` into an offset from midnight.
pub(crate) fn time_of_day(text: &str) -> Option<Duration> {
    let mut parts = text.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || hours >= 24 || minutes >= 60 || seconds >= 60 {
        return None;
    }
    Some(Duration::from_secs(hours * 3600 + minutes * 60 + seconds))
}

/// Dispatch a line to the parser registered for its type.
pub(crate) fn parse_line_data(line_type: LineType, raw: &str) -> LineData {
    let parsed = match line_type {
        LineType::LogOpen => return parse_log_open(raw).map_or(LineData::None, LineData::LogOpened),
        LineType::WorkUnitProject => parse_project(raw).map(LineData::Project),
        LineType::WorkUnitFrame => parse_frame(raw).map(LineData::Frame),
        LineType::WorkUnitCoreVersion => parse_core_version(raw).map(LineData::CoreVersion),
        LineType::WorkUnitCoreShutdown => parse_core_shutdown(raw).map(LineData::UnitResult),
        LineType::WorkUnitCoreReturn => parse_core_return(raw).map(LineData::UnitResult),
        LineType::WorkUnitPlatform => parse_platform(raw).map(LineData::Platform),
        _ => return LineData::None,
    };

    match parsed {
        Ok(data) => data,
        Err(e) => {
            debug!(line_type = %line_type, error = %e, "Failed to parse line data");
            LineData::Error(e)
        }
    }
}

/// Start time from the log banner. Older clients may not write a parseable
/// date, so a failure here yields `None` rather than an error.
pub(crate) fn parse_log_open(raw: &str) -> Option<DateTime<Utc>> {
    let caps = LOG_OPEN.captures(raw)?;
    let text = caps["start"].trim();

    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&t));
        }
    }
    NaiveDateTime::parse_from_str(text, LEGACY_LOG_OPEN_FORMAT)
        .ok()
        .map(|t| Utc.from_utc_datetime(&t))
}

pub(crate) fn parse_project(raw: &str) -> Result<ProjectInfo, LineParseError> {
    let caps = PROJECT
        .captures(raw)
        .ok_or(LineParseError::NoMatch(LineType::WorkUnitProject))?;
    Ok(ProjectInfo {
        id: caps["project"].parse()?,
        run: caps["run"].parse()?,
        clone: caps["clone"].parse()?,
        gen: caps["gen"].parse()?,
    })
}

/// Frame lines come in two shapes: step counts with a percent, or a bare
/// percent (GPU cores). The frame id is the percent in both cases.
pub(crate) fn parse_frame(raw: &str) -> Result<FrameSample, LineParseError> {
    if let Some(caps) = FRAME_STEPS.captures(raw) {
        return frame_from_steps(&caps);
    }
    if let Some(caps) = FRAME_PERCENT.captures(raw) {
        let percent = frame_percent(&caps["percent"])?;
        return Ok(FrameSample {
            id: percent,
            raw_complete: u64::from(percent),
            raw_total: 100,
            timestamp: frame_timestamp(&caps),
            duration: Duration::ZERO,
        });
    }
    Err(LineParseError::NoMatch(LineType::WorkUnitFrame))
}

fn frame_from_steps(caps: &Captures<'_>) -> Result<FrameSample, LineParseError> {
    let completed: u64 = caps["completed"].trim().parse()?;
    let total: u64 = caps["total"].trim().parse()?;
    let percent_caps = PERCENT_VALUE
        .captures(&caps["percent"])
        .ok_or(LineParseError::NoMatch(LineType::WorkUnitFrame))?;
    let percent = frame_percent(&percent_caps["percent"])?;

    if total == 0 {
        return Err(LineParseError::ZeroTotal);
    }
    let calculated = completed as f64 / total as f64 * 100.0;
    if (calculated - f64::from(percent)).abs() > FRAME_PERCENT_TOLERANCE {
        return Err(LineParseError::OutOfTolerance {
            completed,
            total,
            percent,
        });
    }

    Ok(FrameSample {
        id: percent,
        raw_complete: completed,
        raw_total: total,
        timestamp: frame_timestamp(caps),
        duration: Duration::ZERO,
    })
}

fn frame_percent(text: &str) -> Result<u8, LineParseError> {
    let percent: u32 = text.parse()?;
    u8::try_from(percent)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or(LineParseError::PercentOutOfRange(percent))
}

fn frame_timestamp(caps: &Captures<'_>) -> Duration {
    time_of_day(&caps["timestamp"]).unwrap_or_default()
}

pub(crate) fn parse_core_version(raw: &str) -> Result<String, LineParseError> {
    CORE_VERSION
        .captures(raw)
        .map(|caps| caps["version"].trim().to_string())
        .ok_or(LineParseError::NoMatch(LineType::WorkUnitCoreVersion))
}

pub(crate) fn parse_core_shutdown(raw: &str) -> Result<UnitResult, LineParseError> {
    let caps = CORE_SHUTDOWN
        .captures(raw)
        .ok_or(LineParseError::NoMatch(LineType::WorkUnitCoreShutdown))?;
    let token = caps["result"].replace('\r', "");
    if token.trim().is_empty() {
        return Err(LineParseError::NoMatch(LineType::WorkUnitCoreShutdown));
    }
    Ok(UnitResult::from_token(&token))
}

pub(crate) fn parse_core_return(raw: &str) -> Result<UnitResult, LineParseError> {
    CORE_RETURN
        .captures(raw)
        .map(|caps| UnitResult::from_token(&caps["result"]))
        .ok_or(LineParseError::NoMatch(LineType::WorkUnitCoreReturn))
}

pub(crate) fn parse_platform(raw: &str) -> Result<String, LineParseError> {
    PLATFORM
        .captures(raw)
        .map(|caps| caps["platform"].to_string())
        .ok_or(LineParseError::NoMatch(LineType::WorkUnitPlatform))
}
