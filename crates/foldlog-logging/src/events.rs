use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::PathBuf;

/// Events reported while summarizing a parsed log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReportEvent {
    ClientRunStarted {
        /// 1-based position of the run in the log
        run: usize,
        start_index: u64,
        start_time: Option<DateTime<Utc>>,
    },
    SlotRunSummary {
        folding_slot: u32,
        unit_runs: usize,
        completed_units: u32,
        failed_units: u32,
    },
    UnitRunSummary {
        folding_slot: u32,
        queue_index: u8,
        start_index: u64,
        end_index: Option<u64>,
        is_complete: bool,
        unit_start: Option<String>,
        project: Option<String>,
        core_version: Option<String>,
        platform: Option<String>,
        result: Option<String>,
        frames_observed: u32,
        frames_recorded: usize,
        average_frame_secs: Option<f64>,
    },
    Frame {
        folding_slot: u32,
        queue_index: u8,
        id: u8,
        raw_complete: u64,
        raw_total: u64,
        timestamp: String,
        duration_secs: f64,
    },
    Line {
        index: u64,
        line_type: String,
        data: Option<String>,
        parse_error: bool,
        raw: String,
    },
    ReadCompleted {
        path: PathBuf,
        lines: u64,
        client_runs: usize,
        parse_errors: usize,
        duration_secs: f64,
    },
}

/// Report output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Renders report events to a writer (stdout unless told otherwise)
pub struct Reporter<W: Write = io::Stdout> {
    format: LogFormat,
    out: W,
}

impl Reporter<io::Stdout> {
    pub fn stdout(format: LogFormat) -> Self {
        Self::new(format, io::stdout())
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(format: LogFormat, out: W) -> Self {
        Self { format, out }
    }

    pub fn report(&mut self, event: &ReportEvent) -> io::Result<()> {
        match self.format {
            LogFormat::Json => self.report_json(event),
            LogFormat::Pretty => self.report_pretty(event),
            LogFormat::Compact => self.report_compact(event),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn report_json(&mut self, event: &ReportEvent) -> io::Result<()> {
        let json = serde_json::to_string(event)?;
        writeln!(self.out, "{}", json)
    }

    fn report_pretty(&mut self, event: &ReportEvent) -> io::Result<()> {
        let out = &mut self.out;
        match event {
            ReportEvent::ClientRunStarted {
                run,
                start_index,
                start_time,
            } => {
                let started = start_time
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                writeln!(out)?;
                writeln!(
                    out,
                    "{} {}",
                    format!("Client run {}", run).bright_blue().bold(),
                    format!("(line {})", start_index).dimmed()
                )?;
                writeln!(out, "  {} {}", "Started:".dimmed(), started)?;
            }
            ReportEvent::SlotRunSummary {
                folding_slot,
                unit_runs,
                completed_units,
                failed_units,
            } => {
                writeln!(out)?;
                writeln!(
                    out,
                    "  {} {}  {} {}  {} {}  {} {}",
                    "▶".bright_cyan(),
                    format!("Slot {:02}", folding_slot).bright_cyan().bold(),
                    "Units:".dimmed(),
                    unit_runs,
                    "Completed:".dimmed(),
                    completed_units.to_string().bright_green(),
                    "Failed:".dimmed(),
                    if *failed_units > 0 {
                        failed_units.to_string().bright_red()
                    } else {
                        failed_units.to_string().normal()
                    }
                )?;
            }
            ReportEvent::UnitRunSummary {
                queue_index,
                start_index,
                end_index,
                is_complete,
                unit_start,
                project,
                core_version,
                platform,
                result,
                frames_observed,
                frames_recorded,
                average_frame_secs,
                ..
            } => {
                let span = match end_index {
                    Some(end) => format!("lines {}-{}", start_index, end),
                    None => format!("lines {}-", start_index),
                };
                let status = if *is_complete {
                    "✓".bright_green()
                } else {
                    "…".bright_yellow()
                };
                writeln!(
                    out,
                    "    {} {} {}",
                    status,
                    format!("WU{:02}", queue_index).bold(),
                    span.dimmed()
                )?;
                if let Some(start) = unit_start {
                    writeln!(out, "      {} {}", "Started:".dimmed(), start)?;
                }
                if let Some(project) = project {
                    writeln!(out, "      {} {}", "Project:".dimmed(), project)?;
                }
                if let Some(version) = core_version {
                    writeln!(out, "      {} {}", "Core:".dimmed(), version)?;
                }
                if let Some(platform) = platform {
                    writeln!(out, "      {} {}", "Platform:".dimmed(), platform)?;
                }
                let styled_result = match result.as_deref() {
                    Some("FINISHED_UNIT") => "FINISHED_UNIT".bright_green(),
                    Some(r @ ("EARLY_UNIT_END" | "UNSTABLE_MACHINE" | "BAD_WORK_UNIT")) => {
                        r.bright_red()
                    }
                    Some(r) => r.bright_yellow(),
                    None => "-".dimmed(),
                };
                writeln!(out, "      {} {}", "Result:".dimmed(), styled_result)?;
                let average = average_frame_secs
                    .map(|secs| format!(", {:.0}s per frame", secs))
                    .unwrap_or_default();
                writeln!(
                    out,
                    "      {} {} observed, {} recorded{}",
                    "Frames:".dimmed(),
                    frames_observed,
                    frames_recorded,
                    average
                )?;
            }
            ReportEvent::Frame {
                id,
                raw_complete,
                raw_total,
                timestamp,
                duration_secs,
                ..
            } => {
                writeln!(
                    out,
                    "        {} {:>3}%  {:>10} / {:<10} {}",
                    timestamp.dimmed(),
                    id,
                    raw_complete,
                    raw_total,
                    format!("+{:.0}s", duration_secs).dimmed()
                )?;
            }
            ReportEvent::Line {
                index,
                line_type,
                data,
                parse_error,
                raw,
            } => {
                let styled_type = if *parse_error {
                    line_type.bright_red()
                } else if line_type == "None" {
                    line_type.dimmed()
                } else {
                    line_type.bright_cyan()
                };
                writeln!(
                    out,
                    "{} {:<28} {}",
                    format!("{:>6}", index).dimmed(),
                    styled_type,
                    raw
                )?;
                if let Some(data) = data {
                    let marker = if *parse_error { "✗".bright_red() } else { "→".dimmed() };
                    writeln!(out, "{:>6} {} {}", "", marker, data)?;
                }
            }
            ReportEvent::ReadCompleted {
                path,
                lines,
                client_runs,
                parse_errors,
                duration_secs,
            } => {
                writeln!(out)?;
                writeln!(
                    out,
                    "{} {}",
                    "Read".bright_green().bold(),
                    path.display().to_string().bright_white()
                )?;
                writeln!(
                    out,
                    "  {} {}  {} {}  {} {}  {} {:.2}s",
                    "Lines:".dimmed(),
                    lines,
                    "Client runs:".dimmed(),
                    client_runs,
                    "Parse errors:".dimmed(),
                    if *parse_errors > 0 {
                        parse_errors.to_string().bright_red()
                    } else {
                        parse_errors.to_string().normal()
                    },
                    "Took:".dimmed(),
                    duration_secs
                )?;
            }
        }
        Ok(())
    }

    fn report_compact(&mut self, event: &ReportEvent) -> io::Result<()> {
        let msg = match event {
            ReportEvent::ClientRunStarted {
                run,
                start_index,
                start_time,
            } => format!(
                "client:{} line={} start={}",
                run,
                start_index,
                start_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string())
            ),
            ReportEvent::SlotRunSummary {
                folding_slot,
                unit_runs,
                completed_units,
                failed_units,
            } => format!(
                "slot:{:02} units={} completed={} failed={}",
                folding_slot, unit_runs, completed_units, failed_units
            ),
            ReportEvent::UnitRunSummary {
                folding_slot,
                queue_index,
                start_index,
                end_index,
                is_complete,
                project,
                result,
                frames_observed,
                ..
            } => format!(
                "unit:{:02}:{:02} lines={}-{} complete={} project={} result={} frames={}",
                folding_slot,
                queue_index,
                start_index,
                end_index.map(|e| e.to_string()).unwrap_or_default(),
                is_complete,
                project.as_deref().unwrap_or("-"),
                result.as_deref().unwrap_or("-"),
                frames_observed
            ),
            ReportEvent::Frame {
                folding_slot,
                queue_index,
                id,
                timestamp,
                duration_secs,
                ..
            } => format!(
                "frame:{:02}:{:02}:{} at={} +{:.0}s",
                folding_slot, queue_index, id, timestamp, duration_secs
            ),
            ReportEvent::Line {
                index,
                line_type,
                parse_error,
                raw,
                ..
            } => {
                let flag = if *parse_error { "!" } else { "" };
                format!("{}:{}{} {}", index, line_type, flag, raw)
            }
            ReportEvent::ReadCompleted {
                path,
                lines,
                client_runs,
                parse_errors,
                duration_secs,
            } => format!(
                "read:{} lines={} runs={} errors={} {:.2}s",
                path.display(),
                lines,
                client_runs,
                parse_errors,
                duration_secs
            ),
        };
        writeln!(self.out, "{}", msg)
    }
}
