use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use foldlog_core::{
    format_time_of_day, ClientRun, ClientRunData, FoldingLog, LineData, LineType, LogLine,
    LogReader, ProjectInfo, SlotRun, SlotRunData, UnitRun, UnitRunData,
};
use foldlog_logging::{LogFormat, ReportEvent, Reporter};

use crate::config::Settings;

/// Read a log and report its client, slot and unit runs.
pub async fn summary(path: &Path, settings: &Settings, json: bool) -> Result<()> {
    let started = Instant::now();
    let log = if settings.async_read {
        FoldingLog::open_async(path).await
    } else {
        FoldingLog::open(path)
    }
    .with_context(|| format!("Failed to read log {}", path.display()))?;
    let elapsed = started.elapsed().as_secs_f64();

    let parse_errors = count_parse_errors(&log);
    info!(
        path = %path.display(),
        lines = log.line_count(),
        client_runs = log.client_runs().len(),
        parse_errors,
        "Log read"
    );

    if json {
        let summary = LogSummary::new(path, &log, parse_errors);
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let mut reporter = Reporter::stdout(settings.output);
    if log.client_runs().is_empty() && settings.output == LogFormat::Pretty {
        println!("{}", "No log lines found.".dimmed());
    }
    for event in summary_events(&log, settings.show_frames) {
        reporter.report(&event)?;
    }
    reporter.report(&ReportEvent::ReadCompleted {
        path: path.to_path_buf(),
        lines: log.line_count(),
        client_runs: log.client_runs().len(),
        parse_errors,
        duration_secs: elapsed,
    })?;
    reporter.flush()?;
    Ok(())
}

/// Print each line with its type and parsed data.
pub fn lines(
    path: &Path,
    settings: &Settings,
    line_type: Option<LineType>,
    errors_only: bool,
) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("Failed to open log {}", path.display()))?;
    let mut reporter = Reporter::stdout(settings.output);

    for line in LogReader::new(BufReader::new(file)) {
        let line = line.with_context(|| format!("Failed to read log {}", path.display()))?;
        if line_type.is_some_and(|t| t != line.line_type()) {
            continue;
        }
        if errors_only && !line.is_parse_error() {
            continue;
        }
        reporter.report(&line_event(&line))?;
    }
    reporter.flush()?;
    Ok(())
}

fn count_parse_errors(log: &FoldingLog) -> usize {
    let mut count = 0;
    for client in log.client_runs() {
        count += client.log_lines().iter().filter(|l| l.is_parse_error()).count();
        for slot in client.slot_runs() {
            for unit in slot.unit_runs() {
                count += unit.log_lines().iter().filter(|l| l.is_parse_error()).count();
            }
        }
    }
    count
}

fn summary_events(log: &FoldingLog, show_frames: bool) -> Vec<ReportEvent> {
    let mut events = Vec::new();
    for (i, client) in log.client_runs().iter().enumerate() {
        events.push(ReportEvent::ClientRunStarted {
            run: i + 1,
            start_index: client.client_start_index(),
            start_time: client.data().start_time,
        });
        for slot in client.slot_runs() {
            let data = slot.data();
            events.push(ReportEvent::SlotRunSummary {
                folding_slot: slot.folding_slot(),
                unit_runs: slot.unit_runs().len(),
                completed_units: data.completed_units,
                failed_units: data.failed_units,
            });
            for unit in slot.unit_runs() {
                events.extend(unit_events(unit, show_frames));
            }
        }
    }
    events
}

fn unit_events(unit: &UnitRun, show_frames: bool) -> Vec<ReportEvent> {
    let data = unit.data();
    let mut events = vec![ReportEvent::UnitRunSummary {
        folding_slot: unit.folding_slot(),
        queue_index: unit.queue_index(),
        start_index: unit.start_index(),
        end_index: unit.end_index(),
        is_complete: unit.is_complete(),
        unit_start: data.unit_start_timestamp.map(format_time_of_day),
        project: (data.project != ProjectInfo::default()).then(|| data.project.to_string()),
        core_version: data.core_version.clone(),
        platform: data.platform.clone(),
        result: data.result.as_ref().map(|r| r.to_string()),
        frames_observed: data.frames_observed,
        frames_recorded: data.frames.len(),
        average_frame_secs: data.average_frame_time().map(|d| d.as_secs_f64()),
    }];

    if show_frames {
        events.extend(data.frames.values().map(|frame| ReportEvent::Frame {
            folding_slot: unit.folding_slot(),
            queue_index: unit.queue_index(),
            id: frame.id,
            raw_complete: frame.raw_complete,
            raw_total: frame.raw_total,
            timestamp: format_time_of_day(frame.timestamp),
            duration_secs: frame.duration.as_secs_f64(),
        }));
    }
    events
}

fn line_event(line: &LogLine) -> ReportEvent {
    let data = match line.data() {
        LineData::None => None,
        data => Some(data.to_string()),
    };
    ReportEvent::Line {
        index: line.index(),
        line_type: line.line_type().to_string(),
        data,
        parse_error: line.is_parse_error(),
        raw: line.raw().to_string(),
    }
}

/// Whole-log summary printed by `summary --json`
#[derive(Debug, Serialize)]
struct LogSummary {
    path: PathBuf,
    lines: u64,
    parse_errors: usize,
    client_runs: Vec<ClientRunSummary>,
}

#[derive(Debug, Serialize)]
struct ClientRunSummary {
    client_start_index: u64,
    #[serde(flatten)]
    data: ClientRunData,
    slot_runs: Vec<SlotRunSummary>,
}

#[derive(Debug, Serialize)]
struct SlotRunSummary {
    folding_slot: u32,
    #[serde(flatten)]
    data: SlotRunData,
    unit_runs: Vec<UnitRunSummary>,
}

#[derive(Debug, Serialize)]
struct UnitRunSummary {
    queue_index: u8,
    start_index: u64,
    end_index: Option<u64>,
    is_complete: bool,
    #[serde(flatten)]
    data: UnitRunData,
}

impl LogSummary {
    fn new(path: &Path, log: &FoldingLog, parse_errors: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            lines: log.line_count(),
            parse_errors,
            client_runs: log.client_runs().iter().map(ClientRunSummary::new).collect(),
        }
    }
}

impl ClientRunSummary {
    fn new(client: &ClientRun) -> Self {
        Self {
            client_start_index: client.client_start_index(),
            data: (*client.data()).clone(),
            slot_runs: client.slot_runs().iter().map(SlotRunSummary::new).collect(),
        }
    }
}

impl SlotRunSummary {
    fn new(slot: &SlotRun) -> Self {
        Self {
            folding_slot: slot.folding_slot(),
            data: *slot.data(),
            unit_runs: slot.unit_runs().iter().map(UnitRunSummary::new).collect(),
        }
    }
}

impl UnitRunSummary {
    fn new(unit: &UnitRun) -> Self {
        Self {
            queue_index: unit.queue_index(),
            start_index: unit.start_index(),
            end_index: unit.end_index(),
            is_complete: unit.is_complete(),
            data: (*unit.data()).clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = r#"*********************** Log Started 2020-02-16T14:21:08Z ***********************
14:21:12:WU00:FS00:Starting
14:21:13:WU00:FS00:0xa7:Project: 13416 (Run 1238, Clone 0, Gen 17)
14:25:02:WU00:FS00:0xa7:Completed 25000 out of 250000 steps (10%)
14:28:55:WU00:FS00:0xa7:Completed 27500 out of 250000 steps (11%)
14:32:49:WU00:FS00:FahCore returned: FINISHED_UNIT (100 = 0x64)
14:32:50:WU00:FS00:Cleaning up
14:33:00:WU01:FS00:Starting
14:33:01:WU01:FS00:0xa7:Project: 13416 (Run x, Clone 0, Gen 17)
"#;

    #[test]
    fn test_summary_events_order() {
        let log = FoldingLog::from_text(LOG);
        let events = summary_events(&log, false);

        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], ReportEvent::ClientRunStarted { run: 1, .. }));
        assert!(matches!(
            events[1],
            ReportEvent::SlotRunSummary {
                folding_slot: 0,
                unit_runs: 2,
                completed_units: 1,
                failed_units: 0
            }
        ));
        match &events[2] {
            ReportEvent::UnitRunSummary {
                project,
                result,
                frames_observed,
                unit_start,
                ..
            } => {
                assert_eq!(project.as_deref(), Some("P13416 (R1238, C0, G17)"));
                assert_eq!(result.as_deref(), Some("FINISHED_UNIT"));
                assert_eq!(*frames_observed, 2);
                assert_eq!(unit_start.as_deref(), Some("14:21:12"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        match &events[3] {
            ReportEvent::UnitRunSummary {
                project, is_complete, ..
            } => {
                assert_eq!(*project, None);
                assert!(!is_complete);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_summary_events_with_frames() {
        let log = FoldingLog::from_text(LOG);
        let events = summary_events(&log, true);

        let frames: Vec<(u8, f64)> = events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Frame {
                    id, duration_secs, ..
                } => Some((*id, *duration_secs)),
                _ => None,
            })
            .collect();
        assert_eq!(frames, vec![(10, 0.0), (11, 233.0)]);
    }

    #[test]
    fn test_count_parse_errors() {
        let log = FoldingLog::from_text(LOG);
        assert_eq!(count_parse_errors(&log), 1);
    }

    #[test]
    fn test_line_event_carries_data() {
        let line = LogLine::new(4, "14:32:49:WU00:FS00:FahCore returned: FINISHED_UNIT (100 = 0x64)");
        match line_event(&line) {
            ReportEvent::Line {
                index,
                line_type,
                data,
                parse_error,
                ..
            } => {
                assert_eq!(index, 4);
                assert_eq!(line_type, "WorkUnitCoreReturn");
                assert_eq!(data.as_deref(), Some("FINISHED_UNIT"));
                assert!(!parse_error);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_json_summary_shape() {
        let log = FoldingLog::from_text(LOG);
        let summary = LogSummary::new(Path::new("log.txt"), &log, 1);
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["lines"], 9);
        let slot = &json["client_runs"][0]["slot_runs"][0];
        assert_eq!(slot["completed_units"], 1);
        let unit = &slot["unit_runs"][0];
        assert_eq!(unit["result"], "FINISHED_UNIT");
        assert_eq!(unit["project"]["id"], 13416);
        assert_eq!(unit["frames"]["11"]["duration"], 233.0);
    }
}
