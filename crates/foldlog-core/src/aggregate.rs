//! Derived data for client, slot and unit runs.
//!
//! Every function here is a pure replay of a node's lines (or its children's
//! data). Calling one twice on the same input gives the same record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::line_data::{option_duration_secs, FrameSample, LineData, ProjectInfo, UnitResult};
use crate::log_line::LogLine;
use crate::LineType;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientRunData {
    /// Client start, from the log banner
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SlotRunData {
    pub completed_units: u32,
    pub failed_units: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnitRunData {
    /// Time of day the unit started working
    #[serde(serialize_with = "option_duration_secs")]
    pub unit_start_timestamp: Option<Duration>,
    /// Frame lines seen since the last reset, duplicates included
    pub frames_observed: u32,
    pub core_version: Option<String>,
    pub platform: Option<String>,
    pub project: ProjectInfo,
    pub result: Option<UnitResult>,
    pub frames: BTreeMap<u8, FrameSample>,
}

impl UnitRunData {
    pub fn frame(&self, id: u8) -> Option<&FrameSample> {
        self.frames.get(&id)
    }

    /// Mean duration of the frames that have a predecessor.
    pub fn average_frame_time(&self) -> Option<Duration> {
        let timed: Vec<Duration> = self
            .frames
            .values()
            .map(|f| f.duration)
            .filter(|d| !d.is_zero())
            .collect();
        if timed.is_empty() {
            return None;
        }
        Some(timed.iter().sum::<Duration>() / timed.len() as u32)
    }
}

/// Elapsed time from `second` to `first`, two times of day at most one day
/// apart. A `first` earlier than `second` means the clock passed midnight.
pub fn rollover_delta(first: Duration, second: Duration) -> Duration {
    if first < second {
        (DAY - second.min(DAY)) + first
    } else {
        first - second
    }
}

pub fn client_run_data(lines: &[LogLine]) -> ClientRunData {
    let start_time = lines
        .iter()
        .filter(|line| line.line_type() == LineType::LogOpen)
        .find_map(|line| match line.data() {
            LineData::LogOpened(t) => Some(*t),
            _ => None,
        });
    ClientRunData { start_time }
}

/// Count completed and failed units from each unit's result.
pub fn slot_run_data<'a, I>(results: I) -> SlotRunData
where
    I: IntoIterator<Item = Option<&'a UnitResult>>,
{
    let mut data = SlotRunData::default();
    for result in results.into_iter().flatten() {
        if result.is_finished() {
            data.completed_units += 1;
        } else if result.is_failure() {
            data.failed_units += 1;
        }
    }
    data
}

pub fn unit_run_data(lines: &[LogLine]) -> UnitRunData {
    let mut data = UnitRunData::default();

    for line in lines {
        match (line.line_type(), line.data()) {
            (LineType::WorkUnitWorking, _) => {
                if data.unit_start_timestamp.is_none() {
                    data.unit_start_timestamp = line.timestamp();
                }
                data.result = None;
            }
            (LineType::WorkUnitFrame, LineData::Frame(frame)) => {
                if data.unit_start_timestamp.is_none() {
                    data.unit_start_timestamp = line.timestamp();
                }
                add_frame(&mut data.frames, frame);
                data.frames_observed += 1;
            }
            (LineType::WorkUnitCoreVersion, LineData::CoreVersion(version)) => {
                data.core_version = Some(version.clone());
            }
            (LineType::WorkUnitProject, LineData::Project(project)) => {
                data.project = *project;
            }
            (LineType::WorkUnitPlatform, LineData::Platform(platform)) => {
                data.platform = Some(platform.clone());
            }
            (LineType::WorkUnitCoreReturn, LineData::UnitResult(result)) => {
                if result.resets_frames_observed() {
                    data.frames_observed = 0;
                }
                if *result == UnitResult::CoreRestart {
                    data.frames.clear();
                }
                data.result = Some(result.clone());
            }
            _ => {}
        }
    }

    calculate_frame_durations(&mut data.frames);
    data
}

/// Record a frame unless its id was already seen.
fn add_frame(frames: &mut BTreeMap<u8, FrameSample>, frame: &FrameSample) {
    frames.entry(frame.id).or_insert_with(|| FrameSample {
        duration: Duration::ZERO,
        ..frame.clone()
    });
}

/// Each frame's duration is the time since frame `id - 1`. Frames without
/// that predecessor keep a zero duration.
fn calculate_frame_durations(frames: &mut BTreeMap<u8, FrameSample>) {
    let timestamps: BTreeMap<u8, Duration> =
        frames.iter().map(|(id, f)| (*id, f.timestamp)).collect();
    for frame in frames.values_mut() {
        frame.duration = frame
            .id
            .checked_sub(1)
            .and_then(|previous| timestamps.get(&previous))
            .map(|previous| rollover_delta(frame.timestamp, *previous))
            .unwrap_or_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hms(h: u64, m: u64, s: u64) -> Duration {
        Duration::from_secs(h * 3600 + m * 60 + s)
    }

    fn lines(text: &str) -> Vec<LogLine> {
        text.lines()
            .enumerate()
            .map(|(i, raw)| LogLine::new(i as u64, raw))
            .collect()
    }

    #[test]
    fn test_rollover_delta() {
        assert_eq!(rollover_delta(hms(10, 5, 0), hms(10, 0, 0)), hms(0, 5, 0));
        assert_eq!(rollover_delta(hms(0, 1, 0), hms(23, 59, 0)), hms(0, 2, 0));
        assert_eq!(rollover_delta(hms(10, 0, 0), hms(10, 0, 0)), Duration::ZERO);
    }

    #[test]
    fn test_first_frame_has_zero_duration() {
        let data = unit_run_data(&lines(
            "10:00:00:WU00:FS00:0x22:Completed 0 out of 1000 steps (0%)\n\
             10:02:00:WU00:FS00:0x22:Completed 10 out of 1000 steps (1%)",
        ));
        assert_eq!(data.frames_observed, 2);
        assert_eq!(data.frame(0).unwrap().duration, Duration::ZERO);
        assert_eq!(data.frame(1).unwrap().duration, hms(0, 2, 0));
        assert_eq!(data.unit_start_timestamp, Some(hms(10, 0, 0)));
    }

    #[test]
    fn test_frame_duration_across_midnight() {
        let data = unit_run_data(&lines(
            "23:59:30:WU00:FS00:0x22:Completed 50 out of 100 steps (50%)\n\
             00:00:45:WU00:FS00:0x22:Completed 51 out of 100 steps (51%)",
        ));
        assert_eq!(data.frame(51).unwrap().duration, Duration::from_secs(75));
    }

    #[test]
    fn test_frame_duration_needs_previous_id() {
        let data = unit_run_data(&lines(
            "10:01:00:WU00:FS00:0x22:Completed 10 out of 100 steps (10%)\n\
             10:05:00:WU00:FS00:0x22:Completed 20 out of 100 steps (20%)",
        ));
        assert_eq!(data.frame(20).unwrap().duration, Duration::ZERO);
        assert_eq!(data.average_frame_time(), None);
    }

    #[test]
    fn test_frame_duration_with_frames_out_of_order() {
        let data = unit_run_data(&lines(
            "10:02:00:WU00:FS00:0x22:Completed 11 out of 100 steps (11%)\n\
             10:01:00:WU00:FS00:0x22:Completed 10 out of 100 steps (10%)",
        ));
        assert_eq!(data.frame(10).unwrap().duration, Duration::ZERO);
        assert_eq!(data.frame(11).unwrap().duration, hms(0, 1, 0));
    }

    #[test]
    fn test_duplicate_frame_counts_but_is_not_stored() {
        let data = unit_run_data(&lines(
            "10:00:00:WU00:FS00:0x22:Completed 5 out of 100 steps (5%)\n\
             10:01:00:WU00:FS00:0x22:Completed 5 out of 100 steps (5%)",
        ));
        assert_eq!(data.frames_observed, 2);
        assert_eq!(data.frames.len(), 1);
        assert_eq!(data.frame(5).unwrap().timestamp, hms(10, 0, 0));
    }

    #[test]
    fn test_core_restart_clears_frames() {
        let data = unit_run_data(&lines(
            "10:00:00:WU00:FS00:0x22:Completed 5 out of 100 steps (5%)\n\
             10:01:00:WU00:FS00:0x22:Completed 6 out of 100 steps (6%)\n\
             10:02:00:WU00:FS00:FahCore returned: CORE_RESTART (98 = 0x62)\n\
             10:03:00:WU00:FS00:0x22:Completed 7 out of 100 steps (7%)",
        ));
        assert_eq!(data.frames_observed, 1);
        assert_eq!(data.frames.len(), 1);
        assert_eq!(data.frame(7).unwrap().duration, Duration::ZERO);
        assert_eq!(data.result, Some(UnitResult::CoreRestart));
    }

    #[test]
    fn test_working_line_resets_result() {
        let data = unit_run_data(&lines(
            "10:00:00:WU00:FS00:FahCore returned: INTERRUPTED (102 = 0x66)\n\
             10:00:05:WU00:FS00:Starting",
        ));
        assert_eq!(data.result, None);
        assert_eq!(data.unit_start_timestamp, Some(hms(10, 0, 5)));
    }

    #[test]
    fn test_unknown_result_resets_observed_count() {
        let data = unit_run_data(&lines(
            "10:00:00:WU00:FS00:0x22:Completed 5 out of 100 steps (5%)\n\
             10:02:00:WU00:FS00:FahCore returned: GPU_MEMTEST_ERROR (124 = 0x7c)",
        ));
        assert_eq!(data.frames_observed, 0);
        assert_eq!(data.frames.len(), 1);
        assert_eq!(
            data.result,
            Some(UnitResult::Unknown("GPU_MEMTEST_ERROR".to_string()))
        );
    }

    #[test]
    fn test_slot_counts() {
        let finished = UnitResult::FinishedUnit;
        let early = UnitResult::EarlyUnitEnd;
        let checksum = UnitResult::BadFrameChecksum;
        let data = slot_run_data(vec![Some(&finished), Some(&early), Some(&checksum), None]);
        assert_eq!(
            data,
            SlotRunData {
                completed_units: 1,
                failed_units: 1
            }
        );
    }

    #[test]
    fn test_client_start_time() {
        let data = client_run_data(&lines(
            "*********************** Log Started 2020-02-16T14:21:08Z ***********************\n\
             14:21:08:Trying to access database...",
        ));
        let start = data.start_time.unwrap();
        assert_eq!(start.to_rfc3339(), "2020-02-16T14:21:08+00:00");
    }

    #[test]
    fn test_unit_data_serializes_durations_as_seconds() {
        let data = unit_run_data(&lines("10:00:00:WU00:FS00:Starting"));
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["unit_start_timestamp"], serde_json::json!(36000.0));
        assert_eq!(json["frames_observed"], serde_json::json!(0));
    }
}
