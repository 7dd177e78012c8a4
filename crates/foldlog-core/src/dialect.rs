use std::time::Duration;

use crate::line_data::LineData;
use crate::parsers::{self, UnitTag};
use crate::LineType;

/// The text rules of one client log format.
///
/// A dialect classifies raw lines, extracts typed data from them and finds
/// the work unit tag that scopes a line to a slot and queue entry. All
/// methods are pure: the same text always yields the same answer.
pub trait Dialect: Send + Sync {
    /// Assign a line type. Never fails; unknown text is [`LineType::None`].
    fn classify(&self, raw: &str) -> LineType;

    /// Extract the data carried by a line of the given type.
    fn parse_data(&self, line_type: LineType, raw: &str) -> LineData;

    /// Time of day the line was written, if the line carries one.
    fn parse_timestamp(&self, raw: &str) -> Option<Duration> {
        parsers::parse_timestamp(raw)
    }

    /// Queue index and folding slot of a work unit scoped line.
    fn unit_tag(&self, raw: &str) -> Option<UnitTag>;
}

/// Dialect of the v7 (and newer) client.
#[derive(Debug, Clone, Copy, Default)]
pub struct V7Dialect;

/// Shared instance used by readers that are not given a dialect.
pub static V7: V7Dialect = V7Dialect;

impl V7Dialect {
    /// Client self-version banners have the marker at the start of the line
    /// (`HH:MM:SS:    Version`), core banners further right.
    const CLIENT_BANNER_VERSION_END: usize = 8;
}

impl Dialect for V7Dialect {
    fn classify(&self, raw: &str) -> LineType {
        // Frame lines dominate a log, check them first.
        if raw.contains(":Completed ") {
            return LineType::WorkUnitFrame;
        }
        if raw.contains("FahCore returned: ") {
            return LineType::WorkUnitCoreReturn;
        }
        if raw.contains("*********************** Log Started") {
            return LineType::LogOpen;
        }
        if raw.contains(":Sending unit results:") {
            return LineType::ClientSendWorkToServer;
        }
        if raw.contains(":Requesting new work unit for slot") {
            return LineType::ClientAttemptGetWorkPacket;
        }
        if raw.trim().ends_with(":Starting") {
            return LineType::WorkUnitWorking;
        }
        if raw.contains(":Version") {
            return LineType::WorkUnitCoreVersion;
        }
        if raw
            .find(":    Version")
            .is_some_and(|pos| pos > Self::CLIENT_BANNER_VERSION_END)
        {
            return LineType::WorkUnitCoreVersion;
        }
        if raw.contains(":Project:") {
            return LineType::WorkUnitProject;
        }
        if raw.contains(":Folding@home Core Shutdown:") {
            return LineType::WorkUnitCoreShutdown;
        }
        if raw.contains(":Cleaning up") {
            return LineType::WorkUnitCleaningUp;
        }
        if raw.contains(":Too many errors, failing") {
            return LineType::WorkUnitTooManyErrors;
        }
        if raw.contains("Platform:") {
            return LineType::WorkUnitPlatform;
        }
        LineType::None
    }

    fn parse_data(&self, line_type: LineType, raw: &str) -> LineData {
        parsers::parse_line_data(line_type, raw)
    }

    fn unit_tag(&self, raw: &str) -> Option<UnitTag> {
        parsers::parse_unit_tag(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(raw: &str) -> LineType {
        V7.classify(raw)
    }

    #[test]
    fn test_classify_client_lines() {
        assert_eq!(
            classify("*********************** Log Started 2020-02-16T14:21:08Z ***********************"),
            LineType::LogOpen
        );
        assert_eq!(
            classify("14:30:12:WU00:FS00:Sending unit results: id:00 state:SEND error:NO_ERROR"),
            LineType::ClientSendWorkToServer
        );
        assert_eq!(
            classify("14:21:10:WU01:FS00:Requesting new work unit for slot 00: READY cpu:4"),
            LineType::ClientAttemptGetWorkPacket
        );
        assert_eq!(classify("14:21:08:Trying to access database..."), LineType::None);
        assert_eq!(classify(""), LineType::None);
    }

    #[test]
    fn test_classify_unit_lines() {
        assert_eq!(classify("14:21:12:WU01:FS00:Starting"), LineType::WorkUnitWorking);
        assert_eq!(classify("14:21:12:WU01:FS00:Starting  \r"), LineType::WorkUnitWorking);
        assert_eq!(
            classify("14:21:13:WU01:FS00:0xa7:Project: 9752 (Run 1, Clone 2, Gen 3)"),
            LineType::WorkUnitProject
        );
        assert_eq!(
            classify("14:21:13:WU01:FS00:0xa7:Completed 0 out of 500000 steps (0%)"),
            LineType::WorkUnitFrame
        );
        assert_eq!(
            classify("14:30:10:WU01:FS00:0xa7:Folding@home Core Shutdown: FINISHED_UNIT"),
            LineType::WorkUnitCoreShutdown
        );
        assert_eq!(
            classify("14:30:11:WU01:FS00:FahCore returned: FINISHED_UNIT (100 = 0x64)"),
            LineType::WorkUnitCoreReturn
        );
        assert_eq!(classify("14:30:12:WU01:FS00:Cleaning up"), LineType::WorkUnitCleaningUp);
        assert_eq!(
            classify("14:30:12:WARNING:WU01:FS00:Too many errors, failing"),
            LineType::WorkUnitTooManyErrors
        );
        assert_eq!(
            classify("14:21:13:WU02:FS01:0x22:  Platform: CUDA"),
            LineType::WorkUnitPlatform
        );
    }

    #[test]
    fn test_classify_version_guard() {
        assert_eq!(classify("14:21:13:WU01:FS00:0xa7:Version 0.0.18"), LineType::WorkUnitCoreVersion);
        assert_eq!(
            classify("14:21:13:WU01:FS01:0x21:    Version 0.0.11"),
            LineType::WorkUnitCoreVersion
        );
        // Client banner: marker begins at the timestamp colon.
        assert_eq!(classify("14:21:08:    Version 7.4.4"), LineType::None);
        assert_eq!(classify("14:21:08:            Version: 7.4.4"), LineType::None);
    }

    #[test]
    fn test_classify_frame_rule_wins_over_later_rules() {
        // A frame line mentioning a platform is still a frame line.
        assert_eq!(
            classify("14:21:13:WU02:FS01:0x22:Completed 5% Platform: CUDA"),
            LineType::WorkUnitFrame
        );
    }
}
