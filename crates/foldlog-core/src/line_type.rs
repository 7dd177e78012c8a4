use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type of a single client log line.
///
/// Assigned by [`Dialect::classify`](crate::Dialect::classify). Once a line has
/// a type, the dialect knows which data (if any) to pull out of its text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineType {
    /// Nothing of interest on this line
    #[default]
    None,
    /// Log opening banner carrying the client start date and time
    LogOpen,
    /// Client is sending finished work back to a server
    ClientSendWorkToServer,
    /// Client is requesting a new work unit for a slot
    ClientAttemptGetWorkPacket,
    /// Client has started working on a work unit
    WorkUnitWorking,
    /// Core executable version
    WorkUnitCoreVersion,
    /// Project, run, clone and gen of the work unit
    WorkUnitProject,
    /// Frame (progress) completion
    WorkUnitFrame,
    /// Core process shutdown result
    WorkUnitCoreShutdown,
    /// Client echo of the core process result
    WorkUnitCoreReturn,
    /// Work unit processing is complete
    WorkUnitCleaningUp,
    /// Client gave up on a work unit after repeated failures
    WorkUnitTooManyErrors,
    /// Processing backend (CPU, CUDA, OpenCL) reported by the core
    WorkUnitPlatform,
}

impl LineType {
    pub const ALL: [LineType; 13] = [
        LineType::None,
        LineType::LogOpen,
        LineType::ClientSendWorkToServer,
        LineType::ClientAttemptGetWorkPacket,
        LineType::WorkUnitWorking,
        LineType::WorkUnitCoreVersion,
        LineType::WorkUnitProject,
        LineType::WorkUnitFrame,
        LineType::WorkUnitCoreShutdown,
        LineType::WorkUnitCoreReturn,
        LineType::WorkUnitCleaningUp,
        LineType::WorkUnitTooManyErrors,
        LineType::WorkUnitPlatform,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LineType::None => "None",
            LineType::LogOpen => "LogOpen",
            LineType::ClientSendWorkToServer => "ClientSendWorkToServer",
            LineType::ClientAttemptGetWorkPacket => "ClientAttemptGetWorkPacket",
            LineType::WorkUnitWorking => "WorkUnitWorking",
            LineType::WorkUnitCoreVersion => "WorkUnitCoreVersion",
            LineType::WorkUnitProject => "WorkUnitProject",
            LineType::WorkUnitFrame => "WorkUnitFrame",
            LineType::WorkUnitCoreShutdown => "WorkUnitCoreShutdown",
            LineType::WorkUnitCoreReturn => "WorkUnitCoreReturn",
            LineType::WorkUnitCleaningUp => "WorkUnitCleaningUp",
            LineType::WorkUnitTooManyErrors => "WorkUnitTooManyErrors",
            LineType::WorkUnitPlatform => "WorkUnitPlatform",
        }
    }
}

impl fmt::Display for LineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for LineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LineType::ALL
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("Unknown line type: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_type_from_str_ignores_case() {
        assert_eq!("workunitframe".parse::<LineType>(), Ok(LineType::WorkUnitFrame));
        assert_eq!("LogOpen".parse::<LineType>(), Ok(LineType::LogOpen));
        assert!("Bogus".parse::<LineType>().is_err());
    }

    #[test]
    fn test_line_type_display_round_trips_every_variant() {
        for line_type in LineType::ALL {
            assert_eq!(line_type.to_string().parse::<LineType>(), Ok(line_type));
        }
    }

    #[test]
    fn test_serde_name_matches_display() {
        for line_type in LineType::ALL {
            let json = serde_json::to_string(&line_type).unwrap();
            assert_eq!(json, format!("\"{}\"", line_type));
            assert_eq!(serde_json::from_str::<LineType>(&json).unwrap(), line_type);
        }
    }
}
