//! Log types
//!
//! The closed set of diagnostic logs a drive can return.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogType {
    Utilizations,
    Temperatures,
    Capacities,
    Configuration,
    Statistics,
    Messages,
    Limits,
    Device,
}

impl LogType {
    /// Every log type, in wire order
    pub const ALL: [LogType; 8] = [
        LogType::Utilizations,
        LogType::Temperatures,
        LogType::Capacities,
        LogType::Configuration,
        LogType::Statistics,
        LogType::Messages,
        LogType::Limits,
        LogType::Device,
    ];
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogType::Utilizations => "LOG_UTILIZATIONS",
            LogType::Temperatures => "LOG_TEMPERATURES",
            LogType::Capacities => "LOG_CAPACITIES",
            LogType::Configuration => "LOG_CONFIGURATION",
            LogType::Statistics => "LOG_STATISTICS",
            LogType::Messages => "LOG_MESSAGES",
            LogType::Limits => "LOG_LIMITS",
            LogType::Device => "LOG_DEVICE",
        };
        f.write_str(name)
    }
}
