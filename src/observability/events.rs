//! Observable lifecycle events
//!
//! Emitted by the command-line front end only. The engine returns typed
//! errors and never logs on its own.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Configuration file parsed and validated
    ConfigLoaded,
    /// Store opened and schema ensured
    StoreOpened,
    /// Store closed, connections released
    StoreClosed,
    /// Command finished successfully
    CommandComplete,
    /// Command returned an error
    CommandFailed,
    /// Integrity beacon persisted
    BeaconRecorded,
    /// Recomputed proof or beacon root differs from the stored one
    IntegrityMismatch,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::StoreOpened => "STORE_OPENED",
            Event::StoreClosed => "STORE_CLOSED",
            Event::CommandComplete => "COMMAND_COMPLETE",
            Event::CommandFailed => "COMMAND_FAILED",
            Event::BeaconRecorded => "BEACON_RECORDED",
            Event::IntegrityMismatch => "INTEGRITY_MISMATCH",
        }
    }

    /// Severity the event is logged at.
    pub fn severity(&self) -> Severity {
        match self {
            Event::CommandFailed => Severity::Error,
            Event::IntegrityMismatch => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_upper_snake() {
        let events = [
            Event::ConfigLoaded,
            Event::StoreOpened,
            Event::StoreClosed,
            Event::CommandComplete,
            Event::CommandFailed,
            Event::BeaconRecorded,
            Event::IntegrityMismatch,
        ];
        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(Event::CommandFailed.severity(), Severity::Error);
        assert_eq!(Event::IntegrityMismatch.severity(), Severity::Warn);
        assert_eq!(Event::StoreOpened.severity(), Severity::Info);
    }
}
