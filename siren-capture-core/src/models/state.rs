use serde::{Deserialize, Serialize};

/// Supervisor state machine.
///
/// ```text
/// opening → running → (stall_detected | runtime_error) → closing → backoff → opening
/// ```
///
/// `Stopped` is terminal and reachable from every phase via the stop flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MonitorPhase {
    Opening = 0,
    Running = 1,
    StallDetected = 2,
    RuntimeError = 3,
    Closing = 4,
    Backoff = 5,
    Stopped = 6,
}

impl MonitorPhase {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Opening,
            1 => Self::Running,
            2 => Self::StallDetected,
            3 => Self::RuntimeError,
            4 => Self::Closing,
            5 => Self::Backoff,
            _ => Self::Stopped,
        }
    }
}
