use thiserror::Error;

/// Errors that can occur during capture and supervision.
///
/// None of these are fatal to the monitor: open and runtime failures feed
/// the restart path, and teardown failures are swallowed at the call site.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("device not available")]
    DeviceNotAvailable,

    #[error("device query failed: {0}")]
    DeviceQueryFailed(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("stream failed: {0}")]
    StreamFailed(String),

    #[error("classifier failed: {0}")]
    ClassifierFailed(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}
