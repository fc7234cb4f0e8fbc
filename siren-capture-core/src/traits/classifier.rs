use crate::models::error::CaptureError;

/// Result of classifying one audio window.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    /// Confidence in [0, 1].
    pub confidence: f32,
}

/// Audio window classifier.
///
/// `classify` runs synchronously on the supervisor thread with no timeout;
/// an implementation that blocks indefinitely stalls window-extraction
/// cadence. An error feeds the monitor's restart path — it never stops
/// audio ingestion on the callback thread and never crosses the library
/// boundary as a panic.
pub trait Classifier: Send {
    fn classify(&mut self, window: &[f32]) -> Result<Classification, CaptureError>;
}
