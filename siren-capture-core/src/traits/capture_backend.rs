use std::sync::Arc;

use crate::models::device::DeviceSelector;
use crate::models::error::CaptureError;

/// One block of captured audio, delivered on the backend's audio thread.
pub struct CaptureBlock<'a> {
    /// Interleaved samples, `channels` per frame.
    pub samples: &'a [f32],
    /// Channel count of `samples` (1 = mono).
    pub channels: u16,
    /// Driver status notice attached to this block, if any
    /// (e.g. an overflow report).
    pub status: Option<&'a str>,
}

/// Callback invoked once per captured block.
///
/// Fires on a dedicated audio thread — implementations must not block,
/// panic, or allocate beyond what was sized at stream-open time.
pub type BlockCallback = Arc<dyn Fn(CaptureBlock<'_>) + Send + Sync + 'static>;

/// Latency request passed to the backend at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatencyHint {
    #[default]
    Low,
    High,
}

/// Opportunistic capture-mode configuration.
///
/// Produced by [`CaptureBackend::exclusive_hint`] on platforms that expose
/// an exclusive capture mode. Absence of support is not an error; streams
/// fall back to the host's shared mode silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusiveMode {
    Exclusive,
    Shared,
}

/// Parameters for opening a capture stream.
///
/// `channels` is the channel count the monitor wants to consume; backends
/// whose hardware only delivers its native layout may open with more
/// channels and report the actual count per block.
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub device: DeviceSelector,
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per callback block.
    pub block_size: u32,
    pub latency: LatencyHint,
    /// Result of the exclusive-mode capability probe. None = unsupported.
    pub exclusive: Option<ExclusiveMode>,
}

/// An open capture session bound to one device, sample rate, and block size.
///
/// Owned by a single supervisor iteration and closed on every exit path.
pub trait CaptureStream {
    fn start(&mut self) -> Result<(), CaptureError>;

    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Release the underlying device handle. Idempotent.
    fn close(&mut self) -> Result<(), CaptureError>;
}

/// Platform capture entry point.
///
/// Counterpart of the platform backends that plug into the monitor, e.g.
/// the cpal implementation in `siren-capture-cpal`.
pub trait CaptureBackend: Send {
    type Stream: CaptureStream;

    /// Probe for exclusive-capture support. The default reports none.
    fn exclusive_hint(&self) -> Option<ExclusiveMode> {
        None
    }

    /// Open a capture stream delivering blocks via `callback`.
    ///
    /// The stream is returned stopped; call [`CaptureStream::start`].
    fn open(
        &mut self,
        request: &OpenRequest,
        callback: BlockCallback,
    ) -> Result<Self::Stream, CaptureError>;
}
