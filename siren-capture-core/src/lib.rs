//! # siren-capture-core
//!
//! Platform-agnostic microphone monitoring core.
//!
//! Continuously captures audio into a rolling window, hands the window to
//! a classifier on a fixed cadence, and exposes smoothed level metering
//! plus health diagnostics. Capture survives device glitches, buffer
//! overflows, callback stalls, and driver failures by tearing the stream
//! down and reopening it after a short backoff; only an explicit stop
//! request ends supervision.
//!
//! ## Architecture
//!
//! ```text
//! siren-capture-core (this crate)
//! ├── traits/       ← DeviceQuery, CaptureBackend, CaptureStream, Classifier
//! ├── models/       ← CaptureError, MonitorConfig, DeviceInfo, MonitorPhase
//! ├── processing/   ← RingBuffer, LevelMeter
//! └── session/      ← block sink (real-time path), DetectorShared, MicMonitor
//! ```
//!
//! Platform backends (e.g. the cpal backend in `siren-capture-cpal`)
//! implement `DeviceQuery` and `CaptureBackend` and plug into `MicMonitor`
//! together with a `Classifier`.

pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::MonitorConfig;
pub use models::device::{DeviceInfo, DeviceSelector};
pub use models::error::CaptureError;
pub use models::state::MonitorPhase;
pub use processing::level_meter::LevelMeter;
pub use processing::ring_buffer::RingBuffer;
pub use session::monitor::{MicMonitor, MonitorHandle};
pub use session::shared::{DetectorShared, DetectorSnapshot};
pub use traits::capture_backend::{
    BlockCallback, CaptureBackend, CaptureBlock, CaptureStream, ExclusiveMode, LatencyHint,
    OpenRequest,
};
pub use traits::classifier::{Classification, Classifier};
pub use traits::device_query::DeviceQuery;
