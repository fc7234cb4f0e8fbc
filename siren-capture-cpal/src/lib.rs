//! # siren-capture-cpal
//!
//! cpal microphone backend for siren-capture-kit.
//!
//! Provides:
//! - `CpalDeviceQuery` — audio endpoint enumeration via the default cpal host
//! - `CpalBackend` / `CpalStream` — input stream capture implementing
//!   `CaptureBackend`
//!
//! ## Usage
//! ```ignore
//! use siren_capture_core::{MicMonitor, MonitorConfig};
//! use siren_capture_cpal::{CpalBackend, CpalDeviceQuery};
//!
//! let mut monitor = MicMonitor::new(
//!     CpalBackend::new(),
//!     CpalDeviceQuery::new(),
//!     classifier,
//!     MonitorConfig::default(),
//! )?;
//! let handle = monitor.handle();
//! std::thread::spawn(move || monitor.run());
//! ```

pub mod devices;
pub mod stream;

pub use devices::CpalDeviceQuery;
pub use stream::{CpalBackend, CpalStream};
