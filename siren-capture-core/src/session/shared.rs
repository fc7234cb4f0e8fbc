use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::models::state::MonitorPhase;

/// Decibel value published before any audio has been metered.
const SILENCE_DB: f32 = -120.0;

/// Detection and health state shared between the capture callback and the
/// supervisor, readable by external consumers (e.g. a UI) at any time.
///
/// Every field is an independently overwritten cell: scalar fields are
/// atomics (f32 values stored as bit patterns), strings sit behind short
/// mutexes. There is no cross-field consistency — a reader may observe
/// `rms` updated before `db` within one pass. Meter and heartbeat fields
/// are written by the callback path only, classification fields by the
/// supervisor path only.
pub struct DetectorShared {
    label: Mutex<String>,
    last_error: Mutex<String>,
    confidence_bits: AtomicU32,
    rms_bits: AtomicU32,
    db_bits: AtomicU32,
    consecutive_hits: AtomicU32,
    triggered: AtomicBool,
    sample_rate: AtomicU32,
    /// Milliseconds since the monitor epoch of the last callback; 0 = never.
    last_cb_ms: AtomicU64,
    overflows: AtomicU64,
    callbacks: AtomicU64,
    dropped_blocks: AtomicU64,
    restarts: AtomicU32,
    phase: AtomicU8,
}

impl DetectorShared {
    pub(crate) fn new() -> Self {
        Self {
            label: Mutex::new(String::new()),
            last_error: Mutex::new(String::new()),
            confidence_bits: AtomicU32::new(0.0f32.to_bits()),
            rms_bits: AtomicU32::new(0.0f32.to_bits()),
            db_bits: AtomicU32::new(SILENCE_DB.to_bits()),
            consecutive_hits: AtomicU32::new(0),
            triggered: AtomicBool::new(false),
            sample_rate: AtomicU32::new(0),
            last_cb_ms: AtomicU64::new(0),
            overflows: AtomicU64::new(0),
            callbacks: AtomicU64::new(0),
            dropped_blocks: AtomicU64::new(0),
            restarts: AtomicU32::new(0),
            phase: AtomicU8::new(MonitorPhase::Opening as u8),
        }
    }

    // --- classification fields (supervisor-owned) ---

    pub(crate) fn set_label(&self, label: &str) {
        let mut slot = self.label.lock();
        slot.clear();
        slot.push_str(label);
    }

    pub(crate) fn set_confidence(&self, confidence: f32) {
        self.confidence_bits
            .store(confidence.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn set_consecutive_hits(&self, hits: u32) {
        self.consecutive_hits.store(hits, Ordering::Relaxed);
    }

    pub(crate) fn set_triggered(&self, triggered: bool) {
        self.triggered.store(triggered, Ordering::Relaxed);
    }

    pub(crate) fn set_sample_rate(&self, rate: u32) {
        self.sample_rate.store(rate, Ordering::Relaxed);
    }

    pub(crate) fn set_phase(&self, phase: MonitorPhase) {
        self.phase.store(phase as u8, Ordering::Relaxed);
    }

    pub(crate) fn add_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    // --- error reporting (both paths) ---

    pub(crate) fn set_last_error(&self, message: &str) {
        let mut slot = self.last_error.lock();
        slot.clear();
        slot.push_str(message);
    }

    pub(crate) fn clear_last_error(&self) {
        self.last_error.lock().clear();
    }

    // --- meter and heartbeat fields (callback-owned) ---

    pub(crate) fn set_levels(&self, rms: f32, db: f32) {
        self.rms_bits.store(rms.to_bits(), Ordering::Relaxed);
        self.db_bits.store(db.to_bits(), Ordering::Relaxed);
    }

    /// Records a heartbeat. `elapsed_ms` of 0 is bumped to 1 so that 0 can
    /// keep meaning "no callback has ever fired".
    pub(crate) fn stamp_heartbeat(&self, elapsed_ms: u64) {
        self.last_cb_ms.store(elapsed_ms.max(1), Ordering::Relaxed);
    }

    pub(crate) fn add_overflow(&self) {
        self.overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_callback(&self) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_dropped_block(&self) {
        self.dropped_blocks.fetch_add(1, Ordering::Relaxed);
    }

    // --- readers ---

    pub fn phase(&self) -> MonitorPhase {
        MonitorPhase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    pub fn triggered(&self) -> bool {
        self.triggered.load(Ordering::Relaxed)
    }

    pub fn consecutive_hits(&self) -> u32 {
        self.consecutive_hits.load(Ordering::Relaxed)
    }

    pub fn confidence(&self) -> f32 {
        f32::from_bits(self.confidence_bits.load(Ordering::Relaxed))
    }

    pub fn level_rms(&self) -> f32 {
        f32::from_bits(self.rms_bits.load(Ordering::Relaxed))
    }

    pub fn level_db(&self) -> f32 {
        f32::from_bits(self.db_bits.load(Ordering::Relaxed))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    /// Milliseconds since the monitor epoch of the last callback, 0 = never.
    pub fn heartbeat_ms(&self) -> u64 {
        self.last_cb_ms.load(Ordering::Relaxed)
    }

    pub fn overflows(&self) -> u64 {
        self.overflows.load(Ordering::Relaxed)
    }

    pub fn last_error(&self) -> String {
        self.last_error.lock().clone()
    }

    pub fn label(&self) -> String {
        self.label.lock().clone()
    }

    /// One coherent-enough copy of every field for external consumers.
    pub fn snapshot(&self) -> DetectorSnapshot {
        DetectorSnapshot {
            label: self.label(),
            confidence: self.confidence(),
            consecutive_hits: self.consecutive_hits(),
            triggered: self.triggered(),
            last_error: self.last_error(),
            rms: self.level_rms(),
            db: self.level_db(),
            sample_rate: self.sample_rate(),
            last_cb_ms: self.heartbeat_ms(),
            overflows: self.overflows(),
            callbacks: self.callbacks.load(Ordering::Relaxed),
            dropped_blocks: self.dropped_blocks.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            phase: self.phase(),
        }
    }
}

/// Point-in-time copy of [`DetectorShared`].
///
/// Serializable for JSON export to host UIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorSnapshot {
    pub label: String,
    pub confidence: f32,
    pub consecutive_hits: u32,
    pub triggered: bool,
    pub last_error: String,
    pub rms: f32,
    pub db: f32,
    pub sample_rate: u32,
    pub last_cb_ms: u64,
    pub overflows: u64,
    pub callbacks: u64,
    pub dropped_blocks: u64,
    pub restarts: u32,
    pub phase: MonitorPhase,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_quiet() {
        let shared = DetectorShared::new();
        let snapshot = shared.snapshot();

        assert_eq!(snapshot.rms, 0.0);
        assert_eq!(snapshot.db, SILENCE_DB);
        assert_eq!(snapshot.last_cb_ms, 0);
        assert!(!snapshot.triggered);
        assert_eq!(snapshot.phase, MonitorPhase::Opening);
    }

    #[test]
    fn heartbeat_zero_is_reserved_for_never() {
        let shared = DetectorShared::new();
        shared.stamp_heartbeat(0);
        assert_eq!(shared.heartbeat_ms(), 1);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let shared = DetectorShared::new();
        shared.set_label("siren");
        shared.set_confidence(0.9);
        shared.set_phase(MonitorPhase::Running);

        let json = serde_json::to_value(shared.snapshot()).unwrap();
        assert_eq!(json["label"], "siren");
        assert_eq!(json["phase"], "running");
        assert_eq!(json["triggered"], false);
    }
}
