use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use parking_lot::Mutex;

use super::block_sink::BlockSink;
use super::shared::{DetectorShared, DetectorSnapshot};
use crate::models::config::MonitorConfig;
use crate::models::error::CaptureError;
use crate::models::state::MonitorPhase;
use crate::processing::ring_buffer::RingBuffer;
use crate::traits::capture_backend::{
    BlockCallback, CaptureBackend, CaptureStream, LatencyHint, OpenRequest,
};
use crate::traits::classifier::{Classification, Classifier};
use crate::traits::device_query::DeviceQuery;

/// Why the inner poll loop handed control back to the restart loop.
enum LoopExit {
    StopRequested,
    Stalled,
}

/// What a whole open→poll→close session amounted to.
enum SessionOutcome {
    StopRequested,
    Stalled,
    Failed,
}

/// Cloneable control and observation handle for a running monitor.
///
/// Safe to hold on a UI thread: `snapshot` is wait-free apart from two
/// short string locks, `stop` is a flag the supervisor polls every tick.
#[derive(Clone)]
pub struct MonitorHandle {
    shared: Arc<DetectorShared>,
    stop: Arc<AtomicBool>,
}

impl MonitorHandle {
    pub fn snapshot(&self) -> DetectorSnapshot {
        self.shared.snapshot()
    }

    pub fn shared(&self) -> Arc<DetectorShared> {
        Arc::clone(&self.shared)
    }

    pub fn phase(&self) -> MonitorPhase {
        self.shared.phase()
    }

    /// Request a cooperative stop. The supervisor observes the flag at the
    /// next loop boundary, closes the stream, and parks in `Stopped`.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.phase().is_stopped()
    }
}

/// Microphone monitor: owns the capture session lifecycle.
///
/// `run` opens a capture stream against the configured device, polls for
/// callback stalls and the window-extraction cadence, hands each window to
/// the classifier, and on any failure tears the stream down and reopens it
/// after a fixed backoff. Only an explicit [`MonitorHandle::stop`] ends the
/// loop; no capture failure is fatal.
pub struct MicMonitor<B: CaptureBackend, Q: DeviceQuery, C: Classifier> {
    backend: B,
    query: Q,
    classifier: C,
    config: MonitorConfig,
    shared: Arc<DetectorShared>,
    ring: Arc<Mutex<RingBuffer>>,
    stop: Arc<AtomicBool>,
    /// Window length in samples at the active sample rate.
    need: usize,
}

impl<B: CaptureBackend, Q: DeviceQuery, C: Classifier> MicMonitor<B, Q, C> {
    /// Validate the configuration and resolve the initial sample rate from
    /// the device so consumers see sensible values before the first open.
    pub fn new(
        backend: B,
        query: Q,
        classifier: C,
        config: MonitorConfig,
    ) -> Result<Self, CaptureError> {
        config
            .validate()
            .map_err(CaptureError::ConfigurationFailed)?;

        let info = query.describe(&config.device)?;
        let rate = config.sample_rate.unwrap_or(info.default_sample_rate);
        if rate == 0 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "device '{}' reports no sample rate",
                info.name
            )));
        }

        let shared = Arc::new(DetectorShared::new());
        shared.set_sample_rate(rate);

        let need = ((config.window_secs * f64::from(rate)) as usize).max(1);
        let ring = Arc::new(Mutex::new(RingBuffer::new(need * 4)));

        Ok(Self {
            backend,
            query,
            classifier,
            config,
            shared,
            ring,
            stop: Arc::new(AtomicBool::new(false)),
            need,
        })
    }

    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle {
            shared: Arc::clone(&self.shared),
            stop: Arc::clone(&self.stop),
        }
    }

    /// Supervise capture until a stop is requested. Blocks the calling
    /// thread; spawn it on a worker thread to keep a UI responsive.
    pub fn run(&mut self) {
        let epoch = Instant::now();

        while !self.stop.load(Ordering::Relaxed) {
            self.shared.set_phase(MonitorPhase::Opening);

            let backoff = match self.run_session(epoch) {
                SessionOutcome::StopRequested => break,
                SessionOutcome::Stalled => self.config.stall_backoff,
                SessionOutcome::Failed => self.config.error_backoff,
            };

            if self.stop.load(Ordering::Relaxed) {
                break;
            }
            self.shared.set_phase(MonitorPhase::Backoff);
            thread::sleep(backoff);
        }

        self.shared.set_phase(MonitorPhase::Stopped);
    }

    /// One full open → poll → close cycle. The stream opened here is closed
    /// on every exit path, exactly once.
    fn run_session(&mut self, epoch: Instant) -> SessionOutcome {
        let mut stream = match self.open_session(epoch) {
            Ok(stream) => stream,
            Err(err) => {
                warn!("stream open failed: {err}");
                self.shared.set_last_error(&format!("stream error: {err}"));
                self.shared.set_phase(MonitorPhase::RuntimeError);
                self.shared.add_restart();
                return SessionOutcome::Failed;
            }
        };

        self.shared.clear_last_error();
        self.shared.set_phase(MonitorPhase::Running);

        let outcome = match self.poll_loop(epoch) {
            Ok(LoopExit::StopRequested) => SessionOutcome::StopRequested,
            Ok(LoopExit::Stalled) => {
                self.shared.set_phase(MonitorPhase::StallDetected);
                self.shared.add_restart();
                SessionOutcome::Stalled
            }
            Err(err) => {
                warn!("capture session failed: {err}");
                self.shared.set_last_error(&format!("stream error: {err}"));
                self.shared.set_phase(MonitorPhase::RuntimeError);
                self.shared.add_restart();
                SessionOutcome::Failed
            }
        };

        // Best-effort teardown; a failing driver must not block the reopen.
        self.shared.set_phase(MonitorPhase::Closing);
        if let Err(err) = stream.stop() {
            warn!("stream stop failed during teardown: {err}");
        }
        if let Err(err) = stream.close() {
            warn!("stream close failed during teardown: {err}");
        }

        outcome
    }

    fn open_session(&mut self, epoch: Instant) -> Result<B::Stream, CaptureError> {
        // Re-query the device: the default rate may have changed while the
        // stream was down (e.g. a Bluetooth headset renegotiating).
        let info = self.query.describe(&self.config.device)?;
        let rate = self.config.sample_rate.unwrap_or(info.default_sample_rate);
        if rate == 0 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "device '{}' reports no sample rate",
                info.name
            )));
        }
        self.shared.set_sample_rate(rate);
        self.need = ((self.config.window_secs * f64::from(rate)) as usize).max(1);

        // Re-arm the ring for the new window length.
        *self.ring.lock() = RingBuffer::new(self.need * 4);

        let request = OpenRequest {
            device: self.config.device.clone(),
            sample_rate: rate,
            channels: 1,
            block_size: self.config.block_size,
            latency: LatencyHint::Low,
            exclusive: self.backend.exclusive_hint(),
        };

        let sink = Mutex::new(BlockSink::new(
            Arc::clone(&self.ring),
            Arc::clone(&self.shared),
            self.config.block_size as usize,
            epoch,
        ));
        let shared = Arc::clone(&self.shared);
        let callback: BlockCallback = Arc::new(move |block| match sink.try_lock() {
            Some(mut sink) => sink.ingest(block),
            None => shared.add_dropped_block(),
        });

        let mut stream = self.backend.open(&request, callback)?;
        if let Err(err) = stream.start() {
            if let Err(close_err) = stream.close() {
                warn!("stream close failed after failed start: {close_err}");
            }
            return Err(err);
        }

        debug!(
            "capture stream started: device={:?} rate={rate} block={}",
            request.device, request.block_size
        );
        Ok(stream)
    }

    /// The RUNNING phase: poll for stop, stalls, and the window cadence.
    fn poll_loop(&mut self, epoch: Instant) -> Result<LoopExit, CaptureError> {
        // None = the first extraction is due immediately after open.
        let mut last_window: Option<Instant> = None;
        let window = Duration::from_secs_f64(self.config.window_secs);
        let stall_ms = self.config.stall_timeout.as_millis() as u64;

        loop {
            if self.stop.load(Ordering::Relaxed) {
                return Ok(LoopExit::StopRequested);
            }

            // Stall check: only once a heartbeat has ever been recorded.
            let heartbeat = self.shared.heartbeat_ms();
            if heartbeat != 0 {
                let now_ms = epoch.elapsed().as_millis() as u64;
                if now_ms.saturating_sub(heartbeat) > stall_ms {
                    self.shared
                        .set_last_error("audio callback stalled; restarting stream");
                    return Ok(LoopExit::Stalled);
                }
            }

            if last_window.map_or(true, |t| t.elapsed() >= window) {
                let samples = self.ring.lock().read_window(self.need);
                let result = self.classifier.classify(&samples)?;
                self.apply_classification(&result);
                last_window = Some(Instant::now());
            }

            thread::sleep(self.config.poll_interval);
        }
    }

    /// Hysteresis update: a hit at or above the threshold extends the
    /// streak, anything below resets it; the trigger latches while the
    /// streak is long enough. Label and confidence always track the most
    /// recent classification.
    fn apply_classification(&self, result: &Classification) {
        let hits = if result.confidence >= self.config.threshold {
            self.shared.consecutive_hits().saturating_add(1)
        } else {
            0
        };
        self.shared.set_consecutive_hits(hits);
        self.shared
            .set_triggered(hits >= self.config.consecutive_needed);
        self.shared.set_label(&result.label);
        self.shared.set_confidence(result.confidence);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::models::device::{DeviceInfo, DeviceSelector};
    use crate::traits::capture_backend::CaptureBlock;

    // --- mock collaborators ---

    struct MockQuery {
        rate: u32,
    }

    impl DeviceQuery for MockQuery {
        fn list(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
            Ok(vec![self.describe(&DeviceSelector::Default)?])
        }

        fn describe(&self, _device: &DeviceSelector) -> Result<DeviceInfo, CaptureError> {
            Ok(DeviceInfo {
                index: 0,
                name: "mock mic".into(),
                max_input_channels: 1,
                max_output_channels: 0,
                default_sample_rate: self.rate,
            })
        }
    }

    #[derive(Default)]
    struct MockControl {
        callback: Mutex<Option<BlockCallback>>,
        opens: AtomicUsize,
        starts: AtomicUsize,
        stops: AtomicUsize,
        closes: AtomicUsize,
        fail_open: AtomicBool,
    }

    impl MockControl {
        fn feed(&self, samples: &[f32], status: Option<&str>) -> bool {
            let callback = self.callback.lock().clone();
            match callback {
                Some(callback) => {
                    callback(CaptureBlock {
                        samples,
                        channels: 1,
                        status,
                    });
                    true
                }
                None => false,
            }
        }

        fn opens(&self) -> usize {
            self.opens.load(Ordering::Relaxed)
        }

        fn closes(&self) -> usize {
            self.closes.load(Ordering::Relaxed)
        }
    }

    struct MockBackend {
        control: Arc<MockControl>,
    }

    struct MockStream {
        control: Arc<MockControl>,
    }

    impl CaptureBackend for MockBackend {
        type Stream = MockStream;

        fn open(
            &mut self,
            _request: &OpenRequest,
            callback: BlockCallback,
        ) -> Result<MockStream, CaptureError> {
            self.control.opens.fetch_add(1, Ordering::Relaxed);
            if self.control.fail_open.load(Ordering::Relaxed) {
                return Err(CaptureError::DeviceNotAvailable);
            }
            *self.control.callback.lock() = Some(callback);
            Ok(MockStream {
                control: Arc::clone(&self.control),
            })
        }
    }

    impl CaptureStream for MockStream {
        fn start(&mut self) -> Result<(), CaptureError> {
            self.control.starts.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn stop(&mut self) -> Result<(), CaptureError> {
            self.control.stops.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn close(&mut self) -> Result<(), CaptureError> {
            self.control.closes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    struct ScriptedClassifier {
        script: Vec<f32>,
        calls: Arc<AtomicUsize>,
    }

    impl Classifier for ScriptedClassifier {
        fn classify(&mut self, _window: &[f32]) -> Result<Classification, CaptureError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let confidence = if self.script.is_empty() {
                0.0
            } else {
                self.script.remove(0)
            };
            Ok(Classification {
                label: "siren".into(),
                confidence,
            })
        }
    }

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            window_secs: 0.01,
            poll_interval: Duration::from_millis(1),
            stall_timeout: Duration::from_millis(40),
            stall_backoff: Duration::from_millis(5),
            error_backoff: Duration::from_millis(5),
            ..MonitorConfig::default()
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    fn spawn_monitor(
        control: Arc<MockControl>,
        classifier: ScriptedClassifier,
        config: MonitorConfig,
    ) -> (MonitorHandle, thread::JoinHandle<()>) {
        let backend = MockBackend {
            control: Arc::clone(&control),
        };
        let mut monitor =
            MicMonitor::new(backend, MockQuery { rate: 1000 }, classifier, config).unwrap();
        let handle = monitor.handle();
        let join = thread::spawn(move || monitor.run());
        (handle, join)
    }

    // --- tests ---

    #[test]
    fn hysteresis_latches_after_consecutive_hits_and_resets() {
        let backend = MockBackend {
            control: Arc::new(MockControl::default()),
        };
        let classifier = ScriptedClassifier {
            script: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let monitor = MicMonitor::new(
            backend,
            MockQuery { rate: 1000 },
            classifier,
            MonitorConfig::default(),
        )
        .unwrap();
        let shared = monitor.handle().shared();

        let result = |confidence| Classification {
            label: "siren".into(),
            confidence,
        };

        monitor.apply_classification(&result(0.9));
        assert_eq!(shared.consecutive_hits(), 1);
        assert!(!shared.triggered());

        monitor.apply_classification(&result(0.9));
        assert_eq!(shared.consecutive_hits(), 2);
        assert!(shared.triggered());

        monitor.apply_classification(&result(0.3));
        assert_eq!(shared.consecutive_hits(), 0);
        assert!(!shared.triggered());
        assert_eq!(shared.confidence(), 0.3);
        assert_eq!(shared.label(), "siren");
    }

    #[test]
    fn exact_threshold_counts_as_a_hit() {
        let backend = MockBackend {
            control: Arc::new(MockControl::default()),
        };
        let classifier = ScriptedClassifier {
            script: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let monitor = MicMonitor::new(
            backend,
            MockQuery { rate: 1000 },
            classifier,
            MonitorConfig::default(),
        )
        .unwrap();
        let shared = monitor.handle().shared();

        monitor.apply_classification(&Classification {
            label: "siren".into(),
            confidence: 0.85,
        });
        assert_eq!(shared.consecutive_hits(), 1);
    }

    #[test]
    fn explicit_sample_rate_overrides_device_default() {
        let backend = MockBackend {
            control: Arc::new(MockControl::default()),
        };
        let classifier = ScriptedClassifier {
            script: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let config = MonitorConfig {
            sample_rate: Some(500),
            ..MonitorConfig::default()
        };
        let monitor =
            MicMonitor::new(backend, MockQuery { rate: 1000 }, classifier, config).unwrap();

        assert_eq!(monitor.handle().snapshot().sample_rate, 500);
        assert_eq!(monitor.ring.lock().capacity(), 500 * 3 * 4);
    }

    #[test]
    fn first_window_is_classified_immediately() {
        let control = Arc::new(MockControl::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = ScriptedClassifier {
            script: Vec::new(),
            calls: Arc::clone(&calls),
        };
        // A long window proves the first tick does not wait a full cadence.
        let config = MonitorConfig {
            window_secs: 30.0,
            poll_interval: Duration::from_millis(1),
            ..MonitorConfig::default()
        };
        let (handle, join) = spawn_monitor(Arc::clone(&control), classifier, config);

        assert!(wait_for(|| calls.load(Ordering::Relaxed) == 1));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::Relaxed), 1);

        handle.stop();
        join.join().unwrap();
    }

    #[test]
    fn stop_closes_the_stream_exactly_once_and_parks_stopped() {
        let control = Arc::new(MockControl::default());
        let classifier = ScriptedClassifier {
            script: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let (handle, join) = spawn_monitor(Arc::clone(&control), classifier, fast_config());

        assert!(wait_for(|| control.feed(&[0.0; 16], None)));
        handle.stop();
        join.join().unwrap();

        assert!(handle.is_stopped());
        assert_eq!(control.opens(), 1);
        assert_eq!(control.closes(), 1);
        assert_eq!(control.stops.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn silent_callback_trips_the_stall_detector_and_restarts() {
        let control = Arc::new(MockControl::default());
        let classifier = ScriptedClassifier {
            script: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let (handle, join) = spawn_monitor(Arc::clone(&control), classifier, fast_config());

        // One heartbeat, then silence: the supervisor must notice and reopen.
        assert!(wait_for(|| control.feed(&[0.0; 16], None)));
        assert!(wait_for(|| control.opens() >= 2));
        assert!(handle.snapshot().restarts >= 1);
        assert!(wait_for(|| handle.snapshot().last_error.contains("stalled")));

        handle.stop();
        join.join().unwrap();

        // Every opened stream was torn down exactly once.
        assert_eq!(control.closes(), control.opens());
    }

    #[test]
    fn open_failure_records_the_error_and_retries() {
        let control = Arc::new(MockControl::default());
        control.fail_open.store(true, Ordering::Relaxed);
        let classifier = ScriptedClassifier {
            script: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let (handle, join) = spawn_monitor(Arc::clone(&control), classifier, fast_config());

        assert!(wait_for(|| control.opens() >= 2));
        assert!(handle
            .snapshot()
            .last_error
            .contains("device not available"));

        // Let the next attempt succeed; the error clears on a good open.
        control.fail_open.store(false, Ordering::Relaxed);
        assert!(wait_for(|| handle.snapshot().last_error.is_empty()));
        assert!(wait_for(|| control.feed(&[0.0; 16], None)));

        handle.stop();
        join.join().unwrap();
        assert!(handle.is_stopped());
    }

    #[test]
    fn classifier_error_restarts_the_stream() {
        struct FailingClassifier;
        impl Classifier for FailingClassifier {
            fn classify(&mut self, _window: &[f32]) -> Result<Classification, CaptureError> {
                Err(CaptureError::ClassifierFailed("model exploded".into()))
            }
        }

        let control = Arc::new(MockControl::default());
        let backend = MockBackend {
            control: Arc::clone(&control),
        };
        let mut monitor = MicMonitor::new(
            backend,
            MockQuery { rate: 1000 },
            FailingClassifier,
            fast_config(),
        )
        .unwrap();
        let handle = monitor.handle();
        let join = thread::spawn(move || monitor.run());

        assert!(wait_for(|| control.opens() >= 2));
        assert!(wait_for(|| handle.snapshot().last_error.contains("model exploded")));

        handle.stop();
        join.join().unwrap();
        assert_eq!(control.closes(), control.opens());
    }

    #[test]
    fn triggered_sequence_for_two_hits_then_reset() {
        // threshold 0.85, consecutive_needed 2, confidences [0.9, 0.9, 0.3]
        // → triggered [false, true, false].
        let backend = MockBackend {
            control: Arc::new(MockControl::default()),
        };
        let classifier = ScriptedClassifier {
            script: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let monitor = MicMonitor::new(
            backend,
            MockQuery { rate: 1000 },
            classifier,
            MonitorConfig::default(),
        )
        .unwrap();
        let shared = monitor.handle().shared();

        let mut observed = Vec::new();
        for confidence in [0.9, 0.9, 0.3] {
            monitor.apply_classification(&Classification {
                label: "siren".into(),
                confidence,
            });
            observed.push(shared.triggered());
        }

        assert_eq!(observed, vec![false, true, false]);
    }
}
