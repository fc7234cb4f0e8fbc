use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::shared::DetectorShared;
use crate::processing::level_meter::LevelMeter;
use crate::processing::ring_buffer::RingBuffer;
use crate::traits::capture_backend::CaptureBlock;

/// Real-time block handler: meters, buffers, and heartbeats every block the
/// capture backend delivers.
///
/// Runs on the backend's audio thread. The mono scratch buffer is sized at
/// construction so the steady-state path performs no allocation (it grows
/// once if the driver delivers larger blocks than requested); driver status
/// notices are the only strings copied, and only on the error path. The
/// ring buffer is taken with `try_lock` so the callback never waits on the
/// supervisor's window copy — a contended block is counted and dropped.
pub(crate) struct BlockSink {
    ring: Arc<Mutex<RingBuffer>>,
    shared: Arc<DetectorShared>,
    meter: LevelMeter,
    mono: Vec<f32>,
    epoch: Instant,
}

impl BlockSink {
    pub(crate) fn new(
        ring: Arc<Mutex<RingBuffer>>,
        shared: Arc<DetectorShared>,
        block_size: usize,
        epoch: Instant,
    ) -> Self {
        Self {
            ring,
            shared,
            meter: LevelMeter::new(),
            mono: Vec::with_capacity(block_size.max(1)),
            epoch,
        }
    }

    /// Ingest one block. Never panics; problems surface through the shared
    /// state so capture continues uninterrupted.
    pub(crate) fn ingest(&mut self, block: CaptureBlock<'_>) {
        if let Some(status) = block.status {
            if !status.is_empty() {
                self.shared.set_last_error(status);
                if status.to_ascii_lowercase().contains("overflow") {
                    self.shared.add_overflow();
                }
            }
        }

        // Mono downmix: first channel of each interleaved frame.
        let channels = usize::from(block.channels.max(1));
        self.mono.clear();
        self.mono
            .extend(block.samples.iter().step_by(channels).copied());

        let (rms, db) = self.meter.update(&self.mono);
        self.shared.set_levels(rms, db);

        match self.ring.try_lock() {
            Some(mut ring) => ring.write(&self.mono),
            None => self.shared.add_dropped_block(),
        }

        self.shared.add_callback();
        self.shared
            .stamp_heartbeat(self.epoch.elapsed().as_millis() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink_fixture(block_size: usize) -> (BlockSink, Arc<Mutex<RingBuffer>>, Arc<DetectorShared>) {
        let ring = Arc::new(Mutex::new(RingBuffer::new(64)));
        let shared = Arc::new(DetectorShared::new());
        let sink = BlockSink::new(
            Arc::clone(&ring),
            Arc::clone(&shared),
            block_size,
            Instant::now(),
        );
        (sink, ring, shared)
    }

    fn block<'a>(samples: &'a [f32], channels: u16, status: Option<&'a str>) -> CaptureBlock<'a> {
        CaptureBlock {
            samples,
            channels,
            status,
        }
    }

    #[test]
    fn counts_overflow_statuses_case_insensitively() {
        let (mut sink, _ring, shared) = sink_fixture(8);

        sink.ingest(block(&[0.0; 8], 1, Some("input Overflow")));
        assert_eq!(shared.overflows(), 1);
        assert_eq!(shared.last_error(), "input Overflow");

        sink.ingest(block(&[0.0; 8], 1, Some("OVERFLOW detected")));
        assert_eq!(shared.overflows(), 2);
    }

    #[test]
    fn non_overflow_status_updates_error_only() {
        let (mut sink, _ring, shared) = sink_fixture(8);

        sink.ingest(block(&[0.0; 8], 1, Some("priming output")));

        assert_eq!(shared.overflows(), 0);
        assert_eq!(shared.last_error(), "priming output");
    }

    #[test]
    fn empty_status_is_ignored() {
        let (mut sink, _ring, shared) = sink_fixture(8);

        sink.ingest(block(&[0.0; 8], 1, Some("")));
        sink.ingest(block(&[0.0; 8], 1, None));

        assert_eq!(shared.overflows(), 0);
        assert!(shared.last_error().is_empty());
    }

    #[test]
    fn downmix_takes_the_first_channel() {
        let (mut sink, ring, _shared) = sink_fixture(8);

        // Stereo frames: left channel carries the signal.
        let interleaved = [0.1, 0.9, 0.2, 0.9, 0.3, 0.9, 0.4, 0.9];
        sink.ingest(block(&interleaved, 2, None));

        assert_eq!(ring.lock().read_window(4), vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn stamps_heartbeat_and_publishes_levels() {
        let (mut sink, _ring, shared) = sink_fixture(8);
        assert_eq!(shared.heartbeat_ms(), 0);

        sink.ingest(block(&[0.5; 8], 1, None));

        assert!(shared.heartbeat_ms() >= 1);
        assert!(shared.level_rms() > 0.0);
        assert!(shared.level_db() > -120.0);
        assert_eq!(shared.snapshot().callbacks, 1);
    }

    #[test]
    fn contended_ring_drops_the_block_but_keeps_the_heartbeat() {
        let (mut sink, ring, shared) = sink_fixture(8);

        let guard = ring.lock();
        sink.ingest(block(&[0.5; 8], 1, None));
        drop(guard);

        assert_eq!(shared.snapshot().dropped_blocks, 1);
        assert!(shared.heartbeat_ms() >= 1);
        assert_eq!(ring.lock().read_window(8), vec![0.0; 8]);
    }
}
