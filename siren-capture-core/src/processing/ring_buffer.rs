/// Fixed-capacity circular sample store.
///
/// Append-only write cursor; after any write the most recent `capacity`
/// samples are recoverable, older data is overwritten (lossy by design).
/// Wrap in `Arc<parking_lot::Mutex<RingBuffer>>` for cross-thread access
/// between the capture callback and the supervisor.
#[derive(Debug)]
pub struct RingBuffer {
    buffer: Vec<f32>,
    write: usize,
}

impl RingBuffer {
    /// Allocates the backing storage once; `write` never allocates again.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(1)],
            write: 0,
        }
    }

    /// Append samples, overwriting the oldest data on wrap.
    ///
    /// A write crossing the end of the backing storage is split into the
    /// tail segment and the wrapped head segment. A slice longer than the
    /// capacity contributes only its trailing `capacity` samples. Bounded
    /// time, no allocation.
    pub fn write(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        let capacity = self.buffer.len();
        let samples = if samples.len() > capacity {
            &samples[samples.len() - capacity..]
        } else {
            samples
        };

        let tail = capacity - self.write;
        if samples.len() <= tail {
            self.buffer[self.write..self.write + samples.len()].copy_from_slice(samples);
        } else {
            self.buffer[self.write..].copy_from_slice(&samples[..tail]);
            self.buffer[..samples.len() - tail].copy_from_slice(&samples[tail..]);
        }
        self.write = (self.write + samples.len()) % capacity;
    }

    /// Copy out the last `need` samples ending at the write cursor.
    ///
    /// Returns a freshly owned copy, never a reference into the live buffer
    /// (the buffer keeps mutating concurrently). `need` larger than the
    /// capacity is clamped.
    pub fn read_window(&self, need: usize) -> Vec<f32> {
        let capacity = self.buffer.len();
        let need = need.min(capacity);
        if need == 0 {
            return Vec::new();
        }

        let start = (self.write + capacity - need) % capacity;
        let mut window = Vec::with_capacity(need);
        if start < self.write {
            window.extend_from_slice(&self.buffer[start..self.write]);
        } else {
            window.extend_from_slice(&self.buffer[start..]);
            window.extend_from_slice(&self.buffer[..self.write]);
        }
        window
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}
