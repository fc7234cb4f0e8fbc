/// Numerical floor inside the RMS and log computations, avoids log of zero.
const EPSILON: f64 = 1e-12;

/// Smoothing constant: fast enough to track speech-level changes, slow
/// enough to suppress single-block spikes.
const SMOOTHING_ALPHA: f64 = 0.20;

/// Exponential-moving-average RMS/dB estimator, updated once per block.
#[derive(Debug, Clone)]
pub struct LevelMeter {
    meter: f64,
    alpha: f64,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self {
            meter: 0.0,
            alpha: SMOOTHING_ALPHA,
        }
    }

    /// Feed one block; returns the smoothed RMS and its decibel value.
    pub fn update(&mut self, samples: &[f32]) -> (f32, f32) {
        let mean_sq = if samples.is_empty() {
            0.0
        } else {
            samples
                .iter()
                .map(|&s| f64::from(s) * f64::from(s))
                .sum::<f64>()
                / samples.len() as f64
        };
        let instant = (mean_sq + EPSILON).sqrt();
        self.meter = self.alpha * instant + (1.0 - self.alpha) * self.meter;
        let db = 20.0 * (self.meter + EPSILON).log10();
        (self.meter as f32, db as f32)
    }

    /// The current smoothed RMS estimate.
    pub fn level(&self) -> f32 {
        self.meter as f32
    }
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new()
    }
}
