//! Round-trip latency accumulators, one per operation kind.

use std::time::Duration;

/// Samples are kept in full so mean and deviation can be read at any point.
/// The capacity is a hint sized from the expected operation count, the
/// accumulator grows past it instead of failing.
#[derive(Debug, Clone, Default)]
pub struct Latency {
    samples: Vec<Duration>,
}

impl Latency {
    pub fn with_capacity(expected_ops: usize) -> Self {
        Self {
            samples: Vec::with_capacity(expected_ops),
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.samples.push(elapsed)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Duration] {
        &self.samples
    }

    pub fn mean(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.mean_secs())
    }

    /// Population standard deviation over all recorded samples.
    pub fn std_dev(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let mean = self.mean_secs();
        let variance = self
            .samples
            .iter()
            .map(|sample| {
                let diff = sample.as_secs_f64() - mean;
                diff * diff
            })
            .sum::<f64>()
            / self.samples.len() as f64;
        Duration::from_secs_f64(variance.sqrt())
    }

    fn mean_secs(&self) -> f64 {
        self.samples
            .iter()
            .map(Duration::as_secs_f64)
            .sum::<f64>()
            / self.samples.len() as f64
    }
}
