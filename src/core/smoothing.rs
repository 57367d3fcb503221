//! Fixed-window moving average over scalar channels.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of samples averaged per channel.
pub const DEFAULT_SMOOTHING_WINDOW: usize = 5;

/// A channel's raw sample alongside its trailing average.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SmoothedSignal {
    pub raw: f64,
    pub average: f64,
}

/// Sliding window of the last `capacity` samples of one channel.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: VecDeque<f64>,
    capacity: usize,
}

impl MovingAverage {
    /// Create a window holding `capacity` samples (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest beyond capacity, and return the
    /// mean of what remains.
    pub fn push(&mut self, sample: f64) -> f64 {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(sample);
        self.average()
    }

    /// Like [`push`](Self::push) but keeps the raw sample alongside.
    pub fn push_signal(&mut self, sample: f64) -> SmoothedSignal {
        SmoothedSignal {
            raw: sample,
            average: self.push(sample),
        }
    }

    /// Mean of the current window, 0.0 when empty.
    pub fn average(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_window_average() {
        let mut avg = MovingAverage::new(5);
        assert_eq!(avg.push(1.0), 1.0);
        assert_eq!(avg.push(3.0), 2.0);
        assert_eq!(avg.len(), 2);
    }

    #[test]
    fn test_eviction() {
        let mut avg = MovingAverage::new(3);
        for v in [1.0, 2.0, 3.0] {
            avg.push(v);
        }
        // 1.0 falls out
        assert!((avg.push(7.0) - 4.0).abs() < 1e-12);
        assert_eq!(avg.len(), 3);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut avg = MovingAverage::new(0);
        assert_eq!(avg.capacity(), 1);
        avg.push(5.0);
        assert_eq!(avg.push(9.0), 9.0);
    }

    #[test]
    fn test_signal_keeps_raw() {
        let mut avg = MovingAverage::default();
        avg.push(0.0);
        let signal = avg.push_signal(1.0);
        assert_eq!(signal.raw, 1.0);
        assert_eq!(signal.average, 0.5);
    }
}
