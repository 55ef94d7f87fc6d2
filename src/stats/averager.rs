use std::collections::VecDeque;

use super::WINDOW_SIZE;

/// Fixed-capacity ring of the last `WINDOW_SIZE` latency samples (milliseconds).
#[derive(Debug, Clone)]
pub struct LatencyAverager {
    samples: VecDeque<i64>,
    capacity: usize,
}

impl LatencyAverager {
    pub fn new() -> Self {
        Self::with_capacity(WINDOW_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn add(&mut self, sample: i64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn min(&self) -> i64 {
        self.samples.iter().copied().min().unwrap_or(0)
    }

    pub fn max(&self) -> i64 {
        self.samples.iter().copied().max().unwrap_or(0)
    }

    pub fn last(&self) -> i64 {
        self.samples.back().copied().unwrap_or(0)
    }

    /// Rounded integer mean of the stored samples; 0 when empty.
    pub fn int_avg(&self) -> i64 {
        if self.samples.is_empty() {
            return 0;
        }
        let sum: i64 = self.samples.iter().sum();
        let avg = sum as f64 / self.samples.len() as f64;
        avg.round() as i64
    }
}

impl Default for LatencyAverager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_averager_reads_zero() {
        let a = LatencyAverager::new();
        assert_eq!(a.min(), 0);
        assert_eq!(a.max(), 0);
        assert_eq!(a.last(), 0);
        assert_eq!(a.int_avg(), 0);
        assert_eq!(a.len(), 0);
    }

    #[test]
    fn tracks_min_max_last_avg() {
        let mut a = LatencyAverager::new();
        for x in [10, 30, 20, 5, 25] {
            a.add(x);
        }
        assert_eq!(a.min(), 5);
        assert_eq!(a.max(), 30);
        assert_eq!(a.last(), 25);
        assert_eq!(a.int_avg(), 18); // (10+30+20+5+25)/5 = 18.0
        assert_eq!(a.len(), 5);
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut a = LatencyAverager::with_capacity(3);
        a.add(1);
        a.add(2);
        a.add(3);
        a.add(4); // evicts 1
        assert_eq!(a.len(), 3);
        assert_eq!(a.min(), 2);
        assert_eq!(a.max(), 4);
        assert_eq!(a.last(), 4);
    }

    #[test]
    fn rounds_half_up() {
        let mut a = LatencyAverager::new();
        a.add(1);
        a.add(2); // mean 1.5 -> rounds to 2
        assert_eq!(a.int_avg(), 2);
    }
}
