use std::collections::VecDeque;

use super::WINDOW_SIZE;

/// Fixed-capacity sliding window over signed samples, exposing the true
/// median. A naive sorted-vec insert/remove is fine at this window size.
#[derive(Debug, Clone)]
pub struct RunningMedian {
    insertion_order: VecDeque<i64>,
    sorted: Vec<i64>,
    capacity: usize,
}

impl RunningMedian {
    pub fn new() -> Self {
        Self::with_capacity(WINDOW_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            insertion_order: VecDeque::with_capacity(capacity),
            sorted: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn insert(&mut self, sample: i64) {
        if self.insertion_order.len() == self.capacity {
            if let Some(oldest) = self.insertion_order.pop_front() {
                if let Ok(idx) = self.sorted.binary_search(&oldest) {
                    self.sorted.remove(idx);
                }
            }
        }
        self.insertion_order.push_back(sample);
        let idx = self.sorted.binary_search(&sample).unwrap_or_else(|e| e);
        self.sorted.insert(idx, sample);
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Resets the window, discarding all samples. Used when a secondary's
    /// process-start epoch changes (its skew history is no longer valid).
    pub fn reset(&mut self) {
        self.insertion_order.clear();
        self.sorted.clear();
    }

    /// Median of the current window; average of the two middles when the
    /// count is even, rounded to the nearest integer. 0 when empty.
    pub fn median(&self) -> i64 {
        let n = self.sorted.len();
        if n == 0 {
            return 0;
        }
        if n % 2 == 1 {
            self.sorted[n / 2]
        } else {
            let a = self.sorted[n / 2 - 1];
            let b = self.sorted[n / 2];
            ((a + b) as f64 / 2.0).round() as i64
        }
    }
}

impl Default for RunningMedian {
    fn default() -> Self {
        Self::new()
    }
}
