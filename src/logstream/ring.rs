//! Bounded line buffer with a lifetime counter.

use std::collections::VecDeque;

/// Ordered lines, capped at `max`. When full, the oldest tenth is dropped
/// in one go. `total` counts every line ever pushed.
#[derive(Debug, Clone)]
pub struct LogRingBuffer {
    lines: VecDeque<String>,
    max: usize,
    total: u64,
}

impl LogRingBuffer {
    /// A buffer holding at most `max` lines (at least one).
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max: max.max(1),
            total: 0,
        }
    }

    pub fn push(&mut self, line: String) {
        self.lines.push_back(line);
        self.total += 1;
        if self.lines.len() > self.max {
            let evict = (self.max / 10).max(1);
            self.lines.drain(..evict);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max
    }

    /// Lines ever pushed, including evicted ones.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Copy of the buffered lines, oldest first.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    /// Lines pushed after the counter read `mark`, as far as still buffered.
    #[must_use]
    pub fn since(&self, mark: u64) -> Vec<String> {
        let fresh = usize::try_from(self.total.saturating_sub(mark)).unwrap_or(usize::MAX);
        let skip = self.lines.len().saturating_sub(fresh);
        self.lines.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.total = 0;
    }
}
