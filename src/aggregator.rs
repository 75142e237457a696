//! Burst coalescing between the demultiplexer and consumers.
//!
//! Payloads accumulate in a pending batch and move to the bounded buffer on a
//! fixed flush cadence. Consumers are notified once per flush rather than once
//! per frame, which keeps a burst of hundreds of frames down to one update.

use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::trace;

use crate::buffer::RingBuffer;

/// What consumers see of a feed's data
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot<T> {
    /// Buffered payloads, oldest first
    pub items: Vec<T>,
    /// Last payload of the most recent flush
    pub latest: Option<T>,
    /// Flushes performed since the feed was created
    pub flush_count: u64,
}

impl<T> Default for FeedSnapshot<T> {
    fn default() -> Self {
        Self { items: Vec::new(), latest: None, flush_count: 0 }
    }
}

/// Result of a non-empty flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub flushed: usize,
    pub evicted: usize,
}

/// Pending batch, bounded buffer and the flush timer that moves one into the other
#[derive(Debug)]
pub struct Aggregator<T> {
    pending: Vec<T>,
    buffer: RingBuffer<T>,
    latest: Option<T>,
    flush_count: u64,
    throttle: Duration,
    timer: Option<Interval>,
}

impl<T: Clone> Aggregator<T> {
    /// Create an aggregator. `throttle` must be non-zero.
    pub fn new(capacity: usize, throttle: Duration) -> Self {
        Self {
            pending: Vec::new(),
            buffer: RingBuffer::new(capacity),
            latest: None,
            flush_count: 0,
            throttle,
            timer: None,
        }
    }

    /// Queue a payload for the next flush
    pub fn push(&mut self, item: T) {
        self.pending.push(item);
    }

    /// Move the pending batch into the buffer.
    ///
    /// Returns `None` (and changes nothing) when nothing is pending.
    pub fn flush(&mut self) -> Option<FlushReport> {
        if self.pending.is_empty() {
            return None;
        }

        let batch = std::mem::take(&mut self.pending);
        let flushed = batch.len();
        self.latest = batch.last().cloned();
        let evicted = self.buffer.extend(batch);
        self.flush_count += 1;

        trace!(flushed, evicted, buffered = self.buffer.len(), "Flushed pending batch");
        Some(FlushReport { flushed, evicted })
    }

    /// Empty buffer, latest and pending batch. The timer keeps running.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.buffer.clear();
        self.latest = None;
    }

    /// Drop pending payloads without delivering them
    pub fn discard_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// Start the flush cadence; the first tick is one throttle period from now
    pub fn arm(&mut self) {
        let mut timer = interval_at(Instant::now() + self.throttle, self.throttle);
        // Delay rather than burst after a stall
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
    }

    /// Cancel the flush timer
    pub fn disarm(&mut self) {
        self.timer = None;
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Wait for the next flush tick. Pends forever while disarmed.
    pub async fn tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot<T> {
        FeedSnapshot {
            items: self.buffer.to_vec(),
            latest: self.latest.clone(),
            flush_count: self.flush_count,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn latest(&self) -> Option<&T> {
        self.latest.as_ref()
    }

    pub fn flush_count(&self) -> u64 {
        self.flush_count
    }

    pub fn throttle(&self) -> Duration {
        self.throttle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_flush_per_batch_in_arrival_order() {
        let mut agg = Aggregator::new(10, Duration::from_millis(100));
        agg.push("a");
        agg.push("b");
        agg.push("c");
        assert!(agg.is_empty());

        assert_eq!(agg.flush(), Some(FlushReport { flushed: 3, evicted: 0 }));
        let snapshot = agg.snapshot();
        assert_eq!(snapshot.items, vec!["a", "b", "c"]);
        assert_eq!(snapshot.latest, Some("c"));
        assert_eq!(snapshot.flush_count, 1);
        assert_eq!(agg.pending_len(), 0);
    }

    #[test]
    fn empty_flush_is_a_no_op() {
        let mut agg: Aggregator<u32> = Aggregator::new(10, Duration::from_millis(100));
        assert_eq!(agg.flush(), None);
        assert_eq!(agg.flush_count(), 0);
        assert!(agg.latest().is_none());
    }

    #[test]
    fn capacity_keeps_last_n() {
        let mut agg = Aggregator::new(5, Duration::from_millis(100));
        for frame in 1..=8 {
            agg.push(frame);
            agg.flush();
        }
        assert_eq!(agg.snapshot().items, vec![4, 5, 6, 7, 8]);
        assert_eq!(agg.latest(), Some(&8));
        assert_eq!(agg.flush_count(), 8);
    }

    #[test]
    fn large_batch_reports_evictions() {
        let mut agg = Aggregator::new(3, Duration::from_millis(100));
        agg.push(1);
        agg.flush();
        for i in 2..=6 {
            agg.push(i);
        }
        assert_eq!(agg.flush(), Some(FlushReport { flushed: 5, evicted: 3 }));
        assert_eq!(agg.snapshot().items, vec![4, 5, 6]);
    }

    #[test]
    fn clear_empties_everything_but_the_counter() {
        let mut agg = Aggregator::new(5, Duration::from_millis(100));
        agg.push(1);
        agg.flush();
        agg.push(2);
        agg.clear();

        assert!(agg.is_empty());
        assert!(agg.latest().is_none());
        assert_eq!(agg.flush(), None);
        assert_eq!(agg.flush_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_one_period_out() {
        let mut agg: Aggregator<u8> = Aggregator::new(5, Duration::from_millis(100));
        let start = Instant::now();
        agg.arm();
        assert!(agg.is_armed());

        agg.tick().await;
        assert_eq!(Instant::now() - start, Duration::from_millis(100));
        agg.tick().await;
        assert_eq!(Instant::now() - start, Duration::from_millis(200));

        agg.disarm();
        assert!(!agg.is_armed());
        let waited = tokio::time::timeout(Duration::from_secs(5), agg.tick()).await;
        assert!(waited.is_err());
    }
}
