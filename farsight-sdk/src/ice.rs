//! ICE candidate queues and the trickling discipline.
//!
//! Outbound candidates are queued as the engine gathers them and
//! drained one per [`DRAIN_INTERVAL`] until local gathering completes.
//! Inbound candidates arriving before the remote description is set are
//! held in arrival order and flushed the moment it is. Both queues are
//! bounded; overflow drops the oldest entry and logs, absorbing
//! gathering bursts without unbounded memory.

use std::collections::VecDeque;
use std::time::Duration;

/// Queue bound for both directions.
pub const ICE_QUEUE_CAP: usize = 32;

/// Cadence of the outbound drain: one candidate every 100 ms.
pub const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// A bounded FIFO of opaque candidate blobs.
#[derive(Debug)]
pub struct CandidateQueue {
    buf: VecDeque<Vec<u8>>,
    cap: usize,
    label: &'static str,
}

impl CandidateQueue {
    pub fn new(label: &'static str) -> Self {
        Self { buf: VecDeque::with_capacity(ICE_QUEUE_CAP), cap: ICE_QUEUE_CAP, label }
    }

    /// Append a candidate, evicting the oldest one on overflow.
    pub fn push(&mut self, candidate: Vec<u8>) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
            tracing::warn!(queue = self.label, cap = self.cap, "ICE queue full, dropping oldest candidate");
        }
        self.buf.push_back(candidate);
    }

    pub fn pop(&mut self) -> Option<Vec<u8>> {
        self.buf.pop_front()
    }

    /// Remove and return everything, oldest first.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        self.buf.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(n: usize) -> Vec<u8> {
        format!("candidate-{n}").into_bytes()
    }

    #[test]
    fn fifo_order() {
        let mut q = CandidateQueue::new("test");
        for n in 0..4 {
            q.push(cand(n));
        }
        assert_eq!(q.pop(), Some(cand(0)));
        assert_eq!(q.drain(), vec![cand(1), cand(2), cand(3)]);
        assert!(q.is_empty());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut q = CandidateQueue::new("test");
        for n in 0..ICE_QUEUE_CAP + 3 {
            q.push(cand(n));
        }
        assert_eq!(q.len(), ICE_QUEUE_CAP);
        // The first three were evicted.
        assert_eq!(q.pop(), Some(cand(3)));
    }
}
