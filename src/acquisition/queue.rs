//! queue.rs
//! Thread-safe unbounded FIFO of samples; the sole handoff point between
//! the acquisition thread and the drain-and-publish consumer.
//!
//! Single producer, single consumer. Growth between drains is unbounded by
//! design: the consumer drains to empty every 100 ms and connections run at
//! single-digit-Hz to low-kHz rates, so the high-water mark stays small.

use crossbeam_queue::SegQueue;

/// Lock-free FIFO over `SegQueue`. `push` never blocks; `drain` pops until
/// empty and never blocks either.
#[derive(Default)]
pub struct SampleQueue {
    inner: SegQueue<f64>,
}

impl SampleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, sample: f64) {
        self.inner.push(sample);
    }

    /// Pop every currently queued sample, in push order. Returns an empty
    /// vec when nothing arrived since the last drain.
    pub fn drain(&self) -> Vec<f64> {
        let mut batch = Vec::with_capacity(self.inner.len());
        while let Some(sample) = self.inner.pop() {
            batch.push(sample);
        }
        batch
    }

    /// Discard pending samples. Used when a connection is torn down or
    /// replaced so a new run never sees stale readings.
    pub fn clear(&self) {
        while self.inner.pop().is_some() {}
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn drain_preserves_push_order() {
        let q = SampleQueue::new();
        for s in [3.0, 1.0, 4.0, 1.5] {
            q.push(s);
        }
        assert_eq!(q.drain(), vec![3.0, 1.0, 4.0, 1.5]);
        assert!(q.is_empty());
    }

    #[test]
    fn empty_drain_is_a_noop() {
        let q = SampleQueue::new();
        assert!(q.drain().is_empty());
        assert!(q.drain().is_empty());
    }

    #[test]
    fn clear_discards_pending_samples() {
        let q = SampleQueue::new();
        q.push(9.0);
        q.push(9.5);
        q.clear();
        assert!(q.drain().is_empty());
    }

    // FIFO law: every pushed sample lands in exactly one drained batch, in
    // push order, across an adversarial producer/consumer interleaving.
    #[test]
    fn concurrent_drains_lose_and_duplicate_nothing() {
        const N: u64 = 10_000;
        let q = Arc::new(SampleQueue::new());

        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                for i in 0..N {
                    q.push(i as f64);
                    if i % 97 == 0 {
                        thread::yield_now();
                    }
                }
            })
        };

        let mut seen = Vec::with_capacity(N as usize);
        while seen.len() < N as usize {
            seen.extend(q.drain());
        }
        producer.join().unwrap();
        seen.extend(q.drain());

        assert_eq!(seen.len(), N as usize);
        for (i, s) in seen.iter().enumerate() {
            assert_eq!(*s, i as f64, "sample {i} out of order or missing");
        }
    }
}
