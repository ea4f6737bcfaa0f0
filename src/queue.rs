//! PendingQueue: the hand-off between kernel callbacks and the Courier.
//!
//! A FIFO of filenames plus a dedup set. A name enters at most once; it
//! stays in the dedup set from enqueue until its whole batch has been
//! resolved, so a storm of `release` calls on one file costs one
//! classification. Each entry carries the generation of the observation it
//! was enqueued for, which rides along to the verdict. Callers hold the
//! queue lock via the surrounding Mutex.

use std::collections::{HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct PendingQueue {
    /// (filename, generation) pairs waiting to be drained into a batch.
    queue: VecDeque<(String, u64)>,
    /// Names queued or currently in flight.
    tracked: HashSet<String>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a name unless it is already queued or in flight.
    /// Returns true if the name was actually added.
    pub fn push(&mut self, name: &str, generation: u64) -> bool {
        if self.tracked.contains(name) {
            return false;
        }
        self.queue.push_back((name.to_string(), generation));
        self.tracked.insert(name.to_string());
        true
    }

    /// Drain everything queued into a batch. The names remain tracked so
    /// duplicates arriving mid-flight are still suppressed.
    pub fn drain_batch(&mut self) -> Vec<(String, u64)> {
        self.queue.drain(..).collect()
    }

    /// A batch has been resolved (categorized or rejected): stop tracking.
    pub fn finish(&mut self, batch: &[(String, u64)]) {
        for (name, _) in batch {
            self.tracked.remove(name);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_tracked(&self, name: &str) -> bool {
        self.tracked.contains(name)
    }
}
