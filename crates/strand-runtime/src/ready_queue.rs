//! Per-worker ready queue
//!
//! Holds runnable tasks in either FIFO or LIFO order. FIFO gives every
//! connection a fair turn in the order it became ready; LIFO lets a
//! freshly-woken connection finish its burst while its data is still
//! cache-warm, at the cost of fairness under sustained load.
//!
//! Items enqueued as one batch (one notifier wakeup round) keep their
//! insertion order under both policies.

use std::collections::VecDeque;
use std::str::FromStr;

/// Ordering policy for the ready queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyPolicy {
    /// Fair: ready tasks run in the order they became ready
    Fifo,
    /// Burst-friendly: the most recently woken task runs first
    Lifo,
}

impl Default for ReadyPolicy {
    fn default() -> Self {
        ReadyPolicy::Fifo
    }
}

impl FromStr for ReadyPolicy {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fifo" => Ok(ReadyPolicy::Fifo),
            "lifo" => Ok(ReadyPolicy::Lifo),
            _ => Err("ready policy must be 'fifo' or 'lifo'"),
        }
    }
}

/// Queue of runnable items, mutated only by the owning worker thread
pub struct ReadyQueue<T> {
    queue: VecDeque<T>,
    policy: ReadyPolicy,
}

impl<T> ReadyQueue<T> {
    pub fn new(policy: ReadyPolicy) -> Self {
        Self {
            queue: VecDeque::new(),
            policy,
        }
    }

    /// Enqueue a single item per the policy.
    pub fn push(&mut self, item: T) {
        match self.policy {
            ReadyPolicy::Fifo => self.queue.push_back(item),
            ReadyPolicy::Lifo => self.queue.push_front(item),
        }
    }

    /// Enqueue a batch, preserving the batch's insertion order.
    ///
    /// Under LIFO the whole batch lands ahead of older entries but keeps
    /// its internal order, so tasks woken by the same notifier round run
    /// in the order their events were reported.
    pub fn push_batch<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        match self.policy {
            ReadyPolicy::Fifo => self.queue.extend(items),
            ReadyPolicy::Lifo => {
                for (i, item) in items.into_iter().enumerate() {
                    self.queue.insert(i, item);
                }
            }
        }
    }

    /// Pop the next runnable item.
    pub fn pop(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut q = ReadyQueue::new(ReadyPolicy::Fifo);
        q.push(1u32);
        q.push(2);
        q.push(3);
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_lifo_order() {
        let mut q = ReadyQueue::new(ReadyPolicy::Lifo);
        q.push(1u32);
        q.push(2);
        q.push(3);
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(1));
    }

    #[test]
    fn test_batch_keeps_insertion_order_fifo() {
        let mut q = ReadyQueue::new(ReadyPolicy::Fifo);
        q.push(0u32);
        q.push_batch([1, 2, 3]);
        assert_eq!(q.pop(), Some(0));
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
    }

    #[test]
    fn test_batch_keeps_insertion_order_lifo() {
        let mut q = ReadyQueue::new(ReadyPolicy::Lifo);
        q.push(0u32);
        q.push_batch([1, 2, 3]);
        // Batch jumps ahead of older work but keeps its own order
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.pop(), Some(0));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("fifo".parse::<ReadyPolicy>(), Ok(ReadyPolicy::Fifo));
        assert_eq!("LIFO".parse::<ReadyPolicy>(), Ok(ReadyPolicy::Lifo));
        assert!("stack".parse::<ReadyPolicy>().is_err());
    }
}
