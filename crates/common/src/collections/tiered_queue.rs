#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

//! Tiered FIFO queue backed by one [`std::collections::VecDeque`] per tier.
//!
//! Tier `0` is the lowest priority and tier `tier_count - 1` the highest.
//! Items inside a tier keep insertion order; [`TieredQueue::pop_highest`]
//! always serves the head of the highest non-empty tier.
//!
//! # Complexity
//! - `push_back`: `O(1)` amortised
//! - `pop_highest`: `O(tiers)`
//! - `len`: `O(1)`
//!
//! # Panic Safety
//! All provided APIs are panic-free. Out-of-range tiers are clamped, never
//! rejected.
//!
//! # Examples
//! ```
//! use tidelink_common::collections::TieredQueue;
//!
//! let mut queue = TieredQueue::new(3);
//! queue.push_back(0, "background");
//! queue.push_back(2, "urgent");
//! queue.push_back(2, "urgent-2");
//!
//! assert_eq!(queue.pop_highest(), Some((2, "urgent")));
//! assert_eq!(queue.pop_highest(), Some((2, "urgent-2")));
//! assert_eq!(queue.pop_highest(), Some((0, "background")));
//! assert!(queue.is_empty());
//! ```

use std::collections::VecDeque;
use std::fmt;

/// An ordered array of FIFO queues, one per priority tier.
pub struct TieredQueue<T> {
    tiers: Vec<VecDeque<T>>,
    len: usize,
}

impl<T> TieredQueue<T> {
    /// Creates a queue with `tier_count` tiers (at least one).
    #[must_use]
    pub fn new(tier_count: usize) -> Self {
        let tier_count = tier_count.max(1);
        Self { tiers: (0..tier_count).map(|_| VecDeque::new()).collect(), len: 0 }
    }

    /// Number of tiers this queue was created with.
    #[must_use]
    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Clamps an arbitrary priority into `[0, tier_count - 1]`.
    #[must_use]
    pub fn clamp_tier(&self, priority: i64) -> usize {
        let highest = self.tiers.len().saturating_sub(1);
        if priority <= 0 {
            0
        } else {
            usize::try_from(priority).map_or(highest, |tier| tier.min(highest))
        }
    }

    /// Appends `item` to the tail of `tier`, clamping the tier when out of
    /// range. Returns the tier actually used.
    pub fn push_back(&mut self, tier: usize, item: T) -> usize {
        let tier = tier.min(self.tiers.len().saturating_sub(1));
        if let Some(queue) = self.tiers.get_mut(tier) {
            queue.push_back(item);
            self.len += 1;
        }
        tier
    }

    /// Removes the head of the highest non-empty tier.
    pub fn pop_highest(&mut self) -> Option<(usize, T)> {
        for (tier, queue) in self.tiers.iter_mut().enumerate().rev() {
            if let Some(item) = queue.pop_front() {
                self.len -= 1;
                return Some((tier, item));
            }
        }
        None
    }

    /// Borrows the item [`Self::pop_highest`] would return next.
    #[must_use]
    pub fn peek_highest(&self) -> Option<(usize, &T)> {
        self.tiers
            .iter()
            .enumerate()
            .rev()
            .find_map(|(tier, queue)| queue.front().map(|item| (tier, item)))
    }

    /// Number of items waiting in `tier` (zero for unknown tiers).
    #[must_use]
    pub fn tier_len(&self, tier: usize) -> usize {
        self.tiers.get(tier).map_or(0, VecDeque::len)
    }

    /// Total number of queued items across all tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when every tier is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes every item, highest tier first, preserving FIFO order within
    /// each tier.
    pub fn drain_all(&mut self) -> Vec<(usize, T)> {
        let mut drained = Vec::with_capacity(self.len);
        for (tier, queue) in self.tiers.iter_mut().enumerate().rev() {
            drained.extend(queue.drain(..).map(|item| (tier, item)));
        }
        self.len = 0;
        drained
    }
}

impl<T> fmt::Debug for TieredQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sizes: Vec<usize> = self.tiers.iter().map(VecDeque::len).collect();
        f.debug_struct("TieredQueue").field("len", &self.len).field("tiers", &sizes).finish()
    }
}
