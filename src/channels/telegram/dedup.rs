//! Telegram update deduplication

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

const DEDUP_TTL: Duration = Duration::from_secs(300);
const DEDUP_MAX_ENTRIES: usize = 2000;

/// Remembers recently seen `update_id`s
///
/// Telegram redelivers a webhook update when the acknowledgement is slow or
/// lost; polling can overlap after a restart. Entries expire after a TTL and
/// the oldest are dropped once the cap is reached.
#[derive(Debug)]
pub struct UpdateDedup {
    seen: HashMap<i64, Instant>,
    order: VecDeque<i64>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for UpdateDedup {
    fn default() -> Self {
        Self::new(DEDUP_TTL, DEDUP_MAX_ENTRIES)
    }
}

impl UpdateDedup {
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            seen: HashMap::new(),
            order: VecDeque::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Returns `true` if `update_id` was already seen within the TTL,
    /// otherwise records it and returns `false`.
    pub fn is_duplicate(&mut self, update_id: i64) -> bool {
        let now = Instant::now();
        self.evict(now);

        if self.seen.contains_key(&update_id) {
            return true;
        }

        self.seen.insert(update_id, now);
        self.order.push_back(update_id);
        false
    }

    /// Number of remembered updates
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&oldest) = self.order.front() {
            let expired = self
                .seen
                .get(&oldest)
                .is_none_or(|at| now.duration_since(*at) >= self.ttl);
            if !expired && self.order.len() < self.max_entries {
                break;
            }
            self.order.pop_front();
            self.seen.remove(&oldest);
        }
    }
}
