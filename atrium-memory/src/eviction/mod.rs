// Copyright 2026 atrium Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Eviction queues.
//!
//! Two ordered queues drive reclamation:
//!
//! - the dead queue files every entry without clients; prune passes discard their decoded data, then evict them;
//! - the live decoded queue files every entry with clients and a non-empty decoded representation; prune passes
//!   shrink them.
//!
//! Both are walked in [`Order`]: low priority first, then oldest first.

use std::collections::BTreeMap;

use atrium_common::strict_assert;
use itertools::Itertools;

use crate::record::{Entry, EntryId, Flags, Order};

/// One ordered queue.
#[derive(Debug, Default)]
pub struct Queue {
    entries: BTreeMap<Order, EntryId>,
}

impl Queue {
    pub fn push(&mut self, order: Order, id: EntryId) {
        let old = self.entries.insert(order, id);
        strict_assert!(old.is_none());
    }

    pub fn remove(&mut self, order: Order) -> Option<EntryId> {
        self.entries.remove(&order)
    }

    /// Eviction candidates in eviction order.
    ///
    /// Returned as a snapshot so the caller can mutate the queue while walking it.
    pub fn candidates(&self) -> Vec<EntryId> {
        self.entries.values().copied().collect_vec()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The dead queue and the live decoded queue.
#[derive(Debug, Default)]
pub struct Queues {
    pub dead: Queue,
    pub live_decoded: Queue,
}

impl Queues {
    /// File `entry` into the queue its current state belongs to, if any.
    pub fn file(&mut self, id: EntryId, entry: &mut Entry) {
        strict_assert!(!entry.flags().intersects(Flags::IN_DEAD_QUEUE | Flags::IN_LIVE_DECODED_QUEUE));

        if !entry.is_live() {
            self.dead.push(entry.order(), id);
            entry.set_flags(Flags::IN_DEAD_QUEUE, true);
        } else if entry.sizes().decoded > 0 {
            self.live_decoded.push(entry.order(), id);
            entry.set_flags(Flags::IN_LIVE_DECODED_QUEUE, true);
        }
    }

    /// Take `entry` out of whichever queue holds it.
    pub fn unfile(&mut self, entry: &mut Entry) {
        if entry.flags().contains(Flags::IN_DEAD_QUEUE) {
            let removed = self.dead.remove(entry.order());
            strict_assert!(removed.is_some());
            entry.set_flags(Flags::IN_DEAD_QUEUE, false);
        }
        if entry.flags().contains(Flags::IN_LIVE_DECODED_QUEUE) {
            let removed = self.live_decoded.remove(entry.order());
            strict_assert!(removed.is_some());
            entry.set_flags(Flags::IN_LIVE_DECODED_QUEUE, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{key::CacheKey, resource::DecodePriority, test_utils::TestResource};

    fn entry(seq: u64, clients: usize, decoded: usize) -> Entry {
        let resource = Arc::new(
            TestResource::new(format!("http://x/{seq}"))
                .with_encoded_size(1)
                .with_decoded_size(decoded)
                .with_clients(clients),
        );
        let key = CacheKey::of(resource.as_ref());
        Entry::new(resource, key, seq)
    }

    #[test]
    fn test_queue_order() {
        let mut queue = Queue::default();
        let order = |priority, seq| Order { priority, seq };

        queue.push(order(DecodePriority::High, 1), EntryId(1));
        queue.push(order(DecodePriority::Low, 3), EntryId(3));
        queue.push(order(DecodePriority::Low, 2), EntryId(2));
        queue.push(order(DecodePriority::High, 0), EntryId(0));

        assert_eq!(queue.candidates(), vec![EntryId(2), EntryId(3), EntryId(0), EntryId(1)]);

        assert_eq!(queue.remove(order(DecodePriority::Low, 3)), Some(EntryId(3)));
        assert_eq!(queue.remove(order(DecodePriority::Low, 3)), None);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_file_by_state() {
        let mut queues = Queues::default();

        let mut dead = entry(0, 0, 8);
        let mut live_decoded = entry(1, 2, 8);
        let mut live_encoded_only = entry(2, 1, 0);

        queues.file(EntryId(0), &mut dead);
        queues.file(EntryId(1), &mut live_decoded);
        queues.file(EntryId(2), &mut live_encoded_only);

        assert_eq!(queues.dead.candidates(), vec![EntryId(0)]);
        assert_eq!(queues.live_decoded.candidates(), vec![EntryId(1)]);
        assert!(dead.flags().contains(Flags::IN_DEAD_QUEUE));
        assert!(live_decoded.flags().contains(Flags::IN_LIVE_DECODED_QUEUE));
        assert!(!live_encoded_only
            .flags()
            .intersects(Flags::IN_DEAD_QUEUE | Flags::IN_LIVE_DECODED_QUEUE));

        queues.unfile(&mut live_decoded);
        live_decoded.set_live(false);
        queues.file(EntryId(1), &mut live_decoded);
        assert_eq!(queues.dead.candidates(), vec![EntryId(0), EntryId(1)]);
        assert!(queues.live_decoded.is_empty());

        queues.unfile(&mut dead);
        queues.unfile(&mut live_decoded);
        queues.unfile(&mut live_encoded_only);
        assert!(queues.dead.is_empty());
        assert!(dead.flags().is_empty());
    }
}
