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

use std::fmt::Debug;

use bitflags::bitflags;

use crate::{
    key::CacheKey,
    resource::{DecodePriority, Resource, ResourceRef},
};

/// Stable handle of an entry inside one cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub(crate) u64);

/// The three size dimensions of a resource, as last reported to the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sizes {
    /// Bytes of the payload as fetched.
    pub encoded: usize,
    /// Bytes of the decoded representation.
    pub decoded: usize,
    /// Bookkeeping bytes.
    pub overhead: usize,
}

impl Sizes {
    /// Read the current sizes of `resource`.
    pub fn of(resource: &dyn Resource) -> Self {
        Self {
            encoded: resource.encoded_size(),
            decoded: resource.decoded_size(),
            overhead: resource.overhead_size(),
        }
    }

    /// Bytes charged against the cache capacity.
    pub fn charge(&self) -> usize {
        self.encoded + self.decoded + self.overhead
    }
}

/// Position of an entry in an eviction queue.
///
/// Ascending order is eviction order: low priority before high priority, older before newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Order {
    pub(crate) priority: DecodePriority,
    pub(crate) seq: u64,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u8 {
        /// At least one client.
        const LIVE = 0b0001;
        /// Filed in the dead queue.
        const IN_DEAD_QUEUE = 0b0010;
        /// Filed in the live decoded queue.
        const IN_LIVE_DECODED_QUEUE = 0b0100;
        /// Pruned at least once since it became dead.
        const PRUNED = 0b1000;
    }
}

/// [`Entry`] holds a cached resource and the cache-local metadata the ledger and queues rely on.
pub struct Entry {
    resource: ResourceRef,
    key: CacheKey,
    sizes: Sizes,
    priority: DecodePriority,
    seq: u64,
    flags: Flags,
}

impl Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("sizes", &self.sizes)
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .field("flags", &self.flags)
            .finish()
    }
}

impl Entry {
    pub(crate) fn new(resource: ResourceRef, key: CacheKey, seq: u64) -> Self {
        let sizes = Sizes::of(resource.as_ref());
        let mut flags = Flags::empty();
        flags.set(Flags::LIVE, resource.client_count() > 0);
        Self {
            resource,
            key,
            sizes,
            priority: DecodePriority::default(),
            seq,
            flags,
        }
    }

    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    pub fn into_resource(self) -> ResourceRef {
        self.resource
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn sizes(&self) -> Sizes {
        self.sizes
    }

    pub fn priority(&self) -> DecodePriority {
        self.priority
    }

    pub fn order(&self) -> Order {
        Order {
            priority: self.priority,
            seq: self.seq,
        }
    }

    pub fn is_live(&self) -> bool {
        self.flags.contains(Flags::LIVE)
    }

    pub fn is_pruned(&self) -> bool {
        self.flags.contains(Flags::PRUNED)
    }

    pub(crate) fn flags(&self) -> Flags {
        self.flags
    }

    pub(crate) fn set_flags(&mut self, flags: Flags, val: bool) {
        self.flags.set(flags, val);
    }

    /// Flip liveness. A dead entry that comes back to life forgets it was pruned.
    pub(crate) fn set_live(&mut self, live: bool) {
        self.flags.set(Flags::LIVE, live);
        if live {
            self.flags.remove(Flags::PRUNED);
        }
    }

    /// Must only be called while the entry is out of every queue.
    pub(crate) fn set_sizes(&mut self, sizes: Sizes) {
        self.sizes = sizes;
    }

    /// Must only be called while the entry is out of every queue.
    pub(crate) fn set_priority(&mut self, priority: DecodePriority) {
        self.priority = priority;
    }

    /// Must only be called while the entry is out of every queue.
    pub(crate) fn touch(&mut self, seq: u64) {
        self.seq = seq;
    }
}
