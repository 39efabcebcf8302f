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

use std::{fmt::Debug, sync::Arc, time::Instant};

use atrium_common::{
    clock::Clock,
    error::{Error, Result},
    metrics::Metrics,
    strict_assert, strict_assert_eq,
};
use hashbrown::HashMap;
use itertools::Itertools;

use crate::{
    config::{validate_capacities, PruneConfig},
    eviction::Queues,
    indexer::Indexer,
    key::CacheKey,
    ledger::Ledger,
    record::{Entry, EntryId, Flags, Sizes},
    resource::{is_same_resource, DecodePriority, Resource, ResourceRef, UpdateReason},
    statistics::Statistics,
};

/// Progress of the deferred prune.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PruneState {
    /// Nothing scheduled.
    #[default]
    Idle,
    /// A prune pass waits for the end of the current task.
    PendingPrune,
    /// A prune pass is running.
    Pruning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassKind {
    /// Dead entries only, after an explicit prune or when dead usage leaves the hysteresis band.
    Dead,
    /// Task boundary: dead entries, then live entries if the deferral guard allows it.
    Boundary,
    /// Memory pressure: every evictable dead entry and every live decoded representation.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    DeadShrink,
    DeadEvict,
    LiveShrink,
    Done,
    Finished,
}

/// A prune pass in progress, driven by [`RawCache::step`].
///
/// The engine never discards decoded data itself. Each step hands out the next entry to shrink and the caller
/// calls [`Resource::destroy_decoded_data_if_possible`] with the lock released, so a resource may report its new
/// sizes to the cache from there. [`RawCache::finish_shrink`] then re-reads the sizes.
#[derive(Debug)]
pub struct PrunePass {
    kind: PassKind,
    stage: Stage,
    now: Instant,
    target: usize,
    candidates: std::vec::IntoIter<EntryId>,

    shrunk_dead: usize,
    evicted: usize,
    shrunk_live: usize,
    deferred: bool,
}

/// An entry a pass wants to shrink.
#[derive(Debug)]
pub struct ShrinkTarget {
    id: EntryId,
    resource: ResourceRef,
}

impl ShrinkTarget {
    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }
}

/// Single-threaded cache engine. [`crate::MemoryCache`] wraps it with a lock.
///
/// Resources leaving the cache are collected as garbages and must be dropped by the caller after the lock is
/// released, because dropping the last reference may run arbitrary user code. The same applies to schedule
/// requests of the task hook and to the decoded data discards of prune passes.
pub struct RawCache {
    config: PruneConfig,

    indexer: Indexer,
    entries: HashMap<EntryId, Entry>,
    queues: Queues,
    ledger: Ledger,

    state: PruneState,
    last_live_shrink: Option<Instant>,
    schedule_requested: bool,
    dead_prune_requested: bool,

    next_id: u64,
    next_seq: u64,

    garbages: Vec<ResourceRef>,

    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
}

impl Debug for RawCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawCache")
            .field("config", &self.config)
            .field("ledger", &self.ledger)
            .field("entries", &self.entries.len())
            .field("dead", &self.queues.dead.len())
            .field("live_decoded", &self.queues.live_decoded.len())
            .field("state", &self.state)
            .finish()
    }
}

impl RawCache {
    pub fn new(config: PruneConfig, clock: Arc<dyn Clock>, metrics: Arc<Metrics>) -> Self {
        Self {
            config,
            indexer: Indexer::default(),
            entries: HashMap::default(),
            queues: Queues::default(),
            ledger: Ledger::default(),
            state: PruneState::Idle,
            last_live_shrink: None,
            schedule_requested: false,
            dead_prune_requested: false,
            next_id: 0,
            next_seq: 0,
            garbages: vec![],
            clock,
            metrics,
        }
    }

    pub fn add(&mut self, resource: ResourceRef) -> Result<()> {
        let key = CacheKey::of(resource.as_ref());
        if self.indexer.get(&key).is_some() {
            return Err(Error::duplicate_key(key.identifier(), key.url()));
        }

        self.attach(resource, key);
        self.metrics.memory_add.increment(1);
        self.may_request_prune();
        Ok(())
    }

    /// Returns `false` if `resource` is not the resource currently cached under its key.
    pub fn remove(&mut self, resource: &dyn Resource) -> bool {
        let Some(id) = self.find(resource) else {
            tracing::debug!("[memory]: ignore removal of {}, not cached", CacheKey::of(resource));
            return false;
        };

        self.release(id);
        self.metrics.memory_remove.increment(1);
        true
    }

    /// Swap `old` for `new`.
    ///
    /// A no-op if `old` has already left the cache. Fails if `new` maps to a key held by another resource.
    pub fn replace(&mut self, new: ResourceRef, old: &dyn Resource) -> Result<()> {
        let Some(old_id) = self.find(old) else {
            tracing::debug!("[memory]: ignore replacement of {}, not cached", CacheKey::of(old));
            return Ok(());
        };
        if is_same_resource(&new, old) {
            return Ok(());
        }

        let key = CacheKey::of(new.as_ref());
        if let Some(id) = self.indexer.get(&key) {
            if id != old_id {
                return Err(Error::duplicate_key(key.identifier(), key.url()));
            }
        }

        let live = new.client_count() > 0;
        self.release(old_id);
        self.attach(new, key);
        self.metrics.memory_replace.increment(1);
        if live {
            self.may_request_prune();
        } else {
            self.on_dead();
        }
        Ok(())
    }

    pub fn contains(&self, resource: &dyn Resource) -> bool {
        self.find(resource).is_some()
    }

    pub fn resource_for_url(&self, url: &str, identifier: &str) -> Option<ResourceRef> {
        let resource = self
            .indexer
            .get(&CacheKey::new(url, identifier))
            .and_then(|id| self.entries.get(&id))
            .map(|entry| entry.resource().clone());
        match resource {
            Some(_) => self.metrics.memory_hit.increment(1),
            None => self.metrics.memory_miss.increment(1),
        }
        resource
    }

    pub fn resources_for_url(&self, url: &str) -> Vec<ResourceRef> {
        self.indexer
            .lookup_all(url)
            .into_iter()
            .filter_map(|id| self.entries.get(&id))
            .map(|entry| entry.resource().clone())
            .collect_vec()
    }

    /// Re-read the client count of `resource` and move it between the live and the dead side.
    pub fn update_clients(&mut self, resource: &dyn Resource) {
        let Some(id) = self.find(resource) else {
            return;
        };
        let live = resource.client_count() > 0;
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        if entry.is_live() == live {
            return;
        }

        self.queues.unfile(entry);
        self.ledger.transfer(live, entry.sizes());
        entry.set_live(live);
        self.queues.file(id, entry);
        tracing::trace!("[memory]: {} becomes {}", entry.key(), if live { "live" } else { "dead" });

        if live {
            self.may_request_prune();
        } else {
            self.on_dead();
        }
    }

    /// Re-read the sizes of `resource`.
    pub fn update_size(&mut self, resource: &dyn Resource) {
        let Some(id) = self.find(resource) else {
            return;
        };
        let sizes = Sizes::of(resource);
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        if entry.sizes() == sizes {
            return;
        }

        self.queues.unfile(entry);
        Self::apply_sizes(&mut self.ledger, entry, sizes);
        self.queues.file(id, entry);
        self.may_request_prune();
    }

    /// Record that the decoded representation of `resource` was used or changed.
    ///
    /// Sizes are re-read in both cases. An access also makes the entry the newest in its queue. A priority is only
    /// applied to live entries: dead entries are pruned by age and priority alone.
    pub fn update_decoded_resource(
        &mut self,
        resource: &dyn Resource,
        reason: UpdateReason,
        priority: Option<DecodePriority>,
    ) {
        let Some(id) = self.find(resource) else {
            return;
        };
        let sizes = Sizes::of(resource);
        let seq = match reason {
            UpdateReason::Access => Some(self.bump_seq()),
            UpdateReason::PropertyChange => None,
        };
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };

        self.queues.unfile(entry);
        if let Some(priority) = priority {
            if entry.is_live() {
                entry.set_priority(priority);
            } else {
                tracing::trace!("[memory]: ignore priority {priority:?} of dead {}", entry.key());
            }
        }
        Self::apply_sizes(&mut self.ledger, entry, sizes);
        if let Some(seq) = seq {
            entry.touch(seq);
        }
        self.queues.file(id, entry);
        self.may_request_prune();
    }

    /// Request an immediate pass over dead entries. Live entries are left to the pass at the end of the current
    /// task.
    pub fn prune(&mut self) {
        self.dead_prune_requested = true;
    }

    /// Start the pending task boundary pass, if any.
    pub fn begin_boundary_pass(&mut self) -> Option<PrunePass> {
        if self.state != PruneState::PendingPrune {
            return None;
        }
        self.state = PruneState::Pruning;
        Some(self.begin(PassKind::Boundary))
    }

    /// Start a pass that evicts every dead entry that is not pinned and discards every live decoded
    /// representation, ignoring capacities and deferral.
    pub fn begin_prune_all(&mut self) -> PrunePass {
        self.state = PruneState::Pruning;
        self.begin(PassKind::All)
    }

    /// The dead pass requested by the last operations, if any.
    pub fn take_dead_pass(&mut self) -> Option<PrunePass> {
        std::mem::take(&mut self.dead_prune_requested).then(|| self.begin(PassKind::Dead))
    }

    /// Advance `pass` until it has an entry to shrink. Returns `None` once the pass is over.
    pub fn step(&mut self, pass: &mut PrunePass) -> Option<ShrinkTarget> {
        loop {
            match pass.stage {
                Stage::DeadShrink => {
                    if let Some(target) = self.next_dead_shrink(pass) {
                        pass.shrunk_dead += 1;
                        return Some(target);
                    }
                    pass.stage = Stage::DeadEvict;
                }
                Stage::DeadEvict => {
                    self.evict_dead(pass);
                    self.leave_dead_stages(pass);
                }
                Stage::LiveShrink => {
                    if let Some(target) = self.next_live_shrink(pass) {
                        pass.shrunk_live += 1;
                        return Some(target);
                    }
                    pass.stage = Stage::Done;
                }
                Stage::Done => {
                    pass.stage = Stage::Finished;
                    self.finish(pass);
                }
                Stage::Finished => return None,
            }
        }
    }

    /// Re-read the sizes of a shrunk entry. A no-op if it left the cache meanwhile.
    pub fn finish_shrink(&mut self, target: &ShrinkTarget) {
        let Some(entry) = self.entries.get_mut(&target.id) else {
            return;
        };
        strict_assert!(is_same_resource(entry.resource(), target.resource.as_ref()));
        let sizes = Sizes::of(target.resource.as_ref());

        self.queues.unfile(entry);
        Self::apply_sizes(&mut self.ledger, entry, sizes);
        if !entry.is_live() && sizes.decoded == 0 {
            entry.set_flags(Flags::PRUNED, true);
        }
        self.queues.file(target.id, entry);

        self.metrics.memory_shrink.increment(1);
        tracing::trace!("[memory]: shrink {entry:?}");
    }

    /// Drop every entry.
    pub fn evict_resources(&mut self) -> usize {
        let ids = self.indexer.clear();
        let count = ids.len();
        for id in ids {
            self.release(id);
        }

        strict_assert!(self.entries.is_empty());
        strict_assert!(self.queues.dead.is_empty() && self.queues.live_decoded.is_empty());
        strict_assert_eq!(self.ledger, Ledger::default());

        self.metrics.memory_remove.increment(count as u64);
        tracing::debug!("[memory]: evict all {count} resources");
        count
    }

    /// Drop every entry of the partition `identifier`.
    pub fn evict_partition(&mut self, identifier: &str) -> usize {
        let ids = self.indexer.drain_partition(identifier);
        let count = ids.len();
        for id in ids {
            self.release(id);
        }
        self.metrics.memory_remove.increment(count as u64);
        tracing::debug!("[memory]: evict {count} resources of partition {identifier:?}");
        count
    }

    /// Drop every entry of `url` in every partition.
    pub fn remove_url(&mut self, url: &str) -> usize {
        let ids = self.indexer.lookup_all(url);
        let count = ids.len();
        for id in ids {
            self.release(id);
        }
        self.metrics.memory_remove.increment(count as u64);
        count
    }

    /// Reconfigure capacities and prune against them.
    pub fn set_capacities(&mut self, min_dead_capacity: usize, max_dead_capacity: usize, capacity: usize) -> Result<()> {
        validate_capacities(min_dead_capacity, max_dead_capacity, capacity)?;
        self.config.min_dead_capacity = min_dead_capacity;
        self.config.max_dead_capacity = max_dead_capacity;
        self.config.capacity = capacity;
        self.last_live_shrink = None;
        tracing::debug!(
            "[memory]: set capacities, min dead: {min_dead_capacity}, max dead: {max_dead_capacity}, total: {capacity}"
        );
        self.prune();
        Ok(())
    }

    pub fn config(&self) -> &PruneConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PruneConfig {
        &mut self.config
    }

    pub fn dead_capacity(&self) -> usize {
        self.config.dead_capacity(self.ledger.live_size())
    }

    pub fn live_capacity(&self) -> usize {
        self.config.live_capacity(self.ledger.live_size())
    }

    pub fn size(&self) -> usize {
        self.ledger.size()
    }

    pub fn live_size(&self) -> usize {
        self.ledger.live_size()
    }

    pub fn dead_size(&self) -> usize {
        self.ledger.dead_size()
    }

    pub fn decoded_size(&self) -> usize {
        self.ledger.decoded_size()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn partitions(&self) -> Vec<String> {
        self.indexer.partitions().map(str::to_string).sorted().collect_vec()
    }

    pub fn prune_state(&self) -> PruneState {
        self.state
    }

    pub fn statistics(&self) -> Statistics {
        let mut statistics = Statistics::default();
        for entry in self.entries.values() {
            statistics.record(entry);
        }
        statistics
    }

    /// Resources released by the last operations, to be dropped outside the lock.
    pub fn take_garbages(&mut self) -> Vec<ResourceRef> {
        std::mem::take(&mut self.garbages)
    }

    /// Whether the task hook must be called since the last take.
    pub fn take_schedule_request(&mut self) -> bool {
        std::mem::take(&mut self.schedule_requested)
    }

    pub fn publish_usage(&self) {
        self.metrics.memory_live_usage.set(self.ledger.live_size() as f64);
        self.metrics.memory_dead_usage.set(self.ledger.dead_size() as f64);
        self.metrics.memory_decoded_usage.set(self.ledger.decoded_size() as f64);
    }

    /// Recompute every aggregate and membership from scratch and compare with the incremental bookkeeping.
    #[cfg(any(test, feature = "sanity"))]
    pub fn verify(&self) {
        let mut ledger = Ledger::default();
        let mut dead = 0;
        let mut live_decoded = 0;

        for (id, entry) in self.entries.iter() {
            ledger.charge(entry.is_live(), entry.sizes());
            assert_eq!(self.indexer.get(entry.key()), Some(*id), "{entry:?}");
            assert_eq!(entry.sizes(), Sizes::of(entry.resource().as_ref()), "{entry:?}");

            if !entry.is_live() {
                dead += 1;
                assert!(entry.flags().contains(Flags::IN_DEAD_QUEUE), "{entry:?}");
            } else if entry.sizes().decoded > 0 {
                live_decoded += 1;
                assert!(entry.flags().contains(Flags::IN_LIVE_DECODED_QUEUE), "{entry:?}");
            }
            if entry.is_pruned() {
                assert!(!entry.is_live() && entry.sizes().decoded == 0, "{entry:?}");
            }
        }

        assert_eq!(ledger, self.ledger);
        assert_eq!(self.indexer.len(), self.entries.len());
        assert_eq!(self.queues.dead.len(), dead);
        assert_eq!(self.queues.live_decoded.len(), live_decoded);
    }
}

impl RawCache {
    fn find(&self, resource: &dyn Resource) -> Option<EntryId> {
        let id = self.indexer.get(&CacheKey::of(resource))?;
        let entry = self.entries.get(&id)?;
        is_same_resource(entry.resource(), resource).then_some(id)
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn attach(&mut self, resource: ResourceRef, key: CacheKey) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        let seq = self.bump_seq();

        let mut entry = Entry::new(resource, key, seq);
        self.ledger.charge(entry.is_live(), entry.sizes());
        self.queues.file(id, &mut entry);
        let old = self.indexer.insert(entry.key(), id);
        strict_assert!(old.is_none());
        strict_assert_eq!(self.indexer.len(), self.entries.len() + 1);

        tracing::trace!("[memory]: attach {entry:?}");
        self.entries.insert(id, entry);
        id
    }

    fn detach(&mut self, id: EntryId) -> Option<Entry> {
        let mut entry = self.entries.remove(&id)?;
        // Already unbound if the whole partition was drained.
        self.indexer.remove(entry.key(), id);
        self.queues.unfile(&mut entry);
        self.ledger.discharge(entry.is_live(), entry.sizes());
        tracing::trace!("[memory]: detach {entry:?}");
        Some(entry)
    }

    fn release(&mut self, id: EntryId) {
        if let Some(entry) = self.detach(id) {
            self.garbages.push(entry.into_resource());
        }
    }

    /// Apply new sizes to an entry that is out of every queue.
    fn apply_sizes(ledger: &mut Ledger, entry: &mut Entry, sizes: Sizes) {
        if entry.sizes() == sizes {
            return;
        }
        ledger.adjust(entry.is_live(), entry.sizes(), sizes);
        entry.set_sizes(sizes);
        if sizes.decoded > 0 {
            entry.set_flags(Flags::PRUNED, false);
        }
    }

    fn is_pinned(resource: &dyn Resource) -> bool {
        resource.is_preloaded() || resource.is_revalidating()
    }

    fn is_over_budget(&self) -> bool {
        self.ledger.size() > self.config.capacity || self.ledger.dead_size() > self.dead_capacity()
    }

    fn needs_live_shrink(&self) -> bool {
        !self.queues.live_decoded.is_empty() && self.ledger.size() > self.config.capacity
    }

    fn may_shrink_live(&self, now: Instant) -> bool {
        let Some(last) = self.last_live_shrink else {
            return true;
        };
        let elapsed = now.saturating_duration_since(last);
        elapsed >= self.config.delay_before_live_decoded_prune || elapsed >= self.config.max_prune_deferral_delay
    }

    fn may_request_prune(&mut self) {
        if self.is_over_budget() {
            self.request_prune();
        }
    }

    fn request_prune(&mut self) {
        if self.state == PruneState::Idle {
            self.state = PruneState::PendingPrune;
            self.schedule_requested = true;
            tracing::trace!("[memory]: prune scheduled at the end of the current task");
        }
    }

    fn on_dead(&mut self) {
        if self.ledger.dead_size() > self.config.deferred_prune_dead_capacity() {
            tracing::debug!(
                "[memory]: dead size {} exceeds {}, prune dead resources now",
                self.ledger.dead_size(),
                self.config.deferred_prune_dead_capacity()
            );
            self.dead_prune_requested = true;
        } else {
            self.may_request_prune();
        }
    }

    fn begin(&mut self, kind: PassKind) -> PrunePass {
        let mut pass = PrunePass {
            kind,
            stage: Stage::DeadShrink,
            now: self.clock.now(),
            target: 0,
            candidates: vec![].into_iter(),
            shrunk_dead: 0,
            evicted: 0,
            shrunk_live: 0,
            deferred: false,
        };

        if kind == PassKind::All {
            pass.stage = Stage::DeadEvict;
            return pass;
        }

        let capacity = self.dead_capacity();
        if self.ledger.dead_size() <= capacity {
            self.leave_dead_stages(&mut pass);
            return pass;
        }
        // Decoded data of dead entries goes first, eviction only takes what is left.
        pass.target = self.config.prune_target(capacity);
        pass.candidates = self.queues.dead.candidates().into_iter();
        pass
    }

    fn leave_dead_stages(&mut self, pass: &mut PrunePass) {
        pass.stage = Stage::Done;
        match pass.kind {
            PassKind::Dead => {}
            PassKind::Boundary => {
                if !self.needs_live_shrink() {
                    return;
                }
                if !self.may_shrink_live(pass.now) {
                    pass.deferred = true;
                    return;
                }
                self.last_live_shrink = Some(pass.now);
                pass.target = self.config.prune_target(self.config.capacity);
                pass.candidates = self.queues.live_decoded.candidates().into_iter();
                pass.stage = Stage::LiveShrink;
            }
            PassKind::All => {
                self.last_live_shrink = Some(pass.now);
                pass.target = 0;
                pass.candidates = self.queues.live_decoded.candidates().into_iter();
                pass.stage = Stage::LiveShrink;
            }
        }
    }

    /// Next loaded dead entry with decoded data while dead usage exceeds the target.
    fn next_dead_shrink(&self, pass: &mut PrunePass) -> Option<ShrinkTarget> {
        for id in pass.candidates.by_ref() {
            if self.ledger.dead_size() <= pass.target {
                return None;
            }
            let Some(entry) = self.entries.get(&id) else {
                continue;
            };
            let resource = entry.resource();
            if entry.is_live() || entry.sizes().decoded == 0 || !resource.is_loaded() || resource.is_preloaded() {
                continue;
            }
            return Some(ShrinkTarget {
                id,
                resource: resource.clone(),
            });
        }
        None
    }

    /// Evict dead entries that are not pinned, oldest and low priority first, down to the target.
    fn evict_dead(&mut self, pass: &mut PrunePass) {
        for id in self.queues.dead.candidates() {
            if self.ledger.dead_size() <= pass.target {
                break;
            }
            let Some(entry) = self.entries.get(&id) else {
                continue;
            };
            if Self::is_pinned(entry.resource().as_ref()) {
                continue;
            }
            self.release(id);
            self.metrics.memory_evict.increment(1);
            pass.evicted += 1;
        }
    }

    /// Next loaded live entry with decoded data while the total size exceeds the target.
    fn next_live_shrink(&self, pass: &mut PrunePass) -> Option<ShrinkTarget> {
        for id in pass.candidates.by_ref() {
            if self.ledger.size() <= pass.target {
                return None;
            }
            let Some(entry) = self.entries.get(&id) else {
                continue;
            };
            if !entry.is_live() || entry.sizes().decoded == 0 || !entry.resource().is_loaded() {
                continue;
            }
            return Some(ShrinkTarget {
                id,
                resource: entry.resource().clone(),
            });
        }
        None
    }

    fn finish(&mut self, pass: &PrunePass) {
        match pass.kind {
            PassKind::Dead => {
                if pass.shrunk_dead + pass.evicted > 0 {
                    tracing::debug!(
                        "[memory]: dead prune done, dead shrunk: {}, dead evicted: {}, dead size: {}",
                        pass.shrunk_dead,
                        pass.evicted,
                        self.ledger.dead_size()
                    );
                }
                self.may_request_prune();
            }
            PassKind::Boundary => {
                self.state = PruneState::Idle;
                self.metrics.memory_prune.increment(1);
                tracing::debug!(
                    "[memory]: prune done, dead shrunk: {}, dead evicted: {}, live shrunk: {}, live deferred: {}, size: {} (live: {}, dead: {})",
                    pass.shrunk_dead,
                    pass.evicted,
                    pass.shrunk_live,
                    pass.deferred,
                    self.ledger.size(),
                    self.ledger.live_size(),
                    self.ledger.dead_size()
                );
                if pass.deferred {
                    self.request_prune();
                }
            }
            PassKind::All => {
                self.state = PruneState::Idle;
                self.metrics.memory_prune.increment(1);
                tracing::debug!(
                    "[memory]: prune all done, dead evicted: {}, live shrunk: {}",
                    pass.evicted,
                    pass.shrunk_live
                );
            }
        }
    }
}
