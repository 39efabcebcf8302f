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

use std::{
    fmt::Debug,
    sync::{Arc, Weak},
    time::Duration,
};

use arc_swap::ArcSwap;
use atrium_common::{
    clock::{Clock, SystemClock},
    error::Result,
    metrics::Metrics,
};
use parking_lot::Mutex;

use crate::{
    config::{validate_delays, PruneConfig},
    hook::{NoopTaskHook, TaskHook},
    raw::{PrunePass, PruneState, RawCache, ShrinkTarget},
    resource::{DecodePriority, Resource, ResourceRef, UpdateReason, DEFAULT_CACHE_IDENTIFIER},
    statistics::Statistics,
};

struct CacheInner {
    name: String,
    raw: Mutex<RawCache>,
    hook: ArcSwap<Box<dyn TaskHook>>,
}

/// In-memory resource cache.
///
/// Resources are partitioned by cache identifier and keyed by URL without fragment. Each entry is charged its
/// encoded, decoded and overhead bytes against the live side while it has clients and against the dead side
/// otherwise. Dead entries are evicted when the dead side outgrows its capacity. Live entries are never evicted, but
/// their decoded data is discarded at task boundaries when the whole cache outgrows its capacity.
///
/// Cloning is cheap and every clone refers to the same cache.
#[derive(Clone)]
pub struct MemoryCache {
    inner: Arc<CacheInner>,
}

impl Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("name", &self.inner.name)
            .field("raw", &*self.inner.raw.lock())
            .finish()
    }
}

impl MemoryCache {
    /// Shorthand for [`CacheBuilder::new`].
    pub fn builder(capacity: usize) -> CacheBuilder {
        CacheBuilder::new(capacity)
    }

    /// Name of the cache in logs and metrics.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Insert `resource`, classified as live or dead by its current client count.
    ///
    /// Fails with [`Error::DuplicateKey`](atrium_common::error::Error::DuplicateKey) if its key is taken.
    pub fn add(&self, resource: ResourceRef) -> Result<()> {
        self.with_raw(|raw| raw.add(resource))
    }

    /// Remove `resource` if it is still the resource cached under its key.
    ///
    /// Returns whether it was removed. Removing a resource that was never added, was already removed, or was
    /// superseded by [`MemoryCache::replace`] is a no-op.
    pub fn remove(&self, resource: &dyn Resource) -> bool {
        self.with_raw(|raw| raw.remove(resource))
    }

    /// Swap `old` for `new` in one step. Lookups never observe the key unbound.
    ///
    /// A no-op if `old` is no longer cached. Fails if `new` maps to a key held by a resource other than `old`.
    pub fn replace(&self, new: ResourceRef, old: &dyn Resource) -> Result<()> {
        self.with_raw(|raw| raw.replace(new, old))
    }

    /// Whether `resource` itself, not merely another resource with the same key, is cached.
    pub fn contains(&self, resource: &dyn Resource) -> bool {
        self.inner.raw.lock().contains(resource)
    }

    /// Look up `url` in the default partition.
    pub fn resource_for_url(&self, url: &str) -> Option<ResourceRef> {
        self.resource_for_url_in(url, DEFAULT_CACHE_IDENTIFIER)
    }

    /// Look up `url` in the partition `identifier`.
    pub fn resource_for_url_in(&self, url: &str, identifier: &str) -> Option<ResourceRef> {
        self.inner.raw.lock().resource_for_url(url, identifier)
    }

    /// Every cached resource of `url`, across partitions.
    pub fn resources_for_url(&self, url: &str) -> Vec<ResourceRef> {
        self.inner.raw.lock().resources_for_url(url)
    }

    /// Must be called after the client count of `resource` changed.
    pub fn update_clients(&self, resource: &dyn Resource) {
        self.with_raw(|raw| raw.update_clients(resource))
    }

    /// Must be called after the encoded, decoded or overhead size of `resource` changed.
    pub fn update_size(&self, resource: &dyn Resource) {
        self.with_raw(|raw| raw.update_size(resource))
    }

    /// Must be called when the decoded representation of `resource` was accessed or changed.
    ///
    /// `priority`, if any, becomes the decode priority of a live entry.
    pub fn update_decoded_resource(
        &self,
        resource: &dyn Resource,
        reason: UpdateReason,
        priority: Option<DecodePriority>,
    ) {
        self.with_raw(|raw| raw.update_decoded_resource(resource, reason, priority))
    }

    /// Evict dead entries over the dead capacity now, and schedule decoded data of live entries to be discarded at the
    /// end of the current task if the cache is over capacity.
    pub fn prune(&self) {
        self.with_raw(|raw| raw.prune())
    }

    /// Evict every dead entry and discard every live decoded representation, regardless of capacity.
    pub fn prune_all(&self) {
        let pass = self.with_raw(|raw| raw.begin_prune_all());
        self.run_pass(pass);
    }

    /// Task boundary notification. Runs the pending prune pass, if any.
    pub fn did_process_task(&self) {
        if let Some(pass) = self.with_raw(|raw| raw.begin_boundary_pass()) {
            self.run_pass(pass);
        }
    }

    /// Drop every entry of every partition. Returns the count of dropped entries.
    pub fn evict_resources(&self) -> usize {
        self.with_raw(|raw| raw.evict_resources())
    }

    /// Drop every entry of the partition `identifier`. Returns the count of dropped entries.
    pub fn evict_partition(&self, identifier: &str) -> usize {
        self.with_raw(|raw| raw.evict_partition(identifier))
    }

    /// Drop every entry of `url`, across partitions. Returns the count of dropped entries.
    pub fn remove_url(&self, url: &str) -> usize {
        self.with_raw(|raw| raw.remove_url(url))
    }

    /// Reconfigure capacities, then prune against them.
    ///
    /// Fails with [`Error::CapacityMisconfiguration`](atrium_common::error::Error::CapacityMisconfiguration) and
    /// keeps the previous capacities if `min_dead_capacity > max_dead_capacity` or
    /// `max_dead_capacity > capacity`.
    pub fn set_capacities(&self, min_dead_capacity: usize, max_dead_capacity: usize, capacity: usize) -> Result<()> {
        self.with_raw(|raw| raw.set_capacities(min_dead_capacity, max_dead_capacity, capacity))
    }

    /// Set the minimum time between two passes that shrink live entries.
    ///
    /// Fails with [`Error::Config`](atrium_common::error::Error::Config) if `delay` exceeds the max prune deferral
    /// delay.
    pub fn set_delay_before_live_decoded_prune(&self, delay: Duration) -> Result<()> {
        let mut raw = self.inner.raw.lock();
        validate_delays(delay, raw.config().max_prune_deferral_delay)?;
        raw.config_mut().delay_before_live_decoded_prune = delay;
        Ok(())
    }

    /// Set the time after which a live shrink is never deferred anymore.
    ///
    /// Fails with [`Error::Config`](atrium_common::error::Error::Config) if `delay` is shorter than the delay before
    /// live decoded prune.
    pub fn set_max_prune_deferral_delay(&self, delay: Duration) -> Result<()> {
        let mut raw = self.inner.raw.lock();
        validate_delays(raw.config().delay_before_live_decoded_prune, delay)?;
        raw.config_mut().max_prune_deferral_delay = delay;
        Ok(())
    }

    /// Snapshot of the prune configuration.
    pub fn config(&self) -> PruneConfig {
        self.inner.raw.lock().config().clone()
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.inner.raw.lock().config().capacity
    }

    /// Lower bound of the dead capacity.
    pub fn min_dead_capacity(&self) -> usize {
        self.inner.raw.lock().config().min_dead_capacity
    }

    /// Upper bound of the dead capacity.
    pub fn max_dead_capacity(&self) -> usize {
        self.inner.raw.lock().config().max_dead_capacity
    }

    /// Capacity currently left to dead entries.
    pub fn dead_capacity(&self) -> usize {
        self.inner.raw.lock().dead_capacity()
    }

    /// Capacity currently left to live entries.
    pub fn live_capacity(&self) -> usize {
        self.inner.raw.lock().live_capacity()
    }

    /// Minimum time between two passes that shrink live entries.
    pub fn delay_before_live_decoded_prune(&self) -> Duration {
        self.inner.raw.lock().config().delay_before_live_decoded_prune
    }

    /// Time after which a live shrink is never deferred anymore.
    pub fn max_prune_deferral_delay(&self) -> Duration {
        self.inner.raw.lock().config().max_prune_deferral_delay
    }

    /// Charged bytes of all entries. Always `live_size() + dead_size()`.
    pub fn size(&self) -> usize {
        self.inner.raw.lock().size()
    }

    /// Charged bytes of entries with clients.
    pub fn live_size(&self) -> usize {
        self.inner.raw.lock().live_size()
    }

    /// Charged bytes of entries without clients.
    pub fn dead_size(&self) -> usize {
        self.inner.raw.lock().dead_size()
    }

    /// Decoded bytes of all entries.
    pub fn decoded_size(&self) -> usize {
        self.inner.raw.lock().decoded_size()
    }

    /// Entry count across partitions.
    pub fn len(&self) -> usize {
        self.inner.raw.lock().len()
    }

    /// Whether no entry is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache identifiers of the non-empty partitions, sorted.
    pub fn partitions(&self) -> Vec<String> {
        self.inner.raw.lock().partitions()
    }

    /// Progress of the deferred prune.
    pub fn prune_state(&self) -> PruneState {
        self.inner.raw.lock().prune_state()
    }

    /// Statistics recomputed from every entry.
    pub fn statistics(&self) -> Statistics {
        self.inner.raw.lock().statistics()
    }

    /// Log the current statistics.
    pub fn dump_stats(&self) {
        let stats = self.statistics();
        tracing::info!(
            name = %self.inner.name,
            live_count = stats.live_count,
            dead_count = stats.dead_count,
            pruned_count = stats.pruned_count,
            high_priority_count = stats.high_priority_count,
            live_size = stats.live_size,
            dead_size = stats.dead_size,
            encoded_size = stats.encoded_size,
            decoded_size = stats.decoded_size,
            overhead_size = stats.overhead_size,
            partitions = stats.partitions.len(),
            "[memory]: statistics"
        );
    }

    /// Install the hook that is asked to call [`MemoryCache::did_process_task`] at the end of the current task.
    pub fn set_task_hook(&self, hook: impl TaskHook) {
        let hook: Box<dyn TaskHook> = Box::new(hook);
        self.inner.hook.store(Arc::new(hook));
    }

    /// A handle that does not keep the cache alive, for the host's task loop to hold.
    pub fn downgrade(&self) -> WeakCache {
        WeakCache {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Run `f` under the lock, then the dead pass it requested, if any.
    fn with_raw<T>(&self, f: impl FnOnce(&mut RawCache) -> T) -> T {
        let (res, pass) = self.locked(|raw| (f(raw), raw.take_dead_pass()));
        if let Some(pass) = pass {
            self.run_pass(pass);
        }
        res
    }

    /// Drive `pass` to its end. Decoded data is discarded with the lock released, so a resource may call back into
    /// the cache from [`Resource::destroy_decoded_data_if_possible`].
    fn run_pass(&self, mut pass: PrunePass) {
        let mut shrunk: Option<ShrinkTarget> = None;
        loop {
            let next = self.locked(|raw| {
                if let Some(target) = &shrunk {
                    raw.finish_shrink(target);
                }
                raw.step(&mut pass)
            });
            // The entry may have left the cache meanwhile, so this may be the last reference.
            drop(shrunk.take());

            let Some(target) = next else {
                break;
            };
            target.resource().destroy_decoded_data_if_possible();
            shrunk = Some(target);
        }
    }

    fn locked<T>(&self, f: impl FnOnce(&mut RawCache) -> T) -> T {
        let (res, garbages, schedule) = {
            let mut raw = self.inner.raw.lock();
            let res = f(&mut raw);
            #[cfg(feature = "sanity")]
            raw.verify();
            raw.publish_usage();
            (res, raw.take_garbages(), raw.take_schedule_request())
        };

        // Drop released resources and notify the host out of the lock critical section.
        drop(garbages);
        if schedule {
            self.inner.hook.load().schedule();
        }

        res
    }
}

/// Non-owning handle of a [`MemoryCache`].
#[derive(Debug, Clone)]
pub struct WeakCache {
    inner: Weak<CacheInner>,
}

impl WeakCache {
    /// The cache, if it is still alive.
    pub fn upgrade(&self) -> Option<MemoryCache> {
        self.inner.upgrade().map(|inner| MemoryCache { inner })
    }

    /// Forward a task boundary to the cache. Returns `false` without doing anything if the cache is gone.
    pub fn did_process_task(&self) -> bool {
        match self.upgrade() {
            Some(cache) => {
                cache.did_process_task();
                true
            }
            None => false,
        }
    }
}

/// Builder of [`MemoryCache`].
#[derive(Debug)]
pub struct CacheBuilder {
    name: String,
    config: PruneConfig,
    hook: Box<dyn TaskHook>,
    clock: Arc<dyn Clock>,
}

impl CacheBuilder {
    /// A cache of `capacity` bytes whose dead entries may use all of it.
    pub fn new(capacity: usize) -> Self {
        Self {
            name: "atrium".to_string(),
            config: PruneConfig::new(capacity),
            hook: Box::new(NoopTaskHook),
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the name that labels the cache in logs and metrics.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the bounds of the capacity left to dead entries.
    ///
    /// Dead entries may use whatever live entries leave of the total capacity, clamped to these bounds.
    pub fn with_dead_capacities(mut self, min_dead_capacity: usize, max_dead_capacity: usize) -> Self {
        self.config.min_dead_capacity = min_dead_capacity;
        self.config.max_dead_capacity = max_dead_capacity;
        self
    }

    /// Set the minimum time between two passes that shrink live entries.
    pub fn with_delay_before_live_decoded_prune(mut self, delay: Duration) -> Self {
        self.config.delay_before_live_decoded_prune = delay;
        self
    }

    /// Set the time after which a live shrink is never deferred anymore.
    pub fn with_max_prune_deferral_delay(mut self, delay: Duration) -> Self {
        self.config.max_prune_deferral_delay = delay;
        self
    }

    /// Set the multiple of the max dead capacity above which a resource losing its last client triggers an
    /// immediate eviction of dead entries.
    pub fn with_deferred_prune_dead_capacity_factor(mut self, factor: f64) -> Self {
        self.config.deferred_prune_dead_capacity_factor = factor;
        self
    }

    /// Set the fraction of a bound that a prune pass frees down to.
    pub fn with_target_prune_ratio(mut self, ratio: f64) -> Self {
        self.config.target_prune_ratio = ratio;
        self
    }

    /// Replace the whole prune configuration.
    pub fn with_prune_config(mut self, config: PruneConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the hook that is asked for task boundary notifications.
    pub fn with_task_hook(mut self, hook: impl TaskHook) -> Self {
        self.hook = Box::new(hook);
        self
    }

    /// Set the clock that times live shrink deferral.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Validate the configuration and build the cache.
    pub fn build(self) -> Result<MemoryCache> {
        self.config.validate()?;

        let metrics = Arc::new(Metrics::new(&self.name));
        let raw = RawCache::new(self.config, self.clock, metrics);

        Ok(MemoryCache {
            inner: Arc::new(CacheInner {
                name: self.name,
                raw: Mutex::new(raw),
                hook: ArcSwap::new(Arc::new(self.hook)),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        OnceLock,
    };

    use atrium_common::{clock::ManualClock, error::Error};

    use super::*;
    use crate::test_utils::{RecordingTaskHook, TestResource};

    fn cache(capacity: usize) -> (MemoryCache, RecordingTaskHook) {
        let hook = RecordingTaskHook::default();
        let cache = CacheBuilder::new(capacity)
            .with_task_hook(hook.clone())
            .build()
            .unwrap();
        (cache, hook)
    }

    fn live(url: &str, encoded: usize, decoded: usize) -> Arc<TestResource> {
        TestResource::new(url)
            .with_encoded_size(encoded)
            .with_decoded_size(decoded)
            .with_clients(1)
            .into_ref()
    }

    fn dead(url: &str, encoded: usize) -> Arc<TestResource> {
        TestResource::new(url).with_encoded_size(encoded).into_ref()
    }

    fn assert_consistent(cache: &MemoryCache) {
        cache.inner.raw.lock().verify();
        assert_eq!(cache.size(), cache.live_size() + cache.dead_size());
    }

    #[test]
    fn test_build_rejects_misconfiguration() {
        let err = CacheBuilder::new(100).with_dead_capacities(20, 10).build().unwrap_err();
        assert!(err.is_capacity_misconfiguration());

        let err = CacheBuilder::new(100).with_dead_capacities(0, 200).build().unwrap_err();
        assert!(err.is_capacity_misconfiguration());

        assert!(CacheBuilder::new(100).with_target_prune_ratio(0.0).build().is_err());
        assert!(CacheBuilder::new(100)
            .with_deferred_prune_dead_capacity_factor(0.5)
            .build()
            .is_err());
    }

    #[test_log::test]
    fn test_add_and_duplicate_key() {
        let (cache, _) = cache(1000);

        let a = live("http://x/y#a", 10, 0);
        cache.add(a.clone()).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.live_size(), 10);

        let err = cache.add(dead("http://x/y#b", 5)).unwrap_err();
        assert!(err.is_duplicate_key());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size(), 10);

        let other = TestResource::new("http://x/y").with_identifier("frame").into_ref();
        cache.add(other).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.partitions(), vec!["".to_string(), "frame".to_string()]);
        assert_consistent(&cache);
    }

    #[test]
    fn test_remove_guards_identity() {
        let (cache, _) = cache(1000);

        let a = dead("http://x/a", 10);
        let impostor = dead("http://x/a", 10);
        cache.add(a.clone()).unwrap();

        assert!(!cache.remove(&*impostor));
        assert!(cache.contains(&*a));
        assert!(!cache.contains(&*impostor));

        assert!(cache.remove(&*a));
        assert!(!cache.remove(&*a));
        assert!(cache.is_empty());
        assert_eq!(cache.size(), 0);
        assert_consistent(&cache);
    }

    #[test]
    fn test_replace_supersedes_old() {
        let (cache, _) = cache(1000);

        let old = live("http://x/a", 10, 20);
        let new = live("http://x/a#fresh", 12, 0);
        cache.add(old.clone()).unwrap();
        cache.replace(new.clone(), &*old).unwrap();

        assert!(!cache.contains(&*old));
        assert!(cache.contains(&*new));
        assert_eq!(cache.size(), 12);

        // Stale operations on the superseded resource never touch its successor.
        assert!(!cache.remove(&*old));
        cache.replace(live("http://x/a", 1, 0), &*old).unwrap();
        cache.update_clients(&*old);
        cache.update_size(&*old);
        assert!(cache.contains(&*new));
        assert_eq!(cache.size(), 12);

        // The new key must not be held by anyone but the old resource.
        let b = dead("http://x/b", 3);
        cache.add(b.clone()).unwrap();
        let err = cache.replace(dead("http://x/b", 4), &*new).unwrap_err();
        assert!(err.is_duplicate_key());
        assert!(cache.contains(&*new));
        assert!(cache.contains(&*b));
        assert_consistent(&cache);
    }

    #[test]
    fn test_client_transitions_move_charge() {
        let (cache, _) = cache(1000);

        let a = TestResource::new("http://x/a")
            .with_encoded_size(10)
            .with_decoded_size(5)
            .with_overhead_size(1)
            .into_ref();
        cache.add(a.clone()).unwrap();
        assert_eq!((cache.live_size(), cache.dead_size()), (0, 16));

        a.add_client();
        a.add_client();
        cache.update_clients(&*a);
        assert_eq!((cache.live_size(), cache.dead_size()), (16, 0));

        a.remove_client();
        cache.update_clients(&*a);
        assert_eq!((cache.live_size(), cache.dead_size()), (16, 0));

        a.remove_client();
        cache.update_clients(&*a);
        assert_eq!((cache.live_size(), cache.dead_size()), (0, 16));

        a.set_decoded_size(25);
        cache.update_size(&*a);
        assert_eq!(cache.dead_size(), 36);
        assert_eq!(cache.decoded_size(), 25);
        assert_consistent(&cache);
    }

    #[test_log::test]
    fn test_live_shrink_waits_for_task_boundary() {
        let (cache, hook) = cache(1);

        let a = live("http://x/a", 1, 3);
        let b = live("http://x/b", 2, 4);
        cache.add(a.clone()).unwrap();
        cache.add(b.clone()).unwrap();
        cache.prune();

        assert_eq!(cache.size(), 10);
        assert_eq!(cache.prune_state(), PruneState::PendingPrune);
        assert_eq!(hook.count(), 1);

        cache.did_process_task();
        assert_eq!(cache.prune_state(), PruneState::Idle);
        assert_eq!(cache.size(), 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(a.destroy_count(), 1);
        assert_eq!(b.destroy_count(), 1);
        assert_consistent(&cache);
    }

    #[test]
    fn test_schedule_requests_coalesce() {
        let (cache, hook) = cache(10);

        for i in 0..8 {
            cache.add(live(&format!("http://x/{i}"), 1, 4)).unwrap();
        }
        cache.prune();
        assert_eq!(hook.count(), 1);

        cache.did_process_task();
        assert_eq!(cache.prune_state(), PruneState::Idle);

        // A boundary without pending work is a no-op.
        cache.did_process_task();
        assert_eq!(hook.count(), 1);
    }

    #[test]
    fn test_live_shrink_order() {
        let (cache, _) = cache(100);

        let a = live("http://x/a", 0, 40);
        let b = live("http://x/b", 0, 40);
        let c = live("http://x/c", 0, 40);
        cache.add(a.clone()).unwrap();
        cache.add(b.clone()).unwrap();
        cache.add(c.clone()).unwrap();

        cache.update_decoded_resource(&*a, UpdateReason::PropertyChange, Some(DecodePriority::High));
        cache.did_process_task();

        // Low priority first, oldest first, and stop once back under capacity.
        assert_eq!(a.destroy_count(), 0);
        assert_eq!(b.destroy_count(), 1);
        assert_eq!(c.destroy_count(), 0);
        assert_eq!(cache.size(), 80);
        assert_consistent(&cache);
    }

    #[test]
    fn test_access_refreshes_order() {
        let clock = ManualClock::new();
        let cache = CacheBuilder::new(100).with_clock(clock.clone()).build().unwrap();

        let a = live("http://x/a", 0, 60);
        let b = live("http://x/b", 0, 60);
        cache.add(a.clone()).unwrap();
        cache.add(b.clone()).unwrap();
        cache.update_decoded_resource(&*a, UpdateReason::Access, None);
        cache.did_process_task();

        assert_eq!(a.destroy_count(), 0);
        assert_eq!(b.destroy_count(), 1);
        assert_consistent(&cache);
    }

    #[test_log::test]
    fn test_live_shrink_deferral() {
        let clock = ManualClock::new();
        let hook = RecordingTaskHook::default();
        let cache = CacheBuilder::new(50)
            .with_clock(clock.clone())
            .with_task_hook(hook.clone())
            .with_delay_before_live_decoded_prune(Duration::from_secs(1))
            .with_max_prune_deferral_delay(Duration::from_secs(5))
            .build()
            .unwrap();

        let a = live("http://x/a", 0, 60);
        cache.add(a.clone()).unwrap();
        cache.did_process_task();
        assert_eq!(a.destroy_count(), 1);

        let b = live("http://x/b", 0, 60);
        cache.add(b.clone()).unwrap();
        clock.advance(Duration::from_millis(999));
        cache.did_process_task();
        assert_eq!(b.destroy_count(), 0);
        assert_eq!(cache.size(), 60);
        // Still over capacity, so the pass is rescheduled.
        assert_eq!(cache.prune_state(), PruneState::PendingPrune);
        assert_eq!(hook.count(), 3);

        clock.advance(Duration::from_millis(1));
        cache.did_process_task();
        assert_eq!(b.destroy_count(), 1);
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.prune_state(), PruneState::Idle);
    }

    #[test]
    fn test_live_shrink_deferral_with_default_delays() {
        let clock = ManualClock::new();
        let cache = CacheBuilder::new(50).with_clock(clock.clone()).build().unwrap();
        let delay = cache.delay_before_live_decoded_prune();
        assert!(cache.max_prune_deferral_delay() >= delay);

        let a = live("http://x/a", 0, 60);
        cache.add(a.clone()).unwrap();
        cache.did_process_task();
        assert_eq!(a.destroy_count(), 1);

        let b = live("http://x/b", 0, 60);
        cache.add(b.clone()).unwrap();
        clock.advance(delay * 6 / 10);
        cache.did_process_task();
        assert_eq!(b.destroy_count(), 0);
        assert_eq!(cache.prune_state(), PruneState::PendingPrune);

        clock.advance(delay * 4 / 10);
        cache.did_process_task();
        assert_eq!(b.destroy_count(), 1);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_deferral_delays_must_be_ordered() {
        let err = CacheBuilder::new(50)
            .with_delay_before_live_decoded_prune(Duration::from_secs(10))
            .with_max_prune_deferral_delay(Duration::from_millis(200))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let cache = CacheBuilder::new(50)
            .with_delay_before_live_decoded_prune(Duration::from_secs(1))
            .with_max_prune_deferral_delay(Duration::from_secs(2))
            .build()
            .unwrap();
        assert!(cache.set_delay_before_live_decoded_prune(Duration::from_secs(3)).is_err());
        assert!(cache.set_max_prune_deferral_delay(Duration::from_millis(500)).is_err());
        assert_eq!(cache.delay_before_live_decoded_prune(), Duration::from_secs(1));
        assert_eq!(cache.max_prune_deferral_delay(), Duration::from_secs(2));

        cache.set_max_prune_deferral_delay(Duration::from_secs(1)).unwrap();
        cache.set_delay_before_live_decoded_prune(Duration::ZERO).unwrap();
        assert_eq!(cache.max_prune_deferral_delay(), Duration::from_secs(1));
        assert_eq!(cache.delay_before_live_decoded_prune(), Duration::ZERO);
    }

    #[test_log::test]
    fn test_dead_hysteresis() {
        let (cache, hook) = cache(100);
        cache.set_capacities(0, 10, 100).unwrap();
        assert_eq!(cache.config().deferred_prune_dead_capacity(), 20);

        let rs = (0..3).map(|i| live(&format!("http://x/{i}"), 8, 0)).collect::<Vec<_>>();
        for r in rs.iter() {
            cache.add(r.clone()).unwrap();
        }
        assert_eq!(hook.count(), 0);

        rs[0].remove_client();
        cache.update_clients(&*rs[0]);
        assert_eq!(cache.dead_size(), 8);
        assert_eq!(hook.count(), 0);

        // Over the dead capacity but within the band: left for the scheduled pass.
        rs[1].remove_client();
        cache.update_clients(&*rs[1]);
        assert_eq!(cache.dead_size(), 16);
        assert_eq!(hook.count(), 1);

        // Over the band: evicted right away, oldest first.
        rs[2].remove_client();
        cache.update_clients(&*rs[2]);
        assert_eq!(cache.dead_size(), 8);
        assert!(!cache.contains(&*rs[0]));
        assert!(!cache.contains(&*rs[1]));
        assert!(cache.contains(&*rs[2]));

        cache.did_process_task();
        assert_eq!(cache.prune_state(), PruneState::Idle);
        assert_consistent(&cache);
    }

    #[test]
    fn test_scheduled_pass_evicts_dead() {
        let (cache, _) = cache(100);
        cache.set_capacities(0, 10, 100).unwrap();

        let a = dead("http://x/a", 8);
        let b = dead("http://x/b", 8);
        cache.add(a.clone()).unwrap();
        cache.add(b.clone()).unwrap();
        assert_eq!(cache.dead_size(), 16);

        cache.did_process_task();
        assert!(!cache.contains(&*a));
        assert!(cache.contains(&*b));
        assert_eq!(cache.dead_size(), 8);
    }

    #[test]
    fn test_dead_decoded_data_is_discarded_before_eviction() {
        let (cache, _) = cache(100);
        cache.set_capacities(0, 20, 100).unwrap();

        let a = TestResource::new("http://x/a").with_encoded_size(5).with_decoded_size(10).into_ref();
        let b = TestResource::new("http://x/b").with_encoded_size(5).with_decoded_size(10).into_ref();
        cache.add(a.clone()).unwrap();
        cache.add(b.clone()).unwrap();
        cache.prune();

        assert!(cache.contains(&*a));
        assert!(cache.contains(&*b));
        assert_eq!(a.destroy_count(), 1);
        assert_eq!(b.destroy_count(), 0);
        assert_eq!(cache.dead_size(), 20);
        assert_eq!(cache.statistics().pruned_count, 1);
        assert_consistent(&cache);
    }

    #[test]
    fn test_dead_capacity_zero() {
        let (cache, _) = cache(100);
        cache.set_capacities(0, 0, 100).unwrap();

        cache.add(dead("http://x/a", 5)).unwrap();
        assert_eq!(cache.size(), 5);
        cache.prune();
        assert_eq!(cache.size(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_pinned_dead_entries_survive() {
        let (cache, _) = cache(100);
        cache.set_capacities(0, 0, 100).unwrap();

        let preloaded = dead("http://x/a", 5);
        preloaded.set_preloaded(true);
        let revalidating = dead("http://x/b", 5);
        revalidating.set_revalidating(true);
        cache.add(preloaded.clone()).unwrap();
        cache.add(revalidating.clone()).unwrap();

        cache.prune();
        cache.prune_all();
        assert_eq!(cache.len(), 2);

        revalidating.set_revalidating(false);
        cache.prune();
        assert!(!cache.contains(&*revalidating));
        assert!(cache.contains(&*preloaded));
    }

    #[test]
    fn test_unloaded_and_undiscardable_entries() {
        let (cache, _) = cache(10);

        let loading = live("http://x/a", 0, 20);
        loading.set_loaded(false);
        let stubborn = live("http://x/b", 0, 20);
        stubborn.set_discardable(false);
        cache.add(loading.clone()).unwrap();
        cache.add(stubborn.clone()).unwrap();

        cache.did_process_task();
        assert_eq!(loading.destroy_count(), 0);
        assert_eq!(stubborn.destroy_count(), 0);
        assert_eq!(cache.size(), 40);
        assert_consistent(&cache);
    }

    #[test]
    fn test_prune_all() {
        let (cache, _) = cache(1000);

        let a = live("http://x/a", 5, 10);
        let b = TestResource::new("http://x/b").with_encoded_size(5).with_decoded_size(10).into_ref();
        cache.add(a.clone()).unwrap();
        cache.add(b.clone()).unwrap();

        cache.prune_all();
        assert!(cache.contains(&*a));
        assert!(!cache.contains(&*b));
        assert_eq!(cache.size(), 5);
        assert_eq!(cache.decoded_size(), 0);
        assert_consistent(&cache);
    }

    #[test]
    fn test_partitions() {
        let (cache, _) = cache(1000);

        let a = TestResource::new("http://x/y").with_encoded_size(1).into_ref();
        let b = TestResource::new("http://x/y#b")
            .with_identifier("frame")
            .with_encoded_size(2)
            .into_ref();
        let c = TestResource::new("http://x/z")
            .with_identifier("frame")
            .with_encoded_size(4)
            .into_ref();
        cache.add(a.clone()).unwrap();
        cache.add(b.clone()).unwrap();
        cache.add(c.clone()).unwrap();

        assert!(cache.resource_for_url("http://x/y#q").is_some());
        assert!(cache.resource_for_url("http://x/z").is_none());
        assert!(cache.resource_for_url_in("http://x/z", "frame").is_some());
        assert_eq!(cache.resources_for_url("http://x/y").len(), 2);

        assert_eq!(cache.evict_partition("frame"), 2);
        assert!(cache.contains(&*a));
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.partitions(), vec!["".to_string()]);

        cache.add(b.clone()).unwrap();
        assert_eq!(cache.remove_url("http://x/y#zzz"), 2);
        assert!(cache.is_empty());
        assert_consistent(&cache);
    }

    #[test]
    fn test_evict_resources() {
        let (cache, _) = cache(1000);
        let a = live("http://x/a", 5, 10);
        cache.add(a.clone()).unwrap();
        cache.add(dead("http://x/b", 3)).unwrap();

        assert_eq!(cache.evict_resources(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.decoded_size(), 0);

        // Evicting drops the cache's reference only.
        assert_eq!(Arc::strong_count(&a), 1);
        assert_eq!(a.client_count(), 1);
    }

    #[test]
    fn test_set_capacities() {
        let (cache, _) = cache(1000);
        cache.add(dead("http://x/a", 30)).unwrap();
        cache.add(dead("http://x/b", 30)).unwrap();

        let err = cache.set_capacities(10, 5, 100).unwrap_err();
        assert!(err.is_capacity_misconfiguration());
        assert_eq!(cache.capacity(), 1000);

        cache.set_capacities(10, 40, 100).unwrap();
        assert_eq!(cache.min_dead_capacity(), 10);
        assert_eq!(cache.max_dead_capacity(), 40);
        assert_eq!(cache.capacity(), 100);
        assert_eq!(cache.dead_size(), 30);
        assert_eq!(cache.dead_capacity(), 40);
        assert_eq!(cache.live_capacity(), 60);
    }

    #[test]
    fn test_weak_cache() {
        let (cache, _) = cache(10);
        let weak = cache.downgrade();
        cache.add(live("http://x/a", 0, 20)).unwrap();

        assert!(weak.did_process_task());
        assert_eq!(cache.size(), 0);

        drop(cache);
        assert!(weak.upgrade().is_none());
        assert!(!weak.did_process_task());
    }

    /// Reports its new sizes to the cache as soon as it discards its decoded data.
    #[derive(Debug)]
    struct ReportingResource {
        inner: TestResource,
        cache: OnceLock<WeakCache>,
        reports: AtomicUsize,
    }

    impl Resource for ReportingResource {
        fn url(&self) -> &str {
            self.inner.url()
        }

        fn encoded_size(&self) -> usize {
            self.inner.encoded_size()
        }

        fn decoded_size(&self) -> usize {
            self.inner.decoded_size()
        }

        fn client_count(&self) -> usize {
            self.inner.client_count()
        }

        fn destroy_decoded_data_if_possible(&self) {
            self.inner.destroy_decoded_data_if_possible();
            if let Some(cache) = self.cache.get().and_then(|cache| cache.upgrade()) {
                cache.update_size(self);
                self.reports.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn reporting(cache: &MemoryCache, inner: TestResource) -> Arc<ReportingResource> {
        let resource = Arc::new(ReportingResource {
            inner,
            cache: OnceLock::new(),
            reports: AtomicUsize::new(0),
        });
        resource.cache.set(cache.downgrade()).unwrap();
        resource
    }

    #[test_log::test]
    fn test_resource_may_report_sizes_while_shrunk() {
        let (cache, _) = cache(10);
        let a = reporting(
            &cache,
            TestResource::new("http://x/a").with_decoded_size(20).with_clients(1),
        );
        let b = reporting(&cache, TestResource::new("http://x/b").with_encoded_size(2).with_decoded_size(8));
        cache.add(a.clone()).unwrap();
        cache.add(b.clone()).unwrap();

        // A boundary pass that shrinks both sides must not hold the lock across the discards.
        let (tx, rx) = std::sync::mpsc::channel();
        let worker = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                cache.set_capacities(2, 2, 10).unwrap();
                cache.did_process_task();
                tx.send(()).unwrap();
            })
        };
        rx.recv_timeout(Duration::from_secs(10)).unwrap();
        worker.join().unwrap();

        assert_eq!(a.inner.destroy_count(), 1);
        assert_eq!(b.inner.destroy_count(), 1);
        assert_eq!(a.reports.load(Ordering::Relaxed), 1);
        assert_eq!(b.reports.load(Ordering::Relaxed), 1);
        assert!(cache.contains(&*b));
        assert_eq!(cache.live_size(), 0);
        assert_eq!(cache.dead_size(), 2);
        assert_eq!(cache.decoded_size(), 0);
        assert_eq!(cache.statistics().pruned_count, 1);
        assert_eq!(cache.prune_state(), PruneState::Idle);
        assert_consistent(&cache);
    }

    #[test]
    fn test_replace_with_dead_resource_evicts_over_hysteresis() {
        let (cache, _) = cache(100);
        cache.set_capacities(0, 10, 100).unwrap();

        let old = live("http://x/a", 8, 0);
        let b = dead("http://x/b", 8);
        let c = dead("http://x/c", 8);
        cache.add(old.clone()).unwrap();
        cache.add(b.clone()).unwrap();
        cache.add(c.clone()).unwrap();
        assert_eq!(cache.dead_size(), 16);

        // Swapping a live resource for a dead one pushes dead usage over the band of 20 bytes.
        let new = dead("http://x/a", 8);
        cache.replace(new.clone(), &*old).unwrap();
        assert!(!cache.contains(&*b));
        assert!(!cache.contains(&*c));
        assert!(cache.contains(&*new));
        assert_eq!(cache.dead_size(), 8);
        assert_consistent(&cache);
    }

    #[derive(Debug, Default)]
    struct InspectingHook {
        cache: OnceLock<WeakCache>,
        observed: AtomicUsize,
    }

    impl TaskHook for Arc<InspectingHook> {
        fn schedule(&self) {
            if let Some(cache) = self.cache.get().and_then(|cache| cache.upgrade()) {
                self.observed.store(cache.size(), Ordering::Relaxed);
            }
        }
    }

    #[test]
    fn test_hook_may_reenter() {
        let hook = Arc::new(InspectingHook::default());
        let cache = CacheBuilder::new(10).with_task_hook(hook.clone()).build().unwrap();
        hook.cache.set(cache.downgrade()).unwrap();

        cache.add(live("http://x/a", 0, 20)).unwrap();
        assert_eq!(hook.observed.load(Ordering::Relaxed), 20);
    }
}
