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

use std::time::Duration;

use atrium_common::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Capacity and pruning configuration of a resource cache.
///
/// Capacities follow the split model: dead entries may use whatever live entries leave of `capacity`, but never
/// less than `min_dead_capacity` nor more than `max_dead_capacity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruneConfig {
    /// Total capacity in bytes.
    pub capacity: usize,
    /// Bytes reserved for dead entries regardless of live usage.
    pub min_dead_capacity: usize,
    /// Upper bound of the bytes dead entries may keep.
    pub max_dead_capacity: usize,
    /// Minimal time between two passes that shrink live decoded data.
    pub delay_before_live_decoded_prune: Duration,
    /// Hard ceiling on the time a live shrink may be deferred. Never shorter than
    /// [`PruneConfig::delay_before_live_decoded_prune`].
    pub max_prune_deferral_delay: Duration,
    /// Dead usage tolerated while a prune is pending, as a multiple of `max_dead_capacity`.
    ///
    /// Exceeding it when an entry becomes dead evicts dead entries on the spot instead of waiting for the next
    /// task boundary.
    pub deferred_prune_dead_capacity_factor: f64,
    /// Fraction of a bound a prune pass prunes down to, in `(0, 1]`.
    pub target_prune_ratio: f64,
}

impl PruneConfig {
    /// Default [`PruneConfig::delay_before_live_decoded_prune`].
    pub const DEFAULT_DELAY_BEFORE_LIVE_DECODED_PRUNE: Duration = Duration::from_secs(1);
    /// Default [`PruneConfig::max_prune_deferral_delay`].
    pub const DEFAULT_MAX_PRUNE_DEFERRAL_DELAY: Duration = Duration::from_secs(5);
    /// Default [`PruneConfig::deferred_prune_dead_capacity_factor`].
    pub const DEFAULT_DEFERRED_PRUNE_DEAD_CAPACITY_FACTOR: f64 = 2.0;

    /// Config with `capacity` bytes that lets dead entries use all of it.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            min_dead_capacity: 0,
            max_dead_capacity: capacity,
            delay_before_live_decoded_prune: Self::DEFAULT_DELAY_BEFORE_LIVE_DECODED_PRUNE,
            max_prune_deferral_delay: Self::DEFAULT_MAX_PRUNE_DEFERRAL_DELAY,
            deferred_prune_dead_capacity_factor: Self::DEFAULT_DEFERRED_PRUNE_DEAD_CAPACITY_FACTOR,
            target_prune_ratio: 1.0,
        }
    }

    /// Check every bound.
    pub fn validate(&self) -> Result<()> {
        validate_capacities(self.min_dead_capacity, self.max_dead_capacity, self.capacity)?;
        validate_delays(self.delay_before_live_decoded_prune, self.max_prune_deferral_delay)?;
        if !self.deferred_prune_dead_capacity_factor.is_finite() || self.deferred_prune_dead_capacity_factor < 1.0 {
            return Err(Error::Config(format!(
                "deferred_prune_dead_capacity_factor must be a finite value >= 1.0, given: {}",
                self.deferred_prune_dead_capacity_factor
            )));
        }
        if !(self.target_prune_ratio > 0.0 && self.target_prune_ratio <= 1.0) {
            return Err(Error::Config(format!(
                "target_prune_ratio must be in (0.0, 1.0], given: {}",
                self.target_prune_ratio
            )));
        }
        Ok(())
    }

    /// Capacity left to dead entries while live entries use `live_size` bytes.
    pub fn dead_capacity(&self, live_size: usize) -> usize {
        self.capacity
            .saturating_sub(live_size)
            .clamp(self.min_dead_capacity, self.max_dead_capacity)
    }

    /// Capacity left to live entries while live entries use `live_size` bytes.
    pub fn live_capacity(&self, live_size: usize) -> usize {
        self.capacity - self.dead_capacity(live_size)
    }

    /// Dead usage above which dead entries are evicted immediately.
    pub fn deferred_prune_dead_capacity(&self) -> usize {
        (self.max_dead_capacity as f64 * self.deferred_prune_dead_capacity_factor) as usize
    }

    /// Size a pass prunes down to when `bound` is exceeded.
    pub fn prune_target(&self, bound: usize) -> usize {
        (bound as f64 * self.target_prune_ratio) as usize
    }
}

pub(crate) fn validate_capacities(min_dead: usize, max_dead: usize, total: usize) -> Result<()> {
    if min_dead > max_dead {
        return Err(Error::capacity_misconfiguration(
            min_dead,
            max_dead,
            total,
            "min dead capacity exceeds max dead capacity",
        ));
    }
    if max_dead > total {
        return Err(Error::capacity_misconfiguration(
            min_dead,
            max_dead,
            total,
            "max dead capacity exceeds total capacity",
        ));
    }
    Ok(())
}

pub(crate) fn validate_delays(delay: Duration, max_delay: Duration) -> Result<()> {
    if max_delay < delay {
        return Err(Error::Config(format!(
            "max_prune_deferral_delay must not be shorter than delay_before_live_decoded_prune, given: {max_delay:?} < {delay:?}"
        )));
    }
    Ok(())
}
