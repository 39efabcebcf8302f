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

use metrics::{counter, gauge, Counter, Gauge};

/// Metrics of a resource cache instance.
///
/// Handles are resolved against the global `metrics` recorder at construction. Without an installed recorder every
/// handle is a no-op.
#[derive(Clone)]
pub struct Metrics {
    /// Successful adds.
    pub memory_add: Counter,
    /// Successful removes, including removals by URL and partition.
    pub memory_remove: Counter,
    /// Successful replaces.
    pub memory_replace: Counter,
    /// Lookups that found an entry.
    pub memory_hit: Counter,
    /// Lookups that found nothing.
    pub memory_miss: Counter,
    /// Dead entries evicted by pruning.
    pub memory_evict: Counter,
    /// Decoded representations discarded by pruning.
    pub memory_shrink: Counter,
    /// Completed prune passes.
    pub memory_prune: Counter,

    /// Charged bytes of live entries.
    pub memory_live_usage: Gauge,
    /// Charged bytes of dead entries.
    pub memory_dead_usage: Gauge,
    /// Decoded bytes of all entries.
    pub memory_decoded_usage: Gauge,
}

impl Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}

impl Metrics {
    /// Register the metrics of the cache named `name`.
    pub fn new(name: &str) -> Self {
        let op = |op: &'static str| counter!("atrium_memory_op_total", "name" => name.to_string(), "op" => op);
        let usage = |kind: &'static str| gauge!("atrium_memory_usage", "name" => name.to_string(), "kind" => kind);

        Self {
            memory_add: op("add"),
            memory_remove: op("remove"),
            memory_replace: op("replace"),
            memory_hit: op("hit"),
            memory_miss: op("miss"),
            memory_evict: op("evict"),
            memory_shrink: op("shrink"),
            memory_prune: op("prune"),

            memory_live_usage: usage("live"),
            memory_dead_usage: usage("dead"),
            memory_decoded_usage: usage("decoded"),
        }
    }
}
