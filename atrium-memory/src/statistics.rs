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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{record::Entry, resource::DecodePriority};

/// Point-in-time statistics of a cache, recomputed from its entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    /// Count of live entries.
    pub live_count: usize,
    /// Count of dead entries.
    pub dead_count: usize,
    /// Count of dead entries whose decoded data was discarded since they died.
    pub pruned_count: usize,
    /// Count of entries with high decode priority.
    pub high_priority_count: usize,

    /// Charged bytes of live entries.
    pub live_size: usize,
    /// Charged bytes of dead entries.
    pub dead_size: usize,

    /// Encoded bytes of all entries.
    pub encoded_size: usize,
    /// Decoded bytes of all entries.
    pub decoded_size: usize,
    /// Overhead bytes of all entries.
    pub overhead_size: usize,

    /// Entry count by cache identifier. The default partition is keyed by the empty string.
    pub partitions: BTreeMap<String, usize>,
}

impl Statistics {
    /// Total entry count.
    pub fn count(&self) -> usize {
        self.live_count + self.dead_count
    }

    /// Total charged bytes.
    pub fn size(&self) -> usize {
        self.live_size + self.dead_size
    }

    pub(crate) fn record(&mut self, entry: &Entry) {
        let sizes = entry.sizes();
        if entry.is_live() {
            self.live_count += 1;
            self.live_size += sizes.charge();
        } else {
            self.dead_count += 1;
            self.dead_size += sizes.charge();
        }
        if entry.is_pruned() {
            self.pruned_count += 1;
        }
        if entry.priority() == DecodePriority::High {
            self.high_priority_count += 1;
        }
        self.encoded_size += sizes.encoded;
        self.decoded_size += sizes.decoded;
        self.overhead_size += sizes.overhead;
        *self.partitions.entry(entry.key().identifier().to_string()).or_default() += 1;
    }
}
