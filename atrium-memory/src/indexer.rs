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

use hashbrown::HashMap;
use itertools::Itertools;

use crate::{
    key::{normalize_url, CacheKey},
    record::EntryId,
};

/// Partition map: cache identifier -> normalized URL -> entry.
///
/// Partitions are created on first insert and dropped when their last key goes away.
#[derive(Debug, Default)]
pub struct Indexer {
    partitions: HashMap<String, HashMap<String, EntryId>>,
    len: usize,
}

impl Indexer {
    pub fn get(&self, key: &CacheKey) -> Option<EntryId> {
        self.partitions
            .get(key.identifier())
            .and_then(|partition| partition.get(key.url()))
            .copied()
    }

    /// Bind `key` to `id`, returning the entry previously bound.
    pub fn insert(&mut self, key: &CacheKey, id: EntryId) -> Option<EntryId> {
        let old = self
            .partitions
            .entry_ref(key.identifier())
            .or_default()
            .insert(key.url().to_string(), id);
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    /// Unbind `key` only if it is still bound to `id`.
    pub fn remove(&mut self, key: &CacheKey, id: EntryId) -> bool {
        let Some(partition) = self.partitions.get_mut(key.identifier()) else {
            return false;
        };
        if partition.get(key.url()) != Some(&id) {
            return false;
        }
        partition.remove(key.url());
        if partition.is_empty() {
            self.partitions.remove(key.identifier());
        }
        self.len -= 1;
        true
    }

    /// Entries bound to `url` in every partition.
    pub fn lookup_all(&self, url: &str) -> Vec<EntryId> {
        let url = normalize_url(url);
        self.partitions
            .values()
            .filter_map(|partition| partition.get(url).copied())
            .collect_vec()
    }

    /// Unbind and return every entry of one partition.
    pub fn drain_partition(&mut self, identifier: &str) -> Vec<EntryId> {
        let ids = match self.partitions.remove(identifier) {
            Some(partition) => partition.into_values().collect_vec(),
            None => vec![],
        };
        self.len -= ids.len();
        ids
    }

    /// Unbind and return every entry.
    pub fn clear(&mut self) -> Vec<EntryId> {
        self.len = 0;
        self.partitions
            .drain()
            .flat_map(|(_, partition)| partition.into_values())
            .collect_vec()
    }

    /// Identifiers of the partitions holding at least one entry.
    pub fn partitions(&self) -> impl Iterator<Item = &str> {
        self.partitions.keys().map(|identifier| identifier.as_str())
    }

    pub fn len(&self) -> usize {
        self.len
    }
}
