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

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::cache::MemoryCache;

/// Process-wide holder of the shared [`MemoryCache`].
///
/// Readers always observe a complete cache. Tests may swap in a fresh instance and restore the previous one
/// afterwards.
#[derive(Debug)]
pub struct CacheSlot {
    cache: ArcSwap<MemoryCache>,
}

impl CacheSlot {
    /// Hold `cache`.
    pub fn new(cache: MemoryCache) -> Self {
        Self {
            cache: ArcSwap::new(Arc::new(cache)),
        }
    }

    /// Current cache.
    pub fn load(&self) -> MemoryCache {
        self.cache.load().as_ref().clone()
    }

    /// Install `cache` for every later [`CacheSlot::load`].
    pub fn store(&self, cache: MemoryCache) {
        self.cache.store(Arc::new(cache));
    }

    /// Install `cache` and return the one it replaces, so a test can restore it.
    pub fn replace_for_testing(&self, cache: MemoryCache) -> MemoryCache {
        self.cache.swap(Arc::new(cache)).as_ref().clone()
    }
}
