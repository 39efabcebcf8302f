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

use atrium_common::strict_assert;

use crate::record::Sizes;

/// Aggregate size counters.
///
/// Every entry is charged `encoded + decoded + overhead` bytes against either the live or the dead aggregate, and
/// every transition is applied as an O(1) delta. Only sanity checks recompute the counters from scratch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ledger {
    live: usize,
    dead: usize,
    decoded: usize,
}

impl Ledger {
    /// Charge a new entry.
    pub fn charge(&mut self, live: bool, sizes: Sizes) {
        *self.bucket(live) += sizes.charge();
        self.decoded += sizes.decoded;
    }

    /// Release the charge of an entry leaving the cache.
    pub fn discharge(&mut self, live: bool, sizes: Sizes) {
        let bucket = self.bucket(live);
        strict_assert!(*bucket >= sizes.charge());
        *bucket -= sizes.charge();
        strict_assert!(self.decoded >= sizes.decoded);
        self.decoded -= sizes.decoded;
    }

    /// Apply a size change of an entry that stays in the same bucket.
    pub fn adjust(&mut self, live: bool, old: Sizes, new: Sizes) {
        self.discharge(live, old);
        self.charge(live, new);
    }

    /// Move an entry's charge between buckets. Sizes are unchanged.
    pub fn transfer(&mut self, to_live: bool, sizes: Sizes) {
        self.discharge(!to_live, sizes);
        self.charge(to_live, sizes);
    }

    pub fn live_size(&self) -> usize {
        self.live
    }

    pub fn dead_size(&self) -> usize {
        self.dead
    }

    pub fn decoded_size(&self) -> usize {
        self.decoded
    }

    pub fn size(&self) -> usize {
        self.live + self.dead
    }

    fn bucket(&mut self, live: bool) -> &mut usize {
        if live {
            &mut self.live
        } else {
            &mut self.dead
        }
    }
}
