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

//! In-memory resource cache with split live/dead accounting, partitions by cache identifier and pruning deferred to
//! task boundaries.

mod cache;
mod config;
mod eviction;
mod hook;
mod indexer;
mod key;
mod ledger;
mod prelude;
mod raw;
mod record;
mod resource;
mod slot;
mod statistics;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use prelude::*;
