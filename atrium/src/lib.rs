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

//! atrium is a resource cache and eviction engine for embedded renderers.
//!
//! Resources are kept in memory, partitioned by cache identifier and keyed by URL without fragment. The cache accounts
//! live and dead resources separately, evicts dead resources under pressure, and discards decoded data of live
//! resources at task boundaries of the host.

pub use atrium_common as common;
pub use atrium_memory as memory;

mod prelude;
pub use prelude::*;
