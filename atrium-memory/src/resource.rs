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

use std::{fmt::Debug, sync::Arc};

use serde::{Deserialize, Serialize};

/// The cache identifier of the default partition.
pub const DEFAULT_CACHE_IDENTIFIER: &str = "";

/// A fetched subresource as seen by the cache.
///
/// The cache never looks at the payload kind. Image, script or stylesheet, everything is described through sizes,
/// client count and the ability to drop its decoded representation.
///
/// The entity reports its own transitions by calling back into the cache
/// ([`MemoryCache::update_clients`](crate::MemoryCache::update_clients),
/// [`MemoryCache::update_size`](crate::MemoryCache::update_size)) after they happen. The cache re-reads the
/// accessors below when notified.
///
/// # Contract
///
/// Accessors are invoked while the cache holds its internal lock and must not call back into the cache.
/// [`Resource::destroy_decoded_data_if_possible`] is invoked with the lock released and may report the new sizes
/// through [`MemoryCache::update_size`](crate::MemoryCache::update_size).
pub trait Resource: Send + Sync + Debug + 'static {
    /// URL the resource was fetched from, fragment included.
    fn url(&self) -> &str;

    /// Partition the resource belongs to.
    fn cache_identifier(&self) -> &str {
        DEFAULT_CACHE_IDENTIFIER
    }

    /// Bytes of the payload as fetched.
    fn encoded_size(&self) -> usize;

    /// Bytes of the materialized representation.
    fn decoded_size(&self) -> usize;

    /// Bytes of bookkeeping charged on top of the payload.
    fn overhead_size(&self) -> usize {
        0
    }

    /// Number of consumers currently holding the resource.
    fn client_count(&self) -> usize;

    /// Discard the decoded representation.
    ///
    /// Must update [`Resource::decoded_size`] before returning. A resource may refuse, in which case its decoded
    /// size stays as is.
    fn destroy_decoded_data_if_possible(&self);

    /// Only loaded resources have their decoded data discarded.
    fn is_loaded(&self) -> bool {
        true
    }

    /// A preloaded resource waits for its first client and is not evicted while dead.
    fn is_preloaded(&self) -> bool {
        false
    }

    /// A resource under revalidation stays cached until it is replaced.
    fn is_revalidating(&self) -> bool {
        false
    }
}

/// Shared reference to a cached resource.
pub type ResourceRef = Arc<dyn Resource>;

/// Return `true` if `stored` and `resource` are the same entity.
pub(crate) fn is_same_resource(stored: &ResourceRef, resource: &dyn Resource) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(stored), resource as *const dyn Resource)
}

/// Priority of a live resource's decoded data.
///
/// Low priority decoded data is discarded before high priority decoded data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DecodePriority {
    /// Discarded first.
    #[default]
    Low,
    /// Discarded after every low priority one.
    High,
}

/// Why a resource reports a decoded update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateReason {
    /// The decoded data was used. The resource becomes the most recent of its priority.
    Access,
    /// Only the decoded size or priority changed.
    PropertyChange,
}
