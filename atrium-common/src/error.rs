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

/// Resource cache error.
///
/// Stale removals are deliberately absent: a `remove` or `replace` that names an entity no longer bound to its key
/// is a no-op and never surfaces as an error.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An entry is already bound to the key in the partition.
    #[error("duplicate key: {url:?} is already cached in partition {identifier:?}")]
    DuplicateKey {
        /// Cache identifier of the partition.
        identifier: String,
        /// Normalized URL of the key.
        url: String,
    },
    /// Capacity bounds that cannot hold together.
    #[error("capacity misconfiguration: {reason} (min dead: {min_dead}, max dead: {max_dead}, total: {total})")]
    CapacityMisconfiguration {
        /// Requested minimal dead capacity.
        min_dead: usize,
        /// Requested maximal dead capacity.
        max_dead: usize,
        /// Requested total capacity.
        total: usize,
        /// Which bound is violated.
        reason: &'static str,
    },
    /// Config error.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Helper for creating an [`Error::DuplicateKey`].
    pub fn duplicate_key(identifier: impl Into<String>, url: impl Into<String>) -> Self {
        Self::DuplicateKey {
            identifier: identifier.into(),
            url: url.into(),
        }
    }

    /// Helper for creating an [`Error::CapacityMisconfiguration`].
    pub fn capacity_misconfiguration(min_dead: usize, max_dead: usize, total: usize, reason: &'static str) -> Self {
        Self::CapacityMisconfiguration {
            min_dead,
            max_dead,
            total,
            reason,
        }
    }

    /// Return `true` if the error is [`Error::DuplicateKey`].
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }

    /// Return `true` if the error is [`Error::CapacityMisconfiguration`].
    pub fn is_capacity_misconfiguration(&self) -> bool {
        matches!(self, Self::CapacityMisconfiguration { .. })
    }
}

/// Resource cache result.
pub type Result<T> = std::result::Result<T, Error>;
