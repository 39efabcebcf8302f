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

//! Utilities for testing.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use crate::{hook::TaskHook, resource::Resource};

/// In-memory [`Resource`] whose sizes and flags are driven by the test.
#[derive(Debug)]
pub struct TestResource {
    url: String,
    identifier: String,

    encoded: AtomicUsize,
    decoded: AtomicUsize,
    overhead: AtomicUsize,
    clients: AtomicUsize,

    loaded: AtomicBool,
    preloaded: AtomicBool,
    revalidating: AtomicBool,
    discardable: AtomicBool,

    destroyed: AtomicUsize,
}

impl TestResource {
    /// A loaded resource of `url` in the default partition, with no size and no client.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            identifier: String::new(),
            encoded: AtomicUsize::new(0),
            decoded: AtomicUsize::new(0),
            overhead: AtomicUsize::new(0),
            clients: AtomicUsize::new(0),
            loaded: AtomicBool::new(true),
            preloaded: AtomicBool::new(false),
            revalidating: AtomicBool::new(false),
            discardable: AtomicBool::new(true),
            destroyed: AtomicUsize::new(0),
        }
    }

    /// Put the resource in the partition `identifier`.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    /// Set the encoded size.
    pub fn with_encoded_size(self, size: usize) -> Self {
        self.set_encoded_size(size);
        self
    }

    /// Set the decoded size.
    pub fn with_decoded_size(self, size: usize) -> Self {
        self.set_decoded_size(size);
        self
    }

    /// Set the overhead size.
    pub fn with_overhead_size(self, size: usize) -> Self {
        self.overhead.store(size, Ordering::Relaxed);
        self
    }

    /// Set the client count.
    pub fn with_clients(self, clients: usize) -> Self {
        self.set_clients(clients);
        self
    }

    /// Wrap into a shared handle.
    pub fn into_ref(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Change the encoded size. The cache must be told with `update_size`.
    pub fn set_encoded_size(&self, size: usize) {
        self.encoded.store(size, Ordering::Relaxed);
    }

    /// Change the decoded size. The cache must be told with `update_size`.
    pub fn set_decoded_size(&self, size: usize) {
        self.decoded.store(size, Ordering::Relaxed);
    }

    /// Change the client count. The cache must be told with `update_clients`.
    pub fn set_clients(&self, clients: usize) {
        self.clients.store(clients, Ordering::Relaxed);
    }

    /// Add one client.
    pub fn add_client(&self) {
        self.clients.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove one client.
    pub fn remove_client(&self) {
        self.clients.fetch_sub(1, Ordering::Relaxed);
    }

    /// Mark the resource as loaded or still loading.
    pub fn set_loaded(&self, loaded: bool) {
        self.loaded.store(loaded, Ordering::Relaxed);
    }

    /// Mark the resource as preloaded.
    pub fn set_preloaded(&self, preloaded: bool) {
        self.preloaded.store(preloaded, Ordering::Relaxed);
    }

    /// Mark the resource as being revalidated.
    pub fn set_revalidating(&self, revalidating: bool) {
        self.revalidating.store(revalidating, Ordering::Relaxed);
    }

    /// Whether [`Resource::destroy_decoded_data_if_possible`] actually discards the decoded data.
    pub fn set_discardable(&self, discardable: bool) {
        self.discardable.store(discardable, Ordering::Relaxed);
    }

    /// How many times the decoded data was discarded.
    pub fn destroy_count(&self) -> usize {
        self.destroyed.load(Ordering::Relaxed)
    }
}

impl Resource for TestResource {
    fn url(&self) -> &str {
        &self.url
    }

    fn cache_identifier(&self) -> &str {
        &self.identifier
    }

    fn encoded_size(&self) -> usize {
        self.encoded.load(Ordering::Relaxed)
    }

    fn decoded_size(&self) -> usize {
        self.decoded.load(Ordering::Relaxed)
    }

    fn overhead_size(&self) -> usize {
        self.overhead.load(Ordering::Relaxed)
    }

    fn client_count(&self) -> usize {
        self.clients.load(Ordering::Relaxed)
    }

    fn destroy_decoded_data_if_possible(&self) {
        if !self.discardable.load(Ordering::Relaxed) || self.decoded.load(Ordering::Relaxed) == 0 {
            return;
        }
        self.decoded.store(0, Ordering::Relaxed);
        self.destroyed.fetch_add(1, Ordering::Relaxed);
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }

    fn is_preloaded(&self) -> bool {
        self.preloaded.load(Ordering::Relaxed)
    }

    fn is_revalidating(&self) -> bool {
        self.revalidating.load(Ordering::Relaxed)
    }
}

/// [`TaskHook`] that counts schedule requests.
#[derive(Debug, Clone, Default)]
pub struct RecordingTaskHook {
    scheduled: Arc<AtomicUsize>,
}

impl RecordingTaskHook {
    /// Schedule requests received so far.
    pub fn count(&self) -> usize {
        self.scheduled.load(Ordering::Relaxed)
    }
}

impl TaskHook for RecordingTaskHook {
    fn schedule(&self) {
        self.scheduled.fetch_add(1, Ordering::Relaxed);
    }
}
