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

/// Integration point with the host's task loop.
///
/// Live decoded data is never shrunk in the middle of a task: a single task may drop and re-acquire the clients of
/// the same resource several times. Instead the cache marks a prune as pending and calls [`TaskHook::schedule`] once.
/// The host answers by calling [`MemoryCache::did_process_task`](crate::MemoryCache::did_process_task) (usually
/// through a [`WeakCache`](crate::WeakCache)) as soon as the current task returns to its scheduler.
///
/// Schedule requests made within the same task are coalesced by the cache. A pass that has to wait for
/// [`PruneConfig::delay_before_live_decoded_prune`](crate::PruneConfig::delay_before_live_decoded_prune) requests
/// again, so hosts should answer after the next task they run, the way a task observer does, instead of posting a
/// task of their own that would keep an idle loop busy.
///
/// `schedule` is invoked outside the cache lock, so it may call back into the cache.
pub trait TaskHook: Send + Sync + 'static + Debug {
    /// Request one call to `did_process_task` at the end of the current task.
    fn schedule(&self);
}

/// Hook for hosts that call `did_process_task` after every task anyway, like a task observer does.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTaskHook;

impl TaskHook for NoopTaskHook {
    fn schedule(&self) {}
}
