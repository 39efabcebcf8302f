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

//! A single-threaded host loop that runs tasks and notifies the cache at every task boundary.
//!
//! Run with `RUST_LOG=atrium_memory=debug` to watch the prune passes.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use atrium::{CacheBuilder, MemoryCache, Resource, TaskHook, UpdateReason};
use parking_lot::Mutex;

const KB: usize = 1024;

/// An image whose pixels are decoded on demand.
#[derive(Debug)]
struct Image {
    url: String,
    encoded: usize,
    pixels: usize,
    state: Mutex<ImageState>,
}

#[derive(Debug, Default)]
struct ImageState {
    decoded: bool,
    observers: usize,
}

impl Image {
    fn new(url: impl Into<String>, encoded: usize, pixels: usize) -> Arc<Self> {
        Arc::new(Self {
            url: url.into(),
            encoded,
            pixels,
            state: Mutex::new(ImageState::default()),
        })
    }

    fn observe(self: &Arc<Self>, cache: &MemoryCache) {
        self.state.lock().observers += 1;
        cache.update_clients(&**self);
    }

    fn unobserve(self: &Arc<Self>, cache: &MemoryCache) {
        self.state.lock().observers -= 1;
        cache.update_clients(&**self);
    }

    fn paint(self: &Arc<Self>, cache: &MemoryCache) {
        self.state.lock().decoded = true;
        cache.update_decoded_resource(&**self, UpdateReason::Access, None);
    }
}

impl Resource for Image {
    fn url(&self) -> &str {
        &self.url
    }

    fn encoded_size(&self) -> usize {
        self.encoded
    }

    fn decoded_size(&self) -> usize {
        if self.state.lock().decoded {
            self.pixels * 4
        } else {
            0
        }
    }

    fn client_count(&self) -> usize {
        self.state.lock().observers
    }

    fn destroy_decoded_data_if_possible(&self) {
        self.state.lock().decoded = false;
    }
}

type Task = Box<dyn FnOnce(&MemoryCache) + Send>;

/// Records boundary requests, answered after the next task the loop runs.
#[derive(Debug, Clone, Default)]
struct BoundaryObserver {
    requested: Arc<AtomicBool>,
}

impl TaskHook for BoundaryObserver {
    fn schedule(&self) {
        self.requested.store(true, Ordering::Release);
    }
}

fn main() -> anyhow::Result<()> {
    {
        use tracing_subscriber::{prelude::*, EnvFilter};

        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_line_number(true))
            .with(EnvFilter::from_default_env())
            .init();
    }

    let observer = BoundaryObserver::default();
    let cache = CacheBuilder::new(256 * KB)
        .with_name("task-loop")
        .with_dead_capacities(16 * KB, 64 * KB)
        .with_delay_before_live_decoded_prune(Duration::ZERO)
        .with_task_hook(observer.clone())
        .build()?;
    let weak = cache.downgrade();

    let images = (0..16)
        .map(|i| Image::new(format!("https://gallery.test/{i}.png#thumb"), 8 * KB, 8 * KB))
        .collect::<Vec<_>>();

    let mut tasks: VecDeque<Task> = VecDeque::new();
    for image in images.iter() {
        let image = image.clone();
        tasks.push_back(Box::new(move |cache| {
            if let Err(e) = cache.add(image.clone()) {
                tracing::warn!("skip {}: {e}", image.url());
                return;
            }
            image.observe(cache);
            image.paint(cache);
        }));
    }
    for image in images.iter().take(12) {
        let image = image.clone();
        tasks.push_back(Box::new(move |cache| {
            // A script drops and re-acquires the image within one task. Live decoded data is only discarded at the
            // task boundary.
            image.unobserve(cache);
            image.observe(cache);
            image.unobserve(cache);
        }));
    }

    while let Some(task) = tasks.pop_front() {
        task(&cache);
        if observer.requested.swap(false, Ordering::AcqRel) {
            weak.did_process_task();
        }
        tracing::info!(
            "task done, size: {} (live: {}, dead: {}, decoded: {})",
            cache.size(),
            cache.live_size(),
            cache.dead_size(),
            cache.decoded_size()
        );
    }

    cache.dump_stats();
    anyhow::ensure!(cache.dead_size() <= cache.dead_capacity(), "dead resources over capacity");

    drop(cache);
    anyhow::ensure!(!weak.did_process_task(), "cache outlived its owner");
    Ok(())
}
