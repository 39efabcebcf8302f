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

//! Revalidation swaps a cached resource for its refreshed version while stale removals are ignored.

use atrium::{memory::test_utils::TestResource, CacheBuilder, Resource};

fn main() -> anyhow::Result<()> {
    {
        use tracing_subscriber::{prelude::*, EnvFilter};

        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_line_number(true))
            .with(EnvFilter::from_default_env())
            .init();
    }

    let cache = CacheBuilder::new(1024 * 1024).with_name("revalidation").build()?;

    let stale = TestResource::new("https://news.test/feed.json")
        .with_identifier("tab-1")
        .with_encoded_size(4096)
        .with_clients(1)
        .into_ref();
    cache.add(stale.clone())?;

    // Consumers keep using the stale resource while it is revalidated.
    stale.set_revalidating(true);
    let found = cache
        .resource_for_url_in("https://news.test/feed.json#latest", "tab-1")
        .ok_or_else(|| anyhow::anyhow!("stale resource must stay reachable"))?;
    tracing::info!("serve {} while revalidating", found.url());

    let fresh = TestResource::new("https://news.test/feed.json")
        .with_identifier("tab-1")
        .with_encoded_size(4200)
        .with_clients(1)
        .into_ref();
    cache.replace(fresh.clone(), &*stale)?;
    stale.set_revalidating(false);

    // Teardown of the stale resource races with the swap and must not remove its successor.
    anyhow::ensure!(!cache.remove(&*stale), "stale removal must be ignored");
    anyhow::ensure!(cache.contains(&*fresh), "fresh resource must be cached");
    anyhow::ensure!(cache.size() == 4200, "only the fresh resource is charged");

    cache.dump_stats();
    Ok(())
}
