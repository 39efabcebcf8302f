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

use std::fmt::Display;

use crate::resource::{Resource, DEFAULT_CACHE_IDENTIFIER};

/// Strip the fragment from `url`.
///
/// `data:` URLs are returned untouched because `#` is part of their payload.
pub fn normalize_url(url: &str) -> &str {
    if url.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:")) {
        return url;
    }
    match url.find('#') {
        Some(pos) => &url[..pos],
        None => url,
    }
}

/// Identity of a cache entry: normalized URL within a partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    identifier: String,
    url: String,
}

impl CacheKey {
    /// Key of `url` in the partition `identifier`.
    pub fn new(url: &str, identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            url: normalize_url(url).to_string(),
        }
    }

    /// Key a resource is cached under.
    pub fn of(resource: &dyn Resource) -> Self {
        Self::new(resource.url(), resource.cache_identifier())
    }

    /// Normalized URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Cache identifier of the partition.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Return `true` if the key lives in the default partition.
    pub fn is_default_partition(&self) -> bool {
        self.identifier == DEFAULT_CACHE_IDENTIFIER
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_default_partition() {
            write!(f, "{}", self.url)
        } else {
            write!(f, "{} @ {}", self.url, self.identifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestResource;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("http://x/y#a"), "http://x/y");
        assert_eq!(normalize_url("http://x/y#"), "http://x/y");
        assert_eq!(normalize_url("http://x/y"), "http://x/y");
        assert_eq!(normalize_url("file:///a/b.svg#frag"), "file:///a/b.svg");
        assert_eq!(normalize_url("data:image/svg+xml,<svg fill='#fff'/>"), "data:image/svg+xml,<svg fill='#fff'/>");
        assert_eq!(normalize_url("DATA:text/plain,#1"), "DATA:text/plain,#1");
        assert_eq!(normalize_url(""), "");
        assert_eq!(normalize_url("é#x"), "é");
    }

    #[test]
    fn test_key_fragment_equivalence() {
        assert_eq!(CacheKey::new("http://x/y#a", ""), CacheKey::new("http://x/y", ""));
        assert_eq!(CacheKey::new("http://x/y#a", ""), CacheKey::new("http://x/y#b", ""));
        assert_ne!(CacheKey::new("http://x/y", "a"), CacheKey::new("http://x/y", "b"));
    }

    #[test]
    fn test_key_of_resource() {
        let r = TestResource::new("http://x/y#top").with_identifier("frame-1");
        let key = CacheKey::of(&r);
        assert_eq!(key.url(), "http://x/y");
        assert_eq!(key.identifier(), "frame-1");
        assert!(!key.is_default_partition());
        assert_eq!(key.to_string(), "http://x/y @ frame-1");

        let key = CacheKey::of(&TestResource::new("http://x/z"));
        assert!(key.is_default_partition());
        assert_eq!(key.to_string(), "http://x/z");
    }
}
