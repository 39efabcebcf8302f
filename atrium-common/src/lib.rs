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

//! Shared components for atrium.

/// Strict assertion helpers.
pub mod assert;
/// Clock abstraction used by time-based deferral.
pub mod clock;
/// The error type shared by atrium crates.
pub mod error;
/// Metrics bundle for the resource cache.
pub mod metrics;
