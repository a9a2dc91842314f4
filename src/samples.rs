// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Sample loading and caching.
//!
//! This module provides:
//! - Decoding of sample files into in-memory buffers
//! - A shared, add-only cache keyed by pool-relative path
//! - Concurrent preloading of whole sound pools with per-path failure reports

mod error;
mod loader;
mod store;

pub use error::{LoadError, LoadErrorKind, PreloadErrors};
pub use loader::{SampleBuffer, SampleLoader};
pub use store::SampleStore;
