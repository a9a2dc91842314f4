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

//! The sample store: a shared, add-only cache of decoded buffers keyed by
//! pool-relative path.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::error::{LoadError, LoadErrorKind, PreloadErrors};
use super::loader::{SampleBuffer, SampleLoader};
use crate::voices::SoundPool;

/// Caches decoded sample buffers. Writers only ever add entries, so readers
/// on the tick path never observe a buffer changing underneath them.
pub struct SampleStore {
    /// Directory pool paths are relative to.
    root: PathBuf,
    loader: SampleLoader,
    cache: RwLock<HashMap<PathBuf, Arc<SampleBuffer>>>,
}

impl SampleStore {
    /// Creates an empty store that decodes to the given output sample rate.
    pub fn new(root: PathBuf, target_sample_rate: u32) -> SampleStore {
        SampleStore {
            root,
            loader: SampleLoader::new(target_sample_rate),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolves a pool path to a file on disk.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Non-blocking lookup of a decoded buffer.
    pub fn get(&self, path: &Path) -> Option<Arc<SampleBuffer>> {
        self.cache.read().get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.cache.read().contains_key(path)
    }

    /// Adds a buffer unless one is already cached for the path. Returns the
    /// buffer that ends up cached.
    pub fn insert(&self, path: &Path, buffer: Arc<SampleBuffer>) -> Arc<SampleBuffer> {
        self.cache
            .write()
            .entry(path.to_path_buf())
            .or_insert(buffer)
            .clone()
    }

    /// Decodes and caches a sample on the blocking pool. Preloading a cached
    /// path succeeds without touching the file.
    pub async fn preload(&self, path: &Path) -> Result<(), LoadError> {
        if self.contains(path) {
            debug!(path = ?path, "Using cached sample");
            return Ok(());
        }

        let loader = self.loader;
        let key = path.to_path_buf();
        let full_path = self.resolve(path);
        let buffer = tokio::task::spawn_blocking(move || loader.load(&key, &full_path))
            .await
            .map_err(|e| LoadError::new(path, LoadErrorKind::Task(e.to_string())))??;

        self.insert(path, buffer);
        Ok(())
    }

    /// Preloads every leaf of a pool concurrently. Completes once every load has
    /// finished. Loaded siblings stay cached when others fail, and each failing
    /// path is reported individually.
    pub async fn preload_all(self: &Arc<Self>, pool: &SoundPool) -> Result<(), PreloadErrors> {
        let mut seen = HashSet::new();
        let handles: Vec<_> = pool
            .leaves()
            .iter()
            .filter(|path| seen.insert(path.as_path()))
            .map(|path| {
                let store = Arc::clone(self);
                let path = path.clone();
                let handle = tokio::spawn({
                    let path = path.clone();
                    async move { store.preload(&path).await }
                });
                (path, handle)
            })
            .collect();

        let mut errors = Vec::new();
        for (path, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(LoadError::new(&path, LoadErrorKind::Task(e.to_string()))),
            };
            if let Err(e) = result {
                warn!(path = ?path, error = %e, "Failed to preload sample");
                errors.push(e);
            }
        }

        if errors.is_empty() {
            info!(
                samples = pool.len(),
                memory_kb = self.total_memory_usage() / 1024,
                "Sound pool preloaded"
            );
            Ok(())
        } else {
            Err(PreloadErrors::new(errors))
        }
    }

    /// Returns the number of cached samples.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Returns the total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.read().values().map(|s| s.memory_size()).sum()
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.loader.target_sample_rate()
    }
}

impl std::fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStore")
            .field("root", &self.root)
            .field("cached_samples", &self.len())
            .field("target_sample_rate", &self.loader.target_sample_rate())
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}
