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
use std::fmt;
use std::path::{Path, PathBuf};

/// Why a single sample failed to load.
#[derive(Debug, thiserror::Error)]
pub enum LoadErrorKind {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio file error: {0}")]
    Audio(#[from] symphonia::core::errors::Error),

    #[error("No audio track found")]
    NoAudioTrack,

    #[error("Sample rate not specified")]
    UnknownSampleRate,

    #[error("Channels not specified")]
    UnknownChannels,

    #[error("Loading task failed: {0}")]
    Task(String),
}

/// A fetch or decode failure for one sample path. Non-fatal: the voice using
/// the path stays silent until the sample is retried or reassigned.
#[derive(Debug, thiserror::Error)]
#[error("Failed to load sample {}: {kind}", path.display())]
pub struct LoadError {
    path: PathBuf,
    #[source]
    kind: LoadErrorKind,
}

impl LoadError {
    pub fn new(path: &Path, kind: LoadErrorKind) -> LoadError {
        LoadError {
            path: path.to_path_buf(),
            kind,
        }
    }

    /// The pool-relative path that failed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> &LoadErrorKind {
        &self.kind
    }
}

/// Every failure from a pool preload, one entry per failing path.
#[derive(Debug)]
pub struct PreloadErrors(Vec<LoadError>);

impl PreloadErrors {
    pub fn new(errors: Vec<LoadError>) -> PreloadErrors {
        PreloadErrors(errors)
    }

    pub fn errors(&self) -> &[LoadError] {
        &self.0
    }

    /// The failing paths, in pool order.
    pub fn paths(&self) -> Vec<&Path> {
        self.0.iter().map(LoadError::path).collect()
    }

    pub fn into_inner(self) -> Vec<LoadError> {
        self.0
    }
}

impl fmt::Display for PreloadErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sample(s) failed to load", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for PreloadErrors {}
