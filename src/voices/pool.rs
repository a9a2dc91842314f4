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

//! Sound pools: the category tree of samples a voice can cycle through.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Error raised when a sound list doesn't have a usable shape.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct PoolError(String);

/// A node in a sound pool tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SoundPoolNode {
    /// A sample reference, relative to the samples root.
    Leaf(PathBuf),
    /// A named category holding ordered children.
    Category {
        name: String,
        children: Vec<SoundPoolNode>,
    },
}

/// A sound pool together with its depth-first flattened leaf order.
/// The flattening happens once at construction, so cursors index straight
/// into `leaves`.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundPool {
    nodes: Vec<SoundPoolNode>,
    leaves: Vec<PathBuf>,
}

impl SoundPool {
    /// Creates a pool from a list of top-level nodes.
    pub fn new(nodes: Vec<SoundPoolNode>) -> SoundPool {
        let mut leaves = Vec::new();
        for node in &nodes {
            collect_leaves(node, &mut leaves);
        }
        SoundPool { nodes, leaves }
    }

    /// Creates a flat pool from sample paths.
    pub fn from_paths<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> SoundPool {
        SoundPool::new(
            paths
                .into_iter()
                .map(|path| SoundPoolNode::Leaf(path.into()))
                .collect(),
        )
    }

    /// Builds a pool from sound list JSON.
    ///
    /// Object keys are categories and contribute a path segment, arrays list
    /// file names, and strings are file names. `{"snare": {"acoustic": ["s1.wav"]}}`
    /// yields the single leaf `snare/acoustic/s1.wav`.
    ///
    /// Every leaf must be distinct so that advancing the cursor always arms a
    /// different sample.
    pub fn from_json(value: &Value) -> Result<SoundPool, PoolError> {
        let pool = SoundPool::new(parse_value(value, Path::new(""))?);
        let mut seen = HashSet::new();
        if let Some(duplicate) = pool.leaves.iter().find(|leaf| !seen.insert(leaf.as_path())) {
            return Err(PoolError(format!(
                "'{}' appears more than once",
                duplicate.display()
            )));
        }
        Ok(pool)
    }

    /// Returns the top-level nodes.
    pub fn nodes(&self) -> &[SoundPoolNode] {
        &self.nodes
    }

    /// Returns every leaf in depth-first order.
    pub fn leaves(&self) -> &[PathBuf] {
        &self.leaves
    }

    /// Returns the leaf at the given cursor position.
    pub fn leaf(&self, index: usize) -> Option<&Path> {
        self.leaves.get(index).map(PathBuf::as_path)
    }

    /// Returns the first leaf, which is the initially armed sample.
    pub fn first(&self) -> Option<&Path> {
        self.leaf(0)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

fn collect_leaves(node: &SoundPoolNode, leaves: &mut Vec<PathBuf>) {
    match node {
        SoundPoolNode::Leaf(path) => leaves.push(path.clone()),
        SoundPoolNode::Category { children, .. } => {
            for child in children {
                collect_leaves(child, leaves);
            }
        }
    }
}

fn parse_value(value: &Value, prefix: &Path) -> Result<Vec<SoundPoolNode>, PoolError> {
    match value {
        Value::String(file) => Ok(vec![SoundPoolNode::Leaf(prefix.join(file))]),
        Value::Array(entries) => entries
            .iter()
            .map(|entry| match entry {
                Value::String(file) => Ok(SoundPoolNode::Leaf(prefix.join(file))),
                other => Err(PoolError(format!(
                    "expected a file name in the list under '{}', found {}",
                    prefix.display(),
                    other
                ))),
            })
            .collect(),
        Value::Object(categories) => {
            let mut nodes = Vec::with_capacity(categories.len());
            for (name, child) in categories {
                match child {
                    // A string under a key is a file in the current category, the key is only a label.
                    Value::String(file) => nodes.push(SoundPoolNode::Leaf(prefix.join(file))),
                    _ => nodes.push(SoundPoolNode::Category {
                        name: name.clone(),
                        children: parse_value(child, &prefix.join(name))?,
                    }),
                }
            }
            Ok(nodes)
        }
        other => Err(PoolError(format!(
            "unexpected value {} under '{}'",
            other,
            prefix.display()
        ))),
    }
}

/// Returns the display label for a sample: its file name without the extension.
pub fn sample_label(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("unreadable file name")
        .to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_flat_category() {
        let pool = SoundPool::from_json(&json!({"kick": ["k1.wav", "k2.wav", "k3.wav"]})).unwrap();
        assert_eq!(
            pool.leaves(),
            &[
                PathBuf::from("kick/k1.wav"),
                PathBuf::from("kick/k2.wav"),
                PathBuf::from("kick/k3.wav"),
            ]
        );
        assert_eq!(pool.first(), Some(Path::new("kick/k1.wav")));
    }

    #[test]
    fn test_nested_categories_keep_order() {
        let pool = SoundPool::from_json(&json!({
            "snare": {
                "rimshot": ["r1.wav"],
                "acoustic": ["a1.wav", "a2.wav"]
            }
        }))
        .unwrap();

        assert_eq!(
            pool.leaves(),
            &[
                PathBuf::from("snare/rimshot/r1.wav"),
                PathBuf::from("snare/acoustic/a1.wav"),
                PathBuf::from("snare/acoustic/a2.wav"),
            ]
        );

        match &pool.nodes()[0] {
            SoundPoolNode::Category { name, children } => {
                assert_eq!(name, "snare");
                assert_eq!(children.len(), 2);
            }
            other => panic!("expected a category, got {:?}", other),
        }
    }

    #[test]
    fn test_string_values_are_leaves() {
        let pool = SoundPool::from_json(&json!({
            "fx": {"first": "zap.wav", "second": "boom.wav"}
        }))
        .unwrap();
        assert_eq!(
            pool.leaves(),
            &[PathBuf::from("fx/zap.wav"), PathBuf::from("fx/boom.wav")]
        );
    }

    #[test]
    fn test_bare_list() {
        let pool = SoundPool::from_json(&json!(["a.wav", "b.wav"])).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.leaf(1), Some(Path::new("b.wav")));
        assert_eq!(pool.leaf(2), None);
    }

    #[test]
    fn test_invalid_values() {
        assert!(SoundPool::from_json(&json!({"kick": [1, 2]})).is_err());
        assert!(SoundPool::from_json(&json!({"kick": null})).is_err());
        assert!(SoundPool::from_json(&json!(true)).is_err());
    }

    #[test]
    fn test_duplicate_leaves() {
        let err = SoundPool::from_json(&json!(["a.wav", "a.wav"])).unwrap_err();
        assert_eq!(err.to_string(), "'a.wav' appears more than once");

        // Keys above bare strings are labels, so both land on `k1.wav`.
        assert!(SoundPool::from_json(&json!({"x": "k1.wav", "y": "k1.wav"})).is_err());

        // The same file name in different categories is a different leaf.
        let pool = SoundPool::from_json(&json!({"a": ["k.wav"], "b": ["k.wav"]})).unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_empty_pool() {
        let pool = SoundPool::from_json(&json!({"kick": []})).unwrap();
        assert!(pool.is_empty());
        assert_eq!(pool.first(), None);
    }

    #[test]
    fn test_sample_label() {
        assert_eq!(sample_label(Path::new("kick/acoustic/k1.wav")), "k1");
        assert_eq!(sample_label(Path::new("hat.flac")), "hat");
        assert_eq!(sample_label(Path::new("noext")), "noext");
    }
}
