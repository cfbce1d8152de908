//! Change records emitted for every mutation of the state tree.
//!
//! A [`Patch`] is either a write (`{path, value}`) or a removal
//! (`{path, delete: true}`). The full-tree baseline a subscriber receives on
//! connect is simply a write at the root path.

use core::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use ts_rs::TS;

use crate::path::Path;

/// The literal `true` carried by delete patches.
///
/// Deserializing anything other than `true` fails, so a `{path, delete:
/// false}` message can never be mistaken for a removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DeleteMarker;

impl Serialize for DeleteMarker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(true)
    }
}

struct DeleteMarkerVisitor;

impl Visitor<'_> for DeleteMarkerVisitor {
    type Value = DeleteMarker;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("the boolean `true`")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<DeleteMarker, E> {
        if v {
            Ok(DeleteMarker)
        } else {
            Err(E::invalid_value(de::Unexpected::Bool(v), &self))
        }
    }
}

impl<'de> Deserialize<'de> for DeleteMarker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_bool(DeleteMarkerVisitor)
    }
}

/// A structured change record addressed by path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export, export_to = "bindings/")]
pub enum Patch {
    /// The node at `path` was removed.
    Delete {
        /// Keys from the root to the removed node.
        #[ts(type = "Array<string | number>")]
        path: Path,
        /// Always `true`.
        #[ts(type = "true")]
        delete: DeleteMarker,
    },
    /// The node at `path` now holds `value`.
    Set {
        /// Keys from the root to the written node.
        #[ts(type = "Array<string | number>")]
        path: Path,
        /// The stored value, rendered as JSON.
        value: Value,
    },
}

impl Patch {
    /// A write of `value` at `path`.
    pub const fn set(path: Path, value: Value) -> Self {
        Self::Set { path, value }
    }

    /// A removal at `path`.
    pub const fn delete(path: Path) -> Self {
        Self::Delete {
            path,
            delete: DeleteMarker,
        }
    }

    /// The full-tree baseline: a write of `tree` at the root path.
    pub const fn snapshot(tree: Value) -> Self {
        Self::Set {
            path: Path::root(),
            value: tree,
        }
    }

    /// The path this patch addresses.
    pub const fn path(&self) -> &Path {
        match self {
            Self::Delete { path, .. } | Self::Set { path, .. } => path,
        }
    }

    /// Whether this patch removes a node.
    pub const fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }

    /// Apply this patch to a plain JSON mirror, the way a dashboard client
    /// keeps its local copy.
    ///
    /// Writes create missing intermediate objects. Returns `false` when an
    /// intermediate node is a scalar and the patch cannot be applied.
    pub fn apply_to(&self, mirror: &mut Value) -> bool {
        let Some((last, parents)) = self.path().split_last() else {
            return match self {
                Self::Set { value, .. } => {
                    mirror.clone_from(value);
                    true
                }
                Self::Delete { .. } => false,
            };
        };

        let mut node = mirror;
        for key in parents {
            let Some(next) = child_mut(node, key, !self.is_delete()) else {
                return self.is_delete();
            };
            node = next;
        }

        match self {
            Self::Set { value, .. } => insert(node, last, value.clone()),
            Self::Delete { .. } => {
                remove(node, last);
                true
            }
        }
    }
}

fn child_mut<'a>(node: &'a mut Value, key: &crate::Key, create: bool) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => {
            let name = key.to_member_name();
            if create && !map.contains_key(&name) {
                map.insert(name.clone(), Value::Object(serde_json::Map::new()));
            }
            map.get_mut(&name)
        }
        Value::Array(items) => {
            let index = usize::try_from(key.as_index()?).ok()?;
            items.get_mut(index)
        }
        _ => None,
    }
}

fn insert(node: &mut Value, key: &crate::Key, value: Value) -> bool {
    match node {
        Value::Object(map) => {
            map.insert(key.to_member_name(), value);
            true
        }
        Value::Array(items) => {
            let Some(index) = key.as_index().and_then(|i| usize::try_from(i).ok()) else {
                return false;
            };
            if index >= items.len() {
                items.resize(index.saturating_add(1), Value::Null);
            }
            if let Some(slot) = items.get_mut(index) {
                *slot = value;
            }
            true
        }
        _ => false,
    }
}

fn remove(node: &mut Value, key: &crate::Key) {
    match node {
        Value::Object(map) => {
            map.remove(&key.to_member_name());
        }
        Value::Array(items) => {
            // Array holes render as null, matching how the tree renders them.
            if let Some(slot) = key
                .as_index()
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| items.get_mut(i))
            {
                *slot = Value::Null;
            }
        }
        _ => {}
    }
}
