//! Prefix-carrying mutation views.
//!
//! A [`Cursor`] remembers the path accumulated from the root, so nested
//! code can write relative to its own subtree and still report full paths:
//!
//! ```
//! use mirador_tree::ObservedTree;
//! use mirador_types::{path, Patch};
//! use serde_json::json;
//!
//! let mut tree = ObservedTree::wrap(json!({"server": {"game": {}}}), Vec::<Patch>::new())?;
//! tree.at(path!["server"]).at("game").set("tps", 20)?;
//! assert_eq!(tree.handler()[0].path(), &path!["server", "game", "tps"]);
//! # Ok::<(), mirador_tree::TreeError>(())
//! ```

use mirador_types::{Key, Path};
use serde_json::Value;

use crate::error::TreeError;
use crate::handler::ChangeHandler;
use crate::observer::ObservedTree;

/// A mutable view of an [`ObservedTree`] rooted at a path prefix.
#[derive(Debug)]
pub struct Cursor<'a, H> {
    tree: &'a mut ObservedTree<H>,
    prefix: Path,
}

impl<'a, H: ChangeHandler> Cursor<'a, H> {
    pub(crate) const fn new(tree: &'a mut ObservedTree<H>, prefix: Path) -> Self {
        Self { tree, prefix }
    }

    /// Descend one level.
    #[must_use]
    pub fn at(mut self, key: impl Into<Key>) -> Self {
        self.prefix.push(key);
        self
    }

    /// The accumulated prefix.
    pub const fn path(&self) -> &Path {
        &self.prefix
    }

    /// Write `value` under `key` relative to this cursor.
    ///
    /// # Errors
    ///
    /// See [`ObservedTree::set`].
    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), TreeError> {
        let path = self.prefix.child(key);
        self.tree.set(&path, value)
    }

    /// Delete `key` relative to this cursor.
    ///
    /// # Errors
    ///
    /// See [`ObservedTree::delete`].
    pub fn delete(&mut self, key: impl Into<Key>) -> Result<bool, TreeError> {
        let path = self.prefix.child(key);
        self.tree.delete(&path)
    }

    /// Read the node under `key` relative to this cursor.
    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        self.tree.get(&self.prefix.child(key))
    }
}
