//! The observed tree and its mutation API.

use mirador_types::{Key, Path};
use serde_json::Value;
use tracing::trace;

use crate::arena::{Arena, NodeId, Slot};
use crate::cursor::Cursor;
use crate::error::TreeError;
use crate::handler::ChangeHandler;

/// A nested value tree whose every write and deletion is reported to a
/// [`ChangeHandler`].
///
/// Reads render plain JSON. Writes go through [`set`](Self::set) and
/// [`delete`](Self::delete) (or a [`Cursor`]), which store the change and
/// then notify the handler with the full path from the root.
#[derive(Debug)]
pub struct ObservedTree<H> {
    arena: Arena,
    root: NodeId,
    handler: H,
}

impl<H: ChangeHandler> ObservedTree<H> {
    /// Wrap `root` and bind `handler` to it.
    ///
    /// Every mapping inside `root` becomes observed. The handler is not
    /// called for the initial contents.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::RootNotMapping`] if `root` is not a JSON object.
    pub fn wrap(root: Value, handler: H) -> Result<Self, TreeError> {
        let Value::Object(map) = root else {
            return Err(TreeError::RootNotMapping);
        };
        let mut arena = Arena::default();
        let root = arena.wrap_object(map);
        Ok(Self {
            arena,
            root,
            handler,
        })
    }

    /// Store `value` at `path` and report it.
    ///
    /// Mapping values are wrapped recursively before they are stored. Any
    /// subtree previously stored at `path` is released. The handler runs
    /// after the value is in place, with the stored value rendered as JSON.
    ///
    /// # Errors
    ///
    /// - [`TreeError::EmptyPath`] for the root path
    /// - [`TreeError::MissingParent`] if an intermediate node is absent
    /// - [`TreeError::NotAMapping`] if an intermediate node is a leaf
    /// - [`TreeError::IndexOutOfRange`] if the parent is an array and the
    ///   key is not an index at most one past its end
    pub fn set(&mut self, path: &Path, value: impl Into<Value>) -> Result<(), TreeError> {
        let (key, parents) = path.split_last().ok_or(TreeError::EmptyPath)?;
        let parent = self.resolve_branch(parents)?;
        let branch = self
            .arena
            .get(parent)
            .ok_or(TreeError::DanglingNode(parent.index()))?;
        if !branch.admits(key) {
            return Err(TreeError::IndexOutOfRange {
                path: path.clone(),
                len: branch.logical_len(),
            });
        }

        let slot = self.arena.wrap(value.into());
        let previous = self
            .arena
            .get_mut(parent)
            .ok_or(TreeError::DanglingNode(parent.index()))?
            .insert(key.clone(), slot);
        if let Some(Slot::Node(old)) = previous {
            let released = self.arena.release_subtree(old);
            trace!(%path, released, "released replaced subtree");
        }

        let stored = self.render_child(parent, key);
        trace!(%path, "tree set");
        self.handler.on_set(path, &stored);
        Ok(())
    }

    /// Remove the node at `path` and report it.
    ///
    /// Returns `Ok(false)` without notifying when nothing exists at `path`
    /// (including when an intermediate node is missing). A removed mapping
    /// is released depth-first before its key is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EmptyPath`] for the root path.
    pub fn delete(&mut self, path: &Path) -> Result<bool, TreeError> {
        let (key, parents) = path.split_last().ok_or(TreeError::EmptyPath)?;
        let parent = match self.resolve_branch(parents) {
            Ok(parent) => parent,
            Err(TreeError::MissingParent { .. } | TreeError::NotAMapping { .. }) => {
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let branch = self
            .arena
            .get_mut(parent)
            .ok_or(TreeError::DanglingNode(parent.index()))?;
        let subtree = match branch.children.get(key) {
            None => return Ok(false),
            Some(Slot::Node(id)) => Some(*id),
            Some(Slot::Leaf(_)) => None,
        };

        if let Some(id) = subtree {
            let released = self.arena.release_subtree(id);
            trace!(%path, released, "released deleted subtree");
        }
        if let Some(branch) = self.arena.get_mut(parent) {
            branch.children.remove(key);
        }

        trace!(%path, "tree delete");
        self.handler.on_delete(path);
        Ok(true)
    }

    /// Deep-copy the node at `from` into `to`, reporting one write at `to`.
    ///
    /// The two locations stay independent afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotFound`] if nothing exists at `from`, or any
    /// error [`set`](Self::set) returns for `to`.
    pub fn copy(&mut self, from: &Path, to: &Path) -> Result<(), TreeError> {
        let value = self
            .get(from)
            .ok_or_else(|| TreeError::NotFound { path: from.clone() })?;
        self.set(to, value)
    }

    /// A mutation view rooted at `prefix`.
    pub fn at(&mut self, prefix: Path) -> Cursor<'_, H> {
        Cursor::new(self, prefix)
    }
}

impl<H> ObservedTree<H> {
    /// Render the node at `path` as JSON, or `None` if absent.
    pub fn get(&self, path: &Path) -> Option<Value> {
        self.slot_at(path).map(|slot| self.arena.render(&slot))
    }

    /// Whether a node exists at `path`.
    pub fn contains(&self, path: &Path) -> bool {
        self.slot_at(path).is_some()
    }

    /// Child keys of the mapping at `path`, in key order.
    ///
    /// Returns `None` if `path` is absent or a leaf.
    pub fn keys_at(&self, path: &Path) -> Option<Vec<Key>> {
        let Slot::Node(id) = self.slot_at(path)? else {
            return None;
        };
        Some(self.arena.get(id)?.children.keys().cloned().collect())
    }

    /// Number of children of the mapping at `path`; for arrays, the
    /// length including holes.
    pub fn len_at(&self, path: &Path) -> Option<usize> {
        let Slot::Node(id) = self.slot_at(path)? else {
            return None;
        };
        Some(self.arena.get(id)?.logical_len())
    }

    /// Render the whole tree.
    pub fn snapshot(&self) -> Value {
        self.arena.render_node(self.root)
    }

    /// Number of live observed mapping nodes, root included.
    pub const fn observed_nodes(&self) -> usize {
        self.arena.live()
    }

    /// Number of arena slots allocated so far (live plus reusable).
    pub const fn arena_slots(&self) -> usize {
        self.arena.capacity()
    }

    /// The bound change handler.
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// Mutable access to the bound change handler.
    pub const fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Walk `keys` from the root; every key must name a mapping.
    fn resolve_branch(&self, keys: &[Key]) -> Result<NodeId, TreeError> {
        let mut current = self.root;
        let mut walked = Path::root();
        for key in keys {
            walked.push(key.clone());
            let branch = self
                .arena
                .get(current)
                .ok_or(TreeError::DanglingNode(current.index()))?;
            current = match branch.children.get(key) {
                Some(Slot::Node(id)) => *id,
                Some(Slot::Leaf(_)) => return Err(TreeError::NotAMapping { path: walked }),
                None => return Err(TreeError::MissingParent { path: walked }),
            };
        }
        Ok(current)
    }

    fn slot_at(&self, path: &Path) -> Option<Slot> {
        let Some((key, parents)) = path.split_last() else {
            return Some(Slot::Node(self.root));
        };
        let parent = self.resolve_branch(parents).ok()?;
        self.arena.get(parent)?.children.get(key).cloned()
    }

    fn render_child(&self, parent: NodeId, key: &Key) -> Value {
        self.arena
            .get(parent)
            .and_then(|branch| branch.children.get(key))
            .map_or(Value::Null, |slot| self.arena.render(slot))
    }
}
