//! Index-addressed storage for observed mapping nodes.

use std::collections::BTreeMap;

use mirador_types::Key;
use serde_json::{Map, Value};

/// Stable index of a mapping node in the [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

impl NodeId {
    pub(crate) const fn index(self) -> usize {
        self.0
    }
}

/// How a mapping node renders back to JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    Object,
    Array,
}

/// A child entry: leaves inline, mappings by arena index.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Leaf(Value),
    Node(NodeId),
}

/// An observed mapping node.
///
/// Array nodes keep a logical length: deleting an element leaves a hole
/// (rendered as `null`) and never shortens the array.
#[derive(Debug)]
pub(crate) struct Branch {
    pub(crate) shape: Shape,
    pub(crate) children: BTreeMap<Key, Slot>,
    len: usize,
}

impl Branch {
    const fn new(shape: Shape) -> Self {
        Self {
            shape,
            children: BTreeMap::new(),
            len: 0,
        }
    }

    /// Whether `key` may be written here. Arrays accept an existing index
    /// or the one just past the end.
    pub(crate) fn admits(&self, key: &Key) -> bool {
        match self.shape {
            Shape::Object => true,
            Shape::Array => array_index(key).is_some_and(|index| index <= self.len),
        }
    }

    /// Store `slot` under `key`, growing an array's length as needed.
    pub(crate) fn insert(&mut self, key: Key, slot: Slot) -> Option<Slot> {
        if self.shape == Shape::Array {
            if let Some(index) = array_index(&key) {
                self.len = self.len.max(index.saturating_add(1));
            }
        }
        self.children.insert(key, slot)
    }

    /// Number of children; for arrays, the logical length including holes.
    pub(crate) fn logical_len(&self) -> usize {
        match self.shape {
            Shape::Object => self.children.len(),
            Shape::Array => self.len,
        }
    }
}

fn array_index(key: &Key) -> Option<usize> {
    key.as_index().and_then(|index| usize::try_from(index).ok())
}

/// Slab of mapping nodes with a free list.
#[derive(Debug, Default)]
pub(crate) struct Arena {
    slots: Vec<Option<Branch>>,
    free: Vec<usize>,
    live: usize,
}

impl Arena {
    fn alloc(&mut self, branch: Branch) -> NodeId {
        self.live = self.live.saturating_add(1);
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index) {
                *slot = Some(branch);
                return NodeId(index);
            }
        }
        self.slots.push(Some(branch));
        NodeId(self.slots.len().saturating_sub(1))
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Branch> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Branch> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Number of live mapping nodes.
    pub(crate) const fn live(&self) -> usize {
        self.live
    }

    /// Number of slots ever allocated (live plus free).
    pub(crate) const fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Wrap a plain value: mappings (and arrays) become arena nodes,
    /// recursively; scalars stay inline.
    pub(crate) fn wrap(&mut self, value: Value) -> Slot {
        match value {
            Value::Object(map) => Slot::Node(self.wrap_object(map)),
            Value::Array(items) => {
                let mut branch = Branch::new(Shape::Array);
                for (index, item) in (0_u64..).zip(items) {
                    let child = self.wrap(item);
                    branch.insert(Key::Index(index), child);
                }
                Slot::Node(self.alloc(branch))
            }
            scalar => Slot::Leaf(scalar),
        }
    }

    pub(crate) fn wrap_object(&mut self, map: Map<String, Value>) -> NodeId {
        let mut branch = Branch::new(Shape::Object);
        for (name, item) in map {
            let child = self.wrap(item);
            branch.insert(Key::field(name), child);
        }
        self.alloc(branch)
    }

    /// Release `root` and every mapping below it, depth-first.
    ///
    /// Returns the number of nodes released.
    pub(crate) fn release_subtree(&mut self, root: NodeId) -> usize {
        let mut released = 0_usize;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(branch) = self.slots.get_mut(id.0).and_then(Option::take) else {
                continue;
            };
            stack.extend(branch.children.values().filter_map(|slot| match slot {
                Slot::Node(child) => Some(*child),
                Slot::Leaf(_) => None,
            }));
            self.free.push(id.0);
            self.live = self.live.saturating_sub(1);
            released = released.saturating_add(1);
        }
        released
    }

    /// Render a slot back to plain JSON.
    pub(crate) fn render(&self, slot: &Slot) -> Value {
        match slot {
            Slot::Leaf(value) => value.clone(),
            Slot::Node(id) => self.render_node(*id),
        }
    }

    pub(crate) fn render_node(&self, id: NodeId) -> Value {
        let Some(branch) = self.get(id) else {
            return Value::Null;
        };
        match branch.shape {
            Shape::Object => Value::Object(
                branch
                    .children
                    .iter()
                    .map(|(key, slot)| (key.to_member_name(), self.render(slot)))
                    .collect(),
            ),
            Shape::Array => {
                // Holes left by deletes render as null.
                let items = (0_u64..)
                    .take(branch.len)
                    .map(|index| {
                        branch
                            .children
                            .get(&Key::Index(index))
                            .map_or(Value::Null, |slot| self.render(slot))
                    })
                    .collect();
                Value::Array(items)
            }
        }
    }
}
