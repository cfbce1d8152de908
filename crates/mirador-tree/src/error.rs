//! Error types for tree mutations.

use mirador_types::Path;

/// Errors returned by [`ObservedTree`](crate::ObservedTree) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// Only a mapping can be the root of an observed tree.
    #[error("the tree root must be a mapping")]
    RootNotMapping,

    /// The root itself cannot be assigned or removed.
    #[error("empty path: the root cannot be replaced or removed")]
    EmptyPath,

    /// An intermediate node on the path does not exist.
    #[error("missing parent node at {path}")]
    MissingParent {
        /// The first missing prefix.
        path: Path,
    },

    /// An intermediate node on the path is a leaf.
    #[error("node at {path} is a leaf, not a mapping")]
    NotAMapping {
        /// The prefix that resolved to a leaf.
        path: Path,
    },

    /// An array only accepts writes at an existing index or one past its
    /// end.
    #[error("cannot write {path}: array length is {len}")]
    IndexOutOfRange {
        /// The rejected path.
        path: Path,
        /// The array's current length.
        len: usize,
    },

    /// The source of a copy does not exist.
    #[error("no node at {path}")]
    NotFound {
        /// The path that was looked up.
        path: Path,
    },

    /// An arena index refers to a released slot.
    #[error("arena slot {0} is not live")]
    DanglingNode(usize),
}
