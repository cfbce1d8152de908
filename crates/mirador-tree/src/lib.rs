//! Observed state tree for the Mirador state mirror.
//!
//! [`ObservedTree`] owns a nested JSON-like tree and intercepts every write
//! and deletion made through its API, reporting each one to a single
//! [`ChangeHandler`] with the full path from the root. Mapping values
//! assigned into the tree are wrapped recursively, so writes inside a
//! freshly assigned subtree are observed too.
//!
//! # Design
//!
//! - **Arena**: mapping nodes live in an index-addressed arena. Wrapping a
//!   mapping allocates slots; deleting or overwriting it releases the whole
//!   subtree, and released slots are reused.
//! - **Leaves unwrapped**: scalars are stored inline in their parent.
//! - **Single owner**: values are moved in, so two locations never share a
//!   subtree. [`ObservedTree::copy`] duplicates explicitly.
//! - **Write-then-notify**: the handler runs only after the value is stored
//!   and fully wrapped.

mod arena;
pub mod cursor;
pub mod error;
pub mod handler;
pub mod observer;

pub use cursor::Cursor;
pub use error::TreeError;
pub use handler::ChangeHandler;
pub use observer::ObservedTree;
