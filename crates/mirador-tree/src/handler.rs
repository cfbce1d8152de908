//! The change-handler hook invoked on every intercepted mutation.

use mirador_types::{Patch, Path};
use serde_json::Value;

/// Receives every write and deletion applied to an
/// [`ObservedTree`](crate::ObservedTree).
///
/// Exactly one handler is bound to a tree, at wrap time. Calls arrive in
/// mutation order, after the mutation is fully applied.
pub trait ChangeHandler {
    /// A value was stored at `path`. `value` is the stored value rendered
    /// as JSON.
    fn on_set(&mut self, path: &Path, value: &Value);

    /// The node at `path` was removed.
    fn on_delete(&mut self, path: &Path);
}

/// Collects patches in order. Handy for tests and for batching.
impl ChangeHandler for Vec<Patch> {
    fn on_set(&mut self, path: &Path, value: &Value) {
        self.push(Patch::set(path.clone(), value.clone()));
    }

    fn on_delete(&mut self, path: &Path) {
        self.push(Patch::delete(path.clone()));
    }
}
