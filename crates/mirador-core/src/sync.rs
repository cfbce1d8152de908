//! The mutation service and per-subscriber patch fan-out.
//!
//! [`SyncService`] owns the one observed state tree. Every mutation goes
//! through it, under a single lock, and the tree's bound [`Fanout`] handler
//! turns each intercepted change into a [`ServerEvent::Sync`] pushed to
//! every subscriber queue before the lock is released.
//!
//! Subscribers get their own unbounded queue. Nothing is coalesced or
//! dropped for a live subscriber; a subscriber whose receiver is gone is
//! removed on the next delivery without affecting anyone else.

use std::collections::BTreeMap;
use std::sync::Arc;

use mirador_tree::{ChangeHandler, ObservedTree, TreeError};
use mirador_types::{Patch, Path, ServerEvent, SubscriberId};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};

/// A server event shared by every subscriber queue it was delivered to.
pub type Outbound = Arc<ServerEvent>;

/// Errors from the synchronization layer.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The tree rejected the mutation.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// A typed value could not be rendered to JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The change handler bound to the state tree root.
///
/// Holds one queue per subscriber and broadcasts every intercepted change.
#[derive(Debug, Default)]
pub struct Fanout {
    subscribers: BTreeMap<SubscriberId, mpsc::UnboundedSender<Outbound>>,
}

impl Fanout {
    /// Push `event` to every subscriber. Returns how many received it.
    pub fn broadcast(&mut self, event: ServerEvent) -> usize {
        let event = Arc::new(event);
        let mut delivered = 0_usize;
        self.subscribers.retain(|id, tx| {
            if tx.send(Arc::clone(&event)).is_ok() {
                delivered = delivered.saturating_add(1);
                true
            } else {
                debug!(subscriber = %id, "dropping subscriber with closed queue");
                false
            }
        });
        delivered
    }

    /// Push `event` to one subscriber. Returns whether it was queued.
    pub fn send_to(&mut self, id: SubscriberId, event: ServerEvent) -> bool {
        let Some(tx) = self.subscribers.get(&id) else {
            return false;
        };
        if tx.send(Arc::new(event)).is_ok() {
            true
        } else {
            self.subscribers.remove(&id);
            false
        }
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    fn register(&mut self, id: SubscriberId, tx: mpsc::UnboundedSender<Outbound>) {
        self.subscribers.insert(id, tx);
    }

    fn unregister(&mut self, id: SubscriberId) -> bool {
        self.subscribers.remove(&id).is_some()
    }
}

impl ChangeHandler for Fanout {
    fn on_set(&mut self, path: &Path, value: &Value) {
        let delivered = self.broadcast(ServerEvent::Sync(Patch::set(path.clone(), value.clone())));
        trace!(%path, delivered, "patch set broadcast");
    }

    fn on_delete(&mut self, path: &Path) {
        let delivered = self.broadcast(ServerEvent::Sync(Patch::delete(path.clone())));
        trace!(%path, delivered, "patch delete broadcast");
    }
}

/// A registered subscriber's end of the patch stream.
///
/// The first event in `rx` is always the full-tree snapshot.
#[derive(Debug)]
pub struct Subscription {
    /// The fan-out registration id.
    pub id: SubscriberId,
    /// Queue of events, snapshot first.
    pub rx: mpsc::UnboundedReceiver<Outbound>,
}

/// The single authoritative state tree plus its subscribers.
#[derive(Debug)]
pub struct SyncService {
    tree: Mutex<ObservedTree<Fanout>>,
}

impl SyncService {
    /// Wrap `initial` as the state tree and bind the fan-out to it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Tree`] if `initial` is not a JSON object.
    pub fn new(initial: Value) -> Result<Self, SyncError> {
        let tree = ObservedTree::wrap(initial, Fanout::default())?;
        Ok(Self {
            tree: Mutex::new(tree),
        })
    }

    /// Register a new subscriber.
    ///
    /// The snapshot is taken and queued, and the subscriber registered,
    /// in one step under the tree lock: the subscriber receives every
    /// patch applied after its snapshot and none applied before it.
    pub async fn attach(&self) -> Subscription {
        self.attach_with(None).await
    }

    /// Register a new subscriber whose snapshot is directly followed by
    /// `notice`, ahead of any patch.
    pub async fn attach_with(&self, notice: Option<ServerEvent>) -> Subscription {
        let mut tree = self.tree.lock().await;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriberId::new();

        let snapshot = ServerEvent::Sync(Patch::snapshot(tree.snapshot()));
        // The receiver is held right here, so these cannot fail.
        let _ = tx.send(Arc::new(snapshot));
        if let Some(notice) = notice {
            let _ = tx.send(Arc::new(notice));
        }
        tree.handler_mut().register(id, tx);

        debug!(subscriber = %id, subscribers = tree.handler().len(), "subscriber attached");
        Subscription { id, rx }
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub async fn detach(&self, id: SubscriberId) -> bool {
        let mut tree = self.tree.lock().await;
        let removed = tree.handler_mut().unregister(id);
        if removed {
            debug!(subscriber = %id, subscribers = tree.handler().len(), "subscriber detached");
        }
        removed
    }

    /// Store `value` at `path` and broadcast the patch.
    ///
    /// # Errors
    ///
    /// See [`ObservedTree::set`].
    pub async fn set(&self, path: &Path, value: impl Into<Value>) -> Result<(), SyncError> {
        self.tree.lock().await.set(path, value)?;
        Ok(())
    }

    /// Delete the node at `path` and broadcast the patch if it existed.
    ///
    /// # Errors
    ///
    /// See [`ObservedTree::delete`].
    pub async fn delete(&self, path: &Path) -> Result<bool, SyncError> {
        Ok(self.tree.lock().await.delete(path)?)
    }

    /// Run several mutations as one indivisible step.
    ///
    /// No other mutation and no subscriber bootstrap can interleave with
    /// `f`. Patches are still broadcast one by one, in the order `f`
    /// performs them.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns. Mutations applied before the error
    /// stay applied (and broadcast).
    pub async fn mutate<T, F>(&self, f: F) -> Result<T, SyncError>
    where
        F: FnOnce(&mut ObservedTree<Fanout>) -> Result<T, TreeError>,
    {
        let mut tree = self.tree.lock().await;
        Ok(f(&mut *tree)?)
    }

    /// Render the node at `path`.
    pub async fn get(&self, path: &Path) -> Option<Value> {
        self.tree.lock().await.get(path)
    }

    /// Render the whole tree.
    pub async fn snapshot(&self) -> Value {
        self.tree.lock().await.snapshot()
    }

    /// Broadcast an out-of-band event, ordered with the patch stream.
    pub async fn notify(&self, event: ServerEvent) -> usize {
        self.tree.lock().await.handler_mut().broadcast(event)
    }

    /// Queue an event for one subscriber, ordered with its patch stream.
    pub async fn send_to(&self, id: SubscriberId, event: ServerEvent) -> bool {
        self.tree.lock().await.handler_mut().send_to(id, event)
    }

    /// Number of registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.tree.lock().await.handler().len()
    }

    /// Number of live observed mapping nodes.
    pub async fn observed_nodes(&self) -> usize {
        self.tree.lock().await.observed_nodes()
    }
}
