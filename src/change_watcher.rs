use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info};

use crate::field_registry::FieldRegistry;
use crate::host::{ElementId, HostDocument, MutationSubscription};

/// Feeds fields that appear after attachment into the registry.
/// Removals are not observed; stale entries are handled by the registry.
#[derive(Default)]
pub struct ChangeWatcher {
    subscription: Option<MutationSubscription>,
}

impl ChangeWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to insertions under `root`, replacing any earlier
    /// subscription.
    pub fn observe(&mut self, doc: &mut HostDocument, root: ElementId) {
        self.stop(doc);
        self.subscription = Some(doc.observe(root));
        debug!(root = %root, "observing page changes");
    }

    pub fn is_observing(&self) -> bool {
        self.subscription.is_some()
    }

    /// Drains delivered batches and registers every newly valid field found
    /// in the inserted subtrees. Returns how many fields were added.
    pub fn pump(&mut self, doc: &HostDocument, registry: &mut FieldRegistry) -> usize {
        let Some(sub) = self.subscription.as_mut() else {
            return 0;
        };
        let mut added = 0;
        loop {
            match sub.batches.try_recv() {
                Ok(batch) => {
                    for inserted in batch {
                        added += doc
                            .descendants(inserted)
                            .into_iter()
                            .filter(|id| registry.register(doc, *id))
                            .count();
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.subscription = None;
                    break;
                }
            }
        }
        if added > 0 {
            info!(added, total = registry.len(), "new text fields detected");
        }
        added
    }

    /// Tears the subscription down. Safe to call repeatedly.
    pub fn stop(&mut self, doc: &mut HostDocument) {
        if let Some(sub) = self.subscription.take() {
            doc.disconnect(sub.id);
        }
    }
}
