//! Snapshot fan-out to subscribers

use sleeplog_api::Snapshot;
use sleeplog_util::SubscriptionId;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::store::Command;

/// A live feed of committed snapshots
///
/// The first value is the snapshot current at subscription time, followed by
/// one value per committed mutation, in commit order. Dropping the
/// subscription unregisters it from the store.
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<Snapshot>,
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        receiver: mpsc::UnboundedReceiver<Snapshot>,
        commands: mpsc::WeakUnboundedSender<Command>,
    ) -> Self {
        Self {
            id,
            receiver,
            commands,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next snapshot. `None` once the store has shut down.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }

    /// Take the next snapshot if one is already queued.
    pub fn try_recv(&mut self) -> Option<Snapshot> {
        self.receiver.try_recv().ok()
    }

    /// Stop receiving snapshots.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.receiver.close();
        if let Some(commands) = self.commands.upgrade() {
            let _ = commands.send(Command::Unsubscribe { id: self.id });
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Outbound queues of every registered subscriber
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    senders: HashMap<SubscriptionId, mpsc::UnboundedSender<Snapshot>>,
}

impl SubscriberRegistry {
    /// Queue `current` for the new subscriber, then start tracking it
    pub fn register(
        &mut self,
        id: SubscriptionId,
        sender: mpsc::UnboundedSender<Snapshot>,
        current: &Snapshot,
    ) {
        if sender.send(current.clone()).is_err() {
            debug!(subscription_id = %id, "Subscriber gone before registration");
            return;
        }

        self.senders.insert(id, sender);
        debug!(subscription_id = %id, subscribers = self.senders.len(), "Subscriber registered");
    }

    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let removed = self.senders.remove(&id).is_some();
        if removed {
            debug!(subscription_id = %id, subscribers = self.senders.len(), "Subscriber removed");
        }
        removed
    }

    /// Queue a copy of `snapshot` for every subscriber, dropping any whose receiver is gone
    pub fn publish(&mut self, snapshot: &Snapshot) {
        let before = self.senders.len();
        self.senders
            .retain(|_, sender| sender.send(snapshot.clone()).is_ok());

        debug!(
            subscribers = self.senders.len(),
            pruned = before - self.senders.len(),
            "Snapshot published"
        );
    }

    /// Forget subscribers whose receivers were dropped
    pub fn prune(&mut self) {
        self.senders.retain(|_, sender| !sender.is_closed());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }
}
