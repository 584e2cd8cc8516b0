//! The sleep store: one task owns the snapshot, everyone else sends it commands
//!
//! Every mutation is a `Command` on an unbounded queue drained by a single
//! spawned task, so mutations run one at a time in submission order. The
//! task validates, persists, and only then swaps the new snapshot into the
//! read cell and publishes it. A caller dropping its future does not cancel a
//! command that was already queued.

use chrono::{DateTime, Utc};
use sleeplog_api::{EndOutcome, LoadOutcome, Record, SessionState, Snapshot};
use sleeplog_util::{RecordId, SubscriptionId};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::persist;
use crate::subscription::{SubscriberRegistry, Subscription};
use crate::{StoragePathProvider, StoreError, StoreResult};

type Reply<T> = oneshot::Sender<StoreResult<T>>;

pub(crate) enum Command {
    Load {
        reply: Reply<LoadOutcome>,
    },
    Subscribe {
        id: SubscriptionId,
        sender: mpsc::UnboundedSender<Snapshot>,
    },
    Unsubscribe {
        id: SubscriptionId,
    },
    SubscriberCount {
        reply: Reply<usize>,
    },
    StartSleep {
        at: DateTime<Utc>,
        reply: Reply<()>,
    },
    EndSleep {
        at: DateTime<Utc>,
        reply: Reply<EndOutcome>,
    },
    CreateRecord {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        note: String,
        reply: Reply<Record>,
    },
    UpdateRecord {
        record: Record,
        reply: Reply<Record>,
    },
    DeleteRecord {
        id: RecordId,
        reply: Reply<bool>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Handle to the sleep store
///
/// Cheap to clone; all clones talk to the same store task. The task stops
/// after `shutdown` or once every handle is dropped.
#[derive(Clone)]
pub struct SleepStore {
    commands: mpsc::UnboundedSender<Command>,
    current: watch::Receiver<Snapshot>,
}

impl SleepStore {
    /// Spawn a store with an empty snapshot onto the current Tokio runtime.
    ///
    /// Nothing touches the disk until `load_from_disk` or the first mutation.
    pub fn spawn(provider: Arc<dyn StoragePathProvider>, file_name: impl Into<String>) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (current_tx, current) = watch::channel(Snapshot::default());

        let task = StoreTask {
            provider,
            file_name: file_name.into(),
            snapshot: Snapshot::default(),
            subscribers: SubscriberRegistry::default(),
            current: current_tx,
        };
        tokio::spawn(task.run(receiver));

        Self { commands, current }
    }

    /// Replace the in-memory snapshot with the file's contents.
    ///
    /// A missing file is written out from the current (normally empty)
    /// snapshot. An unreadable or undecodable file leaves memory untouched.
    pub async fn load_from_disk(&self) -> StoreResult<LoadOutcome> {
        self.request(|reply| Command::Load { reply }).await
    }

    /// The latest committed snapshot. Never waits on disk I/O.
    pub fn snapshot(&self) -> Snapshot {
        self.current.borrow().clone()
    }

    pub fn record_by_id(&self, id: RecordId) -> Option<Record> {
        self.current.borrow().record(id).cloned()
    }

    /// Start receiving snapshots: the current one first, then one per commit.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriptionId::new();
        let (sender, receiver) = mpsc::unbounded_channel();

        // If the task is gone the sender is dropped and the subscription just ends
        let _ = self.commands.send(Command::Subscribe { id, sender });

        Subscription::new(id, receiver, self.commands.downgrade())
    }

    /// Number of live subscriptions, after discarding abandoned ones
    pub async fn subscriber_count(&self) -> StoreResult<usize> {
        self.request(|reply| Command::SubscriberCount { reply }).await
    }

    /// Begin a sleep session at `at`.
    pub async fn start_sleep(&self, at: DateTime<Utc>) -> StoreResult<()> {
        self.request(|reply| Command::StartSleep { at, reply }).await
    }

    /// End the running session at `at`, turning it into a record.
    pub async fn end_sleep(&self, at: DateTime<Utc>) -> StoreResult<EndOutcome> {
        self.request(|reply| Command::EndSleep { at, reply }).await
    }

    pub async fn create_record(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        note: impl Into<String>,
    ) -> StoreResult<Record> {
        let note = note.into();
        self.request(|reply| Command::CreateRecord {
            start,
            end,
            note,
            reply,
        })
        .await
    }

    /// Replace start, end and note of the stored record with the same id.
    ///
    /// Returns the stored result, with `updated_at` refreshed.
    pub async fn update_record(&self, record: Record) -> StoreResult<Record> {
        self.request(|reply| Command::UpdateRecord { record, reply })
            .await
    }

    /// Remove a record. Returns whether anything was removed.
    ///
    /// An unknown id leaves the file untouched and sends subscribers nothing.
    pub async fn delete_record(&self, id: RecordId) -> StoreResult<bool> {
        self.request(|reply| Command::DeleteRecord { id, reply }).await
    }

    /// Stop the store task once every earlier command has run.
    pub async fn shutdown(&self) -> StoreResult<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> StoreResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| StoreError::Closed)?;
        response.await.map_err(|_| StoreError::Closed)?
    }
}

struct StoreTask {
    provider: Arc<dyn StoragePathProvider>,
    file_name: String,
    snapshot: Snapshot,
    subscribers: SubscriberRegistry,
    current: watch::Sender<Snapshot>,
}

impl StoreTask {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        debug!(file_name = %self.file_name, "Store task started");

        while let Some(command) = commands.recv().await {
            match command {
                Command::Load { reply } => {
                    let _ = reply.send(self.load().await);
                }
                Command::Subscribe { id, sender } => {
                    self.subscribers.register(id, sender, &self.snapshot);
                }
                Command::Unsubscribe { id } => {
                    self.subscribers.remove(id);
                }
                Command::SubscriberCount { reply } => {
                    self.subscribers.prune();
                    let _ = reply.send(Ok(self.subscribers.len()));
                }
                Command::StartSleep { at, reply } => {
                    let _ = reply.send(self.start_sleep(at).await);
                }
                Command::EndSleep { at, reply } => {
                    let _ = reply.send(self.end_sleep(at).await);
                }
                Command::CreateRecord {
                    start,
                    end,
                    note,
                    reply,
                } => {
                    let _ = reply.send(self.create_record(start, end, note).await);
                }
                Command::UpdateRecord { record, reply } => {
                    let _ = reply.send(self.update_record(record).await);
                }
                Command::DeleteRecord { id, reply } => {
                    let _ = reply.send(self.delete_record(id).await);
                }
                Command::Shutdown { reply } => {
                    info!("Store shutting down");
                    let _ = reply.send(Ok(()));
                    break;
                }
            }
        }

        debug!("Store task stopped");
    }

    fn storage_path(&self) -> StoreResult<PathBuf> {
        Ok(self.provider.storage_path(&self.file_name)?)
    }

    async fn load(&mut self) -> StoreResult<LoadOutcome> {
        let path = self.storage_path()?;

        let Some(mut loaded) = persist::read_snapshot(&path).await? else {
            info!(path = %path.display(), "No snapshot file, writing initial state");
            self.commit(self.snapshot.clone()).await?;
            return Ok(LoadOutcome::Created);
        };

        let dropped = loaded.normalize();
        if !dropped.is_empty() {
            warn!(
                path = %path.display(),
                dropped = dropped.len(),
                ids = ?dropped,
                "Ignoring records whose end is not after their start"
            );
        }

        let records = loaded.records.len();
        info!(
            path = %path.display(),
            records,
            active = loaded.active.is_active(),
            "Snapshot loaded"
        );

        // The file already holds this state, so nothing is rewritten here
        self.apply(loaded);
        Ok(LoadOutcome::Loaded { records, dropped })
    }

    async fn start_sleep(&mut self, at: DateTime<Utc>) -> StoreResult<()> {
        if let SessionState::Active { started_at } = self.snapshot.active {
            return Err(StoreError::SessionAlreadyActive { started_at });
        }

        let mut next = self.snapshot.clone();
        next.active = SessionState::Active { started_at: at };
        self.commit(next).await?;

        info!(started_at = %at, "Sleep session started");
        Ok(())
    }

    async fn end_sleep(&mut self, at: DateTime<Utc>) -> StoreResult<EndOutcome> {
        let SessionState::Active { started_at } = self.snapshot.active else {
            debug!("No active sleep session to end");
            return Ok(EndOutcome::NothingActive);
        };
        check_range(started_at, at)?;

        let record = Record::new(started_at, at, "", sleeplog_util::now());
        let mut next = self.snapshot.clone();
        next.active = SessionState::Idle;
        next.records.push(record.clone());
        self.commit(next).await?;

        info!(record_id = %record.id(), started_at = %started_at, ended_at = %at, "Sleep session ended");
        Ok(EndOutcome::Ended(record))
    }

    async fn create_record(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        note: String,
    ) -> StoreResult<Record> {
        check_range(start, end)?;

        let record = Record::new(start, end, note, sleeplog_util::now());
        let mut next = self.snapshot.clone();
        next.records.push(record.clone());
        self.commit(next).await?;

        info!(record_id = %record.id(), "Record created");
        Ok(record)
    }

    async fn update_record(&mut self, edited: Record) -> StoreResult<Record> {
        check_range(edited.start_date, edited.end_date)?;

        let id = edited.id();
        let Some(index) = self.snapshot.records.iter().position(|r| r.id() == id) else {
            return Err(StoreError::RecordNotFound(id));
        };

        let mut next = self.snapshot.clone();
        let revised = next.records[index].revised(&edited, sleeplog_util::now());
        next.records[index] = revised.clone();
        self.commit(next).await?;

        info!(record_id = %id, "Record updated");
        Ok(revised)
    }

    async fn delete_record(&mut self, id: RecordId) -> StoreResult<bool> {
        if self.snapshot.record(id).is_none() {
            debug!(record_id = %id, "Delete of unknown record ignored");
            return Ok(false);
        }

        let mut next = self.snapshot.clone();
        next.records.retain(|r| r.id() != id);
        self.commit(next).await?;

        info!(record_id = %id, "Record deleted");
        Ok(true)
    }

    /// Normalize, persist, then make `next` current. On error nothing changes.
    async fn commit(&mut self, mut next: Snapshot) -> StoreResult<()> {
        let dropped = next.normalize();
        if !dropped.is_empty() {
            warn!(ids = ?dropped, "Dropped invalid records during commit");
        }

        let path = self.storage_path()?;
        if let Err(e) = persist::write_snapshot(&path, &next).await {
            warn!(path = %path.display(), error = %e, "Failed to persist snapshot");
            return Err(e.into());
        }

        self.apply(next);
        Ok(())
    }

    fn apply(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
        self.current.send_replace(self.snapshot.clone());
        self.subscribers.publish(&self.snapshot);
    }
}

fn check_range(start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<()> {
    if end > start {
        Ok(())
    } else {
        Err(StoreError::InvalidRange { start, end })
    }
}
