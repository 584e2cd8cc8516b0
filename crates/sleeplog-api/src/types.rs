//! Record and snapshot value types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sleeplog_util::RecordId;

/// A completed sleep interval
///
/// `id` and `created_at` never change once assigned. The store refreshes
/// `updated_at` on every successful update.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    id: RecordId,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub note: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Record {
    /// Create a record with a fresh id, stamped at `now`
    pub fn new(
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        note: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            start_date,
            end_date,
            note: note.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Time between start and end
    pub fn duration(&self) -> chrono::Duration {
        self.end_date - self.start_date
    }

    /// Whether the record satisfies `end > start`
    pub fn is_valid(&self) -> bool {
        self.end_date > self.start_date
    }

    /// Take the editable content of `edited` while keeping this record's identity.
    ///
    /// `updated_at` never moves backwards, even if the clock does.
    pub fn revised(&self, edited: &Record, now: DateTime<Utc>) -> Record {
        Record {
            id: self.id,
            start_date: edited.start_date,
            end_date: edited.end_date,
            note: edited.note.clone(),
            created_at: self.created_at,
            updated_at: now.max(self.updated_at),
        }
    }
}

/// Whether a sleep session is currently running
///
/// Stored on disk as the nullable `activeSleepStart` timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<DateTime<Utc>>", into = "Option<DateTime<Utc>>")]
pub enum SessionState {
    #[default]
    Idle,
    Active { started_at: DateTime<Utc> },
}

impl SessionState {
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            SessionState::Idle => None,
            SessionState::Active { started_at } => Some(*started_at),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active { .. })
    }
}

impl From<Option<DateTime<Utc>>> for SessionState {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        match value {
            Some(started_at) => SessionState::Active { started_at },
            None => SessionState::Idle,
        }
    }
}

impl From<SessionState> for Option<DateTime<Utc>> {
    fn from(value: SessionState) -> Self {
        value.started_at()
    }
}

/// Full persisted and broadcast state: completed records plus the running session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Sorted by start date, newest first, once normalized
    #[serde(default)]
    pub records: Vec<Record>,

    #[serde(rename = "activeSleepStart", default)]
    pub active: SessionState,
}

impl Snapshot {
    /// Drop records with `end <= start` and sort newest first.
    ///
    /// Returns the ids of the dropped records.
    pub fn normalize(&mut self) -> Vec<RecordId> {
        let (valid, invalid): (Vec<Record>, Vec<Record>) =
            self.records.drain(..).partition(Record::is_valid);

        self.records = valid;
        self.records.sort_by(|a, b| {
            b.start_date
                .cmp(&a.start_date)
                .then_with(|| a.id.cmp(&b.id))
        });

        invalid.iter().map(Record::id).collect()
    }

    /// Whether the snapshot already satisfies the normalization invariants
    pub fn is_normalized(&self) -> bool {
        self.records.iter().all(Record::is_valid)
            && self
                .records
                .windows(2)
                .all(|pair| pair[0].start_date >= pair[1].start_date)
    }

    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }
}

/// Result of ending a sleep session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOutcome {
    /// The running session became this record
    Ended(Record),
    /// No session was running; nothing changed
    NothingActive,
}

/// Result of loading the backing file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No file existed; an empty one was written
    Created,
    /// The file was read; `dropped` lists records rejected by normalization
    Loaded {
        records: usize,
        dropped: Vec<RecordId>,
    },
}
