//! The published record snapshot and the controller that rebuilds it from the source.

use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::entities::record::Record;
use crate::error::PipelineError;
use crate::sources::DocumentSource;
use crate::transform;

/// An immutable, datetime-descending set of records.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    records: Vec<Record>,
    refreshed_at: Option<OffsetDateTime>,
}

impl Snapshot {
    /// Sorts `records` by `datetime` descending (plain string order, stable) and stamps
    /// the snapshot with the current time.
    pub fn from_records(mut records: Vec<Record>) -> Self {
        records.sort_by(|a, b| b.datetime.cmp(&a.datetime));
        Self {
            records,
            refreshed_at: Some(OffsetDateTime::now_utc()),
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `None` until a refresh has published this snapshot.
    pub fn refreshed_at(&self) -> Option<OffsetDateTime> {
        self.refreshed_at
    }
}

/// Holds the current snapshot. Publication swaps one `Arc`, so readers see either the
/// old or the new snapshot in full.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        snapshot
    }
}

/// What a refresh does with the published snapshot when the source cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchFailurePolicy {
    #[default]
    KeepLastGood,
    Clear,
}

impl FromStr for FetchFailurePolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" | "keep-last-good" => Ok(Self::KeepLastGood),
            "clear" | "empty" => Ok(Self::Clear),
            other => Err(PipelineError::InvalidArgument(format!(
                "unknown fetch failure policy '{other}' (expected 'keep' or 'clear')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Records in the snapshot published (or kept) by this refresh.
    pub count: usize,
    /// Documents returned by the source, soft-deleted ones included.
    pub fetched: usize,
    pub failed: bool,
}

#[derive(Clone)]
pub struct Refresher {
    source: Arc<dyn DocumentSource>,
    store: Arc<SnapshotStore>,
    policy: FetchFailurePolicy,
    gate: Arc<Mutex<()>>,
}

impl Refresher {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        store: Arc<SnapshotStore>,
        policy: FetchFailurePolicy,
    ) -> Self {
        Self {
            source,
            store,
            policy,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Rebuilds and publishes the snapshot. Never fails: source errors are logged and
    /// handled according to the configured [`FetchFailurePolicy`].
    pub async fn refresh(&self) -> RefreshOutcome {
        let _gate = self.gate.lock().await;
        let started = Instant::now();

        match self.source.list_documents().await {
            Ok(docs) => {
                let fetched = docs.len();
                let records = transform::record::normalize_all(&docs);
                let snapshot = self.store.publish(Snapshot::from_records(records));
                info!(
                    source = self.source.name(),
                    fetched,
                    count = snapshot.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Loaded records"
                );
                RefreshOutcome {
                    count: snapshot.len(),
                    fetched,
                    failed: false,
                }
            }
            Err(err) => {
                error!(
                    source = self.source.name(),
                    policy = ?self.policy,
                    "Error fetching documents: {err}"
                );
                let snapshot = match self.policy {
                    FetchFailurePolicy::KeepLastGood => self.store.current(),
                    FetchFailurePolicy::Clear => {
                        self.store.publish(Snapshot::from_records(Vec::new()))
                    }
                };
                RefreshOutcome {
                    count: snapshot.len(),
                    fetched: 0,
                    failed: true,
                }
            }
        }
    }

    /// Starts the startup load without waiting for it.
    pub fn spawn_initial_load(&self) -> JoinHandle<RefreshOutcome> {
        let refresher = self.clone();
        tokio::spawn(async move {
            info!("Starting background data load");
            let outcome = refresher.refresh().await;
            info!(count = outcome.count, "Background load complete");
            outcome
        })
    }
}
