//! Occupancy status table
//!
//! In-memory map from pod name to its self-reported status. The ingestion
//! endpoint writes through [`StatusTable::update`]; the watcher reads
//! [`StatusTable::snapshot`] and wakes up on [`StatusChanges`].

use crate::models::PodStatus;
use crate::report::UsageReport;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

/// Receiving side of the change notification.
///
/// Each pulse only means "the table changed"; consumers re-read the table.
pub type StatusChanges = mpsc::UnboundedReceiver<()>;

/// Shared occupancy table. Clones share the same underlying map.
#[derive(Debug, Clone)]
pub struct StatusTable {
    statuses: Arc<RwLock<HashMap<String, PodStatus>>>,
    change_tx: mpsc::UnboundedSender<()>,
}

impl StatusTable {
    /// Create a table with every given pod marked ready
    pub fn new<I, S>(pods: I) -> (Self, StatusChanges)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let statuses = pods
            .into_iter()
            .map(|name| (name.into(), PodStatus::Ready))
            .collect();
        let (change_tx, change_rx) = mpsc::unbounded_channel();

        let table = Self {
            statuses: Arc::new(RwLock::new(statuses)),
            change_tx,
        };

        (table, change_rx)
    }

    /// Apply a status push and notify observers.
    ///
    /// `Terminated` removes the entry. The notification is sent after the
    /// write lock is released so the next snapshot sees the mutation.
    pub async fn update(&self, name: &str, status: PodStatus) {
        info!(pod = %name, status = %status, "Updating pod status");

        {
            let mut statuses = self.statuses.write().await;
            match status {
                PodStatus::Terminated => {
                    statuses.remove(name);
                }
                status => {
                    statuses.insert(name.to_string(), status);
                }
            }
        }

        if self.change_tx.send(()).is_err() {
            debug!("No status change listener");
        }
    }

    /// Start tracking a pod the controller just created, as ready. Does not notify.
    pub async fn track(&self, name: &str) {
        self.statuses
            .write()
            .await
            .insert(name.to_string(), PodStatus::Ready);
    }

    /// Drop a pod the controller deleted or saw deleted. Does not notify.
    pub async fn forget(&self, name: &str) -> Option<PodStatus> {
        self.statuses.write().await.remove(name)
    }

    /// Current status of a single pod
    pub async fn get(&self, name: &str) -> Option<PodStatus> {
        self.statuses.read().await.get(name).copied()
    }

    /// Count ready and occupied pods
    pub async fn snapshot(&self) -> UsageReport {
        let statuses = self.statuses.read().await;
        let mut report = UsageReport::default();

        for status in statuses.values() {
            match status {
                PodStatus::Ready => report.ready_pods += 1,
                PodStatus::Occupied => report.occupied_pods += 1,
                PodStatus::Terminated => {}
            }
        }

        report
    }

    pub async fn len(&self) -> usize {
        self.statuses.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.statuses.read().await.is_empty()
    }
}
