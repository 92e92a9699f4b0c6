//! Key/value persistence shared between tabs.
//!
//! This module provides:
//! - `Storage`: the `localStorage`-shaped interface the session store writes through
//! - `MemoryStorage`: an in-process storage area where each handle is one tab
//! - `FileStorage`: a JSON document on disk shared by every process using it
//!
//! Every storage area broadcasts a `StorageEvent` when a key changes. Like the
//! browser `storage` event, a tab never receives the events for its own writes.

pub mod file;
pub mod memory;

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::broadcast;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use tokio::sync::broadcast::error::RecvError;

/// Capacity of the change-event channel of a storage area
const EVENT_BUFFER_SIZE: usize = 64;

/// Identifies the tab that produced a change
pub type TabId = u64;

static NEXT_TAB_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_tab_id() -> TabId {
    NEXT_TAB_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn event_channel() -> broadcast::Sender<StorageEvent> {
    broadcast::channel(EVENT_BUFFER_SIZE).0
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// A change to one key of a storage area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    /// Tab that made the change, `None` when it came from another process
    pub origin: Option<TabId>,
}

/// Receives the change events of a storage area, minus the subscriber's own writes.
pub struct StorageSubscription {
    rx: broadcast::Receiver<StorageEvent>,
    tab: Option<TabId>,
}

impl StorageSubscription {
    pub(crate) fn new(rx: broadcast::Receiver<StorageEvent>, tab: Option<TabId>) -> Self {
        Self { rx, tab }
    }

    /// Wait for the next change made by someone else.
    ///
    /// Returns `RecvError::Lagged` when events were dropped because the
    /// subscriber fell behind, and `RecvError::Closed` once the storage area is gone.
    pub async fn recv(&mut self) -> Result<StorageEvent, RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if self.tab.is_some() && event.origin == self.tab {
                continue;
            }
            return Ok(event);
        }
    }
}

/// Persistent key/value storage with change notification.
///
/// Operations never block on anything but a local lock or a small file, so
/// they are synchronous like their browser counterpart.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Subscribe to changes made by other tabs
    fn subscribe(&self) -> StorageSubscription;
}
