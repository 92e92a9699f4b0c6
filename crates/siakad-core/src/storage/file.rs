use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{
    event_channel, next_tab_id, Storage, StorageError, StorageEvent, StorageSubscription, TabId,
};

/// Storage file name in the storage directory
const STORAGE_FILE: &str = "storage.json";

/// Default interval between checks for writes by other processes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Shortest interval the watcher polls at; zero would make the ticker panic
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

type Document = BTreeMap<String, String>;

struct Shared {
    path: PathBuf,
    /// Distinguishes this handle's temp files from other handles in the process
    handle: TabId,
    /// Document as this process last saw it. Guards every read-modify-write.
    snapshot: Mutex<Document>,
    events: broadcast::Sender<StorageEvent>,
}

impl Shared {
    fn read_document(&self) -> Result<Document, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(Document::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the document, treating a malformed file as empty.
    fn read_document_lenient(&self) -> Result<Document, StorageError> {
        match self.read_document() {
            Err(StorageError::Malformed(e)) => {
                warn!(path = ?self.path, error = %e, "Storage document is malformed, treating as empty");
                Ok(Document::new())
            }
            other => other,
        }
    }

    /// Replace the whole document: write a sibling temp file, then rename over.
    fn write_document(&self, document: &Document) -> Result<(), StorageError> {
        let contents = serde_json::to_string_pretty(document)?;
        let tmp = self
            .path
            .with_extension(format!("json.{}-{}.tmp", std::process::id(), self.handle));
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn publish(&self, events: Vec<StorageEvent>) {
        for event in events {
            debug!(key = %event.key, "Storage item changed by another process");
            let _ = self.events.send(event);
        }
    }

    /// Apply `change` to the current on-disk document and persist it.
    ///
    /// Changes other processes made since the last look are published first,
    /// so the watcher never loses them when this write moves the snapshot on.
    fn modify(&self, change: impl FnOnce(&mut Document) -> bool) -> Result<(), StorageError> {
        let mut snapshot = self.snapshot.lock().map_err(|_| StorageError::Poisoned)?;
        let mut document = self.read_document_lenient()?;
        self.publish(diff(&snapshot, &document));

        if change(&mut document) {
            self.write_document(&document)?;
        }
        *snapshot = document;
        Ok(())
    }

    fn poll(&self) -> Result<(), StorageError> {
        let mut snapshot = self.snapshot.lock().map_err(|_| StorageError::Poisoned)?;
        let document = self.read_document_lenient()?;
        self.publish(diff(&snapshot, &document));
        *snapshot = document;
        Ok(())
    }
}

/// Events turning `old` into `new`, ordered by key
fn diff(old: &Document, new: &Document) -> Vec<StorageEvent> {
    let mut events = Vec::new();
    for (key, old_value) in old {
        match new.get(key) {
            Some(new_value) if new_value == old_value => {}
            new_value => events.push(StorageEvent {
                key: key.clone(),
                old_value: Some(old_value.clone()),
                new_value: new_value.cloned(),
                origin: None,
            }),
        }
    }
    for (key, new_value) in new {
        if !old.contains_key(key) {
            events.push(StorageEvent {
                key: key.clone(),
                old_value: None,
                new_value: Some(new_value.clone()),
                origin: None,
            });
        }
    }
    events.sort_by(|a, b| a.key.cmp(&b.key));
    events
}

/// Storage backed by a JSON document in a directory.
///
/// Every process opening the same directory shares the items, which makes each
/// process a tab. Writes by other processes are picked up by a polling watcher
/// that starts with the first `subscribe` and stops when the storage is dropped.
pub struct FileStorage {
    shared: Arc<Shared>,
    poll_interval: Duration,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl FileStorage {
    /// Open (or create) the storage in `dir`. `poll_interval` is raised to
    /// `MIN_POLL_INTERVAL` if shorter.
    pub fn open(dir: impl AsRef<Path>, poll_interval: Duration) -> Result<Self, StorageError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let shared = Shared {
            path: dir.join(STORAGE_FILE),
            handle: next_tab_id(),
            snapshot: Mutex::new(Document::new()),
            events: event_channel(),
        };
        let initial = shared.read_document_lenient()?;
        *shared.snapshot.lock().map_err(|_| StorageError::Poisoned)? = initial;
        debug!(path = ?shared.path, "File storage opened");

        Ok(Self {
            shared: Arc::new(shared),
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            watcher: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    fn ensure_watcher(&self) {
        let Ok(mut watcher) = self.watcher.lock() else {
            warn!("Storage watcher lock poisoned, cross-process changes will not be seen");
            return;
        };
        if watcher.is_some() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, cross-process changes will not be seen");
            return;
        };

        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        let poll_interval = self.poll_interval;
        *watcher = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                if let Err(e) = shared.poll() {
                    warn!(error = %e, "Failed to check storage for changes");
                }
            }
        }));
    }
}

impl Drop for FileStorage {
    fn drop(&mut self) {
        if let Ok(mut watcher) = self.watcher.lock() {
            if let Some(handle) = watcher.take() {
                handle.abort();
            }
        }
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut document = self.shared.read_document_lenient()?;
        Ok(document.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.shared.modify(|document| {
            if document.get(key).map(String::as_str) == Some(value) {
                return false;
            }
            document.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.shared
            .modify(|document| document.remove(key).is_some())
    }

    fn subscribe(&self) -> StorageSubscription {
        let rx = self.shared.events.subscribe();
        self.ensure_watcher();
        StorageSubscription::new(rx, None)
    }
}
