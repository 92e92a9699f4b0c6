use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::debug;

use super::{
    event_channel, next_tab_id, Storage, StorageError, StorageEvent, StorageSubscription, TabId,
};

struct Area {
    items: RwLock<HashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
}

/// In-process storage area.
///
/// A `MemoryStorage` is one tab's handle onto the area. `open_tab` hands out
/// another handle onto the same items; writes through one handle are seen by
/// every handle, and change events reach every handle but the writer.
/// Cloning keeps the same tab.
#[derive(Clone)]
pub struct MemoryStorage {
    area: Arc<Area>,
    tab: TabId,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            area: Arc::new(Area {
                items: RwLock::new(HashMap::new()),
                events: event_channel(),
            }),
            tab: next_tab_id(),
        }
    }

    /// Open another tab onto the same storage area
    pub fn open_tab(&self) -> Self {
        Self {
            area: Arc::clone(&self.area),
            tab: next_tab_id(),
        }
    }

    pub fn tab_id(&self) -> TabId {
        self.tab
    }

    fn notify(&self, key: &str, old_value: Option<String>, new_value: Option<String>) {
        debug!(key, tab = self.tab, "Storage item changed");
        // No receivers is fine: nobody else is watching this area.
        let _ = self.area.events.send(StorageEvent {
            key: key.to_string(),
            old_value,
            new_value,
            origin: Some(self.tab),
        });
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.area.items.read().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let old_value = {
            let mut items = self.area.items.write().map_err(|_| StorageError::Poisoned)?;
            items.insert(key.to_string(), value.to_string())
        };
        if old_value.as_deref() != Some(value) {
            self.notify(key, old_value, Some(value.to_string()));
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let old_value = {
            let mut items = self.area.items.write().map_err(|_| StorageError::Poisoned)?;
            items.remove(key)
        };
        if old_value.is_some() {
            self.notify(key, old_value, None);
        }
        Ok(())
    }

    fn subscribe(&self) -> StorageSubscription {
        StorageSubscription::new(self.area.events.subscribe(), Some(self.tab))
    }
}
