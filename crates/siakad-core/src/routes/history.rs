use tracing::debug;

use super::Location;

/// How a navigation is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Overwrite the current entry instead of pushing a new one
    pub replace: bool,
    /// Location the user originally asked for, carried to the target
    pub from: Option<Location>,
}

/// Something that can move the user to another location.
pub trait Navigator {
    fn navigate(&mut self, to: &Location, options: NavigateOptions);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub location: Location,
    pub from: Option<Location>,
}

/// In-memory browsing history with push/replace semantics.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<HistoryEntry>,
    index: usize,
}

impl History {
    pub fn new(start: Location) -> Self {
        Self {
            entries: vec![HistoryEntry {
                location: start,
                from: None,
            }],
            index: 0,
        }
    }

    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.index]
    }

    /// Entries up to and including the current one
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries[..=self.index]
    }

    /// Number of entries behind and including the current one
    pub fn depth(&self) -> usize {
        self.index + 1
    }

    pub fn push(&mut self, location: Location) {
        self.navigate(&location, NavigateOptions::default());
    }

    pub fn back(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }

    pub fn forward(&mut self) -> bool {
        if self.index + 1 >= self.entries.len() {
            return false;
        }
        self.index += 1;
        true
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(Location::parse("/"))
    }
}

impl Navigator for History {
    fn navigate(&mut self, to: &Location, options: NavigateOptions) {
        debug!(to = %to, replace = options.replace, "Navigating");
        let entry = HistoryEntry {
            location: to.clone(),
            from: options.from,
        };
        if options.replace {
            self.entries[self.index] = entry;
        } else {
            self.entries.truncate(self.index + 1);
            self.entries.push(entry);
            self.index += 1;
        }
    }
}
