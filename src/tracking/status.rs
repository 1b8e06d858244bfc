//! # Per-item status text and the headline status.
//!
//! Maintains the status string of every in-flight work item and a single
//! "headline" the observer shows as the current progress.
//!
//! ## Rules
//! - An item has an entry **only** between `on_start` and `on_stop`.
//! - `set_status` on an item without an entry is ignored; a worker's last
//!   status update may race with its own completion.
//! - Empty text clears the item's status.
//! - The headline is the text most recently set by any item. When its holder
//!   clears (or stops), the headline falls back to the earliest-admitted
//!   remaining item with non-empty text, or to none.
//! - The fallback scan happens inside the same critical section as the
//!   clear, so readers never observe a removed item's text.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::tracking::{QueueListener, lock};
use crate::work::WorkId;

#[derive(Debug)]
struct Entry {
    name: Arc<str>,
    text: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<WorkId, Entry>,
    headline: Option<(WorkId, String)>,
}

impl State {
    /// Re-selects the headline if `id` held it.
    fn cleared(&mut self, id: WorkId) {
        if !matches!(&self.headline, Some((holder, _)) if *holder == id) {
            return;
        }
        self.headline = self
            .entries
            .iter()
            .find_map(|(k, e)| e.text.as_ref().map(|t| (*k, t.clone())));
    }
}

/// Thread-safe map from in-flight work identity to status text.
#[derive(Debug, Default)]
pub struct StatusRegistry {
    state: Mutex<State>,
}

impl StatusRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (or with `None`/empty text, clears) the status of `id`.
    ///
    /// No-op if `id` is not between start and stop.
    pub fn set_status(&self, id: WorkId, text: Option<String>) {
        let text = text.filter(|t| !t.is_empty());
        let mut state = lock(&self.state);
        let Some(entry) = state.entries.get_mut(&id) else {
            return;
        };
        entry.text = text.clone();
        match text {
            Some(t) => state.headline = Some((id, t)),
            None => state.cleared(id),
        }
    }

    /// Returns the current status text of `id`.
    pub fn get_status(&self, id: WorkId) -> Option<String> {
        lock(&self.state)
            .entries
            .get(&id)
            .and_then(|e| e.text.clone())
    }

    /// Returns the headline status, if any item currently has one.
    pub fn headline(&self) -> Option<String> {
        lock(&self.state).headline.as_ref().map(|(_, t)| t.clone())
    }

    /// Returns the sorted names of items currently between start and stop.
    pub fn snapshot(&self) -> Vec<String> {
        let state = lock(&self.state);
        let mut names: Vec<String> = state.entries.values().map(|e| e.name.to_string()).collect();
        names.sort_unstable();
        names
    }

    /// Number of in-flight items.
    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    /// Returns `true` if no item is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl QueueListener for StatusRegistry {
    fn on_start(&self, id: WorkId, name: &str) {
        lock(&self.state).entries.insert(
            id,
            Entry {
                name: name.into(),
                text: None,
            },
        );
    }

    fn on_stop(&self, id: WorkId, _name: &str) {
        let mut state = lock(&self.state);
        state.entries.remove(&id);
        state.cleared(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> WorkId {
        WorkId::from_raw(n)
    }

    #[test]
    fn status_requires_an_entry() {
        let reg = StatusRegistry::new();
        reg.set_status(id(1), Some("early".into()));
        assert_eq!(reg.get_status(id(1)), None);
        assert_eq!(reg.headline(), None);

        reg.on_start(id(1), "scan");
        reg.set_status(id(1), Some("scanning".into()));
        assert_eq!(reg.get_status(id(1)).as_deref(), Some("scanning"));

        reg.on_stop(id(1), "scan");
        reg.set_status(id(1), Some("late".into()));
        assert_eq!(reg.get_status(id(1)), None);
        assert_eq!(reg.headline(), None);
        assert!(reg.is_empty());
    }

    #[test]
    fn headline_follows_most_recent_setter() {
        let reg = StatusRegistry::new();
        reg.on_start(id(1), "a");
        reg.on_start(id(2), "b");

        reg.set_status(id(1), Some("a1".into()));
        reg.set_status(id(2), Some("b1".into()));
        assert_eq!(reg.headline().as_deref(), Some("b1"));

        reg.set_status(id(1), Some("a2".into()));
        assert_eq!(reg.headline().as_deref(), Some("a2"));
    }

    #[test]
    fn clearing_holder_falls_back_to_remaining_text() {
        let reg = StatusRegistry::new();
        reg.on_start(id(1), "a");
        reg.on_start(id(2), "b");
        reg.set_status(id(1), Some("a1".into()));
        reg.set_status(id(2), Some("b1".into()));

        reg.set_status(id(2), Some(String::new()));
        assert_eq!(reg.headline().as_deref(), Some("a1"));

        reg.on_stop(id(1), "a");
        assert_eq!(reg.headline(), None);
    }

    #[test]
    fn clearing_non_holder_keeps_headline() {
        let reg = StatusRegistry::new();
        reg.on_start(id(1), "a");
        reg.on_start(id(2), "b");
        reg.set_status(id(1), Some("a1".into()));
        reg.set_status(id(2), Some("b1".into()));

        reg.set_status(id(1), None);
        assert_eq!(reg.headline().as_deref(), Some("b1"));
    }

    #[test]
    fn stop_of_holder_skips_items_without_text() {
        let reg = StatusRegistry::new();
        reg.on_start(id(1), "quiet");
        reg.on_start(id(2), "b");
        reg.on_start(id(3), "c");
        reg.set_status(id(3), Some("c1".into()));
        reg.set_status(id(2), Some("b1".into()));

        reg.on_stop(id(2), "b");
        assert_eq!(reg.headline().as_deref(), Some("c1"));
        assert_eq!(reg.snapshot(), vec!["c".to_string(), "quiet".to_string()]);
    }
}
