// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-key instance lifecycle tracking.
//!
//! Runs on the reader side of a transport and turns the raw stream of writes,
//! disposes and writer departures into instance states:
//!
//! ```text
//!   (unseen)   --data-->          ALIVE
//!   ALIVE      --dispose-->       NOT_ALIVE_DISPOSED
//!   ALIVE      --writers gone-->  NOT_ALIVE_NO_WRITERS
//!   NOT_ALIVE_* --data-->         ALIVE
//! ```

use crate::model::{InstanceHandle, InstanceState};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Identifier of a remote writer, unique per bus/domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WriterId(pub u64);

impl fmt::Display for WriterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug)]
struct InstanceEntry {
    key: String,
    state: InstanceState,
    writers: HashSet<WriterId>,
}

/// Instance table of one reader.
#[derive(Debug, Default)]
pub struct InstanceTracker {
    by_key: HashMap<String, InstanceHandle>,
    instances: HashMap<InstanceHandle, InstanceEntry>,
    next_handle: u64,
}

impl InstanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record data for `key` from `writer`.
    ///
    /// Creates the instance on first sight and resurrects not-alive instances.
    pub fn on_data(&mut self, key: &str, writer: WriterId) -> InstanceHandle {
        let handle = match self.by_key.get(key) {
            Some(handle) => *handle,
            None => {
                self.next_handle += 1;
                let handle = InstanceHandle(self.next_handle);
                self.by_key.insert(key.to_string(), handle);
                self.instances.insert(
                    handle,
                    InstanceEntry {
                        key: key.to_string(),
                        state: InstanceState::Alive,
                        writers: HashSet::new(),
                    },
                );
                tracing::debug!(key, %handle, "new instance");
                handle
            }
        };

        if let Some(entry) = self.instances.get_mut(&handle) {
            if !entry.state.is_alive() {
                tracing::debug!(key, %handle, from = %entry.state, "instance back to ALIVE");
            }
            entry.state = InstanceState::Alive;
            entry.writers.insert(writer);
        }
        handle
    }

    /// Record an explicit dispose of `key` by `writer`.
    ///
    /// Returns the transition, or `None` when the key is unknown or the instance
    /// is already disposed.
    pub fn on_dispose(
        &mut self,
        key: &str,
        writer: WriterId,
    ) -> Option<(InstanceHandle, InstanceState)> {
        let handle = *self.by_key.get(key)?;
        let entry = self.instances.get_mut(&handle)?;
        entry.writers.remove(&writer);
        if entry.state == InstanceState::NotAliveDisposed {
            return None;
        }
        entry.state = InstanceState::NotAliveDisposed;
        Some((handle, entry.state))
    }

    /// Forget `writer` everywhere.
    ///
    /// Returns the alive instances it leaves without any writer; they are now
    /// `NOT_ALIVE_NO_WRITERS`.
    pub fn on_writer_lost(&mut self, writer: WriterId) -> Vec<(InstanceHandle, InstanceState)> {
        let mut transitions = Vec::new();
        for (handle, entry) in &mut self.instances {
            if !entry.writers.remove(&writer) {
                continue;
            }
            if entry.writers.is_empty() && entry.state.is_alive() {
                entry.state = InstanceState::NotAliveNoWriters;
                transitions.push((*handle, entry.state));
            }
        }
        transitions.sort_by_key(|(handle, _)| *handle);
        transitions
    }

    /// Key of the instance behind `handle`.
    pub fn key_value(&self, handle: InstanceHandle) -> Option<&str> {
        self.instances.get(&handle).map(|entry| entry.key.as_str())
    }

    pub fn lookup(&self, key: &str) -> Option<InstanceHandle> {
        self.by_key.get(key).copied()
    }

    pub fn state(&self, handle: InstanceHandle) -> Option<InstanceState> {
        self.instances.get(&handle).map(|entry| entry.state)
    }

    /// Number of instances ever observed.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Writer-side table of registered instances.
#[derive(Debug, Default)]
pub(crate) struct WriterRegistry {
    by_key: HashMap<String, InstanceHandle>,
    next_handle: u64,
}

impl WriterRegistry {
    /// Handle for `key`, allocating one on first registration.
    pub(crate) fn register(&mut self, key: &str) -> InstanceHandle {
        if let Some(handle) = self.by_key.get(key) {
            return *handle;
        }
        self.next_handle += 1;
        let handle = InstanceHandle(self.next_handle);
        self.by_key.insert(key.to_string(), handle);
        handle
    }

    pub(crate) fn key_of(&self, handle: InstanceHandle) -> Option<String> {
        self.by_key
            .iter()
            .find(|(_, h)| **h == handle)
            .map(|(key, _)| key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W1: WriterId = WriterId(1);
    const W2: WriterId = WriterId(2);

    #[test]
    fn test_first_data_creates_alive_instance() {
        let mut tracker = InstanceTracker::new();
        let handle = tracker.on_data("RED", W1);

        assert!(!handle.is_nil());
        assert_eq!(tracker.state(handle), Some(InstanceState::Alive));
        assert_eq!(tracker.key_value(handle), Some("RED"));
        assert_eq!(tracker.on_data("RED", W1), handle);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_dispose_transition() {
        let mut tracker = InstanceTracker::new();
        let handle = tracker.on_data("RED", W1);

        assert_eq!(
            tracker.on_dispose("RED", W1),
            Some((handle, InstanceState::NotAliveDisposed))
        );
        // Second dispose is not a transition.
        assert_eq!(tracker.on_dispose("RED", W1), None);
        assert_eq!(tracker.on_dispose("BLUE", W1), None);
    }

    #[test]
    fn test_writer_lost_only_when_last_writer_leaves() {
        let mut tracker = InstanceTracker::new();
        let handle = tracker.on_data("RED", W1);
        tracker.on_data("RED", W2);

        assert!(tracker.on_writer_lost(W1).is_empty());
        assert_eq!(tracker.state(handle), Some(InstanceState::Alive));

        assert_eq!(
            tracker.on_writer_lost(W2),
            vec![(handle, InstanceState::NotAliveNoWriters)]
        );
    }

    #[test]
    fn test_disposed_instance_not_reported_as_no_writers() {
        let mut tracker = InstanceTracker::new();
        let handle = tracker.on_data("RED", W1);
        tracker.on_dispose("RED", W1);

        assert!(tracker.on_writer_lost(W1).is_empty());
        assert_eq!(tracker.state(handle), Some(InstanceState::NotAliveDisposed));
    }

    #[test]
    fn test_resurrection_keeps_handle() {
        let mut tracker = InstanceTracker::new();
        let handle = tracker.on_data("RED", W1);
        tracker.on_writer_lost(W1);
        assert_eq!(tracker.state(handle), Some(InstanceState::NotAliveNoWriters));

        assert_eq!(tracker.on_data("RED", W2), handle);
        assert_eq!(tracker.state(handle), Some(InstanceState::Alive));

        tracker.on_dispose("RED", W2);
        tracker.on_data("RED", W1);
        assert_eq!(tracker.state(handle), Some(InstanceState::Alive));
    }

    #[test]
    fn test_writer_registry_reuses_handles() {
        let mut registry = WriterRegistry::default();
        let red = registry.register("RED");
        assert_eq!(registry.register("RED"), red);
        assert_ne!(registry.register("BLUE"), red);
        assert_eq!(registry.key_of(red).as_deref(), Some("RED"));
        assert_eq!(registry.key_of(InstanceHandle(42)), None);
    }

    #[test]
    fn test_writer_lost_covers_every_instance() {
        let mut tracker = InstanceTracker::new();
        let red = tracker.on_data("RED", W1);
        let blue = tracker.on_data("BLUE", W1);
        tracker.on_data("GREEN", W2);

        let lost = tracker.on_writer_lost(W1);
        assert_eq!(
            lost,
            vec![
                (red, InstanceState::NotAliveNoWriters),
                (blue, InstanceState::NotAliveNoWriters)
            ]
        );
        assert_eq!(
            tracker.lookup("GREEN").and_then(|h| tracker.state(h)),
            Some(InstanceState::Alive)
        );
    }
}
