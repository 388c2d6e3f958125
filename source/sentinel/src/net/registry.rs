//! Registry of live listeners keyed by [`BindSpec`], used both for
//! shared-socket coalescing at construction time and for the SIGHUP reload
//! diff (spec.md §4.7: identical `(bind, port, tls, handler type, relevant
//! config hash)` are left running; changed ones are stopped and recreated).

use std::collections::HashMap;

use super::listener::{BindSpec, ListenerHandle};

/// One entry per live listener: its handle plus the config hash reload
/// diffing compares against.
pub struct RegisteredListener {
    pub handle: ListenerHandle,
    pub config_hash: u64,
}

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: HashMap<BindSpec, RegisteredListener>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, spec: &BindSpec) -> Option<&RegisteredListener> {
        self.listeners.get(spec)
    }

    pub fn insert(&mut self, spec: BindSpec, handle: ListenerHandle, config_hash: u64) {
        self.listeners.insert(spec, RegisteredListener { handle, config_hash });
    }

    pub fn remove(&mut self, spec: &BindSpec) -> Option<RegisteredListener> {
        self.listeners.remove(spec)
    }

    /// Returns true if a listener already bound at `spec` has the same
    /// config hash, meaning it can be left running across a reload.
    pub fn is_unchanged(&self, spec: &BindSpec, config_hash: u64) -> bool {
        self.listeners.get(spec).is_some_and(|l| l.config_hash == config_hash)
    }

    pub fn specs(&self) -> impl Iterator<Item = &BindSpec> {
        self.listeners.keys()
    }

    pub async fn stop_all(self) {
        for (_, entry) in self.listeners {
            entry.handle.stop().await;
        }
    }
}
