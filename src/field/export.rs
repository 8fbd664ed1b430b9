// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Exports and Persistent State

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use super::trace::CallKey;

/// Outcome of reading a typed value at a call-site key.
#[derive(Debug, PartialEq)]
pub enum Lookup<'a, T> {
    Found(&'a T),
    Missing,
    /// A value exists at the key but with a different type.
    Mismatch,
}

impl<'a, T> Lookup<'a, T> {
    pub fn found(self) -> Option<&'a T> {
        match self {
            Lookup::Found(v) => Some(v),
            _ => None,
        }
    }
}

// ─── Export ─────────────────────────────────────────────────────────────────

/// Values a node published during one round, keyed by call site.
/// Immutable once the round ends; shared with neighbours through an `Arc`.
#[derive(Default)]
pub struct Export {
    values: HashMap<CallKey, Arc<dyn Any + Send + Sync>>,
}

impl Export {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Send + Sync + 'static>(&mut self, key: CallKey, value: T) {
        self.values.insert(key, Arc::new(value));
    }

    pub fn lookup<T: 'static>(&self, key: CallKey) -> Lookup<'_, T> {
        match self.values.get(&key) {
            None => Lookup::Missing,
            Some(slot) => match slot.downcast_ref::<T>() {
                Some(v) => Lookup::Found(v),
                None => Lookup::Mismatch,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for Export {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Export").field("slots", &self.values.len()).finish()
    }
}

// ─── StateMap ───────────────────────────────────────────────────────────────

/// Values persisted by `old`/`constant` from one round to the next.
#[derive(Default)]
pub struct StateMap {
    values: HashMap<CallKey, Box<dyn Any + Send + Sync>>,
}

impl StateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Send + Sync + 'static>(&mut self, key: CallKey, value: T) {
        self.values.insert(key, Box::new(value));
    }

    pub fn lookup<T: 'static>(&self, key: CallKey) -> Lookup<'_, T> {
        match self.values.get(&key) {
            None => Lookup::Missing,
            Some(slot) => match slot.downcast_ref::<T>() {
                Some(v) => Lookup::Found(v),
                None => Lookup::Mismatch,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for StateMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMap").field("slots", &self.values.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup_detects_mismatch() {
        let mut e = Export::new();
        e.insert(7, 1.5_f64);
        assert_eq!(e.lookup::<f64>(7), Lookup::Found(&1.5));
        assert_eq!(e.lookup::<u32>(7), Lookup::Mismatch);
        assert_eq!(e.lookup::<f64>(8), Lookup::Missing);
    }

    #[test]
    fn state_overwrites_per_key() {
        let mut s = StateMap::new();
        s.insert(1, 10_u32);
        s.insert(1, 11_u32);
        assert_eq!(s.len(), 1);
        assert_eq!(s.lookup::<u32>(1).found(), Some(&11));
    }
}
