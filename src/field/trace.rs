// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Call-Site Keys

//! Call-site identity for aligned operators.
//!
//! A key is the source location of the operator invocation, mixed with the
//! stack of enclosing scopes (function calls, taken branches) and with an
//! occurrence counter so that repeated invocations of the same location in
//! one round (loops) align positionally. The key space depends only on the
//! program text and the branches taken, so it is stable across rounds and
//! across nodes running the same binary.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::panic::Location;

/// Identity of one dynamic invocation of an aligned operator.
pub type CallKey = u64;

const ROOT: CallKey = 0x243F_6A88_85A3_08D3;

/// Per-round builder of call-site keys.
#[derive(Debug, Default)]
pub struct Trace {
    frames: Vec<CallKey>,
    occurrences: HashMap<CallKey, u32>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key for an operator invoked at `location` in the current scope.
    pub fn key_at(&mut self, location: &Location<'_>) -> CallKey {
        let site = mix(self.base(), location_hash(location));
        let seen = self.occurrences.entry(site).or_insert(0);
        let occurrence = *seen;
        *seen += 1;
        mix(site, occurrence as u64)
    }

    /// Enter a scope identified by `key`.
    pub fn push(&mut self, key: CallKey) {
        self.frames.push(key);
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn base(&self) -> CallKey {
        self.frames.last().copied().unwrap_or(ROOT)
    }
}

/// Combine a scope key with a token (branch taken, user tag, occurrence).
pub fn mix(key: CallKey, token: u64) -> CallKey {
    let mut z = key ^ token.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn location_hash(location: &Location<'_>) -> u64 {
    let mut h = std::collections::hash_map::DefaultHasher::new();
    location.file().hash(&mut h);
    location.line().hash(&mut h);
    location.column().hash(&mut h);
    h.finish()
}
