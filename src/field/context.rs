// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Node Execution Context

//! The per-round execution context handed to a program.
//!
//! A `NodeContext` lives for exactly one round of one node. It reads the
//! frozen exports of the node's connected neighbours and the state the node
//! persisted last round, and accumulates the export and state of the current
//! round. Every aligned operator derives its call-site key from
//! `Location::caller()`, so operators must be invoked directly by program
//! code (or through `#[track_caller]` wrappers that open their own frame
//! with [`NodeContext::call`]).

use std::panic::Location;
use std::sync::Arc;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use super::export::{Export, Lookup, StateMap};
use super::neighbor::Field;
use super::storage::{Storage, Tag};
use super::trace::{mix, CallKey, Trace};
use crate::errors::FieldError;
use crate::geometry::Vec3;
use crate::types::{Time, Uid};

/// Everything the scheduler lends to one round.
pub struct RoundInput<'a> {
    pub uid: Uid,
    pub time: Time,
    /// Firing time of the node's previous round, if any.
    pub prev_time: Option<Time>,
    /// Zero-based index of this round for the node.
    pub round: u64,
    pub position: &'a mut Vec3,
    pub velocity: &'a mut Vec3,
    pub storage: &'a mut Storage,
    pub rng: ChaCha8Rng,
    /// Latest exports of connected neighbours, ascending uid, self excluded.
    pub inbox: &'a [(Uid, Arc<Export>)],
    /// The node's own export from its previous round.
    pub own_last: Option<&'a Export>,
    pub prev_state: &'a StateMap,
}

/// What a round leaves behind once the program returns.
#[derive(Debug)]
pub struct RoundOutput {
    pub state: StateMap,
    pub export: Export,
    pub violations: u64,
}

pub struct NodeContext<'a> {
    input: RoundInput<'a>,
    next_state: StateMap,
    export: Export,
    trace: Trace,
    violations: u64,
}

impl<'a> NodeContext<'a> {
    pub fn new(input: RoundInput<'a>) -> Self {
        Self {
            input,
            next_state: StateMap::new(),
            export: Export::new(),
            trace: Trace::new(),
            violations: 0,
        }
    }

    pub fn finish(self) -> RoundOutput {
        RoundOutput {
            state: self.next_state,
            export: self.export,
            violations: self.violations,
        }
    }

    // ─── Node attributes ────────────────────────────────────────────────

    pub fn uid(&self) -> Uid {
        self.input.uid
    }

    pub fn current_time(&self) -> Time {
        self.input.time
    }

    pub fn previous_time(&self) -> Option<Time> {
        self.input.prev_time
    }

    /// Time elapsed since the previous round, zero on the first one.
    pub fn delta_time(&self) -> Time {
        self.input
            .prev_time
            .map_or(0.0, |prev| self.input.time - prev)
    }

    pub fn round(&self) -> u64 {
        self.input.round
    }

    pub fn position(&self) -> Vec3 {
        *self.input.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        *self.input.position = position;
    }

    pub fn velocity(&self) -> Vec3 {
        *self.input.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        *self.input.velocity = velocity;
    }

    /// Connected neighbours this round, self excluded.
    pub fn neighbor_count(&self) -> usize {
        self.input.inbox.len()
    }

    pub fn neighbor_uids(&self) -> impl Iterator<Item = Uid> + '_ {
        self.input.inbox.iter().map(|(u, _)| *u)
    }

    // ─── Randomness ─────────────────────────────────────────────────────

    /// Uniform integer in `[0, n]`.
    pub fn next_int(&mut self, n: u32) -> u32 {
        self.input.rng.gen_range(0..=n)
    }

    /// Uniform real in `[0, 1)`.
    pub fn next_real(&mut self) -> f64 {
        self.input.rng.gen()
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.input.rng
    }

    // ─── Storage ────────────────────────────────────────────────────────

    pub fn get<T: Tag>(&self) -> Result<Option<T::Value>, FieldError> {
        self.input.storage.get::<T>()
    }

    pub fn set<T: Tag>(&mut self, value: T::Value) -> Result<(), FieldError> {
        self.input.storage.set::<T>(value)
    }

    // ─── Aligned operators ──────────────────────────────────────────────

    /// Evolve a value across rounds: `f(prev)` where `prev` is what this
    /// call site returned last round, or `init` on first execution.
    #[track_caller]
    pub fn old<T, F>(&mut self, init: T, f: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(&mut Self, T) -> T,
    {
        let key = self.trace.key_at(Location::caller());
        let prev_state = self.input.prev_state;
        let prev = match prev_state.lookup::<T>(key) {
            Lookup::Found(v) => v.clone(),
            Lookup::Missing => init,
            Lookup::Mismatch => {
                self.violation(self.input.uid, key);
                init
            }
        };
        self.trace.push(key);
        let next = f(self, prev);
        self.trace.pop();
        self.next_state.insert(key, next.clone());
        next
    }

    /// Publish `x` and observe what each neighbour published here.
    #[track_caller]
    pub fn nbr<T>(&mut self, x: T) -> Field<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let key = self.trace.key_at(Location::caller());
        self.export.insert(key, x.clone());
        let others = self.gather::<T>(key);
        Field::new(self.input.uid, x, others)
    }

    /// Combined `old` + `nbr`: the field holds each neighbour's last output
    /// of this call site, with self's slot set to the node's own last output
    /// (or `init`). The result of `f` is published and returned.
    #[track_caller]
    pub fn share<T, F>(&mut self, init: T, f: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(&mut Self, Field<T>) -> T,
    {
        let key = self.trace.key_at(Location::caller());
        let own_last = self.input.own_last;
        let own = match own_last.map(|e| e.lookup::<T>(key)) {
            Some(Lookup::Found(v)) => v.clone(),
            Some(Lookup::Mismatch) => {
                self.violation(self.input.uid, key);
                init
            }
            Some(Lookup::Missing) | None => init,
        };
        let others = self.gather::<T>(key);
        let field = Field::new(self.input.uid, own, others);
        self.trace.push(key);
        let out = f(self, field);
        self.trace.pop();
        self.export.insert(key, out.clone());
        out
    }

    /// The value first observed at this call site; later arguments are
    /// ignored while the site keeps being reached.
    #[track_caller]
    pub fn constant<T>(&mut self, x: T) -> T
    where
        T: Clone + Send + Sync + 'static,
    {
        let key = self.trace.key_at(Location::caller());
        let prev_state = self.input.prev_state;
        let value = match prev_state.lookup::<T>(key) {
            Lookup::Found(v) => v.clone(),
            Lookup::Missing => x,
            Lookup::Mismatch => {
                self.violation(self.input.uid, key);
                x
            }
        };
        self.next_state.insert(key, value.clone());
        value
    }

    /// Aligned conditional: operators inside each arm only align with
    /// neighbours that took the same arm at the same site.
    #[track_caller]
    pub fn branch<R>(
        &mut self,
        cond: bool,
        then: impl FnOnce(&mut Self) -> R,
        otherwise: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let key = self.trace.key_at(Location::caller());
        self.trace.push(mix(key, cond as u64 + 1));
        let out = if cond { then(self) } else { otherwise(self) };
        self.trace.pop();
        out
    }

    /// Aligned sub-computation distinguished by a caller-chosen token.
    #[track_caller]
    pub fn scope<R>(&mut self, token: u64, f: impl FnOnce(&mut Self) -> R) -> R {
        let key = self.trace.key_at(Location::caller());
        self.trace.push(mix(key, token));
        let out = f(self);
        self.trace.pop();
        out
    }

    /// Open a frame for a reusable coordination function.
    #[track_caller]
    pub fn call<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let key = self.trace.key_at(Location::caller());
        self.trace.push(key);
        let out = f(self);
        self.trace.pop();
        out
    }

    // ─── Internals ──────────────────────────────────────────────────────

    fn gather<T>(&mut self, key: CallKey) -> Vec<(Uid, T)>
    where
        T: Clone + 'static,
    {
        let inbox = self.input.inbox;
        let mut out = Vec::with_capacity(inbox.len());
        for (uid, export) in inbox {
            match export.lookup::<T>(key) {
                Lookup::Found(v) => out.push((*uid, v.clone())),
                Lookup::Missing => {}
                Lookup::Mismatch => self.violation(*uid, key),
            }
        }
        out
    }

    fn violation(&mut self, from: Uid, key: CallKey) {
        self.violations += 1;
        warn!(
            uid = self.input.uid,
            neighbor = from,
            key = format_args!("{:#018x}", key),
            "alignment violation: slot type differs, dropped for this round"
        );
    }
}
