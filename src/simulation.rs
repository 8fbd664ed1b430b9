// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Simulation Core

//! Discrete-event engine.
//!
//! Events are ordered by `(time, phase, key)`: spawns before rounds before
//! log ticks at the same instant, and rounds by ascending uid. All rounds
//! sharing an instant form one batch. Inboxes for the whole batch are
//! materialised before any of its rounds runs, so a round firing at `t`
//! only ever reads exports published strictly before `t`, and the batch can
//! run on the rayon pool without locks.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::SimConfig;
use crate::connector::SpatialGrid;
use crate::errors::{FieldError, SimError};
use crate::field::{Export, NodeContext, RoundInput, Schema, StateMap, Storage, Tag, TagDecl};
use crate::geometry::{random_rectangle_point, Area, Vec3};
use crate::random::{node_stream, round_stream, Sampler, StreamKind};
use crate::sequence::RoundClock;
use crate::types::{NodeView, StorageValue, Time, Uid};

// ─── Extension points ───────────────────────────────────────────────────────

/// The function every node runs each round.
pub trait Program: Send + Sync {
    /// Storage tags the program reads or writes. Each must appear in the
    /// configured tuple store with the same kind.
    fn tags(&self) -> Vec<TagDecl>;

    /// One round. An error discards everything the round produced.
    fn round(&self, node: &mut NodeContext) -> Result<(), FieldError>;
}

/// Global observer invoked at every log tick.
pub trait LogAggregator {
    fn aggregate(&mut self, time: Time, nodes: &[NodeView]) -> io::Result<()>;
}

// ─── Statistics ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimStats {
    pub nodes: u64,
    pub rounds: u64,
    /// Neighbour exports handed to rounds.
    pub messages: u64,
    pub alignment_violations: u64,
    /// In-range links removed by a lossy connector.
    pub dropped_links: u64,
    pub failed_rounds: u64,
    pub log_ticks: u64,
    pub log_failures: u64,
}

// ─── Events ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Spawn = 0,
    Round = 1,
    Log = 2,
}

/// `key` is the spawn batch index, the node uid or the log tick index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Event {
    time: OrderedFloat<Time>,
    phase: Phase,
    key: u64,
}

// ─── Node ───────────────────────────────────────────────────────────────────

struct Node {
    uid: Uid,
    position: Vec3,
    velocity: Vec3,
    /// Time `position` was last brought up to date.
    moved_at: Time,
    storage: Storage,
    state: StateMap,
    /// Latest and second-latest exports with their firing times.
    published: Option<(Time, Arc<Export>)>,
    previous: Option<(Time, Arc<Export>)>,
    clock: RoundClock,
    rounds: u64,
    last_round: Option<Time>,
}

impl Node {
    fn position_at(&self, t: Time, area: &Area) -> Vec3 {
        area.clamp(self.position + self.velocity * (t - self.moved_at))
    }

    /// Most recent export fired strictly before `t`.
    fn export_before(&self, t: Time) -> Option<&Arc<Export>> {
        [&self.published, &self.previous]
            .into_iter()
            .flatten()
            .find(|(at, _)| *at < t)
            .map(|(_, e)| e)
    }

    fn publish(&mut self, t: Time, export: Export) {
        self.previous = self.published.take();
        self.published = Some((t, Arc::new(export)));
    }

    fn view(&self, t: Time, area: &Area) -> NodeView {
        NodeView {
            uid: self.uid,
            position: self.position_at(t.max(self.moved_at), area),
            velocity: self.velocity,
            current_time: self.last_round.unwrap_or(self.moved_at),
            rounds: self.rounds,
            storage: self.storage.snapshot(),
        }
    }
}

/// Inputs of one round gathered before the batch executes.
struct RoundJob {
    inbox: Vec<(Uid, Arc<Export>)>,
    rng: ChaCha8Rng,
}

struct RoundOutcome {
    violations: u64,
    failed: bool,
}

// ─── Simulator ──────────────────────────────────────────────────────────────

pub struct Simulator<P: Program> {
    config: SimConfig,
    program: P,
    schema: Arc<Schema>,
    /// Indexed by uid.
    nodes: Vec<Node>,
    queue: BinaryHeap<Reverse<Event>>,
    now: Time,
    stats: SimStats,
    init_reals: Vec<(String, Sampler)>,
    aggregators: Vec<Box<dyn LogAggregator + Send>>,
}

impl<P: Program> Simulator<P> {
    pub fn new(config: SimConfig, program: P) -> Result<Self, SimError> {
        config.validate()?;
        let schema = Schema::new(config.tuple_store.clone())?;
        for decl in program.tags() {
            schema.require(&decl)?;
        }
        let init_reals = config
            .init
            .reals
            .iter()
            .map(|(tag, dist)| (tag.clone(), dist.sampler()))
            .collect();

        let mut sim = Self {
            program,
            schema: Arc::new(schema),
            nodes: Vec::new(),
            queue: BinaryHeap::new(),
            now: 0.0,
            stats: SimStats::default(),
            init_reals,
            aggregators: Vec::new(),
            config,
        };
        for (i, batch) in sim.config.spawn.batches.iter().enumerate() {
            if batch.time <= sim.config.end_time {
                sim.queue.push(Reverse(Event {
                    time: OrderedFloat(batch.time),
                    phase: Phase::Spawn,
                    key: i as u64,
                }));
            }
        }
        sim.push_log(0);

        info!(
            seed = sim.config.seed,
            planned_nodes = sim.config.spawn.total(),
            end_time = sim.config.end_time,
            parallel = sim.config.parallel && !sim.config.synchronised,
            "simulator ready"
        );
        Ok(sim)
    }

    pub fn with_aggregator(mut self, aggregator: impl LogAggregator + Send + 'static) -> Self {
        self.add_aggregator(aggregator);
        self
    }

    pub fn add_aggregator(&mut self, aggregator: impl LogAggregator + Send + 'static) {
        self.aggregators.push(Box::new(aggregator));
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn stats(&self) -> SimStats {
        self.stats
    }

    /// Time of the last processed event.
    pub fn current_time(&self) -> Time {
        self.now
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Time of the next pending event, if any.
    pub fn next_event_time(&self) -> Option<Time> {
        self.queue.peek().map(|Reverse(e)| e.time.0)
    }

    pub fn is_finished(&self) -> bool {
        self.queue.is_empty()
    }

    // ─── Node creation ──────────────────────────────────────────────────

    /// Create a node at an explicit position. Configured initial storage
    /// values are still drawn. Returns the new uid.
    pub fn spawn_at(&mut self, time: Time, position: Vec3) -> Uid {
        let uid = self.nodes.len() as Uid;
        let mut rng = node_stream(self.config.seed, StreamKind::Spawn, uid);
        let mut storage = Storage::new(Arc::clone(&self.schema));
        for (tag, sampler) in &self.init_reals {
            let value = StorageValue::Real(sampler.sample(&mut rng));
            // Tags were validated against the schema at construction.
            if let Err(err) = storage.set_raw(tag, value) {
                warn!(uid, %err, "initial value rejected");
            }
        }

        let time = time.max(self.now);
        let clock = if self.config.synchronised {
            let rng = node_stream(self.config.seed, StreamKind::Lockstep, 0);
            self.config.round.clock(rng, 0.0, time)
        } else {
            let rng = node_stream(self.config.seed, StreamKind::Schedule, uid);
            self.config.round.clock(rng, time, time)
        };
        self.nodes.push(Node {
            uid,
            position: self.config.area.clamp(position),
            velocity: Vec3::ZERO,
            moved_at: time,
            storage,
            state: StateMap::new(),
            published: None,
            previous: None,
            clock,
            rounds: 0,
            last_round: None,
        });
        self.stats.nodes += 1;
        self.schedule_next(uid);
        debug!(uid, time, "node spawned");
        uid
    }

    /// Overwrite a storage value of a live node, e.g. to set up a scenario.
    pub fn set_storage<T: Tag>(&mut self, uid: Uid, value: T::Value) -> Result<(), FieldError> {
        self.nodes
            .get_mut(uid as usize)
            .ok_or(FieldError::UnknownNode(uid))?
            .storage
            .set::<T>(value)
    }

    fn spawn_batch(&mut self, time: Time, index: usize) {
        let Some(batch) = self.config.spawn.batches.get(index).copied() else {
            return;
        };
        let (low, high) = (self.config.init.position_low, self.config.init.position_high);
        for _ in 0..batch.count {
            let uid = self.nodes.len() as Uid;
            let mut rng = node_stream(self.config.seed, StreamKind::Placement, uid);
            let position = random_rectangle_point(&mut rng, low, high);
            self.spawn_at(time, position);
        }
        debug!(time, count = batch.count, "spawn batch");
    }

    fn schedule_next(&mut self, uid: Uid) {
        let Some(node) = self.nodes.get_mut(uid as usize) else {
            return;
        };
        if let Some(t) = node.clock.next_time() {
            if t <= self.config.end_time {
                self.queue.push(Reverse(Event {
                    time: OrderedFloat(t),
                    phase: Phase::Round,
                    key: uid,
                }));
            }
        }
    }

    fn push_log(&mut self, k: u64) {
        let Some(log) = self.config.log else {
            return;
        };
        if let Some(t) = log.tick(k) {
            if t <= self.config.end_time {
                self.queue.push(Reverse(Event {
                    time: OrderedFloat(t),
                    phase: Phase::Log,
                    key: k,
                }));
            }
        }
    }

    // ─── Event loop ─────────────────────────────────────────────────────

    /// Run to the configured end time.
    pub fn run(&mut self) -> SimStats {
        let end = self.config.end_time;
        self.run_until(end);
        info!(
            time = self.now,
            nodes = self.stats.nodes,
            rounds = self.stats.rounds,
            messages = self.stats.messages,
            violations = self.stats.alignment_violations,
            failed = self.stats.failed_rounds,
            "simulation finished"
        );
        self.stats
    }

    /// Process every event with time `<= until`.
    pub fn run_until(&mut self, until: Time) {
        while self.next_event_time().is_some_and(|t| t <= until) {
            self.step();
        }
    }

    /// Process the next event, or the next batch of same-instant rounds.
    /// Returns the time processed.
    pub fn step(&mut self) -> Option<Time> {
        let Reverse(event) = self.queue.pop()?;
        let t = event.time.0;
        self.now = t;
        match event.phase {
            Phase::Spawn => self.spawn_batch(t, event.key as usize),
            Phase::Round => {
                let mut batch = vec![event.key];
                while let Some(Reverse(next)) = self.queue.peek() {
                    if next.phase != Phase::Round || next.time != event.time {
                        break;
                    }
                    batch.push(next.key);
                    self.queue.pop();
                }
                self.fire_batch(t, &batch);
            }
            Phase::Log => {
                self.log_tick(t);
                self.push_log(event.key + 1);
            }
        }
        Some(t)
    }

    /// `batch` is ascending by uid.
    fn fire_batch(&mut self, t: Time, batch: &[Uid]) {
        let area = self.config.area;
        let dimension = self.config.dimension;
        let connector = self.config.connector;

        // Everyone with something to say, at their position now.
        let mut grid = SpatialGrid::new(area, connector.radius());
        for node in &self.nodes {
            if node.export_before(t).is_some() {
                grid.insert(node.uid, node.position_at(t, &area));
            }
        }

        let mut jobs = Vec::with_capacity(batch.len());
        for &uid in batch {
            let node = &self.nodes[uid as usize];
            let mut rng = round_stream(self.config.seed, uid, node.rounds);
            let center = node.position_at(t, &area);
            let mut inbox = Vec::new();
            for other in grid.neighbors(&center, &connector, dimension) {
                if other == uid {
                    continue;
                }
                if !connector.keeps(&mut rng) {
                    self.stats.dropped_links += 1;
                    continue;
                }
                if let Some(export) = self.nodes[other as usize].export_before(t) {
                    inbox.push((other, Arc::clone(export)));
                }
            }
            self.stats.messages += inbox.len() as u64;
            jobs.push((uid, RoundJob { inbox, rng }));
        }

        // Pair each job with its node; both sequences ascend by uid.
        let mut jobs = jobs.into_iter().peekable();
        let mut work = Vec::with_capacity(batch.len());
        for node in self.nodes.iter_mut() {
            if let Some((_, job)) = jobs.next_if(|(uid, _)| *uid == node.uid) {
                work.push((node, job));
            }
        }

        let program = &self.program;
        let outcomes: Vec<RoundOutcome> = if self.config.parallel && !self.config.synchronised {
            work.into_par_iter()
                .map(|(node, job)| run_round(program, node, job, t, &area))
                .collect()
        } else {
            work.into_iter()
                .map(|(node, job)| run_round(program, node, job, t, &area))
                .collect()
        };

        for outcome in &outcomes {
            self.stats.rounds += 1;
            self.stats.alignment_violations += outcome.violations;
            if outcome.failed {
                self.stats.failed_rounds += 1;
            }
        }
        for &uid in batch {
            self.schedule_next(uid);
        }
    }

    fn log_tick(&mut self, t: Time) {
        self.stats.log_ticks += 1;
        if self.aggregators.is_empty() {
            return;
        }
        let views = self.views_at(t);
        debug!(time = t, nodes = views.len(), "log tick");
        for aggregator in &mut self.aggregators {
            if let Err(err) = aggregator.aggregate(t, &views) {
                self.stats.log_failures += 1;
                warn!(time = t, %err, "log aggregation failed");
            }
        }
    }

    // ─── Read-only access ───────────────────────────────────────────────

    fn views_at(&self, t: Time) -> Vec<NodeView> {
        let area = self.config.area;
        self.nodes.iter().map(|n| n.view(t, &area)).collect()
    }

    /// Snapshot of every live node, ascending uid.
    pub fn nodes(&self) -> Vec<NodeView> {
        self.views_at(self.now)
    }

    pub fn node(&self, uid: Uid) -> Option<NodeView> {
        self.nodes
            .get(uid as usize)
            .map(|n| n.view(self.now, &self.config.area))
    }

    /// Typed storage read; `None` for unknown nodes, unwritten slots or
    /// tags outside the schema.
    pub fn storage<T: Tag>(&self, uid: Uid) -> Option<T::Value> {
        self.nodes
            .get(uid as usize)
            .and_then(|n| n.storage.get::<T>().ok().flatten())
    }
}

/// Execute one round of `node`. Runs on a worker when the batch is parallel.
fn run_round<P: Program>(program: &P, node: &mut Node, job: RoundJob, t: Time, area: &Area) -> RoundOutcome {
    node.position = node.position_at(t, area);
    node.moved_at = t;
    let neighbors = job.inbox.len();

    let mut storage = node.storage.clone();
    let mut position = node.position;
    let mut velocity = node.velocity;
    let mut ctx = NodeContext::new(RoundInput {
        uid: node.uid,
        time: t,
        prev_time: node.last_round,
        round: node.rounds,
        position: &mut position,
        velocity: &mut velocity,
        storage: &mut storage,
        rng: job.rng,
        inbox: &job.inbox,
        own_last: node.published.as_ref().map(|(_, e)| e.as_ref()),
        prev_state: &node.state,
    });
    let result = program.round(&mut ctx);
    let output = ctx.finish();
    trace!(uid = node.uid, time = t, neighbors, "round");

    node.rounds += 1;
    node.last_round = Some(t);
    match result {
        Ok(()) => {
            node.storage = storage;
            node.position = area.clamp(position);
            node.velocity = velocity;
            node.state = output.state;
            node.publish(t, output.export);
            RoundOutcome { violations: output.violations, failed: false }
        }
        Err(err) => {
            warn!(uid = node.uid, time = t, %err, "round failed, results discarded");
            RoundOutcome { violations: output.violations, failed: true }
        }
    }
}
