// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Field Calculus Runtime

//! Field-calculus runtime: call-site keys, neighbour fields, exports,
//! persistent state, tagged storage and the per-round node context.

pub mod context;
pub mod export;
pub mod neighbor;
pub mod storage;
pub mod trace;

pub use context::{NodeContext, RoundInput, RoundOutput};
pub use export::{Export, Lookup, StateMap};
pub use neighbor::{Field, HoodSum};
pub use storage::{Discrete, Schema, Storage, Stored, Tag, TagDecl};
pub use trace::CallKey;
