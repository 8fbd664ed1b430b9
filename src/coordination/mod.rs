// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Coordination Library

//! Reusable building blocks written purely in terms of the aligned
//! operators of [`NodeContext`](crate::field::NodeContext).
//!
//! Every public function here is `#[track_caller]` and opens its own frame,
//! so two invocations at different program sites never share state.

pub mod collection;
pub mod motion;
pub mod spreading;
pub mod time;

pub use collection::mp_collection;
pub use motion::{follow_target, rectangle_walk};
pub use spreading::{abf_hops, abf_hops_within, DEFAULT_MAX_HOPS, HOPS_INFINITY};
pub use time::{counter, timed_decay};
