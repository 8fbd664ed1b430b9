// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Error Types

use crate::types::{Uid, ValueKind};

// ---------------------------------------------------------------------------
// Configuration errors (fatal at startup)
// ---------------------------------------------------------------------------

/// Errors raised while validating a simulation configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("tag `{0}` is used but not declared in the tuple store")]
    UndeclaredTag(String),
    #[error("tag `{tag}` declared as {declared:?} but used as {used:?}")]
    KindMismatch {
        tag: String,
        declared: ValueKind,
        used: ValueKind,
    },
    #[error("tag `{0}` declared twice in the tuple store")]
    DuplicateTag(String),
    #[error("dimension must be 2 or 3, got {0}")]
    InvalidDimension(u8),
    #[error("connection radius must be positive and finite, got {0}")]
    InvalidRadius(f64),
    #[error("link probability must be within 0..=100 percent, got {0}")]
    InvalidProbability(u8),
    #[error("area must be a finite non-empty rectangle")]
    InvalidArea,
    #[error("invalid distribution: {0}")]
    InvalidDistribution(&'static str),
    #[error("invalid schedule: {0}")]
    InvalidSchedule(&'static str),
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Invariant breaches (fatal at startup or first use)
// ---------------------------------------------------------------------------

/// Violations of application invariants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantError {
    #[error("transition row for state {state} sums to {sum}, expected 100")]
    RowSum { state: usize, sum: u32 },
    #[error("transition entry {value} for state {state} is outside 0..=100")]
    RowEntry { state: usize, value: u32 },
    #[error("decay time must be non-negative, got {0}")]
    NegativeDecay(i64),
    #[error("{0} must be positive")]
    NonPositive(&'static str),
}

// ---------------------------------------------------------------------------
// Per-round errors (isolated to the round)
// ---------------------------------------------------------------------------

/// Errors a program may hit during a single round.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    #[error("storage tag `{0}` is not declared")]
    UndeclaredTag(&'static str),
    #[error("storage tag `{tag}` holds {declared:?}, not {used:?}")]
    KindMismatch {
        tag: &'static str,
        declared: ValueKind,
        used: ValueKind,
    },
    #[error("no node with uid {0}")]
    UnknownNode(Uid),
}

// ---------------------------------------------------------------------------
// Top-level simulator error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Invariant(#[from] InvariantError),
}
