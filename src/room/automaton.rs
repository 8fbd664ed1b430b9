// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Behaviour Automaton

use serde::{Deserialize, Serialize};

use crate::errors::InvariantError;
use crate::field::storage::Discrete;

/// Behavioural state of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Sitting = 0,
    Walking = 1,
    Reporting = 2,
    Following = 3,
    Gateway = 4,
}

impl NodeState {
    pub const COUNT: usize = 5;

    pub const ALL: [NodeState; Self::COUNT] = [
        NodeState::Sitting,
        NodeState::Walking,
        NodeState::Reporting,
        NodeState::Following,
        NodeState::Gateway,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeState::Sitting => "sitting",
            NodeState::Walking => "walking",
            NodeState::Reporting => "reporting",
            NodeState::Following => "following",
            NodeState::Gateway => "gateway",
        }
    }
}

impl Discrete for NodeState {
    fn ordinal(self) -> u32 {
        self as u32
    }

    fn from_ordinal(ordinal: u32) -> Option<Self> {
        NodeState::ALL.get(ordinal as usize).copied()
    }
}

// ─── Transition matrix ──────────────────────────────────────────────────────

/// Row-per-state transition percentages. Each row sums to 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionMatrix {
    pub rows: [[u32; NodeState::COUNT]; NodeState::COUNT],
}

impl Default for TransitionMatrix {
    fn default() -> Self {
        Self {
            rows: [
                [95, 1, 4, 0, 0],
                [50, 40, 5, 5, 0],
                [60, 10, 30, 0, 0],
                [40, 10, 0, 50, 0],
                // Absorbing: the gateway never leaves its post.
                [0, 0, 0, 0, 100],
            ],
        }
    }
}

impl TransitionMatrix {
    pub fn validate(&self) -> Result<(), InvariantError> {
        for (state, row) in self.rows.iter().enumerate() {
            if let Some(&value) = row.iter().find(|v| **v > 100) {
                return Err(InvariantError::RowEntry { state, value });
            }
            let sum: u32 = row.iter().sum();
            if sum != 100 {
                return Err(InvariantError::RowSum { state, sum });
            }
        }
        Ok(())
    }

    /// Next state given a uniform draw `roll ∈ [0, 99]`.
    pub fn step(&self, from: NodeState, roll: u32) -> NodeState {
        let mut acc = 0;
        for (next, weight) in NodeState::ALL.iter().zip(self.rows[from.index()]) {
            acc += weight;
            if roll < acc {
                return *next;
            }
        }
        from
    }

    /// Long-run state frequencies of the chain started in `from`, by power
    /// iteration.
    pub fn stationary(&self, from: NodeState, iterations: usize) -> [f64; NodeState::COUNT] {
        let mut dist = [0.0; NodeState::COUNT];
        dist[from.index()] = 1.0;
        for _ in 0..iterations {
            let mut next = [0.0; NodeState::COUNT];
            for (i, row) in self.rows.iter().enumerate() {
                for (j, w) in row.iter().enumerate() {
                    next[j] += dist[i] * *w as f64 / 100.0;
                }
            }
            dist = next;
        }
        dist
    }
}
