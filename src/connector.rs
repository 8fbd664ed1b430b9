// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Connectivity

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::geometry::{Area, Vec3};
use crate::types::Uid;

/// Upper bound on buckets per axis of the spatial grid.
const MAX_BUCKETS_PER_AXIS: usize = 1024;

// ─── Connector ──────────────────────────────────────────────────────────────

/// Which pairs of nodes exchange exports during a round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Connector {
    /// Connected iff within `radius`.
    Fixed { radius: f64 },
    /// As `Fixed`, but each link survives a round with `percent`% chance,
    /// rolled by the receiving node.
    Radial { percent: u8, radius: f64 },
}

impl Default for Connector {
    fn default() -> Self {
        Connector::Fixed { radius: 1.0 }
    }
}

impl Connector {
    pub fn radius(&self) -> f64 {
        match *self {
            Connector::Fixed { radius } | Connector::Radial { radius, .. } => radius,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let radius = self.radius();
        if !(radius.is_finite() && radius > 0.0) {
            return Err(ConfigError::InvalidRadius(radius));
        }
        if let Connector::Radial { percent, .. } = *self {
            if percent > 100 {
                return Err(ConfigError::InvalidProbability(percent));
            }
        }
        Ok(())
    }

    pub fn in_range(&self, a: &Vec3, b: &Vec3, dimension: u8) -> bool {
        let r = self.radius();
        a.distance_sq(b, dimension) <= r * r
    }

    /// Roll whether an in-range link is kept this round. Draws nothing for
    /// connectors that never drop.
    pub fn keeps<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        match *self {
            Connector::Fixed { .. } => true,
            Connector::Radial { percent, .. } if percent >= 100 => true,
            Connector::Radial { percent, .. } => rng.gen_range(0..100_u8) < percent,
        }
    }
}

// ─── Spatial index ──────────────────────────────────────────────────────────

/// Uniform bucket grid over the configured area. Points outside the area
/// fall into the border buckets, which keeps neighbour queries exact since
/// clamping never increases distances.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    area: Area,
    cell: f64,
    nx: usize,
    ny: usize,
    buckets: Vec<Vec<(Uid, Vec3)>>,
}

impl SpatialGrid {
    pub fn new(area: Area, radius: f64) -> Self {
        let width = area.max_x - area.min_x;
        let height = area.max_y - area.min_y;
        let cap = MAX_BUCKETS_PER_AXIS as f64;
        let cell = radius.max(width / cap).max(height / cap);
        let nx = ((width / cell).ceil() as usize).clamp(1, MAX_BUCKETS_PER_AXIS);
        let ny = ((height / cell).ceil() as usize).clamp(1, MAX_BUCKETS_PER_AXIS);
        Self {
            area,
            cell,
            nx,
            ny,
            buckets: vec![Vec::new(); nx * ny],
        }
    }

    fn bucket_of(&self, p: &Vec3) -> (usize, usize) {
        let axis = |v: f64, min: f64, n: usize| -> usize {
            let i = ((v - min) / self.cell).floor();
            if i <= 0.0 || i.is_nan() {
                0
            } else {
                (i as usize).min(n - 1)
            }
        };
        (
            axis(p.x, self.area.min_x, self.nx),
            axis(p.y, self.area.min_y, self.ny),
        )
    }

    pub fn insert(&mut self, uid: Uid, position: Vec3) {
        let (i, j) = self.bucket_of(&position);
        self.buckets[j * self.nx + i].push((uid, position));
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// Uids within `connector` range of `center`, ascending.
    pub fn neighbors(&self, center: &Vec3, connector: &Connector, dimension: u8) -> Vec<Uid> {
        let (ci, cj) = self.bucket_of(center);
        let mut out = Vec::new();
        for j in cj.saturating_sub(1)..=(cj + 1).min(self.ny - 1) {
            for i in ci.saturating_sub(1)..=(ci + 1).min(self.nx - 1) {
                out.extend(
                    self.buckets[j * self.nx + i]
                        .iter()
                        .filter(|(_, p)| connector.in_range(center, p, dimension))
                        .map(|(u, _)| *u),
                );
            }
        }
        out.sort_unstable();
        out
    }
}
