// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Geometry Primitives

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

use rand::Rng;
use serde::{Deserialize, Serialize};

// ─── Vec3 ───────────────────────────────────────────────────────────────────

/// A point or displacement in simulated space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn norm_sq(&self) -> f64 {
        self.dot(self)
    }

    pub fn norm(&self) -> f64 {
        self.norm_sq().sqrt()
    }

    /// Squared distance, ignoring `z` when `dimension == 2`.
    pub fn distance_sq(&self, other: &Vec3, dimension: u8) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = if dimension >= 3 { self.z - other.z } else { 0.0 };
        dx * dx + dy * dy + dz * dz
    }

    /// Rescale to the given length. The zero vector stays zero.
    pub fn with_length(&self, len: f64) -> Vec3 {
        let n = self.norm();
        if n <= f64::EPSILON {
            Vec3::ZERO
        } else {
            *self * (len / n)
        }
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, k: f64) -> Vec3 {
        Vec3::new(self.x * k, self.y * k, self.z * k)
    }
}

impl Div<f64> for Vec3 {
    type Output = Vec3;
    fn div(self, k: f64) -> Vec3 {
        Vec3::new(self.x / k, self.y / k, self.z / k)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

// ─── Area ───────────────────────────────────────────────────────────────────

/// Planar bounding box nodes are kept inside. Also drives spatial bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Area {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// A `width × height` room widened by `margin` on every side.
    pub fn with_margin(width: f64, height: f64, margin: f64) -> Self {
        Self::new(-margin, -margin, width + margin, height + margin)
    }

    pub fn is_valid(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
            && self.min_x < self.max_x
            && self.min_y < self.max_y
    }

    pub fn contains(&self, p: &Vec3) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// Clamp the planar coordinates of `p`; `z` is left to the application.
    pub fn clamp(&self, p: Vec3) -> Vec3 {
        Vec3::new(
            p.x.clamp(self.min_x, self.max_x),
            p.y.clamp(self.min_y, self.max_y),
            p.z,
        )
    }
}

// ─── Sampling ───────────────────────────────────────────────────────────────

/// Uniform point inside the axis-aligned box `[low, high]`.
pub fn random_rectangle_point<R: Rng + ?Sized>(rng: &mut R, low: Vec3, high: Vec3) -> Vec3 {
    Vec3::new(
        sample_between(rng, low.x, high.x),
        sample_between(rng, low.y, high.y),
        sample_between(rng, low.z, high.z),
    )
}

fn sample_between<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}
