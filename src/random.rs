// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Deterministic Random Streams

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::types::Uid;

// ─── Stream derivation ──────────────────────────────────────────────────────

/// Independent purposes drawing from the global seed. Each purpose owns a
/// disjoint ChaCha key so streams never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Draws made inside a node round (program, link drops).
    Round = 1,
    /// Per-node round schedule.
    Schedule = 2,
    /// Initial attributes of spawned nodes.
    Spawn = 3,
    /// Shared lock-step schedule when the simulation is synchronised.
    Lockstep = 4,
    /// Spawn positions, apart from the storage draws.
    Placement = 5,
}

/// Words reserved per round inside a node stream.
const ROUND_WORDS: u128 = 1 << 32;

/// Base generator for `(seed, kind, uid)`.
pub fn node_stream(seed: u64, kind: StreamKind, uid: Uid) -> ChaCha8Rng {
    let key = splitmix64(seed ^ ((kind as u64) << 56));
    let mut rng = ChaCha8Rng::seed_from_u64(key);
    rng.set_stream(uid);
    rng
}

/// The generator a node uses during the round with index `round`.
pub fn round_stream(seed: u64, uid: Uid, round: u64) -> ChaCha8Rng {
    let mut rng = node_stream(seed, StreamKind::Round, uid);
    rng.set_word_pos(round as u128 * ROUND_WORDS);
    rng
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// ─── Distribution ───────────────────────────────────────────────────────────

/// Real-valued distribution used by schedules and initial values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    Constant { value: f64 },
    /// Uniform on `[min, max)`.
    Interval { min: f64, max: f64 },
    /// Weibull described by its mean and standard deviation.
    Weibull { mean: f64, deviation: f64 },
}

impl Distribution {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Distribution::Constant { value } if !value.is_finite() => {
                Err(ConfigError::InvalidDistribution("constant value must be finite"))
            }
            Distribution::Interval { min, max } if !(min.is_finite() && max.is_finite() && min <= max) => {
                Err(ConfigError::InvalidDistribution("interval needs finite min <= max"))
            }
            Distribution::Weibull { mean, deviation } if !(mean > 0.0 && deviation > 0.0) => {
                Err(ConfigError::InvalidDistribution("weibull needs positive mean and deviation"))
            }
            _ => Ok(()),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.sampler().sample(rng)
    }

    /// Precompute sampling parameters (fits the Weibull shape once).
    pub fn sampler(&self) -> Sampler {
        match *self {
            Distribution::Constant { value } => Sampler::Constant(value),
            Distribution::Interval { min, max } => Sampler::Interval(min, max),
            Distribution::Weibull { mean, deviation } => {
                let (scale, shape) = weibull_parameters(mean, deviation);
                Sampler::Weibull { scale, shape }
            }
        }
    }

    pub fn mean(&self) -> f64 {
        match *self {
            Distribution::Constant { value } => value,
            Distribution::Interval { min, max } => (min + max) / 2.0,
            Distribution::Weibull { mean, .. } => mean,
        }
    }
}

/// A [`Distribution`] with its derived parameters resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sampler {
    Constant(f64),
    Interval(f64, f64),
    Weibull { scale: f64, shape: f64 },
}

impl Sampler {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Sampler::Constant(v) => v,
            Sampler::Interval(min, max) => {
                if max > min {
                    rng.gen_range(min..max)
                } else {
                    min
                }
            }
            Sampler::Weibull { scale, shape } => weibull_sample(rng, scale, shape),
        }
    }
}

// ─── Weibull ────────────────────────────────────────────────────────────────

/// Inverse-CDF Weibull draw: `scale * (-ln U)^(1/shape)` with `U ∈ (0, 1]`.
pub fn weibull_sample<R: Rng + ?Sized>(rng: &mut R, scale: f64, shape: f64) -> f64 {
    let u: f64 = 1.0 - rng.gen::<f64>();
    scale * (-u.ln()).powf(1.0 / shape)
}

/// Fit `(scale, shape)` so the Weibull has the requested mean and deviation.
///
/// The coefficient of variation depends on the shape only:
///   cv² = Γ(1 + 2/k) / Γ(1 + 1/k)² − 1
/// and is strictly decreasing in `k`, so bisection on `ln k` converges.
pub fn weibull_parameters(mean: f64, deviation: f64) -> (f64, f64) {
    let target = deviation / mean;
    let cv = |k: f64| {
        let g1 = ln_gamma(1.0 + 1.0 / k);
        let g2 = ln_gamma(1.0 + 2.0 / k);
        ((g2 - 2.0 * g1).exp() - 1.0).max(0.0).sqrt()
    };
    let (mut lo, mut hi) = (0.02_f64.ln(), 500.0_f64.ln());
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if cv(mid.exp()) > target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let shape = (0.5 * (lo + hi)).exp();
    let scale = mean / ln_gamma(1.0 + 1.0 / shape).exp();
    (scale, shape)
}

/// Lanczos approximation of `ln Γ(x)` for `x > 0`.
pub fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut a = COEF[0];
    let t = x + G + 0.5;
    for (i, c) in COEF.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ln_gamma_matches_factorials() {
        assert!(ln_gamma(1.0).abs() < 1e-12);
        assert!((ln_gamma(5.0) - 24.0_f64.ln()).abs() < 1e-10);
        assert!((ln_gamma(0.5) - std::f64::consts::PI.sqrt().ln()).abs() < 1e-10);
    }

    #[test]
    fn weibull_moments_match_request() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let d = Distribution::Weibull { mean: 1.0, deviation: 0.1 }.sampler();
        let n = 50_000;
        let samples: Vec<f64> = (0..n).map(|_| d.sample(&mut rng)).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((mean - 1.0).abs() < 0.01, "mean {} far from 1.0", mean);
        assert!((var.sqrt() - 0.1).abs() < 0.01, "deviation {} far from 0.1", var.sqrt());
    }

    #[test]
    fn exponential_is_shape_one() {
        let (scale, shape) = weibull_parameters(2.0, 2.0);
        assert!((shape - 1.0).abs() < 1e-6);
        assert!((scale - 2.0).abs() < 1e-6);
    }

    #[test]
    fn round_streams_are_reproducible_and_distinct() {
        let a: u64 = round_stream(7, 3, 10).gen();
        let b: u64 = round_stream(7, 3, 10).gen();
        let c: u64 = round_stream(7, 3, 11).gen();
        let d: u64 = round_stream(7, 4, 10).gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn invalid_distributions_rejected() {
        assert!(Distribution::Interval { min: 2.0, max: 1.0 }.validate().is_err());
        assert!(Distribution::Weibull { mean: 0.0, deviation: 1.0 }.validate().is_err());
        assert!(Distribution::Constant { value: 3.0 }.validate().is_ok());
    }
}
