// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Event Sequences

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::random::{Distribution, Sampler};
use crate::types::Time;

/// Smallest gap between two consecutive rounds of one node.
const MIN_STEP: Time = 1e-9;

// ─── Spawn ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnBatch {
    pub time: Time,
    pub count: usize,
}

/// Times at which batches of nodes are created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpawnSchedule {
    pub batches: Vec<SpawnBatch>,
}

impl SpawnSchedule {
    /// `count` nodes, all at `time`.
    pub fn multiple(count: usize, time: Time) -> Self {
        Self { batches: vec![SpawnBatch { time, count }] }
    }

    pub fn total(&self) -> usize {
        self.batches.iter().map(|b| b.count).sum()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batches.iter().any(|b| !(b.time.is_finite() && b.time >= 0.0)) {
            return Err(ConfigError::InvalidSchedule("spawn times must be finite and non-negative"));
        }
        Ok(())
    }
}

// ─── Rounds ─────────────────────────────────────────────────────────────────

/// Renewal process of round times: a first round `start` after the node
/// appears, then one every `period`, never past `end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSchedule {
    pub start: Distribution,
    pub period: Distribution,
    #[serde(default)]
    pub end: Option<Time>,
}

impl Default for RoundSchedule {
    fn default() -> Self {
        Self {
            start: Distribution::Interval { min: 0.0, max: 1.0 },
            period: Distribution::Weibull { mean: 1.0, deviation: 0.1 },
            end: None,
        }
    }
}

impl RoundSchedule {
    /// Every node fires at `start, start + period, ...`.
    pub fn periodic(start: Time, period: Time) -> Self {
        Self {
            start: Distribution::Constant { value: start },
            period: Distribution::Constant { value: period },
            end: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.start.validate()?;
        self.period.validate()?;
        let positive = match self.period {
            Distribution::Constant { value } => value > 0.0,
            Distribution::Interval { min, .. } => min > 0.0,
            Distribution::Weibull { .. } => true,
        };
        if !positive {
            return Err(ConfigError::InvalidSchedule("round period must be positive"));
        }
        match self.start {
            Distribution::Constant { value } if value < 0.0 => {
                Err(ConfigError::InvalidSchedule("round start must be non-negative"))
            }
            Distribution::Interval { min, .. } if min < 0.0 => {
                Err(ConfigError::InvalidSchedule("round start must be non-negative"))
            }
            _ => Ok(()),
        }
    }

    /// A lazy clock measuring times from `origin` that skips anything
    /// before `floor`.
    pub fn clock(&self, rng: ChaCha8Rng, origin: Time, floor: Time) -> RoundClock {
        RoundClock {
            start: self.start.sampler(),
            period: self.period.sampler(),
            end: self.end.unwrap_or(Time::INFINITY),
            origin,
            floor,
            last: None,
            rng,
        }
    }
}

/// Strictly increasing round times of one node.
#[derive(Debug, Clone)]
pub struct RoundClock {
    start: Sampler,
    period: Sampler,
    end: Time,
    origin: Time,
    floor: Time,
    last: Option<Time>,
    rng: ChaCha8Rng,
}

impl RoundClock {
    pub fn next_time(&mut self) -> Option<Time> {
        loop {
            let t = match self.last {
                None => self.origin + self.start.sample(&mut self.rng).max(0.0),
                Some(prev) => prev + self.period.sample(&mut self.rng).max(MIN_STEP),
            };
            if t > self.end {
                return None;
            }
            self.last = Some(t);
            if t >= self.floor {
                return Some(t);
            }
        }
    }
}

// ─── Log ────────────────────────────────────────────────────────────────────

/// Periodic global log ticks: `start, start + period, ...` up to `end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogSchedule {
    pub start: Time,
    pub period: Time,
    #[serde(default)]
    pub end: Option<Time>,
}

impl LogSchedule {
    pub fn periodic(start: Time, period: Time, end: Option<Time>) -> Self {
        Self { start, period, end }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.start.is_finite() && self.period > 0.0 && self.period.is_finite()) {
            return Err(ConfigError::InvalidSchedule("log needs finite start and positive period"));
        }
        Ok(())
    }

    /// The `k`-th tick, if still within the schedule.
    pub fn tick(&self, k: u64) -> Option<Time> {
        let t = self.start + self.period * k as f64;
        match self.end {
            Some(end) if t > end => None,
            _ => Some(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn periodic_clock_counts_from_origin() {
        let rng = ChaCha8Rng::seed_from_u64(1);
        let mut clock = RoundSchedule::periodic(1.0, 1.0).clock(rng, 0.0, 0.0);
        let times: Vec<Time> = (0..3).filter_map(|_| clock.next_time()).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn clock_stops_at_end() {
        let mut schedule = RoundSchedule::periodic(0.5, 1.0);
        schedule.end = Some(2.0);
        let mut clock = schedule.clock(ChaCha8Rng::seed_from_u64(1), 0.0, 0.0);
        assert_eq!(clock.next_time(), Some(0.5));
        assert_eq!(clock.next_time(), Some(1.5));
        assert_eq!(clock.next_time(), None);
    }

    #[test]
    fn floor_skips_earlier_ticks() {
        let mut clock = RoundSchedule::periodic(1.0, 1.0).clock(ChaCha8Rng::seed_from_u64(1), 0.0, 2.5);
        assert_eq!(clock.next_time(), Some(3.0));
    }

    #[test]
    fn weibull_times_strictly_increase() {
        let mut clock = RoundSchedule::default().clock(ChaCha8Rng::seed_from_u64(9), 0.0, 0.0);
        let mut prev = -1.0;
        for _ in 0..1000 {
            let t = clock.next_time().unwrap();
            assert!(t > prev);
            prev = t;
        }
    }

    #[test]
    fn log_ticks_are_exact_multiples() {
        let log = LogSchedule::periodic(0.0, 0.1, Some(1.0));
        assert_eq!(log.tick(7), Some(0.1 * 7.0));
        assert_eq!(log.tick(11), None);
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(RoundSchedule::periodic(0.0, 0.0).validate().is_err());
        assert!(RoundSchedule::default().validate().is_ok());
    }
}
