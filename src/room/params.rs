// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Scenario Parameters

use serde::{Deserialize, Serialize};

use super::automaton::TransitionMatrix;
use super::program::RoomProgram;
use crate::config::{InitConfig, SimConfig};
use crate::connector::Connector;
use crate::errors::InvariantError;
use crate::geometry::{Area, Vec3};
use crate::random::Distribution;
use crate::sequence::{LogSchedule, RoundSchedule, SpawnSchedule};
use crate::types::{Time, Uid};

/// Parameters of the room scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomParams {
    /// Number of users.
    pub people: usize,
    /// Communication radius.
    pub comm: f64,
    /// Chance in percent that an in-range link carries a round.
    pub link_percent: u8,
    pub width: f64,
    pub height: f64,
    /// Height at which users walk.
    pub tall: f64,
    /// Cell size of the reconstructed satisfaction map.
    pub grain: f64,
    /// Rounds a report survives after it stops being emitted.
    pub decay_time: i64,
    pub end_time: Time,
    /// Slack around the room inside which positions are kept.
    pub margin: f64,
    pub walk_reach: f64,
    pub walk_speed: f64,
    pub node_size: f64,
    pub gateway: Uid,
    pub transitions: TransitionMatrix,
}

impl Default for RoomParams {
    fn default() -> Self {
        Self::canonical()
    }
}

impl RoomParams {
    /// Final scenario: decaying local reports collected at the gateway.
    pub fn canonical() -> Self {
        Self {
            people: 80,
            comm: 25.0,
            link_percent: 80,
            width: 100.0,
            height: 30.0,
            tall: 5.0,
            grain: 10.0,
            decay_time: 30,
            end_time: 1000.0,
            margin: 10.0,
            walk_reach: 10.0,
            walk_speed: 1.0,
            node_size: 1.5,
            gateway: 0,
            transitions: TransitionMatrix::default(),
        }
    }

    /// First draft: reports are not retained once a user stops reporting.
    pub fn draft_a() -> Self {
        Self { decay_time: 0, ..Self::canonical() }
    }

    /// Second draft: human-scale height, fine map and short links.
    pub fn draft_b() -> Self {
        Self {
            tall: 170.0,
            grain: 3.0,
            comm: 4.0,
            ..Self::canonical()
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "canonical" => Some(Self::canonical()),
            "draft_a" | "draft-a" => Some(Self::draft_a()),
            "draft_b" | "draft-b" => Some(Self::draft_b()),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), InvariantError> {
        self.transitions.validate()?;
        if self.decay_time < 0 {
            return Err(InvariantError::NegativeDecay(self.decay_time));
        }
        let positive = [
            ("width", self.width),
            ("height", self.height),
            ("grain", self.grain),
            ("comm", self.comm),
            ("walk speed", self.walk_speed),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(InvariantError::NonPositive(name));
            }
        }
        Ok(())
    }

    pub fn map_x_size(&self) -> u32 {
        (self.width / self.grain).ceil() as u32
    }

    pub fn map_y_size(&self) -> u32 {
        (self.height / self.grain).ceil() as u32
    }

    /// Decay horizon in rounds.
    pub fn decay_rounds(&self) -> u32 {
        u32::try_from(self.decay_time.max(0)).unwrap_or(u32::MAX)
    }

    pub fn area(&self) -> Area {
        Area::with_margin(self.width, self.height, self.margin)
    }

    /// Simulator configuration running this scenario.
    pub fn sim_config(&self, seed: u64, parallel: bool) -> SimConfig {
        let mut init = InitConfig {
            position_low: Vec3::ZERO,
            position_high: Vec3::new(self.width, self.height, 0.0),
            ..InitConfig::default()
        };
        init.reals
            .insert("preference".into(), Distribution::Interval { min: 0.0, max: 1.0 });
        SimConfig {
            seed,
            end_time: self.end_time,
            tuple_store: RoomProgram::tag_decls(),
            spawn: SpawnSchedule::multiple(self.people, 0.0),
            round: RoundSchedule {
                start: Distribution::Interval { min: 0.0, max: 1.0 },
                period: Distribution::Weibull { mean: 1.0, deviation: 0.1 },
                end: Some(self.end_time + 2.0),
            },
            log: Some(LogSchedule::periodic(0.0, 1.0, Some(self.end_time))),
            init,
            dimension: 3,
            connector: Connector::Radial {
                percent: self.link_percent,
                radius: self.comm,
            },
            parallel,
            synchronised: false,
            area: self.area(),
        }
    }
}
