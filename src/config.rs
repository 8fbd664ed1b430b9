// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Simulation Configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::connector::Connector;
use crate::errors::ConfigError;
use crate::field::storage::TagDecl;
use crate::geometry::{Area, Vec3};
use crate::random::Distribution;
use crate::sequence::{LogSchedule, RoundSchedule, SpawnSchedule};
use crate::types::{Time, ValueKind};

/// Initial attributes of spawned nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitConfig {
    /// Corners of the box spawn positions are drawn from.
    pub position_low: Vec3,
    pub position_high: Vec3,
    /// Real-valued storage tags and the distribution each starts from.
    #[serde(default)]
    pub reals: BTreeMap<String, Distribution>,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            position_low: Vec3::ZERO,
            position_high: Vec3::ZERO,
            reals: BTreeMap::new(),
        }
    }
}

/// Everything the simulator needs besides the program itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub seed: u64,
    pub end_time: Time,
    pub tuple_store: Vec<TagDecl>,
    pub spawn: SpawnSchedule,
    pub round: RoundSchedule,
    pub log: Option<LogSchedule>,
    pub init: InitConfig,
    pub dimension: u8,
    pub connector: Connector,
    pub parallel: bool,
    pub synchronised: bool,
    pub area: Area,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            end_time: 100.0,
            tuple_store: Vec::new(),
            spawn: SpawnSchedule::default(),
            round: RoundSchedule::default(),
            log: None,
            init: InitConfig::default(),
            dimension: 2,
            connector: Connector::default(),
            parallel: false,
            synchronised: false,
            area: Area::new(0.0, 0.0, 100.0, 100.0),
        }
    }
}

impl SimConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks that do not depend on the program's tag set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.end_time.is_finite() && self.end_time >= 0.0) {
            return Err(ConfigError::InvalidSchedule("end time must be finite and non-negative"));
        }
        if !matches!(self.dimension, 2 | 3) {
            return Err(ConfigError::InvalidDimension(self.dimension));
        }
        if !self.area.is_valid() {
            return Err(ConfigError::InvalidArea);
        }
        self.connector.validate()?;
        self.spawn.validate()?;
        self.round.validate()?;
        if let Some(log) = &self.log {
            log.validate()?;
        }
        for (tag, dist) in &self.init.reals {
            dist.validate()?;
            let declared = self
                .tuple_store
                .iter()
                .find(|d| &d.name == tag)
                .ok_or_else(|| ConfigError::UndeclaredTag(tag.clone()))?;
            if declared.kind != ValueKind::Real {
                return Err(ConfigError::KindMismatch {
                    tag: tag.clone(),
                    declared: declared.kind,
                    used: ValueKind::Real,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_roundtrip_keeps_fields() {
        let mut config = SimConfig {
            seed: 42,
            tuple_store: vec![TagDecl::new("preference", ValueKind::Real)],
            connector: Connector::Radial { percent: 80, radius: 25.0 },
            ..SimConfig::default()
        };
        config
            .init
            .reals
            .insert("preference".into(), Distribution::Interval { min: 0.0, max: 1.0 });
        let json = config.to_json().unwrap();
        let back = SimConfig::from_json(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = SimConfig::from_json(r#"{"seed": 7, "dimension": 3}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.dimension, 3);
        assert!(!config.parallel);
    }

    #[test]
    fn init_tag_must_be_declared_real() {
        let mut config = SimConfig::default();
        config.init.reals.insert("mood".into(), Distribution::Constant { value: 1.0 });
        assert!(matches!(config.validate(), Err(ConfigError::UndeclaredTag(_))));
        config.tuple_store.push(TagDecl::new("mood", ValueKind::Int));
        assert!(matches!(config.validate(), Err(ConfigError::KindMismatch { .. })));
    }

    #[test]
    fn bad_dimension_and_json_are_reported() {
        assert!(matches!(
            SimConfig::from_json(r#"{"dimension": 4}"#),
            Err(ConfigError::InvalidDimension(4))
        ));
        assert!(matches!(SimConfig::from_json("{"), Err(ConfigError::Json(_))));
    }
}
