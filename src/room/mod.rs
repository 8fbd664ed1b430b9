// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Room Scenario

pub mod automaton;
pub mod params;
pub mod program;
pub mod report;

pub use automaton::{NodeState, TransitionMatrix};
pub use params::RoomParams;
pub use program::{cell_average, gateway_collect, satisfaction_color, RoomProgram};
pub use report::{format_general, format_map, GatewayLogger};

use crate::config::SimConfig;
use crate::errors::SimError;
use crate::simulation::Simulator;

/// Room simulator for `params` under `config` (usually
/// [`RoomParams::sim_config`]).
pub fn build(params: RoomParams, config: SimConfig) -> Result<Simulator<RoomProgram>, SimError> {
    let program = RoomProgram::new(params)?;
    Simulator::new(config, program)
}
