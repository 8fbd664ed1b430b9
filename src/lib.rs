// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room")

pub mod errors;
pub mod types;
pub mod geometry;
pub mod random;

// Field-calculus runtime and the blocks built on it
pub mod field;
pub mod coordination;

// Scheduler
pub mod sequence;
pub mod connector;
pub mod config;
pub mod simulation;

pub mod room;

pub use config::SimConfig;
pub use errors::{ConfigError, FieldError, InvariantError, SimError};
pub use field::NodeContext;
pub use simulation::{LogAggregator, Program, SimStats, Simulator};
pub use types::*;

use wasm_bindgen::prelude::*;

use crate::room::{format_map, RoomParams, RoomProgram};

// ─── WASM Interface ──────────────────────────────────────────────────────────

/// Room scenario driven from JavaScript. Node listings are the read-only
/// view a renderer consumes once per frame.
#[wasm_bindgen]
pub struct RoomSimulation {
    sim: Simulator<RoomProgram>,
    seed: u32,
    preset: String,
}

fn build_room(seed: u32, preset: &str) -> Result<Simulator<RoomProgram>, JsValue> {
    let params = RoomParams::preset(preset)
        .ok_or_else(|| JsValue::from_str(&format!("unknown preset `{}`", preset)))?;
    // Workers are unavailable in the browser; rounds run sequentially.
    let config = params.sim_config(seed as u64, false);
    room::build(params, config).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
impl RoomSimulation {
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u32) -> Result<RoomSimulation, JsValue> {
        Self::with_preset(seed, "canonical")
    }

    pub fn with_preset(seed: u32, preset: &str) -> Result<RoomSimulation, JsValue> {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        Ok(Self {
            sim: build_room(seed, preset)?,
            seed,
            preset: preset.to_string(),
        })
    }

    /// Run every event up to `until`; returns the simulated time reached.
    pub fn advance(&mut self, until: f64) -> f64 {
        self.sim.run_until(until);
        self.sim.current_time()
    }

    pub fn current_time(&self) -> f64 {
        self.sim.current_time()
    }

    pub fn is_finished(&self) -> bool {
        self.sim.is_finished()
    }

    pub fn get_nodes(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.sim.nodes()).unwrap_or(JsValue::NULL)
    }

    pub fn get_stats(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.sim.stats()).unwrap_or(JsValue::NULL)
    }

    /// The gateway's collected map as a list of cells.
    pub fn gateway_map(&self) -> JsValue {
        let gateway = self.sim.program().params().gateway;
        match self.sim.storage::<room::program::SatisfactionMap>(gateway) {
            Some(map) => serde_wasm_bindgen::to_value(&map).unwrap_or(JsValue::NULL),
            None => JsValue::NULL,
        }
    }

    /// The gateway's map in the log text format.
    pub fn gateway_text(&self) -> String {
        let params = self.sim.program().params();
        let map = self
            .sim
            .storage::<room::program::SatisfactionMap>(params.gateway)
            .unwrap_or_default();
        format_map(self.sim.current_time(), &map, params.map_x_size(), params.map_y_size())
    }

    /// Reset simulation to initial state
    pub fn reset(&mut self) -> Result<(), JsValue> {
        self.sim = build_room(self.seed, &self.preset)?;
        Ok(())
    }
}
