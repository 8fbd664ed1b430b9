// Room Simulation Summary
// Closing statistics for a finished run, as a console table and as JSON.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use room_engine::room::program::{NodeStateTag, Satisfaction, SatisfactionMap};
use room_engine::room::RoomProgram;
use room_engine::{SimStats, Simulator};

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub preset: String,
    pub seed: u64,
    pub end_time: f64,
    pub wall_ms: u128,
    pub stats: SimStats,
    pub mean_abs_satisfaction: f64,
    /// Cells known at the gateway out of the full grid.
    pub gateway_cells: usize,
    pub grid_cells: usize,
    pub states: BTreeMap<String, usize>,
}

impl RunSummary {
    pub fn collect(sim: &Simulator<RoomProgram>, preset: String, elapsed: Duration) -> Self {
        let params = sim.program().params();
        let uids: Vec<u64> = sim.nodes().iter().map(|n| n.uid).collect();

        let readings: Vec<f64> = uids
            .iter()
            .filter_map(|&uid| sim.storage::<Satisfaction>(uid))
            .collect();
        let mean_abs_satisfaction = if readings.is_empty() {
            0.0
        } else {
            readings.iter().map(|s| s.abs()).sum::<f64>() / readings.len() as f64
        };

        let mut states = BTreeMap::new();
        for &uid in &uids {
            if let Some(state) = sim.storage::<NodeStateTag>(uid) {
                *states.entry(state.name().to_string()).or_insert(0) += 1;
            }
        }

        Self {
            preset,
            seed: sim.config().seed,
            end_time: sim.current_time(),
            wall_ms: elapsed.as_millis(),
            stats: sim.stats(),
            mean_abs_satisfaction,
            gateway_cells: sim
                .storage::<SatisfactionMap>(params.gateway)
                .map_or(0, |m| m.len()),
            grid_cells: (params.map_x_size() * params.map_y_size()) as usize,
            states,
        }
    }

    pub fn print(&self) {
        println!("\n  Room Simulation Summary ({} preset, seed {})", self.preset, self.seed);
        println!("  {}", "-".repeat(48));
        println!("  {:<28} {:>18.3}", "Simulated time", self.end_time);
        println!("  {:<28} {:>18}", "Wall time (ms)", self.wall_ms);
        println!("  {:<28} {:>18}", "Nodes", self.stats.nodes);
        println!("  {:<28} {:>18}", "Rounds", self.stats.rounds);
        println!("  {:<28} {:>18}", "Messages", self.stats.messages);
        println!("  {:<28} {:>18}", "Dropped links", self.stats.dropped_links);
        println!("  {:<28} {:>18}", "Alignment violations", self.stats.alignment_violations);
        println!("  {:<28} {:>18}", "Failed rounds", self.stats.failed_rounds);
        println!("  {:<28} {:>18.4}", "Mean |satisfaction|", self.mean_abs_satisfaction);
        println!(
            "  {:<28} {:>18}",
            "Gateway map coverage",
            format!("{}/{}", self.gateway_cells, self.grid_cells)
        );
        for (state, count) in &self.states {
            println!("  {:<28} {:>18}", format!("  {}", state), count);
        }
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }
}
