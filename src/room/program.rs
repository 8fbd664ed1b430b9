// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Room Program

//! Per-round behaviour of a user in the room.
//!
//! Satisfaction is the gap between the floor height (a proxy for local
//! temperature) and the user's preference. Users wander through a small
//! automaton; reporters drop their reading onto a coarse grid, readings in
//! the same cell are averaged among neighbours, kept alive for a while, and
//! collected toward the gateway.

use super::automaton::NodeState;
use super::params::RoomParams;
use crate::coordination::{abf_hops_within, follow_target, mp_collection, rectangle_walk, timed_decay};
use crate::errors::{FieldError, InvariantError};
use crate::field::{NodeContext, TagDecl};
use crate::geometry::Vec3;
use crate::simulation::Program;
use crate::storage_tags;
use crate::types::{Color, GridIndex, SatMap, Shape};

storage_tags! {
    pub Preference: f64 = "preference";
    pub Satisfaction: f64 = "satisfaction";
    pub SatisfactionMap: SatMap = "satisfaction_map";
    pub MapSize: i64 = "map_size";
    pub LocalSatmap: SatMap = "local_satmap";
    pub NodeStateTag: discrete NodeState = "node_state";
    pub NodeColor: Color = "node_color";
    pub NodeSize: f64 = "node_size";
    pub NodeShape: Shape = "node_shape";
}

/// Colour for a satisfaction reading: crimson when too warm, deep sky blue
/// when too cold, silver when content.
pub fn satisfaction_color(s: f64) -> Color {
    let k = s.abs().min(1.0);
    let tint = if s > 0.0 { Color::CRIMSON } else { Color::DEEP_SKY_BLUE };
    k * tint + (1.0 - k) * Color::SILVER
}

fn state_shape(state: NodeState) -> Shape {
    match state {
        NodeState::Sitting | NodeState::Walking => Shape::Sphere,
        NodeState::Reporting => Shape::Star,
        NodeState::Following => Shape::Tetrahedron,
        NodeState::Gateway => Shape::Cube,
    }
}

/// Average of the readings that neighbours (self included) report for the
/// same cell as `report`. Empty when not reporting.
#[track_caller]
pub fn cell_average(node: &mut NodeContext, report: Option<(GridIndex, f64)>) -> SatMap {
    node.call(|node| {
        let reports = node.nbr(report);
        match report {
            None => SatMap::new(),
            Some((cell, _)) => {
                let (sum, n) = reports.fold_hood((0.0, 0_u32), |(sum, n), r| match r {
                    Some((c, v)) if *c == cell => (sum + v, n + 1),
                    _ => (sum, n),
                });
                SatMap::single(cell, sum / n.max(1) as f64)
            }
        }
    })
}

/// Collect satisfaction maps toward the gateway along the hop gradient.
/// Cells from farther nodes overwrite nearer ones on conflict. Nodes more
/// than `max_hops` away, or cut off from the gateway, contribute nothing.
#[track_caller]
pub fn gateway_collect(node: &mut NodeContext, local: SatMap, is_gateway: bool, max_hops: u32) -> SatMap {
    node.call(|node| {
        let hops = abf_hops_within(node, is_gateway, max_hops);
        mp_collection(
            node,
            hops,
            local,
            SatMap::new(),
            |acc, m| acc.union_later_wins(m),
            |m, _| m.clone(),
        )
    })
}

/// The room scenario as a simulator program.
#[derive(Debug, Clone)]
pub struct RoomProgram {
    params: RoomParams,
}

impl RoomProgram {
    pub fn new(params: RoomParams) -> Result<Self, InvariantError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &RoomParams {
        &self.params
    }

    /// Tuple store the program expects.
    pub fn tag_decls() -> Vec<TagDecl> {
        vec![
            TagDecl::of::<Preference>(),
            TagDecl::of::<Satisfaction>(),
            TagDecl::of::<SatisfactionMap>(),
            TagDecl::of::<MapSize>(),
            TagDecl::of::<LocalSatmap>(),
            TagDecl::of::<NodeStateTag>(),
            TagDecl::of::<NodeColor>(),
            TagDecl::of::<NodeSize>(),
            TagDecl::of::<NodeShape>(),
        ]
    }
}

impl Program for RoomProgram {
    fn tags(&self) -> Vec<TagDecl> {
        Self::tag_decls()
    }

    fn round(&self, node: &mut NodeContext) -> Result<(), FieldError> {
        let p = &self.params;
        let here = node.position();
        let preference = node.get::<Preference>()?.unwrap_or(0.5);
        let s = here.y / p.height - preference;
        node.set::<Satisfaction>(s)?;
        node.set::<NodeColor>(satisfaction_color(s))?;

        let is_gateway = node.uid() == p.gateway;
        let initial = if is_gateway { NodeState::Gateway } else { NodeState::Sitting };
        let state = node.old(initial, |node, prev| p.transitions.step(prev, node.next_int(99)));
        node.set::<NodeStateTag>(state)?;
        node.set::<NodeShape>(state_shape(state))?;
        node.set::<NodeSize>(if is_gateway { 2.0 * p.node_size } else { p.node_size })?;

        // Motion, aligned per state so walk targets and latches stay private.
        node.scope(state as u64, |node| match state {
            NodeState::Sitting | NodeState::Reporting | NodeState::Gateway => {
                node.set_velocity(Vec3::ZERO);
            }
            NodeState::Walking => {
                let low = Vec3::new(0.0, 0.0, p.tall);
                let high = Vec3::new(p.width, p.height, p.tall);
                rectangle_walk(node, low, high, p.walk_reach, p.walk_speed);
            }
            NodeState::Following => {
                // Head for the row where the floor matches the preference.
                let target = node.constant(Vec3::new(here.x, preference * p.height, p.tall));
                follow_target(node, target, 1.0, p.walk_speed);
            }
        });

        let report = (state == NodeState::Reporting).then(|| {
            let cell = GridIndex::from_position(&here, p.grain, p.map_x_size(), p.map_y_size());
            (cell, s)
        });
        let local = cell_average(node, report);
        let local = timed_decay(node, local, SatMap::new(), p.decay_rounds());
        node.set::<LocalSatmap>(local.clone())?;

        // No path among `people` nodes is longer than `people - 1` hops.
        let max_hops = u32::try_from(p.people).unwrap_or(u32::MAX);
        let map = gateway_collect(node, local, is_gateway, max_hops);
        node.set::<MapSize>(map.len() as i64)?;
        node.set::<SatisfactionMap>(map)?;
        Ok(())
    }
}
