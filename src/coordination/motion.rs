// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Motion

use crate::field::NodeContext;
use crate::geometry::{random_rectangle_point, Vec3};

/// Head for `target` at `speed` units per time unit, stopping once within
/// `reach`. Returns the current distance to the target.
pub fn follow_target(node: &mut NodeContext, target: Vec3, reach: f64, speed: f64) -> f64 {
    let delta = target - node.position();
    let distance = delta.norm();
    if distance <= reach {
        node.set_velocity(Vec3::ZERO);
    } else {
        node.set_velocity(delta.with_length(speed));
    }
    distance
}

/// Random waypoint walk inside the box `[low, high]`: follows a target and
/// draws a fresh uniform one whenever the current is within `reach`.
/// Returns the distance to the target being followed.
#[track_caller]
pub fn rectangle_walk(node: &mut NodeContext, low: Vec3, high: Vec3, reach: f64, speed: f64) -> f64 {
    node.call(|node| {
        let here = node.position();
        let target = node.old(None::<Vec3>, |node, prev| match prev {
            Some(t) if (t - here).norm() > reach => Some(t),
            _ => Some(random_rectangle_point(node.rng(), low, high)),
        });
        follow_target(node, target.unwrap_or(here), reach, speed)
    })
}
