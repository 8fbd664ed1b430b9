// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Distance Spreading

use crate::field::NodeContext;

/// Hop count of a node with no path to any source.
pub const HOPS_INFINITY: u32 = u32::MAX;

/// Bound used by [`abf_hops`]. Networks with a larger diameter need
/// [`abf_hops_within`].
pub const DEFAULT_MAX_HOPS: u32 = 1024;

/// Adaptive Bellman-Ford hop distance from the nearest node where
/// `is_source` holds, or [`HOPS_INFINITY`] when no source is connected.
#[track_caller]
pub fn abf_hops(node: &mut NodeContext, is_source: bool) -> u32 {
    abf_hops_within(node, is_source, DEFAULT_MAX_HOPS)
}

/// As [`abf_hops`], with distances above `max_hops` reported as
/// [`HOPS_INFINITY`]. Once a source disappears the surviving estimates
/// climb past the bound, so the component settles on the sentinel within
/// about `max_hops` plus its diameter rounds.
#[track_caller]
pub fn abf_hops_within(node: &mut NodeContext, is_source: bool, max_hops: u32) -> u32 {
    node.call(|node| {
        node.share(HOPS_INFINITY, |_, hops| {
            if is_source {
                return 0;
            }
            match hops.min_neighbors().saturating_add(1) {
                h if h > max_hops => HOPS_INFINITY,
                h => h,
            }
        })
    })
}
