// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Multi-Path Collection

use super::spreading::HOPS_INFINITY;
use crate::field::NodeContext;

/// Multi-path collection of `local` values toward the source of `dist`.
///
/// Parents are neighbours with a strictly smaller `dist`, children those
/// with a strictly larger one; neighbours at [`HOPS_INFINITY`] are neither.
/// Each round a node folds the contributions its children published last
/// round into `local` (ascending uid order), publishes `divide(v, parents)`
/// for its parents to pick up, and returns `v`. With no parent the node
/// publishes `zero`, so `divide` is never called with zero.
#[track_caller]
pub fn mp_collection<T, C, D>(
    node: &mut NodeContext,
    dist: u32,
    local: T,
    zero: T,
    combine: C,
    divide: D,
) -> T
where
    T: Clone + Send + Sync + 'static,
    C: Fn(T, &T) -> T,
    D: Fn(&T, usize) -> T,
{
    node.call(|node| {
        let dists = node.nbr(dist);
        let parents = if dist == HOPS_INFINITY {
            0
        } else {
            dists.count_hood(|d| *d < dist)
        };
        let mut total = None;
        node.share(zero.clone(), |_, published| {
            let v = dists
                .zip_hood(&published, |d, c| (*d, c.clone()))
                .fold_neighbors(local, |acc, _, (d, c)| {
                    if *d != HOPS_INFINITY && *d > dist {
                        combine(acc, c)
                    } else {
                        acc
                    }
                });
            let out = if parents == 0 { zero.clone() } else { divide(&v, parents) };
            total = Some(v);
            out
        });
        total.unwrap_or_else(|| zero.clone())
    })
}
