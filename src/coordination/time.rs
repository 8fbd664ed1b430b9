// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Time-Based Blocks

use crate::field::NodeContext;

/// Number of rounds this call site has been reached, starting at 1.
#[track_caller]
pub fn counter(node: &mut NodeContext) -> u64 {
    node.call(|node| node.old(0_u64, |_, n| n + 1))
}

/// `current` when it differs from `empty`; otherwise the last non-empty
/// value for up to `tau` further rounds, then `empty`.
#[track_caller]
pub fn timed_decay<T>(node: &mut NodeContext, current: T, empty: T, tau: u32) -> T
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    node.call(|node| {
        let (value, _age) = node.old((empty.clone(), 0_u32), |_, (prev, age)| {
            if current != empty {
                (current, 0)
            } else if prev != empty && age < tau {
                (prev, age + 1)
            } else {
                (empty, age.saturating_add(1))
            }
        });
        value
    })
}
