// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Neighbour Fields

use num_traits::Bounded;

use crate::types::Uid;

// ─── Field ──────────────────────────────────────────────────────────────────

/// What each aligned neighbour last published at one call site, plus the
/// node's own slot. Neighbour slots are kept densely, sorted by ascending
/// uid, which is the iteration order of every hood reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct Field<T> {
    uid: Uid,
    own: T,
    others: Vec<(Uid, T)>,
}

impl<T> Field<T> {
    /// `others` must be sorted by uid and must not contain `uid`.
    pub fn new(uid: Uid, own: T, others: Vec<(Uid, T)>) -> Self {
        debug_assert!(others.windows(2).all(|w| w[0].0 < w[1].0));
        debug_assert!(others.iter().all(|(u, _)| *u != uid));
        Self { uid, own, others }
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn own(&self) -> &T {
        &self.own
    }

    pub fn neighbors(&self) -> &[(Uid, T)] {
        &self.others
    }

    /// Number of slots, self included.
    pub fn len(&self) -> usize {
        self.others.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, uid: Uid) -> Option<&T> {
        if uid == self.uid {
            return Some(&self.own);
        }
        self.others
            .binary_search_by_key(&uid, |(u, _)| *u)
            .ok()
            .map(|i| &self.others[i].1)
    }

    /// All slots in ascending uid order, self at its uid position.
    pub fn iter(&self) -> impl Iterator<Item = (Uid, &T)> + '_ {
        let split = self.others.partition_point(|(u, _)| *u < self.uid);
        let (below, above) = self.others.split_at(split);
        below
            .iter()
            .map(|(u, v)| (*u, v))
            .chain(std::iter::once((self.uid, &self.own)))
            .chain(above.iter().map(|(u, v)| (*u, v)))
    }

    /// Elementwise `f`, purely local.
    pub fn map_hood<U>(&self, mut f: impl FnMut(&T) -> U) -> Field<U> {
        Field {
            uid: self.uid,
            own: f(&self.own),
            others: self.others.iter().map(|(u, v)| (*u, f(v))).collect(),
        }
    }

    /// Pointwise combination over the neighbours present in both fields.
    pub fn zip_hood<U, V>(&self, other: &Field<U>, mut f: impl FnMut(&T, &U) -> V) -> Field<V> {
        let mut others = Vec::with_capacity(self.others.len().min(other.others.len()));
        let (mut i, mut j) = (0, 0);
        while i < self.others.len() && j < other.others.len() {
            let (a, b) = (self.others[i].0, other.others[j].0);
            if a == b {
                others.push((a, f(&self.others[i].1, &other.others[j].1)));
                i += 1;
                j += 1;
            } else if a < b {
                i += 1;
            } else {
                j += 1;
            }
        }
        Field { uid: self.uid, own: f(&self.own, &other.own), others }
    }

    /// General reduction over every slot (self included) in ascending uid.
    pub fn fold_hood<A>(&self, init: A, mut op: impl FnMut(A, &T) -> A) -> A {
        self.iter().fold(init, |acc, (_, v)| op(acc, v))
    }

    /// Reduction over neighbour slots only, seeded with `self_val`.
    pub fn fold_neighbors<A>(&self, self_val: A, mut op: impl FnMut(A, Uid, &T) -> A) -> A {
        self.others.iter().fold(self_val, |acc, (u, v)| op(acc, *u, v))
    }

    /// Count of neighbour slots satisfying `pred`.
    pub fn count_hood(&self, mut pred: impl FnMut(&T) -> bool) -> usize {
        self.others.iter().filter(|(_, v)| pred(v)).count()
    }

    pub fn any_hood(&self, mut pred: impl FnMut(&T) -> bool) -> bool {
        self.others.iter().any(|(_, v)| pred(v))
    }
}

impl<T: HoodSum> Field<T> {
    /// Sum of all neighbour slots plus `self_val` in place of the own slot.
    pub fn sum_hood(&self, self_val: T) -> T {
        self.others.iter().fold(self_val, |acc, (_, v)| acc.hood_add(v))
    }
}

impl<T: PartialOrd + Clone> Field<T> {
    /// Minimum over neighbours and `self_val`.
    pub fn min_hood(&self, self_val: T) -> T {
        self.others
            .iter()
            .fold(self_val, |acc, (_, v)| if *v < acc { v.clone() } else { acc })
    }

    /// Maximum over neighbours and `self_val`.
    pub fn max_hood(&self, self_val: T) -> T {
        self.others
            .iter()
            .fold(self_val, |acc, (_, v)| if *v > acc { v.clone() } else { acc })
    }
}

impl<T: PartialOrd + Clone + Bounded> Field<T> {
    /// Minimum over neighbours only; `T::max_value()` when alone.
    pub fn min_neighbors(&self) -> T {
        self.min_hood(T::max_value())
    }
}

// ─── HoodSum ────────────────────────────────────────────────────────────────

/// Addition used by `sum_hood`: numeric sum, componentwise for tuples.
pub trait HoodSum: Clone {
    fn hood_add(self, other: &Self) -> Self;
}

macro_rules! numeric_hood_sum {
    ($($t:ty),*) => {
        $(impl HoodSum for $t {
            fn hood_add(self, other: &Self) -> Self {
                self + *other
            }
        })*
    };
}

numeric_hood_sum!(f32, f64, i32, i64, u32, u64, usize);

impl<A: HoodSum, B: HoodSum> HoodSum for (A, B) {
    fn hood_add(self, other: &Self) -> Self {
        (self.0.hood_add(&other.0), self.1.hood_add(&other.1))
    }
}

impl<A: HoodSum, B: HoodSum, C: HoodSum> HoodSum for (A, B, C) {
    fn hood_add(self, other: &Self) -> Self {
        (
            self.0.hood_add(&other.0),
            self.1.hood_add(&other.1),
            self.2.hood_add(&other.2),
        )
    }
}
