// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Type Definitions

use std::collections::BTreeMap;
use std::ops::{Add, Mul};

use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::geometry::Vec3;

/// Stable node identifier.
pub type Uid = u64;

/// Simulated time.
pub type Time = f64;

// ─── Grid Index ─────────────────────────────────────────────────────────────

/// Integer cell of the coarse satisfaction grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridIndex {
    pub x: u32,
    pub y: u32,
}

impl GridIndex {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Cell containing `pos` on a grid of `grain`-sized squares, clamped to
    /// `map_x × map_y` so margin positions land on the border cells.
    pub fn from_position(pos: &Vec3, grain: f64, map_x: u32, map_y: u32) -> Self {
        let cell = |v: f64, size: u32| -> u32 {
            let i = (v / grain).floor();
            if i <= 0.0 {
                0
            } else {
                (i as u32).min(size.saturating_sub(1))
            }
        };
        Self::new(cell(pos.x, map_x), cell(pos.y, map_y))
    }
}

// ─── Satisfaction Map ───────────────────────────────────────────────────────

/// One reading placed on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SatCell {
    pub index: GridIndex,
    pub value: f64,
}

/// Sparse grid of satisfaction readings, ordered by cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SatMap(BTreeMap<GridIndex, f64>);

impl SatMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn single(index: GridIndex, value: f64) -> Self {
        let mut m = Self::new();
        m.insert(index, value);
        m
    }

    pub fn insert(&mut self, index: GridIndex, value: f64) {
        self.0.insert(index, value);
    }

    pub fn get(&self, index: &GridIndex) -> Option<f64> {
        self.0.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = SatCell> + '_ {
        self.0.iter().map(|(&index, &value)| SatCell { index, value })
    }

    /// Key union where cells of `later` overwrite cells already present.
    pub fn union_later_wins(mut self, later: &SatMap) -> SatMap {
        for (k, v) in &later.0 {
            self.0.insert(*k, *v);
        }
        self
    }
}

impl FromIterator<SatCell> for SatMap {
    fn from_iter<I: IntoIterator<Item = SatCell>>(iter: I) -> Self {
        Self(iter.into_iter().map(|c| (c.index, c.value)).collect())
    }
}

// JSON object keys must be strings, so the map travels as a list of cells.
impl Serialize for SatMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for cell in self.iter() {
            seq.serialize_element(&cell)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for SatMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let cells = Vec::<SatCell>::deserialize(deserializer)?;
        Ok(cells.into_iter().collect())
    }
}

// ─── Appearance ─────────────────────────────────────────────────────────────

/// RGBA colour with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const CRIMSON: Color = Color::from_rgb(0xDC143C);
    pub const SILVER: Color = Color::from_rgb(0xC0C0C0);
    pub const DEEP_SKY_BLUE: Color = Color::from_rgb(0x00BFFF);
    pub const GOLD: Color = Color::from_rgb(0xFFD700);

    pub const fn from_rgb(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xFF) as f64 / 255.0,
            g: ((rgb >> 8) & 0xFF) as f64 / 255.0,
            b: (rgb & 0xFF) as f64 / 255.0,
            a: 1.0,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::SILVER
    }
}

impl Add for Color {
    type Output = Color;
    fn add(self, o: Color) -> Color {
        Color { r: self.r + o.r, g: self.g + o.g, b: self.b + o.b, a: self.a + o.a }
    }
}

impl Mul<Color> for f64 {
    type Output = Color;
    fn mul(self, c: Color) -> Color {
        Color { r: self * c.r, g: self * c.g, b: self * c.b, a: self * c.a }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    #[default]
    Sphere,
    Cube,
    Tetrahedron,
    Star,
}

// ─── Storage Values ─────────────────────────────────────────────────────────

/// Value shape a storage tag is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Real,
    Int,
    Bool,
    /// Ordinal of an application enum (e.g. an automaton state).
    Discrete,
    Point,
    Color,
    Shape,
    CellMap,
}

/// A value held in node storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StorageValue {
    Real(f64),
    Int(i64),
    Bool(bool),
    Discrete(u32),
    Point(Vec3),
    Color(Color),
    Shape(Shape),
    CellMap(SatMap),
}

impl StorageValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            StorageValue::Real(_) => ValueKind::Real,
            StorageValue::Int(_) => ValueKind::Int,
            StorageValue::Bool(_) => ValueKind::Bool,
            StorageValue::Discrete(_) => ValueKind::Discrete,
            StorageValue::Point(_) => ValueKind::Point,
            StorageValue::Color(_) => ValueKind::Color,
            StorageValue::Shape(_) => ValueKind::Shape,
            StorageValue::CellMap(_) => ValueKind::CellMap,
        }
    }
}

// ─── NodeView ───────────────────────────────────────────────────────────────

/// Read-only snapshot of a live node, for renderers and log aggregators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    pub uid: Uid,
    pub position: Vec3,
    pub velocity: Vec3,
    pub current_time: Time,
    pub rounds: u64,
    pub storage: BTreeMap<String, StorageValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_index_clamps_margins() {
        let idx = GridIndex::from_position(&Vec3::new(-3.0, 31.0, 0.0), 10.0, 10, 3);
        assert_eq!(idx, GridIndex::new(0, 2));
        let idx = GridIndex::from_position(&Vec3::new(100.0, 15.0, 0.0), 10.0, 10, 3);
        assert_eq!(idx, GridIndex::new(9, 1));
    }

    #[test]
    fn union_prefers_later_writer() {
        let a = SatMap::single(GridIndex::new(0, 0), 0.1);
        let mut b = SatMap::single(GridIndex::new(0, 0), 0.9);
        b.insert(GridIndex::new(1, 0), 0.5);
        let merged = a.union_later_wins(&b);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get(&GridIndex::new(0, 0)), Some(0.9));
    }

    #[test]
    fn satmap_travels_as_cell_list() {
        let mut m = SatMap::new();
        m.insert(GridIndex::new(2, 1), -0.25);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"[{"index":{"x":2,"y":1},"value":-0.25}]"#);
        let back: SatMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn colour_blend_is_linear() {
        let c = 0.5 * Color::CRIMSON + 0.5 * Color::SILVER;
        assert!((c.r - (0xDC as f64 + 0xC0 as f64) / 510.0).abs() < 1e-12);
        assert!((c.a - 1.0).abs() < 1e-12);
    }
}
