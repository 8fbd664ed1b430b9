// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Room Field Simulation Suite ("The Room") - Gateway Map Report

use std::io::{self, Write};

use super::params::RoomParams;
use super::program::SatisfactionMap;
use crate::field::Tag;
use crate::simulation::LogAggregator;
use crate::types::{GridIndex, NodeView, SatMap, StorageValue, Time, Uid};

/// `v` in the style of a C `%g` with six significant digits.
pub fn format_general(v: f64) -> String {
    if v.is_nan() {
        return "nan".into();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf".into() } else { "-inf".into() };
    }
    if v == 0.0 {
        return "0".into();
    }
    // Exponent after rounding to six significant digits.
    let sci = format!("{:.5e}", v);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if !(-4..6).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (5 - exp) as usize;
        trim_zeros(&format!("{:.*}", decimals, v)).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// The map as text: a `T = <time>` line, then one tab-separated row per
/// grid line (ascending `y`), `*` where no reading is known.
pub fn format_map(time: Time, map: &SatMap, map_x: u32, map_y: u32) -> String {
    let mut out = format!("T = {}\n", format_general(time));
    for y in 0..map_y {
        let row: Vec<String> = (0..map_x)
            .map(|x| match map.get(&GridIndex::new(x, y)) {
                Some(v) => format_general(v),
                None => "*".to_string(),
            })
            .collect();
        out.push_str(&row.join("\t"));
        out.push('\n');
    }
    out
}

/// Prints the gateway's collected map at every log tick.
pub struct GatewayLogger<W: Write> {
    writer: W,
    gateway: Uid,
    map_x: u32,
    map_y: u32,
}

impl GatewayLogger<io::Stderr> {
    pub fn stderr(params: &RoomParams) -> Self {
        Self::new(io::stderr(), params)
    }
}

impl<W: Write> GatewayLogger<W> {
    pub fn new(writer: W, params: &RoomParams) -> Self {
        Self {
            writer,
            gateway: params.gateway,
            map_x: params.map_x_size(),
            map_y: params.map_y_size(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> LogAggregator for GatewayLogger<W> {
    fn aggregate(&mut self, time: Time, nodes: &[NodeView]) -> io::Result<()> {
        let map = nodes
            .iter()
            .find(|n| n.uid == self.gateway)
            .and_then(|n| match n.storage.get(SatisfactionMap::NAME) {
                Some(StorageValue::CellMap(m)) => Some(m.clone()),
                _ => None,
            })
            .unwrap_or_default();
        self.writer
            .write_all(format_map(time, &map, self.map_x, self.map_y).as_bytes())?;
        self.writer.flush()
    }
}
