//! Map-ready summaries of a filtered order set. Drawing happens in the
//! browser; this only decides what to draw and where to look.

use crate::types::OrderRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Where the map looks when nothing matches the filters.
pub const DEFAULT_CENTER: [f64; 2] = [52.260853, 104.282274];
pub const DEFAULT_ZOOM: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapMode {
    #[default]
    Points,
    Heatmap,
    Clusters,
}

impl FromStr for MapMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "points" => Ok(MapMode::Points),
            "heatmap" => Ok(MapMode::Heatmap),
            "clusters" => Ok(MapMode::Clusters),
            other => Err(format!(
                "unknown map mode '{}', expected points, heatmap or clusters",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Viewport {
    /// `[latitude, longitude]`
    pub center: [f64; 2],
    pub zoom: u8,
    /// South-west and north-east corners, each `[latitude, longitude]`.
    pub bounds: Option<[[f64; 2]; 2]>,
}

impl Viewport {
    /// Centers on the mean position and fits the extent of `orders`.
    pub fn fit(orders: &[&OrderRecord]) -> Self {
        if orders.is_empty() {
            return Self { center: DEFAULT_CENTER, zoom: DEFAULT_ZOOM, bounds: None };
        }

        let n = orders.len() as f64;
        let mut sum = [0.0, 0.0];
        let mut sw = [f64::INFINITY, f64::INFINITY];
        let mut ne = [f64::NEG_INFINITY, f64::NEG_INFINITY];
        for o in orders {
            sum[0] += o.latitude;
            sum[1] += o.longitude;
            sw = [sw[0].min(o.latitude), sw[1].min(o.longitude)];
            ne = [ne[0].max(o.latitude), ne[1].max(o.longitude)];
        }

        Self {
            center: [sum[0] / n, sum[1] / n],
            zoom: DEFAULT_ZOOM,
            bounds: Some([sw, ne]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatCell {
    pub latitude: f64,
    pub longitude: f64,
    /// Order count relative to the busiest cell, in `(0, 1]`.
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub latitude: f64,
    pub longitude: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MapLayer {
    Points { orders: Vec<OrderRecord> },
    Heatmap { cells: Vec<HeatCell> },
    Clusters { clusters: Vec<Cluster> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub mode: MapMode,
    pub count: usize,
    pub viewport: Viewport,
    pub layer: MapLayer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSettings {
    pub heatmap_cell_deg: f64,
    pub cluster_cell_deg: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self { heatmap_cell_deg: 0.005, cluster_cell_deg: 0.01 }
    }
}

pub fn build_view(mode: MapMode, orders: &[&OrderRecord], grid: GridSettings) -> MapView {
    let layer = match mode {
        MapMode::Points => MapLayer::Points {
            orders: orders.iter().map(|o| (*o).clone()).collect(),
        },
        MapMode::Heatmap => MapLayer::Heatmap { cells: heat_cells(orders, grid.heatmap_cell_deg) },
        MapMode::Clusters => MapLayer::Clusters { clusters: clusters(orders, grid.cluster_cell_deg) },
    };

    MapView {
        mode,
        count: orders.len(),
        viewport: Viewport::fit(orders),
        layer,
    }
}

type CellKey = (i64, i64);

fn cell_of(o: &OrderRecord, cell: f64) -> CellKey {
    ((o.latitude / cell).floor() as i64, (o.longitude / cell).floor() as i64)
}

fn heat_cells(orders: &[&OrderRecord], cell: f64) -> Vec<HeatCell> {
    let mut counts: BTreeMap<CellKey, usize> = BTreeMap::new();
    for o in orders {
        *counts.entry(cell_of(o, cell)).or_default() += 1;
    }

    let busiest = counts.values().copied().max().unwrap_or(1) as f64;
    counts
        .into_iter()
        .map(|((row, col), count)| HeatCell {
            latitude: (row as f64 + 0.5) * cell,
            longitude: (col as f64 + 0.5) * cell,
            weight: count as f64 / busiest,
        })
        .collect()
}

fn clusters(orders: &[&OrderRecord], cell: f64) -> Vec<Cluster> {
    // (sum latitude, sum longitude, count)
    let mut acc: BTreeMap<CellKey, (f64, f64, usize)> = BTreeMap::new();
    for o in orders {
        let entry = acc.entry(cell_of(o, cell)).or_insert((0.0, 0.0, 0));
        entry.0 += o.latitude;
        entry.1 += o.longitude;
        entry.2 += 1;
    }

    acc.into_values()
        .map(|(lat, lon, count)| Cluster {
            latitude: lat / count as f64,
            longitude: lon / count as f64,
            count,
        })
        .collect()
}
