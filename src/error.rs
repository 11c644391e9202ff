//! Typed errors for region loading and point sampling.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning GeoJSON input into a sampling region.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("failed to read geometry file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid GeoJSON: {0}")]
    Parse(#[from] geojson::Error),

    /// The input parsed but held no Polygon or MultiPolygon geometry.
    #[error("no polygon geometry found in region '{0}'")]
    NoPolygon(String),

    /// Zero (or non-finite) area: a point, a line, or a collapsed ring.
    #[error("region '{name}' is degenerate (area {area})")]
    Degenerate { name: String, area: f64 },
}

/// Errors raised by the point sampler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    #[error("hotspot share must be within [0, 1], got {0}")]
    InvalidShare(f64),

    #[error("attempt multiplier must be at least 1")]
    ZeroAttemptMultiplier,

    #[error("hotspot {index} is invalid: {reason}")]
    InvalidHotspot { index: usize, reason: &'static str },

    /// Returned only when the caller asks for a complete sample.
    #[error("sampling fell short: produced {produced} of {requested} points")]
    Shortfall { requested: usize, produced: usize },
}
