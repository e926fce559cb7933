use thiserror::Error;

use crate::types::{BoundingBox, DisplaySize};

/// Failures callers are expected to tell apart. Everything else travels as
/// plain `anyhow::Error`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    #[error("invalid bounding box {width}x{height}: width and height must be positive")]
    InvalidBoundingBox { width: i32, height: i32 },

    #[error("bounding box {bbox} does not fit inside the {display} display")]
    BoxOutsideDisplay { bbox: BoundingBox, display: DisplaySize },

    #[error("environment '{profile}' has no '{target}' target")]
    MissingTarget { profile: String, target: String },

    #[error("at least one image is required for stitching")]
    NothingToStitch,

    #[error("invalid stitch layout {rows}x{cols}")]
    InvalidLayout { rows: u32, cols: u32 },
}
