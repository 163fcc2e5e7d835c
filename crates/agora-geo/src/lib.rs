//! Agora Geospatial Index
//!
//! Maps geographic coordinates onto fixed-resolution hexagonal cells and
//! enumerates neighbor rings. Hexagons blur exact submitter positions into
//! areas while keeping adjacency math exact.
//!
//! # Coordinate system
//!
//! Cells use axial coordinates (q, r) with an implicit third axis
//! s = -q - r. Resolution selects the hexagon edge length; each finer
//! resolution shrinks the edge by a factor of √7, mirroring the aperture-7
//! subdivision used by production hexagonal indexes.
//!
//! # Example
//!
//! ```
//! use agora_geo::{CellId, Resolution};
//!
//! let res = Resolution::new(9).unwrap();
//! let cell = CellId::from_lat_lng(52.52, 13.405, res);
//! let ring = cell.ring(1);
//! assert_eq!(ring.len(), 6);
//! ```

mod cell;
mod hex;

pub use cell::{CellId, Resolution, MAX_RESOLUTION};
pub use hex::HexCoord;

use thiserror::Error;

/// Result type for geospatial operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in geospatial indexing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Resolution outside the supported 0..=15 range.
    #[error("invalid resolution {0}, expected 0..={MAX_RESOLUTION}")]
    InvalidResolution(u8),
}
