//! Fixed-resolution cell identifiers.
//!
//! A `CellId` is a hex coordinate plus the resolution it was computed at.
//! Latitude/longitude map onto the hexagonal plane through a local
//! equirectangular projection, then round to the nearest hexagon center.

use crate::hex::HexCoord;
use crate::{Error, Result};

/// Finest supported resolution.
pub const MAX_RESOLUTION: u8 = 15;

/// Hexagon edge length at resolution 0, in kilometers.
const BASE_EDGE_KM: f64 = 1107.0;

/// Aperture-7 subdivision: each finer resolution shrinks edges by √7.
const APERTURE_FACTOR: f64 = 2.6457513110645907;

/// Kilometers per degree of latitude (spherical approximation).
const KM_PER_DEG_LAT: f64 = 110.574;

/// Kilometers per degree of longitude at the equator.
const KM_PER_DEG_LNG: f64 = 111.32;

/// A validated cell resolution in 0..=15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resolution(u8);

impl Resolution {
    /// Create a resolution, rejecting values above [`MAX_RESOLUTION`].
    pub const fn new(level: u8) -> Result<Self> {
        if level > MAX_RESOLUTION {
            return Err(Error::InvalidResolution(level));
        }
        Ok(Self(level))
    }

    /// The raw resolution level.
    pub const fn level(&self) -> u8 {
        self.0
    }

    /// Hexagon edge length at this resolution, in kilometers.
    pub fn edge_length_km(&self) -> f64 {
        BASE_EDGE_KM / APERTURE_FACTOR.powi(i32::from(self.0))
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A hexagonal cell at a fixed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellId {
    /// Resolution the cell was indexed at.
    pub resolution: Resolution,
    /// Axial coordinate of the cell center.
    pub coord: HexCoord,
}

impl CellId {
    /// Create a cell id directly from a coordinate.
    pub const fn new(resolution: Resolution, coord: HexCoord) -> Self {
        Self { resolution, coord }
    }

    /// Index a latitude/longitude pair at the given resolution.
    ///
    /// Uses a local equirectangular projection (longitude scaled by the
    /// cosine of latitude) onto a pointy-top hexagonal grid, then rounds
    /// to the nearest cell center. Pure function.
    pub fn from_lat_lng(lat: f64, lng: f64, resolution: Resolution) -> Self {
        let edge = resolution.edge_length_km();
        let x = lng * KM_PER_DEG_LNG * lat.to_radians().cos();
        let y = lat * KM_PER_DEG_LAT;

        // Cartesian → fractional axial for pointy-top hexagons.
        let qf = (3.0_f64.sqrt() / 3.0 * x - y / 3.0) / edge;
        let rf = (2.0 / 3.0 * y) / edge;

        Self {
            resolution,
            coord: round_axial(qf, rf),
        }
    }

    /// All cells at exactly `radius` steps from this cell.
    pub fn ring(&self, radius: u32) -> Vec<Self> {
        self.coord
            .ring(radius)
            .into_iter()
            .map(|coord| Self::new(self.resolution, coord))
            .collect()
    }

    /// All cells within `radius` steps of this cell, including itself.
    pub fn disk(&self, radius: u32) -> Vec<Self> {
        self.coord
            .disk(radius)
            .into_iter()
            .map(|coord| Self::new(self.resolution, coord))
            .collect()
    }

    /// Grid distance to another cell at the same resolution.
    pub fn distance(&self, other: &Self) -> u64 {
        self.coord.distance(&other.coord)
    }

    /// The containing cell one resolution coarser, or `None` at resolution 0.
    ///
    /// Computed by projecting this cell's center back to the plane and
    /// re-rounding on the coarser grid, so every fine cell maps to exactly
    /// one parent.
    pub fn parent(&self) -> Option<Self> {
        let level = self.resolution.level().checked_sub(1)?;
        let coarser = Resolution(level);

        let (x, y) = self.center_km();
        let edge = coarser.edge_length_km();
        let qf = (3.0_f64.sqrt() / 3.0 * x - y / 3.0) / edge;
        let rf = (2.0 / 3.0 * y) / edge;

        Some(Self {
            resolution: coarser,
            coord: round_axial(qf, rf),
        })
    }

    /// Cell center in projected kilometers (pointy-top axial → cartesian).
    fn center_km(&self) -> (f64, f64) {
        let edge = self.resolution.edge_length_km();
        let q = self.coord.q as f64;
        let r = self.coord.r as f64;
        let x = edge * 3.0_f64.sqrt() * (q + r / 2.0);
        let y = edge * 1.5 * r;
        (x, y)
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Compact index: resolution byte followed by the two axial
        // coordinates as sign-extended 32-bit words.
        write!(
            f,
            "{:02x}{:08x}{:08x}",
            self.resolution.level(),
            self.coord.q as i32 as u32,
            self.coord.r as i32 as u32
        )
    }
}

/// Round fractional axial coordinates to the nearest hexagon center.
///
/// Standard cube rounding: round all three cube axes, then fix the axis
/// with the largest rounding error so q + r + s = 0 holds.
fn round_axial(qf: f64, rf: f64) -> HexCoord {
    let sf = -qf - rf;

    let mut q = qf.round();
    let mut r = rf.round();
    let s = sf.round();

    let dq = (q - qf).abs();
    let dr = (r - rf).abs();
    let ds = (s - sf).abs();

    if dq > dr && dq > ds {
        q = -r - s;
    } else if dr > ds {
        r = -q - s;
    }

    HexCoord::new(q as i64, r as i64)
}
