//! Axial hexagonal coordinates.
//!
//! Axial coordinates use two axes (q, r) at 60 degrees, with an implicit
//! third axis s = -q - r. Two values instead of three, same hexagonal
//! symmetry.

use std::ops::{Add, Neg, Sub};

/// A position on the hexagonal plane.
///
/// The implicit third axis is s = -q - r.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HexCoord {
    /// First axial coordinate
    pub q: i64,
    /// Second axial coordinate
    pub r: i64,
}

impl HexCoord {
    /// Origin of the coordinate system.
    pub const ORIGIN: Self = Self { q: 0, r: 0 };

    /// Create a new coordinate.
    pub const fn new(q: i64, r: i64) -> Self {
        Self { q, r }
    }

    /// Compute the implicit third axis: s = -q - r.
    pub const fn s(&self) -> i64 {
        -self.q - self.r
    }

    /// Hexagonal distance between two coordinates.
    ///
    /// max(|dq|, |dr|, |ds|) where ds = -dq - dr.
    pub fn distance(&self, other: &Self) -> u64 {
        let dq = (self.q - other.q).unsigned_abs();
        let dr = (self.r - other.r).unsigned_abs();
        let ds = ((self.q - other.q) + (self.r - other.r)).unsigned_abs();
        dq.max(dr).max(ds)
    }

    /// The six neighbor directions, counterclockwise from east.
    pub const DIRECTIONS: [Self; 6] = [
        Self { q: 1, r: 0 },   // East
        Self { q: 1, r: -1 },  // Northeast
        Self { q: 0, r: -1 },  // Northwest
        Self { q: -1, r: 0 },  // West
        Self { q: -1, r: 1 },  // Southwest
        Self { q: 0, r: 1 },   // Southeast
    ];

    /// Get all six direct neighbors.
    pub fn neighbors(&self) -> [Self; 6] {
        Self::DIRECTIONS.map(|d| *self + d)
    }

    /// All coordinates at exactly `radius` steps from `self`.
    ///
    /// Radius 0 yields just `self`; radius k yields 6k coordinates,
    /// walked edge by edge around the ring.
    pub fn ring(&self, radius: u32) -> Vec<Self> {
        if radius == 0 {
            return vec![*self];
        }
        let radius = i64::from(radius);
        let mut out = Vec::with_capacity(6 * radius as usize);
        // Start at the southwest corner of the ring, then walk each edge.
        let mut cursor = *self + Self::DIRECTIONS[4].scale(radius);
        for dir in Self::DIRECTIONS {
            for _ in 0..radius {
                out.push(cursor);
                cursor = cursor + dir;
            }
        }
        out
    }

    /// All coordinates within `radius` steps of `self`, including `self`.
    pub fn disk(&self, radius: u32) -> Vec<Self> {
        let mut out = Vec::new();
        for k in 0..=radius {
            out.extend(self.ring(k));
        }
        out
    }

    fn scale(self, factor: i64) -> Self {
        Self {
            q: self.q * factor,
            r: self.r * factor,
        }
    }
}

impl Add for HexCoord {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            q: self.q + other.q,
            r: self.r + other.r,
        }
    }
}

impl Sub for HexCoord {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self {
            q: self.q - other.q,
            r: self.r - other.r,
        }
    }
}

impl Neg for HexCoord {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self {
            q: -self.q,
            r: -self.r,
        }
    }
}

impl std::fmt::Display for HexCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}
