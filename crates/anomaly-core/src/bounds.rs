use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fractional digits used when coordinates are written into a query string.
pub const COORD_PRECISION: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Longitude,
    Latitude,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Longitude => f.write_str("longitude"),
            Axis::Latitude => f.write_str("latitude"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum BoundsError {
    #[error("{name} must be a finite number, got {value}")]
    NonFinite { name: &'static str, value: f64 },
    #[error("{axis} range is inverted ({min} > {max})")]
    Inverted { axis: Axis, min: f64, max: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBounds")]
/// Axis-aligned viewport rectangle in WGS84 degrees.
///
/// Edges are inclusive. Antimeridian wraparound is not represented: a
/// rectangle always satisfies `west <= east` and `south <= north`.
pub struct ViewportBounds {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
}

/// Unchecked wire form; decoding goes through [`ViewportBounds::new`].
#[derive(Deserialize)]
struct RawBounds {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
}

impl TryFrom<RawBounds> for ViewportBounds {
    type Error = BoundsError;

    fn try_from(raw: RawBounds) -> Result<Self, BoundsError> {
        Self::new(raw.west, raw.south, raw.east, raw.north)
    }
}

impl ViewportBounds {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self, BoundsError> {
        for (name, value) in [
            ("west", west),
            ("south", south),
            ("east", east),
            ("north", north),
        ] {
            if !value.is_finite() {
                return Err(BoundsError::NonFinite { name, value });
            }
        }
        if west > east {
            return Err(BoundsError::Inverted {
                axis: Axis::Longitude,
                min: west,
                max: east,
            });
        }
        if south > north {
            return Err(BoundsError::Inverted {
                axis: Axis::Latitude,
                min: south,
                max: north,
            });
        }
        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    /// Closed-interval containment test on both axes.
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        (self.west..=self.east).contains(&longitude) && (self.south..=self.north).contains(&latitude)
    }

    /// Query parameters in wire order, each formatted with
    /// [`COORD_PRECISION`] fractional digits.
    pub fn query_pairs(&self) -> [(&'static str, String); 4] {
        [
            ("minLng", format_coord(self.west)),
            ("minLat", format_coord(self.south)),
            ("maxLng", format_coord(self.east)),
            ("maxLat", format_coord(self.north)),
        ]
    }
}

impl fmt::Display for ViewportBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.p$}, {:.p$}] x [{:.p$}, {:.p$}]",
            self.west,
            self.east,
            self.south,
            self.north,
            p = COORD_PRECISION
        )
    }
}

fn format_coord(value: f64) -> String {
    format!("{value:.prec$}", prec = COORD_PRECISION)
}
