//! Geographic viewport bounds and their quantised cache form.
//!
//! Bounds are expressed as north/south/east/west degrees in WGS84. Regions
//! crossing the antimeridian are not modelled; callers must split such areas
//! before requesting POIs.

use geo::{Coord, Intersects, Rect};
use thiserror::Error;

/// Decimal places used when quantising bounds for cache keys.
pub const DEFAULT_QUANTIZE_PRECISION: u32 = 4;

/// Errors returned by [`ViewportBounds::new`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundsError {
    /// One of the edges was NaN or infinite.
    #[error("bounds must contain finite coordinates")]
    NonFinite,
    /// A latitude edge fell outside `[-90, 90]`.
    #[error("latitude {value} is outside [-90, 90]")]
    LatitudeOutOfRange {
        /// Offending latitude.
        value: f64,
    },
    /// A longitude edge fell outside `[-180, 180]`.
    #[error("longitude {value} is outside [-180, 180]")]
    LongitudeOutOfRange {
        /// Offending longitude.
        value: f64,
    },
    /// `north` was not strictly greater than `south`.
    #[error("north ({north}) must be greater than south ({south})")]
    InvertedLatitude {
        /// Northern edge.
        north: f64,
        /// Southern edge.
        south: f64,
    },
    /// `east` was not strictly greater than `west`.
    #[error("east ({east}) must be greater than west ({west})")]
    InvertedLongitude {
        /// Eastern edge.
        east: f64,
        /// Western edge.
        west: f64,
    },
}

/// The rectangular area currently visible on the map.
///
/// # Examples
/// ```
/// use fjellkart_core::ViewportBounds;
///
/// let outer = ViewportBounds::new(60.0, 59.0, 11.0, 10.0)?;
/// let inner = ViewportBounds::new(59.8, 59.2, 10.8, 10.2)?;
/// assert!(outer.contains(&inner));
/// assert!(!inner.contains(&outer));
/// # Ok::<(), fjellkart_core::BoundsError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ViewportBounds {
    north: f64,
    south: f64,
    east: f64,
    west: f64,
}

impl ViewportBounds {
    /// Validate and construct bounds from their four edges.
    ///
    /// # Errors
    ///
    /// Returns a [`BoundsError`] when an edge is non-finite, out of the WGS84
    /// range, or when the box is empty or inverted.
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self, BoundsError> {
        if [north, south, east, west].iter().any(|v| !v.is_finite()) {
            return Err(BoundsError::NonFinite);
        }
        for value in [north, south] {
            if !(-90.0..=90.0).contains(&value) {
                return Err(BoundsError::LatitudeOutOfRange { value });
            }
        }
        for value in [east, west] {
            if !(-180.0..=180.0).contains(&value) {
                return Err(BoundsError::LongitudeOutOfRange { value });
            }
        }
        if north <= south {
            return Err(BoundsError::InvertedLatitude { north, south });
        }
        if east <= west {
            return Err(BoundsError::InvertedLongitude { east, west });
        }
        Ok(Self {
            north,
            south,
            east,
            west,
        })
    }

    /// Bounds covering mainland Norway and Svalbard, used for catalogue loads.
    #[must_use]
    pub const fn norway() -> Self {
        Self {
            north: 81.0,
            south: 57.5,
            east: 31.5,
            west: 4.0,
        }
    }

    /// Northern edge in degrees latitude.
    #[must_use]
    pub const fn north(&self) -> f64 {
        self.north
    }

    /// Southern edge in degrees latitude.
    #[must_use]
    pub const fn south(&self) -> f64 {
        self.south
    }

    /// Eastern edge in degrees longitude.
    #[must_use]
    pub const fn east(&self) -> f64 {
        self.east
    }

    /// Western edge in degrees longitude.
    #[must_use]
    pub const fn west(&self) -> f64 {
        self.west
    }

    /// Whether `other` lies entirely within these bounds.
    ///
    /// Shared edges count as contained, so equal bounds contain each other.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.north >= other.north
            && self.south <= other.south
            && self.east >= other.east
            && self.west <= other.west
    }

    /// Whether the two boxes share any area or boundary.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.to_rect().intersects(&other.to_rect())
    }

    /// Whether the coordinate falls inside the box, boundary included.
    #[must_use]
    pub fn contains_point(&self, lat: f64, lng: f64) -> bool {
        // `Intersects` treats boundary points as inside the rectangle.
        self.to_rect().intersects(&Coord { x: lng, y: lat })
    }

    /// Convert to a `geo` rectangle with `x = longitude`, `y = latitude`.
    #[must_use]
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.west,
                y: self.south,
            },
            Coord {
                x: self.east,
                y: self.north,
            },
        )
    }

    /// Round each edge to `precision` decimal places.
    ///
    /// Repeated viewport reads jitter in the last few floating-point digits;
    /// quantising keeps cache comparisons stable.
    #[must_use]
    pub fn quantized(&self, precision: u32) -> QuantizedBounds {
        self.snapped(precision, Snap::Nearest, Snap::Nearest)
    }

    /// Smallest grid-aligned bounds covering these bounds.
    #[must_use]
    pub fn quantized_outward(&self, precision: u32) -> QuantizedBounds {
        self.snapped(precision, Snap::Up, Snap::Down)
    }

    /// Largest grid-aligned bounds inside these bounds.
    #[must_use]
    pub fn quantized_inward(&self, precision: u32) -> QuantizedBounds {
        self.snapped(precision, Snap::Down, Snap::Up)
    }

    fn snapped(&self, precision: u32, upper: Snap, lower: Snap) -> QuantizedBounds {
        QuantizedBounds {
            north: quantize(self.north, precision, upper),
            south: quantize(self.south, precision, lower),
            east: quantize(self.east, precision, upper),
            west: quantize(self.west, precision, lower),
            precision,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Snap {
    Nearest,
    Down,
    Up,
}

/// Scaled edges this close to a grid line are treated as lying on it.
const GRID_NOISE: f64 = 1e-6;

#[expect(
    clippy::float_arithmetic,
    clippy::cast_possible_truncation,
    reason = "edges are validated to lie within WGS84 ranges before scaling"
)]
fn quantize(value: f64, precision: u32, snap: Snap) -> i64 {
    let scale = 10_f64.powi(i32::try_from(precision).unwrap_or(i32::MAX));
    let scaled = value * scale;
    let nearest = scaled.round();
    if (scaled - nearest).abs() < GRID_NOISE {
        return nearest as i64;
    }
    let snapped = match snap {
        Snap::Nearest => nearest,
        Snap::Down => scaled.floor(),
        Snap::Up => scaled.ceil(),
    };
    snapped as i64
}

/// Viewport edges rounded to a fixed number of decimals and stored as scaled
/// integers so they can be compared and hashed exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuantizedBounds {
    north: i64,
    south: i64,
    east: i64,
    west: i64,
    precision: u32,
}

impl QuantizedBounds {
    /// Whether `other` lies entirely within these bounds.
    ///
    /// Bounds quantised at different precisions never contain each other.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.precision == other.precision
            && self.north >= other.north
            && self.south <= other.south
            && self.east >= other.east
            && self.west <= other.west
    }
}
