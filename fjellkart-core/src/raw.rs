//! Source-specific records prior to normalisation.

use std::collections::BTreeMap;

/// Raw key/value tags attached to a source record.
pub type Tags = BTreeMap<String, String>;

/// Geometry kind of the upstream element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// A single coordinate.
    Point,
    /// A line or closed area.
    Way,
    /// A composite of other elements.
    Relation,
}

impl ElementKind {
    /// Lowercase name, matching Overpass element types.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Point => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

/// Representative point computed for a non-point geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// One record as returned by a source adapter.
///
/// Adapters fill in what the upstream payload provides; validation happens in
/// the normaliser, which silently rejects incomplete records.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Upstream identifier, unique within one source.
    pub external_id: Option<String>,
    /// Geometry kind.
    pub kind: ElementKind,
    /// Latitude for point records.
    pub lat: Option<f64>,
    /// Longitude for point records.
    pub lon: Option<f64>,
    /// Centre for ways and relations.
    pub centroid: Option<Centroid>,
    /// Upstream tags.
    pub tags: Tags,
}

impl RawRecord {
    /// Build a point record with the given id, position and tags.
    ///
    /// # Examples
    /// ```
    /// use fjellkart_core::{RawRecord, Tags};
    ///
    /// let record = RawRecord::point("7", 59.9, 10.7, Tags::new());
    /// assert_eq!(record.coordinates(), Some((59.9, 10.7)));
    /// ```
    pub fn point(external_id: impl Into<String>, lat: f64, lon: f64, tags: Tags) -> Self {
        Self {
            external_id: Some(external_id.into()),
            kind: ElementKind::Point,
            lat: Some(lat),
            lon: Some(lon),
            centroid: None,
            tags,
        }
    }

    /// Resolve `(lat, lon)`, preferring explicit coordinates over the centroid.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            return Some((lat, lon));
        }
        self.centroid.map(|centre| (centre.lat, centre.lon))
    }

    /// Look up a tag value, ignoring blank values.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}
