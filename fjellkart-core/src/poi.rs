//! Canonical POI record and coordinate validation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use geo::Coord;

use crate::Category;

/// Free-form key/value details carried alongside a POI.
pub type Metadata = BTreeMap<String, String>;

/// A normalised point of interest, the only shape published to the UI.
///
/// Coordinates are WGS84 degrees. A valid POI never sits on the `0, 0`
/// sentinel, which marks unresolved coordinates upstream.
///
/// # Examples
/// ```
/// use chrono::Utc;
/// use fjellkart_core::{Category, Metadata, Poi};
///
/// let poi = Poi {
///     id: Poi::compose_id("osm", Category::Peak, "42"),
///     name: "Galdhøpiggen".into(),
///     description: "Peak (2469 m)".into(),
///     category: Category::Peak,
///     lat: 61.636,
///     lng: 8.312,
///     metadata: Metadata::new(),
///     source: "osm".into(),
///     last_updated: Utc::now(),
/// };
/// assert_eq!(poi.id, "osm:peak:42");
/// assert!(poi.has_valid_coordinates());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct Poi {
    /// Deterministic `source:category:external_id` identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Category the POI was fetched for.
    pub category: Category,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Selected source tags.
    pub metadata: Metadata,
    /// Short name of the source the record came from.
    pub source: String,
    /// When the record was normalised or last edited.
    pub last_updated: DateTime<Utc>,
}

impl Poi {
    /// Build the deterministic identifier for a record.
    #[must_use]
    pub fn compose_id(source: &str, category: Category, external_id: &str) -> String {
        format!("{source}:{category}:{external_id}")
    }

    /// Whether the coordinates are in range and not the zero/zero sentinel.
    #[must_use]
    pub fn has_valid_coordinates(&self) -> bool {
        coordinates_are_valid(self.lat, self.lng)
    }

    /// Position as a `geo` coordinate (`x = longitude`, `y = latitude`).
    #[must_use]
    pub const fn location(&self) -> Coord<f64> {
        Coord {
            x: self.lng,
            y: self.lat,
        }
    }
}

/// Check a latitude/longitude pair against WGS84 ranges and the `0, 0`
/// sentinel.
#[must_use]
pub fn coordinates_are_valid(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
        && !(lat == 0.0 && lng == 0.0)
}
