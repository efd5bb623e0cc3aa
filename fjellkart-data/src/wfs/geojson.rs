//! GeoJSON feature collection decoding.
//!
//! Point features keep their position. Lines and polygons are reduced to a
//! [`geo::Centroid`] so downstream code only ever sees a single coordinate.

use fjellkart_core::{Centroid, ElementKind, RawRecord, Tags};
use geo::{
    Centroid as _, Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point,
    Polygon,
};
use serde::Deserialize;
use serde_json::{Map, Value};

type Position = Vec<f64>;

#[derive(Debug, Deserialize)]
pub(super) struct FeatureCollectionDto {
    #[serde(default)]
    features: Vec<FeatureDto>,
}

#[derive(Debug, Deserialize)]
struct FeatureDto {
    id: Option<Value>,
    geometry: Option<GeometryDto>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeometryDto {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    #[serde(other)]
    Unsupported,
}

impl FeatureCollectionDto {
    pub(super) fn into_records(self) -> Vec<RawRecord> {
        self.features.into_iter().map(FeatureDto::into_record).collect()
    }
}

impl FeatureDto {
    fn into_record(self) -> RawRecord {
        let tags = self.properties.map(properties_to_tags).unwrap_or_default();
        let external_id = self.id.as_ref().and_then(id_text);
        let mut record = RawRecord {
            external_id,
            kind: ElementKind::Point,
            lat: None,
            lon: None,
            centroid: None,
            tags,
        };
        match self.geometry {
            Some(GeometryDto::Point { coordinates }) => {
                if let Some(point) = coord(&coordinates) {
                    record.lat = Some(point.y);
                    record.lon = Some(point.x);
                }
            }
            Some(geometry) => {
                record.kind = geometry.kind();
                record.centroid = geometry.centroid();
            }
            None => {}
        }
        record
    }
}

impl GeometryDto {
    const fn kind(&self) -> ElementKind {
        match self {
            Self::Point { .. } => ElementKind::Point,
            Self::LineString { .. } | Self::Polygon { .. } => ElementKind::Way,
            Self::MultiPoint { .. }
            | Self::MultiLineString { .. }
            | Self::MultiPolygon { .. }
            | Self::Unsupported => ElementKind::Relation,
        }
    }

    fn centroid(&self) -> Option<Centroid> {
        let geometry = self.to_geometry()?;
        geometry.centroid().map(|point| Centroid {
            lat: point.y(),
            lon: point.x(),
        })
    }

    fn to_geometry(&self) -> Option<Geometry<f64>> {
        Some(match self {
            Self::Point { coordinates } => Geometry::Point(Point::from(coord(coordinates)?)),
            Self::MultiPoint { coordinates } => Geometry::MultiPoint(MultiPoint::new(
                coordinates.iter().filter_map(|p| coord(p)).map(Point::from).collect(),
            )),
            Self::LineString { coordinates } => Geometry::LineString(line(coordinates)),
            Self::MultiLineString { coordinates } => Geometry::MultiLineString(
                MultiLineString::new(coordinates.iter().map(|l| line(l)).collect()),
            ),
            Self::Polygon { coordinates } => Geometry::Polygon(polygon(coordinates)?),
            Self::MultiPolygon { coordinates } => Geometry::MultiPolygon(MultiPolygon::new(
                coordinates.iter().filter_map(|rings| polygon(rings)).collect(),
            )),
            Self::Unsupported => return None,
        })
    }
}

fn coord(position: &[f64]) -> Option<Coord<f64>> {
    match position {
        [x, y, ..] => Some(Coord { x: *x, y: *y }),
        _ => None,
    }
}

fn line(positions: &[Position]) -> LineString<f64> {
    positions.iter().filter_map(|p| coord(p)).collect()
}

fn polygon(rings: &[Vec<Position>]) -> Option<Polygon<f64>> {
    let (exterior, interiors) = rings.split_first()?;
    Some(Polygon::new(
        line(exterior),
        interiors.iter().map(|ring| line(ring)).collect(),
    ))
}

fn id_text(id: &Value) -> Option<String> {
    match id {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_owned()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Flatten scalar properties into tags; nested values are dropped.
fn properties_to_tags(properties: Map<String, Value>) -> Tags {
    properties
        .into_iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::String(text) => text,
                Value::Number(number) => number.to_string(),
                Value::Bool(flag) => flag.to_string(),
                Value::Null | Value::Array(_) | Value::Object(_) => return None,
            };
            Some((key, text))
        })
        .collect()
}
