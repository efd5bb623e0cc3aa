//! DTOs for decoding Overpass JSON responses.
//!
//! Elements decode into these transport DTOs first, then map into
//! [`RawRecord`]s in one pass. Missing coordinates are left for the
//! normaliser to reject.

use fjellkart_core::{Centroid, ElementKind, RawRecord, Tags};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct OverpassResponseDto {
    #[serde(default)]
    pub(super) elements: Vec<OverpassElementDto>,
    /// Set when the server aborted the query, for example on its own timeout.
    pub(super) remark: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OverpassElementDto {
    #[serde(rename = "type")]
    element_type: String,
    id: Option<i64>,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenterDto>,
    #[serde(default)]
    tags: Tags,
}

#[derive(Debug, Deserialize)]
struct OverpassCenterDto {
    lat: f64,
    lon: f64,
}

impl OverpassResponseDto {
    pub(super) fn into_records(self) -> Vec<RawRecord> {
        self.elements
            .into_iter()
            .filter_map(OverpassElementDto::into_record)
            .collect()
    }
}

impl OverpassElementDto {
    /// Map to a record, skipping element types other than node, way and relation.
    fn into_record(self) -> Option<RawRecord> {
        let kind = match self.element_type.as_str() {
            "node" => ElementKind::Point,
            "way" => ElementKind::Way,
            "relation" => ElementKind::Relation,
            _ => return None,
        };
        Some(RawRecord {
            external_id: self.id.map(|id| external_id(kind, id)),
            kind,
            lat: self.lat,
            lon: self.lon,
            centroid: self
                .center
                .map(|center| Centroid {
                    lat: center.lat,
                    lon: center.lon,
                }),
            tags: self.tags,
        })
    }
}

/// Nodes keep the bare numeric id; ways and relations are prefixed so ids
/// stay unique across element types.
fn external_id(kind: ElementKind, id: i64) -> String {
    match kind {
        ElementKind::Point => id.to_string(),
        ElementKind::Way => format!("w{id}"),
        ElementKind::Relation => format!("r{id}"),
    }
}
