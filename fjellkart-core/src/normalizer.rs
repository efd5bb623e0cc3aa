//! Turn source-specific raw records into canonical [`Poi`]s.
//!
//! Normalisation is total over valid input and silent over invalid input:
//! a record that cannot become a POI yields a [`Rejection`] which the
//! pipeline counts without logging each occurrence.

use std::sync::Arc;

use mockable::DefaultClock;
use thiserror::Error;

use crate::{
    Category, Metadata, Poi, RawRecord, SharedClock, SourceKind, poi::coordinates_are_valid, rules,
};

/// Tags copied verbatim into [`Poi::metadata`] when present.
pub const METADATA_KEYS: &[&str] = &[
    "website",
    "url",
    "opening_hours",
    "ele",
    "operator",
    "phone",
    "fee",
    "capacity",
    "access",
    "wheelchair",
    "height",
    "bunker_type",
    "denomination",
    "heritage",
    "addr:city",
];

/// Why a raw record was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The record carried no upstream identifier.
    #[error("record has no external id")]
    MissingExternalId,
    /// Neither explicit coordinates nor a centroid were present.
    #[error("record has no coordinates")]
    MissingCoordinates,
    /// Coordinates were out of range, non-finite or the zero/zero sentinel.
    #[error("record has invalid coordinates")]
    InvalidCoordinates,
}

/// Locale preferences for name and description lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizerConfig {
    locales: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            locales: ["nb", "no", "nn", "en"].map(str::to_owned).to_vec(),
        }
    }
}

impl NormalizerConfig {
    /// Create a configuration with the default Norwegian-first locale order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the locale order, most specific first.
    #[must_use]
    pub fn with_locales<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locales = locales.into_iter().map(Into::into).collect();
        self
    }

    /// Locale order used for lookups.
    #[must_use]
    pub fn locales(&self) -> &[String] {
        &self.locales
    }
}

/// Converts [`RawRecord`]s into [`Poi`]s.
///
/// # Examples
/// ```
/// use fjellkart_core::{Category, Normalizer, RawRecord, SourceKind, Tags};
///
/// let normalizer = Normalizer::default();
/// let tags = Tags::from([("name:nb".to_owned(), "Fjellstua".to_owned())]);
/// let record = RawRecord::point("12", 61.5, 9.1, tags);
/// let poi = normalizer.normalize(&record, Category::AlpineHut, SourceKind::Overpass)?;
/// assert_eq!(poi.id, "osm:alpine_hut:12");
/// assert_eq!(poi.name, "Fjellstua");
/// # Ok::<(), fjellkart_core::Rejection>(())
/// ```
#[derive(Clone)]
pub struct Normalizer {
    config: NormalizerConfig,
    clock: SharedClock,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default(), Arc::new(DefaultClock))
    }
}

impl std::fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Normalizer {
    /// Create a normaliser stamping POIs with times from `clock`.
    #[must_use]
    pub fn new(config: NormalizerConfig, clock: SharedClock) -> Self {
        Self { config, clock }
    }

    /// Normalise one record fetched for `category` from `source`.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] when the record lacks an id or usable
    /// coordinates.
    pub fn normalize(
        &self,
        raw: &RawRecord,
        category: Category,
        source: SourceKind,
    ) -> Result<Poi, Rejection> {
        let external_id = raw
            .external_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(Rejection::MissingExternalId)?;
        let (lat, lng) = raw.coordinates().ok_or(Rejection::MissingCoordinates)?;
        if !coordinates_are_valid(lat, lng) {
            return Err(Rejection::InvalidCoordinates);
        }

        Ok(Poi {
            id: Poi::compose_id(source.id_prefix(), category, external_id),
            name: self.resolve_name(raw, category),
            description: self.resolve_description(raw, category),
            category,
            lat,
            lng,
            metadata: metadata(raw, source),
            source: source.id_prefix().to_owned(),
            last_updated: self.clock.utc(),
        })
    }

    fn resolve_name(&self, raw: &RawRecord, category: Category) -> String {
        self.localised(raw, "name")
            .or_else(|| ["name", "official_name", "alt_name"].into_iter().find_map(|key| raw.tag(key)))
            .map_or_else(|| rules::label(category, &raw.tags), str::to_owned)
    }

    fn resolve_description(&self, raw: &RawRecord, category: Category) -> String {
        self.localised(raw, "description")
            .or_else(|| raw.tag("description"))
            .map_or_else(|| rules::describe(category, &raw.tags), str::to_owned)
    }

    fn localised<'a>(&self, raw: &'a RawRecord, key: &str) -> Option<&'a str> {
        self.config
            .locales
            .iter()
            .find_map(|locale| raw.tag(&format!("{key}:{locale}")))
    }
}

fn metadata(raw: &RawRecord, source: SourceKind) -> Metadata {
    let mut metadata: Metadata = METADATA_KEYS
        .iter()
        .filter_map(|key| raw.tag(key).map(|value| ((*key).to_owned(), value.to_owned())))
        .collect();
    if source == SourceKind::Overpass {
        metadata.insert("osm_type".to_owned(), raw.kind.as_str().to_owned());
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Centroid, ElementKind, Tags};
    use chrono::{DateTime, Local, TimeZone, Utc};
    use mockable::Clock;
    use rstest::{fixture, rstest};

    struct StillClock(DateTime<Utc>);

    impl Clock for StillClock {
        fn local(&self) -> DateTime<Local> {
            self.0.with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[fixture]
    fn normalizer() -> Normalizer {
        Normalizer::new(NormalizerConfig::default(), Arc::new(StillClock(instant())))
    }

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[rstest]
    fn builds_deterministic_poi(normalizer: Normalizer) {
        let record = RawRecord::point("1001", 59.5, 10.5, tags(&[("name", "Bogstad")]));
        let first = normalizer
            .normalize(&record, Category::CampingSite, SourceKind::Overpass)
            .expect("valid record");
        let second = normalizer
            .normalize(&record, Category::CampingSite, SourceKind::Overpass)
            .expect("valid record");
        assert_eq!(first, second);
        assert_eq!(first.id, "osm:camping_site:1001");
        assert_eq!(first.source, "osm");
        assert_eq!(first.last_updated, instant());
    }

    #[rstest]
    #[case(&[("name:en", "Lodge"), ("name:nn", "Hytta"), ("name", "Hytte")], "Hytta")]
    #[case(&[("name:en", "Lodge"), ("name", "Hytte")], "Lodge")]
    #[case(&[("name", "Hytte"), ("official_name", "Den Norske Hytte")], "Hytte")]
    #[case(&[("official_name", "Den Norske Hytte"), ("alt_name", "DNH")], "Den Norske Hytte")]
    #[case(&[("alt_name", "DNH")], "DNH")]
    #[case(&[("name", "  "), ("addr:city", "Lom")], "Mountain lodge in Lom")]
    fn name_resolution_order(
        normalizer: Normalizer,
        #[case] pairs: &[(&str, &str)],
        #[case] expected: &str,
    ) {
        let record = RawRecord::point("5", 61.8, 8.5, tags(pairs));
        let poi = normalizer
            .normalize(&record, Category::AlpineHut, SourceKind::Overpass)
            .expect("valid record");
        assert_eq!(poi.name, expected);
    }

    #[rstest]
    fn custom_locale_order_is_respected() {
        let english_first = Normalizer::new(
            NormalizerConfig::new().with_locales(["en", "nb"]),
            Arc::new(StillClock(instant())),
        );
        let record = RawRecord::point(
            "5",
            61.8,
            8.5,
            tags(&[("name:nb", "Hytta"), ("name:en", "Lodge")]),
        );
        let poi = english_first
            .normalize(&record, Category::AlpineHut, SourceKind::Overpass)
            .expect("valid record");
        assert_eq!(poi.name, "Lodge");
    }

    #[rstest]
    fn description_prefers_localised_text(normalizer: Normalizer) {
        let record = RawRecord::point(
            "9",
            60.0,
            10.0,
            tags(&[("description", "Generic"), ("description:nb", "Lokal")]),
        );
        let poi = normalizer
            .normalize(&record, Category::Viewpoint, SourceKind::Overpass)
            .expect("valid record");
        assert_eq!(poi.description, "Lokal");
    }

    #[rstest]
    fn description_falls_back_to_generated_text(normalizer: Normalizer) {
        let record = RawRecord::point("9", 60.0, 10.0, tags(&[("ele", "1450")]));
        let poi = normalizer
            .normalize(&record, Category::Peak, SourceKind::Overpass)
            .expect("valid record");
        assert_eq!(poi.description, "Peak at 1450 m");
        assert_eq!(poi.name, "Peak (1450 m)");
    }

    #[rstest]
    fn metadata_keeps_selected_tags(normalizer: Normalizer) {
        let record = RawRecord::point(
            "2",
            60.0,
            10.0,
            tags(&[("website", "https://example.no"), ("fixme", "check"), ("fee", "yes")]),
        );
        let poi = normalizer
            .normalize(&record, Category::Museum, SourceKind::Overpass)
            .expect("valid record");
        assert_eq!(poi.metadata.get("website").map(String::as_str), Some("https://example.no"));
        assert_eq!(poi.metadata.get("fee").map(String::as_str), Some("yes"));
        assert_eq!(poi.metadata.get("osm_type").map(String::as_str), Some("node"));
        assert!(!poi.metadata.contains_key("fixme"));
    }

    #[rstest]
    fn wfs_records_omit_osm_type(normalizer: Normalizer) {
        let record = RawRecord::point("lok.1", 60.0, 10.0, Tags::new());
        let poi = normalizer
            .normalize(&record, Category::HeritageSite, SourceKind::Wfs)
            .expect("valid record");
        assert_eq!(poi.id, "wfs:heritage_site:lok.1");
        assert!(!poi.metadata.contains_key("osm_type"));
    }

    #[rstest]
    fn centroid_supplies_coordinates(normalizer: Normalizer) {
        let record = RawRecord {
            external_id: Some("w77".into()),
            kind: ElementKind::Way,
            lat: None,
            lon: None,
            centroid: Some(Centroid {
                lat: 62.1,
                lon: 7.2,
            }),
            tags: Tags::new(),
        };
        let poi = normalizer
            .normalize(&record, Category::Beach, SourceKind::Overpass)
            .expect("valid record");
        assert_eq!((poi.lat, poi.lng), (62.1, 7.2));
        assert_eq!(poi.metadata.get("osm_type").map(String::as_str), Some("way"));
    }

    #[rstest]
    #[case(None, Some((60.0, 10.0)), Rejection::MissingExternalId)]
    #[case(Some(" "), Some((60.0, 10.0)), Rejection::MissingExternalId)]
    #[case(Some("1"), None, Rejection::MissingCoordinates)]
    #[case(Some("1"), Some((0.0, 0.0)), Rejection::InvalidCoordinates)]
    #[case(Some("1"), Some((95.0, 10.0)), Rejection::InvalidCoordinates)]
    #[case(Some("1"), Some((60.0, f64::INFINITY)), Rejection::InvalidCoordinates)]
    fn invalid_records_are_rejected(
        normalizer: Normalizer,
        #[case] external_id: Option<&str>,
        #[case] coordinates: Option<(f64, f64)>,
        #[case] expected: Rejection,
    ) {
        let record = RawRecord {
            external_id: external_id.map(str::to_owned),
            kind: ElementKind::Point,
            lat: coordinates.map(|(lat, _)| lat),
            lon: coordinates.map(|(_, lon)| lon),
            centroid: None,
            tags: Tags::new(),
        };
        assert_eq!(
            normalizer.normalize(&record, Category::Shelter, SourceKind::Overpass),
            Err(expected)
        );
    }
}
