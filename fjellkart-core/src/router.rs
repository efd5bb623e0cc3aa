//! Static dispatch from categories to the source queries that serve them.
//!
//! Several categories share one upstream query (for example both camping
//! categories come from a single `camping` call). Each category then carries
//! tag filters that pick its own records out of the shared response. The
//! router only selects; deduplicating calls within a pass is the pipeline's
//! job.

use crate::{Category, QueryFamily, SourceKind, Tags};

/// Identifier of one upstream query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum QueryId {
    /// Camping and caravan sites.
    Camping,
    /// Wilderness huts, mountain lodges and shelters.
    HutsAndService,
    /// Viewpoints.
    Viewpoints,
    /// Summits.
    Peaks,
    /// Waterfalls.
    Waterfalls,
    /// Trailheads.
    Trailheads,
    /// Beaches and swimming areas.
    Bathing,
    /// Fishing spots.
    Fishing,
    /// War memorials, bunkers and battlefields.
    WarMemorials,
    /// Churches.
    Churches,
    /// Museums.
    Museums,
    /// Ruins.
    Ruins,
    /// Drinking water and toilets.
    Amenities,
    /// Charging stations.
    ChargingStations,
    /// Cable cars and gondolas.
    CableCars,
    /// Ferry terminals.
    FerryTerminals,
    /// Protected areas feature type.
    ProtectedAreas,
    /// Heritage sites feature type.
    HeritageSites,
}

impl QueryId {
    /// Every query, in declaration order.
    pub const ALL: [Self; 18] = [
        Self::Camping,
        Self::HutsAndService,
        Self::Viewpoints,
        Self::Peaks,
        Self::Waterfalls,
        Self::Trailheads,
        Self::Bathing,
        Self::Fishing,
        Self::WarMemorials,
        Self::Churches,
        Self::Museums,
        Self::Ruins,
        Self::Amenities,
        Self::ChargingStations,
        Self::CableCars,
        Self::FerryTerminals,
        Self::ProtectedAreas,
        Self::HeritageSites,
    ];

    /// Return the `snake_case` name used in logs and reports.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Camping => "camping",
            Self::HutsAndService => "huts_and_service",
            Self::Viewpoints => "viewpoints",
            Self::Peaks => "peaks",
            Self::Waterfalls => "waterfalls",
            Self::Trailheads => "trailheads",
            Self::Bathing => "bathing",
            Self::Fishing => "fishing",
            Self::WarMemorials => "war_memorials",
            Self::Churches => "churches",
            Self::Museums => "museums",
            Self::Ruins => "ruins",
            Self::Amenities => "amenities",
            Self::ChargingStations => "charging_stations",
            Self::CableCars => "cable_cars",
            Self::FerryTerminals => "ferry_terminals",
            Self::ProtectedAreas => "protected_areas",
            Self::HeritageSites => "heritage_sites",
        }
    }
}

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single tag test: the key must be present and, if given, equal `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagFilter {
    /// Tag key.
    pub key: &'static str,
    /// Required value, or `None` to accept any value.
    pub value: Option<&'static str>,
}

impl TagFilter {
    /// Match `key=value`.
    #[must_use]
    pub const fn eq(key: &'static str, value: &'static str) -> Self {
        Self {
            key,
            value: Some(value),
        }
    }

    /// Match any record carrying `key`.
    #[must_use]
    pub const fn has(key: &'static str) -> Self {
        Self { key, value: None }
    }

    /// Whether `tags` satisfy this filter.
    #[must_use]
    pub fn matches(&self, tags: &Tags) -> bool {
        match (tags.get(self.key), self.value) {
            (Some(found), Some(expected)) => found == expected,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

/// Conjunction of tag filters forming one Overpass selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSelector {
    /// Filters that must all hold.
    pub all: &'static [TagFilter],
}

impl TagSelector {
    /// Whether every filter in the selector holds for `tags`.
    #[must_use]
    pub fn matches(&self, tags: &Tags) -> bool {
        self.all.iter().all(|filter| filter.matches(tags))
    }
}

/// What the adapter should ask its upstream for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTarget {
    /// Union of tag selectors for the Overpass API.
    Overpass {
        /// Selectors combined with OR.
        selectors: &'static [TagSelector],
    },
    /// One WFS feature type.
    Wfs {
        /// Dataset the feature type is published under.
        dataset: &'static str,
        /// Qualified feature type name.
        type_name: &'static str,
    },
}

/// One upstream query that categories route through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceQuery {
    /// Stable identifier.
    pub id: QueryId,
    /// Service kind the query runs against.
    pub source: SourceKind,
    /// Family the query belongs to.
    pub family: QueryFamily,
    /// Upstream-specific request description.
    pub target: QueryTarget,
}

/// How one category is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryRoute {
    /// The routed category.
    pub category: Category,
    /// The category's family.
    pub family: QueryFamily,
    /// Queries whose records feed this category.
    pub queries: &'static [QueryId],
    /// Any-of filters selecting this category's records from shared queries.
    /// An empty list accepts every record.
    pub filters: &'static [TagFilter],
}

impl CategoryRoute {
    /// Whether a record with `tags` belongs to this category.
    #[must_use]
    pub fn accepts(&self, tags: &Tags) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|filter| filter.matches(tags))
    }
}

macro_rules! category_routes {
    ($($category:ident => [$($query:ident),+] $(where [$($filter:expr),+])?;)+) => {
        /// Look up how `category` is served.
        ///
        /// # Examples
        /// ```
        /// use fjellkart_core::{Category, QueryId, router};
        ///
        /// let route = router::route(Category::CaravanSite);
        /// assert_eq!(route.queries, &[QueryId::Camping]);
        /// ```
        #[must_use]
        pub fn route(category: Category) -> &'static CategoryRoute {
            match category {
                $(Category::$category => {
                    static ROUTE: CategoryRoute = CategoryRoute {
                        category: Category::$category,
                        family: Category::$category.family(),
                        queries: &[$(QueryId::$query),+],
                        filters: &[$($($filter),+)?],
                    };
                    &ROUTE
                })+
            }
        }
    };
}

category_routes! {
    CampingSite => [Camping] where [TagFilter::eq("tourism", "camp_site")];
    CaravanSite => [Camping] where [TagFilter::eq("tourism", "caravan_site")];
    WildernessHut => [HutsAndService] where [TagFilter::eq("tourism", "wilderness_hut")];
    AlpineHut => [HutsAndService] where [TagFilter::eq("tourism", "alpine_hut")];
    Shelter => [HutsAndService] where [TagFilter::eq("amenity", "shelter")];
    Viewpoint => [Viewpoints];
    Peak => [Peaks];
    Waterfall => [Waterfalls];
    Trailhead => [Trailheads];
    Beach => [Bathing] where [TagFilter::eq("natural", "beach")];
    SwimmingArea => [Bathing] where [TagFilter::eq("leisure", "swimming_area")];
    FishingSpot => [Fishing];
    WarMemorial => [WarMemorials];
    Church => [Churches];
    Museum => [Museums];
    Ruins => [Ruins];
    DrinkingWater => [Amenities] where [TagFilter::eq("amenity", "drinking_water")];
    Toilets => [Amenities] where [TagFilter::eq("amenity", "toilets")];
    ChargingStation => [ChargingStations];
    CableCar => [CableCars];
    FerryTerminal => [FerryTerminals];
    ProtectedArea => [ProtectedAreas];
    HeritageSite => [HeritageSites];
}

macro_rules! source_queries {
    ($($id:ident: $family:ident => $source:ident $target:tt;)+) => {
        /// Look up the definition of query `id`.
        ///
        /// # Examples
        /// ```
        /// use fjellkart_core::{QueryId, SourceKind, router};
        ///
        /// assert_eq!(router::query(QueryId::HeritageSites).source, SourceKind::Wfs);
        /// ```
        #[must_use]
        pub fn query(id: QueryId) -> &'static SourceQuery {
            match id {
                $(QueryId::$id => {
                    static QUERY: SourceQuery = SourceQuery {
                        id: QueryId::$id,
                        source: SourceKind::$source,
                        family: QueryFamily::$family,
                        target: QueryTarget::$source $target,
                    };
                    &QUERY
                })+
            }
        }
    };
}

source_queries! {
    Camping: Accommodation => Overpass {
        selectors: &[
            TagSelector { all: &[TagFilter::eq("tourism", "camp_site")] },
            TagSelector { all: &[TagFilter::eq("tourism", "caravan_site")] },
        ],
    };
    HutsAndService: Accommodation => Overpass {
        selectors: &[
            TagSelector { all: &[TagFilter::eq("tourism", "wilderness_hut")] },
            TagSelector { all: &[TagFilter::eq("tourism", "alpine_hut")] },
            TagSelector { all: &[TagFilter::eq("amenity", "shelter")] },
        ],
    };
    Viewpoints: OutdoorActivity => Overpass {
        selectors: &[TagSelector { all: &[TagFilter::eq("tourism", "viewpoint")] }],
    };
    Peaks: OutdoorActivity => Overpass {
        selectors: &[TagSelector { all: &[TagFilter::eq("natural", "peak")] }],
    };
    Waterfalls: OutdoorActivity => Overpass {
        selectors: &[TagSelector { all: &[TagFilter::eq("waterway", "waterfall")] }],
    };
    Trailheads: OutdoorActivity => Overpass {
        selectors: &[TagSelector { all: &[TagFilter::eq("highway", "trailhead")] }],
    };
    Bathing: WaterActivity => Overpass {
        selectors: &[
            TagSelector { all: &[TagFilter::eq("natural", "beach")] },
            TagSelector { all: &[TagFilter::eq("leisure", "swimming_area")] },
        ],
    };
    Fishing: WaterActivity => Overpass {
        selectors: &[TagSelector { all: &[TagFilter::eq("leisure", "fishing")] }],
    };
    WarMemorials: CulturalHeritage => Overpass {
        selectors: &[
            TagSelector {
                all: &[
                    TagFilter::eq("historic", "memorial"),
                    TagFilter::eq("memorial", "war_memorial"),
                ],
            },
            TagSelector { all: &[TagFilter::eq("military", "bunker")] },
            TagSelector { all: &[TagFilter::eq("historic", "battlefield")] },
        ],
    };
    Churches: CulturalHeritage => Overpass {
        selectors: &[TagSelector {
            all: &[
                TagFilter::eq("amenity", "place_of_worship"),
                TagFilter::eq("religion", "christian"),
            ],
        }],
    };
    Museums: CulturalHeritage => Overpass {
        selectors: &[TagSelector { all: &[TagFilter::eq("tourism", "museum")] }],
    };
    Ruins: CulturalHeritage => Overpass {
        selectors: &[TagSelector { all: &[TagFilter::eq("historic", "ruins")] }],
    };
    Amenities: ServiceInfrastructure => Overpass {
        selectors: &[
            TagSelector { all: &[TagFilter::eq("amenity", "drinking_water")] },
            TagSelector { all: &[TagFilter::eq("amenity", "toilets")] },
        ],
    };
    ChargingStations: ServiceInfrastructure => Overpass {
        selectors: &[TagSelector { all: &[TagFilter::eq("amenity", "charging_station")] }],
    };
    CableCars: Transport => Overpass {
        selectors: &[
            TagSelector { all: &[TagFilter::eq("aerialway", "cable_car")] },
            TagSelector { all: &[TagFilter::eq("aerialway", "gondola")] },
        ],
    };
    FerryTerminals: Transport => Overpass {
        selectors: &[TagSelector { all: &[TagFilter::eq("amenity", "ferry_terminal")] }],
    };
    ProtectedAreas: Specialized => Wfs {
        dataset: "naturvern",
        type_name: "naturvern:Naturvernomrade",
    };
    HeritageSites: Specialized => Wfs {
        dataset: "kulturminner",
        type_name: "kulturminner:Lokalitet",
    };
}

/// Every category route, in [`Category::ALL`] order.
pub fn routes() -> impl Iterator<Item = &'static CategoryRoute> {
    Category::ALL.into_iter().map(route)
}

/// Categories served by query `id`, in [`Category::ALL`] order.
pub fn categories_for(id: QueryId) -> impl Iterator<Item = Category> {
    routes()
        .filter(move |route| route.queries.contains(&id))
        .map(|route| route.category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[rstest]
    fn every_category_routes_to_itself() {
        for category in Category::ALL {
            let r = route(category);
            assert_eq!(r.category, category);
            assert_eq!(r.family, category.family());
            assert!(!r.queries.is_empty());
        }
    }

    #[rstest]
    fn every_query_definition_matches_its_id() {
        for id in QueryId::ALL {
            assert_eq!(query(id).id, id);
        }
    }

    #[rstest]
    fn every_query_is_used() {
        let used: HashSet<_> = routes().flat_map(|r| r.queries.iter().copied()).collect();
        assert_eq!(used.len(), QueryId::ALL.len());
    }

    #[rstest]
    #[case(QueryId::Camping, &[Category::CampingSite, Category::CaravanSite])]
    #[case(
        QueryId::HutsAndService,
        &[Category::WildernessHut, Category::AlpineHut, Category::Shelter]
    )]
    #[case(QueryId::Bathing, &[Category::Beach, Category::SwimmingArea])]
    #[case(QueryId::Amenities, &[Category::DrinkingWater, Category::Toilets])]
    #[case(QueryId::Peaks, &[Category::Peak])]
    fn shared_queries_fan_out(#[case] id: QueryId, #[case] expected: &[Category]) {
        let served: Vec<_> = categories_for(id).collect();
        assert_eq!(served, expected);
    }

    #[rstest]
    fn shared_categories_carry_filters() {
        for id in QueryId::ALL {
            let served: Vec<_> = categories_for(id).collect();
            if served.len() > 1 {
                for category in served {
                    assert!(
                        !route(category).filters.is_empty(),
                        "{category} shares {id} without a filter"
                    );
                }
            }
        }
    }

    #[rstest]
    fn filters_split_shared_records() {
        let caravan = tags(&[("tourism", "caravan_site")]);
        assert!(!route(Category::CampingSite).accepts(&caravan));
        assert!(route(Category::CaravanSite).accepts(&caravan));
    }

    #[rstest]
    fn empty_filter_list_accepts_everything() {
        assert!(route(Category::Peak).accepts(&Tags::new()));
    }

    #[rstest]
    #[case(TagFilter::eq("amenity", "toilets"), &[("amenity", "toilets")], true)]
    #[case(TagFilter::eq("amenity", "toilets"), &[("amenity", "shelter")], false)]
    #[case(TagFilter::has("ele"), &[("ele", "1200")], true)]
    #[case(TagFilter::has("ele"), &[], false)]
    fn tag_filter_matching(
        #[case] filter: TagFilter,
        #[case] pairs: &[(&str, &str)],
        #[case] expected: bool,
    ) {
        assert_eq!(filter.matches(&tags(pairs)), expected);
    }

    #[rstest]
    fn unnamed_peaks_are_requested() {
        let QueryTarget::Overpass { selectors } = query(QueryId::Peaks).target else {
            panic!("peaks should be served by Overpass");
        };
        let keys: Vec<&str> = selectors
            .iter()
            .flat_map(|selector| selector.all.iter().map(|filter| filter.key))
            .collect();
        assert_eq!(keys, vec!["natural"]);
    }

    #[rstest]
    fn specialised_categories_use_wfs() {
        for category in [Category::ProtectedArea, Category::HeritageSite] {
            for id in route(category).queries {
                assert_eq!(query(*id).source, SourceKind::Wfs);
            }
        }
    }
}
