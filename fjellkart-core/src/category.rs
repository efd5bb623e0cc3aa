//! POI categories and the query families they belong to.
//!
//! The set is closed: every category is known at compile time and carries a
//! stable `snake_case` wire name used in POI identifiers and CLI arguments.
//!
//! # Examples
//! ```
//! use fjellkart_core::{Category, QueryFamily};
//!
//! let category: Category = "camping-site".parse()?;
//! assert_eq!(category, Category::CampingSite);
//! assert_eq!(category.as_str(), "camping_site");
//! assert_eq!(category.family(), QueryFamily::Accommodation);
//! # Ok::<(), fjellkart_core::CategoryParseError>(())
//! ```

use thiserror::Error;

/// Broad grouping used to organise source queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum QueryFamily {
    /// Places to stay overnight.
    Accommodation,
    /// Land-based outdoor destinations.
    OutdoorActivity,
    /// Swimming, bathing and fishing.
    WaterActivity,
    /// Memorials, churches, museums and ruins.
    CulturalHeritage,
    /// Water, toilets and charging.
    ServiceInfrastructure,
    /// Cable cars and ferries.
    Transport,
    /// Government feature services.
    Specialized,
}

impl QueryFamily {
    /// Return the family as a kebab-case `&str`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Accommodation => "accommodation",
            Self::OutdoorActivity => "outdoor-activity",
            Self::WaterActivity => "water-activity",
            Self::CulturalHeritage => "cultural-heritage",
            Self::ServiceInfrastructure => "service-infrastructure",
            Self::Transport => "transport",
            Self::Specialized => "specialized",
        }
    }
}

impl std::fmt::Display for QueryFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A class of point of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Category {
    /// Tent camping sites.
    CampingSite,
    /// Caravan and motorhome sites.
    CaravanSite,
    /// Unstaffed wilderness huts.
    WildernessHut,
    /// Staffed mountain lodges.
    AlpineHut,
    /// Open shelters and lean-tos.
    Shelter,
    /// Scenic viewpoints.
    Viewpoint,
    /// Mountain summits.
    Peak,
    /// Waterfalls.
    Waterfall,
    /// Hiking trailheads.
    Trailhead,
    /// Beaches.
    Beach,
    /// Designated swimming areas.
    SwimmingArea,
    /// Fishing spots.
    FishingSpot,
    /// War memorials, bunkers and battlefields.
    WarMemorial,
    /// Churches, including stave churches.
    Church,
    /// Museums.
    Museum,
    /// Historic ruins.
    Ruins,
    /// Drinking water taps and springs.
    DrinkingWater,
    /// Public toilets.
    Toilets,
    /// Electric vehicle charging stations.
    ChargingStation,
    /// Cable cars and gondolas.
    CableCar,
    /// Ferry terminals.
    FerryTerminal,
    /// Protected nature areas from the environment agency feature service.
    ProtectedArea,
    /// Listed heritage sites from the heritage feature service.
    HeritageSite,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Self; 23] = [
        Self::CampingSite,
        Self::CaravanSite,
        Self::WildernessHut,
        Self::AlpineHut,
        Self::Shelter,
        Self::Viewpoint,
        Self::Peak,
        Self::Waterfall,
        Self::Trailhead,
        Self::Beach,
        Self::SwimmingArea,
        Self::FishingSpot,
        Self::WarMemorial,
        Self::Church,
        Self::Museum,
        Self::Ruins,
        Self::DrinkingWater,
        Self::Toilets,
        Self::ChargingStation,
        Self::CableCar,
        Self::FerryTerminal,
        Self::ProtectedArea,
        Self::HeritageSite,
    ];

    /// Return the stable `snake_case` wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CampingSite => "camping_site",
            Self::CaravanSite => "caravan_site",
            Self::WildernessHut => "wilderness_hut",
            Self::AlpineHut => "alpine_hut",
            Self::Shelter => "shelter",
            Self::Viewpoint => "viewpoint",
            Self::Peak => "peak",
            Self::Waterfall => "waterfall",
            Self::Trailhead => "trailhead",
            Self::Beach => "beach",
            Self::SwimmingArea => "swimming_area",
            Self::FishingSpot => "fishing_spot",
            Self::WarMemorial => "war_memorial",
            Self::Church => "church",
            Self::Museum => "museum",
            Self::Ruins => "ruins",
            Self::DrinkingWater => "drinking_water",
            Self::Toilets => "toilets",
            Self::ChargingStation => "charging_station",
            Self::CableCar => "cable_car",
            Self::FerryTerminal => "ferry_terminal",
            Self::ProtectedArea => "protected_area",
            Self::HeritageSite => "heritage_site",
        }
    }

    /// Human-readable label used when a record carries no usable name.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CampingSite => "Camping site",
            Self::CaravanSite => "Caravan site",
            Self::WildernessHut => "Wilderness hut",
            Self::AlpineHut => "Mountain lodge",
            Self::Shelter => "Shelter",
            Self::Viewpoint => "Viewpoint",
            Self::Peak => "Peak",
            Self::Waterfall => "Waterfall",
            Self::Trailhead => "Trailhead",
            Self::Beach => "Beach",
            Self::SwimmingArea => "Swimming area",
            Self::FishingSpot => "Fishing spot",
            Self::WarMemorial => "War memorial",
            Self::Church => "Church",
            Self::Museum => "Museum",
            Self::Ruins => "Ruins",
            Self::DrinkingWater => "Drinking water",
            Self::Toilets => "Toilets",
            Self::ChargingStation => "Charging station",
            Self::CableCar => "Cable car",
            Self::FerryTerminal => "Ferry terminal",
            Self::ProtectedArea => "Protected area",
            Self::HeritageSite => "Heritage site",
        }
    }

    /// The query family this category is routed through.
    #[must_use]
    pub const fn family(&self) -> QueryFamily {
        match self {
            Self::CampingSite
            | Self::CaravanSite
            | Self::WildernessHut
            | Self::AlpineHut
            | Self::Shelter => QueryFamily::Accommodation,
            Self::Viewpoint | Self::Peak | Self::Waterfall | Self::Trailhead => {
                QueryFamily::OutdoorActivity
            }
            Self::Beach | Self::SwimmingArea | Self::FishingSpot => QueryFamily::WaterActivity,
            Self::WarMemorial | Self::Church | Self::Museum | Self::Ruins => {
                QueryFamily::CulturalHeritage
            }
            Self::DrinkingWater | Self::Toilets | Self::ChargingStation => {
                QueryFamily::ServiceInfrastructure
            }
            Self::CableCar | Self::FerryTerminal => QueryFamily::Transport,
            Self::ProtectedArea | Self::HeritageSite => QueryFamily::Specialized,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown category name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown category '{0}'")]
pub struct CategoryParseError(pub String);

impl std::str::FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wire = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == wire)
            .ok_or_else(|| CategoryParseError(s.to_owned()))
    }
}

/// Checkbox state of a category group derived from its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriState {
    /// Every member is selected.
    Checked,
    /// Some, but not all, members are selected.
    Indeterminate,
    /// No member is selected.
    Unchecked,
}

impl TriState {
    /// Derive a parent state from its children's selection flags.
    ///
    /// An empty group is unchecked.
    ///
    /// # Examples
    /// ```
    /// use fjellkart_core::TriState;
    ///
    /// assert_eq!(TriState::from_children([true, true]), TriState::Checked);
    /// assert_eq!(TriState::from_children([true, false]), TriState::Indeterminate);
    /// assert_eq!(TriState::from_children([false, false]), TriState::Unchecked);
    /// ```
    pub fn from_children<I>(children: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let (mut total, mut checked) = (0_usize, 0_usize);
        for child in children {
            total += 1;
            if child {
                checked += 1;
            }
        }
        match checked {
            0 => Self::Unchecked,
            n if n == total => Self::Checked,
            _ => Self::Indeterminate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;
    use std::str::FromStr;

    #[rstest]
    fn display_matches_as_str() {
        assert_eq!(Category::WarMemorial.to_string(), "war_memorial");
    }

    #[rstest]
    fn wire_names_are_unique() {
        let names: HashSet<_> = Category::ALL.iter().map(Category::as_str).collect();
        assert_eq!(names.len(), Category::ALL.len());
    }

    #[rstest]
    #[case("camping_site", Category::CampingSite)]
    #[case("Cable-Car", Category::CableCar)]
    #[case("  peak ", Category::Peak)]
    fn parsing_accepts_wire_name_variants(#[case] raw: &str, #[case] expected: Category) {
        assert_eq!(Category::from_str(raw), Ok(expected));
    }

    #[rstest]
    fn parsing_rejects_unknown() {
        let err = Category::from_str("volcano").expect_err("unknown category");
        assert!(err.to_string().contains("unknown category"));
    }

    #[rstest]
    fn every_family_has_a_category() {
        let families: HashSet<_> = Category::ALL.iter().map(Category::family).collect();
        assert_eq!(families.len(), 7);
    }

    #[rstest]
    #[case(vec![], TriState::Unchecked)]
    #[case(vec![false, false], TriState::Unchecked)]
    #[case(vec![true], TriState::Checked)]
    #[case(vec![true, true, true], TriState::Checked)]
    #[case(vec![false, true, false], TriState::Indeterminate)]
    fn tri_state_follows_children(#[case] children: Vec<bool>, #[case] expected: TriState) {
        assert_eq!(TriState::from_children(children), expected);
    }
}
