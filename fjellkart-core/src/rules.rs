//! Declarative label and description rules for unnamed records.
//!
//! Rules are evaluated in order and the first one that produces text wins.
//! The final rule always produces the category label, so resolution never
//! comes back empty.

use crate::{Category, Tags};

/// Predicate deciding whether a rule applies.
pub type RulePredicate = fn(Category, &Tags) -> bool;

/// Generator producing text for a record the predicate accepted.
pub type RuleGenerator = fn(Category, &Tags) -> Option<String>;

/// One `(predicate, generator)` pair.
#[derive(Debug, Clone, Copy)]
pub struct LabelRule {
    /// Short rule name for diagnostics.
    pub name: &'static str,
    /// Whether the rule applies to a record.
    pub applies: RulePredicate,
    /// Text produced for an applicable record.
    pub generate: RuleGenerator,
}

const PLACE_KEYS: [&str; 4] = ["addr:city", "is_in:city", "addr:place", "is_in:municipality"];

/// Ordered label rules used when a record has no usable name.
pub static LABEL_RULES: &[LabelRule] = &[
    LabelRule {
        name: "peak-elevation",
        applies: |category, tags| category == Category::Peak && tags.contains_key("ele"),
        generate: |category, tags| elevation(tags).map(|ele| format!("{} ({ele} m)", category.label())),
    },
    LabelRule {
        name: "bunker-type",
        applies: |category, tags| {
            category == Category::WarMemorial && tags.contains_key("bunker_type")
        },
        generate: |_, tags| non_blank(tags, "bunker_type").map(|kind| format!("Bunker ({kind})")),
    },
    LabelRule {
        name: "bunker",
        applies: |category, tags| {
            category == Category::WarMemorial
                && tags.get("military").is_some_and(|value| value == "bunker")
        },
        generate: |_, _| Some("Bunker".to_owned()),
    },
    LabelRule {
        name: "waterfall-height",
        applies: |category, tags| category == Category::Waterfall && tags.contains_key("height"),
        generate: |category, tags| {
            non_blank(tags, "height").map(|height| format!("{} ({height} m)", category.label()))
        },
    },
    LabelRule {
        name: "place",
        applies: |_, tags| PLACE_KEYS.iter().any(|key| tags.contains_key(*key)),
        generate: |category, tags| {
            PLACE_KEYS
                .iter()
                .find_map(|key| non_blank(tags, key))
                .map(|place| format!("{} in {place}", category.label()))
        },
    },
    LabelRule {
        name: "category-label",
        applies: |_, _| true,
        generate: |category, _| Some(category.label().to_owned()),
    },
];

/// Resolve a display label from the rule table.
///
/// # Examples
/// ```
/// use fjellkart_core::{Category, Tags, rules};
///
/// let tags = Tags::from([("ele".to_owned(), "1234".to_owned())]);
/// assert_eq!(rules::label(Category::Peak, &tags), "Peak (1234 m)");
/// assert_eq!(rules::label(Category::Peak, &Tags::new()), "Peak");
/// ```
#[must_use]
pub fn label(category: Category, tags: &Tags) -> String {
    LABEL_RULES
        .iter()
        .filter(|rule| (rule.applies)(category, tags))
        .find_map(|rule| (rule.generate)(category, tags))
        .unwrap_or_else(|| category.label().to_owned())
}

/// Build a short description from the tags the record does carry.
#[must_use]
pub fn describe(category: Category, tags: &Tags) -> String {
    let mut text = category.label().to_owned();
    if let Some(ele) = elevation(tags) {
        text.push_str(&format!(" at {ele} m"));
    }
    if let Some(operator) = non_blank(tags, "operator") {
        text.push_str(&format!(", operated by {operator}"));
    }
    if tags.get("fee").is_some_and(|fee| fee == "no") {
        text.push_str(", free of charge");
    }
    text
}

fn non_blank<'a>(tags: &'a Tags, key: &str) -> Option<&'a str> {
    tags.get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// Whole metres from an `ele` tag such as `"1234"`, `"1234.6"` or `"1234 m"`.
fn elevation(tags: &Tags) -> Option<String> {
    let raw = non_blank(tags, "ele")?;
    let metres: f64 = raw.trim_end_matches('m').trim().replace(',', ".").parse().ok()?;
    metres.is_finite().then(|| format!("{metres:.0}"))
}
