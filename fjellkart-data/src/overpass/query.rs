//! Overpass QL rendering.

use fjellkart_core::{SourceError, TagFilter, TagSelector, ViewportBounds};

/// Render `selectors` as an Overpass QL union over `bounds`.
///
/// Each selector becomes one `nwr` statement. An empty selector list is
/// rejected rather than turned into an unfiltered bounding-box dump.
///
/// # Errors
///
/// Returns [`SourceError::InvalidRequest`] when `selectors` is empty or a
/// selector has no filters.
///
/// # Examples
/// ```
/// use fjellkart_core::{TagFilter, TagSelector, ViewportBounds};
/// use fjellkart_data::overpass::build_query;
///
/// static PEAK: [TagFilter; 1] = [TagFilter::eq("natural", "peak")];
/// let bounds = ViewportBounds::new(60.0, 59.0, 11.0, 10.0).expect("valid bounds");
/// let query = build_query(&[TagSelector { all: &PEAK }], &bounds, 25).expect("query");
/// assert!(query.contains("nwr[\"natural\"=\"peak\"](59,10,60,11);"));
/// ```
pub fn build_query(
    selectors: &[TagSelector],
    bounds: &ViewportBounds,
    timeout_secs: u32,
) -> Result<String, SourceError> {
    if selectors.is_empty() {
        return Err(SourceError::InvalidRequest {
            message: "overpass query needs at least one selector".to_owned(),
        });
    }
    let bbox = format!(
        "({},{},{},{})",
        bounds.south(),
        bounds.west(),
        bounds.north(),
        bounds.east()
    );
    let statements = selectors
        .iter()
        .map(|selector| render_selector(selector).map(|filters| format!("  nwr{filters}{bbox};")))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(format!(
        "[out:json][timeout:{timeout_secs}];\n(\n{}\n);\nout center tags;",
        statements.join("\n")
    ))
}

fn render_selector(selector: &TagSelector) -> Result<String, SourceError> {
    if selector.all.is_empty() {
        return Err(SourceError::InvalidRequest {
            message: "overpass selector has no filters".to_owned(),
        });
    }
    Ok(selector.all.iter().map(render_filter).collect())
}

fn render_filter(filter: &TagFilter) -> String {
    let key = escape_quoted(filter.key);
    match filter.value {
        Some(value) => format!("[\"{key}\"=\"{}\"]", escape_quoted(value)),
        None => format!("[\"{key}\"]"),
    }
}

fn escape_quoted(raw: &str) -> String {
    raw.replace('\\', r"\\").replace('"', "\\\"")
}
