//! Tests for the `categories` listing.

use super::*;
use fjellkart_core::Category;
use rstest::rstest;

#[rstest]
fn lists_every_category_once() {
    let mut out = Vec::new();
    categories::write_categories(&mut out).expect("listing should succeed");
    let text = String::from_utf8(out).expect("utf-8 output");

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), Category::ALL.len());
    let camping = lines
        .iter()
        .find(|line| line.starts_with("camping_site "))
        .expect("camping_site listed");
    assert!(camping.contains("accommodation"));
    assert!(camping.ends_with("camping"));
}

#[rstest]
fn parses_categories_subcommand() {
    let cli = Cli::try_parse_from(["fjellkart", "categories"]).expect("parse");
    assert!(matches!(cli.command, Command::Categories));
}
