//! `categories` command: the routing table as plain text.

use std::io::Write;

use fjellkart_core::router;

use crate::CliError;

pub(super) fn write_categories(writer: &mut dyn Write) -> Result<(), CliError> {
    for route in router::routes() {
        let queries: Vec<&str> = route.queries.iter().map(|id| id.as_str()).collect();
        writeln!(
            writer,
            "{:<18} {:<22} {}",
            route.category.as_str(),
            route.family.as_str(),
            queries.join(",")
        )
        .map_err(CliError::WriteOutput)?;
    }
    Ok(())
}
