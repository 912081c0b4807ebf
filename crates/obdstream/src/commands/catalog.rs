//! `commands` handler: list the built-in command catalog.

use serde::Serialize;
use tabled::Tabled;

use obdstream_core::{CatalogEntry, Command};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct CatalogRow {
    #[tabled(rename = "Name")]
    name: &'static str,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Description")]
    description: &'static str,
}

#[derive(Serialize)]
struct CatalogItem {
    name: &'static str,
    category: String,
    id: u16,
    description: &'static str,
}

impl From<&CatalogEntry> for CatalogItem {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            name: entry.name,
            category: entry.command.category().to_string(),
            id: entry.command.id(),
            description: entry.description,
        }
    }
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let items: Vec<CatalogItem> = Command::catalog().iter().map(CatalogItem::from).collect();
    let out = output::render_list(
        global.output,
        &items,
        |item| CatalogRow {
            name: item.name,
            category: item.category.clone(),
            id: format!("{:#04x}", item.id),
            description: item.description,
        },
        |item| item.name.to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
