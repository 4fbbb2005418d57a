//! Loading identifier catalogs from JSON files.
//!
//! A catalog file is a JSON array of entries:
//!
//! ```json
//! [
//!   { "metric": "server-uptime", "identifier": "1.3.6.1.4.1.53864.1.3.0" }
//! ]
//! ```
//!
//! Every metric must appear; the file is rejected otherwise.

use std::path::Path;

use mib_core::{CatalogEntry, IdentifierCatalog};

use crate::error::Error;

/// Parse and validate a catalog from JSON text.
pub fn parse_catalog(json: &str) -> Result<IdentifierCatalog, Error> {
    let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
    Ok(IdentifierCatalog::from_entries(entries)?)
}

/// Load the catalog at `path`, or the built-in catalog if there is none.
pub fn load_catalog(path: Option<&Path>) -> Result<IdentifierCatalog, Error> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            let catalog = parse_catalog(&json)?;
            tracing::info!(path = %path.display(), entries = catalog.len(), "catalog loaded");
            Ok(catalog)
        }
        None => Ok(IdentifierCatalog::standard()),
    }
}

/// Serialize a catalog in file form.
pub fn to_json(catalog: &IdentifierCatalog) -> Result<String, Error> {
    Ok(serde_json::to_string_pretty(&catalog.entries())?)
}
