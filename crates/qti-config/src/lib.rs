//! Item catalog parsing and validation
//!
//! Supports TOML catalogs with:
//! - Versioned schema
//! - Item definitions with time limits and attempt control
//! - Response, outcome and template variable declarations
//! - Validation with clear error messages

mod catalog;
mod schema;
mod validation;

pub use catalog::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read catalog file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate a catalog from a TOML file
pub fn load_catalog(path: impl AsRef<Path>) -> ConfigResult<Catalog> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading item catalog");
    let content = std::fs::read_to_string(path)?;
    parse_catalog(&content)
}

/// Parse and validate a catalog from a TOML string
pub fn parse_catalog(content: &str) -> ConfigResult<Catalog> {
    let raw: RawCatalog = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_catalog(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    let catalog = Catalog::from_raw(raw);
    debug!(items = catalog.items.len(), "Catalog validated");
    Ok(catalog)
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;
