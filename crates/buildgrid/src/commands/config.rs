//! Config command implementation
//!
//! Shows the configuration the data provider would be built from, after
//! file and environment overrides are applied.

use std::path::Path;

use anyhow::{Context, Result};
use buildgrid_core::GridConfig;

/// Resolve configuration the same way `simulate` does.
///
/// # Errors
///
/// Returns an error if an explicit file is missing or any layer is invalid.
pub fn load(path: Option<&Path>) -> Result<GridConfig> {
    GridConfig::load(path).context("Failed to load configuration")
}

/// Run the config command
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or rendered
pub fn run(path: Option<&Path>) -> Result<String> {
    let config = load(path)?;
    config
        .to_toml_string()
        .context("Failed to render configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to load configuration"));
    }
}
