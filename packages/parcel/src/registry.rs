//! Compile-time registry of county endpoint tables and discovery keywords.
//!
//! Each county is a `(name, toml_content)` pair embedded via
//! `include_str!`. Supporting a new county requires creating a TOML file in
//! `counties/` and adding a corresponding entry here. The keyword file can
//! be replaced at runtime with [`load_keywords`].

use std::path::{Path, PathBuf};

use site_lookup_arcgis::LookupError;
use site_lookup_parcel_models::County;
use site_lookup_parcel_models::config::{CountyConfig, KeywordConfig};
use thiserror::Error;

/// Number of configured counties. Enforced by a test.
#[cfg(test)]
const EXPECTED_COUNTY_COUNT: usize = 1;

/// Embedded county endpoint tables.
const COUNTY_TOMLS: &[(&str, &str)] = &[("pinellas", include_str!("../counties/pinellas.toml"))];

/// Embedded default discovery keywords.
const KEYWORDS_TOML: &str = include_str!("../keywords.toml");

/// Environment variable naming a replacement keyword file.
pub const KEYWORDS_ENV: &str = "SITE_LOOKUP_KEYWORDS";

/// Errors loading a keyword file from disk.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not a valid keyword table.
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
}

/// Returns every configured county.
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse. Since these are
/// compile-time constants, parse failures indicate a development error
/// and are caught by the registry tests.
#[must_use]
pub fn all_counties() -> Vec<CountyConfig> {
    COUNTY_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse county config '{name}': {e}"))
        })
        .collect()
}

/// Returns the endpoint table for `county`.
///
/// # Errors
///
/// Returns [`LookupError::Validation`] if the county has no table yet.
pub fn county_config(county: County) -> Result<CountyConfig, LookupError> {
    all_counties()
        .into_iter()
        .find(|c| c.county == county)
        .ok_or_else(|| {
            LookupError::validation(
                "county",
                format!("{} County is not configured", county.label()),
            )
        })
}

/// Returns the embedded keyword table.
///
/// # Panics
///
/// Panics if the embedded `keywords.toml` fails to parse.
#[must_use]
pub fn default_keywords() -> KeywordConfig {
    toml::de::from_str(KEYWORDS_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse embedded keywords.toml: {e}"))
}

/// Reads a keyword table from disk.
///
/// # Errors
///
/// Returns [`RegistryError`] if the file cannot be read or parsed.
pub fn load_keywords(path: &Path) -> Result<KeywordConfig, RegistryError> {
    let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::de::from_str(&content).map_err(|source| RegistryError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// The keyword table at `path` if given, otherwise the embedded default.
///
/// # Errors
///
/// Returns [`RegistryError`] if `path` is given and cannot be loaded.
pub fn resolve_keywords(path: Option<&Path>) -> Result<KeywordConfig, RegistryError> {
    match path {
        Some(path) => {
            log::info!("Loading discovery keywords from {}", path.display());
            load_keywords(path)
        }
        None => Ok(default_keywords()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use site_lookup_parcel_models::normalize_jurisdiction_name;

    use super::*;

    #[test]
    fn loads_all_counties() {
        let counties = all_counties();
        assert_eq!(
            counties.len(),
            EXPECTED_COUNTY_COUNT,
            "Expected {EXPECTED_COUNTY_COUNT} counties, found {}. \
             Update EXPECTED_COUNTY_COUNT after adding/removing counties.",
            counties.len()
        );
    }

    #[test]
    fn counties_are_unique() {
        let mut seen = BTreeSet::new();
        for county in &all_counties() {
            assert!(seen.insert(county.county), "Duplicate county: {}", county.county);
        }
    }

    #[test]
    fn all_counties_have_required_fields() {
        for county in &all_counties() {
            assert!(!county.name.is_empty(), "{} has empty name", county.county);
            assert_eq!(county.state.len(), 2, "{} has invalid state", county.county);
            assert!(
                !county.parcels.layer_url.is_empty() && !county.parcels.id_field.is_empty(),
                "{} has incomplete parcel layer",
                county.county
            );
            assert!(
                !county.municipal.name_field.is_empty(),
                "{} has empty municipal name field",
                county.county
            );
            assert!(
                !county.parcels.attributes.address.is_empty(),
                "{} has no address attributes",
                county.county
            );
        }
    }

    #[test]
    fn jurisdiction_entries_are_unique_and_parseable() {
        for county in &all_counties() {
            let mut seen = BTreeSet::new();
            for endpoint in &county.known_endpoints {
                assert!(
                    seen.insert(normalize_jurisdiction_name(&endpoint.jurisdiction)),
                    "Duplicate known endpoint: {}",
                    endpoint.jurisdiction
                );
                assert!(endpoint.zoning.binding().layer_id.is_some());
                assert!(endpoint.future_land_use.binding().layer_id.is_some());
            }
            let mut seen = BTreeSet::new();
            for app in &county.city_apps {
                assert!(
                    seen.insert(normalize_jurisdiction_name(&app.jurisdiction)),
                    "Duplicate city app: {}",
                    app.jurisdiction
                );
                assert!(
                    crate::discovery::manifest::AppRef::parse(&app.app_url).is_some(),
                    "Unparseable app URL for {}: {}",
                    app.jurisdiction,
                    app.app_url
                );
            }
        }
    }

    #[test]
    fn pinellas_serves_unincorporated_parcels() {
        let pinellas = county_config(County::Pinellas).unwrap();
        assert!(pinellas.known_endpoint("Unincorporated").is_some());
        assert!(pinellas.city_app("city of largo").is_some());
    }

    #[test]
    fn unconfigured_county_is_validation_error() {
        let err = county_config(County::Pasco).unwrap_err();
        assert_eq!(err.kind(), site_lookup_parcel_models::ErrorKind::ValidationError);
    }

    #[test]
    fn default_keywords_parse() {
        let keywords = default_keywords();
        assert!(!keywords.layers.zoning.is_empty());
        assert!(!keywords.fields.zoning.is_empty());
        assert!(!keywords.fields.future_land_use.is_empty());
        assert!(keywords.description_fields.contains(&"ZONEDESC".to_string()));
    }

    #[test]
    fn missing_keyword_file_is_io_error() {
        let err = load_keywords(Path::new("/nonexistent/keywords.toml")).unwrap_err();
        assert!(matches!(err, RegistryError::Io { .. }));
    }
}
