//! TOML schemas for county endpoint tables and discovery keywords.
//!
//! County files describe where each county keeps its parcel layer,
//! municipal boundary layer, known zoning/FLU layers, and city map
//! application URLs. The keyword file drives the layer and field
//! heuristics used by auto-discovery so they can be tuned without code
//! changes.

use serde::{Deserialize, Serialize};

use crate::{
    County, DesignationKind, EndpointConfig, LayerBinding, normalize_jurisdiction_name,
};

/// Endpoint table for a single county, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountyConfig {
    /// Which county this table describes.
    pub county: County,
    /// Human-readable name (e.g. "Pinellas County").
    pub name: String,
    /// Two-letter state abbreviation.
    pub state: String,
    /// Parcel layer used by the parcel resolver.
    pub parcels: ParcelLayerConfig,
    /// Municipal boundary layer used by the jurisdiction resolver.
    pub municipal: MunicipalLayerConfig,
    /// Property appraiser page scraped for land area, if supported.
    pub land_area: Option<LandAreaConfig>,
    /// Jurisdictions whose zoning/FLU layers are already known.
    #[serde(default)]
    pub known_endpoints: Vec<KnownEndpoint>,
    /// City map applications probed by auto-discovery.
    #[serde(default)]
    pub city_apps: Vec<CityApp>,
}

impl CountyConfig {
    /// Returns the known endpoint entry for a jurisdiction, comparing
    /// normalized names.
    #[must_use]
    pub fn known_endpoint(&self, jurisdiction: &str) -> Option<&KnownEndpoint> {
        let key = normalize_jurisdiction_name(jurisdiction);
        self.known_endpoints
            .iter()
            .find(|e| normalize_jurisdiction_name(&e.jurisdiction) == key)
    }

    /// Returns the city application URL for a jurisdiction, comparing
    /// normalized names.
    #[must_use]
    pub fn city_app(&self, jurisdiction: &str) -> Option<&CityApp> {
        let key = normalize_jurisdiction_name(jurisdiction);
        self.city_apps
            .iter()
            .find(|a| normalize_jurisdiction_name(&a.jurisdiction) == key)
    }
}

/// Where to find parcels and how to read their attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelLayerConfig {
    /// Layer URL (without the trailing `/query`).
    pub layer_url: String,
    /// Attribute holding the parcel ID, possibly fully qualified
    /// (e.g. `PGIS.PGIS.Parcels.PARCELID`).
    pub id_field: String,
    /// Candidate attribute names for each extracted value.
    #[serde(default)]
    pub attributes: AttributeMapping,
}

/// Ordered candidate attribute names; the first non-empty value wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeMapping {
    /// Site address fields.
    #[serde(default)]
    pub address: Vec<String>,
    /// Owner name fields.
    #[serde(default)]
    pub owner: Vec<String>,
    /// City fields.
    #[serde(default)]
    pub city: Vec<String>,
    /// ZIP code fields.
    #[serde(default)]
    pub zip: Vec<String>,
    /// Property use / DOR land use fields.
    #[serde(default)]
    pub property_use: Vec<String>,
    /// Acreage fields.
    #[serde(default)]
    pub acreage: Vec<String>,
}

/// Municipal boundary layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MunicipalLayerConfig {
    /// Layer URL (without the trailing `/query`).
    pub layer_url: String,
    /// Attribute holding the municipality name.
    pub name_field: String,
}

/// Property appraiser page scraped for land area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandAreaConfig {
    /// Page URL with `{strap}` and `{parcel_id}` placeholders.
    pub url_template: String,
}

/// A jurisdiction with statically known zoning and FLU layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownEndpoint {
    /// Jurisdiction name (`"Unincorporated"` for county-administered land).
    pub jurisdiction: String,
    /// Zoning layer.
    pub zoning: LayerConfig,
    /// Future land use layer.
    pub future_land_use: LayerConfig,
}

impl KnownEndpoint {
    /// Converts the table entry into an [`EndpointConfig`].
    #[must_use]
    pub fn endpoint_config(&self) -> EndpointConfig {
        EndpointConfig {
            jurisdiction_name: self.jurisdiction.clone(),
            zoning: Some(self.zoning.binding()),
            future_land_use: Some(self.future_land_use.binding()),
            unbound: Vec::new(),
        }
    }

    /// The layer configured for a designation kind.
    #[must_use]
    pub const fn layer(&self, kind: DesignationKind) -> &LayerConfig {
        match kind {
            DesignationKind::Zoning => &self.zoning,
            DesignationKind::FutureLandUse => &self.future_land_use,
        }
    }
}

/// A layer URL and optional code field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Layer URL (without the trailing `/query`).
    pub url: String,
    /// Code field. When omitted the field is picked from layer metadata.
    pub field: Option<String>,
}

impl LayerConfig {
    /// Converts to a [`LayerBinding`], deriving the layer ID from the
    /// URL's trailing path segment.
    #[must_use]
    pub fn binding(&self) -> LayerBinding {
        LayerBinding {
            service_url: self.url.trim_end_matches('/').to_string(),
            layer_id: layer_id_from_url(&self.url),
            field: self.field.clone(),
        }
    }
}

/// A city map application probed by auto-discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityApp {
    /// Jurisdiction name as reported by the municipal boundary layer.
    pub jurisdiction: String,
    /// Web AppViewer or Experience Builder URL.
    pub app_url: String,
}

/// Returns the numeric layer index at the end of a service URL.
#[must_use]
pub fn layer_id_from_url(url: &str) -> Option<String> {
    let last = url.trim_end_matches('/').rsplit('/').next()?;
    if !last.is_empty() && last.chars().all(|c| c.is_ascii_digit()) {
        Some(last.to_string())
    } else {
        None
    }
}

/// Keyword lists driving layer and field matching during discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    /// Layer title heuristics.
    pub layers: LayerKeywords,
    /// Field name/alias heuristics.
    pub fields: FieldKeywords,
    /// Attributes consulted, in order, for a designation description when
    /// the code field has no coded-value domain.
    #[serde(default)]
    pub description_fields: Vec<String>,
}

/// Layer title heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerKeywords {
    /// A title containing any of these is a zoning candidate.
    pub zoning: Vec<String>,
    /// A title containing any of these is an FLU candidate.
    pub future_land_use: Vec<String>,
    /// Additive title scores used to rank candidates.
    #[serde(default)]
    pub scores: Vec<KeywordScore>,
}

impl LayerKeywords {
    /// Candidate keywords for a designation kind.
    #[must_use]
    pub fn for_kind(&self, kind: DesignationKind) -> &[String] {
        match kind {
            DesignationKind::Zoning => &self.zoning,
            DesignationKind::FutureLandUse => &self.future_land_use,
        }
    }
}

/// Adds `score` once when the text contains any of `keywords`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordScore {
    /// Keywords, matched case-insensitively as substrings.
    pub keywords: Vec<String>,
    /// Score added on a match (may be negative).
    pub score: i32,
}

/// Field name/alias heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldKeywords {
    /// Rules for zoning code fields.
    pub zoning: Vec<FieldRule>,
    /// Rules for FLU code fields.
    pub future_land_use: Vec<FieldRule>,
    /// Added when the field has a coded-value domain.
    #[serde(default)]
    pub coded_domain_bonus: i32,
    /// Name fragments suggesting a code column.
    #[serde(default)]
    pub code_hints: Vec<String>,
    /// Added when a code hint matches.
    #[serde(default)]
    pub code_hint_bonus: i32,
    /// Name fragments suggesting a description column.
    #[serde(default)]
    pub description_hints: Vec<String>,
    /// Subtracted when a description hint matches.
    #[serde(default)]
    pub description_hint_penalty: i32,
}

impl FieldKeywords {
    /// Rules for a designation kind.
    #[must_use]
    pub fn for_kind(&self, kind: DesignationKind) -> &[FieldRule] {
        match kind {
            DesignationKind::Zoning => &self.zoning,
            DesignationKind::FutureLandUse => &self.future_land_use,
        }
    }
}

/// Scores a field when its text contains every `all` keyword and, if
/// `any` is non-empty, at least one `any` keyword.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    /// Keywords that must all be present.
    #[serde(default)]
    pub all: Vec<String>,
    /// Keywords of which one must be present.
    #[serde(default)]
    pub any: Vec<String>,
    /// Base score on a match.
    pub score: i32,
}

impl FieldRule {
    /// Whether the (already lowercased) text satisfies this rule.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        if self.all.is_empty() && self.any.is_empty() {
            return false;
        }
        self.all.iter().all(|k| text.contains(&k.to_lowercase()))
            && (self.any.is_empty() || self.any.iter().any(|k| text.contains(&k.to_lowercase())))
    }
}
