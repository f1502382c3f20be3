#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parcel, jurisdiction, and zoning lookup types.
//!
//! These types flow through the resolution pipeline: a [`ParcelQuery`]
//! resolves to a [`ParcelRecord`], whose geometry resolves to a
//! [`Jurisdiction`], which resolves to a [`ZoningResult`]. The
//! [`config`] module holds the TOML schemas for county endpoint tables
//! and discovery keyword lists.

pub mod config;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Name reported for parcels outside every municipal boundary.
pub const UNINCORPORATED: &str = "Unincorporated";

/// A county the lookup tools know about.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum County {
    /// Pinellas County, FL.
    Pinellas,
    /// Hillsborough County, FL.
    Hillsborough,
    /// Pasco County, FL.
    Pasco,
}

impl County {
    /// Every county, in selector order.
    pub const ALL: &[Self] = &[Self::Pinellas, Self::Hillsborough, Self::Pasco];

    /// Human-readable county name (e.g. "Pinellas").
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pinellas => "Pinellas",
            Self::Hillsborough => "Hillsborough",
            Self::Pasco => "Pasco",
        }
    }
}

/// The lookup target entered by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParcelQuery {
    county: County,
    parcel_id: String,
}

impl ParcelQuery {
    /// Builds a query from raw user input, trimming the parcel ID.
    ///
    /// Returns `None` when the parcel ID is blank.
    #[must_use]
    pub fn new(county: County, parcel_id: &str) -> Option<Self> {
        let parcel_id = parcel_id.trim();
        if parcel_id.is_empty() {
            return None;
        }
        Some(Self {
            county,
            parcel_id: parcel_id.to_string(),
        })
    }

    /// The county to search.
    #[must_use]
    pub const fn county(&self) -> County {
        self.county
    }

    /// The trimmed parcel identifier.
    #[must_use]
    pub fn parcel_id(&self) -> &str {
        &self.parcel_id
    }
}

/// A parcel as returned by the county parcel service.
#[derive(Debug, Clone, PartialEq)]
pub struct ParcelRecord {
    /// Parcel identifier as entered.
    pub parcel_id: String,
    /// County the parcel was resolved in.
    pub county: County,
    /// Parcel shape in WGS84, if the service returned one.
    pub geometry: Option<geo::Geometry<f64>>,
    /// Owner name.
    pub owner: Option<String>,
    /// Site address.
    pub address: Option<String>,
    /// Municipality as recorded by the county (may differ from the
    /// spatially resolved [`Jurisdiction`]).
    pub city: Option<String>,
    /// ZIP code.
    pub zip: Option<String>,
    /// Property appraiser use classification, DOR code prefix removed.
    pub property_use: Option<String>,
    /// Land area in acres.
    pub acreage: Option<f64>,
    /// Every attribute returned by the service, stringified.
    pub raw_attributes: BTreeMap<String, String>,
}

/// The municipal (or county) authority a parcel falls under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Jurisdiction {
    /// Municipality name, or [`UNINCORPORATED`].
    pub name: String,
    /// Whether the parcel lies outside every municipal boundary.
    pub is_unincorporated: bool,
}

impl Jurisdiction {
    /// A named municipality.
    #[must_use]
    pub fn municipality(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            is_unincorporated: false,
        }
    }

    /// The unincorporated county area.
    #[must_use]
    pub fn unincorporated() -> Self {
        Self {
            name: UNINCORPORATED.to_string(),
            is_unincorporated: true,
        }
    }

    /// The name normalized for endpoint table lookups.
    #[must_use]
    pub fn key(&self) -> String {
        normalize_jurisdiction_name(&self.name)
    }
}

/// Which designation a layer or field carries.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DesignationKind {
    /// Current zoning district.
    Zoning,
    /// Comprehensive-plan future land use category.
    FutureLandUse,
}

impl DesignationKind {
    /// Short label used in messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Zoning => "zoning",
            Self::FutureLandUse => "FLU",
        }
    }
}

/// A service layer and the field holding one designation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerBinding {
    /// Layer URL (`.../MapServer/<n>` or `.../FeatureServer/<n>`).
    pub service_url: String,
    /// Layer index within the service, when known.
    pub layer_id: Option<String>,
    /// Attribute holding the designation code. `None` means the field is
    /// chosen from layer metadata at query time.
    pub field: Option<String>,
}

/// Where to query zoning and FLU for one jurisdiction.
///
/// Discovery may bind only one designation; the other is left `None` and
/// the reason is kept in `unbound`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    /// Jurisdiction name as configured or resolved.
    pub jurisdiction_name: String,
    /// Zoning layer binding.
    pub zoning: Option<LayerBinding>,
    /// Future land use layer binding.
    pub future_land_use: Option<LayerBinding>,
    /// Why an unbound designation could not be bound.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unbound: Vec<DiscoveryFailure>,
}

impl EndpointConfig {
    /// The zoning layer URL, else the FLU layer URL.
    #[must_use]
    pub fn service_url(&self) -> Option<&str> {
        self.zoning
            .as_ref()
            .or(self.future_land_use.as_ref())
            .map(|b| b.service_url.as_str())
    }

    /// The zoning code field, if bound.
    #[must_use]
    pub fn zoning_field(&self) -> Option<&str> {
        self.zoning.as_ref().and_then(|b| b.field.as_deref())
    }

    /// The FLU code field, if bound.
    #[must_use]
    pub fn flu_field(&self) -> Option<&str> {
        self.future_land_use.as_ref().and_then(|b| b.field.as_deref())
    }

    /// The binding for a designation kind.
    #[must_use]
    pub const fn binding(&self, kind: DesignationKind) -> Option<&LayerBinding> {
        match kind {
            DesignationKind::Zoning => self.zoning.as_ref(),
            DesignationKind::FutureLandUse => self.future_land_use.as_ref(),
        }
    }

    /// Why `kind` is unbound. Falls back to [`DiscoveryFailure::NoFieldMatch`]
    /// when no reason was recorded.
    #[must_use]
    pub fn unbound_reason(&self, kind: DesignationKind) -> DiscoveryFailure {
        self.unbound
            .iter()
            .find(|f| f.designation() == Some(kind))
            .cloned()
            .unwrap_or(DiscoveryFailure::NoFieldMatch { designation: kind })
    }
}

/// One zoning or FLU value read from a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Designation {
    /// Code as stored in the layer (e.g. "R-3").
    pub code: String,
    /// Human-readable description, when the layer provides one.
    pub description: Option<String>,
}

/// How a [`ZoningResult`] was obtained.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ZoningSource {
    /// Queried from a statically configured endpoint.
    KnownEndpoint,
    /// Queried from a layer found by auto-discovery.
    AutoDiscovered,
    /// No automated source produced a complete answer.
    Manual,
}

/// Why auto-discovery could not produce an [`EndpointConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoveryFailure {
    /// The application URL carried no recognizable item ID or host.
    InvalidAppUrl {
        /// The URL as configured.
        url: String,
    },
    /// Neither the application item nor its data document could be read.
    AppItemUnavailable,
    /// The manifests contained no layer titled like zoning or FLU.
    NoZoningLayer,
    /// No candidate layer had a field matching the designation keywords.
    NoFieldMatch {
        /// Designation that could not be bound.
        designation: DesignationKind,
    },
    /// Two or more fields scored equally for the designation.
    AmbiguousFieldMatch {
        /// Designation that could not be bound.
        designation: DesignationKind,
        /// Tied field names.
        candidates: Vec<String>,
    },
}

impl DiscoveryFailure {
    /// The designation a field-level failure applies to.
    #[must_use]
    pub const fn designation(&self) -> Option<DesignationKind> {
        match self {
            Self::NoFieldMatch { designation } | Self::AmbiguousFieldMatch { designation, .. } => {
                Some(*designation)
            }
            Self::InvalidAppUrl { .. } | Self::AppItemUnavailable | Self::NoZoningLayer => None,
        }
    }
}

impl fmt::Display for DiscoveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAppUrl { url } => write!(f, "could not parse an app item id from {url}"),
            Self::AppItemUnavailable => f.write_str("app item configuration unavailable"),
            Self::NoZoningLayer => f.write_str("no zoning layer found"),
            Self::NoFieldMatch { designation } => {
                write!(f, "no {} field found", designation.label())
            }
            Self::AmbiguousFieldMatch {
                designation,
                candidates,
            } => write!(
                f,
                "ambiguous field match for {}: {}",
                designation.label(),
                candidates.join(", ")
            ),
        }
    }
}

/// Why a [`ZoningResult`] requires manual entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManualReason {
    /// The jurisdiction has neither a known endpoint nor an app URL.
    NoSourceConfigured,
    /// Auto-discovery ran and failed.
    DiscoveryFailed {
        /// What went wrong.
        failure: DiscoveryFailure,
    },
    /// The bound layer returned no usable value at the parcel location.
    NoIntersectingFeature {
        /// Designation that came back empty.
        designation: DesignationKind,
    },
}

impl fmt::Display for ManualReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSourceConfigured => f.write_str("no zoning source configured"),
            Self::DiscoveryFailed { failure } => write!(f, "discovery failed: {failure}"),
            Self::NoIntersectingFeature { designation } => {
                write!(f, "no {} value at parcel location", designation.label())
            }
        }
    }
}

/// Terminal output of the zoning/FLU resolution pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoningResult {
    /// Jurisdiction the result applies to.
    pub jurisdiction: String,
    /// Distinct zoning designations at the parcel (several when zoning
    /// splits the parcel).
    pub zoning: Vec<Designation>,
    /// Distinct FLU designations at the parcel.
    pub future_land_use: Vec<Designation>,
    /// Where the values came from.
    pub source: ZoningSource,
    /// Set whenever `source` is [`ZoningSource::Manual`].
    pub manual_reason: Option<ManualReason>,
}

impl ZoningResult {
    /// A result that asks the user to enter zoning and FLU by hand.
    ///
    /// Starts empty; callers may attach partial values found so far, the
    /// source stays [`ZoningSource::Manual`] either way.
    #[must_use]
    pub fn manual(jurisdiction: &str, reason: ManualReason) -> Self {
        Self {
            jurisdiction: jurisdiction.to_string(),
            zoning: Vec::new(),
            future_land_use: Vec::new(),
            source: ZoningSource::Manual,
            manual_reason: Some(reason),
        }
    }

    /// Distinct zoning codes joined with `", "`.
    #[must_use]
    pub fn zoning_code(&self) -> Option<String> {
        join_codes(&self.zoning)
    }

    /// Distinct FLU codes joined with `", "`.
    #[must_use]
    pub fn flu_code(&self) -> Option<String> {
        join_codes(&self.future_land_use)
    }

    /// Whether the user must supply zoning/FLU by hand.
    #[must_use]
    pub fn needs_manual_entry(&self) -> bool {
        self.source == ZoningSource::Manual
    }
}

fn join_codes(designations: &[Designation]) -> Option<String> {
    if designations.is_empty() {
        return None;
    }
    Some(
        designations
            .iter()
            .map(|d| d.code.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Land area scraped from the property appraiser's site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandArea {
    /// Square feet.
    pub square_feet: u64,
    /// Acres.
    pub acres: f64,
}

/// The classification every lookup failure is reduced to before it
/// reaches a user.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Valid query, no matching record.
    NotFound,
    /// Transport failure or timeout.
    NetworkError,
    /// The response was not shaped as expected.
    SchemaMismatch,
    /// Auto-discovery found no usable layer or field.
    DiscoveryFailed,
    /// Missing or invalid user input.
    ValidationError,
}

/// Normalizes a jurisdiction name for table lookups.
///
/// Lowercases, turns punctuation into spaces, collapses whitespace, and
/// drops a leading "city of" / "town of" / "village of".
#[must_use]
pub fn normalize_jurisdiction_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    let words = match words.as_slice() {
        ["city" | "town" | "village", "of", rest @ ..] if !rest.is_empty() => rest,
        all => all,
    };
    words.join(" ")
}
