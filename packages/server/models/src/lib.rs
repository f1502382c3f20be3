#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the site lookup server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the lookup and config types to allow independent evolution of the
//! API contract.

use serde::{Deserialize, Serialize};
use site_lookup_parcel_models::{County, ErrorKind, Jurisdiction, ParcelRecord, ZoningResult};
use site_lookup_proposal_models::{CatalogTask, FieldError};
use uuid::Uuid;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    pub healthy: bool,
    pub version: String,
}

/// A county in the selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCounty {
    /// Value to send back as the `county` parameter.
    pub id: County,
    pub name: String,
    /// Whether endpoint tables exist for this county.
    pub configured: bool,
}

/// A newly opened lookup session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSession {
    pub session_id: Uuid,
}

/// Query parameters for property and land area lookups.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcelQueryParams {
    pub county: County,
    pub parcel_id: String,
}

/// Query parameters for the zoning lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoningQueryParams {
    /// Session whose discovery cache to use. Without one the lookup runs
    /// against a throwaway cache.
    pub session_id: Option<Uuid>,
    pub county: County,
    pub parcel_id: String,
}

/// Query parameters for the discovery debug endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverQueryParams {
    pub session_id: Option<Uuid>,
    pub county: County,
    pub jurisdiction: String,
}

/// A parcel as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiParcel {
    pub parcel_id: String,
    pub county: County,
    pub address: Option<String>,
    pub owner: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub property_use: Option<String>,
    pub acreage: Option<f64>,
    /// Parcel shape as GeoJSON (WGS84).
    pub geometry: Option<geojson::Geometry>,
}

impl From<ParcelRecord> for ApiParcel {
    fn from(record: ParcelRecord) -> Self {
        Self {
            geometry: record
                .geometry
                .as_ref()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
            parcel_id: record.parcel_id,
            county: record.county,
            address: record.address,
            owner: record.owner,
            city: record.city,
            zip: record.zip,
            property_use: record.property_use,
            acreage: record.acreage,
        }
    }
}

/// Response of the zoning lookup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSiteLookup {
    pub parcel: ApiParcel,
    pub jurisdiction: Jurisdiction,
    pub zoning: ZoningResult,
    /// Zoning codes joined for display (e.g. `"R-3, C-2"`).
    pub zoning_code: Option<String>,
    /// FLU codes joined for display.
    pub flu_code: Option<String>,
    /// Whether the UI should ask for zoning/FLU by hand.
    pub needs_manual_entry: bool,
}

impl ApiSiteLookup {
    #[must_use]
    pub fn new(parcel: ParcelRecord, jurisdiction: Jurisdiction, zoning: ZoningResult) -> Self {
        Self {
            parcel: parcel.into(),
            jurisdiction,
            zoning_code: zoning.zoning_code(),
            flu_code: zoning.flu_code(),
            needs_manual_entry: zoning.needs_manual_entry(),
            zoning,
        }
    }
}

/// A catalog task as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTask {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub default_fee_cents: Option<u64>,
}

impl From<CatalogTask> for ApiTask {
    fn from(task: CatalogTask) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            default_fee_cents: task.default_fee_cents,
        }
    }
}

/// Error body for every failed API call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    /// Whether repeating the same request may succeed.
    pub retryable: bool,
    /// Whether the UI should fall back to manual entry.
    pub manual_entry: bool,
    /// Field-level problems, for validation failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl ApiError {
    /// A validation error that is neither retryable nor a manual-entry
    /// case.
    #[must_use]
    pub fn validation(message: impl Into<String>, fields: Vec<FieldError>) -> Self {
        Self {
            kind: ErrorKind::ValidationError,
            message: message.into(),
            retryable: false,
            manual_entry: false,
            fields,
        }
    }
}
