#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Proposal input types.
//!
//! A [`ProposalInput`] combines a [`PropertySummary`] (usually filled from
//! a site lookup), scope-of-work [`ScopeTask`]s, and a [`FeeSchedule`].
//! [`Branding`] and [`TaskCatalog`] are the TOML schemas for the firm's
//! letterhead and standard task list.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use site_lookup_parcel_models::{County, LandArea, ParcelRecord, ZoningResult};

/// Property facts printed in the proposal's summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySummary {
    pub county: County,
    pub parcel_id: String,
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub property_use: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub zoning: Option<String>,
    #[serde(default)]
    pub future_land_use: Option<String>,
    #[serde(default)]
    pub land_area: Option<LandArea>,
}

impl PropertySummary {
    /// Copies the printable attributes of a resolved parcel. The address
    /// is empty when the parcel service had none.
    #[must_use]
    pub fn from_parcel(parcel: &ParcelRecord) -> Self {
        Self {
            county: parcel.county,
            parcel_id: parcel.parcel_id.clone(),
            address: parcel.address.clone().unwrap_or_default(),
            city: parcel.city.clone(),
            zip: parcel.zip.clone(),
            owner: parcel.owner.clone(),
            property_use: parcel.property_use.clone(),
            jurisdiction: None,
            zoning: None,
            future_land_use: None,
            land_area: None,
        }
    }

    /// Fills jurisdiction, zoning, and FLU from a zoning lookup.
    #[must_use]
    pub fn with_zoning(mut self, zoning: &ZoningResult) -> Self {
        self.jurisdiction = Some(zoning.jurisdiction.clone());
        self.zoning = zoning.zoning_code();
        self.future_land_use = zoning.flu_code();
        self
    }

    #[must_use]
    pub const fn with_land_area(mut self, land_area: LandArea) -> Self {
        self.land_area = Some(land_area);
        self
    }
}

/// One scope-of-work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeTask {
    /// Catalog ID, for tasks picked from the [`TaskCatalog`].
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Fee in cents. Only read under [`FeeSchedule::PerTask`].
    #[serde(default)]
    pub fee_cents: Option<u64>,
}

/// How the fee table is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeeSchedule {
    /// One lump-sum total for the whole scope.
    Flat {
        #[serde(rename = "totalCents")]
        total_cents: u64,
    },
    /// Each task carries its own fee; the total is their sum.
    PerTask,
}

/// Everything the document assembler needs besides branding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalInput {
    pub project_name: String,
    pub client_name: String,
    #[serde(default)]
    pub client_company: Option<String>,
    #[serde(default)]
    pub client_address: Option<String>,
    pub property: PropertySummary,
    pub tasks: Vec<ScopeTask>,
    pub fees: FeeSchedule,
    pub proposal_date: NaiveDate,
}

/// Firm letterhead and signatory (`branding.toml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branding {
    pub firm_name: String,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub address_lines: Vec<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    pub signatory_name: String,
    pub signatory_title: String,
}

/// A standard task in the firm's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_fee_cents: Option<u64>,
}

impl CatalogTask {
    /// The task as it appears in a proposal, with its default fee.
    #[must_use]
    pub fn to_scope_task(&self) -> ScopeTask {
        ScopeTask {
            id: Some(self.id.clone()),
            title: self.title.clone(),
            description: self.description.clone(),
            fee_cents: self.default_fee_cents,
        }
    }
}

/// The `tasks.toml` schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCatalog {
    pub tasks: Vec<CatalogTask>,
}

/// A single input problem, keyed by the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// camelCase field path (e.g. `property.address`, `tasks[1].title`).
    pub field: String,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every problem found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Whether any error names `field`.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn deserializes_fee_schedules() {
        let flat: FeeSchedule =
            serde_json::from_value(json!({ "type": "flat", "totalCents": 500_000 })).unwrap();
        assert_eq!(
            flat,
            FeeSchedule::Flat {
                total_cents: 500_000
            }
        );
        let per_task: FeeSchedule = serde_json::from_value(json!({ "type": "per_task" })).unwrap();
        assert_eq!(per_task, FeeSchedule::PerTask);
    }

    #[test]
    fn deserializes_proposal_input_with_optional_fields_missing() {
        let input: ProposalInput = serde_json::from_value(json!({
            "projectName": "Ulmerton Retail",
            "clientName": "Jane Doe",
            "property": {
                "county": "pinellas",
                "parcelId": "12-34-56-00000-000-0010",
                "address": "100 ULMERTON RD"
            },
            "tasks": [{ "title": "Zoning verification" }],
            "fees": { "type": "per_task" },
            "proposalDate": "2026-03-02"
        }))
        .unwrap();
        assert_eq!(input.property.county, County::Pinellas);
        assert!(input.client_company.is_none());
        assert_eq!(input.tasks[0].fee_cents, None);
        assert_eq!(
            input.proposal_date,
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
        );
    }

    #[test]
    fn validation_errors_display_every_field() {
        let mut errors = ValidationErrors::default();
        errors.push("projectName", "required");
        errors.push("tasks", "at least one task is required");
        assert_eq!(errors.len(), 2);
        assert!(errors.has("tasks"));
        assert_eq!(
            errors.to_string(),
            "projectName: required; tasks: at least one task is required"
        );
    }
}
