#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `ArcGIS` REST plumbing for parcel and zoning lookups.
//!
//! Every outbound request goes through the [`GisClient`] trait so the
//! resolvers can be exercised against fixtures. [`HttpGisClient`] is the
//! `reqwest` implementation with a bounded timeout and a single retry on
//! transient failures. The [`query`] module builds `FeatureServer` /
//! `MapServer` queries and reads features and layer metadata, and
//! [`geometry`] converts between Esri JSON and [`geo`] types.
//!
//! All failures are reduced to [`LookupError`] at this boundary, so raw
//! transport errors never reach a user.

pub mod client;
#[cfg(feature = "fixture-client")]
pub mod fixture;
pub mod geometry;
pub mod query;

pub use client::{ClientConfig, GisClient, HttpGisClient};
pub use site_lookup_parcel_models::ErrorKind;

use site_lookup_parcel_models::DiscoveryFailure;
use thiserror::Error;

/// Errors produced by parcel, jurisdiction, zoning, and discovery lookups.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    /// The query was valid but matched nothing.
    #[error("{what} not found")]
    NotFound {
        /// What was being looked up.
        what: String,
    },

    /// Transport failure, non-success status, or timeout.
    #[error("Network error for {url}: {message}")]
    Network {
        /// Request URL.
        url: String,
        /// Description of the failure.
        message: String,
        /// Whether the request hit the client timeout.
        timed_out: bool,
    },

    /// The response was not shaped as expected.
    #[error("Unexpected response from {url}: {message}")]
    SchemaMismatch {
        /// Request URL.
        url: String,
        /// Description of what was missing or malformed.
        message: String,
    },

    /// Auto-discovery found no usable layer or field.
    #[error("Discovery failed: {0}")]
    DiscoveryFailed(DiscoveryFailure),

    /// The parcel record carried no geometry to intersect.
    #[error("Parcel has no geometry; jurisdiction cannot be determined")]
    MissingGeometry,

    /// User input was missing or invalid.
    #[error("Invalid {field}: {message}")]
    Validation {
        /// Input field name.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

impl LookupError {
    /// Shorthand for a [`LookupError::SchemaMismatch`].
    #[must_use]
    pub fn schema(url: &str, message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            url: url.to_string(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`LookupError::Validation`].
    #[must_use]
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// The user-facing classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Network { .. } => ErrorKind::NetworkError,
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::DiscoveryFailed(_) => ErrorKind::DiscoveryFailed,
            Self::MissingGeometry | Self::Validation { .. } => ErrorKind::ValidationError,
        }
    }

    /// Whether retrying the same action may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Whether the user should be offered manual entry instead.
    #[must_use]
    pub const fn needs_manual_entry(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFound | ErrorKind::SchemaMismatch | ErrorKind::DiscoveryFailed
        ) || matches!(self, Self::MissingGeometry)
    }
}
