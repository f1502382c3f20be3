#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parcel to zoning/FLU resolution over county and city GIS services.
//!
//! A lookup runs as a short sequential pipeline:
//!
//! 1. [`parcel::resolve_parcel`]: parcel ID to geometry and attributes
//! 2. [`jurisdiction::resolve_jurisdiction`]: geometry to municipality
//! 3. [`zoning::resolve_zoning`]: municipality to zoning and FLU, from the
//!    known endpoint table, the session [`DiscoveryCache`], or
//!    [`discovery`] against the city's map application
//!
//! County endpoint tables and discovery keywords live in embedded TOML
//! (see [`registry`]).

pub mod cache;
pub mod discovery;
pub mod jurisdiction;
pub mod land_area;
pub mod parcel;
pub mod registry;
pub mod zoning;

pub use cache::DiscoveryCache;

use site_lookup_arcgis::{GisClient, LookupError};
use site_lookup_parcel_models::config::{CountyConfig, KeywordConfig};
use site_lookup_parcel_models::{Jurisdiction, ParcelQuery, ParcelRecord, ZoningResult};

/// Shared inputs for one lookup.
#[derive(Clone, Copy)]
pub struct LookupContext<'a> {
    /// Outbound HTTP seam.
    pub client: &'a dyn GisClient,
    /// Endpoint table for the parcel's county.
    pub county: &'a CountyConfig,
    /// Discovery keyword table.
    pub keywords: &'a KeywordConfig,
}

impl<'a> LookupContext<'a> {
    #[must_use]
    pub const fn new(
        client: &'a dyn GisClient,
        county: &'a CountyConfig,
        keywords: &'a KeywordConfig,
    ) -> Self {
        Self {
            client,
            county,
            keywords,
        }
    }
}

/// Everything the zoning lookup action resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteLookup {
    pub parcel: ParcelRecord,
    pub jurisdiction: Jurisdiction,
    pub zoning: ZoningResult,
}

/// Runs the full parcel, jurisdiction, zoning pipeline.
///
/// # Errors
///
/// Returns the first [`LookupError`] raised by a stage. Zoning sources
/// that cannot answer do not error; see [`zoning::resolve_zoning`].
pub async fn lookup_site(
    ctx: &LookupContext<'_>,
    cache: &mut DiscoveryCache,
    query: &ParcelQuery,
) -> Result<SiteLookup, LookupError> {
    let parcel = parcel::resolve_parcel(ctx.client, ctx.county, query).await?;
    let jurisdiction =
        jurisdiction::resolve_jurisdiction(ctx.client, ctx.county, parcel.geometry.as_ref())
            .await?;
    let zoning =
        zoning::resolve_zoning(ctx, cache, &jurisdiction, parcel.geometry.as_ref()).await?;
    Ok(SiteLookup {
        parcel,
        jurisdiction,
        zoning,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use site_lookup_arcgis::fixture::FixtureClient;
    use site_lookup_parcel_models::{County, ZoningSource};

    use super::*;

    const BASE: &str = "https://egis.pinellas.gov/gis/rest/services";

    #[tokio::test]
    async fn resolves_unincorporated_parcel_end_to_end() {
        let ring = json!([[[-82.80, 27.90], [-82.80, 27.91], [-82.79, 27.91], [-82.79, 27.90], [-82.80, 27.90]]]);
        let client = FixtureClient::new()
            .json(
                &format!("{BASE}/Accela/AccelaAddressParcel/MapServer/1/query"),
                json!({ "features": [{
                    "attributes": {
                        "PGIS.PGIS.Parcels.PARCELID": "12-34-56-00000-000-0010",
                        "SITEADDRESS": "100 ULMERTON RD"
                    },
                    "geometry": { "rings": ring }
                }] }),
            )
            .json(
                &format!("{BASE}/Boundaries/MunicipalBoundaries/MapServer/0/query"),
                json!({ "features": [] }),
            )
            .json(
                &format!("{BASE}/PlanningZoning/Zoning/MapServer/0"),
                json!({ "fields": [{ "name": "ZONECLASS", "alias": "Zone Class" }] }),
            )
            .json(
                &format!("{BASE}/PlanningZoning/Zoning/MapServer/0/query"),
                json!({ "features": [{ "attributes": { "ZONECLASS": "C-2" } }] }),
            )
            .json(
                &format!("{BASE}/PlanningZoning/FutureLandUse/MapServer/0"),
                json!({ "fields": [{ "name": "LANDUSE", "alias": "Land Use" }] }),
            )
            .json(
                &format!("{BASE}/PlanningZoning/FutureLandUse/MapServer/0/query"),
                json!({ "features": [{ "attributes": { "LANDUSE": "CG" } }] }),
            );
        let county = registry::county_config(County::Pinellas).unwrap();
        let keywords = registry::default_keywords();
        let ctx = LookupContext::new(&client, &county, &keywords);
        let query = ParcelQuery::new(County::Pinellas, "12-34-56-00000-000-0010").unwrap();

        let site = lookup_site(&ctx, &mut DiscoveryCache::new(), &query)
            .await
            .unwrap();

        assert_eq!(site.parcel.address.as_deref(), Some("100 ULMERTON RD"));
        assert!(site.jurisdiction.is_unincorporated);
        assert_eq!(site.zoning.source, ZoningSource::KnownEndpoint);
        assert_eq!(site.zoning.zoning_code().as_deref(), Some("C-2"));
        assert_eq!(site.zoning.flu_code().as_deref(), Some("CG"));
    }

    #[tokio::test]
    async fn parcel_without_geometry_fails_fast() {
        let client = FixtureClient::new().json(
            &format!("{BASE}/Accela/AccelaAddressParcel/MapServer/1/query"),
            json!({ "features": [{
                "attributes": { "PGIS.PGIS.Parcels.PARCELID": "12-34-56-00000-000-0010" },
                "geometry": null
            }] }),
        );
        let county = registry::county_config(County::Pinellas).unwrap();
        let keywords = registry::default_keywords();
        let ctx = LookupContext::new(&client, &county, &keywords);
        let query = ParcelQuery::new(County::Pinellas, "12-34-56-00000-000-0010").unwrap();

        let err = lookup_site(&ctx, &mut DiscoveryCache::new(), &query)
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::MissingGeometry));
        assert_eq!(client.requests().len(), 1);
    }
}
