//! Jurisdiction to zoning and FLU designations.
//!
//! Sources are tried in order: the county's known endpoint table, the
//! session cache, then auto-discovery from the city's map application.
//! A result only claims an automated source when both designations came
//! back with at least one value; anything less degrades to
//! [`ZoningSource::Manual`] with the reason attached.

use geo::Geometry;
use site_lookup_arcgis::query::{self, Feature, FieldInfo, LayerQuery};
use site_lookup_arcgis::{GisClient, LookupError};
use site_lookup_parcel_models::config::KeywordConfig;
use site_lookup_parcel_models::{
    Designation, DesignationKind, DiscoveryFailure, EndpointConfig, Jurisdiction, LayerBinding,
    ManualReason, UNINCORPORATED, ZoningResult, ZoningSource,
};

use crate::LookupContext;
use crate::cache::DiscoveryCache;
use crate::discovery::{self, heuristics};

/// Features requested per designation query. Split-zoned parcels rarely
/// touch more than a few districts.
const MAX_DESIGNATION_FEATURES: u32 = 25;

/// Resolves zoning and FLU for a parcel in `jurisdiction`.
///
/// # Errors
///
/// * [`LookupError::MissingGeometry`] if `geometry` is `None`
/// * [`LookupError::Network`] on transport failure or timeout, so the
///   caller can offer a retry
/// * [`LookupError::SchemaMismatch`] if a bound layer answers with an error
///
/// Discovery failures and empty query results are not errors; they come
/// back as a [`ZoningSource::Manual`] result.
pub async fn resolve_zoning(
    ctx: &LookupContext<'_>,
    cache: &mut DiscoveryCache,
    jurisdiction: &Jurisdiction,
    geometry: Option<&Geometry<f64>>,
) -> Result<ZoningResult, LookupError> {
    let geometry = geometry.ok_or(LookupError::MissingGeometry)?;

    let table_key = if jurisdiction.is_unincorporated {
        UNINCORPORATED
    } else {
        jurisdiction.name.as_str()
    };
    if let Some(known) = ctx.county.known_endpoint(table_key) {
        log::info!("Using known zoning endpoint for {}", jurisdiction.name);
        let endpoint = known.endpoint_config();
        return query_endpoint(ctx, &endpoint, ZoningSource::KnownEndpoint, jurisdiction, geometry)
            .await;
    }

    if let Some(endpoint) = cache.get(&jurisdiction.name) {
        log::info!("Using cached discovery for {}", jurisdiction.name);
        let endpoint = endpoint.clone();
        return query_endpoint(ctx, &endpoint, ZoningSource::AutoDiscovered, jurisdiction, geometry)
            .await;
    }

    let Some(app) = ctx.county.city_app(&jurisdiction.name) else {
        log::info!("No zoning source configured for {}", jurisdiction.name);
        return Ok(ZoningResult::manual(
            &jurisdiction.name,
            ManualReason::NoSourceConfigured,
        ));
    };

    match discovery::discover_endpoint(ctx.client, ctx.keywords, &jurisdiction.name, &app.app_url)
        .await
    {
        Ok(report) => {
            cache.insert(report.endpoint.clone());
            query_endpoint(
                ctx,
                &report.endpoint,
                ZoningSource::AutoDiscovered,
                jurisdiction,
                geometry,
            )
            .await
        }
        Err(LookupError::DiscoveryFailed(failure)) => {
            log::warn!("Discovery failed for {}: {failure}", jurisdiction.name);
            Ok(ZoningResult::manual(
                &jurisdiction.name,
                ManualReason::DiscoveryFailed { failure },
            ))
        }
        Err(e) => Err(e),
    }
}

/// Queries both designations and applies the completeness rule. Values
/// found before a designation comes back empty, or for the one kind
/// discovery could bind, are kept on the manual result.
async fn query_endpoint(
    ctx: &LookupContext<'_>,
    endpoint: &EndpointConfig,
    source: ZoningSource,
    jurisdiction: &Jurisdiction,
    geometry: &Geometry<f64>,
) -> Result<ZoningResult, LookupError> {
    let mut result = ZoningResult {
        jurisdiction: jurisdiction.name.clone(),
        zoning: Vec::new(),
        future_land_use: Vec::new(),
        source,
        manual_reason: None,
    };

    for kind in [DesignationKind::Zoning, DesignationKind::FutureLandUse] {
        let Some(binding) = endpoint.binding(kind) else {
            log::info!("No {} layer bound for {}", kind.label(), jurisdiction.name);
            result
                .manual_reason
                .get_or_insert(ManualReason::DiscoveryFailed {
                    failure: endpoint.unbound_reason(kind),
                });
            continue;
        };
        let values = match query_designations(ctx.client, ctx.keywords, binding, kind, geometry)
            .await
        {
            Ok(values) => values,
            Err(LookupError::DiscoveryFailed(failure)) => {
                result
                    .manual_reason
                    .get_or_insert(ManualReason::DiscoveryFailed { failure });
                continue;
            }
            Err(e) => return Err(e),
        };

        if values.is_empty() {
            log::info!("No {} value at parcel location", kind.label());
            result
                .manual_reason
                .get_or_insert(ManualReason::NoIntersectingFeature { designation: kind });
        }
        match kind {
            DesignationKind::Zoning => result.zoning = values,
            DesignationKind::FutureLandUse => result.future_land_use = values,
        }
    }

    if result.manual_reason.is_some() {
        result.source = ZoningSource::Manual;
    }
    Ok(result)
}

/// Reads every distinct, non-empty designation intersecting `geometry`
/// from a bound layer, in service order.
///
/// When the binding names no field, one is picked from the layer's
/// metadata with the keyword heuristics. Descriptions come from the
/// field's coded-value domain, else from the first configured description
/// attribute.
///
/// # Errors
///
/// * [`LookupError::DiscoveryFailed`] if no code field can be picked
/// * [`LookupError::Network`] / [`LookupError::SchemaMismatch`] from the
///   layer requests
pub async fn query_designations(
    client: &dyn GisClient,
    keywords: &KeywordConfig,
    binding: &LayerBinding,
    kind: DesignationKind,
    geometry: &Geometry<f64>,
) -> Result<Vec<Designation>, LookupError> {
    let metadata = match query::layer_metadata(client, &binding.service_url).await {
        Ok(metadata) => Some(metadata),
        Err(e @ LookupError::Network { .. }) => return Err(e),
        Err(e) if binding.field.is_some() => {
            log::warn!("No metadata for {}: {e}", binding.service_url);
            None
        }
        Err(e) => return Err(e),
    };

    let field = match &binding.field {
        Some(field) => field.clone(),
        None => pick_code_field(
            keywords,
            kind,
            metadata.as_ref().map_or(&[][..], |m| m.fields.as_slice()),
        )?,
    };

    let coded_values = metadata
        .as_ref()
        .and_then(|m| {
            m.fields
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case(&field))
        })
        .map(|f| f.coded_values.clone())
        .unwrap_or_default();

    let request = LayerQuery::intersecting(geometry)
        .ok_or_else(|| LookupError::validation("geometry", "unsupported parcel geometry type"))?
        .with_record_count(MAX_DESIGNATION_FEATURES);
    let features = query::query_features(client, &binding.service_url, &request).await?;
    log::debug!(
        "{} query on {} returned {} feature(s)",
        kind.label(),
        binding.service_url,
        features.len()
    );

    let mut designations: Vec<Designation> = Vec::new();
    for feature in &features {
        let Some(code) = feature.text(&field) else {
            continue;
        };
        if designations.iter().any(|d| d.code == code) {
            continue;
        }
        let description = coded_values
            .get(&code)
            .cloned()
            .or_else(|| describe(feature, &field, &keywords.description_fields));
        designations.push(Designation { code, description });
    }
    Ok(designations)
}

fn pick_code_field(
    keywords: &KeywordConfig,
    kind: DesignationKind,
    fields: &[FieldInfo],
) -> Result<String, LookupError> {
    match heuristics::pick_field(&keywords.fields, kind, fields) {
        heuristics::FieldPick::Bound(field) => {
            log::debug!("Picked {} field {field} from layer metadata", kind.label());
            Ok(field)
        }
        heuristics::FieldPick::Ambiguous(candidates) => Err(LookupError::DiscoveryFailed(
            DiscoveryFailure::AmbiguousFieldMatch {
                designation: kind,
                candidates,
            },
        )),
        heuristics::FieldPick::NoMatch => Err(LookupError::DiscoveryFailed(
            DiscoveryFailure::NoFieldMatch { designation: kind },
        )),
    }
}

/// First non-empty description attribute other than the code field.
fn describe(feature: &Feature, code_field: &str, description_fields: &[String]) -> Option<String> {
    description_fields
        .iter()
        .filter(|name| !name.eq_ignore_ascii_case(code_field))
        .find_map(|name| feature.text(name))
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, polygon};
    use serde_json::{Value, json};
    use site_lookup_arcgis::fixture::{FixtureClient, FixtureResponse};
    use site_lookup_parcel_models::config::{CountyConfig, KeywordConfig};
    use site_lookup_parcel_models::{County, DiscoveryFailure};

    use super::*;
    use crate::registry;

    const COUNTY_ZONING: &str =
        "https://egis.pinellas.gov/gis/rest/services/PlanningZoning/Zoning/MapServer/0";
    const COUNTY_FLU: &str =
        "https://egis.pinellas.gov/gis/rest/services/PlanningZoning/FutureLandUse/MapServer/0";

    const LARGO_ITEMS: &str = "https://largo.maps.arcgis.com/sharing/rest/content/items";
    const LARGO_APP: &str = "8a7b6c5d4e3f4a2b9c8d7e6f5a4b3c2d";
    const LARGO_WEBMAP: &str = "0f0e0d0c0b0a09080706050403020100";
    const LARGO_ZONING: &str = "https://gis.largo.com/arcgis/rest/services/Planning/MapServer/3";

    const CLEARWATER_ITEMS: &str =
        "https://clearwater.maps.arcgis.com/sharing/rest/content/items";
    const CLEARWATER_APP: &str = "1f4c3a2b9d8e4f6a8b7c6d5e4f3a2b1c";

    fn parcel() -> Geometry<f64> {
        Geometry::MultiPolygon(MultiPolygon(vec![polygon![
            (x: -82.80, y: 27.90),
            (x: -82.80, y: 27.91),
            (x: -82.79, y: 27.91),
            (x: -82.79, y: 27.90),
            (x: -82.80, y: 27.90),
        ]]))
    }

    fn features(rows: &[Value]) -> Value {
        json!({
            "features": rows
                .iter()
                .map(|attributes| json!({ "attributes": attributes }))
                .collect::<Vec<_>>()
        })
    }

    fn fixtures() -> (CountyConfig, KeywordConfig) {
        (
            registry::county_config(County::Pinellas).unwrap(),
            registry::default_keywords(),
        )
    }

    fn county_layers(client: FixtureClient) -> FixtureClient {
        client
            .json(
                COUNTY_ZONING,
                json!({ "name": "Zoning", "fields": [{
                    "name": "ZONECLASS",
                    "alias": "Zone Class",
                    "domain": { "type": "codedValue", "codedValues": [
                        { "code": "R-3", "name": "Residential, Single Family" },
                        { "code": "C-2", "name": "General Retail Commercial" }
                    ] }
                }] }),
            )
            .json(
                COUNTY_FLU,
                json!({ "name": "Future Land Use", "fields": [
                    { "name": "OBJECTID", "alias": "OBJECTID" },
                    { "name": "LANDUSE", "alias": "Land Use" },
                    { "name": "LANDUSE_DESC", "alias": "Land Use Description" }
                ] }),
            )
    }

    #[tokio::test]
    async fn known_endpoint_reports_every_intersecting_zone() {
        let client = county_layers(FixtureClient::new())
            .json(
                &format!("{COUNTY_ZONING}/query"),
                features(&[
                    json!({ "ZONECLASS": "R-3" }),
                    json!({ "ZONECLASS": "C-2" }),
                    json!({ "ZONECLASS": "R-3" }),
                    json!({ "ZONECLASS": null }),
                ]),
            )
            .json(
                &format!("{COUNTY_FLU}/query"),
                features(&[json!({ "LANDUSE": "RL", "LANDUSE_DESC": "Residential Low" })]),
            );
        let (county, keywords) = fixtures();
        let ctx = LookupContext::new(&client, &county, &keywords);
        let mut cache = DiscoveryCache::new();

        let result = resolve_zoning(
            &ctx,
            &mut cache,
            &Jurisdiction::unincorporated(),
            Some(&parcel()),
        )
        .await
        .unwrap();

        assert_eq!(result.source, ZoningSource::KnownEndpoint);
        assert_eq!(result.zoning_code().as_deref(), Some("R-3, C-2"));
        assert_eq!(
            result.zoning[1].description.as_deref(),
            Some("General Retail Commercial")
        );
        assert_eq!(result.flu_code().as_deref(), Some("RL"));
        assert_eq!(
            result.future_land_use[0].description.as_deref(),
            Some("Residential Low")
        );
        assert!(result.manual_reason.is_none());
    }

    #[tokio::test]
    async fn empty_flu_degrades_to_manual_with_partial_values() {
        let client = county_layers(FixtureClient::new())
            .json(
                &format!("{COUNTY_ZONING}/query"),
                features(&[json!({ "ZONECLASS": "C-2" })]),
            )
            .json(&format!("{COUNTY_FLU}/query"), features(&[]));
        let (county, keywords) = fixtures();
        let ctx = LookupContext::new(&client, &county, &keywords);

        let result = resolve_zoning(
            &ctx,
            &mut DiscoveryCache::new(),
            &Jurisdiction::unincorporated(),
            Some(&parcel()),
        )
        .await
        .unwrap();

        assert_eq!(result.source, ZoningSource::Manual);
        assert_eq!(
            result.manual_reason,
            Some(ManualReason::NoIntersectingFeature {
                designation: DesignationKind::FutureLandUse
            })
        );
        assert_eq!(result.zoning_code().as_deref(), Some("C-2"));
    }

    #[tokio::test]
    async fn omitted_field_is_picked_from_metadata() {
        // Safety Harbor's FLU binding names no field.
        let client = county_layers(FixtureClient::new())
            .json(
                &format!("{COUNTY_ZONING}/query"),
                features(&[json!({ "ZONECLASS": "R-3" })]),
            )
            .json(
                &format!("{COUNTY_FLU}/query"),
                features(&[json!({ "LANDUSE": "RU", "LANDUSE_DESC": "Residential Urban" })]),
            );
        let (county, keywords) = fixtures();
        let ctx = LookupContext::new(&client, &county, &keywords);

        let result = resolve_zoning(
            &ctx,
            &mut DiscoveryCache::new(),
            &Jurisdiction::municipality("City of Safety Harbor"),
            Some(&parcel()),
        )
        .await
        .unwrap();

        assert_eq!(result.source, ZoningSource::KnownEndpoint);
        assert_eq!(result.flu_code().as_deref(), Some("RU"));
    }

    #[tokio::test]
    async fn unconfigured_city_needs_manual_entry() {
        let client = FixtureClient::new();
        let (county, keywords) = fixtures();
        let ctx = LookupContext::new(&client, &county, &keywords);

        let result = resolve_zoning(
            &ctx,
            &mut DiscoveryCache::new(),
            &Jurisdiction::municipality("Oldsmar"),
            Some(&parcel()),
        )
        .await
        .unwrap();

        assert!(result.needs_manual_entry());
        assert_eq!(result.manual_reason, Some(ManualReason::NoSourceConfigured));
        assert!(client.requests().is_empty());
    }

    fn largo_client() -> FixtureClient {
        FixtureClient::new()
            .json(&format!("{LARGO_ITEMS}/{LARGO_APP}"), json!({ "id": LARGO_APP }))
            .json(
                &format!("{LARGO_ITEMS}/{LARGO_APP}/data"),
                json!({ "map": { "itemId": LARGO_WEBMAP } }),
            )
            .json(
                &format!("{LARGO_ITEMS}/{LARGO_WEBMAP}/data"),
                json!({ "operationalLayers": [{
                    "title": "Zoning Districts",
                    "url": LARGO_ZONING,
                    "layerDefinition": { "fields": [
                        { "name": "ZONE_CODE", "alias": "Zone Code" },
                        { "name": "FLU_DESC", "alias": "Future Land Use" }
                    ] }
                }] }),
            )
            .json(
                LARGO_ZONING,
                json!({ "name": "Zoning Districts", "fields": [
                    { "name": "ZONE_CODE", "alias": "Zone Code" },
                    { "name": "FLU_DESC", "alias": "Future Land Use" }
                ] }),
            )
            .json(
                &format!("{LARGO_ZONING}/query"),
                features(&[json!({ "ZONE_CODE": "MDR", "FLU_DESC": "Residential Medium" })]),
            )
    }

    #[tokio::test]
    async fn discovered_endpoint_is_cached_for_the_session() {
        let client = largo_client();
        let (county, keywords) = fixtures();
        let ctx = LookupContext::new(&client, &county, &keywords);
        let mut cache = DiscoveryCache::new();
        let largo = Jurisdiction::municipality("LARGO");

        let first = resolve_zoning(&ctx, &mut cache, &largo, Some(&parcel()))
            .await
            .unwrap();
        let second = resolve_zoning(&ctx, &mut cache, &largo, Some(&parcel()))
            .await
            .unwrap();

        assert_eq!(first.source, ZoningSource::AutoDiscovered);
        assert_eq!(first.zoning_code().as_deref(), Some("MDR"));
        assert_eq!(first.flu_code().as_deref(), Some("Residential Medium"));
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(
            client.request_count(&format!("{LARGO_ITEMS}/{LARGO_APP}/data")),
            1
        );
    }

    #[tokio::test]
    async fn zoning_only_app_keeps_zoning_and_flags_flu() {
        let fields = json!([
            { "name": "OBJECTID", "alias": "OBJECTID" },
            { "name": "ZONE_CODE", "alias": "Zone Code" }
        ]);
        let client = FixtureClient::new()
            .json(&format!("{LARGO_ITEMS}/{LARGO_APP}"), json!({ "id": LARGO_APP }))
            .json(
                &format!("{LARGO_ITEMS}/{LARGO_APP}/data"),
                json!({ "map": { "itemId": LARGO_WEBMAP } }),
            )
            .json(
                &format!("{LARGO_ITEMS}/{LARGO_WEBMAP}/data"),
                json!({ "operationalLayers": [{
                    "title": "Zoning",
                    "url": LARGO_ZONING,
                    "layerDefinition": { "fields": fields.clone() }
                }] }),
            )
            .json(LARGO_ZONING, json!({ "name": "Zoning", "fields": fields }))
            .json(
                &format!("{LARGO_ZONING}/query"),
                features(&[json!({ "ZONE_CODE": "MDR" })]),
            );
        let (county, keywords) = fixtures();
        let ctx = LookupContext::new(&client, &county, &keywords);
        let mut cache = DiscoveryCache::new();
        let largo = Jurisdiction::municipality("Largo");
        let expected_reason = Some(ManualReason::DiscoveryFailed {
            failure: DiscoveryFailure::NoFieldMatch {
                designation: DesignationKind::FutureLandUse,
            },
        });

        let first = resolve_zoning(&ctx, &mut cache, &largo, Some(&parcel()))
            .await
            .unwrap();
        assert_eq!(first.source, ZoningSource::Manual);
        assert_eq!(first.zoning_code().as_deref(), Some("MDR"));
        assert!(first.future_land_use.is_empty());
        assert_eq!(first.manual_reason, expected_reason);
        assert_eq!(cache.len(), 1);

        let second = resolve_zoning(&ctx, &mut cache, &largo, Some(&parcel()))
            .await
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(
            client.request_count(&format!("{LARGO_ITEMS}/{LARGO_APP}/data")),
            1
        );
    }

    #[tokio::test]
    async fn failed_discovery_is_manual_and_not_cached() {
        let client = FixtureClient::new()
            .json(
                &format!("{CLEARWATER_ITEMS}/{CLEARWATER_APP}"),
                json!({ "id": CLEARWATER_APP }),
            )
            .json(
                &format!("{CLEARWATER_ITEMS}/{CLEARWATER_APP}/data"),
                json!({ "operationalLayers": [
                    { "title": "Parks", "url": "https://gis.myclearwater.com/arcgis/rest/services/Parks/MapServer/0" }
                ] }),
            );
        let (county, keywords) = fixtures();
        let ctx = LookupContext::new(&client, &county, &keywords);
        let mut cache = DiscoveryCache::new();
        let clearwater = Jurisdiction::municipality("Clearwater");

        let result = resolve_zoning(&ctx, &mut cache, &clearwater, Some(&parcel()))
            .await
            .unwrap();
        assert_eq!(
            result.manual_reason,
            Some(ManualReason::DiscoveryFailed {
                failure: DiscoveryFailure::NoZoningLayer
            })
        );
        assert!(cache.is_empty());

        resolve_zoning(&ctx, &mut cache, &clearwater, Some(&parcel()))
            .await
            .unwrap();
        assert_eq!(
            client.request_count(&format!("{CLEARWATER_ITEMS}/{CLEARWATER_APP}/data")),
            2
        );
    }

    #[tokio::test]
    async fn timeout_surfaces_then_next_call_succeeds() {
        let client = county_layers(FixtureClient::new())
            .route_once(&format!("{COUNTY_ZONING}/query"), FixtureResponse::Timeout)
            .json(
                &format!("{COUNTY_ZONING}/query"),
                features(&[json!({ "ZONECLASS": "R-3" })]),
            )
            .json(
                &format!("{COUNTY_FLU}/query"),
                features(&[json!({ "LANDUSE": "RL" })]),
            );
        let (county, keywords) = fixtures();
        let ctx = LookupContext::new(&client, &county, &keywords);
        let mut cache = DiscoveryCache::new();
        let jurisdiction = Jurisdiction::unincorporated();

        let err = resolve_zoning(&ctx, &mut cache, &jurisdiction, Some(&parcel()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), site_lookup_parcel_models::ErrorKind::NetworkError);
        assert!(err.is_retryable());

        let result = resolve_zoning(&ctx, &mut cache, &jurisdiction, Some(&parcel()))
            .await
            .unwrap();
        assert_eq!(result.zoning_code().as_deref(), Some("R-3"));
    }

    #[tokio::test]
    async fn missing_geometry_fails_fast() {
        let client = FixtureClient::new();
        let (county, keywords) = fixtures();
        let ctx = LookupContext::new(&client, &county, &keywords);

        let err = resolve_zoning(
            &ctx,
            &mut DiscoveryCache::new(),
            &Jurisdiction::unincorporated(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LookupError::MissingGeometry));
        assert!(client.requests().is_empty());
    }
}
