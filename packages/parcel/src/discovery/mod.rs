//! Auto-discovery of zoning and FLU layers from a city's map application.
//!
//! Cities publish zoning maps as ArcGIS Web AppViewer or Experience
//! Builder apps. Their configuration (and the web map behind them) lists
//! the operational layers; [`discover_endpoint`] walks those manifests,
//! ranks layers by title keywords, and binds a code field for each
//! designation by scoring field names.

pub mod heuristics;
pub mod manifest;

use std::collections::BTreeMap;

use serde::Serialize;
use site_lookup_arcgis::query::{self, FieldInfo};
use site_lookup_arcgis::{GisClient, LookupError};
use site_lookup_parcel_models::config::{KeywordConfig, layer_id_from_url};
use site_lookup_parcel_models::{DesignationKind, DiscoveryFailure, EndpointConfig, LayerBinding};

use self::heuristics::FieldPick;
use self::manifest::{AppRef, DiscoveredLayer};

/// A candidate layer as ranked during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateLayer {
    pub title: String,
    pub url: String,
    pub score: i32,
}

/// What discovery found for one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    /// Portal host the app was read from.
    pub host: String,
    /// Application item ID.
    pub app_item_id: String,
    /// Web map item ID, when the app references one.
    pub webmap_id: Option<String>,
    /// Number of distinct layers in the manifests.
    pub layer_count: usize,
    /// Zoning/FLU candidate layers in document order.
    pub candidates: Vec<CandidateLayer>,
    /// The bound layers and fields.
    pub endpoint: EndpointConfig,
}

/// Discovers the zoning and FLU layers behind a city map application.
///
/// # Errors
///
/// * [`LookupError::DiscoveryFailed`] if the URL is unparseable, the app
///   cannot be read, no layer is titled like zoning or FLU, or neither
///   designation can be bound unambiguously. When only one binds, the
///   other's failure is kept in [`EndpointConfig::unbound`].
/// * [`LookupError::Network`] on transport failure or timeout
pub async fn discover_endpoint(
    client: &dyn GisClient,
    keywords: &KeywordConfig,
    jurisdiction: &str,
    app_url: &str,
) -> Result<DiscoveryReport, LookupError> {
    let app = AppRef::parse(app_url).ok_or_else(|| {
        LookupError::DiscoveryFailed(DiscoveryFailure::InvalidAppUrl {
            url: app_url.to_string(),
        })
    })?;
    log::info!(
        "Discovering zoning layers for {jurisdiction} from app {} on {}",
        app.item_id,
        app.host
    );

    let manifests = manifest::fetch_manifests(client, &app).await?;
    let layers = manifest::collect_layers(&manifests);
    let candidates: Vec<&DiscoveredLayer> = layers
        .iter()
        .filter(|l| heuristics::is_candidate(&keywords.layers, &l.title))
        .collect();
    log::debug!(
        "Found {} layer(s), {} candidate(s)",
        layers.len(),
        candidates.len()
    );

    if candidates.is_empty() {
        return Err(LookupError::DiscoveryFailed(DiscoveryFailure::NoZoningLayer));
    }

    let mut schemas = SchemaCache::default();
    let mut unbound = Vec::new();
    let zoning = keep_unbound(
        bind_kind(client, keywords, &candidates, DesignationKind::Zoning, &mut schemas).await,
        &mut unbound,
    )?;
    let future_land_use = keep_unbound(
        bind_kind(
            client,
            keywords,
            &candidates,
            DesignationKind::FutureLandUse,
            &mut schemas,
        )
        .await,
        &mut unbound,
    )?;

    if zoning.is_none() && future_land_use.is_none() {
        let failure = unbound
            .into_iter()
            .next()
            .unwrap_or(DiscoveryFailure::NoZoningLayer);
        return Err(LookupError::DiscoveryFailed(failure));
    }

    for (kind, binding) in [
        (DesignationKind::Zoning, &zoning),
        (DesignationKind::FutureLandUse, &future_land_use),
    ] {
        if let Some(binding) = binding {
            log::info!(
                "Bound {} to {} [{}]",
                kind.label(),
                binding.service_url,
                binding.field.as_deref().unwrap_or_default()
            );
        }
    }

    Ok(DiscoveryReport {
        host: app.host.clone(),
        app_item_id: app.item_id.clone(),
        webmap_id: manifests.webmap_id.clone(),
        layer_count: layers.len(),
        candidates: candidates
            .iter()
            .map(|l| CandidateLayer {
                title: l.title.clone(),
                url: l.url.clone(),
                score: heuristics::title_score(&keywords.layers, &l.title),
            })
            .collect(),
        endpoint: EndpointConfig {
            jurisdiction_name: jurisdiction.to_string(),
            zoning,
            future_land_use,
            unbound,
        },
    })
}

/// Turns a binding failure into `None`, recording why. Other errors pass
/// through.
fn keep_unbound(
    result: Result<LayerBinding, LookupError>,
    unbound: &mut Vec<DiscoveryFailure>,
) -> Result<Option<LayerBinding>, LookupError> {
    match result {
        Ok(binding) => Ok(Some(binding)),
        Err(LookupError::DiscoveryFailed(failure)) => {
            log::warn!("{failure}");
            unbound.push(failure);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Layer schemas fetched during one discovery run, by URL.
#[derive(Default)]
struct SchemaCache(BTreeMap<String, Option<Vec<FieldInfo>>>);

impl SchemaCache {
    async fn fields(
        &mut self,
        client: &dyn GisClient,
        layer: &DiscoveredLayer,
    ) -> Result<Option<Vec<FieldInfo>>, LookupError> {
        if let Some(fields) = &layer.fields {
            return Ok(Some(fields.clone()));
        }
        if let Some(cached) = self.0.get(&layer.url) {
            return Ok(cached.clone());
        }
        let fields = match query::layer_metadata(client, &layer.url).await {
            Ok(metadata) => Some(metadata.fields),
            Err(e @ LookupError::Network { .. }) => return Err(e),
            Err(e) => {
                log::warn!("Skipping layer {}: {e}", layer.url);
                None
            }
        };
        self.0.insert(layer.url.clone(), fields.clone());
        Ok(fields)
    }
}

async fn bind_kind(
    client: &dyn GisClient,
    keywords: &KeywordConfig,
    candidates: &[&DiscoveredLayer],
    kind: DesignationKind,
    schemas: &mut SchemaCache,
) -> Result<LayerBinding, LookupError> {
    let mut ambiguous: Option<Vec<String>> = None;

    for layer in heuristics::order_candidates(&keywords.layers, kind, candidates) {
        let Some(fields) = schemas.fields(client, layer).await? else {
            continue;
        };
        match heuristics::pick_field(&keywords.fields, kind, &fields) {
            FieldPick::Bound(field) => {
                return Ok(LayerBinding {
                    service_url: layer.url.clone(),
                    layer_id: layer_id_from_url(&layer.url),
                    field: Some(field),
                });
            }
            FieldPick::Ambiguous(names) => {
                log::debug!("{} fields tied on {}: {names:?}", kind.label(), layer.url);
                ambiguous.get_or_insert(names);
            }
            FieldPick::NoMatch => {}
        }
    }

    Err(LookupError::DiscoveryFailed(ambiguous.map_or(
        DiscoveryFailure::NoFieldMatch { designation: kind },
        |candidates| DiscoveryFailure::AmbiguousFieldMatch {
            designation: kind,
            candidates,
        },
    )))
}
