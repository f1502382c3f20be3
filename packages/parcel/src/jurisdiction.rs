//! Parcel geometry to containing municipality.

use geo::{Area, BooleanOps, Geometry};
use site_lookup_arcgis::geometry::as_multipolygon;
use site_lookup_arcgis::query::{self, LayerQuery};
use site_lookup_arcgis::{GisClient, LookupError};
use site_lookup_parcel_models::config::CountyConfig;
use site_lookup_parcel_models::{Jurisdiction, normalize_jurisdiction_name};

/// Municipal polygons requested per lookup. A parcel straddles at most a
/// handful of boundaries.
const MAX_BOUNDARY_FEATURES: u32 = 10;

/// Resolves the municipality a parcel lies in.
///
/// When several boundaries intersect, the one with the largest overlap
/// wins; ties (including point parcels) go to the first feature returned.
/// Parcels outside every boundary are [`Jurisdiction::unincorporated`].
///
/// # Errors
///
/// * [`LookupError::MissingGeometry`] if `geometry` is `None` (no request
///   is made)
/// * [`LookupError::Network`] on transport failure or timeout
pub async fn resolve_jurisdiction(
    client: &dyn GisClient,
    county: &CountyConfig,
    geometry: Option<&Geometry<f64>>,
) -> Result<Jurisdiction, LookupError> {
    let geometry = geometry.ok_or(LookupError::MissingGeometry)?;
    let request = LayerQuery::intersecting(geometry)
        .ok_or_else(|| LookupError::validation("geometry", "unsupported parcel geometry type"))?
        .with_geometry(true)
        .with_record_count(MAX_BOUNDARY_FEATURES);

    let features = query::query_features(client, &county.municipal.layer_url, &request).await?;
    let parcel = as_multipolygon(geometry);

    let mut best: Option<(String, f64)> = None;
    for feature in &features {
        let Some(name) = feature.text(&county.municipal.name_field) else {
            continue;
        };
        let overlap = match (&parcel, feature.geometry.as_ref().and_then(as_multipolygon)) {
            (Some(parcel), Some(boundary)) => parcel.intersection(&boundary).unsigned_area(),
            _ => 0.0,
        };
        log::debug!("Boundary {name} overlaps parcel by {overlap}");
        if best.as_ref().is_none_or(|(_, area)| overlap > *area) {
            best = Some((name, overlap));
        }
    }

    let jurisdiction = match best {
        Some((name, _)) if !normalize_jurisdiction_name(&name).starts_with("unincorporated") => {
            Jurisdiction::municipality(&name)
        }
        _ => Jurisdiction::unincorporated(),
    };
    log::info!("Parcel is in {}", jurisdiction.name);
    Ok(jurisdiction)
}
