//! Parcel ID to geometry and attributes, via the county parcel layer.

use site_lookup_arcgis::query::{self, Feature, LayerQuery};
use site_lookup_arcgis::{GisClient, LookupError};
use site_lookup_parcel_models::config::CountyConfig;
use site_lookup_parcel_models::{ParcelQuery, ParcelRecord};

/// Looks up one parcel by ID.
///
/// The county layer may return several features for a `where` match (for
/// example condo units sharing a base parcel); the first whose ID attribute
/// equals the requested ID wins.
///
/// # Errors
///
/// * [`LookupError::NotFound`] if no feature carries the ID
/// * [`LookupError::Network`] on transport failure or timeout
/// * [`LookupError::Validation`] if `query` targets a different county
pub async fn resolve_parcel(
    client: &dyn GisClient,
    county: &CountyConfig,
    query: &ParcelQuery,
) -> Result<ParcelRecord, LookupError> {
    if query.county() != county.county {
        return Err(LookupError::validation(
            "county",
            format!(
                "query is for {} but config is for {}",
                query.county(),
                county.county
            ),
        ));
    }

    let layer = &county.parcels;
    let parcel_id = query.parcel_id();
    log::info!("Looking up parcel {parcel_id} in {}", county.name);

    let request = LayerQuery::attribute(&query::where_equals(&layer.id_field, parcel_id))
        .with_geometry(true);
    let features = query::query_features(client, &layer.layer_url, &request).await?;
    log::debug!("Parcel query returned {} feature(s)", features.len());

    let feature = features
        .into_iter()
        .find(|f| f.text(&layer.id_field).as_deref() == Some(parcel_id))
        .ok_or_else(|| LookupError::NotFound {
            what: format!("Parcel {parcel_id} in {}", county.name),
        })?;

    if feature.geometry.is_none() {
        log::warn!("Parcel {parcel_id} has no geometry");
    }

    Ok(record_from_feature(county, parcel_id, feature))
}

fn record_from_feature(county: &CountyConfig, parcel_id: &str, feature: Feature) -> ParcelRecord {
    let mapping = &county.parcels.attributes;
    ParcelRecord {
        parcel_id: parcel_id.to_string(),
        county: county.county,
        owner: feature.first_text(&mapping.owner),
        address: feature.first_text(&mapping.address),
        city: feature.first_text(&mapping.city),
        zip: feature.first_text(&mapping.zip),
        property_use: feature
            .first_text(&mapping.property_use)
            .map(|s| strip_dor_code(&s))
            .filter(|s| !s.is_empty()),
        acreage: feature
            .first_text(&mapping.acreage)
            .and_then(|s| s.replace(',', "").parse::<f64>().ok())
            .filter(|a| a.is_finite() && *a >= 0.0),
        raw_attributes: feature.attribute_strings(),
        geometry: feature.geometry,
    }
}

/// Removes a leading Florida DOR numeric code ("0110 Single Family" ->
/// "Single Family").
#[must_use]
pub fn strip_dor_code(text: &str) -> String {
    let text = text.trim();
    if text.starts_with(|c: char| c.is_ascii_digit())
        && let Some((_, rest)) = text.split_once(' ')
    {
        return rest.trim().to_string();
    }
    text.to_string()
}
