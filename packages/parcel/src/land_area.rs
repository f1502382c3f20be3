//! Land area scraped from the county property appraiser's parcel page.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use site_lookup_arcgis::{GisClient, LookupError};
use site_lookup_parcel_models::LandArea;
use site_lookup_parcel_models::config::CountyConfig;

static LAND_AREA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Land Area:\s*(?:≅|~|≈)?\s*([\d,]+)\s*sf\s*\|\s*(?:≅|~|≈)?\s*([\d.]+)\s*acres")
        .expect("valid regex")
});

/// Converts a parcel ID to the appraiser's "strap" form.
///
/// Six-segment IDs have their first and third segments swapped; dashes
/// are removed either way (`19-31-17-73166-001-0010` ->
/// `173119731660010010`).
#[must_use]
pub fn strap(parcel_id: &str) -> String {
    let mut parts: Vec<&str> = parcel_id.trim().split('-').collect();
    if parts.len() == 6 {
        parts.swap(0, 2);
    }
    parts.concat()
}

/// Fetches the appraiser page for a parcel and reads its land area.
///
/// # Errors
///
/// * [`LookupError::Validation`] if the county has no appraiser page
///   configured or the ID is blank
/// * [`LookupError::SchemaMismatch`] if the page has no land area line
/// * [`LookupError::Network`] on transport failure or timeout
pub async fn lookup_land_area(
    client: &dyn GisClient,
    county: &CountyConfig,
    parcel_id: &str,
) -> Result<LandArea, LookupError> {
    let config = county.land_area.as_ref().ok_or_else(|| {
        LookupError::validation(
            "county",
            format!("land area lookup is not available for {}", county.name),
        )
    })?;
    let parcel_id = parcel_id.trim();
    if parcel_id.is_empty() {
        return Err(LookupError::validation("parcelId", "required"));
    }

    let url = config
        .url_template
        .replace("{strap}", &strap(parcel_id))
        .replace("{parcel_id}", parcel_id);
    log::info!("Fetching land area for {parcel_id}");

    let html = client.get_text(&url, &[]).await?;
    parse_land_area(&page_text(&html))
        .ok_or_else(|| LookupError::schema(&url, "land area not found on page"))
}

fn page_text(html: &str) -> String {
    Html::parse_document(html)
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reads `Land Area: ≅ 59,560 sf | ≅ 1.36 acres` from page text.
#[must_use]
pub fn parse_land_area(text: &str) -> Option<LandArea> {
    let caps = LAND_AREA_RE.captures(text)?;
    let square_feet = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
    let acres = caps.get(2)?.as_str().parse().ok()?;
    Some(LandArea { square_feet, acres })
}
