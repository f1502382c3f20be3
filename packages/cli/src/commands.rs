//! Non-interactive subcommands.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use site_lookup_arcgis::{GisClient, LookupError};
use site_lookup_cli_utils::{MultiProgress, with_spinner};
use site_lookup_parcel::{DiscoveryCache, LookupContext, discovery, land_area, parcel, registry};
use site_lookup_parcel_models::config::{CountyConfig, KeywordConfig};
use site_lookup_parcel_models::{County, ParcelQuery};
use site_lookup_proposal::{ProposalDocument, assemble_proposal, catalog};
use site_lookup_proposal_models::{
    Branding, FeeSchedule, PropertySummary, ProposalInput, ScopeTask,
};
use site_lookup_server_models::{ApiParcel, ApiSiteLookup};

use crate::output;

/// Everything a subcommand needs.
pub struct Tools<'a> {
    pub client: &'a dyn GisClient,
    pub keywords: &'a KeywordConfig,
    pub branding: &'a Branding,
    pub multi: &'a MultiProgress,
}

fn parcel_query(county: County, parcel_id: &str) -> Result<(CountyConfig, ParcelQuery), LookupError> {
    let config = registry::county_config(county)?;
    let query = ParcelQuery::new(county, parcel_id)
        .ok_or_else(|| LookupError::validation("parcelId", "required"))?;
    Ok((config, query))
}

/// Parses a dollar amount (`5000`, `5,000`, `$5,000.50`) into cents.
///
/// # Errors
///
/// Returns a message if the amount is not a non-negative number with at
/// most two decimal places.
pub fn parse_dollars(text: &str) -> Result<u64, String> {
    let cleaned: String = text
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let (whole, fraction) = cleaned.split_once('.').unwrap_or((&cleaned, ""));
    if whole.is_empty() || fraction.len() > 2 {
        return Err(format!("invalid dollar amount: {text}"));
    }
    let dollars: u64 = whole
        .parse()
        .map_err(|_| format!("invalid dollar amount: {text}"))?;
    let cents: u64 = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<2}")
            .parse()
            .map_err(|_| format!("invalid dollar amount: {text}"))?
    };
    dollars
        .checked_mul(100)
        .and_then(|d| d.checked_add(cents))
        .ok_or_else(|| format!("dollar amount too large: {text}"))
}

/// `property`: parcel attributes.
///
/// # Errors
///
/// Returns the lookup error if the parcel cannot be resolved.
pub async fn property(
    tools: &Tools<'_>,
    county: County,
    parcel_id: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (config, query) = parcel_query(county, parcel_id)?;
    let record = with_spinner(
        tools.multi,
        &format!("Looking up parcel {parcel_id}"),
        parcel::resolve_parcel(tools.client, &config, &query),
    )
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ApiParcel::from(record))?);
    } else {
        output::print_parcel(&record);
    }
    Ok(())
}

/// `land-area`: appraiser land area.
///
/// # Errors
///
/// Returns the lookup error if the page cannot be read.
pub async fn land_area(
    tools: &Tools<'_>,
    county: County,
    parcel_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = registry::county_config(county)?;
    let area = with_spinner(
        tools.multi,
        &format!("Fetching land area for {parcel_id}"),
        land_area::lookup_land_area(tools.client, &config, parcel_id),
    )
    .await?;
    output::print_land_area(&area);
    Ok(())
}

/// `zoning`: parcel, jurisdiction, zoning, and FLU.
///
/// # Errors
///
/// Returns the lookup error if any stage fails.
pub async fn zoning(
    tools: &Tools<'_>,
    county: County,
    parcel_id: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (config, query) = parcel_query(county, parcel_id)?;
    let ctx = LookupContext::new(tools.client, &config, tools.keywords);
    let mut cache = DiscoveryCache::new();
    let site = with_spinner(
        tools.multi,
        &format!("Looking up zoning for {parcel_id}"),
        site_lookup_parcel::lookup_site(&ctx, &mut cache, &query),
    )
    .await?;

    if json {
        let api = ApiSiteLookup::new(site.parcel, site.jurisdiction, site.zoning);
        println!("{}", serde_json::to_string_pretty(&api)?);
    } else {
        output::print_parcel(&site.parcel);
        output::print_jurisdiction(&site.jurisdiction);
        output::print_zoning(&site.zoning);
    }
    Ok(())
}

/// `discover`: run auto-discovery for one jurisdiction and show what was
/// found.
///
/// # Errors
///
/// Returns an error if the jurisdiction has no map application or
/// discovery fails.
pub async fn discover(
    tools: &Tools<'_>,
    county: County,
    jurisdiction: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = registry::county_config(county)?;
    let app = config.city_app(jurisdiction).ok_or_else(|| LookupError::NotFound {
        what: format!("Map application for {jurisdiction}"),
    })?;
    let report = with_spinner(
        tools.multi,
        &format!("Discovering layers for {}", app.jurisdiction),
        discovery::discover_endpoint(tools.client, tools.keywords, &app.jurisdiction, &app.app_url),
    )
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_discovery(&report);
    }
    Ok(())
}

/// Arguments of the `proposal` subcommand.
pub struct ProposalArgs {
    pub county: County,
    pub parcel_id: String,
    pub project: String,
    pub client: String,
    pub company: Option<String>,
    pub client_address: Option<String>,
    pub tasks: Vec<String>,
    pub fees: FeeSchedule,
    pub date: Option<NaiveDate>,
    pub address: Option<String>,
    pub skip_lookup: bool,
    pub output: Option<PathBuf>,
}

/// Fills a property summary from a zoning lookup plus a best-effort land
/// area read.
///
/// # Errors
///
/// Returns the lookup error if the parcel or zoning lookup fails.
pub async fn summarize_property(
    tools: &Tools<'_>,
    cache: &mut DiscoveryCache,
    county: County,
    parcel_id: &str,
) -> Result<PropertySummary, LookupError> {
    let (config, query) = parcel_query(county, parcel_id)?;
    let ctx = LookupContext::new(tools.client, &config, tools.keywords);
    let site = with_spinner(
        tools.multi,
        &format!("Looking up parcel {parcel_id}"),
        site_lookup_parcel::lookup_site(&ctx, cache, &query),
    )
    .await?;

    let mut summary = PropertySummary::from_parcel(&site.parcel).with_zoning(&site.zoning);
    match land_area::lookup_land_area(tools.client, &config, parcel_id).await {
        Ok(area) => summary = summary.with_land_area(area),
        Err(e) => log::warn!("Land area unavailable: {e}"),
    }
    Ok(summary)
}

/// Writes a document next to `output` (or into the working directory
/// under its suggested name) and returns the path written.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written.
pub fn save_document(doc: &ProposalDocument, output: Option<&Path>) -> std::io::Result<PathBuf> {
    let path = output.map_or_else(|| PathBuf::from(&doc.file_name), Path::to_path_buf);
    std::fs::write(&path, &doc.bytes)?;
    Ok(path)
}

/// `proposal`: look the parcel up, assemble the document, and save it.
///
/// # Errors
///
/// Returns an error if a lookup fails, a task ID is unknown, the input is
/// invalid, or the file cannot be written.
pub async fn proposal(
    tools: &Tools<'_>,
    args: ProposalArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut property = if args.skip_lookup {
        PropertySummary {
            county: args.county,
            parcel_id: args.parcel_id.clone(),
            address: String::new(),
            city: None,
            zip: None,
            owner: None,
            property_use: None,
            jurisdiction: None,
            zoning: None,
            future_land_use: None,
            land_area: None,
        }
    } else {
        summarize_property(tools, &mut DiscoveryCache::new(), args.county, &args.parcel_id).await?
    };
    if let Some(address) = args.address {
        property.address = address;
    }

    let tasks: Vec<ScopeTask> = catalog::select_tasks(&catalog::task_catalog(), &args.tasks)?;
    let input = ProposalInput {
        project_name: args.project,
        client_name: args.client,
        client_company: args.company,
        client_address: args.client_address,
        property,
        tasks,
        fees: args.fees,
        proposal_date: args
            .date
            .unwrap_or_else(|| chrono::Local::now().date_naive()),
    };

    let doc = assemble_proposal(&input, tools.branding)?;
    let path = save_document(&doc, args.output.as_deref())?;
    println!("Wrote {} ({} bytes)", path.display(), doc.bytes.len());
    println!("SHA-256 {}", doc.sha256);
    Ok(())
}
