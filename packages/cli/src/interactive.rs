//! Interactive session.
//!
//! Menu-driven lookups using `dialoguer`. One session owns one
//! [`DiscoveryCache`], so a city's layers are discovered at most once no
//! matter how many parcels are looked up in it, and the last property
//! looked up carries over into proposal generation.

use dialoguer::{Confirm, Input, MultiSelect, Select};
use site_lookup_arcgis::{HttpGisClient, LookupError};
use site_lookup_cli_utils::{prompt_optional, prompt_required, with_spinner};
use site_lookup_parcel::{DiscoveryCache, LookupContext, land_area, parcel, registry};
use site_lookup_parcel_models::config::CountyConfig;
use site_lookup_parcel_models::{County, ParcelQuery};
use site_lookup_proposal::{ProposalError, assemble_proposal, catalog};
use site_lookup_proposal_models::{FeeSchedule, PropertySummary, ProposalInput, ScopeTask};
use site_lookup_server::AppState;

use crate::commands::{self, Tools};
use crate::output;

/// Actions offered in the session menu.
enum Action {
    Property,
    Zoning,
    LandArea,
    Discover,
    Proposal,
    ChangeCounty,
    Server,
    Quit,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Property,
        Self::Zoning,
        Self::LandArea,
        Self::Discover,
        Self::Proposal,
        Self::ChangeCounty,
        Self::Server,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Property => "Lookup property info",
            Self::Zoning => "Lookup zoning & site data",
            Self::LandArea => "Lookup land area",
            Self::Discover => "Discover city zoning layers",
            Self::Proposal => "Generate proposal",
            Self::ChangeCounty => "Change county",
            Self::Server => "Start API server",
            Self::Quit => "Quit",
        }
    }
}

struct Session<'a> {
    tools: &'a Tools<'a>,
    county: CountyConfig,
    cache: DiscoveryCache,
    property: Option<PropertySummary>,
}

/// Runs the interactive menu loop until the user quits.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read, a proposal cannot be
/// written, or the API server fails to start.
pub async fn run(
    tools: &Tools<'_>,
    client: &HttpGisClient,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Site Lookup");
    println!();

    let mut session = Session {
        tools,
        county: select_county()?,
        cache: DiscoveryCache::new(),
        property: None,
    };

    loop {
        println!();
        let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
        let idx = Select::new()
            .with_prompt(format!("{} - what would you like to do?", session.county.name))
            .items(&labels)
            .default(0)
            .interact()?;

        match Action::ALL[idx] {
            Action::Property => session.property_info().await?,
            Action::Zoning => session.zoning().await?,
            Action::LandArea => session.land_area().await?,
            Action::Discover => session.discover().await?,
            Action::Proposal => session.proposal().await?,
            Action::ChangeCounty => {
                session.county = select_county()?;
                session.property = None;
            }
            Action::Server => {
                let bind = prompt_required("Bind address", Some("127.0.0.1"))?;
                let port: u16 = Input::new()
                    .with_prompt("Port")
                    .default(8080)
                    .interact_text()?;
                let state = AppState::new(
                    std::sync::Arc::new(client.clone()),
                    tools.keywords.clone(),
                    tools.branding.clone(),
                );
                return crate::serve(state, bind, port).await;
            }
            Action::Quit => return Ok(()),
        }
    }
}

fn select_county() -> Result<CountyConfig, dialoguer::Error> {
    let labels: Vec<&str> = County::ALL.iter().map(|c| c.label()).collect();
    loop {
        let idx = Select::new()
            .with_prompt("County")
            .items(&labels)
            .default(0)
            .interact()?;
        match registry::county_config(County::ALL[idx]) {
            Ok(config) => return Ok(config),
            Err(e) => println!("  {}", output::describe_error(&e)),
        }
    }
}

/// Prints the failure and, when it is transient, asks whether to try
/// again.
fn offer_retry(err: &LookupError) -> Result<bool, dialoguer::Error> {
    println!("  {}", output::describe_error(err));
    if !err.is_retryable() {
        return Ok(false);
    }
    Confirm::new()
        .with_prompt("Retry?")
        .default(true)
        .interact()
}

impl Session<'_> {
    fn prompt_parcel(&self) -> Result<ParcelQuery, dialoguer::Error> {
        let previous = self.property.as_ref().map(|p| p.parcel_id.as_str());
        loop {
            let parcel_id = prompt_required("Parcel ID", previous)?;
            if let Some(query) = ParcelQuery::new(self.county.county, &parcel_id) {
                return Ok(query);
            }
        }
    }

    async fn property_info(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let query = self.prompt_parcel()?;
        loop {
            let result = with_spinner(
                self.tools.multi,
                &format!("Looking up parcel {}", query.parcel_id()),
                parcel::resolve_parcel(self.tools.client, &self.county, &query),
            )
            .await;
            match result {
                Ok(record) => {
                    output::print_parcel(&record);
                    self.property = Some(PropertySummary::from_parcel(&record));
                    return Ok(());
                }
                Err(e) => {
                    if !offer_retry(&e)? {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn zoning(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let query = self.prompt_parcel()?;
        let ctx = LookupContext::new(self.tools.client, &self.county, self.tools.keywords);
        loop {
            let result = with_spinner(
                self.tools.multi,
                &format!("Looking up zoning for {}", query.parcel_id()),
                site_lookup_parcel::lookup_site(&ctx, &mut self.cache, &query),
            )
            .await;
            match result {
                Ok(site) => {
                    output::print_parcel(&site.parcel);
                    output::print_jurisdiction(&site.jurisdiction);
                    output::print_zoning(&site.zoning);
                    let mut summary =
                        PropertySummary::from_parcel(&site.parcel).with_zoning(&site.zoning);
                    if site.zoning.manual_reason.is_some() {
                        enter_designations(&mut summary)?;
                    }
                    self.property = Some(summary);
                    return Ok(());
                }
                Err(e) => {
                    if !offer_retry(&e)? {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn land_area(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let query = self.prompt_parcel()?;
        loop {
            let result = with_spinner(
                self.tools.multi,
                &format!("Fetching land area for {}", query.parcel_id()),
                land_area::lookup_land_area(self.tools.client, &self.county, query.parcel_id()),
            )
            .await;
            match result {
                Ok(area) => {
                    output::print_land_area(&area);
                    if let Some(property) = self
                        .property
                        .as_mut()
                        .filter(|p| p.parcel_id == query.parcel_id())
                    {
                        property.land_area = Some(area);
                    }
                    return Ok(());
                }
                Err(e) => {
                    if !offer_retry(&e)? {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn discover(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.county.city_apps.is_empty() {
            println!("  No city map applications are configured for {}.", self.county.name);
            return Ok(());
        }
        let labels: Vec<&str> = self
            .county
            .city_apps
            .iter()
            .map(|a| a.jurisdiction.as_str())
            .collect();
        let idx = Select::new()
            .with_prompt("Jurisdiction")
            .items(&labels)
            .default(0)
            .interact()?;
        let app = self.county.city_apps[idx].clone();

        loop {
            let result = with_spinner(
                self.tools.multi,
                &format!("Discovering layers for {}", app.jurisdiction),
                site_lookup_parcel::discovery::discover_endpoint(
                    self.tools.client,
                    self.tools.keywords,
                    &app.jurisdiction,
                    &app.app_url,
                ),
            )
            .await;
            match result {
                Ok(report) => {
                    output::print_discovery(&report);
                    self.cache.insert(report.endpoint);
                    return Ok(());
                }
                Err(e) => {
                    if !offer_retry(&e)? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// The property for a proposal: the last one looked up if the user
    /// keeps it, otherwise a fresh lookup, otherwise manual entry.
    async fn proposal_property(&mut self) -> Result<PropertySummary, Box<dyn std::error::Error>> {
        if let Some(property) = &self.property {
            let keep = Confirm::new()
                .with_prompt(format!("Use parcel {}?", property.parcel_id))
                .default(true)
                .interact()?;
            if keep {
                return Ok(property.clone());
            }
        }

        let query = self.prompt_parcel()?;
        loop {
            match commands::summarize_property(
                self.tools,
                &mut self.cache,
                self.county.county,
                query.parcel_id(),
            )
            .await
            {
                Ok(mut summary) => {
                    if summary.zoning.is_none() || summary.future_land_use.is_none() {
                        enter_designations(&mut summary)?;
                    }
                    self.property = Some(summary.clone());
                    return Ok(summary);
                }
                Err(e) => {
                    if !offer_retry(&e)? {
                        println!("  Enter the property details manually.");
                        return Ok(manual_property(self.county.county, query.parcel_id())?);
                    }
                }
            }
        }
    }

    async fn proposal(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut property = self.proposal_property().await?;
        if property.address.trim().is_empty() {
            property.address = prompt_required("Site address", None)?;
        }

        let project_name = prompt_required("Project name", None)?;
        let client_name = prompt_required("Client name", None)?;
        let client_company = prompt_optional("Client company (optional)")?;
        let client_address = prompt_optional("Client address (optional)")?;

        let tasks = select_tasks()?;
        if tasks.is_empty() {
            println!("  No tasks selected.");
            return Ok(());
        }
        let (tasks, fees) = prompt_fees(tasks)?;

        let input = ProposalInput {
            project_name,
            client_name,
            client_company,
            client_address,
            property,
            tasks,
            fees,
            proposal_date: chrono::Local::now().date_naive(),
        };

        let doc = match assemble_proposal(&input, self.tools.branding) {
            Ok(doc) => doc,
            Err(ProposalError::Validation(errors)) => {
                println!("  Proposal not generated:");
                for error in errors.iter() {
                    println!("    {error}");
                }
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let path: String = Input::new()
            .with_prompt("Save as")
            .default(doc.file_name.clone())
            .interact_text()?;
        let path = commands::save_document(&doc, Some(std::path::Path::new(path.trim())))?;
        println!("  Wrote {} ({} bytes)", path.display(), doc.bytes.len());
        Ok(())
    }
}

/// Asks for zoning and FLU codes the lookup could not supply. Blank
/// answers keep whatever was found.
fn enter_designations(summary: &mut PropertySummary) -> Result<(), dialoguer::Error> {
    let manual = Confirm::new()
        .with_prompt("Zoning or future land use is missing. Enter it manually?")
        .default(true)
        .interact()?;
    if !manual {
        return Ok(());
    }
    if let Some(code) = prompt_optional("Zoning code")? {
        summary.zoning = Some(code);
    }
    if let Some(code) = prompt_optional("Future land use code")? {
        summary.future_land_use = Some(code);
    }
    Ok(())
}

fn manual_property(county: County, parcel_id: &str) -> Result<PropertySummary, dialoguer::Error> {
    Ok(PropertySummary {
        county,
        parcel_id: parcel_id.to_string(),
        address: prompt_required("Site address", None)?,
        city: prompt_optional("City (optional)")?,
        zip: None,
        owner: prompt_optional("Owner (optional)")?,
        property_use: None,
        jurisdiction: prompt_optional("Jurisdiction (optional)")?,
        zoning: prompt_optional("Zoning code (optional)")?,
        future_land_use: prompt_optional("Future land use code (optional)")?,
        land_area: None,
    })
}

fn select_tasks() -> Result<Vec<ScopeTask>, dialoguer::Error> {
    let catalog = catalog::task_catalog();
    let labels: Vec<&str> = catalog.tasks.iter().map(|t| t.title.as_str()).collect();
    let selected = MultiSelect::new()
        .with_prompt("Scope of work (space to toggle, enter to confirm)")
        .items(&labels)
        .interact()?;
    Ok(selected
        .into_iter()
        .map(|i| catalog.tasks[i].to_scope_task())
        .collect())
}

fn prompt_dollars(prompt: &str, default_cents: Option<u64>) -> Result<u64, dialoguer::Error> {
    let mut input = Input::<String>::new()
        .with_prompt(prompt)
        .validate_with(|value: &String| commands::parse_dollars(value).map(|_| ()));
    if let Some(cents) = default_cents {
        input = input.default(site_lookup_proposal::fees::format_usd(cents));
    }
    let value = input.interact_text()?;
    Ok(commands::parse_dollars(&value).unwrap_or_default())
}

fn prompt_fees(mut tasks: Vec<ScopeTask>) -> Result<(Vec<ScopeTask>, FeeSchedule), dialoguer::Error> {
    let idx = Select::new()
        .with_prompt("Fee structure")
        .items(&["Flat fee", "Per-task fees"])
        .default(0)
        .interact()?;

    if idx == 0 {
        let catalog_total = tasks
            .iter()
            .map(|t| t.fee_cents)
            .sum::<Option<u64>>();
        let total_cents = prompt_dollars("Total fee", catalog_total)?;
        return Ok((tasks, FeeSchedule::Flat { total_cents }));
    }

    for task in &mut tasks {
        task.fee_cents = Some(prompt_dollars(&format!("Fee for {}", task.title), task.fee_cents)?);
    }
    Ok((tasks, FeeSchedule::PerTask))
}
