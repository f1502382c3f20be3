#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for parcel, zoning, and proposal lookups.
//!
//! Run without a subcommand for the interactive session, which keeps one
//! discovery cache for its whole lifetime. Subcommands run a single
//! lookup and exit.
//!
//! Uses `indicatif-log-bridge` (via [`site_lookup_cli_utils::init_logger`])
//! so that log lines and lookup spinners never fight for the terminal.

mod commands;
mod interactive;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use site_lookup_arcgis::{ClientConfig, HttpGisClient};
use site_lookup_parcel::registry;
use site_lookup_parcel_models::County;
use site_lookup_proposal::catalog;
use site_lookup_proposal_models::FeeSchedule;
use site_lookup_server::AppState;

use crate::commands::{ProposalArgs, Tools};

#[derive(Parser)]
#[command(
    name = "site_lookup",
    about = "Parcel zoning lookup and proposal generator"
)]
struct Cli {
    /// Discovery keyword file replacing the built-in table
    #[arg(long, global = true, env = "SITE_LOOKUP_KEYWORDS")]
    keywords: Option<PathBuf>,
    /// Branding file replacing the built-in letterhead
    #[arg(long, global = true, env = "SITE_LOOKUP_BRANDING")]
    branding: Option<PathBuf>,
    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "SITE_LOOKUP_TIMEOUT_SECS")]
    timeout: Option<u64>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up parcel attributes
    Property {
        /// County (e.g., "pinellas")
        county: County,
        /// Parcel ID as printed by the property appraiser
        parcel_id: String,
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Read the land area from the property appraiser
    LandArea {
        /// County (e.g., "pinellas")
        county: County,
        /// Parcel ID as printed by the property appraiser
        parcel_id: String,
    },
    /// Resolve jurisdiction, zoning, and future land use for a parcel
    Zoning {
        /// County (e.g., "pinellas")
        county: County,
        /// Parcel ID as printed by the property appraiser
        parcel_id: String,
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Run layer auto-discovery against a city's map application
    Discover {
        /// County (e.g., "pinellas")
        county: County,
        /// Jurisdiction name (e.g., "Largo")
        jurisdiction: String,
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Generate a proposal document for a parcel
    Proposal {
        /// County (e.g., "pinellas")
        county: County,
        /// Parcel ID as printed by the property appraiser
        parcel_id: String,
        /// Project name
        #[arg(long)]
        project: String,
        /// Client contact name
        #[arg(long)]
        client: String,
        /// Client company
        #[arg(long)]
        company: Option<String>,
        /// Client mailing address
        #[arg(long)]
        client_address: Option<String>,
        /// Catalog task ID; repeat for each task, in order
        #[arg(long = "task", required = true)]
        tasks: Vec<String>,
        /// Lump-sum fee in dollars (e.g., "5,000")
        #[arg(
            long,
            value_parser = commands::parse_dollars,
            required_unless_present = "per_task",
            conflicts_with = "per_task"
        )]
        flat_fee: Option<u64>,
        /// Itemize each task's catalog fee
        #[arg(long)]
        per_task: bool,
        /// Proposal date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Output path; defaults to the suggested file name
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Skip the GIS lookup and fill only the parcel ID and address
        #[arg(long, requires = "address")]
        no_lookup: bool,
        /// Site address, overriding the looked-up one
        #[arg(long)]
        address: Option<String>,
    },
    /// Start the HTTP API server
    Serve {
        /// Address to bind
        #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, env = "PORT", default_value = "8080")]
        port: u16,
    },
}

/// Runs the API server on its own actix system.
///
/// # Errors
///
/// Returns an error if the server fails to bind or the blocking task
/// panics.
async fn serve(
    state: AppState,
    bind: String,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    // The server uses actix-web's runtime, so we need to run it in a
    // blocking task to avoid nesting tokio runtimes.
    tokio::task::spawn_blocking(move || {
        actix_web::rt::System::new().block_on(site_lookup_server::serve(state, &bind, port))
    })
    .await??;
    Ok(())
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = site_lookup_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env();
    if let Some(secs) = cli.timeout.filter(|s| *s > 0) {
        config.timeout = Duration::from_secs(secs);
    }
    let client = HttpGisClient::new(config)?;
    let keywords = registry::resolve_keywords(cli.keywords.as_deref())?;
    let branding = catalog::resolve_branding(cli.branding.as_deref())?;

    let tools = Tools {
        client: &client,
        keywords: &keywords,
        branding: &branding,
        multi: &multi,
    };

    let Some(command) = cli.command else {
        return interactive::run(&tools, &client).await;
    };

    match command {
        Commands::Property {
            county,
            parcel_id,
            json,
        } => commands::property(&tools, county, &parcel_id, json).await?,
        Commands::LandArea { county, parcel_id } => {
            commands::land_area(&tools, county, &parcel_id).await?;
        }
        Commands::Zoning {
            county,
            parcel_id,
            json,
        } => commands::zoning(&tools, county, &parcel_id, json).await?,
        Commands::Discover {
            county,
            jurisdiction,
            json,
        } => commands::discover(&tools, county, &jurisdiction, json).await?,
        Commands::Proposal {
            county,
            parcel_id,
            project,
            client: client_name,
            company,
            client_address,
            tasks,
            flat_fee,
            per_task: _,
            date,
            output,
            no_lookup,
            address,
        } => {
            let fees = flat_fee.map_or(FeeSchedule::PerTask, |total_cents| FeeSchedule::Flat {
                total_cents,
            });
            let args = ProposalArgs {
                county,
                parcel_id,
                project,
                client: client_name,
                company,
                client_address,
                tasks,
                fees,
                date,
                address,
                skip_lookup: no_lookup,
                output,
            };
            commands::proposal(&tools, args).await?;
        }
        Commands::Serve { bind, port } => {
            let state = AppState::new(
                std::sync::Arc::new(client.clone()),
                keywords.clone(),
                branding.clone(),
            );
            serve(state, bind, port).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_flat_fee_proposal() {
        let cli = Cli::try_parse_from([
            "site_lookup",
            "proposal",
            "pinellas",
            "12-34-56-00000-000-0010",
            "--project",
            "Ulmerton Retail",
            "--client",
            "Dana Reyes",
            "--task",
            "zoning-verification",
            "--task",
            "concept-plan",
            "--flat-fee",
            "$5,000",
            "--date",
            "2026-03-02",
        ])
        .unwrap();
        let Some(Commands::Proposal {
            county,
            tasks,
            flat_fee,
            date,
            ..
        }) = cli.command
        else {
            panic!("expected proposal command");
        };
        assert_eq!(county, County::Pinellas);
        assert_eq!(tasks, ["zoning-verification", "concept-plan"]);
        assert_eq!(flat_fee, Some(500_000));
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 3, 2));
    }

    #[test]
    fn proposal_requires_a_fee_mode() {
        let result = Cli::try_parse_from([
            "site_lookup",
            "proposal",
            "pinellas",
            "1",
            "--project",
            "P",
            "--client",
            "C",
            "--task",
            "rezoning",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn flat_fee_conflicts_with_per_task() {
        let result = Cli::try_parse_from([
            "site_lookup",
            "proposal",
            "pinellas",
            "1",
            "--project",
            "P",
            "--client",
            "C",
            "--task",
            "rezoning",
            "--flat-fee",
            "100",
            "--per-task",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn county_names_are_case_insensitive() {
        let cli = Cli::try_parse_from(["site_lookup", "zoning", "Pinellas", "1"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Zoning {
                county: County::Pinellas,
                ..
            })
        ));
    }
}
