#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Proposal document assembly.
//!
//! [`assemble_proposal`] validates a [`ProposalInput`], lays it out as
//! letterhead, property summary, scope of services, fee table, and
//! signature block, and packages the result as a `.docx` whose bytes
//! depend only on the inputs.

pub mod catalog;
pub mod docx;
pub mod fees;
pub mod validate;

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use site_lookup_proposal_models::{Branding, FeeSchedule, ProposalInput, ValidationErrors};
use thiserror::Error;

use crate::docx::{Block, Cell, Table, TextStyle};
use crate::fees::{FeeTable, format_usd};

/// MIME type of the generated document.
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Errors from proposal assembly and catalog loading.
#[derive(Debug, Error)]
pub enum ProposalError {
    /// One or more input fields are missing or invalid.
    #[error("Invalid proposal: {0}")]
    Validation(ValidationErrors),

    /// A task ID not present in the catalog.
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    /// Zip archive error.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Failed writing a document part.
    #[error("Failed to write document: {0}")]
    Write(#[from] std::io::Error),

    /// A configuration file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A configuration file is not valid TOML for its schema.
    #[error("Failed to parse {path}: {source}")]
    Config {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
}

/// A finished proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalDocument {
    /// `.docx` package bytes.
    pub bytes: Vec<u8>,
    /// Suggested download name.
    pub file_name: String,
    /// Lowercase hex SHA-256 of `bytes`.
    pub sha256: String,
}

/// Validates `input` and renders it as a `.docx`.
///
/// # Errors
///
/// * [`ProposalError::Validation`] with every field-level problem found
/// * [`ProposalError::Zip`] / [`ProposalError::Write`] if packaging fails
pub fn assemble_proposal(
    input: &ProposalInput,
    branding: &Branding,
) -> Result<ProposalDocument, ProposalError> {
    validate::validate(input, branding).map_err(ProposalError::Validation)?;
    let fee_table = fees::fee_table(&input.tasks, input.fees).ok_or_else(|| {
        let mut errors = ValidationErrors::default();
        errors.push("fees", "every task needs a fee");
        ProposalError::Validation(errors)
    })?;

    let blocks = layout(input, branding, &fee_table);
    let bytes = docx::write_docx(&blocks)?;
    let sha256 = hex::encode(Sha256::digest(&bytes));
    let file_name = file_name(input);

    log::info!(
        "Assembled proposal {file_name} ({} bytes, {} tasks)",
        bytes.len(),
        input.tasks.len()
    );

    Ok(ProposalDocument {
        bytes,
        file_name,
        sha256,
    })
}

/// `proposal-<project slug>-<date>.docx`, falling back to the parcel ID
/// when the project name has no usable characters.
#[must_use]
pub fn file_name(input: &ProposalInput) -> String {
    let mut slug = slugify(&input.project_name);
    if slug.is_empty() {
        slug = slugify(&input.property.parcel_id);
    }
    format!(
        "proposal-{slug}-{}.docx",
        input.proposal_date.format("%Y-%m-%d")
    )
}

fn slugify(text: &str) -> String {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn layout(input: &ProposalInput, branding: &Branding, fee_table: &FeeTable) -> Vec<Block> {
    let mut blocks = Vec::new();
    letterhead(&mut blocks, input, branding);
    property_summary(&mut blocks, input);
    scope_of_services(&mut blocks, input);
    fees_section(&mut blocks, input.fees, fee_table);
    signature(&mut blocks, input, branding);
    blocks
}

fn letterhead(blocks: &mut Vec<Block>, input: &ProposalInput, branding: &Branding) {
    blocks.push(Block::text(branding.firm_name.trim(), TextStyle::Title));
    if let Some(tagline) = non_blank(branding.tagline.as_deref()) {
        blocks.push(Block::text(tagline, TextStyle::Small));
    }
    for line in &branding.address_lines {
        blocks.push(Block::text(line.trim(), TextStyle::Small));
    }
    let contact: Vec<&str> = [&branding.phone, &branding.email, &branding.website]
        .into_iter()
        .filter_map(|v| non_blank(v.as_deref()))
        .collect();
    if !contact.is_empty() {
        blocks.push(Block::text(contact.join(" | "), TextStyle::Small));
    }
    blocks.push(Block::blank());

    blocks.push(Block::text(
        input.proposal_date.format("%B %-d, %Y").to_string(),
        TextStyle::Body,
    ));

    let mut recipient = vec![input.client_name.trim()];
    recipient.extend(non_blank(input.client_company.as_deref()));
    recipient.extend(non_blank(input.client_address.as_deref()));
    blocks.push(Block::text(recipient.join("\n"), TextStyle::Body));

    blocks.push(Block::text(
        format!("Re: {}", input.project_name.trim()),
        TextStyle::Strong,
    ));
    blocks.push(Block::text(
        format!(
            "{} is pleased to submit this proposal for professional services for \
             the property at {} (Parcel {}).",
            branding.firm_name.trim(),
            input.property.address.trim(),
            input.property.parcel_id.trim()
        ),
        TextStyle::Body,
    ));
}

fn property_summary(blocks: &mut Vec<Block>, input: &ProposalInput) {
    let property = &input.property;
    let mut address = property.address.trim().to_string();
    let locality: Vec<&str> = [&property.city, &property.zip]
        .into_iter()
        .filter_map(|v| non_blank(v.as_deref()))
        .collect();
    if !locality.is_empty() {
        address = format!("{address}, {}", locality.join(" "));
    }

    let mut rows = vec![
        ("Parcel ID", property.parcel_id.trim().to_string()),
        ("Address", address),
        ("County", format!("{} County", property.county.label())),
    ];
    let optional = [
        ("Owner", &property.owner),
        ("Property Use", &property.property_use),
        ("Jurisdiction", &property.jurisdiction),
        ("Zoning", &property.zoning),
        ("Future Land Use", &property.future_land_use),
    ];
    for (label, value) in optional {
        if let Some(value) = non_blank(value.as_deref()) {
            rows.push((label, value.to_string()));
        }
    }
    if let Some(area) = property.land_area {
        rows.push((
            "Land Area",
            format!(
                "{} sf ({:.2} acres)",
                fees::group_thousands(area.square_feet),
                area.acres
            ),
        ));
    }

    blocks.push(Block::text("Property Summary", TextStyle::Heading));
    blocks.push(Block::Table(Table {
        column_percents: vec![35, 65],
        rows: rows
            .into_iter()
            .map(|(label, value)| vec![Cell::bold(label), Cell::plain(value)])
            .collect(),
    }));
}

fn scope_of_services(blocks: &mut Vec<Block>, input: &ProposalInput) {
    blocks.push(Block::text("Scope of Services", TextStyle::Heading));
    for (i, task) in input.tasks.iter().enumerate() {
        blocks.push(Block::text(
            format!("Task {}: {}", i + 1, task.title.trim()),
            TextStyle::Strong,
        ));
        if let Some(description) = non_blank(task.description.as_deref()) {
            blocks.push(Block::text(description, TextStyle::Body));
        }
    }
}

fn fees_section(blocks: &mut Vec<Block>, schedule: FeeSchedule, table: &FeeTable) {
    blocks.push(Block::text("Fees", TextStyle::Heading));
    let intro = match schedule {
        FeeSchedule::Flat { .. } => "The services above will be provided for a lump-sum fee of:",
        FeeSchedule::PerTask => "The services above will be provided for the following fees:",
    };
    blocks.push(Block::text(intro, TextStyle::Body));

    let mut rows = vec![vec![Cell::bold("Task"), Cell::bold("Fee")]];
    for (i, row) in table.rows.iter().enumerate() {
        let fee = row.fee_cents.map_or_else(|| "Included".to_string(), format_usd);
        rows.push(vec![
            Cell::plain(format!("Task {}: {}", i + 1, row.title)),
            Cell::plain(fee),
        ]);
    }
    rows.push(vec![
        Cell::bold("Total"),
        Cell::bold(format_usd(table.total_cents)),
    ]);

    blocks.push(Block::Table(Table {
        column_percents: vec![75, 25],
        rows,
    }));
}

fn signature(blocks: &mut Vec<Block>, input: &ProposalInput, branding: &Branding) {
    blocks.push(Block::text(
        "If this proposal is acceptable, please sign below and return a copy to our office.",
        TextStyle::Body,
    ));
    blocks.push(Block::text("Sincerely,", TextStyle::Body));
    blocks.push(Block::text(branding.firm_name.trim(), TextStyle::Strong));
    blocks.push(Block::blank());
    blocks.push(Block::text("______________________________", TextStyle::Body));
    blocks.push(Block::text(
        format!(
            "{}\n{}",
            branding.signatory_name.trim(),
            branding.signatory_title.trim()
        ),
        TextStyle::Body,
    ));
    blocks.push(Block::blank());
    blocks.push(Block::text("Accepted by:", TextStyle::Strong));
    blocks.push(Block::blank());
    blocks.push(Block::text(
        "______________________________     Date: ______________",
        TextStyle::Body,
    ));
    blocks.push(Block::text(input.client_name.trim(), TextStyle::Body));
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use chrono::NaiveDate;
    use site_lookup_parcel_models::{County, LandArea};
    use site_lookup_proposal_models::PropertySummary;

    use super::*;

    fn pinellas_input() -> ProposalInput {
        let catalog = catalog::task_catalog();
        ProposalInput {
            project_name: "Ulmerton Retail".to_string(),
            client_name: "Jane Doe".to_string(),
            client_company: Some("Doe Holdings & Co.".to_string()),
            client_address: None,
            property: PropertySummary {
                county: County::Pinellas,
                parcel_id: "12-34-56-00000-000-0010".to_string(),
                address: "100 ULMERTON RD".to_string(),
                city: Some("LARGO".to_string()),
                zip: Some("33771".to_string()),
                owner: None,
                property_use: Some("Vacant Commercial".to_string()),
                jurisdiction: Some("Unincorporated".to_string()),
                zoning: Some("C-2".to_string()),
                future_land_use: Some("CG".to_string()),
                land_area: Some(LandArea {
                    square_feet: 59_560,
                    acres: 1.36,
                }),
            },
            tasks: catalog::select_tasks(
                &catalog,
                &["zoning-verification", "site-feasibility", "concept-plan"],
            )
            .unwrap(),
            fees: FeeSchedule::Flat {
                total_cents: 500_000,
            },
            proposal_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        }
    }

    fn document_xml(doc: &ProposalDocument) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(&doc.bytes)).unwrap();
        let mut part = archive.by_name("word/document.xml").unwrap();
        let mut xml = String::new();
        part.read_to_string(&mut xml).unwrap();
        xml
    }

    fn fee_table_block(blocks: &[Block]) -> &Table {
        blocks
            .iter()
            .filter_map(|b| match b {
                Block::Table(t) => Some(t),
                Block::Paragraph(_) => None,
            })
            .nth(1)
            .unwrap()
    }

    #[test]
    fn flat_fee_proposal_lists_tasks_and_total() {
        let input = pinellas_input();
        let branding = catalog::default_branding();
        let doc = assemble_proposal(&input, &branding).unwrap();
        let xml = document_xml(&doc);

        assert!(xml.contains("100 ULMERTON RD, LARGO 33771"));
        assert!(xml.contains("12-34-56-00000-000-0010"));
        assert!(xml.contains("$5,000"));
        assert!(xml.contains("March 2, 2026"));
        assert!(xml.contains("Doe Holdings &amp; Co."));
        assert!(xml.contains("59,560 sf (1.36 acres)"));

        let table = fees::fee_table(&input.tasks, input.fees).unwrap();
        let blocks = layout(&input, &branding, &table);
        let fee_rows = &fee_table_block(&blocks).rows;
        // header, three tasks, total
        assert_eq!(fee_rows.len(), 5);
        assert_eq!(fee_rows[1][0].text, "Task 1: Zoning and Future Land Use Verification");
        assert_eq!(fee_rows[4][1].text, "$5,000");
    }

    #[test]
    fn identical_inputs_produce_identical_bytes() {
        let branding = catalog::default_branding();
        let first = assemble_proposal(&pinellas_input(), &branding).unwrap();
        let second = assemble_proposal(&pinellas_input(), &branding).unwrap();
        assert_eq!(first.bytes, second.bytes);
        assert_eq!(first.sha256, second.sha256);
        assert_eq!(first.sha256.len(), 64);
        assert_eq!(first.file_name, "proposal-ulmerton-retail-2026-03-02.docx");
    }

    #[test]
    fn per_task_fees_sum_into_total() {
        let mut input = pinellas_input();
        input.fees = FeeSchedule::PerTask;
        let branding = catalog::default_branding();

        let table = fees::fee_table(&input.tasks, input.fees).unwrap();
        let blocks = layout(&input, &branding, &table);
        let fee_rows = &fee_table_block(&blocks).rows;
        assert_eq!(fee_rows[1][1].text, "$750");
        assert_eq!(fee_rows[2][1].text, "$2,500");
        assert_eq!(fee_rows[3][1].text, "$3,500");
        assert_eq!(fee_rows[4][1].text, "$6,750");

        let doc = assemble_proposal(&input, &branding).unwrap();
        assert!(document_xml(&doc).contains("$6,750"));
    }

    #[test]
    fn invalid_input_returns_all_errors() {
        let mut input = pinellas_input();
        input.client_name = String::new();
        input.tasks.clear();

        let err = assemble_proposal(&input, &catalog::default_branding()).unwrap_err();
        match err {
            ProposalError::Validation(errors) => {
                assert!(errors.has("clientName"));
                assert!(errors.has("tasks"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn file_name_falls_back_to_parcel_id() {
        let mut input = pinellas_input();
        input.project_name = "***".to_string();
        assert_eq!(
            file_name(&input),
            "proposal-12-34-56-00000-000-0010-2026-03-02.docx"
        );
    }
}
