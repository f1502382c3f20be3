//! Plain-text rendering of lookup results.

use site_lookup_arcgis::LookupError;
use site_lookup_parcel::discovery::DiscoveryReport;
use site_lookup_parcel_models::{
    Designation, DesignationKind, Jurisdiction, LandArea, ParcelRecord, ZoningResult,
};

const LABEL_WIDTH: usize = 18;

fn row(label: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        println!("  {label:<LABEL_WIDTH$} {value}");
    }
}

pub fn print_parcel(parcel: &ParcelRecord) {
    println!("Parcel {} ({} County)", parcel.parcel_id, parcel.county.label());
    row("Address", parcel.address.as_deref());
    row("City", parcel.city.as_deref());
    row("ZIP", parcel.zip.as_deref());
    row("Owner", parcel.owner.as_deref());
    row("Property use", parcel.property_use.as_deref());
    row(
        "Acreage",
        parcel.acreage.map(|a| format!("{a:.2}")).as_deref(),
    );
    if parcel.geometry.is_none() {
        println!("  (no parcel geometry returned)");
    }
}

pub fn print_jurisdiction(jurisdiction: &Jurisdiction) {
    row("Jurisdiction", Some(&jurisdiction.name));
}

fn designations(values: &[Designation]) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    Some(
        values
            .iter()
            .map(|d| match &d.description {
                Some(desc) => format!("{} ({desc})", d.code),
                None => d.code.clone(),
            })
            .collect::<Vec<_>>()
            .join(", "),
    )
}

pub fn print_zoning(zoning: &ZoningResult) {
    row("Zoning", designations(&zoning.zoning).as_deref());
    row(
        "Future land use",
        designations(&zoning.future_land_use).as_deref(),
    );
    row("Source", Some(zoning.source.as_ref()));
    if let Some(reason) = &zoning.manual_reason {
        println!("  Manual entry needed: {reason}");
    }
}

pub fn print_land_area(area: &LandArea) {
    row(
        "Land area",
        Some(&format!(
            "{} sf | {:.2} acres",
            site_lookup_proposal::fees::group_thousands(area.square_feet),
            area.acres
        )),
    );
}

pub fn print_discovery(report: &DiscoveryReport) {
    println!(
        "App {} on {} ({} layers)",
        report.app_item_id, report.host, report.layer_count
    );
    if let Some(webmap) = &report.webmap_id {
        row("Web map", Some(webmap));
    }
    println!("  Candidates:");
    for candidate in &report.candidates {
        println!("    [{:>3}] {} -> {}", candidate.score, candidate.title, candidate.url);
    }
    let endpoint = &report.endpoint;
    println!("  Bound:");
    for (label, kind) in [
        ("Zoning", DesignationKind::Zoning),
        ("Future land use", DesignationKind::FutureLandUse),
    ] {
        let bound = endpoint.binding(kind).map_or_else(
            || format!("unbound: {}", endpoint.unbound_reason(kind)),
            |b| format!("{} [{}]", b.service_url, b.field.as_deref().unwrap_or("?")),
        );
        row(label, Some(&bound));
    }
}

/// One-line description of a failure plus what the user can do about it.
#[must_use]
pub fn describe_error(err: &LookupError) -> String {
    let hint = if err.is_retryable() {
        " (retry may succeed)"
    } else if err.needs_manual_entry() {
        " (enter values manually)"
    } else {
        ""
    };
    format!("{}: {err}{hint}", err.kind())
}
