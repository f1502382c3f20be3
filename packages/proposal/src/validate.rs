//! Field-level proposal validation.
//!
//! Every check runs on every call so the caller can show all problems at
//! once.

use site_lookup_proposal_models::{Branding, FeeSchedule, ProposalInput, ValidationErrors};

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Checks a proposal and its branding.
///
/// # Errors
///
/// Returns every [`site_lookup_proposal_models::FieldError`] found, keyed
/// by camelCase field path.
pub fn validate(input: &ProposalInput, branding: &Branding) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if is_blank(&input.project_name) {
        errors.push("projectName", "required");
    }
    if is_blank(&input.client_name) {
        errors.push("clientName", "required");
    }
    if is_blank(&input.property.parcel_id) {
        errors.push("property.parcelId", "required");
    }
    if is_blank(&input.property.address) {
        errors.push("property.address", "required");
    }

    if input.tasks.is_empty() {
        errors.push("tasks", "at least one task is required");
    }
    for (i, task) in input.tasks.iter().enumerate() {
        if is_blank(&task.title) {
            errors.push(format!("tasks[{i}].title"), "required");
        }
    }

    match input.fees {
        FeeSchedule::Flat { total_cents } => {
            if total_cents == 0 {
                errors.push("fees.totalCents", "must be greater than zero");
            }
        }
        FeeSchedule::PerTask => {
            let mut total = Some(0u64);
            for (i, task) in input.tasks.iter().enumerate() {
                match task.fee_cents {
                    Some(fee) if fee > 0 => total = total.and_then(|t| t.checked_add(fee)),
                    _ => errors.push(
                        format!("tasks[{i}].feeCents"),
                        "must be greater than zero",
                    ),
                }
            }
            if total.is_none() {
                errors.push("fees", "total is too large");
            }
        }
    }

    if is_blank(&branding.firm_name) {
        errors.push("branding.firmName", "required");
    }
    if is_blank(&branding.signatory_name) {
        errors.push("branding.signatoryName", "required");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        log::debug!("Proposal failed validation: {errors}");
        Err(errors)
    }
}
