//! Embedded task catalog and firm branding.
//!
//! Both files are compiled in via `include_str!`; a replacement branding
//! file can be loaded at runtime with [`load_branding`].

use std::path::Path;

use site_lookup_proposal_models::{Branding, ScopeTask, TaskCatalog};

use crate::ProposalError;

/// Number of catalog tasks. Enforced by a test.
#[cfg(test)]
const EXPECTED_TASK_COUNT: usize = 6;

const TASKS_TOML: &str = include_str!("../tasks.toml");

const BRANDING_TOML: &str = include_str!("../branding.toml");

/// Environment variable naming a replacement branding file.
pub const BRANDING_ENV: &str = "SITE_LOOKUP_BRANDING";

/// Returns the firm's standard task catalog.
///
/// # Panics
///
/// Panics if the embedded `tasks.toml` fails to parse.
#[must_use]
pub fn task_catalog() -> TaskCatalog {
    toml::de::from_str(TASKS_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse embedded tasks.toml: {e}"))
}

/// Returns the embedded branding.
///
/// # Panics
///
/// Panics if the embedded `branding.toml` fails to parse.
#[must_use]
pub fn default_branding() -> Branding {
    toml::de::from_str(BRANDING_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse embedded branding.toml: {e}"))
}

/// Reads branding from disk.
///
/// # Errors
///
/// Returns [`ProposalError::Io`] or [`ProposalError::Config`] if the file
/// cannot be read or parsed.
pub fn load_branding(path: &Path) -> Result<Branding, ProposalError> {
    let content = std::fs::read_to_string(path).map_err(|source| ProposalError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::de::from_str(&content).map_err(|source| ProposalError::Config {
        path: path.to_path_buf(),
        source,
    })
}

/// The branding file at `path` if given, otherwise the embedded default.
///
/// # Errors
///
/// See [`load_branding`].
pub fn resolve_branding(path: Option<&Path>) -> Result<Branding, ProposalError> {
    match path {
        Some(path) => {
            log::info!("Loading branding from {}", path.display());
            load_branding(path)
        }
        None => Ok(default_branding()),
    }
}

/// Picks catalog tasks by ID, in the order given, with their default fees.
///
/// # Errors
///
/// Returns [`ProposalError::UnknownTask`] for the first ID not in the
/// catalog.
pub fn select_tasks<S: AsRef<str>>(
    catalog: &TaskCatalog,
    ids: &[S],
) -> Result<Vec<ScopeTask>, ProposalError> {
    ids.iter()
        .map(|id| {
            let id = id.as_ref().trim();
            catalog
                .tasks
                .iter()
                .find(|t| t.id == id)
                .map(site_lookup_proposal_models::CatalogTask::to_scope_task)
                .ok_or_else(|| ProposalError::UnknownTask(id.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn all_tasks_parse() {
        assert_eq!(task_catalog().tasks.len(), EXPECTED_TASK_COUNT);
    }

    #[test]
    fn task_ids_are_unique() {
        let catalog = task_catalog();
        let ids: BTreeSet<&str> = catalog.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), catalog.tasks.len());
    }

    #[test]
    fn tasks_have_required_fields() {
        for task in task_catalog().tasks {
            assert!(!task.id.is_empty());
            assert!(!task.title.trim().is_empty(), "{} has no title", task.id);
            assert_ne!(task.default_fee_cents, Some(0), "{} has a zero fee", task.id);
        }
    }

    #[test]
    fn branding_parses() {
        let branding = default_branding();
        assert!(!branding.firm_name.is_empty());
        assert!(!branding.signatory_name.is_empty());
    }

    #[test]
    fn selects_tasks_in_requested_order() {
        let catalog = task_catalog();
        let tasks = select_tasks(&catalog, &["concept-plan", "zoning-verification"]).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id.as_deref(), Some("concept-plan"));
        assert_eq!(tasks[0].fee_cents, Some(350_000));
        assert_eq!(tasks[1].title, "Zoning and Future Land Use Verification");
    }

    #[test]
    fn unknown_task_id_is_rejected() {
        let err = select_tasks(&task_catalog(), &["zoning-verification", "landscaping"]).unwrap_err();
        assert!(matches!(err, ProposalError::UnknownTask(id) if id == "landscaping"));
    }
}
