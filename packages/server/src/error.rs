//! Mapping of lookup and proposal failures onto HTTP responses.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use site_lookup_arcgis::LookupError;
use site_lookup_parcel_models::ErrorKind;
use site_lookup_proposal::ProposalError;
use site_lookup_proposal_models::FieldError;
use site_lookup_server_models::ApiError;

/// HTTP status for a lookup failure.
#[must_use]
pub const fn lookup_status(err: &LookupError) -> StatusCode {
    match err {
        LookupError::NotFound { .. } => StatusCode::NOT_FOUND,
        LookupError::Network {
            timed_out: true, ..
        } => StatusCode::GATEWAY_TIMEOUT,
        LookupError::Network { .. } => StatusCode::SERVICE_UNAVAILABLE,
        LookupError::SchemaMismatch { .. } | LookupError::DiscoveryFailed(_) => {
            StatusCode::BAD_GATEWAY
        }
        LookupError::MissingGeometry | LookupError::Validation { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

/// Error response for a failed lookup.
pub fn lookup_error(err: &LookupError) -> HttpResponse {
    let status = lookup_status(err);
    if status.is_server_error() {
        log::warn!("Lookup failed: {err}");
    } else {
        log::debug!("Lookup rejected: {err}");
    }
    let fields = match err {
        LookupError::Validation { field, message } => vec![FieldError::new(field, message)],
        _ => Vec::new(),
    };
    HttpResponseBuilder::new(status).json(ApiError {
        kind: err.kind(),
        message: err.to_string(),
        retryable: err.is_retryable(),
        manual_entry: err.needs_manual_entry(),
        fields,
    })
}

/// 404 for a resource the API itself tracks (sessions, map apps).
pub fn not_found(message: impl Into<String>) -> HttpResponse {
    HttpResponse::NotFound().json(ApiError {
        kind: ErrorKind::NotFound,
        message: message.into(),
        retryable: false,
        manual_entry: false,
        fields: Vec::new(),
    })
}

/// 422 for malformed request input.
pub fn invalid_input(message: impl Into<String>) -> HttpResponse {
    HttpResponse::UnprocessableEntity().json(ApiError::validation(message, Vec::new()))
}

/// Error response for a failed proposal.
pub fn proposal_error(err: ProposalError) -> HttpResponse {
    match err {
        ProposalError::Validation(errors) => HttpResponse::UnprocessableEntity()
            .json(ApiError::validation(errors.to_string(), errors.0)),
        ProposalError::UnknownTask(_) => invalid_input(err.to_string()),
        ProposalError::Zip(_)
        | ProposalError::Write(_)
        | ProposalError::Io { .. }
        | ProposalError::Config { .. } => {
            log::error!("Failed to assemble proposal: {err}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to assemble proposal"
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use site_lookup_parcel_models::DiscoveryFailure;

    use super::*;

    #[test]
    fn maps_lookup_errors_to_statuses() {
        let cases = [
            (
                LookupError::NotFound {
                    what: "parcel".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                LookupError::Network {
                    url: "u".to_string(),
                    message: "timed out".to_string(),
                    timed_out: true,
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                LookupError::Network {
                    url: "u".to_string(),
                    message: "connection refused".to_string(),
                    timed_out: false,
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (LookupError::schema("u", "no features"), StatusCode::BAD_GATEWAY),
            (
                LookupError::DiscoveryFailed(DiscoveryFailure::NoZoningLayer),
                StatusCode::BAD_GATEWAY,
            ),
            (
                LookupError::validation("parcelId", "required"),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (LookupError::MissingGeometry, StatusCode::UNPROCESSABLE_ENTITY),
        ];
        for (err, status) in cases {
            assert_eq!(lookup_status(&err), status, "{err}");
        }
    }
}
