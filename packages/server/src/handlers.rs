//! HTTP handler functions for the site lookup API.

use actix_web::{HttpResponse, web};
use site_lookup_arcgis::LookupError;
use site_lookup_parcel::{DiscoveryCache, LookupContext, discovery, land_area, parcel, registry};
use site_lookup_parcel_models::config::CountyConfig;
use site_lookup_parcel_models::{County, ParcelQuery};
use site_lookup_proposal::{DOCX_CONTENT_TYPE, assemble_proposal, catalog};
use site_lookup_proposal_models::ProposalInput;
use site_lookup_server_models::{
    ApiCounty, ApiHealth, ApiParcel, ApiSession, ApiSiteLookup, ApiTask, DiscoverQueryParams,
    ParcelQueryParams, ZoningQueryParams,
};
use uuid::Uuid;

use crate::AppState;
use crate::error::{lookup_error, not_found, proposal_error};

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/counties`
pub async fn counties() -> HttpResponse {
    let counties: Vec<ApiCounty> = County::ALL
        .iter()
        .map(|&county| ApiCounty {
            id: county,
            name: format!("{} County", county.label()),
            configured: registry::county_config(county).is_ok(),
        })
        .collect();
    HttpResponse::Ok().json(counties)
}

/// `POST /api/sessions`
pub async fn create_session(state: web::Data<AppState>) -> HttpResponse {
    let session_id = state.sessions.create();
    HttpResponse::Created().json(ApiSession { session_id })
}

/// `DELETE /api/sessions/{id}`
///
/// Drops the session's discovery cache.
pub async fn delete_session(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    let id = path.into_inner();
    if state.sessions.remove(&id) {
        HttpResponse::NoContent().finish()
    } else {
        not_found(format!("Session {id} not found"))
    }
}

fn parcel_query(county: County, parcel_id: &str) -> Result<(CountyConfig, ParcelQuery), LookupError> {
    let config = registry::county_config(county)?;
    let query = ParcelQuery::new(county, parcel_id)
        .ok_or_else(|| LookupError::validation("parcelId", "required"))?;
    Ok((config, query))
}

/// `GET /api/property`
///
/// "Lookup Property Info": parcel attributes and geometry.
pub async fn property(
    state: web::Data<AppState>,
    params: web::Query<ParcelQueryParams>,
) -> HttpResponse {
    let (county, query) = match parcel_query(params.county, &params.parcel_id) {
        Ok(v) => v,
        Err(e) => return lookup_error(&e),
    };

    match parcel::resolve_parcel(state.client.as_ref(), &county, &query).await {
        Ok(record) => HttpResponse::Ok().json(ApiParcel::from(record)),
        Err(e) => lookup_error(&e),
    }
}

/// `GET /api/land-area`
pub async fn land_area(
    state: web::Data<AppState>,
    params: web::Query<ParcelQueryParams>,
) -> HttpResponse {
    let county = match registry::county_config(params.county) {
        Ok(c) => c,
        Err(e) => return lookup_error(&e),
    };

    match land_area::lookup_land_area(state.client.as_ref(), &county, &params.parcel_id).await {
        Ok(area) => HttpResponse::Ok().json(area),
        Err(e) => lookup_error(&e),
    }
}

/// `GET /api/zoning`
///
/// "Lookup Zoning & Site Data": parcel, jurisdiction, zoning, and FLU.
/// With a `sessionId` the session's discovery cache is used and updated.
pub async fn zoning(
    state: web::Data<AppState>,
    params: web::Query<ZoningQueryParams>,
) -> HttpResponse {
    let (county, query) = match parcel_query(params.county, &params.parcel_id) {
        Ok(v) => v,
        Err(e) => return lookup_error(&e),
    };
    let ctx = LookupContext::new(state.client.as_ref(), &county, &state.keywords);

    let result = match params.session_id {
        Some(id) => {
            let Some(session) = state.sessions.get(&id) else {
                return not_found(format!("Session {id} not found"));
            };
            let mut cache = session.lock().await;
            site_lookup_parcel::lookup_site(&ctx, &mut cache, &query).await
        }
        None => site_lookup_parcel::lookup_site(&ctx, &mut DiscoveryCache::new(), &query).await,
    };

    match result {
        Ok(site) => HttpResponse::Ok().json(ApiSiteLookup::new(
            site.parcel,
            site.jurisdiction,
            site.zoning,
        )),
        Err(e) => lookup_error(&e),
    }
}

/// `GET /api/discover`
///
/// Runs auto-discovery for one jurisdiction's map application and reports
/// the ranked candidates and bound fields. A successful result is stored
/// in the session cache when a `sessionId` is given.
pub async fn discover(
    state: web::Data<AppState>,
    params: web::Query<DiscoverQueryParams>,
) -> HttpResponse {
    let county = match registry::county_config(params.county) {
        Ok(c) => c,
        Err(e) => return lookup_error(&e),
    };
    let Some(app) = county.city_app(&params.jurisdiction) else {
        return not_found(format!(
            "No map application configured for {} in {}",
            params.jurisdiction, county.name
        ));
    };
    let session = match params.session_id {
        Some(id) => match state.sessions.get(&id) {
            Some(session) => Some(session),
            None => return not_found(format!("Session {id} not found")),
        },
        None => None,
    };

    match discovery::discover_endpoint(
        state.client.as_ref(),
        &state.keywords,
        &app.jurisdiction,
        &app.app_url,
    )
    .await
    {
        Ok(report) => {
            if let Some(session) = session {
                session.lock().await.insert(report.endpoint.clone());
            }
            HttpResponse::Ok().json(report)
        }
        Err(e) => lookup_error(&e),
    }
}

/// `GET /api/tasks`
pub async fn tasks() -> HttpResponse {
    let tasks: Vec<ApiTask> = catalog::task_catalog()
        .tasks
        .into_iter()
        .map(ApiTask::from)
        .collect();
    HttpResponse::Ok().json(tasks)
}

/// `POST /api/proposal`
///
/// "Generate Proposal": returns the `.docx` as an attachment.
pub async fn proposal(
    state: web::Data<AppState>,
    input: web::Json<ProposalInput>,
) -> HttpResponse {
    match assemble_proposal(&input, &state.branding) {
        Ok(doc) => HttpResponse::Ok()
            .content_type(DOCX_CONTENT_TYPE)
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", doc.file_name),
            ))
            .insert_header(("X-Content-SHA256", doc.sha256))
            .body(doc.bytes),
        Err(e) => proposal_error(e),
    }
}
