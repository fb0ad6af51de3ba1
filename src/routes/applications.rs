//! Application routes: registry reads, scan results and on-demand scans.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::models::application::{Application, ApplicationSummary};
use crate::models::issue::Issue;
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::scan_run::ScanRun;
use crate::services::application::{self as app_service, ApplicationFilters};
use crate::services::issue::{self as issue_service, IssueFilters};
use crate::services::scan_run as scan_run_service;
use crate::services::summary::{self as summary_service, SummaryView};
use crate::AppState;

/// Body of `POST /applications/{id}/scan`. Empty scan types mean all.
#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub scan_types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ScanQueued {
    pub application_id: Uuid,
    /// `queued`, or `already_queued` when a cycle is pending or running.
    pub status: &'static str,
    pub scan_types: Vec<String>,
}

/// GET /api/v1/applications
pub async fn list(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filters): Query<ApplicationFilters>,
) -> Result<Json<ApiResponse<PagedResult<ApplicationSummary>>>, AppError> {
    let result = app_service::list(&state.db, &filters, &pagination).await?;
    Ok(ApiResponse::success(result))
}

/// GET /api/v1/applications/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Application>>, AppError> {
    let app = app_service::find_by_id(&state.db, id).await?;
    Ok(ApiResponse::success(app))
}

/// GET /api/v1/applications/{id}/issues: most recent first.
pub async fn issues(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
    Query(filters): Query<IssueFilters>,
) -> Result<Json<ApiResponse<PagedResult<Issue>>>, AppError> {
    app_service::find_by_id(&state.db, id).await?;
    let result = issue_service::list_for_application(&state.db, id, &filters, &pagination).await?;
    Ok(ApiResponse::success(result))
}

/// GET /api/v1/applications/{id}/summaries: latest summary per scan type.
pub async fn summaries(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BTreeMap<String, SummaryView>>>, AppError> {
    app_service::find_by_id(&state.db, id).await?;
    let result = summary_service::latest_by_type(&state.db, id).await?;
    Ok(ApiResponse::success(result))
}

/// GET /api/v1/applications/{id}/scan-runs
pub async fn scan_runs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<ScanRun>>>, AppError> {
    app_service::find_by_id(&state.db, id).await?;
    let runs = scan_run_service::recent_for_application(&state.db, id).await?;
    Ok(ApiResponse::success(runs))
}

/// POST /api/v1/applications/{id}/scan: queue a scan cycle.
pub async fn trigger_scan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ScanRequest>>,
) -> Result<Json<ApiResponse<ScanQueued>>, AppError> {
    let Json(request) = body.unwrap_or_default();
    app_service::find_by_id(&state.db, id).await?;

    let known = state.scheduler.context().known_scan_types();
    if let Some(unknown) = request
        .scan_types
        .iter()
        .find(|t| !known.iter().any(|k| k == t))
    {
        return Err(AppError::Validation(format!(
            "Unknown scan type '{unknown}'. Expected one of: {}",
            known.join(", ")
        )));
    }

    let status = match state.scheduler.enqueue(id, request.scan_types.clone()) {
        Some(_) => "queued",
        None => "already_queued",
    };
    tracing::info!(application_id = %id, status, scan_types = ?request.scan_types, "Scan requested");

    Ok(ApiResponse::success(ScanQueued {
        application_id: id,
        status,
        scan_types: request.scan_types,
    }))
}
