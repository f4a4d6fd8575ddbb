use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::infra::http::middleware::RequestContext;

use super::error::ApiError;
use super::models::*;
use super::state::ApiState;

/// -------- Snapshots --------
pub async fn create_snapshot(
    State(state): State<ApiState>,
    Extension(request): Extension<RequestContext>,
    Json(payload): Json<SnapshotCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = ApiState::operation_context(&request);

    let id = state
        .snapshots
        .create_snapshot(&ctx, payload.bank_id, payload.period, &payload.report_type)
        .await?;

    Ok((StatusCode::CREATED, Json(SnapshotCreatedResponse { id })))
}

pub async fn get_snapshot(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.snapshots.get_snapshot(id).await?;
    Ok(Json(SnapshotResponse::from(snapshot)))
}

pub async fn list_snapshots(
    State(state): State<ApiState>,
    Query(query): Query<SnapshotListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshots = state.snapshots.list_snapshots(query.into()).await?;
    Ok(Json(SnapshotListResponse {
        snapshots: snapshots.into_iter().map(SnapshotResponse::from).collect(),
    }))
}

pub async fn transition_snapshot(
    State(state): State<ApiState>,
    Extension(request): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SnapshotTransitionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = ApiState::operation_context(&request);

    let snapshot = state
        .snapshots
        .transition_status_raw(&ctx, id, &payload.status.as_raw())
        .await?;

    Ok(Json(SnapshotResponse::from(snapshot)))
}

/// -------- Health --------
pub async fn health(State(state): State<ApiState>) -> Response {
    match state.health.ping(state.health_timeout).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
            }),
        )
            .into_response(),
        Err(err) => {
            warn!(
                target: "regsnap::http::health",
                error = %err,
                "store health check failed"
            );
            let mut response = (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "error".to_string(),
                }),
            )
                .into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
