//! HTTP surface: health, Prometheus scrape and read-only inspection.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/healthz` | Liveness |
//! | GET | `/metrics` | Prometheus exposition |
//! | GET | `/api/v1/instance-types` | Current instance catalog |
//! | GET | `/api/v1/nodeclaims` | Claims for every node in managed pools |
//! | GET | `/api/v1/nodeclaims/{instance_id}` | Claim for one instance |

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use mkspool_metrics::{ProviderMetrics, render_prometheus};
use mkspool_provider::naming::provider_id;
use mkspool_provider::{CloudProvider, ProviderError};

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub provider: Arc<CloudProvider>,
    pub metrics: Arc<ProviderMetrics>,
    /// Daemon shutdown token; aborts in-flight remote calls.
    pub cancel: CancellationToken,
}

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn provider_error(e: &ProviderError) -> axum::response::Response {
    let status = match e {
        ProviderError::NodeClaimNotFound(_) => StatusCode::NOT_FOUND,
        ProviderError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    };
    if status == StatusCode::BAD_GATEWAY {
        warn!(error = %e, "provider request failed");
    }
    error_response(&e.to_string(), status).into_response()
}

pub fn build_router(state: HttpState) -> Router {
    let api_routes = Router::new()
        .route("/instance-types", get(list_instance_types))
        .route("/nodeclaims", get(list_node_claims))
        .route("/nodeclaims/{instance_id}", get(get_node_claim))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(healthz))
        .route("/metrics", get(prometheus_metrics).with_state(state))
}

/// GET /healthz
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// GET /metrics
async fn prometheus_metrics(State(state): State<HttpState>) -> impl IntoResponse {
    let body = render_prometheus(&state.metrics.snapshot());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// GET /api/v1/instance-types
async fn list_instance_types(State(state): State<HttpState>) -> impl IntoResponse {
    let instance_types = state.provider.get_instance_types().await;
    ApiResponse::ok(instance_types.as_ref().clone())
}

/// GET /api/v1/nodeclaims
async fn list_node_claims(State(state): State<HttpState>) -> impl IntoResponse {
    match state.provider.list(&state.cancel).await {
        Ok(claims) => ApiResponse::ok(claims).into_response(),
        Err(e) => provider_error(&e),
    }
}

/// GET /api/v1/nodeclaims/{instance_id}
async fn get_node_claim(
    State(state): State<HttpState>,
    Path(instance_id): Path<String>,
) -> impl IntoResponse {
    match state
        .provider
        .get(&state.cancel, &provider_id(&instance_id))
        .await
    {
        Ok(claim) => ApiResponse::ok(claim).into_response(),
        Err(e) => provider_error(&e),
    }
}
