use crate::openapi::HEALTH_TAG;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub(crate) struct Liveness {
    status: String,
}

/// What the broker needs before it can serve logins and tokens
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub(crate) struct Readiness {
    ready: bool,
    store: StoreStatus,
    /// Client credentials and callback URL are configured
    delegated_login: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub(crate) struct StoreStatus {
    backend: String,
    healthy: bool,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = HEALTH_TAG,
    responses(
        (status = 200, description = "Process is alive", body = Liveness)
    )
)]
pub(crate) async fn health_check() -> Json<Liveness> {
    Json(Liveness {
        status: "ok".to_string(),
    })
}

/// Ready once the session store answers. A broker without delegated login
/// configured is still ready to serve application tokens.
#[utoipa::path(
    get,
    path = "/ready",
    tag = HEALTH_TAG,
    responses(
        (status = 200, description = "Session store reachable", body = Readiness),
        (status = 503, description = "Session store unavailable", body = Readiness)
    )
)]
pub(crate) async fn ready_check(State(state): State<AppState>) -> Response {
    let healthy = state.health_check().await;
    let readiness = Readiness {
        ready: healthy,
        store: StoreStatus {
            backend: state.broker.store().backend_name().to_string(),
            healthy,
        },
        delegated_login: state.broker.tokens().ensure_delegated_config().is_ok(),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(readiness)).into_response()
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
}
