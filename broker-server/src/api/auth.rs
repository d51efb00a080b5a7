//! Browser facing login flow and token endpoints.

use crate::errors::ApiError;
use crate::openapi::AUTH_TAG;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct LoginParams {
    /// Where to send the browser once login completes
    #[serde(rename = "returnTo")]
    return_to: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    /// Set by the provider when the user denied consent
    error: Option<String>,
    error_description: Option<String>,
}

/// Login state of the calling browser
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub(crate) struct StatusResponse {
    authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

/// Application token for browser side viewers
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub(crate) struct TokenResponse {
    access_token: String,
    token_type: String,
    /// Seconds until the token expires
    expires_in: u64,
}

#[utoipa::path(
    get,
    path = "/auth/login",
    tag = AUTH_TAG,
    params(LoginParams),
    responses(
        (status = 303, description = "Redirect to the provider's authorization page"),
        (status = 500, description = "Delegated login is not configured")
    )
)]
pub(crate) async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<LoginParams>,
) -> Result<Response, ApiError> {
    let session_id = state.session_id(&headers);
    let redirect = state
        .broker
        .flow()
        .begin_login(session_id.as_deref(), params.return_to.as_deref())
        .await?;

    let response = Redirect::to(redirect.authorize_url.as_str()).into_response();
    with_cookie(response, redirect.set_cookie)
}

#[utoipa::path(
    get,
    path = "/auth/callback",
    tag = AUTH_TAG,
    params(CallbackParams),
    responses(
        (status = 303, description = "Login completed, redirect to the original page"),
        (status = 400, description = "Callback without an authorization code"),
        (status = 401, description = "Login session missing or expired"),
        (status = 403, description = "State does not match the pending login"),
        (status = 502, description = "The provider rejected the authorization code")
    )
)]
pub(crate) async fn callback_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    if let Some(error) = params.error {
        warn!(
            "Provider returned an authorization error: {} {}",
            error,
            params.error_description.as_deref().unwrap_or_default()
        );
        return Err(ApiError::login_required(format!(
            "Authorization was not granted: {}",
            error
        )));
    }

    let session_id = state.session_id(&headers);
    let completion = state
        .broker
        .flow()
        .complete_login(
            session_id.as_deref(),
            params.code.as_deref(),
            params.state.as_deref(),
        )
        .await?;

    let response = Redirect::to(&completion.return_to).into_response();
    with_cookie(response, completion.set_cookie)
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = AUTH_TAG,
    responses(
        (status = 204, description = "Session removed and cookie cleared")
    )
)]
pub(crate) async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session_id = state.session_id(&headers);
    let cleared = state.broker.flow().logout(session_id.as_deref()).await?;
    with_cookie(StatusCode::NO_CONTENT.into_response(), Some(cleared))
}

#[utoipa::path(
    get,
    path = "/auth/status",
    tag = AUTH_TAG,
    responses(
        (status = 200, description = "Login state of the calling browser", body = StatusResponse)
    )
)]
pub(crate) async fn status_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, ApiError> {
    let session_id = state.session_id(&headers);
    let status = state
        .broker
        .flow()
        .login_status(session_id.as_deref())
        .await?;
    Ok(Json(StatusResponse {
        authenticated: status.authenticated,
        expires_at: status.expires_at,
    }))
}

#[utoipa::path(
    get,
    path = "/auth/token",
    tag = AUTH_TAG,
    responses(
        (status = 200, description = "Viewer token", body = TokenResponse),
        (status = 500, description = "Application credentials are not configured"),
        (status = 502, description = "The provider rejected the application credentials")
    )
)]
pub(crate) async fn token_handler(
    State(state): State<AppState>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = state.broker.tokens().viewer_token().await?;
    debug!("Serving viewer token");
    Ok(Json(TokenResponse {
        expires_in: token.remaining_secs(Utc::now()),
        access_token: token.access_token,
        token_type: token.token_type,
    }))
}

fn with_cookie(mut response: Response, cookie: Option<String>) -> Result<Response, ApiError> {
    if let Some(cookie) = cookie {
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| ApiError::internal(format!("Invalid cookie header: {}", e)))?;
        response.headers_mut().append(SET_COOKIE, value);
    }
    Ok(response)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login_handler))
        .route("/auth/callback", get(callback_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/status", get(status_handler))
        .route("/auth/token", get(token_handler))
}
