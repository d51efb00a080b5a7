use axum::response::IntoResponse;
use axum::Json;
use broker_core::{BrokerError, ErrorKind};
use http::StatusCode;
use log::{error, warn};
use serde_json::json;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub detail: String,
    pub status_code: StatusCode,
    /// Tells the browser to restart the login flow instead of showing an error
    pub reauthenticate: bool,
}

impl ApiError {
    /// Create a new ApiError with a detail message and status code
    pub fn new<S: ToString>(detail: S, status_code: StatusCode) -> Self {
        Self {
            detail: detail.to_string(),
            status_code,
            reauthenticate: false,
        }
    }

    /// Create new Internal Server Error (500) with a detail message
    pub fn internal<S: ToString>(detail: S) -> Self {
        Self::new(detail, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Create new Bad Request Error (400) with a detail message
    pub fn bad_request<S: ToString>(detail: S) -> Self {
        Self::new(detail, StatusCode::BAD_REQUEST)
    }

    /// Create new Unauthorized Error (401) asking the client to log in again
    pub fn login_required<S: ToString>(detail: S) -> Self {
        Self {
            reauthenticate: true,
            ..Self::new(detail, StatusCode::UNAUTHORIZED)
        }
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        match err.kind() {
            ErrorKind::MissingCredentials | ErrorKind::InvalidScope => {
                error!("Broker misconfigured: {}", err);
                Self::internal(err)
            }
            ErrorKind::NotAuthenticated
            | ErrorKind::InvalidSession
            | ErrorKind::ReauthRequired => Self::login_required(err),
            ErrorKind::InvalidState => Self::new(err, StatusCode::FORBIDDEN),
            ErrorKind::InvalidCallback => Self::bad_request(err),
            ErrorKind::UpstreamAuthFailure => {
                warn!("{}", err);
                Self::new(err, StatusCode::BAD_GATEWAY)
            }
            ErrorKind::Store | ErrorKind::Transport => {
                error!("Dependency unavailable: {}", err);
                Self::new(err, StatusCode::SERVICE_UNAVAILABLE)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code;
        let mut body = json!({
            "detail": self.detail,
        });
        if self.reauthenticate {
            body["reauthenticate"] = json!(true);
        }
        (status_code, Json(body)).into_response()
    }
}
