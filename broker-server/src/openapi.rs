use utoipa::OpenApi;

pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const AUTH_TAG: &str = "Authentication API";

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::health::health_check,
        crate::api::health::ready_check,
        crate::api::auth::login_handler,
        crate::api::auth::callback_handler,
        crate::api::auth::logout_handler,
        crate::api::auth::status_handler,
        crate::api::auth::token_handler,
    ),
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = AUTH_TAG, description = "Login flow and token endpoints"),
    ),
    info(
        title = "Credential Broker API",
        description = "Application and delegated token broker for the platform API",
        version = "0.1.0"
    )
)]
pub(crate) struct ApiDoc;
