//! `OpenAPI` document for the HTTP surface, generated from the handler
//! annotations and served at `/openapi.json`.

use axum::response::{IntoResponse, Json};
use utoipa::OpenApi;

use super::handlers::{auth, health, types};

#[derive(OpenApi)]
#[openapi(
    paths(auth::signup, auth::login, auth::me, health::health),
    components(schemas(
        types::SignupRequest,
        types::LoginRequest,
        types::MessageResponse,
        types::LoginResponse,
        types::MeResponse,
        types::ErrorResponse,
        health::Health,
        crate::auth::PublicIdentity,
        crate::auth::Role,
    )),
    tags(
        (name = "auth", description = "Signup, OTP login and session lookup"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

pub async fn serve() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
