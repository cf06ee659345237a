//! Signup, login and session resolution endpoints.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::error;

use super::types::{
    ErrorResponse, LoginRequest, LoginResponse, MeResponse, MessageResponse, SignupRequest,
};
use crate::auth::{AuthError, AuthService, SignupOutcome};

/// Map a domain error to its wire form. Infrastructure failures stay opaque
/// to the caller and get logged with the underlying cause.
fn error_response(err: &AuthError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, message) = match err {
        AuthError::NotFound => (StatusCode::NOT_FOUND, "User not found"),
        AuthError::AlreadyUsed => (StatusCode::UNAUTHORIZED, "OTP has already been used"),
        AuthError::InvalidCode => (StatusCode::UNAUTHORIZED, "Invalid OTP"),
        AuthError::CodeExpired => (StatusCode::UNAUTHORIZED, "OTP has expired"),
        AuthError::Token(_) => (StatusCode::UNAUTHORIZED, "Unauthorized"),
        AuthError::InvalidEmail => (StatusCode::BAD_REQUEST, "Invalid email"),
        AuthError::Delivery(source) => {
            error!("notification delivery failed: {source:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
        AuthError::Store(source) => {
            error!("credential store failed: {source}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
        AuthError::Internal(source) => {
            error!("internal auth failure: {source:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "New user created, OTP sent", body = MessageResponse),
        (status = 200, description = "Existing user, fresh OTP sent", body = MessageResponse),
        (status = 400, description = "Missing payload or invalid email", body = ErrorResponse),
        (status = 500, description = "Error", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn signup(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Invalid email".to_string(),
            }),
        )
            .into_response();
    };

    match service.signup_or_challenge(&request.email).await {
        Ok(outcome) => {
            let status = match outcome {
                SignupOutcome::SignedUp => StatusCode::CREATED,
                SignupOutcome::ChallengeSent => StatusCode::OK,
            };
            let message = match outcome {
                SignupOutcome::SignedUp => "User signed up successfully",
                SignupOutcome::ChallengeSent => "Login OTP sent",
            };
            (
                status,
                Json(MessageResponse {
                    message: message.to_string(),
                }),
            )
                .into_response()
        }
        Err(err) => error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session established", body = LoginResponse),
        (status = 400, description = "Missing payload", body = ErrorResponse),
        (status = 401, description = "Invalid, expired or already used OTP", body = ErrorResponse),
        (status = 404, description = "Unknown email", body = ErrorResponse),
        (status = 500, description = "Error", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    service: Extension<Arc<AuthService>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Email and OTP are required".to_string(),
            }),
        )
            .into_response();
    };

    match service.redeem_challenge(&request.email, &request.otp).await {
        Ok(session) => (
            StatusCode::OK,
            Json(LoginResponse {
                message: "Login successful".to_string(),
                token: session.token,
                user: session.user,
            }),
        )
            .into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current identity", body = MeResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse),
        (status = 404, description = "Identity no longer exists", body = ErrorResponse),
        (status = 500, description = "Error", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn me(service: Extension<Arc<AuthService>>, headers: HeaderMap) -> impl IntoResponse {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim());

    let Some(token) = token.filter(|token| !token.is_empty()) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Unauthorized".to_string(),
            }),
        )
            .into_response();
    };

    match service.resolve_identity(token).await {
        Ok(user) => (StatusCode::OK, Json(MeResponse { user })).into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}
