//! Request and response types for the auth endpoints.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::auth::PublicIdentity;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    /// Clients send the code as a string or a bare number.
    #[serde(deserialize_with = "string_or_number")]
    #[schema(value_type = String)]
    pub otp: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: PublicIdentity,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct MeResponse {
    pub user: PublicIdentity,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(u64),
    }

    Ok(match Code::deserialize(deserializer)? {
        Code::Text(text) => text,
        Code::Number(number) => number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_accepts_string_otp() {
        let request: LoginRequest =
            serde_json::from_str(r#"{"email":"a@x.com","otp":"123456"}"#).unwrap();
        assert_eq!(request.otp, "123456");
    }

    #[test]
    fn login_request_accepts_numeric_otp() {
        let request: LoginRequest =
            serde_json::from_str(r#"{"email":"a@x.com","otp":123456}"#).unwrap();
        assert_eq!(request.otp, "123456");
    }

    #[test]
    fn login_request_rejects_other_types() {
        assert!(serde_json::from_str::<LoginRequest>(r#"{"email":"a@x.com","otp":true}"#).is_err());
    }
}
