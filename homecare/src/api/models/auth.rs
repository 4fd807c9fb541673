//! Request and response payloads for the `/auth/*` endpoints.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::profiles::{ProfileResponse, Role};
use crate::errors::Error;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    /// Any role except `agency_admin`
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub profile: ProfileResponse,
    pub message: String,
    /// The dashboard for the profile's role
    pub redirect_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSuccessResponse {
    pub message: String,
}

/// Whether native login and sign-up are currently available.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthInfo {
    pub login_enabled: bool,
    pub registration_enabled: bool,
    /// Roles a visitor may pick when signing up
    pub registrable_roles: Vec<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PasswordResetConfirmRequest {
    /// The raw token from the emailed link
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// A JSON body sent together with a `Set-Cookie` header.
pub struct SessionResponse<T> {
    pub status: StatusCode,
    pub body: T,
    pub cookie: String,
}

impl<T: Serialize> IntoResponse for SessionResponse<T> {
    fn into_response(self) -> Response {
        let cookie = match HeaderValue::from_str(&self.cookie) {
            Ok(value) => value,
            Err(e) => {
                return Error::Internal {
                    operation: format!("build session cookie header: {e}"),
                }
                .into_response();
            }
        };
        let mut headers = HeaderMap::new();
        headers.insert(header::SET_COOKIE, cookie);
        (self.status, headers, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_response_sets_cookie_and_status() {
        let response = SessionResponse {
            status: StatusCode::CREATED,
            body: AuthSuccessResponse {
                message: "ok".to_string(),
            },
            cookie: "homecare_session=abc; Path=/; HttpOnly".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::SET_COOKIE], "homecare_session=abc; Path=/; HttpOnly");
    }

    #[test]
    fn unencodable_cookie_is_an_internal_error() {
        let response = SessionResponse {
            status: StatusCode::OK,
            body: AuthSuccessResponse {
                message: "ok".to_string(),
            },
            cookie: "bad\ncookie".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn register_request_requires_a_role() {
        let missing = serde_json::from_value::<RegisterRequest>(serde_json::json!({
            "email": "a@example.com",
            "password": "password123",
            "first_name": "A",
            "last_name": "B"
        }));
        assert!(missing.is_err());
    }
}
