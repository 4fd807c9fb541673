use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        auth::{
            AuthInfo, AuthResponse, AuthSuccessResponse, ChangePasswordRequest, LoginRequest, PasswordResetConfirmRequest,
            PasswordResetRequest, RegisterRequest, SessionResponse,
        },
        pages::home_path,
        profiles::{CurrentUser, ProfileResponse, Role, normalize_email},
    },
    auth::{password, session},
    config::Config,
    db::{
        handlers::{PasswordResetTokens, Profiles, Repository},
        models::profiles::{ProfileCreateDBRequest, ProfileUpdateDBRequest},
    },
    email::EmailService,
    errors::Error,
};

const REGISTRABLE_ROLES: [Role; 5] = [Role::Patient, Role::Caregiver, Role::Clinician, Role::Physician, Role::Vendor];

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    }
}

fn require_native_auth(config: &Config) -> Result<(), Error> {
    if !config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }
    Ok(())
}

async fn hash_password(password: String) -> Result<String, Error> {
    tokio::task::spawn_blocking(move || password::hash_string(&password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

async fn verify_password(password: String, hash: String) -> Result<bool, Error> {
    tokio::task::spawn_blocking(move || password::verify_string(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })?
}

fn session_cookie(token: &str, config: &Config) -> String {
    let session_config = &config.auth.native.session;
    format!(
        "{}={}; Path=/; HttpOnly; Secure={}; SameSite={}; Max-Age={}",
        session_config.cookie_name,
        token,
        session_config.cookie_secure,
        session_config.cookie_same_site,
        session_config.timeout.as_secs()
    )
}

fn signed_in(profile: ProfileResponse, message: &str, status: StatusCode, config: &Config) -> Result<SessionResponse<AuthResponse>, Error> {
    let current_user = CurrentUser {
        id: profile.id,
        email: profile.email.clone(),
        role: profile.role,
        first_name: profile.first_name.clone(),
        last_name: profile.last_name.clone(),
    };
    let token = session::create_session_token(&current_user, config)?;
    Ok(SessionResponse {
        status,
        cookie: session_cookie(&token, config),
        body: AuthResponse {
            redirect_to: home_path(profile.role).to_string(),
            profile,
            message: message.to_string(),
        },
    })
}

/// What the sign-in and sign-up forms may offer
#[utoipa::path(
    get,
    path = "/auth/login",
    tag = "authentication",
    responses(
        (status = 200, description = "Sign-in availability", body = AuthInfo),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_auth_info(State(state): State<AppState>) -> Json<AuthInfo> {
    let native = &state.config.auth.native;
    let registration_enabled = native.enabled && native.allow_registration;
    Json(AuthInfo {
        login_enabled: native.enabled,
        registration_enabled,
        registrable_roles: if registration_enabled { REGISTRABLE_ROLES.to_vec() } else { Vec::new() },
    })
}

/// Create a profile (and its role record) and sign in
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "Profile created", body = AuthResponse),
        (status = 400, description = "Invalid input or registration disabled"),
        (status = 409, description = "Email already registered"),
    )
)]
#[tracing::instrument(skip_all, fields(role = %request.role))]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<SessionResponse<AuthResponse>, Error> {
    require_native_auth(&state.config)?;
    if !state.config.auth.native.allow_registration {
        return Err(Error::BadRequest {
            message: "Registration is disabled".to_string(),
        });
    }
    if !request.role.is_self_registrable() {
        return Err(Error::BadRequest {
            message: format!("Accounts with the {} role cannot be self-registered", request.role),
        });
    }
    if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "First and last name are required".to_string(),
        });
    }
    let email = normalize_email(&request.email)?;
    password::validate_password(&request.password, &state.config.auth.native.password)?;

    let password_hash = hash_password(request.password).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut profiles = Profiles::new(&mut conn);
    if profiles.get_by_email(&email).await?.is_some() {
        return Err(Error::Conflict {
            message: "An account with this email address already exists".to_string(),
        });
    }

    let profile = profiles
        .create(&ProfileCreateDBRequest {
            email,
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            phone: request.phone,
            role: request.role,
            password_hash: Some(password_hash),
            auth_source: "native".to_string(),
        })
        .await?;

    tracing::info!(profile_id = %profile.id, "profile registered");
    signed_in(profile.into(), "Registration successful", StatusCode::CREATED, &state.config)
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<SessionResponse<AuthResponse>, Error> {
    require_native_auth(&state.config)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let email = request.email.trim().to_lowercase();
    let profile = Profiles::new(&mut conn)
        .get_by_email(&email)
        .await?
        .ok_or_else(invalid_credentials)?;
    let hash = profile.password_hash.clone().ok_or_else(invalid_credentials)?;

    if !verify_password(request.password, hash).await? {
        return Err(invalid_credentials());
    }

    signed_in(profile.into(), "Login successful", StatusCode::OK, &state.config)
}

/// Clear the session cookie
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Signed out", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> SessionResponse<AuthSuccessResponse> {
    let session_config = &state.config.auth.native.session;
    SessionResponse {
        status: StatusCode::OK,
        cookie: format!(
            "{}=; Path=/; HttpOnly; Secure={}; SameSite={}; Max-Age=0",
            session_config.cookie_name, session_config.cookie_secure, session_config.cookie_same_site
        ),
        body: AuthSuccessResponse {
            message: "Logout successful".to_string(),
        },
    }
}

/// Email a password reset link
///
/// Always answers with the same message so the response does not reveal which emails exist.
#[utoipa::path(
    post,
    path = "/auth/password-resets",
    request_body = PasswordResetRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Reset link sent if the account exists", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<Json<AuthSuccessResponse>, Error> {
    require_native_auth(&state.config)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let email = request.email.trim().to_lowercase();
    let profile = Profiles::new(&mut tx).get_by_email(&email).await?;

    if let Some(profile) = profile.filter(|p| p.password_hash.is_some()) {
        let (raw_token, token) = PasswordResetTokens::new(&mut tx).create_for_profile(profile.id, &state.config).await?;
        EmailService::new(&state.config)?
            .send_password_reset_email(&profile.email, &profile.full_name(), &token.id, &raw_token)
            .await?;
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(AuthSuccessResponse {
        message: "If an account with that email exists, a password reset link has been sent.".to_string(),
    }))
}

/// Set a new password using an emailed reset token
#[utoipa::path(
    post,
    path = "/auth/password-resets/{token_id}/confirm",
    request_body = PasswordResetConfirmRequest,
    params(("token_id" = uuid::Uuid, Path, description = "Reset token ID from the emailed link")),
    tag = "authentication",
    responses(
        (status = 200, description = "Password reset", body = AuthSuccessResponse),
        (status = 400, description = "Invalid or expired token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Path(token_id): Path<Uuid>,
    Json(request): Json<PasswordResetConfirmRequest>,
) -> Result<Json<AuthSuccessResponse>, Error> {
    require_native_auth(&state.config)?;
    password::validate_password(&request.new_password, &state.config.auth.native.password)?;
    let password_hash = hash_password(request.new_password).await?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let token = PasswordResetTokens::new(&mut tx)
        .find_valid_token(token_id, &request.token)
        .await?
        .ok_or_else(|| Error::BadRequest {
            message: "Invalid or expired reset token".to_string(),
        })?;

    Profiles::new(&mut tx)
        .update(
            token.profile_id,
            &ProfileUpdateDBRequest {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;
    PasswordResetTokens::new(&mut tx).invalidate_for_profile(token.profile_id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(AuthSuccessResponse {
        message: "Password has been reset successfully".to_string(),
    }))
}

/// Change the signed-in profile's password
#[utoipa::path(
    post,
    path = "/auth/password-change",
    request_body = ChangePasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Password changed", body = AuthSuccessResponse),
        (status = 400, description = "Invalid new password"),
        (status = 401, description = "Current password is incorrect"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(profile_id = %current_user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<AuthSuccessResponse>, Error> {
    require_native_auth(&state.config)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut profiles = Profiles::new(&mut conn);
    let profile = profiles.get_by_id(current_user.id).await?.ok_or_else(|| Error::Unauthenticated {
        message: Some("Profile not found".to_string()),
    })?;
    let hash = profile.password_hash.ok_or_else(|| Error::BadRequest {
        message: "This account signs in through single sign-on and has no password".to_string(),
    })?;

    if !verify_password(request.current_password, hash).await? {
        return Err(Error::Unauthenticated {
            message: Some("Current password is incorrect".to_string()),
        });
    }
    password::validate_password(&request.new_password, &state.config.auth.native.password)?;
    let password_hash = hash_password(request.new_password).await?;

    profiles
        .update(
            current_user.id,
            &ProfileUpdateDBRequest {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(AuthSuccessResponse {
        message: "Password changed successfully".to_string(),
    }))
}
