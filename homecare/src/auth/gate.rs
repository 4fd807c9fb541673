//! Role gate for page loaders.
//!
//! Page routes never answer with an error body for auth problems. A missing session sends the
//! browser to `/auth/login`; a profile that is missing or holds the wrong role is sent back to
//! `/dashboard`. The same applies when a page needs a role record (clinician, physician,
//! vendor) that doesn't exist yet.

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    AppState,
    api::models::profiles::{CurrentUser, Role},
    db::{errors::DbError, handlers::Profiles, handlers::Repository, models::profiles::ProfileDBResponse},
    errors::Error,
};

pub const LOGIN_PATH: &str = "/auth/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Allow,
    Redirect(&'static str),
}

/// Decide whether a page may render for `identity` and its looked-up `profile`.
///
/// The role is always taken from the stored profile rather than the session, so a role change
/// takes effect on the next page load.
pub fn gate_decision(identity: Option<&CurrentUser>, profile: Option<&ProfileDBResponse>, required_roles: &[Role]) -> GateOutcome {
    if identity.is_none() {
        return GateOutcome::Redirect(LOGIN_PATH);
    }
    match profile {
        Some(profile) if required_roles.contains(&profile.role) => GateOutcome::Allow,
        _ => GateOutcome::Redirect(DASHBOARD_PATH),
    }
}

/// Rejection for page loaders: a 303 redirect, or a genuine server error.
#[derive(Debug)]
pub enum PageError {
    Redirect(&'static str),
    Internal(Error),
}

impl PageError {
    pub fn to_dashboard() -> Self {
        PageError::Redirect(DASHBOARD_PATH)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::Redirect(path) => Redirect::to(path).into_response(),
            PageError::Internal(error) => error.into_response(),
        }
    }
}

impl From<Error> for PageError {
    fn from(error: Error) -> Self {
        PageError::Internal(error)
    }
}

impl From<DbError> for PageError {
    fn from(error: DbError) -> Self {
        PageError::Internal(Error::Database(error))
    }
}

pub type PageResult<T> = std::result::Result<T, PageError>;

/// Marker naming the roles allowed on a page.
pub trait RoleSet: Send + Sync + 'static {
    const ROLES: &'static [Role];
}

pub struct ClinicianOnly;
impl RoleSet for ClinicianOnly {
    const ROLES: &'static [Role] = &[Role::Clinician];
}

pub struct AgencyAdminOnly;
impl RoleSet for AgencyAdminOnly {
    const ROLES: &'static [Role] = &[Role::AgencyAdmin];
}

pub struct PhysicianOnly;
impl RoleSet for PhysicianOnly {
    const ROLES: &'static [Role] = &[Role::Physician];
}

pub struct VendorOnly;
impl RoleSet for VendorOnly {
    const ROLES: &'static [Role] = &[Role::Vendor];
}

/// The signed-in profile for pages open to every role.
pub struct PageUser(pub ProfileDBResponse);

/// The signed-in profile, checked against the roles in `R`.
pub struct RoleGate<R> {
    pub profile: ProfileDBResponse,
    _roles: PhantomData<R>,
}

async fn load_identity(parts: &mut Parts, state: &AppState) -> Result<(Option<CurrentUser>, Option<ProfileDBResponse>), PageError> {
    let identity = CurrentUser::from_request_parts(parts, state).await.ok();
    let profile = match &identity {
        Some(user) => {
            let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
            Profiles::new(&mut conn).get_by_id(user.id).await?
        }
        None => None,
    };
    Ok((identity, profile))
}

impl FromRequestParts<AppState> for PageUser {
    type Rejection = PageError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> PageResult<Self> {
        match load_identity(parts, state).await? {
            (Some(_), Some(profile)) => Ok(PageUser(profile)),
            _ => Err(PageError::Redirect(LOGIN_PATH)),
        }
    }
}

impl<R: RoleSet> FromRequestParts<AppState> for RoleGate<R> {
    type Rejection = PageError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> PageResult<Self> {
        let (identity, profile) = load_identity(parts, state).await?;
        match (gate_decision(identity.as_ref(), profile.as_ref(), R::ROLES), profile) {
            (GateOutcome::Allow, Some(profile)) => Ok(RoleGate {
                profile,
                _roles: PhantomData,
            }),
            (GateOutcome::Redirect(path), _) => {
                tracing::debug!("Page gate redirecting to {}", path);
                Err(PageError::Redirect(path))
            }
            (GateOutcome::Allow, None) => Err(PageError::to_dashboard()),
        }
    }
}
