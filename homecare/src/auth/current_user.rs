use crate::{
    AppState,
    api::models::profiles::CurrentUser,
    auth::session,
    config::Config,
    db::{
        errors::DbError,
        handlers::{Profiles, Repository},
        models::profiles::ProfileCreateDBRequest,
    },
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use sqlx::PgPool;
use tracing::{debug, instrument, trace};

/// Pull the named cookie's value out of the `Cookie` header.
pub(crate) fn cookie_value<'a>(parts: &'a Parts, cookie_name: &str) -> Option<&'a str> {
    let cookie_str = parts.headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    cookie_str
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value)
}

/// Returns:
/// - None: no session cookie present
/// - Some(Ok(user)): valid session
/// - Some(Err(error)): cookie present but expired, tampered with or malformed
#[instrument(skip(parts, config))]
fn try_jwt_session_auth(parts: &Parts, config: &Config) -> Option<Result<CurrentUser>> {
    let token = cookie_value(parts, &config.auth.native.session.cookie_name)?;
    Some(session::verify_session_token(token, config))
}

/// Returns:
/// - None: header absent, or the profile doesn't exist and auto-creation is off
/// - Some(Ok(user)): profile found or created
/// - Some(Err(error)): lookup or creation failed
#[instrument(skip(parts, config, db))]
async fn try_proxy_header_auth(parts: &Parts, config: &Config, db: &PgPool) -> Option<Result<CurrentUser>> {
    let proxy = &config.auth.proxy_header;
    let email = parts.headers.get(&proxy.header_name).and_then(|h| h.to_str().ok())?.trim().to_lowercase();
    if email.is_empty() {
        return None;
    }

    let mut conn = match db.acquire().await {
        Ok(conn) => conn,
        Err(e) => return Some(Err(DbError::from(e).into())),
    };
    let mut profiles = Profiles::new(&mut conn);

    match profiles.get_by_email(&email).await {
        Ok(Some(profile)) => Some(Ok(CurrentUser::from(profile))),
        Ok(None) if proxy.auto_create_users => {
            let request = ProfileCreateDBRequest {
                email,
                first_name: String::new(),
                last_name: String::new(),
                phone: None,
                role: proxy.default_role,
                password_hash: None,
                auth_source: "proxy-header".to_string(),
            };
            Some(profiles.create(&request).await.map(CurrentUser::from).map_err(Error::Database))
        }
        Ok(None) => None,
        Err(e) => Some(Err(Error::Database(e))),
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    /// Tries the session cookie, then the proxy header. The first success wins, so a stale
    /// cookie doesn't block a request that also carries a valid proxy header.
    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let mut auth_errors = Vec::new();

        if state.config.auth.native.enabled {
            match try_jwt_session_auth(parts, &state.config) {
                Some(Ok(user)) => {
                    debug!("Found JWT session authenticated user: {}", user.id);
                    return Ok(user);
                }
                Some(Err(e)) => auth_errors.push(("JWT session", e)),
                None => trace!("No session cookie present"),
            }
        }

        if state.config.auth.proxy_header.enabled {
            match try_proxy_header_auth(parts, &state.config, &state.db).await {
                Some(Ok(user)) => {
                    debug!("Found proxy header authenticated user: {}", user.id);
                    return Ok(user);
                }
                Some(Err(e)) => auth_errors.push(("Proxy header", e)),
                None => trace!("No proxy header identity present"),
            }
        }

        if auth_errors.is_empty() {
            trace!("No authentication credentials found in request");
        } else {
            trace!("All authentication attempts failed: {:?}", auth_errors);
        }
        Err(Error::Unauthenticated { message: None })
    }
}
