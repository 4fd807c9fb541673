//! Authentication and authorization.
//!
//! # Authentication
//!
//! Two methods, tried in order by the [`CurrentUser`](crate::api::models::profiles::CurrentUser)
//! extractor:
//!
//! 1. **Session cookie**: a JWT issued by `/auth/login` or `/auth/register` and verified with the
//!    configured `secret_key`. See [`session`].
//! 2. **Proxy header**: an upstream SSO proxy names the caller's email in a trusted header
//!    (`x-homecare-user` by default). Profiles can be auto-created on first sight.
//!
//! # Authorization
//!
//! - [`permissions`]: the role matrix plus the patient care-relationship check used by the
//!   JSON API, where failures are 401/403.
//! - [`gate`]: page loader extractors, where failures are `303 See Other` redirects.
//! - [`middleware`]: sends anonymous page requests to `/auth/login`.
//!
//! Passwords are hashed with Argon2id, see [`password`].

pub mod current_user;
pub mod gate;
pub mod middleware;
pub mod password;
pub mod permissions;
pub mod session;
