//! Database record models matching table schemas.
//!
//! Models here correspond to table rows (`*DBResponse`), insert payloads (`*CreateDBRequest`),
//! partial updates (`*UpdateDBRequest`) and joined read views that flatten a row together with
//! the names a page needs (`*WithNames`, `*WithPatient`). They are distinct from the API models
//! in [`crate::api::models`] so storage and wire formats can change independently.
//!
//! # Model Categories
//!
//! ## Identity
//!
//! - [`profiles`]: the base identity record for every user
//! - [`role_records`]: role-specific rows linked 1:1 to a profile
//! - [`password_reset_tokens`]: time-limited password reset tokens
//!
//! ## Care relationships
//!
//! - [`care_team`]: clinician and caregiver links with access levels
//! - [`invitations`]: care-team and caregiver invitations
//!
//! ## Clinical records
//!
//! - [`visits`], [`medications`], [`care_plans`], [`alerts`], [`documents`], [`orders`]
//!
//! ## Communication and administration
//!
//! - [`messages`], [`notifications`], [`audit_logs`], [`analytics`]

pub mod alerts;
pub mod analytics;
pub mod audit_logs;
pub mod care_plans;
pub mod care_team;
pub mod documents;
pub mod invitations;
pub mod medications;
pub mod messages;
pub mod notifications;
pub mod orders;
pub mod password_reset_tokens;
pub mod profiles;
pub mod role_records;
pub mod visits;
