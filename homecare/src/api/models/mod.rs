//! API request and response data models.
//!
//! API models are distinct from the database records in [`crate::db::models`]; conversions live
//! next to the API type as `From` impls. Everything here derives `utoipa::ToSchema` so it shows up
//! in the OpenAPI document.
//!
//! - [`profiles`]: roles, the authenticated caller, profile payloads
//! - [`auth`]: sign-in, registration and password payloads
//! - [`patients`]: patient records and care teams
//! - [`medications`], [`care_plans`], [`documents`], [`visits`]: care records
//! - [`messages`], [`notifications`]: communication
//! - [`invitations`]: care-team and caregiver invitations
//! - [`alerts`]: alerts and the filtered alert list
//! - [`pages`]: one struct per portal page
//! - [`pagination`]: `skip`/`limit` query parameters and paged responses

pub mod alerts;
pub mod auth;
pub mod care_plans;
pub mod documents;
pub mod invitations;
pub mod medications;
pub mod messages;
pub mod notifications;
pub mod pages;
pub mod pagination;
pub mod patients;
pub mod profiles;
pub mod visits;
