//! HTTP request handlers for all API endpoints and pages.
//!
//! # Handler Modules
//!
//! - [`auth`]: sign-in, registration, logout and password management
//! - [`profiles`]: profile reads and updates
//! - [`patients`]: patient records and care-team membership
//! - [`medications`]: medication lists, administration logs and adherence
//! - [`care_plans`]: care plans and goal progress
//! - [`documents`]: patient document metadata
//! - [`visits`]: scheduling, status transitions, documentation and ratings
//! - [`messages`]: secure messaging
//! - [`notifications`]: in-app notifications
//! - [`invitations`]: care-team and caregiver invitations
//! - [`alerts`]: clinical alerts
//! - [`pages`]: role-gated page loaders
//!
//! # Authentication
//!
//! JSON handlers take a [`CurrentUser`](crate::api::models::profiles::CurrentUser) or a
//! [`RequiresPermission`](crate::auth::permissions::RequiresPermission) extractor and fail with
//! 401/403. Page loaders take the extractors in [`crate::auth::gate`] and redirect instead.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which converts to the matching HTTP status.

pub mod alerts;
pub mod auth;
pub mod care_plans;
pub mod documents;
pub mod invitations;
pub mod medications;
pub mod messages;
pub mod notifications;
pub mod pages;
pub mod patients;
pub mod profiles;
pub mod visits;
