//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (a pooled connection or a transaction) and owns
//! the SQL for one table or a small family of related tables. Repositories return records from
//! [`crate::db::models`] and never see API types.
//!
//! # Available Repositories
//!
//! - [`Profiles`]: identity records, lookups by email, admin listing
//! - [`RoleRecords`]: patient/clinician/caregiver/physician/vendor rows linked to a profile
//! - [`CareTeam`]: patient <-> clinician and patient <-> caregiver links, soft revocation
//! - [`Visits`]: scheduling, status transitions, documentation and ratings
//! - [`Medications`]: medication lists and administration logs
//! - [`CarePlans`]: care plans and their goals
//! - [`Messages`]: patient/clinician messaging and physician messages
//! - [`Notifications`]: in-app notifications
//! - [`Documents`]: patient document metadata
//! - [`Invitations`] and [`CaregiverInvitations`]: invitation lifecycle
//! - [`Alerts`]: patient alerts and their resolution
//! - [`Orders`]: medical orders and DME orders
//! - [`AuditLogs`]: append-only administrative trail
//! - [`Analytics`]: agency-wide counts
//! - [`PasswordResetTokens`]: password reset token lifecycle
//!
//! # Common Pattern
//!
//! ```ignore
//! use homecare::db::handlers::{Repository, Visits};
//!
//! async fn example(pool: &sqlx::PgPool, id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = pool.acquire().await?;
//!     let visit = Visits::new(&mut conn).get_by_id(id).await?;
//!     Ok(())
//! }
//! ```
//!
//! Single-table CRUD repositories implement [`Repository`]; the rest expose inherent methods
//! shaped around how pages and handlers read them.

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
pub mod repository;
pub mod role_records;
pub mod visits;

pub use alerts::Alerts;
pub use analytics::Analytics;
pub use audit_logs::AuditLogs;
pub use care_plans::CarePlans;
pub use care_team::CareTeam;
pub use documents::Documents;
pub use invitations::{CaregiverInvitations, Invitations};
pub use medications::Medications;
pub use messages::Messages;
pub use notifications::Notifications;
pub use orders::Orders;
pub use password_reset_tokens::PasswordResetTokens;
pub use profiles::Profiles;
pub use repository::Repository;
pub use role_records::RoleRecords;
pub use visits::Visits;
