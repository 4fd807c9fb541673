//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - business logic & queries)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations for CRUD operations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Repository Pattern
//!
//! The [`handlers`] module provides repository traits and implementations
//! for each database table. Repositories encapsulate all database access
//! for a specific entity type.
//!
//! ## Example Usage
//!
//! ```ignore
//! use homecare::db::handlers::{Profiles, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut profiles = Profiles::new(&mut tx);
//!
//!     if let Some(profile) = profiles.get_by_email("nurse@example.com").await? {
//!         println!("Found {}", profile.full_name());
//!     }
//!
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Transactions
//!
//! Repositories borrow a `&mut PgConnection`, so the same code runs against a pooled
//! connection or a transaction. Mutations that touch more than one row (accepting an invitation,
//! resolving an alert with its audit row) run inside a transaction:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! Invitations::new(&mut tx).respond(id, profile_id, InvitationStatus::Accepted).await?;
//! CareTeam::new(&mut tx).assign_clinician(&link).await?;
//! tx.commit().await?;
//!
//! // Read-only page loads use a plain connection
//! let mut conn = pool.acquire().await?;
//! let visits = Visits::new(&mut conn).list_with_names(&filter).await?;
//! ```
//!
//! # Migrations
//!
//! Database migrations are managed by SQLx and located in the `migrations/` directory.
//! The [`crate::migrator`] function provides access to the migrator:
//!
//! ```ignore
//! homecare::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
