//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers and page loaders
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Authentication** (`/auth/*`): sign-in, registration, password management
//! - **Profiles** (`/api/v1/profiles/*`): account details, admin listing
//! - **Patients** (`/api/v1/patients/*`): patient records, care teams, and the patient-scoped
//!   medications, care plans and documents beneath them
//! - **Visits** (`/api/v1/visits/*`): scheduling, status, documentation and ratings
//! - **Messages and notifications** (`/api/v1/messages/*`, `/api/v1/notifications/*`)
//! - **Invitations** (`/api/v1/invitations/*`, `/api/v1/caregiver-invitations/*`)
//! - **Alerts** (`/api/v1/alerts/*`): clinical alerts for clinicians
//! - **Pages** (`/dashboard`, `/physician/dashboard`, `/vendor/dashboard`, ...): role-gated page data
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa`. The document is served at `/api/openapi.json` and
//! rendered at `/api/docs`.

pub mod handlers;
pub mod models;
