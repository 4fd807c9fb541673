//! # homecare: home-health patient portal service
//!
//! `homecare` is the backend for a home-health agency's patient portal. Patients, family
//! caregivers, field clinicians, agency administrators, referring physicians and durable medical
//! equipment (DME) vendors all sign in to the same service and see pages shaped for their role.
//!
//! ## Overview
//!
//! The service keeps the agency's care records: who cares for which patient, scheduled and
//! completed visits, medication lists and administration logs, care plans and their goals,
//! secure messages, uploaded documents, clinical alerts and care-team invitations. Every read
//! and write is checked against the caller's role and, for patient data, against an active care
//! relationship with that patient.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for all persistence.
//!
//! ### Request Flow
//!
//! #### JSON API Requests (`/api/v1/*`)
//!
//! The [`CurrentUser`](api::models::profiles::CurrentUser) extractor authenticates the caller
//! from a session cookie or a trusted proxy header. Handlers then check the role matrix in
//! [`auth::permissions`] and, for patient-scoped resources, the caller's care relationship with
//! the patient. Failures are `401`/`403` JSON errors. Handlers talk to PostgreSQL through the
//! repositories in [`db::handlers`].
//!
//! #### Page Requests (`/dashboard`, `/physician/dashboard`, ...)
//!
//! A session gate middleware sends anonymous visitors to `/auth/login`. Page loaders then use the
//! extractors in [`auth::gate`] to check the caller's role, redirecting to `/dashboard` on a
//! mismatch, and return everything the page renders in one JSON document.
//!
//! ### Core Components
//!
//! - **API layer** ([`api`]): handlers and request/response models
//! - **Authentication** ([`auth`]): sessions, proxy headers, permissions and page gates
//! - **Database layer** ([`db`]): repositories over a shared connection or transaction
//! - **Aggregation** ([`aggregation`]): in-process grouping for charts and adherence
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use homecare::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = homecare::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     homecare::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod aggregation;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
mod email;
pub mod errors;
mod openapi;
pub mod telemetry;
mod types;
use crate::config::CorsOrigin;

#[cfg(test)]
pub mod test_utils;

use crate::{
    api::models::profiles::Role,
    auth::{gate::DASHBOARD_PATH, middleware::session_gate_middleware, password},
    db::{
        handlers::{Profiles, Repository},
        models::profiles::{ProfileCreateDBRequest, ProfileUpdateDBRequest},
    },
    openapi::ApiDoc,
};
use axum::http::HeaderValue;
use axum::{
    Router, http,
    middleware::from_fn_with_state,
    response::Redirect,
    routing::{delete, get, patch, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{PatientId, ProfileId};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the homecare database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial agency admin if it doesn't exist.
///
/// Idempotent: an existing profile with this email keeps its id and, when `password` is given,
/// has its password replaced.
///
/// # Example
///
/// ```no_run
/// # use homecare::create_initial_admin_user;
/// # use sqlx::PgPool;
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let profile_id = create_initial_admin_user("admin@example.com", Some("secure_password"), &pool).await?;
/// # Ok(())
/// # }
/// ```
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, password: Option<&str>, db: &PgPool) -> Result<ProfileId, sqlx::Error> {
    let password_hash = if let Some(pwd) = password {
        Some(password::hash_string(pwd).map_err(|e| sqlx::Error::Encode(format!("Failed to hash admin password: {e}").into()))?)
    } else {
        None
    };

    let mut tx = db.begin().await?;
    let mut profiles = Profiles::new(&mut tx);

    if let Some(existing) = profiles
        .get_by_email(email)
        .await
        .map_err(|e| sqlx::Error::Protocol(format!("Failed to check existing admin: {e}")))?
    {
        if password_hash.is_some() {
            profiles
                .update(
                    existing.id,
                    &ProfileUpdateDBRequest {
                        password_hash,
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| sqlx::Error::Protocol(format!("Failed to update admin password: {e}")))?;
        }
        tx.commit().await?;
        return Ok(existing.id);
    }

    let created = profiles
        .create(&ProfileCreateDBRequest {
            email: email.to_string(),
            first_name: "Agency".to_string(),
            last_name: "Admin".to_string(),
            phone: None,
            role: Role::AgencyAdmin,
            password_hash,
            auth_source: "system".to_string(),
        })
        .await
        .map_err(|e| sqlx::Error::Protocol(format!("Failed to create admin: {e}")))?;

    tx.commit().await?;
    info!(profile_id = %created.id, "Created initial agency admin");
    Ok(created.id)
}

/// Connect to PostgreSQL (unless a pool is supplied), run migrations and create the initial admin.
async fn setup_database(config: &Config, pool: Option<PgPool>) -> anyhow::Result<PgPool> {
    let pool = match pool {
        Some(pool) => pool,
        None => {
            let url = config
                .database_url()
                .ok_or_else(|| anyhow::anyhow!("No database configured: set DATABASE_URL or database_url"))?;
            info!("Connecting to database");
            PgPoolOptions::new().max_connections(config.max_connections).connect(url).await?
        }
    };

    migrator().run(&pool).await?;

    create_initial_admin_user(&config.admin_email, config.admin_password.as_deref(), &pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {}", e))?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut exposed = Vec::new();
    for header in &config.auth.security.cors.exposed_headers {
        exposed.push(header.parse::<http::HeaderName>()?);
    }
    if !exposed.contains(&http::header::LOCATION) {
        exposed.push(http::header::LOCATION);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .expose_headers(exposed);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
///
/// - Authentication routes under `/auth`
/// - JSON API under `/api/v1`
/// - Role-gated page loaders
/// - OpenAPI document and Scalar viewer
/// - Optional Prometheus metrics at `/internal/metrics`
/// - Session gate, CORS and tracing layers
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers::{
        alerts, auth as auth_handlers, care_plans, documents, invitations, medications, messages, notifications, pages, patients,
        profiles, visits,
    };

    let auth_routes = Router::new()
        .route("/auth/login", get(auth_handlers::get_auth_info).post(auth_handlers::login))
        .route("/auth/register", post(auth_handlers::register))
        .route("/auth/logout", post(auth_handlers::logout))
        .route("/auth/password-resets", post(auth_handlers::request_password_reset))
        .route(
            "/auth/password-resets/{token_id}/confirm",
            post(auth_handlers::confirm_password_reset),
        )
        .route("/auth/password-change", post(auth_handlers::change_password))
        .with_state(state.clone());

    let api_routes = Router::new()
        // Profiles
        .route("/profiles", get(profiles::list_profiles))
        .route("/profiles/{profile_id}", get(profiles::get_profile).patch(profiles::update_profile))
        // Patients and care teams
        .route("/patients", get(patients::list_patients))
        .route("/patients/{patient_id}", get(patients::get_patient))
        .route("/patients/{patient_id}/care-team", get(patients::get_care_team))
        .route(
            "/patients/{patient_id}/clinicians/{clinician_id}",
            delete(patients::revoke_clinician),
        )
        .route(
            "/patients/{patient_id}/caregivers/{caregiver_id}",
            delete(patients::revoke_caregiver),
        )
        // Medications
        .route(
            "/patients/{patient_id}/medications",
            get(medications::list_medications).post(medications::create_medication),
        )
        .route("/patients/{patient_id}/adherence", get(medications::get_adherence))
        .route("/medications/{medication_id}", patch(medications::update_medication))
        .route("/medications/{medication_id}/logs", post(medications::log_medication))
        // Care plans
        .route(
            "/patients/{patient_id}/care-plans",
            get(care_plans::list_care_plans).post(care_plans::create_care_plan),
        )
        .route("/care-plans/{care_plan_id}/goals", post(care_plans::add_goal))
        .route("/care-plan-goals/{goal_id}", patch(care_plans::update_goal))
        // Documents
        .route(
            "/patients/{patient_id}/documents",
            get(documents::list_documents).post(documents::upload_document),
        )
        .route("/documents/{document_id}", delete(documents::delete_document))
        // Visits
        .route("/visits", get(visits::list_visits).post(visits::create_visit))
        .route("/visits/{visit_id}", get(visits::get_visit))
        .route("/visits/{visit_id}/status", patch(visits::update_visit_status))
        .route("/visits/{visit_id}/documentation", post(visits::document_visit))
        .route(
            "/visits/{visit_id}/rating",
            get(visits::get_visit_rating).post(visits::rate_visit),
        )
        // Messages
        .route("/messages", get(messages::list_messages).post(messages::send_message))
        .route("/messages/{message_id}", get(messages::get_message))
        .route("/messages/{message_id}/replies", post(messages::reply_to_message))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read-all", post(notifications::mark_all_notifications_read))
        .route("/notifications/{notification_id}/read", patch(notifications::mark_notification_read))
        // Care-team invitations
        .route("/invitations", get(invitations::list_invitations).post(invitations::send_invitation))
        .route("/invitations/{invitation_id}/accept", post(invitations::accept_invitation))
        .route("/invitations/{invitation_id}/decline", post(invitations::decline_invitation))
        .route("/invitations/{invitation_id}/cancel", post(invitations::cancel_invitation))
        // Caregiver invitations
        .route(
            "/caregiver-invitations",
            get(invitations::list_caregiver_invitations).post(invitations::send_caregiver_invitation),
        )
        .route(
            "/caregiver-invitations/{invitation_id}/accept",
            post(invitations::accept_caregiver_invitation),
        )
        .route(
            "/caregiver-invitations/{invitation_id}/decline",
            post(invitations::decline_caregiver_invitation),
        )
        .route(
            "/caregiver-invitations/{invitation_id}/cancel",
            post(invitations::cancel_caregiver_invitation),
        )
        // Alerts
        .route("/alerts", get(alerts::list_alerts).post(alerts::create_alert))
        .route("/alerts/{alert_id}/resolve", post(alerts::resolve_alert))
        .with_state(state.clone());

    let page_routes = Router::new()
        .route("/", get(|| async { Redirect::to(DASHBOARD_PATH) }))
        .route("/dashboard", get(pages::dashboard))
        .route("/dashboard/clinician", get(pages::clinician_dashboard))
        .route("/dashboard/clinician/alerts", get(pages::clinician_alerts))
        .route("/dashboard/admin", get(pages::admin_dashboard))
        .route("/dashboard/admin/analytics", get(pages::admin_analytics))
        .route("/physician/dashboard", get(pages::physician_dashboard))
        .route("/vendor/dashboard", get(pages::vendor_dashboard))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()))
        .merge(auth_routes)
        .merge(page_routes)
        .nest("/api/v1", api_routes)
        .layer(from_fn_with_state(state.clone(), session_gate_middleware));

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns the router, pool and configuration.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects to PostgreSQL, runs migrations and creates the
///    initial admin
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: when the shutdown future resolves, in-flight requests finish and the pool is
///    closed
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Like [`Application::new`], reusing `pool` instead of connecting.
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting homecare with configuration: {:#?}", config);

        let pool = setup_database(&config, pool).await?;
        let app_state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Patient portal listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::create_initial_admin_user;
    use crate::{
        api::models::profiles::Role,
        auth::password,
        db::handlers::{Profiles, Repository},
        test_utils::*,
    };
    use axum::http::StatusCode;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn initial_admin_is_idempotent_and_updates_password(pool: PgPool) {
        let first = create_initial_admin_user("owner@agency.example", None, &pool).await.unwrap();
        let second = create_initial_admin_user("owner@agency.example", Some("new-password-123"), &pool)
            .await
            .unwrap();
        assert_eq!(first, second);

        let mut conn = pool.acquire().await.unwrap();
        let admin = Profiles::new(&mut conn).get_by_id(first).await.unwrap().unwrap();
        assert_eq!(admin.role, Role::AgencyAdmin);
        let hash = admin.password_hash.expect("password set");
        assert!(password::verify_string("new-password-123", &hash).unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn service_routes_are_open(pool: PgPool) {
        let app = create_test_app(pool).await;

        app.get("/healthz").await.assert_text("OK");

        let doc: serde_json::Value = app.get("/api/openapi.json").await.json();
        assert!(doc["paths"]["/api/v1/visits"].is_object());
        assert!(doc["paths"]["/dashboard"].is_object());

        let root = app.get("/").await;
        root.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(root.header("location"), "/dashboard");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn api_requires_authentication(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        app.get("/api/v1/visits").await.assert_status(StatusCode::UNAUTHORIZED);

        let caregiver = create_test_user(&pool, Role::Caregiver).await;
        let (name, value) = add_auth_header(&caregiver);
        app.get("/api/v1/notifications").add_header(&name, &value).await.assert_status_ok();
    }
}
