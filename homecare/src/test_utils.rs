//! Test utilities shared by unit and HTTP tests.

use crate::{
    AppState,
    api::models::profiles::Role,
    config::{AuthConfig, Config, EmailConfig, EmailTransportConfig, NativeAuthConfig, ProxyHeaderAuthConfig, SessionConfig},
    db::{
        handlers::{CareTeam, Profiles, Repository, RoleRecords},
        models::{
            care_team::{AccessLevel, CaregiverLinkCreateDBRequest, CaregiverPermissions, ClinicianLinkCreateDBRequest, ClinicianRelationship},
            profiles::{ProfileCreateDBRequest, ProfileDBResponse},
        },
    },
    types::{CaregiverId, ClinicianId, PatientId, PhysicianId, ProfileId, VendorId},
};
use axum_test::TestServer;
use sqlx::PgPool;
use uuid::Uuid;

pub const TEST_AUTH_HEADER: &str = "x-homecare-user";

pub async fn create_test_app(pool: PgPool) -> TestServer {
    let app = crate::Application::new_with_pool(create_test_config(), Some(pool))
        .await
        .expect("Failed to create application");
    app.into_test_server()
}

pub fn create_test_config() -> Config {
    let email_dir = std::env::temp_dir().join(format!("homecare-test-emails-{}", std::process::id()));

    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: None,
        max_connections: 2,
        admin_email: "admin@test.com".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        auth: AuthConfig {
            native: NativeAuthConfig {
                enabled: true,
                session: SessionConfig {
                    cookie_secure: false,
                    ..Default::default()
                },
                ..Default::default()
            },
            proxy_header: ProxyHeaderAuthConfig {
                enabled: true,
                header_name: TEST_AUTH_HEADER.to_string(),
                ..Default::default()
            },
            ..Default::default()
        },
        email: EmailConfig {
            transport: EmailTransportConfig::File {
                path: email_dir.to_string_lossy().to_string(),
            },
            ..Default::default()
        },
        enable_metrics: false,
        ..Default::default()
    }
}

pub fn create_test_app_state(pool: PgPool, config: Config) -> AppState {
    AppState::builder().db(pool).config(config).build()
}

/// Header pair that authenticates as `profile` through the proxy header.
pub fn add_auth_header(profile: &ProfileDBResponse) -> (String, String) {
    (TEST_AUTH_HEADER.to_string(), profile.email.clone())
}

pub async fn create_test_user(pool: &PgPool, role: Role) -> ProfileDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let id = Uuid::new_v4().simple().to_string();

    let request = ProfileCreateDBRequest {
        email: format!("{}_{}@example.com", role.as_str(), &id[..12]),
        first_name: "Test".to_string(),
        last_name: format!("{}{}", role.as_str().replace('_', ""), &id[..6]),
        phone: None,
        role,
        password_hash: None,
        auth_source: "test".to_string(),
    };

    Profiles::new(&mut conn).create(&request).await.expect("Failed to create test user")
}

#[derive(Debug, Default)]
pub struct RoleRecordIds {
    pub patient: Option<PatientId>,
    pub clinician: Option<ClinicianId>,
    pub caregiver: Option<CaregiverId>,
    pub physician: Option<PhysicianId>,
    pub vendor: Option<VendorId>,
}

pub async fn role_record_ids(pool: &PgPool, profile_id: ProfileId) -> RoleRecordIds {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut records = RoleRecords::new(&mut conn);
    RoleRecordIds {
        patient: records.patient_by_profile(profile_id).await.expect("patient lookup").map(|r| r.id),
        clinician: records.clinician_by_profile(profile_id).await.expect("clinician lookup").map(|r| r.id),
        caregiver: records.caregiver_by_profile(profile_id).await.expect("caregiver lookup").map(|r| r.id),
        physician: records.physician_by_profile(profile_id).await.expect("physician lookup").map(|r| r.id),
        vendor: records.vendor_by_profile(profile_id).await.expect("vendor lookup").map(|r| r.id),
    }
}

/// Assign `clinician` to `patient` and return the patient record id.
pub async fn link_clinician(pool: &PgPool, patient: &ProfileDBResponse, clinician: &ProfileDBResponse) -> PatientId {
    let patient_id = role_record_ids(pool, patient.id).await.patient.expect("patient record");
    let clinician_id = role_record_ids(pool, clinician.id).await.clinician.expect("clinician record");
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    CareTeam::new(&mut conn)
        .assign_clinician(&ClinicianLinkCreateDBRequest {
            patient_id,
            clinician_id,
            relationship_type: ClinicianRelationship::Assigned,
            access_level: AccessLevel::Standard,
            assigned_by: None,
        })
        .await
        .expect("Failed to assign clinician");
    patient_id
}

/// Link `caregiver` to `patient` with default permissions and return the patient record id.
pub async fn link_caregiver(pool: &PgPool, patient: &ProfileDBResponse, caregiver: &ProfileDBResponse) -> PatientId {
    let patient_id = role_record_ids(pool, patient.id).await.patient.expect("patient record");
    let caregiver_id = role_record_ids(pool, caregiver.id).await.caregiver.expect("caregiver record");
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    CareTeam::new(&mut conn)
        .link_caregiver(&CaregiverLinkCreateDBRequest {
            patient_id,
            caregiver_id,
            relationship_type: "daughter".to_string(),
            is_mpoa: false,
            access_level: AccessLevel::View,
            permissions: CaregiverPermissions::default(),
        })
        .await
        .expect("Failed to link caregiver");
    patient_id
}
