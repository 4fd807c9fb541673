//! OpenAPI documents for the portal.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::{aggregation, api, db};

/// Adds the two ways a caller can authenticate.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "CookieAuth",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "homecare_session",
                "Session cookie set by `POST /auth/login` or `POST /auth/register`.",
            ))),
        );
        components.add_security_scheme(
            "X-Homecare-User",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                "x-homecare-user",
                "Email of the caller, set by a trusted SSO proxy. The header name is configurable.",
            ))),
        );
    }
}

/// The JSON API served under `/api/v1`.
#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::profiles::list_profiles,
        api::handlers::profiles::get_profile,
        api::handlers::profiles::update_profile,
        api::handlers::patients::list_patients,
        api::handlers::patients::get_patient,
        api::handlers::patients::get_care_team,
        api::handlers::patients::revoke_clinician,
        api::handlers::patients::revoke_caregiver,
        api::handlers::medications::list_medications,
        api::handlers::medications::create_medication,
        api::handlers::medications::update_medication,
        api::handlers::medications::log_medication,
        api::handlers::medications::get_adherence,
        api::handlers::care_plans::list_care_plans,
        api::handlers::care_plans::create_care_plan,
        api::handlers::care_plans::add_goal,
        api::handlers::care_plans::update_goal,
        api::handlers::documents::list_documents,
        api::handlers::documents::upload_document,
        api::handlers::documents::delete_document,
        api::handlers::visits::list_visits,
        api::handlers::visits::create_visit,
        api::handlers::visits::get_visit,
        api::handlers::visits::update_visit_status,
        api::handlers::visits::document_visit,
        api::handlers::visits::rate_visit,
        api::handlers::visits::get_visit_rating,
        api::handlers::messages::list_messages,
        api::handlers::messages::send_message,
        api::handlers::messages::get_message,
        api::handlers::messages::reply_to_message,
        api::handlers::notifications::list_notifications,
        api::handlers::notifications::mark_notification_read,
        api::handlers::notifications::mark_all_notifications_read,
        api::handlers::invitations::list_invitations,
        api::handlers::invitations::send_invitation,
        api::handlers::invitations::accept_invitation,
        api::handlers::invitations::decline_invitation,
        api::handlers::invitations::cancel_invitation,
        api::handlers::invitations::list_caregiver_invitations,
        api::handlers::invitations::send_caregiver_invitation,
        api::handlers::invitations::accept_caregiver_invitation,
        api::handlers::invitations::decline_caregiver_invitation,
        api::handlers::invitations::cancel_caregiver_invitation,
        api::handlers::alerts::list_alerts,
        api::handlers::alerts::create_alert,
        api::handlers::alerts::resolve_alert,
    ),
    components(
        schemas(
            api::models::profiles::Role,
            api::models::profiles::ProfileResponse,
            api::models::profiles::ProfileSummary,
            api::models::profiles::ProfileUpdate,
            api::models::patients::PatientResponse,
            api::models::patients::CareTeamResponse,
            api::models::patients::ClinicianMemberResponse,
            api::models::patients::CaregiverMemberResponse,
            api::models::medications::MedicationResponse,
            api::models::medications::MedicationCreate,
            api::models::medications::MedicationUpdate,
            api::models::medications::MedicationLogCreate,
            api::models::medications::MedicationLogResponse,
            api::models::medications::AdherenceResponse,
            aggregation::AdherenceLabel,
            api::models::care_plans::CarePlanResponse,
            api::models::care_plans::CarePlanCreate,
            api::models::care_plans::GoalResponse,
            api::models::care_plans::GoalCreate,
            api::models::care_plans::GoalUpdate,
            api::models::documents::DocumentResponse,
            api::models::documents::DocumentCreate,
            api::models::visits::VisitResponse,
            api::models::visits::VisitDetailResponse,
            api::models::visits::VisitCreate,
            api::models::visits::VisitStatusUpdate,
            api::models::visits::VisitDocumentation,
            api::models::visits::VisitRatingCreate,
            api::models::visits::VisitRatingResponse,
            api::models::messages::MessageResponse,
            api::models::messages::MessageDetailResponse,
            api::models::messages::MessageCreate,
            api::models::messages::MessageReply,
            api::models::messages::MessageFolder,
            api::models::notifications::NotificationResponse,
            api::models::notifications::NotificationListResponse,
            api::models::notifications::MarkAllReadResponse,
            api::models::invitations::InvitationCreate,
            api::models::invitations::InvitationParty,
            api::models::invitations::InvitationResponse,
            api::models::invitations::InvitationListResponse,
            api::models::invitations::CaregiverInvitationCreate,
            api::models::invitations::CaregiverInvitationResponse,
            api::models::invitations::CaregiverInvitationListResponse,
            api::models::alerts::AlertResponse,
            api::models::alerts::AlertCreate,
            api::models::alerts::AlertSort,
            api::models::alerts::AlertsResponse,
            db::models::alerts::AlertSeverity,
            db::models::care_plans::CarePlanStatus,
            db::models::care_plans::GoalStatus,
            db::models::care_team::ClinicianRelationship,
            db::models::care_team::AccessLevel,
            db::models::care_team::CaregiverPermissions,
            db::models::documents::DocumentType,
            db::models::invitations::InvitationStatus,
            db::models::invitations::InvitationType,
            db::models::medications::MedicationLogStatus,
            db::models::notifications::NotificationType,
            db::models::notifications::NotificationPriority,
            db::models::role_records::PatientStatus,
            db::models::visits::VisitType,
            db::models::visits::VisitStatus,
            db::models::visits::FeedbackCategory,
        )
    ),
    tags(
        (name = "profiles", description = "Profiles and account details"),
        (name = "patients", description = "Patient records and care teams"),
        (name = "medications", description = "Medication lists, administration logs and adherence"),
        (name = "care_plans", description = "Care plans and goals"),
        (name = "documents", description = "Patient document metadata"),
        (name = "visits", description = "Visit scheduling, documentation and ratings"),
        (name = "messages", description = "Secure messaging"),
        (name = "notifications", description = "In-app notifications"),
        (name = "invitations", description = "Care-team and caregiver invitations"),
        (name = "alerts", description = "Clinical alerts for clinicians"),
    )
)]
pub struct PortalApiDoc;

/// The whole service: sign-in, page loaders, and the JSON API under `/api/v1`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Homecare Patient Portal",
        description = "Role-gated portal for home-health patients, caregivers, clinicians, agency staff, physicians and DME vendors."
    ),
    modifiers(&SecurityAddon),
    nest(
        (path = "/api/v1", api = PortalApiDoc)
    ),
    paths(
        api::handlers::auth::get_auth_info,
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::request_password_reset,
        api::handlers::auth::confirm_password_reset,
        api::handlers::auth::change_password,
        api::handlers::pages::dashboard,
        api::handlers::pages::clinician_dashboard,
        api::handlers::pages::clinician_alerts,
        api::handlers::pages::admin_dashboard,
        api::handlers::pages::admin_analytics,
        api::handlers::pages::physician_dashboard,
        api::handlers::pages::vendor_dashboard,
    ),
    components(
        schemas(
            api::models::auth::RegisterRequest,
            api::models::auth::LoginRequest,
            api::models::auth::AuthResponse,
            api::models::auth::AuthSuccessResponse,
            api::models::auth::AuthInfo,
            api::models::auth::PasswordResetRequest,
            api::models::auth::PasswordResetConfirmRequest,
            api::models::auth::ChangePasswordRequest,
            api::models::pages::DashboardPage,
            api::models::pages::PatientSnapshot,
            api::models::pages::ClinicianDashboardPage,
            api::models::pages::AuditLogResponse,
            api::models::pages::AdminDashboardPage,
            api::models::pages::ChartBar,
            api::models::pages::DailyCount,
            api::models::pages::Metric,
            api::models::pages::AnalyticsPage,
            api::models::pages::MedicalOrderResponse,
            api::models::pages::PhysicianMessageResponse,
            api::models::pages::PhysicianDashboardPage,
            api::models::pages::DmeOrderResponse,
            api::models::pages::VendorDashboardPage,
            db::models::analytics::AdminCounts,
            db::models::orders::MedicalOrderStatus,
            db::models::orders::DmeOrderStatus,
        )
    ),
    tags(
        (name = "authentication", description = "Sign-in, registration and password management"),
        (name = "pages", description = "Role-gated page loaders; failures redirect with 303"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::ApiDoc;
    use utoipa::OpenApi;

    #[test]
    fn api_paths_are_nested_under_v1() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/alerts"));
        assert!(doc.paths.paths.contains_key("/api/v1/patients/{patient_id}/care-plans"));
        assert!(doc.paths.paths.contains_key("/auth/login"));
        assert!(doc.paths.paths.contains_key("/vendor/dashboard"));
        assert!(!doc.paths.paths.contains_key("/alerts"));
    }

    #[test]
    fn visit_filters_document_the_patient_id_as_uuid() {
        let doc = serde_json::to_value(ApiDoc::openapi()).expect("serialize");
        let params = doc["paths"]["/api/v1/visits"]["get"]["parameters"].as_array().expect("parameters");
        let patient_id = params.iter().find(|p| p["name"] == "patient_id").expect("patient_id param");
        assert_eq!(patient_id["in"], "query");
        assert_eq!(patient_id["schema"]["format"], "uuid");
    }

    #[test]
    fn both_auth_schemes_are_declared() {
        let doc = ApiDoc::openapi();
        let schemes = &doc.components.expect("components").security_schemes;
        assert!(schemes.contains_key("CookieAuth"));
        assert!(schemes.contains_key("X-Homecare-User"));
    }
}
