//! Page loaders for the portal's dashboards.
//!
//! Each loader runs behind [`RoleGate`] or [`PageUser`], so auth and role failures are 303
//! redirects. A page whose role record (clinician, physician, vendor) is missing also redirects
//! to `/dashboard`.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{Duration, NaiveTime, Utc};

use crate::{
    AppState,
    aggregation::{self, MESSAGE_VOLUME_SAMPLE},
    api::models::{
        alerts::{AlertQuery, AlertResponse, AlertsResponse},
        messages::MessageDetailResponse,
        pages::{
            AdminDashboardPage, AnalyticsPage, AuditLogResponse, ChartBar, ClinicianDashboardPage, DailyCount, DashboardPage,
            DmeOrderResponse, MedicalOrderResponse, Metric, PatientSnapshot, PhysicianDashboardPage, PhysicianMessageResponse,
            VendorDashboardPage,
        },
        profiles::{CurrentUser, Role},
        visits::VisitDetailResponse,
    },
    auth::{
        gate::{AgencyAdminOnly, ClinicianOnly, PageError, PageResult, PageUser, PhysicianOnly, RoleGate, VendorOnly},
        permissions::accessible_patient_ids,
    },
    db::{
        handlers::{
            Alerts, Analytics, AuditLogs, CarePlans, CareTeam, Documents, Invitations, Messages, Orders, RoleRecords, Visits,
            visits::VisitFilter,
        },
        models::{care_plans::CarePlanStatus, visits::VisitStatus},
    },
    errors::Error,
    types::PatientId,
};

const UPCOMING_VISITS: i64 = 5;
const RECENT_MESSAGES: i64 = 5;
const RECENT_ALERTS: i64 = 5;
const RECENT_ACTIVITY: i64 = 10;
/// Upper bound on visits one clinician has in a day.
const DAY_VISIT_LIMIT: i64 = 100;

/// Home dashboard for every role
///
/// Patients see their own record; caregivers see the patients they are linked to. Other roles get
/// a page with no patient-scoped data.
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "pages",
    responses(
        (status = 200, description = "Dashboard page", body = DashboardPage),
        (status = 303, description = "Not signed in"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(profile_id = %profile.id))]
pub async fn dashboard(State(state): State<AppState>, PageUser(profile): PageUser) -> PageResult<Json<DashboardPage>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let patient_ids: Vec<PatientId> = match profile.role {
        Role::Patient | Role::Caregiver => accessible_patient_ids(&mut conn, &CurrentUser::from(profile.clone()))
            .await?
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    let pending_invitations = Invitations::new(&mut conn).count_pending_received(profile.id, &profile.email).await?;
    let upcoming_visits = Visits::new(&mut conn)
        .list_with_names(&VisitFilter {
            patient_ids: Some(patient_ids.clone()),
            from: Some(Utc::now()),
            ..VisitFilter::new(0, UPCOMING_VISITS)
        })
        .await?;

    let mut messages = Messages::new(&mut conn);
    let recent_messages = messages.inbox(profile.id, 0, RECENT_MESSAGES).await?;
    let unread_messages = messages.count_unread(profile.id).await?;

    let active_care_plans = CarePlans::new(&mut conn)
        .count_with_status(Some(&patient_ids), CarePlanStatus::Active)
        .await?;
    let documents = Documents::new(&mut conn).count_for_patients(&patient_ids).await?;

    Ok(Json(DashboardPage {
        profile: profile.into(),
        patient_ids,
        pending_invitations,
        upcoming_visits: upcoming_visits.into_iter().map(VisitDetailResponse::from).collect(),
        recent_messages: recent_messages.into_iter().map(MessageDetailResponse::from).collect(),
        unread_messages,
        active_care_plans,
        documents,
    }))
}

/// Group today's visits into one snapshot per patient, in visit order, each with that patient's
/// unresolved alerts.
fn patient_snapshots(todays_visits: &[VisitDetailResponse], active_alerts: &[AlertResponse]) -> Vec<PatientSnapshot> {
    let mut snapshots: Vec<PatientSnapshot> = Vec::new();
    for visit in todays_visits {
        if snapshots.iter().any(|s| s.patient_id == visit.visit.patient_id) {
            continue;
        }
        snapshots.push(PatientSnapshot {
            patient_id: visit.visit.patient_id,
            patient_name: visit.patient_name.clone(),
            primary_diagnosis: visit.primary_diagnosis.clone(),
            alerts: active_alerts
                .iter()
                .filter(|a| a.patient_id == visit.visit.patient_id)
                .cloned()
                .collect(),
        });
    }
    snapshots
}

#[utoipa::path(
    get,
    path = "/dashboard/clinician",
    tag = "pages",
    responses(
        (status = 200, description = "Clinician dashboard", body = ClinicianDashboardPage),
        (status = 303, description = "Not signed in, not a clinician, or no clinician record"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(profile_id = %gate.profile.id))]
pub async fn clinician_dashboard(
    State(state): State<AppState>,
    gate: RoleGate<ClinicianOnly>,
) -> PageResult<Json<ClinicianDashboardPage>> {
    let profile = gate.profile;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let clinician = RoleRecords::new(&mut conn)
        .clinician_by_profile(profile.id)
        .await?
        .ok_or_else(PageError::to_dashboard)?;

    let now = Utc::now();
    let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let day_end = day_start + Duration::days(1);

    let mut visits = Visits::new(&mut conn);
    let todays_visits: Vec<VisitDetailResponse> = visits
        .list_with_names(&VisitFilter {
            clinician_id: Some(clinician.id),
            from: Some(day_start),
            to: Some(day_end),
            ..VisitFilter::new(0, DAY_VISIT_LIMIT)
        })
        .await?
        .into_iter()
        .map(VisitDetailResponse::from)
        .collect();
    let upcoming_visit_count = visits
        .count(&VisitFilter {
            clinician_id: Some(clinician.id),
            statuses: Some(vec![VisitStatus::Scheduled, VisitStatus::EnRoute]),
            from: Some(now),
            ..VisitFilter::new(0, 0)
        })
        .await?;

    let patient_ids = CareTeam::new(&mut conn).patient_ids_for_clinician(clinician.id).await?;
    let unread_messages = Messages::new(&mut conn).count_unread(profile.id).await?;

    let mut alerts = Alerts::new(&mut conn);
    let urgent_alert_count = alerts.count_urgent_unresolved(&patient_ids).await?;
    let seen_today: Vec<PatientId> = todays_visits.iter().map(|v| v.visit.patient_id).collect();
    let todays_alerts: Vec<AlertResponse> = alerts
        .list_for_patients(Some(&seen_today), true)
        .await?
        .into_iter()
        .map(AlertResponse::from)
        .collect();
    let recent_alerts = alerts.recent_unresolved(&patient_ids, RECENT_ALERTS).await?;

    Ok(Json(ClinicianDashboardPage {
        patient_snapshots: patient_snapshots(&todays_visits, &todays_alerts),
        profile: profile.into(),
        specialization: clinician.specialization,
        todays_visits,
        upcoming_visit_count,
        active_patient_count: patient_ids.len() as i64,
        unread_messages,
        urgent_alert_count,
        recent_alerts: recent_alerts.into_iter().map(AlertResponse::from).collect(),
    }))
}

/// Alerts for the clinician's assigned patients
#[utoipa::path(
    get,
    path = "/dashboard/clinician/alerts",
    tag = "pages",
    params(AlertQuery),
    responses(
        (status = 200, description = "Alerts page", body = AlertsResponse),
        (status = 303, description = "Not signed in, not a clinician, or no clinician record"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(profile_id = %gate.profile.id))]
pub async fn clinician_alerts(
    State(state): State<AppState>,
    gate: RoleGate<ClinicianOnly>,
    Query(query): Query<AlertQuery>,
) -> PageResult<Json<AlertsResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let clinician = RoleRecords::new(&mut conn)
        .clinician_by_profile(gate.profile.id)
        .await?
        .ok_or_else(PageError::to_dashboard)?;
    let patient_ids = CareTeam::new(&mut conn).patient_ids_for_clinician(clinician.id).await?;

    let mut alerts = Alerts::new(&mut conn);
    let active = alerts.list_for_patients(Some(&patient_ids), true).await?;
    let resolved = alerts.list_for_patients(Some(&patient_ids), false).await?;

    Ok(Json(AlertsResponse::build(
        active.into_iter().map(AlertResponse::from).collect(),
        resolved.into_iter().map(AlertResponse::from).collect(),
        &query,
        Utc::now().date_naive(),
    )))
}

#[utoipa::path(
    get,
    path = "/dashboard/admin",
    tag = "pages",
    responses(
        (status = 200, description = "Agency admin dashboard", body = AdminDashboardPage),
        (status = 303, description = "Not signed in or not an agency admin"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(profile_id = %gate.profile.id))]
pub async fn admin_dashboard(State(state): State<AppState>, gate: RoleGate<AgencyAdminOnly>) -> PageResult<Json<AdminDashboardPage>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let counts = Analytics::new(&mut conn).admin_counts().await?;
    let recent_activity = AuditLogs::new(&mut conn).recent(RECENT_ACTIVITY).await?;

    Ok(Json(AdminDashboardPage {
        profile: gate.profile.into(),
        counts,
        recent_activity: recent_activity.into_iter().map(AuditLogResponse::from).collect(),
    }))
}

/// Visit, messaging and engagement charts
#[utoipa::path(
    get,
    path = "/dashboard/admin/analytics",
    tag = "pages",
    responses(
        (status = 200, description = "Analytics page", body = AnalyticsPage),
        (status = 303, description = "Not signed in or not an agency admin"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(profile_id = %gate.profile.id))]
pub async fn admin_analytics(State(state): State<AppState>, gate: RoleGate<AgencyAdminOnly>) -> PageResult<Json<AnalyticsPage>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let visits = Visits::new(&mut conn).type_and_status_rows().await?;

    let mut messages = Messages::new(&mut conn);
    let timestamps = messages.recent_timestamps(MESSAGE_VOLUME_SAMPLE as i64).await?;
    let messages_sent = messages.count_all().await?;

    let total_patients = RoleRecords::new(&mut conn).count(Role::Patient).await?;
    let active_care_plans = CarePlans::new(&mut conn).count_with_status(None, CarePlanStatus::Active).await?;

    let total_visits = visits.len();
    let completed_visits = visits.iter().filter(|v| v.status == VisitStatus::Completed).count();
    let by_type = aggregation::bars(aggregation::group_counts(&visits, |v| v.visit_type));
    let by_status = aggregation::bars(aggregation::group_counts(&visits, |v| v.status));

    Ok(Json(AnalyticsPage {
        total_visits,
        completed_visits,
        completion_rate: aggregation::percentage(completed_visits as i64, total_visits as i64),
        visits_by_type: ChartBar::from_bars(by_type, |t| t.as_str().to_string()),
        visits_by_status: ChartBar::from_bars(by_status, |s| s.as_str().to_string()),
        message_volume: aggregation::message_volume(&timestamps).into_iter().map(DailyCount::from).collect(),
        patient_engagement: vec![
            Metric::new("Total Patients", total_patients),
            Metric::new("Active Care Plans", active_care_plans),
            Metric::new("Messages Sent", messages_sent),
            Metric::new(
                "Engagement Rate",
                format!("{}%", aggregation::engagement_rate(active_care_plans, total_patients)),
            ),
        ],
    }))
}

#[utoipa::path(
    get,
    path = "/physician/dashboard",
    tag = "pages",
    responses(
        (status = 200, description = "Physician dashboard", body = PhysicianDashboardPage),
        (status = 303, description = "Not signed in, not a physician, or no physician record"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(profile_id = %gate.profile.id))]
pub async fn physician_dashboard(
    State(state): State<AppState>,
    gate: RoleGate<PhysicianOnly>,
) -> PageResult<Json<PhysicianDashboardPage>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let physician = RoleRecords::new(&mut conn)
        .physician_by_profile(gate.profile.id)
        .await?
        .ok_or_else(PageError::to_dashboard)?;

    let pending_orders = Orders::new(&mut conn).pending_medical_orders(physician.id).await?;
    let unread_messages = Messages::new(&mut conn).unread_physician_messages(physician.id).await?;

    Ok(Json(PhysicianDashboardPage {
        profile: gate.profile.into(),
        pending_orders: pending_orders.into_iter().map(MedicalOrderResponse::from).collect(),
        unread_messages: unread_messages.into_iter().map(PhysicianMessageResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/vendor/dashboard",
    tag = "pages",
    responses(
        (status = 200, description = "DME vendor dashboard", body = VendorDashboardPage),
        (status = 303, description = "Not signed in, not a vendor, or no vendor record"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(profile_id = %gate.profile.id))]
pub async fn vendor_dashboard(State(state): State<AppState>, gate: RoleGate<VendorOnly>) -> PageResult<Json<VendorDashboardPage>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let vendor = RoleRecords::new(&mut conn)
        .vendor_by_profile(gate.profile.id)
        .await?
        .ok_or_else(PageError::to_dashboard)?;

    let mut orders = Orders::new(&mut conn);
    let pending_orders = orders.pending_dme_orders(vendor.id).await?;
    let active_orders = orders.in_flight_dme_orders(vendor.id).await?;

    Ok(Json(VendorDashboardPage {
        profile: gate.profile.into(),
        company_name: vendor.company_name,
        pending_orders: pending_orders.into_iter().map(DmeOrderResponse::from).collect(),
        active_orders: active_orders.into_iter().map(DmeOrderResponse::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::patient_snapshots;
    use crate::{
        api::models::{
            alerts::AlertResponse,
            pages::{AnalyticsPage, ClinicianDashboardPage, DashboardPage, VendorDashboardPage},
            profiles::Role,
            visits::{VisitDetailResponse, VisitResponse},
        },
        db::{
            handlers::Orders,
            models::{
                alerts::AlertSeverity,
                orders::{DmeOrderCreateDBRequest, DmeOrderStatus},
                visits::{VisitStatus, VisitType},
            },
        },
        test_utils::*,
    };
    use axum::http::StatusCode;
    use chrono::{Duration, NaiveDate, Utc};
    use serde_json::json;
    use sqlx::PgPool;
    use uuid::Uuid;

    fn visit_for(patient_id: Uuid, name: &str) -> VisitDetailResponse {
        let now = Utc::now();
        VisitDetailResponse {
            visit: VisitResponse {
                id: Uuid::new_v4(),
                patient_id,
                clinician_id: Uuid::new_v4(),
                visit_type: VisitType::Nursing,
                scheduled_start: now,
                scheduled_end: now + Duration::hours(1),
                actual_start: None,
                actual_end: None,
                status: VisitStatus::Scheduled,
                visit_notes: None,
                created_at: now,
                updated_at: now,
            },
            patient_name: name.to_string(),
            patient_address: None,
            patient_city: None,
            primary_diagnosis: Some("CHF".to_string()),
            clinician_name: "Nurse Joy".to_string(),
            clinician_specialization: "RN".to_string(),
        }
    }

    fn alert_for(patient_id: Uuid) -> AlertResponse {
        AlertResponse {
            id: Uuid::new_v4(),
            patient_id,
            patient_name: "A".to_string(),
            alert_type: "vitals".to_string(),
            severity: AlertSeverity::High,
            message: "High BP".to_string(),
            created_at: Utc::now(),
            resolved_at: None,
            resolved_by: None,
        }
    }

    #[test]
    fn one_snapshot_per_patient_in_visit_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let visits = vec![visit_for(b, "Bea"), visit_for(a, "Al"), visit_for(b, "Bea")];
        let alerts = vec![alert_for(a), alert_for(a), alert_for(Uuid::new_v4())];

        let snapshots = patient_snapshots(&visits, &alerts);
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].patient_name, "Bea");
        assert!(snapshots[0].alerts.is_empty());
        assert_eq!(snapshots[1].alerts.len(), 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn pages_redirect_instead_of_erroring(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let response = app.get("/dashboard/clinician").await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/auth/login");

        let patient = create_test_user(&pool, Role::Patient).await;
        let (name, value) = add_auth_header(&patient);
        for page in ["/dashboard/clinician", "/dashboard/admin", "/physician/dashboard", "/vendor/dashboard"] {
            let response = app.get(page).add_header(&name, &value).await;
            response.assert_status(StatusCode::SEE_OTHER);
            assert_eq!(response.header("location"), "/dashboard", "{page}");
        }

        app.get("/dashboard").add_header(&name, &value).await.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn patient_dashboard_shows_upcoming_visits(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let patient = create_test_user(&pool, Role::Patient).await;
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let patient_id = link_clinician(&pool, &patient, &clinician).await;

        let (c_name, c_value) = add_auth_header(&clinician);
        let start = Utc::now() + Duration::days(1);
        app.post("/api/v1/visits")
            .add_header(&c_name, &c_value)
            .json(&json!({
                "patient_id": patient_id,
                "visit_type": "nursing",
                "scheduled_start": start,
                "scheduled_end": start + Duration::hours(1)
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let (name, value) = add_auth_header(&patient);
        let page: DashboardPage = app.get("/dashboard").add_header(&name, &value).await.json();
        assert_eq!(page.patient_ids, vec![patient_id]);
        assert_eq!(page.upcoming_visits.len(), 1);
        assert_eq!(page.pending_invitations, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn clinician_dashboard_counts_assigned_patients_and_urgent_alerts(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let clinician = create_test_user(&pool, Role::Clinician).await;
        let (name, value) = add_auth_header(&clinician);
        for severity in ["critical", "low"] {
            let patient = create_test_user(&pool, Role::Patient).await;
            let patient_id = link_clinician(&pool, &patient, &clinician).await;
            app.post("/api/v1/alerts")
                .add_header(&name, &value)
                .json(&json!({ "patient_id": patient_id, "alert_type": "vitals", "severity": severity, "message": "check" }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let page: ClinicianDashboardPage = app.get("/dashboard/clinician").add_header(&name, &value).await.json();
        assert_eq!(page.active_patient_count, 2);
        assert_eq!(page.urgent_alert_count, 1);
        assert_eq!(page.recent_alerts.len(), 2);
        assert!(page.todays_visits.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn vendor_sees_pending_and_in_flight_orders(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let vendor = create_test_user(&pool, Role::Vendor).await;
        let patient = create_test_user(&pool, Role::Patient).await;
        let ids = role_record_ids(&pool, vendor.id).await;
        let patient_id = role_record_ids(&pool, patient.id).await.patient.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let mut orders = Orders::new(&mut conn);
        for (equipment, status, eta) in [
            ("Walker", DmeOrderStatus::PendingVendor, None),
            ("Hospital bed", DmeOrderStatus::Shipped, NaiveDate::from_ymd_opt(2030, 1, 9)),
            ("Oxygen concentrator", DmeOrderStatus::VendorAccepted, NaiveDate::from_ymd_opt(2030, 1, 2)),
        ] {
            orders
                .create_dme_order(&DmeOrderCreateDBRequest {
                    patient_id,
                    vendor_id: ids.vendor.unwrap(),
                    equipment_name: equipment.to_string(),
                    quantity: 1,
                    status,
                    estimated_delivery_date: eta,
                })
                .await
                .unwrap();
        }
        drop(conn);

        let (name, value) = add_auth_header(&vendor);
        let page: VendorDashboardPage = app.get("/vendor/dashboard").add_header(&name, &value).await.json();
        assert_eq!(page.pending_orders.len(), 1);
        assert_eq!(page.active_orders.len(), 2);
        assert_eq!(page.active_orders[0].equipment_name, "Oxygen concentrator");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn analytics_reports_engagement_metrics(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, Role::AgencyAdmin).await;
        let (name, value) = add_auth_header(&admin);

        let page: AnalyticsPage = app.get("/dashboard/admin/analytics").add_header(&name, &value).await.json();
        let labels: Vec<&str> = page.patient_engagement.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, ["Total Patients", "Active Care Plans", "Messages Sent", "Engagement Rate"]);
        assert_eq!(page.completion_rate, 0);
        assert!(page.visits_by_type.is_empty());
    }
}
