//! Role-based permission checks and patient access rules.
//!
//! Two layers:
//! - [`has_permission`] is a static role matrix answering "may this role ever do X to Y".
//! - [`require_patient_access`] adds the data-dependent rule for patient-scoped records: a
//!   patient reaches only their own record, caregivers and clinicians reach patients they have
//!   an active link to, and agency admins reach everyone.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};
use sqlx::PgConnection;

use crate::{
    AppState,
    api::models::profiles::{CurrentUser, Role},
    db::{
        handlers::{CareTeam, RoleRecords},
        models::care_team::{PatientCaregiverDBResponse, PatientClinicianDBResponse},
    },
    errors::{Error, Result},
    types::{Operation, PatientId, Permission, Resource},
};

/// Type-level resource names for [`RequiresPermission`].
pub mod resource {
    use crate::types::Resource;

    pub trait ResourceMarker: Send + Sync + 'static {
        const RESOURCE: Resource;
    }

    macro_rules! resources {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl ResourceMarker for $name {
                    const RESOURCE: Resource = Resource::$name;
                }
            )*
        };
    }

    resources!(
        Profiles,
        Patients,
        CareTeam,
        Visits,
        Medications,
        CarePlans,
        Documents,
        Invitations,
        CaregiverInvitations,
        Alerts,
        Analytics,
    );
}

/// Type-level operation names for [`RequiresPermission`].
pub mod operation {
    use crate::types::Operation;

    pub trait OperationMarker: Send + Sync + 'static {
        const OPERATION: Operation;
    }

    macro_rules! operations {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl OperationMarker for $name {
                    const OPERATION: Operation = Operation::$name;
                }
            )*
        };
    }

    operations!(CreateAll, CreateOwn, ReadAll, ReadOwn, UpdateAll, UpdateOwn, DeleteAll, DeleteOwn);
}

/// Whether `user`'s role may perform `operation` on `resource` at all.
///
/// `*Own` answers only whether the role can act on linked records; the link itself is checked
/// separately by [`require_patient_access`].
pub fn has_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    use Operation as O;
    use Resource as R;

    if user.role == Role::AgencyAdmin {
        return true;
    }

    if !matches!(operation, O::CreateOwn | O::ReadOwn | O::UpdateOwn | O::DeleteOwn) {
        return false;
    }

    let role = user.role;
    let care_circle = matches!(role, Role::Patient | Role::Caregiver | Role::Clinician);

    match (resource, operation) {
        (R::Profiles | R::Messages | R::Notifications, _) => true,
        (R::Invitations, O::CreateOwn) => matches!(role, Role::Patient | Role::Clinician),
        (R::Invitations, _) => true,
        (R::CaregiverInvitations, O::CreateOwn | O::DeleteOwn) => role == Role::Patient,
        (R::CaregiverInvitations, _) => matches!(role, Role::Patient | Role::Caregiver),
        (R::Patients, O::ReadOwn) => care_circle,
        (R::CareTeam, O::ReadOwn) => care_circle,
        (R::CareTeam, O::DeleteOwn) => role == Role::Patient,
        (R::Visits, O::ReadOwn) => care_circle,
        (R::Visits, O::CreateOwn | O::UpdateOwn) => role == Role::Clinician,
        (R::VisitRatings, O::CreateOwn) => matches!(role, Role::Patient | Role::Caregiver),
        (R::VisitRatings, O::ReadOwn) => care_circle,
        (R::Medications, O::ReadOwn | O::CreateOwn | O::UpdateOwn) => care_circle,
        (R::CarePlans, O::ReadOwn) => care_circle,
        (R::CarePlans, O::CreateOwn | O::UpdateOwn) => role == Role::Clinician,
        (R::Documents, O::ReadOwn | O::CreateOwn | O::DeleteOwn) => care_circle,
        (R::Alerts, _) => role == Role::Clinician,
        _ => false,
    }
}

fn widen(operation: Operation) -> Operation {
    match operation {
        Operation::CreateOwn => Operation::CreateAll,
        Operation::ReadOwn => Operation::ReadAll,
        Operation::UpdateOwn => Operation::UpdateAll,
        Operation::DeleteOwn => Operation::DeleteAll,
        other => other,
    }
}

/// Extractor that authenticates the caller and requires a role permission, else 403.
pub struct RequiresPermission<R, O> {
    pub user: CurrentUser,
    _marker: PhantomData<(R, O)>,
}

impl<R, O> FromRequestParts<AppState> for RequiresPermission<R, O>
where
    R: resource::ResourceMarker,
    O: operation::OperationMarker,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !has_permission(&user, R::RESOURCE, O::OPERATION) {
            return Err(Error::InsufficientPermissions {
                required: Permission::Allow(R::RESOURCE, O::OPERATION),
                action: O::OPERATION,
                resource: format!("{:?}", R::RESOURCE).to_lowercase(),
            });
        }
        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}

/// How the caller reaches a patient. Caregiver and clinician variants carry the link so
/// handlers can honour its permission flags.
#[derive(Debug, Clone)]
pub enum PatientAccess {
    Agency,
    OwnRecord,
    Caregiver(PatientCaregiverDBResponse),
    Clinician(PatientClinicianDBResponse),
}

impl PatientAccess {
    /// Caregivers need `can_manage_medications`; everyone else with access may.
    pub fn can_manage_medications(&self) -> bool {
        match self {
            PatientAccess::Caregiver(link) => link.can_manage_medications,
            _ => true,
        }
    }
}

/// Resolve how `user` relates to `patient_id`, or None when there is no active relationship.
pub async fn patient_relationship(conn: &mut PgConnection, user: &CurrentUser, patient_id: PatientId) -> Result<Option<PatientAccess>> {
    let access = match user.role {
        Role::AgencyAdmin => Some(PatientAccess::Agency),
        Role::Patient => {
            let own = RoleRecords::new(&mut *conn).patient_by_profile(user.id).await?;
            own.filter(|p| p.id == patient_id).map(|_| PatientAccess::OwnRecord)
        }
        Role::Caregiver => {
            let caregiver = RoleRecords::new(&mut *conn).caregiver_by_profile(user.id).await?;
            match caregiver {
                Some(caregiver) => CareTeam::new(&mut *conn)
                    .active_caregiver_link(patient_id, caregiver.id)
                    .await?
                    .map(PatientAccess::Caregiver),
                None => None,
            }
        }
        Role::Clinician => {
            let clinician = RoleRecords::new(&mut *conn).clinician_by_profile(user.id).await?;
            match clinician {
                Some(clinician) => CareTeam::new(&mut *conn)
                    .active_clinician_link(patient_id, clinician.id)
                    .await?
                    .map(PatientAccess::Clinician),
                None => None,
            }
        }
        Role::Physician | Role::Vendor => None,
    };
    Ok(access)
}

/// Check both the role matrix and the care relationship for a patient-scoped operation.
///
/// Unknown patients are 404; known patients the caller can't reach are 403.
pub async fn require_patient_access(
    conn: &mut PgConnection,
    user: &CurrentUser,
    patient_id: PatientId,
    resource: Resource,
    operation: Operation,
) -> Result<PatientAccess> {
    if !has_permission(user, resource, operation) && !has_permission(user, resource, widen(operation)) {
        return Err(Error::InsufficientPermissions {
            required: Permission::Allow(resource, operation),
            action: operation,
            resource: format!("{resource:?}").to_lowercase(),
        });
    }

    if RoleRecords::new(&mut *conn).get_patient(patient_id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "Patient".to_string(),
            id: patient_id.to_string(),
        });
    }

    patient_relationship(conn, user, patient_id)
        .await?
        .ok_or_else(|| Error::InsufficientPermissions {
            required: Permission::Granted,
            action: operation,
            resource: format!("patient {patient_id}"),
        })
}

/// Patients whose records `user` can reach. None means every patient (agency admins).
pub async fn accessible_patient_ids(conn: &mut PgConnection, user: &CurrentUser) -> Result<Option<Vec<PatientId>>> {
    let ids = match user.role {
        Role::AgencyAdmin => return Ok(None),
        Role::Patient => {
            let own = RoleRecords::new(&mut *conn).patient_by_profile(user.id).await?;
            own.map(|p| vec![p.id]).unwrap_or_default()
        }
        Role::Caregiver => {
            let caregiver = RoleRecords::new(&mut *conn).caregiver_by_profile(user.id).await?;
            match caregiver {
                Some(caregiver) => CareTeam::new(&mut *conn).patient_ids_for_caregiver(caregiver.id).await?,
                None => Vec::new(),
            }
        }
        Role::Clinician => {
            let clinician = RoleRecords::new(&mut *conn).clinician_by_profile(user.id).await?;
            match clinician {
                Some(clinician) => CareTeam::new(&mut *conn).patient_ids_for_clinician(clinician.id).await?,
                None => Vec::new(),
            }
        }
        Role::Physician | Role::Vendor => Vec::new(),
    };
    Ok(Some(ids))
}
