//! Database models for physician medical orders and vendor DME orders.

use crate::types::{PatientId, PhysicianId, VendorId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "medical_order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MedicalOrderStatus {
    Pending,
    Signed,
    Rejected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "dme_order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DmeOrderStatus {
    PendingVendor,
    VendorAccepted,
    InPreparation,
    Shipped,
    Delivered,
    Cancelled,
}

impl DmeOrderStatus {
    /// Orders a vendor has taken on and not yet delivered.
    pub const IN_FLIGHT: [DmeOrderStatus; 3] = [DmeOrderStatus::VendorAccepted, DmeOrderStatus::InPreparation, DmeOrderStatus::Shipped];

    pub fn as_str(&self) -> &'static str {
        match self {
            DmeOrderStatus::PendingVendor => "pending_vendor",
            DmeOrderStatus::VendorAccepted => "vendor_accepted",
            DmeOrderStatus::InPreparation => "in_preparation",
            DmeOrderStatus::Shipped => "shipped",
            DmeOrderStatus::Delivered => "delivered",
            DmeOrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MedicalOrderCreateDBRequest {
    pub physician_id: PhysicianId,
    pub patient_id: PatientId,
    pub order_type: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MedicalOrderDBResponse {
    pub id: Uuid,
    pub physician_id: PhysicianId,
    pub patient_id: PatientId,
    pub order_type: String,
    pub description: Option<String>,
    pub status: MedicalOrderStatus,
    pub signed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MedicalOrderWithPatient {
    #[sqlx(flatten)]
    pub order: MedicalOrderDBResponse,
    pub patient_first_name: String,
    pub patient_last_name: String,
}

#[derive(Debug, Clone)]
pub struct DmeOrderCreateDBRequest {
    pub patient_id: PatientId,
    pub vendor_id: VendorId,
    pub equipment_name: String,
    pub quantity: i32,
    pub status: DmeOrderStatus,
    pub estimated_delivery_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DmeOrderDBResponse {
    pub id: Uuid,
    pub patient_id: PatientId,
    pub vendor_id: VendorId,
    pub equipment_name: String,
    pub quantity: i32,
    pub status: DmeOrderStatus,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DmeOrderWithPatient {
    #[sqlx(flatten)]
    pub order: DmeOrderDBResponse,
    pub patient_first_name: String,
    pub patient_last_name: String,
}
