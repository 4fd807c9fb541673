//! Database models for patient documents. Files live in external blob storage; only the URL is
//! stored here.

use crate::types::{DocumentId, PatientId, ProfileId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Default, ToSchema)]
#[sqlx(type_name = "document_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    DischargeSummary,
    InsuranceCard,
    Order,
    ConsentForm,
    LabResult,
    #[default]
    Other,
}

#[derive(Debug, Clone)]
pub struct DocumentCreateDBRequest {
    pub patient_id: PatientId,
    pub document_type: DocumentType,
    pub file_name: String,
    pub file_url: String,
    pub file_size: i64,
    pub mime_type: String,
    pub description: Option<String>,
    pub uploaded_by: ProfileId,
}

#[derive(Debug, Clone, FromRow)]
pub struct DocumentDBResponse {
    pub id: DocumentId,
    pub patient_id: PatientId,
    pub document_type: DocumentType,
    pub file_name: String,
    pub file_url: String,
    pub file_size: i64,
    pub mime_type: String,
    pub description: Option<String>,
    pub uploaded_by: Option<ProfileId>,
    pub created_at: DateTime<Utc>,
}
