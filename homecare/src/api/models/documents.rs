//! API models for patient documents.
//!
//! File bytes live in external blob storage; the service records the URL the upload produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    db::models::documents::{DocumentDBResponse, DocumentType},
    errors::Error,
    types::{DocumentId, PatientId, ProfileId},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DocumentId,
    #[schema(value_type = String, format = "uuid")]
    pub patient_id: PatientId,
    pub document_type: DocumentType,
    pub file_name: String,
    pub file_url: String,
    pub file_size: i64,
    pub mime_type: String,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub uploaded_by: Option<ProfileId>,
    pub created_at: DateTime<Utc>,
}

impl From<DocumentDBResponse> for DocumentResponse {
    fn from(db: DocumentDBResponse) -> Self {
        Self {
            id: db.id,
            patient_id: db.patient_id,
            document_type: db.document_type,
            file_name: db.file_name,
            file_url: db.file_url,
            file_size: db.file_size,
            mime_type: db.mime_type,
            description: db.description,
            uploaded_by: db.uploaded_by,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentCreate {
    #[serde(default)]
    pub document_type: DocumentType,
    pub file_name: String,
    pub file_url: String,
    /// Size in bytes
    pub file_size: i64,
    /// Guessed from `file_name` when absent
    pub mime_type: Option<String>,
    pub description: Option<String>,
}

impl DocumentCreate {
    pub fn validate(&self, max_file_size: i64) -> Result<(), Error> {
        if self.file_name.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "file_name is required".to_string(),
            });
        }
        if self.file_url.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "file_url is required".to_string(),
            });
        }
        if self.file_size < 0 {
            return Err(Error::BadRequest {
                message: "file_size cannot be negative".to_string(),
            });
        }
        if self.file_size > max_file_size {
            return Err(Error::BadRequest {
                message: format!("File exceeds the maximum size of {} MB", max_file_size / (1024 * 1024)),
            });
        }
        Ok(())
    }

    /// The declared MIME type, else one guessed from the file extension.
    pub fn resolved_mime_type(&self) -> String {
        match self.mime_type.as_deref().map(str::trim) {
            Some(mime) if !mime.is_empty() => mime.to_string(),
            _ => mime_guess::from_path(&self.file_name).first_or_octet_stream().essence_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEN_MB: i64 = 10 * 1024 * 1024;

    fn upload(file_name: &str, file_size: i64) -> DocumentCreate {
        DocumentCreate {
            document_type: DocumentType::LabResult,
            file_name: file_name.to_string(),
            file_url: "https://blobs.example.com/abc".to_string(),
            file_size,
            mime_type: None,
            description: None,
        }
    }

    #[test]
    fn size_limit_is_inclusive() {
        assert!(upload("labs.pdf", TEN_MB).validate(TEN_MB).is_ok());
        let err = upload("labs.pdf", TEN_MB + 1).validate(TEN_MB).unwrap_err();
        assert_eq!(err.user_message(), "File exceeds the maximum size of 10 MB");
    }

    #[test]
    fn mime_type_is_guessed_from_extension() {
        assert_eq!(upload("labs.pdf", 1).resolved_mime_type(), "application/pdf");
        assert_eq!(upload("card.png", 1).resolved_mime_type(), "image/png");
        assert_eq!(upload("mystery", 1).resolved_mime_type(), "application/octet-stream");

        let mut declared = upload("labs.pdf", 1);
        declared.mime_type = Some("application/x-custom".to_string());
        assert_eq!(declared.resolved_mime_type(), "application/x-custom");
    }
}
