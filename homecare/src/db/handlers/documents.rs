//! Database repository for patient documents.

use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{
        errors::Result,
        models::documents::{DocumentCreateDBRequest, DocumentDBResponse},
    },
    types::{DocumentId, PatientId, abbrev_uuid},
};

pub struct Documents<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Documents<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(patient_id = %abbrev_uuid(&request.patient_id), file_name = %request.file_name), err)]
    pub async fn create(&mut self, request: &DocumentCreateDBRequest) -> Result<DocumentDBResponse> {
        let document = sqlx::query_as::<_, DocumentDBResponse>(
            r#"
            INSERT INTO documents (patient_id, document_type, file_name, file_url, file_size, mime_type, description, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(request.patient_id)
        .bind(request.document_type)
        .bind(&request.file_name)
        .bind(&request.file_url)
        .bind(request.file_size)
        .bind(&request.mime_type)
        .bind(&request.description)
        .bind(request.uploaded_by)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(document)
    }

    #[instrument(skip(self), fields(document_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: DocumentId) -> Result<Option<DocumentDBResponse>> {
        let document = sqlx::query_as::<_, DocumentDBResponse>("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(document)
    }

    #[instrument(skip(self), fields(patient_id = %abbrev_uuid(&patient_id)), err)]
    pub async fn list_for_patient(&mut self, patient_id: PatientId) -> Result<Vec<DocumentDBResponse>> {
        let documents = sqlx::query_as::<_, DocumentDBResponse>("SELECT * FROM documents WHERE patient_id = $1 ORDER BY created_at DESC")
            .bind(patient_id)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(documents)
    }

    #[instrument(skip(self, patient_ids), fields(count = patient_ids.len()), err)]
    pub async fn count_for_patients(&mut self, patient_ids: &[PatientId]) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM documents WHERE patient_id = ANY($1)")
            .bind(patient_ids)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(document_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: DocumentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::profiles::Role,
        db::{errors::DbError, models::documents::DocumentType},
        test_utils::{create_test_user, role_record_ids},
    };
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn documents_are_counted_per_patient(pool: PgPool) {
        let patient = create_test_user(&pool, Role::Patient).await;
        let patient_id = role_record_ids(&pool, patient.id).await.patient.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let mut documents = Documents::new(&mut conn);

        let request = DocumentCreateDBRequest {
            patient_id,
            document_type: DocumentType::InsuranceCard,
            file_name: "card.png".to_string(),
            file_url: "https://blobs.example.com/card.png".to_string(),
            file_size: 2048,
            mime_type: "image/png".to_string(),
            description: None,
            uploaded_by: patient.id,
        };
        let doc = documents.create(&request).await.unwrap();
        assert_eq!(documents.count_for_patients(&[patient_id]).await.unwrap(), 1);
        assert_eq!(documents.list_for_patient(patient_id).await.unwrap()[0].id, doc.id);

        let negative = DocumentCreateDBRequest { file_size: -1, ..request };
        assert!(matches!(documents.create(&negative).await.unwrap_err(), DbError::CheckViolation { .. }));

        assert!(documents.delete(doc.id).await.unwrap());
        assert_eq!(documents.count_for_patients(&[patient_id]).await.unwrap(), 0);
    }
}
