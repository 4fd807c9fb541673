//! Database repository for medical and DME orders, read by the physician and vendor dashboards.

use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{
        errors::Result,
        models::orders::{
            DmeOrderCreateDBRequest, DmeOrderDBResponse, DmeOrderStatus, DmeOrderWithPatient, MedicalOrderCreateDBRequest,
            MedicalOrderDBResponse, MedicalOrderWithPatient,
        },
    },
    types::{PhysicianId, VendorId, abbrev_uuid},
};

pub struct Orders<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Orders<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(physician_id = %abbrev_uuid(&request.physician_id)), err)]
    pub async fn create_medical_order(&mut self, request: &MedicalOrderCreateDBRequest) -> Result<MedicalOrderDBResponse> {
        let order = sqlx::query_as::<_, MedicalOrderDBResponse>(
            r#"
            INSERT INTO medical_orders (physician_id, patient_id, order_type, description)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(request.physician_id)
        .bind(request.patient_id)
        .bind(&request.order_type)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(order)
    }

    /// Pending orders awaiting this physician's signature, newest first.
    #[instrument(skip(self), fields(physician_id = %abbrev_uuid(&physician_id)), err)]
    pub async fn pending_medical_orders(&mut self, physician_id: PhysicianId) -> Result<Vec<MedicalOrderWithPatient>> {
        let orders = sqlx::query_as::<_, MedicalOrderWithPatient>(
            r#"
            SELECT o.*, p.first_name AS patient_first_name, p.last_name AS patient_last_name
            FROM medical_orders o
            JOIN patients pt ON pt.id = o.patient_id
            JOIN profiles p ON p.id = pt.profile_id
            WHERE o.physician_id = $1 AND o.status = 'pending'
            ORDER BY o.created_at DESC
            "#,
        )
        .bind(physician_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(orders)
    }

    #[instrument(skip(self, request), fields(vendor_id = %abbrev_uuid(&request.vendor_id)), err)]
    pub async fn create_dme_order(&mut self, request: &DmeOrderCreateDBRequest) -> Result<DmeOrderDBResponse> {
        let order = sqlx::query_as::<_, DmeOrderDBResponse>(
            r#"
            INSERT INTO dme_orders (patient_id, vendor_id, equipment_name, quantity, status, estimated_delivery_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.patient_id)
        .bind(request.vendor_id)
        .bind(&request.equipment_name)
        .bind(request.quantity)
        .bind(request.status)
        .bind(request.estimated_delivery_date)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(order)
    }

    /// Orders waiting for the vendor to accept, newest first.
    #[instrument(skip(self), fields(vendor_id = %abbrev_uuid(&vendor_id)), err)]
    pub async fn pending_dme_orders(&mut self, vendor_id: VendorId) -> Result<Vec<DmeOrderWithPatient>> {
        self.dme_orders(vendor_id, &[DmeOrderStatus::PendingVendor], "o.created_at DESC").await
    }

    /// Accepted, in-preparation and shipped orders, soonest delivery first.
    #[instrument(skip(self), fields(vendor_id = %abbrev_uuid(&vendor_id)), err)]
    pub async fn in_flight_dme_orders(&mut self, vendor_id: VendorId) -> Result<Vec<DmeOrderWithPatient>> {
        self.dme_orders(vendor_id, &DmeOrderStatus::IN_FLIGHT, "o.estimated_delivery_date ASC NULLS LAST, o.created_at")
            .await
    }

    async fn dme_orders(&mut self, vendor_id: VendorId, statuses: &[DmeOrderStatus], order_by: &str) -> Result<Vec<DmeOrderWithPatient>> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let query = format!(
            r#"
            SELECT o.*, p.first_name AS patient_first_name, p.last_name AS patient_last_name
            FROM dme_orders o
            JOIN patients pt ON pt.id = o.patient_id
            JOIN profiles p ON p.id = pt.profile_id
            WHERE o.vendor_id = $1 AND o.status::text = ANY($2)
            ORDER BY {order_by}
            "#
        );
        let orders = sqlx::query_as::<_, DmeOrderWithPatient>(&query)
            .bind(vendor_id)
            .bind(&statuses)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(orders)
    }
}
