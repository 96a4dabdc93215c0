use reqwest::Method;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};
use std::sync::Arc;

use shared_database::supabase::{SupabaseClient, representation_headers};
use shared_utils::time::validate_window;

use crate::models::{Appointment, AppointmentStatus, CreateAppointmentRequest, AppointmentError};

/// The narrow appointment-writer interface. The only caller inside this core
/// is the reservation confirm step; everything else about appointment
/// management lives with the external collaborator.
pub struct AppointmentService {
    supabase: Arc<SupabaseClient>,
}

impl AppointmentService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Insert a confirmed appointment. Runs on the service-role path because
    /// confirm happens on behalf of a booking session, not a signed-in user.
    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        validate_window(request.start_time, request.end_time)
            .map_err(AppointmentError::ValidationError)?;

        debug!("Creating appointment for staff {} from {} to {}",
               request.staff_id, request.start_time, request.end_time);

        let now = Utc::now();
        let appointment_data = json!({
            "tenant_id": request.tenant_id,
            "staff_id": request.staff_id,
            "location_id": request.location_id,
            "customer_id": request.customer_id,
            "start_time": request.start_time.to_rfc3339(),
            "end_time": request.end_time.to_rfc3339(),
            "status": AppointmentStatus::Confirmed.to_string(),
            "notes": request.notes,
            "deleted_at": null,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let result: Vec<Value> = self.supabase.service_request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            Some(appointment_data),
            Some(representation_headers()),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::DatabaseError("Failed to create appointment".to_string()));
        }

        let appointment: Appointment = serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse created appointment: {}", e)))?;

        info!("Appointment {} created for staff {}", appointment.id, appointment.staff_id);
        Ok(appointment)
    }
}
