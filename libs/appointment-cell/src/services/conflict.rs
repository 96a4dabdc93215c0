use reqwest::Method;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;
use std::sync::Arc;

use shared_database::supabase::SupabaseClient;
use shared_utils::time::{validate_window, windows_overlap};

use crate::models::{Appointment, AppointmentStatus, ConflictCheckResponse, AppointmentError};

/// Appointment-level overlap detection, used by staff-facing appointment
/// creation and editing. Slot-level availability is the booking cell's
/// concern; this checks the appointments table directly.
pub struct ConflictCheckService {
    supabase: Arc<SupabaseClient>,
}

impl ConflictCheckService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Check whether `[start_time, end_time)` overlaps any non-cancelled,
    /// non-deleted appointment for the staff member, optionally excluding
    /// the appointment being edited. "No conflict" is a normal result.
    pub async fn check_conflicts(
        &self,
        staff_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        validate_window(start_time, end_time).map_err(AppointmentError::ValidationError)?;

        debug!("Checking conflicts for staff {} from {} to {}",
               staff_id, start_time, end_time);

        let candidates = self.get_staff_appointments_in_range(
            staff_id,
            start_time,
            end_time,
            exclude_appointment_id,
            auth_token,
        ).await?;

        // The range prefilter is coarse; re-check the half-open overlap
        // in memory before reporting a conflict.
        let conflicts: Vec<Appointment> = candidates.into_iter()
            .filter(|apt| {
                windows_overlap(start_time, end_time, apt.start_time, apt.end_time)
                    && apt.status != AppointmentStatus::Cancelled
                    && apt.deleted_at.is_none()
            })
            .collect();

        let has_conflict = !conflicts.is_empty();
        if has_conflict {
            warn!("Conflict detected for staff {} - {} overlapping appointments",
                  staff_id, conflicts.len());
        }

        Ok(ConflictCheckResponse {
            has_conflict,
            conflicts,
        })
    }

    async fn get_staff_appointments_in_range(
        &self,
        staff_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = vec![
            format!("staff_id=eq.{}", staff_id),
            format!("start_time=lt.{}", urlencoding::encode(&end_time.to_rfc3339())),
            format!("end_time=gt.{}", urlencoding::encode(&start_time.to_rfc3339())),
            "status=neq.cancelled".to_string(),
            "deleted_at=is.null".to_string(),
        ];

        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!("/rest/v1/appointments?{}&order=start_time.asc",
                          query_parts.join("&"));

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let appointments: Vec<Appointment> = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e)))?;

        Ok(appointments)
    }
}
