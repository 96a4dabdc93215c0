use reqwest::Method;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;
use std::sync::Arc;

use shared_database::supabase::{SupabaseClient, representation_headers};

use appointment_cell::models::CreateAppointmentRequest;
use appointment_cell::services::appointments::AppointmentService;
use recalc_cell::services::queue::RecalcQueueService;

use crate::models::{
    AvailabilitySlot, AvailableSlotsQuery, ConfirmReservationRequest, ReservationRules, SlotError,
};

/// Reserve, release and confirm holds on availability slots.
///
/// There are no transactions here. Every state transition is a single
/// conditional write whose filter encodes the precondition; zero affected
/// rows means another actor got there first.
pub struct ReservationService {
    supabase: Arc<SupabaseClient>,
    rules: ReservationRules,
}

impl ReservationService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            rules: ReservationRules::default(),
        }
    }

    pub fn with_rules(supabase: Arc<SupabaseClient>, rules: ReservationRules) -> Self {
        Self { supabase, rules }
    }

    /// Place a temporary hold on a slot for a booking session.
    ///
    /// The update filter requires `is_available = true`, so two sessions
    /// racing for the same slot resolve at the store: exactly one PATCH
    /// matches the row, the other comes back empty.
    pub async fn reserve_slot(
        &self,
        slot_id: Uuid,
        session_id: &str,
        hold_duration_minutes: Option<i64>,
        auth_token: &str,
    ) -> Result<AvailabilitySlot, SlotError> {
        if session_id.trim().is_empty() {
            return Err(SlotError::ValidationError("session_id must not be empty".to_string()));
        }

        let hold_minutes = match hold_duration_minutes {
            Some(m) if m < self.rules.min_hold_minutes || m > self.rules.max_hold_minutes => {
                return Err(SlotError::ValidationError(format!(
                    "hold_duration_minutes must be between {} and {}",
                    self.rules.min_hold_minutes, self.rules.max_hold_minutes
                )));
            }
            Some(m) => m,
            None => self.rules.default_hold_minutes,
        };

        let now = Utc::now();
        let reserved_until = now + Duration::minutes(hold_minutes);

        debug!("Session {} reserving slot {} until {}", session_id, slot_id, reserved_until);

        let path = format!(
            "/rest/v1/availability_slots?id=eq.{}&is_available=eq.true",
            slot_id
        );
        let body = json!({
            "is_available": false,
            "reserved_until": reserved_until.to_rfc3339(),
            "reserved_by_session": session_id,
            "updated_at": now.to_rfc3339()
        });

        let updated: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(body),
            Some(representation_headers()),
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        if let Some(row) = updated.into_iter().next() {
            let slot: AvailabilitySlot = serde_json::from_value(row)
                .map_err(|e| SlotError::DatabaseError(format!("Failed to parse reserved slot: {}", e)))?;
            info!("Slot {} held by session {} until {}", slot.id, session_id, reserved_until);
            return Ok(slot);
        }

        // The precondition failed. Distinguish "no such slot" from "taken"
        // with a privileged probe, since held rows are hidden from this caller.
        let probe: Vec<Value> = self.supabase.service_request(
            Method::GET,
            &format!("/rest/v1/availability_slots?id=eq.{}&select=id", slot_id),
            None,
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        if probe.is_empty() {
            Err(SlotError::NotFound)
        } else {
            Err(SlotError::Conflict("Slot is no longer available".to_string()))
        }
    }

    /// Release a session's hold on a slot, plus any other slots the same
    /// session holds that overlap it in time for the same staff member and
    /// location.
    ///
    /// The primary release is a blind conditional write. Zero affected rows
    /// means the hold was already gone (expired and swept, or never placed),
    /// which callers treat as success with a released count of zero.
    pub async fn release_reservation(
        &self,
        slot_id: Uuid,
        session_id: &str,
        auth_token: &str,
    ) -> Result<usize, SlotError> {
        if session_id.trim().is_empty() {
            return Err(SlotError::ValidationError("session_id must not be empty".to_string()));
        }

        debug!("Session {} releasing slot {}", session_id, slot_id);

        let path = format!(
            "/rest/v1/availability_slots?id=eq.{}&reserved_by_session=eq.{}&is_available=eq.false",
            slot_id,
            urlencoding::encode(session_id)
        );

        let released: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(release_body()),
            Some(representation_headers()),
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        let Some(primary_row) = released.into_iter().next() else {
            debug!("Slot {} held nothing to release for session {}", slot_id, session_id);
            return Ok(0);
        };

        let primary: AvailabilitySlot = serde_json::from_value(primary_row)
            .map_err(|e| SlotError::DatabaseError(format!("Failed to parse released slot: {}", e)))?;

        // Overlapping holds by the same session are cleaned up best-effort.
        // The primary release already succeeded, so failures here only log.
        let mut count = 1;
        match self.release_overlapping_holds(&primary, session_id).await {
            Ok(extra) => count += extra,
            Err(e) => warn!("Overlap cleanup after releasing slot {} failed: {}", slot_id, e),
        }

        info!("Session {} released {} slot(s) around slot {}", session_id, count, slot_id);
        Ok(count)
    }

    /// Find and release other holds by this session that overlap the released
    /// slot's window. Runs on the privileged path because held rows are only
    /// visible to their holder on the anon path.
    async fn release_overlapping_holds(
        &self,
        primary: &AvailabilitySlot,
        session_id: &str,
    ) -> Result<usize, SlotError> {
        let path = format!(
            "/rest/v1/availability_slots?staff_id=eq.{}&location_id=eq.{}&reserved_by_session=eq.{}&is_available=eq.false&start_time=lt.{}&end_time=gt.{}&id=neq.{}",
            primary.staff_id,
            primary.location_id,
            urlencoding::encode(session_id),
            urlencoding::encode(&primary.end_time.to_rfc3339()),
            urlencoding::encode(&primary.start_time.to_rfc3339()),
            primary.id,
        );

        let overlapping: Vec<AvailabilitySlot> = self.supabase.service_request(
            Method::GET,
            &path,
            None,
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        let mut released = 0;
        for slot in overlapping {
            let path = format!(
                "/rest/v1/availability_slots?id=eq.{}&reserved_by_session=eq.{}&is_available=eq.false",
                slot.id,
                urlencoding::encode(session_id)
            );
            let result: Result<Vec<Value>, _> = self.supabase.service_request_with_headers(
                Method::PATCH,
                &path,
                Some(release_body()),
                Some(representation_headers()),
            ).await;

            match result {
                Ok(rows) if !rows.is_empty() => released += 1,
                Ok(_) => debug!("Overlapping slot {} was already released", slot.id),
                Err(e) => warn!("Failed to release overlapping slot {}: {}", slot.id, e),
            }
        }

        Ok(released)
    }

    /// Turn a live hold into a confirmed appointment and retire the slot.
    pub async fn confirm_reservation(
        &self,
        request: &ConfirmReservationRequest,
        appointments: &AppointmentService,
        recalc_queue: &RecalcQueueService,
    ) -> Result<appointment_cell::models::Appointment, SlotError> {
        if request.session_id.trim().is_empty() {
            return Err(SlotError::ValidationError("session_id must not be empty".to_string()));
        }

        // Held rows are hidden from the anon path, so verification reads
        // through the service role.
        let rows: Vec<AvailabilitySlot> = self.supabase.service_request(
            Method::GET,
            &format!("/rest/v1/availability_slots?id=eq.{}", request.slot_id),
            None,
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        let slot = rows.into_iter().next().ok_or(SlotError::NotFound)?;

        if !slot.is_held() {
            return Err(SlotError::Conflict("Slot is not currently held".to_string()));
        }
        if slot.reserved_by_session.as_deref() != Some(request.session_id.as_str()) {
            return Err(SlotError::Unauthorized(
                "Reservation belongs to a different session".to_string(),
            ));
        }
        let now = Utc::now();
        if slot.hold_expired(now) {
            return Err(SlotError::Conflict("Reservation hold has expired".to_string()));
        }

        let appointment = appointments
            .create_appointment(CreateAppointmentRequest {
                tenant_id: slot.tenant_id,
                staff_id: slot.staff_id,
                location_id: slot.location_id,
                customer_id: request.appointment.customer_id,
                start_time: slot.start_time,
                end_time: slot.end_time,
                notes: request.appointment.notes.clone(),
            })
            .await
            .map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        // Retire the slot with the same session precondition. A miss here
        // means the sweeper raced us after the verification read; the
        // appointment stands either way, so this only logs.
        let retire_path = format!(
            "/rest/v1/availability_slots?id=eq.{}&reserved_by_session=eq.{}",
            slot.id,
            urlencoding::encode(&request.session_id)
        );
        let retired: Result<Vec<Value>, _> = self.supabase.service_request_with_headers(
            Method::DELETE,
            &retire_path,
            None,
            Some(representation_headers()),
        ).await;

        match retired {
            Ok(rows) if rows.is_empty() => {
                warn!("Slot {} was gone before retirement; appointment {} stands", slot.id, appointment.id)
            }
            Ok(_) => debug!("Slot {} retired after confirmation", slot.id),
            Err(e) => warn!("Failed to retire slot {}: {}", slot.id, e),
        }

        if let Err(e) = recalc_queue
            .enqueue(slot.tenant_id, slot.staff_id, "appointment_created")
            .await
        {
            warn!("Failed to enqueue recalculation for staff {}: {}", slot.staff_id, e);
        }

        info!("Reservation on slot {} confirmed as appointment {}", slot.id, appointment.id);
        Ok(appointment)
    }

    /// List open slots, optionally narrowed to a staff member, location and
    /// time range. Held slots are invisible here by construction.
    pub async fn list_available_slots(
        &self,
        query: &AvailableSlotsQuery,
        auth_token: &str,
    ) -> Result<Vec<AvailabilitySlot>, SlotError> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from >= to {
                return Err(SlotError::ValidationError("from must be before to".to_string()));
            }
        }

        let mut query_parts = vec![
            format!("tenant_id=eq.{}", query.tenant_id),
            "is_available=eq.true".to_string(),
        ];
        if let Some(staff_id) = query.staff_id {
            query_parts.push(format!("staff_id=eq.{}", staff_id));
        }
        if let Some(location_id) = query.location_id {
            query_parts.push(format!("location_id=eq.{}", location_id));
        }
        if let Some(from) = query.from {
            query_parts.push(format!("start_time=gte.{}", urlencoding::encode(&from.to_rfc3339())));
        }
        if let Some(to) = query.to {
            query_parts.push(format!("end_time=lte.{}", urlencoding::encode(&to.to_rfc3339())));
        }

        let path = format!(
            "/rest/v1/availability_slots?{}&order=start_time.asc",
            query_parts.join("&")
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        let slots: Vec<AvailabilitySlot> = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<AvailabilitySlot>, _>>()
            .map_err(|e| SlotError::DatabaseError(format!("Failed to parse slots: {}", e)))?;

        Ok(slots)
    }
}

fn release_body() -> Value {
    json!({
        "is_available": true,
        "reserved_until": null,
        "reserved_by_session": null,
        "updated_at": Utc::now().to_rfc3339()
    })
}
