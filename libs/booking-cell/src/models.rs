// libs/booking-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

// ==============================================================================
// SLOT MODELS
// ==============================================================================

/// A bookable window of a staff member's calendar at one location.
///
/// `is_available = false` together with a `reserved_until` in the future means
/// the slot is held by the session in `reserved_by_session`. A confirmed slot
/// is deleted outright; the appointment row becomes the record of the booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub staff_id: Uuid,
    pub location_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_available: bool,
    pub reserved_until: Option<DateTime<Utc>>,
    pub reserved_by_session: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    pub fn is_held(&self) -> bool {
        !self.is_available && self.reserved_by_session.is_some()
    }

    pub fn hold_expired(&self, now: DateTime<Utc>) -> bool {
        match self.reserved_until {
            Some(until) => until < now,
            None => false,
        }
    }
}

/// Hold durations accepted by reserve. Requests outside the clamp range are
/// rejected rather than silently adjusted.
#[derive(Debug, Clone)]
pub struct ReservationRules {
    pub default_hold_minutes: i64,
    pub min_hold_minutes: i64,
    pub max_hold_minutes: i64,
}

impl Default for ReservationRules {
    fn default() -> Self {
        Self {
            default_hold_minutes: 5,
            min_hold_minutes: 1,
            max_hold_minutes: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Minimum gap between two sweeps, enforced through the durable run log.
    pub cooldown_seconds: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self { cooldown_seconds: 30 }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveSlotRequest {
    pub slot_id: Uuid,
    pub session_id: String,
    pub hold_duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseReservationRequest {
    pub slot_id: Uuid,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmReservationRequest {
    pub slot_id: Uuid,
    pub session_id: String,
    pub appointment: ConfirmAppointmentPayload,
}

/// The caller-supplied part of the appointment created at confirm. Tenant,
/// staff, location and the time window always come from the slot itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmAppointmentPayload {
    pub customer_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsQuery {
    pub tenant_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Outcome of a sweep attempt. Rate-limited attempts are a normal result, not
/// an error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CleanupOutcome {
    Completed {
        run_id: Uuid,
        released_count: usize,
        error: Option<String>,
    },
    RateLimited,
}

/// A row in the sweep run log. Doubles as the cooldown record and as the
/// audit trail for how many holds each sweep released.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub released_count: Option<i64>,
    pub error: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SlotError {
    #[error("Slot not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
