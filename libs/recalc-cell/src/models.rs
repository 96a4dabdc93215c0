// libs/recalc-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveTime, Utc};

// ==============================================================================
// QUEUE MODELS
// ==============================================================================

/// One pending or completed recalculation request. Entries stay in the table
/// after processing as an audit trail; there is no dedup because regeneration
/// is idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecalcQueueEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub staff_id: Uuid,
    pub trigger: String,
    pub queued_at: DateTime<Utc>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRecalcRequest {
    pub tenant_id: Uuid,
    pub staff_id: Uuid,
    pub trigger: String,
}

// ==============================================================================
// WORKER INPUTS
// ==============================================================================

/// A recurring working-hours block for one weekday at one location.
/// `day_of_week` is 0 = Sunday through 6 = Saturday; times are UTC wall times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffWorkingHours {
    pub staff_id: Uuid,
    pub location_id: Uuid,
    pub day_of_week: u32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub batch_size: usize,
    pub horizon_days: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            horizon_days: 30,
        }
    }
}

// ==============================================================================
// RUN SUMMARY
// ==============================================================================

/// Aggregate outcome of one worker batch. Individual entry failures land in
/// `errors` and never abort the batch.
#[derive(Debug, Clone, Serialize)]
pub struct RecalcRunSummary {
    pub processed: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum RecalcError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
