use reqwest::Method;
use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};
use std::sync::Arc;
use std::time::Instant;

use shared_database::supabase::{SupabaseClient, representation_headers};
use shared_utils::time::windows_overlap;

use crate::models::{RecalcError, RecalcQueueEntry, RecalcRunSummary, StaffWorkingHours, WorkerConfig};
use crate::services::busy::BusyIntervalService;
use crate::services::queue::RecalcQueueService;

#[derive(Debug, Deserialize)]
struct HeldWindow {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

/// Drains the recalculation queue: for each entry, regenerates the staff
/// member's future availability from working hours minus busy intervals.
///
/// Held slots are load-bearing reservation state and are never deleted or
/// overlapped by regeneration. Entry failures are isolated; one bad schedule
/// does not stall the queue.
pub struct RecalcWorker {
    supabase: Arc<SupabaseClient>,
    queue: RecalcQueueService,
    busy: BusyIntervalService,
    config: WorkerConfig,
}

impl RecalcWorker {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            queue: RecalcQueueService::new(supabase.clone()),
            busy: BusyIntervalService::new(supabase.clone()),
            supabase,
            config: WorkerConfig::default(),
        }
    }

    pub fn with_config(supabase: Arc<SupabaseClient>, config: WorkerConfig) -> Self {
        Self {
            queue: RecalcQueueService::new(supabase.clone()),
            busy: BusyIntervalService::new(supabase.clone()),
            supabase,
            config,
        }
    }

    /// Process one batch of queue entries and return an aggregate summary.
    pub async fn run(&self) -> Result<RecalcRunSummary, RecalcError> {
        let started = Instant::now();
        let entries = self.queue.fetch_unprocessed(self.config.batch_size).await?;

        info!("Recalculation batch started with {} entries", entries.len());

        let mut processed = 0;
        let mut failed = 0;
        let mut errors = Vec::new();

        for entry in &entries {
            match self.process_entry(entry).await {
                Ok(slot_count) => match self.queue.mark_processed(entry.id).await {
                    Ok(()) => {
                        debug!("Entry {} regenerated {} slots for staff {}",
                               entry.id, slot_count, entry.staff_id);
                        processed += 1;
                    }
                    Err(e) => {
                        error!("Entry {} processed but could not be marked: {}", entry.id, e);
                        failed += 1;
                        errors.push(format!("entry {} (staff {}): {}", entry.id, entry.staff_id, e));
                    }
                },
                Err(e) => {
                    error!("Entry {} for staff {} failed: {}", entry.id, entry.staff_id, e);
                    failed += 1;
                    errors.push(format!("entry {} (staff {}): {}", entry.id, entry.staff_id, e));
                }
            }
        }

        let summary = RecalcRunSummary {
            processed,
            failed,
            errors,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!("Recalculation batch finished: {} processed, {} failed in {}ms",
              summary.processed, summary.failed, summary.duration_ms);
        Ok(summary)
    }

    /// Regenerate one staff member's future slots. Returns how many slots
    /// were inserted.
    async fn process_entry(&self, entry: &RecalcQueueEntry) -> Result<usize, RecalcError> {
        let now = Utc::now();
        let horizon_end = now + Duration::days(self.config.horizon_days);

        let working_hours = self.get_working_hours(entry).await?;
        let busy = self.busy.busy_intervals(entry.staff_id, now, horizon_end).await?;
        let held = self.get_held_windows(entry, now).await?;

        // Deleting only AVAILABLE rows leaves every live hold untouched.
        self.delete_future_available(entry, now).await?;

        let candidates = generate_candidates(&working_hours, &busy, &held, now, horizon_end);

        if !candidates.is_empty() {
            self.supabase.service_request_with_headers::<Vec<Value>>(
                Method::POST,
                "/rest/v1/availability_slots",
                Some(Value::Array(
                    candidates.iter()
                        .map(|c| c.to_row(entry.tenant_id, entry.staff_id, now))
                        .collect(),
                )),
                Some(representation_headers()),
            ).await.map_err(|e| RecalcError::DatabaseError(e.to_string()))?;
        }

        Ok(candidates.len())
    }

    async fn get_working_hours(&self, entry: &RecalcQueueEntry) -> Result<Vec<StaffWorkingHours>, RecalcError> {
        let path = format!(
            "/rest/v1/staff_working_hours?staff_id=eq.{}&is_active=eq.true",
            entry.staff_id
        );
        self.supabase.service_request(Method::GET, &path, None)
            .await
            .map_err(|e| RecalcError::DatabaseError(e.to_string()))
    }

    async fn get_held_windows(
        &self,
        entry: &RecalcQueueEntry,
        now: DateTime<Utc>,
    ) -> Result<Vec<HeldWindow>, RecalcError> {
        let path = format!(
            "/rest/v1/availability_slots?staff_id=eq.{}&is_available=eq.false&end_time=gt.{}&select=start_time,end_time",
            entry.staff_id,
            urlencoding::encode(&now.to_rfc3339()),
        );
        self.supabase.service_request(Method::GET, &path, None)
            .await
            .map_err(|e| RecalcError::DatabaseError(e.to_string()))
    }

    async fn delete_future_available(
        &self,
        entry: &RecalcQueueEntry,
        now: DateTime<Utc>,
    ) -> Result<(), RecalcError> {
        let path = format!(
            "/rest/v1/availability_slots?staff_id=eq.{}&is_available=eq.true&start_time=gte.{}",
            entry.staff_id,
            urlencoding::encode(&now.to_rfc3339()),
        );
        self.supabase.service_request_with_headers::<Vec<Value>>(
            Method::DELETE,
            &path,
            None,
            Some(representation_headers()),
        ).await.map_err(|e| RecalcError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

struct CandidateSlot {
    location_id: uuid::Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl CandidateSlot {
    fn to_row(&self, tenant_id: uuid::Uuid, staff_id: uuid::Uuid, now: DateTime<Utc>) -> Value {
        json!({
            "tenant_id": tenant_id,
            "staff_id": staff_id,
            "location_id": self.location_id,
            "start_time": self.start_time.to_rfc3339(),
            "end_time": self.end_time.to_rfc3339(),
            "is_available": true,
            "reserved_until": null,
            "reserved_by_session": null,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        })
    }
}

/// Step each working-hours block over the horizon, dropping candidates that
/// start in the past or overlap a busy interval or a held slot.
fn generate_candidates(
    working_hours: &[StaffWorkingHours],
    busy: &[(DateTime<Utc>, DateTime<Utc>)],
    held: &[HeldWindow],
    now: DateTime<Utc>,
    horizon_end: DateTime<Utc>,
) -> Vec<CandidateSlot> {
    let mut candidates = Vec::new();

    let mut date = now.date_naive();
    let last_date = horizon_end.date_naive();

    while date <= last_date {
        let weekday = date.weekday().num_days_from_sunday();

        for block in working_hours.iter().filter(|wh| wh.day_of_week == weekday) {
            if block.slot_duration_minutes <= 0 || block.start_time >= block.end_time {
                continue;
            }
            let step = Duration::minutes(block.slot_duration_minutes);
            let block_start = NaiveDateTime::new(date, block.start_time).and_utc();
            let block_end = NaiveDateTime::new(date, block.end_time).and_utc();

            let mut cursor = block_start;
            while cursor + step <= block_end {
                let slot_end = cursor + step;

                let in_range = cursor >= now && slot_end <= horizon_end;
                let blocked = busy.iter().any(|(s, e)| windows_overlap(cursor, slot_end, *s, *e))
                    || held.iter().any(|h| windows_overlap(cursor, slot_end, h.start_time, h.end_time));

                if in_range && !blocked {
                    candidates.push(CandidateSlot {
                        location_id: block.location_id,
                        start_time: cursor,
                        end_time: slot_end,
                    });
                }

                cursor = slot_end;
            }
        }

        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    candidates
}
