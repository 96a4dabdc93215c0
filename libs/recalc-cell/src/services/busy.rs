use reqwest::Method;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;
use std::sync::Arc;

use shared_database::supabase::SupabaseClient;
use shared_utils::time::merge_intervals;

use crate::models::RecalcError;

#[derive(Debug, Deserialize)]
struct TimeWindow {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

/// Collects the intervals during which a staff member cannot take bookings:
/// live appointments plus ad-hoc busy events, merged into a sorted
/// non-overlapping cover.
pub struct BusyIntervalService {
    supabase: Arc<SupabaseClient>,
}

impl BusyIntervalService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn busy_intervals(
        &self,
        staff_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, RecalcError> {
        let appointments_path = format!(
            "/rest/v1/appointments?staff_id=eq.{}&status=neq.cancelled&deleted_at=is.null&start_time=lt.{}&end_time=gt.{}&select=start_time,end_time",
            staff_id,
            urlencoding::encode(&to.to_rfc3339()),
            urlencoding::encode(&from.to_rfc3339()),
        );
        let appointments: Vec<TimeWindow> = self.supabase.service_request(
            Method::GET,
            &appointments_path,
            None,
        ).await.map_err(|e| RecalcError::DatabaseError(e.to_string()))?;

        let events_path = format!(
            "/rest/v1/staff_busy_events?staff_id=eq.{}&start_time=lt.{}&end_time=gt.{}&select=start_time,end_time",
            staff_id,
            urlencoding::encode(&to.to_rfc3339()),
            urlencoding::encode(&from.to_rfc3339()),
        );
        let events: Vec<TimeWindow> = self.supabase.service_request(
            Method::GET,
            &events_path,
            None,
        ).await.map_err(|e| RecalcError::DatabaseError(e.to_string()))?;

        debug!("Staff {} has {} appointments and {} busy events in range",
               staff_id, appointments.len(), events.len());

        let intervals = appointments.into_iter()
            .chain(events)
            .map(|w| (w.start_time, w.end_time))
            .collect();

        Ok(merge_intervals(intervals))
    }
}
