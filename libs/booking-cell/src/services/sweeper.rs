use reqwest::Method;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use std::sync::Arc;

use shared_database::supabase::{SupabaseClient, representation_headers};

use crate::models::{CleanupOutcome, CleanupRun, SlotError, SweeperConfig};

/// Releases holds whose `reserved_until` has passed.
///
/// The sweeper is invoked by an external scheduler and may also be triggered
/// opportunistically, so runs are rate limited through a durable run log
/// rather than in-process state. Everything runs on the privileged path.
pub struct SweeperService {
    supabase: Arc<SupabaseClient>,
    config: SweeperConfig,
}

impl SweeperService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            config: SweeperConfig::default(),
        }
    }

    pub fn with_config(supabase: Arc<SupabaseClient>, config: SweeperConfig) -> Self {
        Self { supabase, config }
    }

    /// Run one sweep. Returns `RateLimited` when the previous run started
    /// within the cooldown window.
    pub async fn cleanup_expired_reservations(&self) -> Result<CleanupOutcome, SlotError> {
        let now = Utc::now();

        let last_runs: Vec<CleanupRun> = self.supabase.service_request(
            Method::GET,
            "/rest/v1/reservation_cleanup_runs?order=started_at.desc&limit=1",
            None,
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        if let Some(last) = last_runs.first() {
            let cooldown = Duration::seconds(self.config.cooldown_seconds);
            if last.started_at + cooldown > now {
                debug!("Sweep skipped; last run started at {}", last.started_at);
                return Ok(CleanupOutcome::RateLimited);
            }
        }

        let created: Vec<CleanupRun> = self.supabase.service_request_with_headers(
            Method::POST,
            "/rest/v1/reservation_cleanup_runs",
            Some(json!({ "started_at": now.to_rfc3339() })),
            Some(representation_headers()),
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        let run = created.into_iter().next()
            .ok_or_else(|| SlotError::DatabaseError("Failed to record cleanup run".to_string()))?;

        // One bulk conditional update releases every expired hold. A failure
        // is recorded on the run row instead of escalating, so the scheduler
        // always gets a structured result back.
        let (released_count, error) = match self.release_expired(now).await {
            Ok(count) => (count, None),
            Err(e) => {
                warn!("Expired-hold release failed: {}", e);
                (0, Some(e.to_string()))
            }
        };

        let finish_body = json!({
            "finished_at": Utc::now().to_rfc3339(),
            "released_count": released_count,
            "error": error,
        });
        if let Err(e) = self.supabase.service_request_with_headers::<Vec<Value>>(
            Method::PATCH,
            &format!("/rest/v1/reservation_cleanup_runs?id=eq.{}", run.id),
            Some(finish_body),
            Some(representation_headers()),
        ).await {
            warn!("Failed to finalize cleanup run {}: {}", run.id, e);
        }

        info!("Sweep {} released {} expired hold(s)", run.id, released_count);
        Ok(CleanupOutcome::Completed {
            run_id: run.id,
            released_count,
            error,
        })
    }

    async fn release_expired(&self, now: chrono::DateTime<Utc>) -> Result<usize, SlotError> {
        let path = format!(
            "/rest/v1/availability_slots?is_available=eq.false&reserved_until=lt.{}",
            urlencoding::encode(&now.to_rfc3339())
        );
        let body = json!({
            "is_available": true,
            "reserved_until": null,
            "reserved_by_session": null,
            "updated_at": now.to_rfc3339()
        });

        let released: Vec<Value> = self.supabase.service_request_with_headers(
            Method::PATCH,
            &path,
            Some(body),
            Some(representation_headers()),
        ).await.map_err(|e| SlotError::DatabaseError(e.to_string()))?;

        Ok(released.len())
    }
}
