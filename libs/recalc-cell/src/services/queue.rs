use reqwest::Method;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;
use std::sync::Arc;

use shared_database::supabase::{SupabaseClient, representation_headers};

use crate::models::{RecalcError, RecalcQueueEntry};

/// Durable FIFO of recalculation requests, backed by the `slot_recalc_queue`
/// table. Writers fire and forget; the worker drains in `queued_at` order.
pub struct RecalcQueueService {
    supabase: Arc<SupabaseClient>,
}

impl RecalcQueueService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn enqueue(
        &self,
        tenant_id: Uuid,
        staff_id: Uuid,
        trigger: &str,
    ) -> Result<RecalcQueueEntry, RecalcError> {
        if trigger.trim().is_empty() {
            return Err(RecalcError::ValidationError("trigger must not be empty".to_string()));
        }

        let body = json!({
            "tenant_id": tenant_id,
            "staff_id": staff_id,
            "trigger": trigger,
            "queued_at": Utc::now().to_rfc3339(),
            "processed": false,
            "processed_at": null
        });

        let created: Vec<RecalcQueueEntry> = self.supabase.service_request_with_headers(
            Method::POST,
            "/rest/v1/slot_recalc_queue",
            Some(body),
            Some(representation_headers()),
        ).await.map_err(|e| RecalcError::DatabaseError(e.to_string()))?;

        let entry = created.into_iter().next()
            .ok_or_else(|| RecalcError::DatabaseError("Failed to enqueue recalculation".to_string()))?;

        info!("Enqueued recalculation {} for staff {} ({})", entry.id, staff_id, trigger);
        Ok(entry)
    }

    pub async fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<RecalcQueueEntry>, RecalcError> {
        let path = format!(
            "/rest/v1/slot_recalc_queue?processed=eq.false&order=queued_at.asc&limit={}",
            limit
        );

        let entries: Vec<RecalcQueueEntry> = self.supabase.service_request(
            Method::GET,
            &path,
            None,
        ).await.map_err(|e| RecalcError::DatabaseError(e.to_string()))?;

        debug!("Fetched {} unprocessed queue entries", entries.len());
        Ok(entries)
    }

    /// Entries are retained after processing, so "claiming" is just flipping
    /// the processed flag.
    pub async fn mark_processed(&self, entry_id: Uuid) -> Result<(), RecalcError> {
        let body = json!({
            "processed": true,
            "processed_at": Utc::now().to_rfc3339()
        });

        self.supabase.service_request_with_headers::<Vec<Value>>(
            Method::PATCH,
            &format!("/rest/v1/slot_recalc_queue?id=eq.{}", entry_id),
            Some(body),
            Some(representation_headers()),
        ).await.map_err(|e| RecalcError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    pub async fn pending_count(&self) -> Result<usize, RecalcError> {
        let entries: Vec<Value> = self.supabase.service_request(
            Method::GET,
            "/rest/v1/slot_recalc_queue?processed=eq.false&select=id",
            None,
        ).await.map_err(|e| RecalcError::DatabaseError(e.to_string()))?;

        Ok(entries.len())
    }
}
