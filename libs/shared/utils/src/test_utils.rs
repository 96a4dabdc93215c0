use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub scheduler_api_token: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            scheduler_api_token: "test-scheduler-token".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            scheduler_api_token: self.scheduler_api_token.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "customer".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn staff(email: &str) -> Self {
        Self::new(email, "staff")
    }

    pub fn customer(email: &str) -> Self {
        Self::new(email, "customer")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows for wiremock-backed tests.
pub struct MockSupabaseRows;

impl MockSupabaseRows {
    pub fn available_slot(
        id: Uuid,
        tenant_id: Uuid,
        staff_id: Uuid,
        location_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Value {
        json!({
            "id": id,
            "tenant_id": tenant_id,
            "staff_id": staff_id,
            "location_id": location_id,
            "start_time": start_time.to_rfc3339(),
            "end_time": end_time.to_rfc3339(),
            "is_available": true,
            "reserved_until": null,
            "reserved_by_session": null,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn reserved_slot(
        id: Uuid,
        tenant_id: Uuid,
        staff_id: Uuid,
        location_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        session_id: &str,
        reserved_until: DateTime<Utc>,
    ) -> Value {
        json!({
            "id": id,
            "tenant_id": tenant_id,
            "staff_id": staff_id,
            "location_id": location_id,
            "start_time": start_time.to_rfc3339(),
            "end_time": end_time.to_rfc3339(),
            "is_available": false,
            "reserved_until": reserved_until.to_rfc3339(),
            "reserved_by_session": session_id,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn appointment(
        id: Uuid,
        tenant_id: Uuid,
        staff_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        status: &str,
    ) -> Value {
        json!({
            "id": id,
            "tenant_id": tenant_id,
            "staff_id": staff_id,
            "location_id": Uuid::new_v4(),
            "customer_id": Uuid::new_v4(),
            "start_time": start_time.to_rfc3339(),
            "end_time": end_time.to_rfc3339(),
            "status": status,
            "notes": null,
            "deleted_at": null,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn recalc_queue_entry(
        id: Uuid,
        tenant_id: Uuid,
        staff_id: Uuid,
        trigger: &str,
        queued_at: DateTime<Utc>,
    ) -> Value {
        json!({
            "id": id,
            "tenant_id": tenant_id,
            "staff_id": staff_id,
            "trigger": trigger,
            "queued_at": queued_at.to_rfc3339(),
            "processed": false,
            "processed_at": null
        })
    }

    pub fn working_hours(
        staff_id: Uuid,
        location_id: Uuid,
        day_of_week: i32,
        start_time: &str,
        end_time: &str,
        slot_duration_minutes: i32,
    ) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "staff_id": staff_id,
            "location_id": location_id,
            "day_of_week": day_of_week,
            "start_time": start_time,
            "end_time": end_time,
            "slot_duration_minutes": slot_duration_minutes,
            "is_active": true
        })
    }

    pub fn busy_event(
        staff_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        reason: &str,
    ) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "staff_id": staff_id,
            "start_time": start_time.to_rfc3339(),
            "end_time": end_time.to_rfc3339(),
            "reason": reason
        })
    }

    pub fn cleanup_run(id: Uuid, started_at: DateTime<Utc>) -> Value {
        json!({
            "id": id,
            "started_at": started_at.to_rfc3339(),
            "finished_at": null,
            "released_count": null,
            "error": null
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
        assert!(app_config.is_scheduler_configured());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::staff("staff@example.com");
        assert_eq!(user.email, "staff@example.com");
        assert_eq!(user.role, "staff");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.role, Some(user.role.clone()));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let secret = "test-secret";
        let token = JwtTestUtils::create_test_token(&user, secret, Some(1));

        assert!(token.contains('.'));
        assert_eq!(token.split('.').count(), 3);
    }
}
