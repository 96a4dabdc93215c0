use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseRows, TestConfig};

use recalc_cell::services::busy::BusyIntervalService;

fn service_for(server: &MockServer) -> BusyIntervalService {
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    BusyIntervalService::new(Arc::new(SupabaseClient::new(&config)))
}

#[tokio::test]
async fn merges_appointments_and_busy_events_into_one_cover() {
    let server = MockServer::start().await;
    let staff = Uuid::new_v4();
    let from = Utc::now();
    let to = from + Duration::days(30);
    let base = from + Duration::hours(2);

    let appointment = MockSupabaseRows::appointment(
        Uuid::new_v4(), Uuid::new_v4(), staff,
        base, base + Duration::minutes(30),
        "confirmed",
    );
    // Overlaps the tail of the appointment; the two should merge.
    let event = MockSupabaseRows::busy_event(
        staff,
        base + Duration::minutes(15),
        base + Duration::minutes(60),
        "lunch",
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("staff_id", format!("eq.{}", staff)))
        .and(query_param("status", "neq.cancelled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/staff_busy_events"))
        .and(query_param("staff_id", format!("eq.{}", staff)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([event])))
        .expect(1)
        .mount(&server)
        .await;

    let intervals = service_for(&server).busy_intervals(staff, from, to).await.unwrap();

    assert_eq!(intervals.len(), 1);
    assert_eq!(intervals[0].0, base);
    assert_eq!(intervals[0].1, base + Duration::minutes(60));
}

#[tokio::test]
async fn an_empty_calendar_yields_no_intervals() {
    let server = MockServer::start().await;
    let staff = Uuid::new_v4();
    let from = Utc::now();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/staff_busy_events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let intervals = service_for(&server)
        .busy_intervals(staff, from, from + Duration::days(30))
        .await
        .unwrap();

    assert!(intervals.is_empty());
}
