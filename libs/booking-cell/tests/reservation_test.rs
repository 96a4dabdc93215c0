use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseRows, TestConfig};

use appointment_cell::services::appointments::AppointmentService;
use booking_cell::models::{ConfirmAppointmentPayload, ConfirmReservationRequest, SlotError};
use booking_cell::services::reservation::ReservationService;
use recalc_cell::services::queue::RecalcQueueService;

fn service_for(server: &MockServer) -> ReservationService {
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    ReservationService::new(Arc::new(SupabaseClient::new(&config)))
}

#[tokio::test]
async fn reserve_holds_an_available_slot() {
    let server = MockServer::start().await;
    let slot_id = Uuid::new_v4();
    let (tenant, staff, location) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let start = Utc::now() + Duration::hours(2);
    let reserved = MockSupabaseRows::reserved_slot(
        slot_id, tenant, staff, location,
        start, start + Duration::minutes(30),
        "session-1", Utc::now() + Duration::minutes(5),
    );

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/availability_slots"))
        .and(query_param("id", format!("eq.{}", slot_id)))
        .and(query_param("is_available", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([reserved])))
        .expect(1)
        .mount(&server)
        .await;

    let slot = service_for(&server)
        .reserve_slot(slot_id, "session-1", None, "user-token")
        .await
        .unwrap();

    assert_eq!(slot.id, slot_id);
    assert!(!slot.is_available);
    assert_eq!(slot.reserved_by_session.as_deref(), Some("session-1"));
}

#[tokio::test]
async fn reserve_conflicts_when_slot_already_taken() {
    let server = MockServer::start().await;
    let slot_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    // The existence probe still finds the row, so this is a conflict.
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .and(query_param("id", format!("eq.{}", slot_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": slot_id }])))
        .mount(&server)
        .await;

    let result = service_for(&server)
        .reserve_slot(slot_id, "session-1", None, "user-token")
        .await;

    assert_matches!(result, Err(SlotError::Conflict(_)));
}

#[tokio::test]
async fn reserve_reports_missing_slot_as_not_found() {
    let server = MockServer::start().await;
    let slot_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = service_for(&server)
        .reserve_slot(slot_id, "session-1", None, "user-token")
        .await;

    assert_matches!(result, Err(SlotError::NotFound));
}

#[tokio::test]
async fn reserve_validates_hold_duration_and_session() {
    let server = MockServer::start().await;
    let service = service_for(&server);
    let slot_id = Uuid::new_v4();

    let too_long = service.reserve_slot(slot_id, "session-1", Some(45), "t").await;
    assert_matches!(too_long, Err(SlotError::ValidationError(_)));

    let too_short = service.reserve_slot(slot_id, "session-1", Some(0), "t").await;
    assert_matches!(too_short, Err(SlotError::ValidationError(_)));

    let no_session = service.reserve_slot(slot_id, "  ", None, "t").await;
    assert_matches!(no_session, Err(SlotError::ValidationError(_)));
}

#[tokio::test]
async fn release_is_idempotent_when_nothing_is_held() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let released = service_for(&server)
        .release_reservation(Uuid::new_v4(), "session-1", "user-token")
        .await
        .unwrap();

    assert_eq!(released, 0);
}

#[tokio::test]
async fn release_also_frees_overlapping_holds_by_the_same_session() {
    let server = MockServer::start().await;
    let primary_id = Uuid::new_v4();
    let overlapping_id = Uuid::new_v4();
    let (tenant, staff, location) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let start = Utc::now() + Duration::hours(2);
    let until = Utc::now() + Duration::minutes(5);

    let primary = MockSupabaseRows::reserved_slot(
        primary_id, tenant, staff, location,
        start, start + Duration::minutes(30), "session-1", until,
    );
    let overlapping = MockSupabaseRows::reserved_slot(
        overlapping_id, tenant, staff, location,
        start + Duration::minutes(15), start + Duration::minutes(45), "session-1", until,
    );

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/availability_slots"))
        .and(query_param("id", format!("eq.{}", primary_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([primary])))
        .expect(1)
        .mount(&server)
        .await;
    // Both the overlap search and the secondary release must stay scoped to
    // the releasing session.
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .and(query_param("staff_id", format!("eq.{}", staff)))
        .and(query_param("reserved_by_session", "eq.session-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([overlapping])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/availability_slots"))
        .and(query_param("id", format!("eq.{}", overlapping_id)))
        .and(query_param("reserved_by_session", "eq.session-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": overlapping_id }])))
        .expect(1)
        .mount(&server)
        .await;

    let released = service_for(&server)
        .release_reservation(primary_id, "session-1", "user-token")
        .await
        .unwrap();

    assert_eq!(released, 2);
}

#[tokio::test]
async fn release_leaves_other_sessions_overlapping_holds_alone() {
    let server = MockServer::start().await;
    let primary_id = Uuid::new_v4();
    let other_sessions_slot = Uuid::new_v4();
    let (tenant, staff, location) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let start = Utc::now() + Duration::hours(2);

    let primary = MockSupabaseRows::reserved_slot(
        primary_id, tenant, staff, location,
        start, start + Duration::minutes(30), "session-1",
        Utc::now() + Duration::minutes(5),
    );

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/availability_slots"))
        .and(query_param("id", format!("eq.{}", primary_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([primary])))
        .expect(1)
        .mount(&server)
        .await;
    // Another session holds an overlapping slot; the session-scoped search
    // must not see it. The mock insists on the session filter being present.
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .and(query_param("staff_id", format!("eq.{}", staff)))
        .and(query_param("reserved_by_session", "eq.session-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/availability_slots"))
        .and(query_param("id", format!("eq.{}", other_sessions_slot)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let released = service_for(&server)
        .release_reservation(primary_id, "session-1", "user-token")
        .await
        .unwrap();

    assert_eq!(released, 1);
}

#[tokio::test]
async fn release_survives_overlap_cleanup_failure() {
    let server = MockServer::start().await;
    let primary_id = Uuid::new_v4();
    let (tenant, staff, location) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let start = Utc::now() + Duration::hours(2);

    let primary = MockSupabaseRows::reserved_slot(
        primary_id, tenant, staff, location,
        start, start + Duration::minutes(30), "session-1",
        Utc::now() + Duration::minutes(5),
    );

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([primary])))
        .mount(&server)
        .await;
    // The overlap search blows up; the primary release still counts.
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let released = service_for(&server)
        .release_reservation(primary_id, "session-1", "user-token")
        .await
        .unwrap();

    assert_eq!(released, 1);
}

fn confirm_request(slot_id: Uuid) -> ConfirmReservationRequest {
    ConfirmReservationRequest {
        slot_id,
        session_id: "session-1".to_string(),
        appointment: ConfirmAppointmentPayload {
            customer_id: Uuid::new_v4(),
            notes: None,
        },
    }
}

async fn confirm_against(
    server: &MockServer,
    request: &ConfirmReservationRequest,
) -> Result<appointment_cell::models::Appointment, SlotError> {
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    let supabase = Arc::new(SupabaseClient::new(&config));
    let service = ReservationService::new(supabase.clone());
    let appointments = AppointmentService::new(supabase.clone());
    let queue = RecalcQueueService::new(supabase);

    service.confirm_reservation(request, &appointments, &queue).await
}

#[tokio::test]
async fn confirm_creates_appointment_and_retires_the_slot() {
    let server = MockServer::start().await;
    let slot_id = Uuid::new_v4();
    let (tenant, staff, location) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let start = Utc::now() + Duration::hours(2);
    let end = start + Duration::minutes(30);

    let held = MockSupabaseRows::reserved_slot(
        slot_id, tenant, staff, location, start, end,
        "session-1", Utc::now() + Duration::minutes(5),
    );
    let appointment = MockSupabaseRows::appointment(
        Uuid::new_v4(), tenant, staff, start, end, "confirmed",
    );
    let queue_entry = MockSupabaseRows::recalc_queue_entry(
        Uuid::new_v4(), tenant, staff, "appointment_created", Utc::now(),
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([held])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([appointment])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/availability_slots"))
        .and(query_param("id", format!("eq.{}", slot_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([held])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/slot_recalc_queue"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([queue_entry])))
        .expect(1)
        .mount(&server)
        .await;

    let appointment = confirm_against(&server, &confirm_request(slot_id)).await.unwrap();

    assert_eq!(appointment.staff_id, staff);
    assert_eq!(appointment.start_time, start);
}

#[tokio::test]
async fn confirm_rejects_a_different_session() {
    let server = MockServer::start().await;
    let slot_id = Uuid::new_v4();
    let start = Utc::now() + Duration::hours(2);

    let held = MockSupabaseRows::reserved_slot(
        slot_id, Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(),
        start, start + Duration::minutes(30),
        "someone-else", Utc::now() + Duration::minutes(5),
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([held])))
        .mount(&server)
        .await;

    let result = confirm_against(&server, &confirm_request(slot_id)).await;
    assert_matches!(result, Err(SlotError::Unauthorized(_)));
}

#[tokio::test]
async fn confirm_rejects_an_expired_hold() {
    let server = MockServer::start().await;
    let slot_id = Uuid::new_v4();
    let start = Utc::now() + Duration::hours(2);

    let held = MockSupabaseRows::reserved_slot(
        slot_id, Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(),
        start, start + Duration::minutes(30),
        "session-1", Utc::now() - Duration::minutes(1),
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([held])))
        .mount(&server)
        .await;

    let result = confirm_against(&server, &confirm_request(slot_id)).await;
    assert_matches!(result, Err(SlotError::Conflict(_)));
}

#[tokio::test]
async fn confirm_rejects_a_slot_that_is_not_held() {
    let server = MockServer::start().await;
    let slot_id = Uuid::new_v4();
    let start = Utc::now() + Duration::hours(2);

    let open = MockSupabaseRows::available_slot(
        slot_id, Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(),
        start, start + Duration::minutes(30),
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([open])))
        .mount(&server)
        .await;

    let result = confirm_against(&server, &confirm_request(slot_id)).await;
    assert_matches!(result, Err(SlotError::Conflict(_)));
}

#[tokio::test]
async fn confirm_reports_missing_slot_as_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = confirm_against(&server, &confirm_request(Uuid::new_v4())).await;
    assert_matches!(result, Err(SlotError::NotFound));
}
