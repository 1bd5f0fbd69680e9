//! API tests against an in-process router.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestFixture;

#[tokio::test]
async fn test_health_and_config() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");

    let response = fixture.get("/api/v1/config").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["dispatch"]["max_conflict_retries"], 3);
    assert_eq!(response.body["announcement"]["locale"], "pt-BR");
}

#[tokio::test]
async fn test_issue_and_get_ticket() {
    let fixture = TestFixture::new().await;

    let first = fixture.issue("normal").await;
    let second = fixture.issue("normal").await;
    let priority = fixture.issue("priority").await;

    assert_eq!(first["number"], 1);
    assert_eq!(second["number"], 2);
    assert_eq!(priority["number"], 1);
    assert_eq!(first["status"], "waiting");
    assert!(first["called_at"].is_null());

    let id = first["id"].as_str().unwrap();
    let response = fixture.get(&format!("/api/v1/tickets/{}", id)).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["id"], id);

    let response = fixture.get("/api/v1/tickets/does-not-exist").await;
    assert_status!(response, StatusCode::NOT_FOUND);
    assert_eq!(response.body["kind"], "not_found");
}

#[tokio::test]
async fn test_issue_rejects_unknown_class() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post("/api/v1/tickets", json!({ "class": "vip" }))
        .await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_call_next_priority_scenario() {
    let fixture = TestFixture::new().await;
    let p1 = fixture.issue("priority").await;
    let n1 = fixture.issue("normal").await;
    let p2 = fixture.issue("priority").await;

    let preview = fixture.get("/api/v1/queue/next").await;
    assert_eq!(preview.body["next"]["id"], p1["id"]);

    let response = fixture.post_empty("/api/v1/queue/call-next").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["outcome"], "called");
    assert_eq!(response.body["ticket"]["id"], p1["id"]);
    assert!(response.body["previous"].is_null());

    let response = fixture.post_empty("/api/v1/queue/call-next").await;
    assert_eq!(response.body["ticket"]["id"], p2["id"]);
    assert_eq!(response.body["previous"]["id"], p1["id"]);
    assert_eq!(response.body["previous"]["status"], "in_service");

    let response = fixture.post_empty("/api/v1/queue/call-next").await;
    assert_eq!(response.body["ticket"]["id"], n1["id"]);

    let response = fixture.post_empty("/api/v1/queue/call-next").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["outcome"], "queue_empty");

    let called = fixture.get("/api/v1/tickets?status=called").await;
    assert_eq!(called.body["total"], 1);
    assert_eq!(called.body["tickets"][0]["id"], n1["id"]);

    let texts = fixture.wait_for_announcements(3).await;
    assert_eq!(texts[0], "Senha Preferencial 1, compareça ao atendimento");
    assert_eq!(texts[2], "Senha Normal 1, compareça ao atendimento");
}

#[tokio::test]
async fn test_get_queue_does_not_notify_panels() {
    let fixture = TestFixture::new().await;
    let mut updates = fixture.view.subscribe();
    updates.borrow_and_update();
    fixture.issue("normal").await;

    let response = fixture.get("/api/v1/queue").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["tickets"].as_array().unwrap().len(), 1);
    assert!(!updates.has_changed().unwrap());
}

#[tokio::test]
async fn test_queue_snapshot() {
    let fixture = TestFixture::new().await;
    fixture.issue("normal").await;
    let p1 = fixture.issue("priority").await;
    fixture.issue("normal").await;
    fixture.post_empty("/api/v1/queue/call-next").await;

    let response = fixture.get("/api/v1/queue").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["current"]["id"], p1["id"]);
    assert!(response.body["patient"].is_null());
    assert_eq!(response.body["waiting_counts"]["normal"], 2);
    assert_eq!(response.body["waiting_counts"]["priority"], 0);
    assert_eq!(response.body["tickets"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_patient_registration_flow() {
    let fixture = TestFixture::new().await;
    let ticket = fixture.issue("normal").await;
    let id = ticket["id"].as_str().unwrap();
    let path = format!("/api/v1/tickets/{}/patient", id);
    let patient = json!({
        "registration": "2024-0042",
        "name": "Maria Souza",
        "government_id": "123.456.789-00",
        "birth_date": "1980-05-02",
        "phone": "(11) 91234-5678"
    });

    // Still waiting
    let response = fixture.post(&path, patient.clone()).await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["kind"], "invalid_transition");

    fixture.post_empty("/api/v1/queue/call-next").await;

    let response = fixture.post(&path, patient.clone()).await;
    assert_status!(response, StatusCode::CREATED);
    assert_eq!(response.body["ticket_id"], id);

    let response = fixture.post(&path, patient).await;
    assert_status!(response, StatusCode::CONFLICT);

    let response = fixture.get(&path).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["name"], "Maria Souza");

    let response = fixture
        .post(
            "/api/v1/tickets/missing/patient",
            json!({ "name": "Nobody" }),
        )
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);

    let snapshot = fixture.get("/api/v1/queue").await;
    assert_eq!(snapshot.body["patient"]["name"], "Maria Souza");

    let texts = fixture.wait_for_announcements(2).await;
    assert_eq!(texts[1], "Maria Souza, siga a linha vermelha para triagem.");
}

#[tokio::test]
async fn test_complete_and_force_complete() {
    let fixture = TestFixture::new().await;
    let a = fixture.issue("normal").await;
    let b = fixture.issue("normal").await;
    let a_id = a["id"].as_str().unwrap();
    let b_id = b["id"].as_str().unwrap();

    fixture.post_empty("/api/v1/queue/call-next").await;
    let response = fixture
        .post_empty(&format!("/api/v1/tickets/{}/complete", a_id))
        .await;
    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);

    fixture.post_empty("/api/v1/queue/call-next").await;
    let response = fixture
        .post_empty(&format!("/api/v1/tickets/{}/complete", a_id))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "completed");
    assert!(!response.body["completed_at"].is_null());

    let response = fixture
        .post_empty(&format!("/api/v1/tickets/{}/force-complete", b_id))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "completed");

    let response = fixture
        .post_empty("/api/v1/tickets/missing/complete")
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reset_restarts_numbering() {
    let fixture = TestFixture::new().await;
    fixture.issue("normal").await;
    fixture.issue("normal").await;
    fixture.issue("priority").await;
    fixture.post_empty("/api/v1/queue/call-next").await;

    let hint = fixture.get("/api/v1/counters/hint").await;
    assert_eq!(hint.body["normal"], 3);
    assert_eq!(hint.body["priority"], 2);

    let response = fixture.post_empty("/api/v1/queue/reset").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["tickets_closed"], 3);
    assert_eq!(response.body["epoch"], 1);

    let open = fixture.get("/api/v1/tickets?status=waiting").await;
    assert_eq!(open.body["total"], 0);

    let fresh = fixture.issue("normal").await;
    assert_eq!(fresh["number"], 1);
}

#[tokio::test]
async fn test_list_filters() {
    let fixture = TestFixture::new().await;
    fixture.issue("normal").await;
    fixture.issue("priority").await;
    fixture.issue("priority").await;

    let response = fixture.get("/api/v1/tickets?class=priority").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total"], 2);

    let response = fixture.get("/api/v1/tickets").await;
    assert_eq!(response.body["total"], 3);

    let response = fixture.get("/api/v1/tickets?status=bogus").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.issue("normal").await;
    fixture.get("/api/v1/queue").await;

    let response = fixture.get("/api/v1/metrics").await;
    // Body is plain text, not JSON
    assert_status!(response, StatusCode::OK);
}
