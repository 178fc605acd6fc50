use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::{
    admin, build_service, complete_edits, reviewer, subject, submitted_assessment,
};
use crate::workflows::appraisal::domain::{LayerEdits, Role};
use crate::workflows::appraisal::router::appraisal_router;
use crate::workflows::appraisal::service::OpenAssessment;

async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

#[tokio::test]
async fn submit_endpoint_names_the_missing_kpis() {
    let (service, _, _, _) = build_service();
    let actor = subject();
    let opened = service
        .open(
            &actor,
            OpenAssessment {
                period: "2026-H1".to_string(),
                template_id: None,
            },
        )
        .expect("draft opens");
    let mut edits = complete_edits(3);
    edits.evidence.remove("ip-2");
    service
        .save_self(&opened.id, &actor, edits)
        .expect("self layer saves");

    let app = appraisal_router(service);
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/appraisal/assessments/{}/submit", opened.id.0),
            json!({ "actor": actor }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["layer"], "self");
    assert_eq!(body["missing_kpis"], json!(["ip-2"]));
}

#[tokio::test]
async fn advance_by_the_wrong_role_returns_forbidden() {
    let (service, _, _, _) = build_service();
    let assessment = submitted_assessment(&service);

    let app = appraisal_router(service);
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/appraisal/assessments/{}/advance", assessment.id.0),
            json!({ "actor": reviewer(Role::Director), "edits": complete_edits(3) }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn release_all_endpoint_reports_the_count() {
    let (service, _, _, _) = build_service();
    let assessment = submitted_assessment(&service);
    service
        .advance(&assessment.id, &reviewer(Role::Supervisor), complete_edits(3))
        .expect("supervisor review succeeds");
    service
        .advance(&assessment.id, &reviewer(Role::Manager), complete_edits(3))
        .expect("manager review succeeds");
    service
        .advance(&assessment.id, &admin(), LayerEdits::default())
        .expect("admin approval succeeds");

    let app = appraisal_router(service);
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/appraisal/assessments/release-all",
            json!({ "actor": admin() }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["released_count"], 1);
}

#[tokio::test]
async fn workflow_endpoint_lists_ordered_steps() {
    let (service, _, _, _) = build_service();

    let app = appraisal_router(service);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/appraisal/workflows/dr-ops-staff")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    let steps = body.as_array().expect("step array");
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[0]["step_order"], 1);
    assert_eq!(steps[0]["approver_role"], "supervisor");
    assert_eq!(steps[3]["kind"], "acknowledge");
}

#[tokio::test]
async fn open_and_fetch_roundtrip() {
    let (service, _, _, _) = build_service();

    let app = appraisal_router(service);
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/appraisal/assessments",
            json!({ "actor": subject(), "period": "2026-H2" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json_body(response).await;
    assert_eq!(created["status"], "draft");
    let id = created["id"].as_str().expect("id present").to_string();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/appraisal/assessments/{id}"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = read_json_body(response).await;
    assert_eq!(fetched["subject_id"], "u-subject");
    assert_eq!(fetched["current_step_index"], 0);
}
