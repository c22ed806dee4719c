use actix_web::{http::StatusCode, test, App};
use serde_json::{json, Value};

use mix_scheduler_admission_webhook::views;
use mix_scheduler_admission_webhook::{ON_DEMAND, SPOT};

mod helpers;

#[actix_rt::test]
async fn test_view_health() {
    let req = test::TestRequest::default().to_http_request();
    let resp = views::health(req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_ready_reports_unsynced_cache() {
    let app = test::init_service(App::new().app_data(helpers::app_state(vec![], vec![])).configure(views::routes)).await;

    let req = test::TestRequest::get().uri("/ready").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"synced": false}));
}

#[actix_rt::test]
async fn test_mutate_deployment_returns_patch() {
    let app = test::init_service(App::new().app_data(helpers::app_state(vec![], vec![])).configure(views::routes)).await;

    let req = test::TestRequest::post()
        .uri("/mutate")
        .set_json(helpers::review_body("CREATE", "Deployment", Some(helpers::deployment_json("web")), None))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["apiVersion"], json!("admission.k8s.io/v1"));
    assert_eq!(body["response"]["uid"], json!(helpers::UID));
    assert_eq!(body["response"]["allowed"], json!(true));
    assert!(!body["response"]["patch"].is_null());
}

#[actix_rt::test]
async fn test_mutate_unknown_kind_allows_without_patch() {
    let app = test::init_service(App::new().app_data(helpers::app_state(vec![], vec![])).configure(views::routes)).await;

    let widget = json!({"apiVersion": "example.com/v1", "kind": "Widget", "metadata": {"name": "w"}});
    let req = test::TestRequest::post()
        .uri("/mutate")
        .set_json(helpers::review_body("CREATE", "Widget", Some(widget), None))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["response"]["allowed"], json!(true));
    assert!(body["response"].get("patch").map_or(true, Value::is_null));
}

#[actix_rt::test]
async fn test_mutate_rejects_garbage() {
    let app = test::init_service(App::new().app_data(helpers::app_state(vec![], vec![])).configure(views::routes)).await;

    let req = test::TestRequest::post()
        .uri("/mutate")
        .set_payload("this is not an admission review")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["err"].is_string());
}

#[actix_rt::test]
async fn test_mutate_vetoes_last_on_demand_pod_delete() {
    let state = helpers::app_state(
        vec![helpers::node("od-1", Some(ON_DEMAND)), helpers::node("spot-1", Some(SPOT))],
        vec![serde_json::from_value(helpers::pod_json("web-1", "web", "od-1", true)).unwrap()],
    );
    let app = test::init_service(App::new().app_data(state).configure(views::routes)).await;

    let req = test::TestRequest::post()
        .uri("/mutate")
        .set_json(helpers::review_body(
            "DELETE",
            "Pod",
            None,
            Some(helpers::pod_json("web-1", "web", "od-1", true)),
        ))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["response"]["allowed"], json!(false));
    let message = body["response"]["status"]["message"].as_str().unwrap_or_default();
    assert!(message.contains("default/web-1"), "unexpected message: {}", message);
}
