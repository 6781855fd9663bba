use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use dataset_auditor::{config::Config, routes, AppState};

const ORDERS_CSV: &str = "OrderID,Age,Name,Price,IsReturned\n\
O1,25,Al,10.5,0\n\
O2,,Bo,20.0,1\n\
O3,25,Al,,0\n\
O4,30,Cy,40.25,0\n";

async fn fake_llm(status: StatusCode) -> String {
    let app = Router::new().route(
        "/api/generate",
        post(move |Json(body): Json<Value>| async move {
            let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
            if status.is_success() {
                let verdict = if prompt.contains("**Name** (text)") {
                    "Name looks like PII."
                } else {
                    "Nothing to report."
                };
                (status, Json(json!({ "response": verdict })))
            } else {
                (status, Json(json!({ "error": "model is loading" })))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api/generate", addr)
}

async fn app_with_llm(status: StatusCode) -> Router {
    let config = Config {
        llm_url: fake_llm(status).await,
        session_capacity: 8,
        ..Config::default()
    };
    routes::app(Arc::new(AppState::new(config).unwrap()))
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn text_body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn upload(filename: &str, body: &str) -> Request<Body> {
    Request::post(format!("/datasets?filename={}", filename))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: String) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn upload_orders(app: &Router) -> Value {
    let response = send(app, upload("orders.csv", ORDERS_CSV)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

#[tokio::test]
async fn health() {
    let app = app_with_llm(StatusCode::OK).await;
    let response = send(&app, get("/health".to_string())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, "OK");
}

#[tokio::test]
async fn upload_returns_profile_report_and_charts() {
    let app = app_with_llm(StatusCode::OK).await;
    let body = upload_orders(&app).await;

    assert_eq!(body["filename"], "orders.csv");
    assert_eq!(body["profile"]["row_count"], 4);
    assert_eq!(body["profile"]["column_count"], 5);
    assert_eq!(body["profile"]["total_missing"], 2);

    let age = &body["profile"]["columns"][1];
    assert_eq!(age["name"], "Age");
    assert_eq!(age["declared_type"], "numeric");
    assert_eq!(age["missing_count"], 1);
    assert_eq!(age["distinct_count"], 2);
    assert_eq!(age["sample_values"], json!([25, 30]));

    let name = &body["profile"]["columns"][2];
    assert_eq!(name["sample_values"], json!(["Al", "Bo", "Cy"]));

    let report = body["report"].as_str().unwrap();
    assert!(report.contains("- Rows: 4\n"));
    assert!(report.contains("• **Name** (text)"));
    assert!(report.contains("Example Values: ['Al', 'Bo', 'Cy']"));

    assert_eq!(body["preview"]["columns"][0], "OrderID");
    assert_eq!(body["preview"]["rows"].as_array().unwrap().len(), 4);

    let charts = &body["charts"];
    assert_eq!(
        charts["missing_by_column"],
        json!([{"column": "Age", "count": 1}, {"column": "Price", "count": 1}])
    );
    assert_eq!(
        charts["class_balance"]["counts"],
        json!([{"value": 0, "count": 3}, {"value": 1, "count": 1}])
    );
    assert_eq!(charts["numeric_columns"], json!(["Age", "Price", "IsReturned"]));
    assert!(charts["missing_mask"]["rows"].is_array());
    assert_eq!(charts["high_cardinality"], json!([]));
}

#[tokio::test]
async fn session_can_be_fetched_again() {
    let app = app_with_llm(StatusCode::OK).await;
    let uploaded = upload_orders(&app).await;
    let id = uploaded["session_id"].as_str().unwrap();

    let response = send(&app, get(format!("/datasets/{}", id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = json_body(response).await;
    assert_eq!(fetched["report"], uploaded["report"]);
}

#[tokio::test]
async fn report_download_is_markdown_attachment() {
    let app = app_with_llm(StatusCode::OK).await;
    let uploaded = upload_orders(&app).await;
    let id = uploaded["session_id"].as_str().unwrap();

    let response = send(&app, get(format!("/datasets/{}/report", id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"dataset_summary.md\""
    );
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/markdown"));
    assert_eq!(text_body(response).await, uploaded["report"].as_str().unwrap());
}

#[tokio::test]
async fn histogram_for_numeric_column() {
    let app = app_with_llm(StatusCode::OK).await;
    let uploaded = upload_orders(&app).await;
    let id = uploaded["session_id"].as_str().unwrap();

    let response = send(&app, get(format!("/datasets/{}/histogram?column=Age&bins=5", id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let hist = json_body(response).await;
    assert_eq!(hist["counts"].as_array().unwrap().len(), 5);
    assert_eq!(hist["counts"], json!([2, 0, 0, 0, 1]));

    let response = send(&app, get(format!("/datasets/{}/histogram?column=Name", id))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let huge = format!("/datasets/{}/histogram?column=Age&bins={}", id, usize::MAX / 16);
    let response = send(&app, get(huge)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = app_with_llm(StatusCode::OK).await;
    for uri in ["/datasets/00000000000000ff", "/datasets/zzz/report"] {
        let response = send(&app, get(uri.to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn unsupported_and_malformed_uploads_are_rejected() {
    let app = app_with_llm(StatusCode::OK).await;

    let response = send(&app, upload("book.xlsx", "PK")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, upload("scalars.json", "[1, 2, 3]")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().starts_with("Invalid dataset"));

    let response = send(&app, upload("broken.json", "{\"a\": [1,")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn json_records_upload() {
    let app = app_with_llm(StatusCode::OK).await;
    let doc = r#"[{"Age": 25, "Name": "Al"}, {"Age": null, "Name": "Bo"},
                  {"Age": 25, "Name": "Al"}, {"Age": 30, "Name": "Cy"}]"#;
    let response = send(&app, upload("people.json", doc)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["profile"]["total_missing"], 1);
    assert_eq!(body["profile"]["columns"][0]["sample_values"], json!([25, 30]));
}

#[tokio::test]
async fn risk_analysis_round_trip() {
    let app = app_with_llm(StatusCode::OK).await;
    let uploaded = upload_orders(&app).await;
    let id = uploaded["session_id"].as_str().unwrap();

    let response = send(&app, get(format!("/datasets/{}/risk-analysis", id))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let request = Request::post(format!("/datasets/{}/risk-analysis", id))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["analysis"], "Name looks like PII.");
    assert_eq!(body["model"], "llama2");

    let response = send(&app, get(format!("/datasets/{}/risk-analysis", id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"llm_risk_analysis.md\""
    );
    assert_eq!(text_body(response).await, "Name looks like PII.");
}

#[tokio::test]
async fn llm_failure_is_unavailable_and_keeps_session() {
    let app = app_with_llm(StatusCode::INTERNAL_SERVER_ERROR).await;
    let uploaded = upload_orders(&app).await;
    let id = uploaded["session_id"].as_str().unwrap();

    let request = Request::post(format!("/datasets/{}/risk-analysis", id))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("model is loading"));

    let response = send(&app, get(format!("/datasets/{}", id))).await;
    assert_eq!(response.status(), StatusCode::OK);
}
