use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, app_with_prefix, Reading};
use tower::{Service, ServiceExt};

const P: &str = "/api/v1/reading";

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes: bytes::Bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

/// Send one request through a shared router so state persists between calls.
async fn send(app: &mut axum::routing::RouterIntoService<String>, req: Request<String>) -> axum::response::Response {
    ServiceExt::ready(app).await.unwrap().call(req).await.unwrap()
}

async fn seeded() -> axum::routing::RouterIntoService<String> {
    let mut app = app().into_service();
    let readings = [
        r#"{"id":"r1","created":1000,"device":"dev-1","name":"Temperature","uomLabel":"degC","labels":["hvac"],"type":"Float"}"#,
        r#"{"id":"r2","created":2000,"device":"dev-1","name":"Humidity","uomLabel":"%","labels":["hvac","indoor"],"type":"Float"}"#,
        r#"{"id":"r3","created":3000,"device":"dev 2/b","name":"Temperature","uomLabel":"degC","type":"Int"}"#,
        r#"{"id":"r4","created":4000,"device":"dev-1","name":"Temperature","uomLabel":"degC","type":"Float"}"#,
    ];
    for body in readings {
        let resp = send(&mut app, json_request("POST", P, body)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
    app
}

async fn ids(app: &mut axum::routing::RouterIntoService<String>, uri: &str) -> Vec<String> {
    let resp = send(app, get(uri)).await;
    assert_eq!(resp.status(), StatusCode::OK, "{uri}");
    let readings: Vec<Reading> = body_json(resp).await;
    readings.into_iter().map(|r| r.id).collect()
}

// --- list ---

#[tokio::test]
async fn list_readings_empty() {
    let resp = app().oneshot(get(P)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let readings: Vec<Reading> = body_json(resp).await;
    assert!(readings.is_empty());
}

#[tokio::test]
async fn count_is_plain_text() {
    let resp = app().oneshot(get(&format!("{P}/count"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "0");
}

// --- add ---

#[tokio::test]
async fn add_returns_generated_id() {
    let mut app = app().into_service();
    let resp = send(&mut app, json_request("POST", P, r#"{"device":"dev-1","value":"1"}"#)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let id = body_text(resp).await;
    assert_eq!(id.len(), 36);

    let resp = send(&mut app, get(&format!("{P}/{id}"))).await;
    let stored: Reading = body_json(resp).await;
    assert_eq!(stored.id, id);
    assert!(stored.created > 0);
    assert_eq!(stored.rest["value"], "1");
}

#[tokio::test]
async fn add_duplicate_id_conflicts() {
    let mut app = seeded().await;
    let resp = send(&mut app, json_request("POST", P, r#"{"id":"r1"}"#)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn add_accepts_null_fields() {
    let mut app = app().into_service();
    let body = r#"{"id":"n1","device":"dev-1","labels":null,"uomLabel":null,"type":null}"#;
    let resp = send(&mut app, json_request("POST", P, body)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&mut app, get(&format!("{P}/n1"))).await;
    let stored: Reading = body_json(resp).await;
    assert_eq!(stored.device, "dev-1");
    assert!(stored.labels.is_empty());
    assert!(stored.uom_label.is_empty());
}

#[tokio::test]
async fn add_malformed_json_is_rejected() {
    let resp = app()
        .oneshot(json_request("POST", P, r#"{"labels":"not-a-list"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- get ---

#[tokio::test]
async fn get_reading_not_found() {
    let resp = app().oneshot(get(&format!("{P}/missing"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- queries ---

#[tokio::test]
async fn queries_filter_and_limit_in_insertion_order() {
    let mut app = seeded().await;

    assert_eq!(ids(&mut app, P).await, ["r1", "r2", "r3", "r4"]);
    assert_eq!(ids(&mut app, &format!("{P}/device/dev-1/2")).await, ["r1", "r2"]);
    assert_eq!(ids(&mut app, &format!("{P}/device/dev-1/0")).await, Vec::<String>::new());
    assert_eq!(
        ids(&mut app, &format!("{P}/name/Temperature/device/dev-1/10")).await,
        ["r1", "r4"]
    );
    assert_eq!(ids(&mut app, &format!("{P}/name/Temperature/10")).await, ["r1", "r3", "r4"]);
    assert_eq!(ids(&mut app, &format!("{P}/uomlabel/%25/10")).await, ["r2"]);
    assert_eq!(ids(&mut app, &format!("{P}/label/indoor/10")).await, ["r2"]);
    assert_eq!(ids(&mut app, &format!("{P}/type/Int/10")).await, ["r3"]);
    assert_eq!(ids(&mut app, &format!("{P}/1500/3000/10")).await, ["r2", "r3"]);
}

#[tokio::test]
async fn encoded_segments_are_decoded() {
    let mut app = seeded().await;
    assert_eq!(ids(&mut app, &format!("{P}/device/dev%202%2Fb/10")).await, ["r3"]);
}

#[tokio::test]
async fn non_numeric_limit_is_rejected() {
    let resp = app()
        .oneshot(get(&format!("{P}/device/dev-1/many")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- delete ---

#[tokio::test]
async fn delete_reading_not_found() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("{P}/id/missing"))
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_then_get_is_not_found() {
    let mut app = seeded().await;
    let resp = send(
        &mut app,
        Request::builder()
            .method("DELETE")
            .uri(format!("{P}/id/r2"))
            .body(String::new())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&mut app, get(&format!("{P}/r2"))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = send(&mut app, get(&format!("{P}/count"))).await;
    assert_eq!(body_text(resp).await, "3");
}

// --- prefix ---

#[tokio::test]
async fn custom_prefix_is_honored() {
    let app: Router = app_with_prefix("/readings/");
    let resp = app.clone().oneshot(get("/readings/count")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = app.oneshot(get(&format!("{P}/count"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
