//! In-memory stand-in for the core-data readings service.
//!
//! Serves the readings HTTP surface under a path prefix from an
//! insertion-ordered store. Counts and new ids are answered as plain text,
//! everything else as JSON.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_PREFIX: &str = "/api/v1/reading";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_zero")]
    pub created: i64,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub device: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub uom_label: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub reading_type: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

pub type Db = Arc<RwLock<Vec<Reading>>>;

type Failure = (StatusCode, String);

pub fn app() -> Router {
    app_with_prefix(DEFAULT_PREFIX)
}

pub fn app_with_prefix(prefix: &str) -> Router {
    let db: Db = Arc::new(RwLock::new(Vec::new()));
    let p = prefix.trim_end_matches('/');
    Router::new()
        .route(p, get(list_readings).post(add_reading))
        .route(&format!("{p}/count"), get(count_readings))
        .route(&format!("{p}/{{id}}"), get(get_reading))
        .route(&format!("{p}/id/{{id}}"), delete(delete_reading))
        .route(&format!("{p}/device/{{device}}/{{limit}}"), get(by_device))
        .route(
            &format!("{p}/name/{{name}}/device/{{device}}/{{limit}}"),
            get(by_name_and_device),
        )
        .route(&format!("{p}/name/{{name}}/{{limit}}"), get(by_name))
        .route(&format!("{p}/uomlabel/{{label}}/{{limit}}"), get(by_uom_label))
        .route(&format!("{p}/label/{{label}}/{{limit}}"), get(by_label))
        .route(&format!("{p}/type/{{type}}/{{limit}}"), get(by_type))
        .route(&format!("{p}/{{id}}/{{end}}/{{limit}}"), get(by_interval))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn select<F>(db: &Db, limit: Option<u32>, keep: F) -> Json<Vec<Reading>>
where
    F: Fn(&Reading) -> bool,
{
    let readings = db.read().await;
    let limit = limit.map_or(usize::MAX, |l| l as usize);
    let found: Vec<Reading> = readings
        .iter()
        .filter(|r| keep(r))
        .take(limit)
        .cloned()
        .collect();
    debug!(matched = found.len(), "listing readings");
    Json(found)
}

async fn list_readings(State(db): State<Db>) -> Json<Vec<Reading>> {
    select(&db, None, |_| true).await
}

async fn count_readings(State(db): State<Db>) -> String {
    db.read().await.len().to_string()
}

async fn add_reading(
    State(db): State<Db>,
    Json(mut reading): Json<Reading>,
) -> Result<String, Failure> {
    let mut readings = db.write().await;
    if reading.id.is_empty() {
        reading.id = Uuid::new_v4().to_string();
    } else if readings.iter().any(|r| r.id == reading.id) {
        return Err((
            StatusCode::CONFLICT,
            format!("reading {} already exists", reading.id),
        ));
    }
    if reading.created == 0 {
        reading.created = now_millis();
    }
    info!(id = %reading.id, device = %reading.device, "added reading");
    let id = reading.id.clone();
    readings.push(reading);
    Ok(id)
}

async fn get_reading(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<Reading>, Failure> {
    let readings = db.read().await;
    readings
        .iter()
        .find(|r| r.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

async fn delete_reading(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<&'static str, Failure> {
    let mut readings = db.write().await;
    let index = readings
        .iter()
        .position(|r| r.id == id)
        .ok_or_else(|| not_found(&id))?;
    readings.remove(index);
    info!(%id, "deleted reading");
    Ok("true")
}

async fn by_device(
    State(db): State<Db>,
    Path((device, limit)): Path<(String, u32)>,
) -> Json<Vec<Reading>> {
    select(&db, Some(limit), |r| r.device == device).await
}

async fn by_name_and_device(
    State(db): State<Db>,
    Path((name, device, limit)): Path<(String, String, u32)>,
) -> Json<Vec<Reading>> {
    select(&db, Some(limit), |r| r.name == name && r.device == device).await
}

async fn by_name(
    State(db): State<Db>,
    Path((name, limit)): Path<(String, u32)>,
) -> Json<Vec<Reading>> {
    select(&db, Some(limit), |r| r.name == name).await
}

async fn by_uom_label(
    State(db): State<Db>,
    Path((label, limit)): Path<(String, u32)>,
) -> Json<Vec<Reading>> {
    select(&db, Some(limit), |r| r.uom_label == label).await
}

async fn by_label(
    State(db): State<Db>,
    Path((label, limit)): Path<(String, u32)>,
) -> Json<Vec<Reading>> {
    select(&db, Some(limit), |r| r.labels.contains(&label)).await
}

async fn by_type(
    State(db): State<Db>,
    Path((reading_type, limit)): Path<(String, u32)>,
) -> Json<Vec<Reading>> {
    select(&db, Some(limit), |r| r.reading_type == reading_type).await
}

async fn by_interval(
    State(db): State<Db>,
    Path((start, end, limit)): Path<(i64, i64, u32)>,
) -> Json<Vec<Reading>> {
    select(&db, Some(limit), |r| r.created >= start && r.created <= end).await
}

fn not_found(id: &str) -> Failure {
    (StatusCode::NOT_FOUND, format!("reading {id} not found"))
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
