//! In-process stand-in for the PostgREST API, served by axum on a random port.

use super::RestBackend;
use crate::config::{KeyRole, RemoteConfig};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Value>,
}

#[derive(Default)]
struct MockState {
    tables: Mutex<HashMap<String, Table>>,
    rpc_available: Mutex<bool>,
    executed_sql: Mutex<Vec<String>>,
    api_keys: Mutex<Vec<String>>,
    failing_inserts: Mutex<Vec<String>>,
}

impl MockState {
    fn record_key(&self, headers: &HeaderMap) {
        let key = headers
            .get("apikey")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.api_keys.lock().unwrap().push(key);
    }
}

pub(crate) struct MockRemote {
    state: Arc<MockState>,
    url: String,
}

fn pg_error(status: StatusCode, code: &str, message: String) -> Response {
    (status, Json(json!({"code": code, "message": message, "details": null, "hint": null})))
        .into_response()
}

async fn select_handler(
    State(state): State<Arc<MockState>>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.record_key(&headers);
    let tables = state.tables.lock().unwrap();
    let Some(t) = tables.get(&table) else {
        return pg_error(
            StatusCode::NOT_FOUND,
            "42P01",
            format!("relation \"public.{}\" does not exist", table),
        );
    };

    let select = params.get("select").map(String::as_str).unwrap_or("*");
    if select != "*" {
        let known = t.columns.iter().any(|c| c == select)
            || t.rows.iter().any(|r| r.get(select).is_some());
        if !known {
            return pg_error(
                StatusCode::BAD_REQUEST,
                "42703",
                format!("column {}.{} does not exist", table, select),
            );
        }
    }

    let total = t.rows.len();
    let range = if total == 0 {
        "*/0".to_string()
    } else {
        format!("0-{}/{}", total - 1, total)
    };
    (
        StatusCode::OK,
        [(header::CONTENT_RANGE, range)],
        Json(Value::Array(t.rows.clone())),
    )
        .into_response()
}

async fn insert_handler(
    State(state): State<Arc<MockState>>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(rows): Json<Vec<Value>>,
) -> Response {
    state.record_key(&headers);
    if state.failing_inserts.lock().unwrap().contains(&table) {
        return pg_error(
            StatusCode::CONFLICT,
            "23505",
            format!("duplicate key value violates unique constraint \"{}_pkey\"", table),
        );
    }

    // Bulk inserts must share one key set
    let key_set = |row: &Value| -> Vec<String> {
        row.as_object().map(|o| o.keys().cloned().collect()).unwrap_or_default()
    };
    if let Some(first) = rows.first() {
        let expected = key_set(first);
        if rows.iter().any(|r| key_set(r) != expected) {
            return pg_error(
                StatusCode::BAD_REQUEST,
                "PGRST102",
                "All object keys must match".to_string(),
            );
        }
    }

    let mut tables = state.tables.lock().unwrap();
    match tables.get_mut(&table) {
        Some(t) => {
            t.rows.extend(rows);
            StatusCode::CREATED.into_response()
        }
        None => pg_error(
            StatusCode::NOT_FOUND,
            "42P01",
            format!("relation \"public.{}\" does not exist", table),
        ),
    }
}

async fn rpc_handler(
    State(state): State<Arc<MockState>>,
    Path(function): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record_key(&headers);
    if !*state.rpc_available.lock().unwrap() {
        return pg_error(
            StatusCode::NOT_FOUND,
            "PGRST202",
            format!("Could not find the function public.{}(sql) in the schema cache", function),
        );
    }

    let sql = body["sql"].as_str().unwrap_or_default().to_string();
    let add_column =
        Regex::new(r"ALTER TABLE (\w+) ADD COLUMN (?:IF NOT EXISTS )?(\w+)").unwrap();
    {
        let mut tables = state.tables.lock().unwrap();
        for caps in add_column.captures_iter(&sql) {
            if let Some(t) = tables.get_mut(&caps[1]) {
                if !t.columns.iter().any(|c| c == &caps[2]) {
                    t.columns.push(caps[2].to_string());
                }
            }
        }
    }
    state.executed_sql.lock().unwrap().push(sql);
    StatusCode::NO_CONTENT.into_response()
}

impl MockRemote {
    pub(crate) async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/rest/v1/rpc/:function", post(rpc_handler))
            .route("/rest/v1/:table", get(select_handler).post(insert_handler))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            url: format!("http://{}/", addr),
        }
    }

    pub(crate) fn backend(&self) -> RestBackend {
        RestBackend::new(&RemoteConfig {
            url: self.url.clone(),
            api_key: "service-key".to_string(),
            key_role: KeyRole::ServiceRole,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    pub(crate) fn create_table(&self, name: &str, columns: Vec<&str>) {
        self.state.tables.lock().unwrap().insert(
            name.to_string(),
            Table {
                columns: columns.into_iter().map(String::from).collect(),
                rows: vec![],
            },
        );
    }

    pub(crate) fn seed_rows(&self, name: &str, rows: Vec<Value>) {
        let mut tables = self.state.tables.lock().unwrap();
        tables.entry(name.to_string()).or_default().rows.extend(rows);
    }

    pub(crate) fn rows(&self, name: &str) -> Vec<Value> {
        self.state
            .tables
            .lock()
            .unwrap()
            .get(name)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub(crate) fn fail_inserts_into(&self, name: &str) {
        self.state.failing_inserts.lock().unwrap().push(name.to_string());
    }

    pub(crate) fn set_rpc_available(&self, available: bool) {
        *self.state.rpc_available.lock().unwrap() = available;
    }

    pub(crate) fn executed_sql(&self) -> Vec<String> {
        self.state.executed_sql.lock().unwrap().clone()
    }

    pub(crate) fn api_keys_seen(&self) -> Vec<String> {
        self.state.api_keys.lock().unwrap().clone()
    }
}
