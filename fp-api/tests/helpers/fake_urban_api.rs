//! In-process fake of the Urban API
//!
//! Serves the endpoints the client uses on an ephemeral local port, with
//! configurable responses, call counters and an artificial delay.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;

pub const LIVING_TYPE_ID: i64 = 4;

#[derive(Clone)]
struct FakeState {
    ping: Arc<Mutex<(StatusCode, Value)>>,
    types: Arc<Mutex<(StatusCode, Value)>>,
    geometries: Arc<Mutex<(StatusCode, Value)>>,
    delay: Arc<Mutex<Duration>>,
    type_lookups: Arc<AtomicUsize>,
    geometry_requests: Arc<AtomicUsize>,
    last_authorization: Arc<Mutex<Option<String>>>,
    last_geometry_query: Arc<Mutex<HashMap<String, String>>>,
    last_scenario_id: Arc<Mutex<Option<String>>>,
}

impl FakeState {
    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

async fn ping(State(state): State<FakeState>) -> (StatusCode, Json<Value>) {
    state.pause().await;
    let (status, body) = state.ping.lock().unwrap().clone();
    (status, Json(body))
}

async fn openapi() -> Json<Value> {
    Json(json!({ "openapi": "3.1.0", "info": { "title": "Urban API", "version": "1.2.3" } }))
}

async fn physical_object_types(State(state): State<FakeState>) -> (StatusCode, Json<Value>) {
    state.type_lookups.fetch_add(1, Ordering::SeqCst);
    state.pause().await;
    let (status, body) = state.types.lock().unwrap().clone();
    (status, Json(body))
}

async fn scenario_geometries(
    State(state): State<FakeState>,
    Path(scenario_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.geometry_requests.fetch_add(1, Ordering::SeqCst);
    *state.last_authorization.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *state.last_geometry_query.lock().unwrap() = query;
    *state.last_scenario_id.lock().unwrap() = Some(scenario_id);

    state.pause().await;
    let (status, body) = state.geometries.lock().unwrap().clone();
    (status, Json(body))
}

/// Running fake server; aborted on drop
pub struct FakeUrbanApi {
    pub addr: SocketAddr,
    state: FakeState,
    handle: JoinHandle<()>,
}

impl FakeUrbanApi {
    /// Start with healthy defaults: ping answers, one living type, empty scenario
    pub async fn start() -> Self {
        let state = FakeState {
            ping: Arc::new(Mutex::new((StatusCode::OK, json!({ "message": "Pong!" })))),
            types: Arc::new(Mutex::new((StatusCode::OK, living_type_list(LIVING_TYPE_ID)))),
            geometries: Arc::new(Mutex::new((StatusCode::OK, feature_collection(Vec::new())))),
            delay: Arc::new(Mutex::new(Duration::ZERO)),
            type_lookups: Arc::new(AtomicUsize::new(0)),
            geometry_requests: Arc::new(AtomicUsize::new(0)),
            last_authorization: Arc::new(Mutex::new(None)),
            last_geometry_query: Arc::new(Mutex::new(HashMap::new())),
            last_scenario_id: Arc::new(Mutex::new(None)),
        };

        let app = Router::new()
            .route("/health_check/ping", get(ping))
            .route("/api/openapi", get(openapi))
            .route("/api/v1/physical_object_types", get(physical_object_types))
            .route(
                "/api/v1/scenarios/:scenario_id/physical_objects_with_geometry",
                get(scenario_geometries),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state, handle }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_ping_response(&self, status: StatusCode, body: Value) {
        *self.state.ping.lock().unwrap() = (status, body);
    }

    pub fn set_types_response(&self, status: StatusCode, body: Value) {
        *self.state.types.lock().unwrap() = (status, body);
    }

    pub fn set_geometry_response(&self, status: StatusCode, body: Value) {
        *self.state.geometries.lock().unwrap() = (status, body);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = delay;
    }

    pub fn type_lookups(&self) -> usize {
        self.state.type_lookups.load(Ordering::SeqCst)
    }

    pub fn geometry_requests(&self) -> usize {
        self.state.geometry_requests.load(Ordering::SeqCst)
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.state.last_authorization.lock().unwrap().clone()
    }

    pub fn last_geometry_query(&self) -> HashMap<String, String> {
        self.state.last_geometry_query.lock().unwrap().clone()
    }

    pub fn last_scenario_id(&self) -> Option<String> {
        self.state.last_scenario_id.lock().unwrap().clone()
    }
}

impl Drop for FakeUrbanApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Server answering every request with `404` whose body is cut short
///
/// Headers promise more bytes than are sent before the connection closes,
/// so reading the body fails after the status is known.
pub async fn truncated_body_server() -> (String, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let _ = socket
                .write_all(
                    b"HTTP/1.1 404 Not Found\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{\"detail\"",
                )
                .await;
            let _ = socket.shutdown().await;
        }
    });
    (format!("http://{}", addr), handle)
}

/// Address nothing listens on
pub async fn refused_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn living_type_list(type_id: i64) -> Value {
    json!([{ "physical_object_type_id": type_id, "name": "жилой дом" }])
}

/// Building feature as the geometry query returns it
pub fn building_feature(id: u64, floors: Option<u32>, lon: f64, lat: f64, is_scenario: bool) -> Value {
    let d = 0.0001;
    json!({
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [lon, lat], [lon, lat + d], [lon + d, lat + d], [lon + d, lat], [lon, lat]
            ]],
        },
        "properties": {
            "physical_object_id": id * 10,
            "is_scenario_physical_object": is_scenario,
            "building": { "id": id, "floors": floors },
        },
    })
}

pub fn feature_collection(features: Vec<Value>) -> Value {
    json!({ "type": "FeatureCollection", "features": features })
}
