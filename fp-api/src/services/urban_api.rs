//! Urban API HTTP client
//!
//! Owns one reusable HTTP session to the territory data service and a cache
//! of physical object type identifiers. One client is shared by every
//! request in the process.
//!
//! Session lifecycle: unstarted → started → closed. A call made while no
//! open session exists transparently creates a new one. `close()` only
//! drops the client's handle; requests already in flight hold their own
//! reference and finish normally.
//!
//! Two timeout budgets apply: a short one for the liveness probe and a long
//! one for everything else. Either one expiring is reported as
//! [`ServiceError::UpstreamUnavailable`] with [`UnavailableKind::Timeout`](crate::error::UnavailableKind::Timeout).
//! There are no retries here.

use async_trait::async_trait;
use fp_common::config::UrbanApiConfig;
use reqwest::{Method, StatusCode, Url};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::{ServiceError, ServiceResult, URBAN_API_SERVICE};
use crate::models::raw::RawFeatureCollection;
use crate::models::{Crs, RawBuildingCollection, ScenarioId};

/// Physical object type of living buildings in the Urban API taxonomy
pub const LIVING_BUILDING_TYPE: &str = "жилой дом";

const PING_PATH: &str = "health_check/ping";
const OPENAPI_PATH: &str = "api/openapi";
const OBJECT_TYPES_PATH: &str = "api/v1/physical_object_types";

/// Operations the prediction pipeline needs from the territory data service
#[async_trait]
pub trait UrbanApi: Send + Sync {
    /// Lightweight probe; never fails, only reports
    async fn is_alive(&self) -> bool;

    /// Upstream API version string
    async fn get_version(&self) -> ServiceResult<String>;

    /// Resolve a physical object type name to its identifier (cached)
    async fn get_physical_object_type_id_by_name(&self, name: &str) -> ServiceResult<i64>;

    /// Living buildings of a scenario, as raw GeoJSON features in EPSG:4326
    async fn get_scenario_living_buildings(
        &self,
        scenario_id: ScenarioId,
        token: &str,
    ) -> ServiceResult<RawBuildingCollection>;
}

/// Live connection pool to the Urban API
struct Session {
    client: reqwest::Client,
    closed: AtomicBool,
}

impl Session {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[derive(Default)]
struct RequestOptions<'a> {
    query: Vec<(&'a str, String)>,
    bearer: Option<&'a str>,
}

/// Urban API client that uses HTTP/HTTPS as transport
pub struct HttpUrbanApiClient {
    base_url: Url,
    ping_timeout: Duration,
    operation_timeout: Duration,
    session: RwLock<Option<Arc<Session>>>,
    types_cache: Mutex<HashMap<String, i64>>,
}

/// Add a scheme if missing and make sure the host ends with `/`
fn normalize_host(host: &str) -> String {
    let trimmed = host.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        format!("{}/", trimmed)
    } else {
        warn!(host = %trimmed, "http/https scheme is not set, defaulting to http");
        format!("http://{}/", trimmed)
    }
}

impl HttpUrbanApiClient {
    /// Create an unstarted client
    pub fn new(
        host: &str,
        ping_timeout: Duration,
        operation_timeout: Duration,
    ) -> fp_common::Result<Self> {
        let normalized = normalize_host(host);
        let base_url = Url::parse(&normalized).map_err(|e| {
            fp_common::Error::Config(format!("Invalid Urban API host `{}`: {}", host, e))
        })?;

        Ok(Self {
            base_url,
            ping_timeout,
            operation_timeout,
            session: RwLock::new(None),
            types_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Create an unstarted client from configuration
    pub fn from_config(config: &UrbanApiConfig) -> fp_common::Result<Self> {
        Self::new(
            &config.host,
            Duration::from_secs_f64(config.ping_timeout_seconds),
            Duration::from_secs_f64(config.operation_timeout_seconds),
        )
    }

    /// Base URL every path is joined onto
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Open a fresh session, replacing any existing one
    pub async fn start(&self) -> ServiceResult<()> {
        let session = Arc::new(self.build_session()?);
        let previous = self.session.write().await.replace(session);
        if let Some(previous) = previous {
            previous.mark_closed();
        }
        info!(host = %self.base_url, "Urban API client started");
        Ok(())
    }

    /// Release the session; no-op when already closed
    pub async fn close(&self) {
        if let Some(session) = self.session.write().await.take() {
            session.mark_closed();
            info!(host = %self.base_url, "Urban API client closed");
        }
    }

    /// Whether an open session is currently held
    pub async fn has_open_session(&self) -> bool {
        self.session
            .read()
            .await
            .as_ref()
            .is_some_and(|session| !session.is_closed())
    }

    /// Identifier cached for `name`, if resolved before
    pub async fn cached_type_id(&self, name: &str) -> Option<i64> {
        self.types_cache.lock().await.get(name).copied()
    }

    fn build_session(&self) -> ServiceResult<Session> {
        let client = reqwest::Client::builder()
            .timeout(self.operation_timeout)
            .build()
            .map_err(|e| {
                ServiceError::Unexpected(
                    anyhow::Error::new(e).context("failed to build Urban API HTTP client"),
                )
            })?;

        Ok(Session {
            client,
            closed: AtomicBool::new(false),
        })
    }

    /// Current open session, created on demand
    async fn session(&self) -> ServiceResult<Arc<Session>> {
        {
            let guard = self.session.read().await;
            if let Some(session) = guard.as_ref().filter(|s| !s.is_closed()) {
                return Ok(Arc::clone(session));
            }
        }

        let mut guard = self.session.write().await;
        // Another request may have recreated it while we waited
        if let Some(session) = guard.as_ref().filter(|s| !s.is_closed()) {
            return Ok(Arc::clone(session));
        }

        let session = Arc::new(self.build_session()?);
        *guard = Some(Arc::clone(&session));
        debug!(host = %self.base_url, "Urban API session (re)created");
        Ok(session)
    }

    fn url(&self, path: &str) -> ServiceResult<Url> {
        self.base_url.join(path.trim_start_matches('/')).map_err(|e| {
            ServiceError::Unexpected(anyhow::anyhow!("invalid Urban API path `{}`: {}", path, e))
        })
    }

    /// Classify a transport-level failure and log it
    fn transport_error(&self, method: &Method, path: &str, err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            error!(
                host = %self.base_url,
                method = %method,
                path,
                error = %err,
                "Urban API request timed out"
            );
            return ServiceError::urban_api_timeout();
        }
        if err.is_decode() {
            error!(
                host = %self.base_url,
                method = %method,
                path,
                error = %err,
                "Urban API response could not be decoded"
            );
            return ServiceError::urban_api_malformed(err.to_string());
        }

        error!(
            host = %self.base_url,
            method = %method,
            path,
            error = %err,
            "Urban API is unreachable"
        );
        ServiceError::urban_api_unreachable()
    }

    /// Perform one call on the current session
    ///
    /// 200/201 yield the parsed JSON body; any other status is an
    /// upstream response error carrying the status and body text.
    async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions<'_>,
    ) -> ServiceResult<Value> {
        let session = self.session().await?;
        let url = self.url(path)?;

        let mut builder = session
            .client
            .request(method.clone(), url)
            .query(&options.query);
        if let Some(token) = options.bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(&method, path, e))?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            return response
                .json::<Value>()
                .await
                .map_err(|e| self.transport_error(&method, path, e));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    host = %self.base_url,
                    method = %method,
                    path,
                    status = status.as_u16(),
                    error = %e,
                    "Urban API error body could not be read"
                );
                String::new()
            }
        };
        error!(
            host = %self.base_url,
            method = %method,
            path,
            status = status.as_u16(),
            text = %body,
            "Urban API request failed"
        );
        Err(ServiceError::UpstreamResponse {
            service: URBAN_API_SERVICE,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl UrbanApi for HttpUrbanApiClient {
    async fn is_alive(&self) -> bool {
        let probe = async {
            let session = self.session().await?;
            let url = self.url(PING_PATH)?;
            Ok::<_, ServiceError>(session.client.get(url).timeout(self.ping_timeout))
        };
        let builder = match probe.await {
            Ok(builder) => builder,
            Err(e) => {
                warn!(host = %self.base_url, error = %e, "error on ping");
                return false;
            }
        };

        match builder.send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                match response.json::<Value>().await {
                    Ok(body) if body == json!({ "message": "Pong!" }) => return true,
                    Ok(body) => {
                        warn!(host = %self.base_url, resp_code = 200, resp_text = %body, "error on ping");
                    }
                    Err(e) if e.is_timeout() => {
                        warn!(host = %self.base_url, "timeout on ping");
                    }
                    Err(e) => {
                        warn!(host = %self.base_url, error = %e, "error on ping");
                    }
                }
            }
            Ok(response) => {
                let status = response.status().as_u16();
                let text = response.text().await.unwrap_or_default();
                warn!(host = %self.base_url, resp_code = status, resp_text = %text, "error on ping");
            }
            Err(e) if e.is_timeout() => {
                warn!(host = %self.base_url, "timeout on ping");
            }
            Err(e) => {
                warn!(host = %self.base_url, error = %e, "error on ping");
            }
        }
        false
    }

    async fn get_version(&self) -> ServiceResult<String> {
        let body = self
            .request(Method::GET, OPENAPI_PATH, RequestOptions::default())
            .await?;

        body.pointer("/info/version")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ServiceError::urban_api_malformed("openapi document has no info.version"))
    }

    async fn get_physical_object_type_id_by_name(&self, name: &str) -> ServiceResult<i64> {
        if let Some(type_id) = self.cached_type_id(name).await {
            return Ok(type_id);
        }

        // Lookups are not serialised: two requests resolving the same name
        // concurrently both hit upstream and the last write wins.
        let body = self
            .request(
                Method::GET,
                OBJECT_TYPES_PATH,
                RequestOptions {
                    query: vec![("name", name.to_string())],
                    ..Default::default()
                },
            )
            .await?;

        let matches = body.as_array().ok_or_else(|| {
            ServiceError::urban_api_malformed("physical object types response is not a list")
        })?;
        if matches.len() != 1 {
            return Err(ServiceError::AmbiguousCategory {
                name: name.to_string(),
                matches: matches.len(),
            });
        }

        let type_id = matches[0]
            .get("physical_object_type_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                ServiceError::urban_api_malformed("physical object type has no integer physical_object_type_id")
            })?;

        self.types_cache
            .lock()
            .await
            .insert(name.to_string(), type_id);
        debug!(name, type_id, "physical object type resolved");

        Ok(type_id)
    }

    async fn get_scenario_living_buildings(
        &self,
        scenario_id: ScenarioId,
        token: &str,
    ) -> ServiceResult<RawBuildingCollection> {
        let type_id = self
            .get_physical_object_type_id_by_name(LIVING_BUILDING_TYPE)
            .await?;

        let path = format!("api/v1/scenarios/{}/physical_objects_with_geometry", scenario_id);
        let body = self
            .request(
                Method::GET,
                &path,
                RequestOptions {
                    query: vec![("physical_object_type_id", type_id.to_string())],
                    bearer: Some(token),
                },
            )
            .await?;

        let collection: RawFeatureCollection = serde_json::from_value(body).map_err(|e| {
            ServiceError::urban_api_malformed(format!("scenario geometries are not a feature collection: {}", e))
        })?;

        let raw = RawBuildingCollection::new(Crs::Wgs84, collection.features);
        if raw.is_empty() {
            return Err(ServiceError::NoBuildingsFound);
        }

        debug!(
            scenario_id = scenario_id.get(),
            features = raw.len(),
            "scenario living buildings fetched"
        );
        Ok(raw)
    }
}
