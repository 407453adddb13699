//! HTTP management API.
//!
//! Thin axum layer over the registry, queue, and manager. Event names
//! arrive as strings and are validated against the closed event set before
//! they reach the core.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{QueueFullError, RegistryError, ValidationError};
use crate::events::{EventKind, WebhookEvent};
use crate::manager::{DeliveryManager, EndpointTestResult, TriggerReceipt};
use crate::queue::{DeliveryQueue, QueueHealth, QueueStats};
use crate::registry::{EndpointFilter, EndpointRegistry};
use crate::types::{
    DeliveryLogEntry, EndpointConfig, EndpointId, EndpointUpdate, WebhookEndpoint,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<EndpointRegistry>,
    pub queue: Arc<DeliveryQueue>,
    pub manager: Arc<DeliveryManager>,
}

/// Build the management router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks", get(list_endpoints).post(register_endpoint))
        .route("/webhooks/templates", get(list_templates))
        .route("/webhooks/integrations", get(list_integrations))
        .route("/webhooks/from-template", post(create_from_template))
        .route("/webhooks/trigger", post(trigger_event))
        .route("/webhooks/statistics", get(statistics))
        .route("/webhooks/health", get(health))
        .route(
            "/webhooks/{id}",
            get(get_endpoint).put(update_endpoint).delete(delete_endpoint),
        )
        .route("/webhooks/{id}/test", post(test_endpoint))
        .route("/webhooks/{id}/logs", get(delivery_logs))
        .with_state(state)
}

/// API error: status code plus a JSON body with a stable error code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": { "code": self.code, "message": self.message }
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Validation(inner) => Self::bad_request(inner.to_string()),
            RegistryError::NotFound(id) => Self::not_found(format!("endpoint not found: {id}")),
            RegistryError::Crypto(inner) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "crypto_error",
                inner.to_string(),
            ),
        }
    }
}

impl From<QueueFullError> for ApiError {
    fn from(err: QueueFullError) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "queue_full", err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

/// Endpoint representation returned by the API. The stored secret is never
/// echoed back; only its presence is.
#[derive(Debug, Serialize)]
pub struct EndpointView {
    pub id: String,
    pub name: String,
    pub url: String,
    pub has_secret: bool,
    pub events: Vec<&'static str>,
    pub active: bool,
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_fields: Option<Vec<String>>,
    pub filters: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integration: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WebhookEndpoint> for EndpointView {
    fn from(endpoint: WebhookEndpoint) -> Self {
        Self {
            id: endpoint.id.0,
            name: endpoint.name,
            url: endpoint.url,
            has_secret: endpoint.secret.is_some(),
            events: endpoint.events.iter().map(EventKind::as_str).collect(),
            active: endpoint.active,
            headers: endpoint.headers,
            payload_fields: endpoint.payload_fields,
            filters: endpoint.filters,
            integration: endpoint.integration,
            created_at: endpoint.created_at,
            updated_at: endpoint.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterEndpointRequest {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub secret: Option<String>,
    /// Event wire names; empty subscribes to all events.
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub payload_fields: Option<Vec<String>>,
    #[serde(default)]
    pub filters: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub integration: Option<String>,
}

fn default_true() -> bool {
    true
}

impl RegisterEndpointRequest {
    fn into_config(self) -> Result<EndpointConfig, ApiError> {
        Ok(EndpointConfig {
            name: self.name,
            url: self.url,
            secret: self.secret,
            events: parse_events(&self.events)?,
            active: self.active,
            headers: self.headers,
            payload_fields: self.payload_fields,
            filters: self.filters,
            integration: self.integration,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateEndpointRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub secret: Option<String>,
    pub events: Option<Vec<String>>,
    pub active: Option<bool>,
    pub headers: Option<HashMap<String, String>>,
    pub payload_fields: Option<Vec<String>>,
    pub filters: Option<HashMap<String, serde_json::Value>>,
    pub integration: Option<String>,
    #[serde(default)]
    pub clear_secret: bool,
    #[serde(default)]
    pub clear_payload_fields: bool,
    #[serde(default)]
    pub clear_integration: bool,
}

#[derive(Debug, Deserialize)]
pub struct FromTemplateRequest {
    pub template: String,
    #[serde(flatten)]
    pub endpoint: RegisterEndpointRequest,
}

#[derive(Debug, Deserialize)]
pub struct TriggerEventRequest {
    pub event: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub active: Option<bool>,
    pub event: Option<String>,
    pub integration: Option<String>,
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub endpoints: Vec<EndpointView>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: QueueHealth,
    pub stats: QueueStats,
}

fn parse_events(names: &[String]) -> Result<Vec<EventKind>, ApiError> {
    names
        .iter()
        .map(|name| {
            EventKind::parse(name)
                .ok_or_else(|| ApiError::from(ValidationError::UnknownEvent(name.clone())))
        })
        .collect()
}

async fn list_endpoints(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let event = match &query.event {
        Some(name) => Some(
            EventKind::parse(name)
                .ok_or_else(|| ApiError::from(ValidationError::UnknownEvent(name.clone())))?,
        ),
        None => None,
    };
    let page = state
        .registry
        .list(EndpointFilter {
            active: query.active,
            event,
            integration: query.integration,
            offset: query.offset,
            limit: query.limit,
        })
        .await;
    Ok(Json(ListResponse {
        total: page.total,
        endpoints: page.endpoints.into_iter().map(EndpointView::from).collect(),
    }))
}

async fn register_endpoint(
    State(state): State<AppState>,
    Json(request): Json<RegisterEndpointRequest>,
) -> Result<(StatusCode, Json<EndpointView>), ApiError> {
    let endpoint = state.registry.register(request.into_config()?).await?;
    Ok((StatusCode::CREATED, Json(endpoint.into())))
}

async fn get_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EndpointView>, ApiError> {
    let id = EndpointId(id);
    match state.registry.get(&id).await {
        Some(endpoint) => Ok(Json(endpoint.into())),
        None => Err(ApiError::not_found(format!("endpoint not found: {id}"))),
    }
}

async fn update_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateEndpointRequest>,
) -> Result<Json<EndpointView>, ApiError> {
    let events = match request.events {
        Some(names) => Some(parse_events(&names)?),
        None => None,
    };
    let update = EndpointUpdate {
        name: request.name,
        url: request.url,
        secret: request.secret,
        events,
        active: request.active,
        headers: request.headers,
        payload_fields: request.payload_fields,
        filters: request.filters,
        integration: request.integration,
        clear_secret: request.clear_secret,
        clear_payload_fields: request.clear_payload_fields,
        clear_integration: request.clear_integration,
    };
    let endpoint = state.registry.update(&EndpointId(id), update).await?;
    Ok(Json(endpoint.into()))
}

async fn delete_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = EndpointId(id);
    if state.registry.unregister(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("endpoint not found: {id}")))
    }
}

async fn test_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EndpointTestResult>, ApiError> {
    let result = state.manager.test_endpoint(&EndpointId(id)).await?;
    Ok(Json(result))
}

async fn delivery_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<DeliveryLogEntry>>, ApiError> {
    let id = EndpointId(id);
    if state.registry.get(&id).await.is_none() {
        return Err(ApiError::not_found(format!("endpoint not found: {id}")));
    }
    let logs = state.manager.delivery_logs(&id, query.limit.unwrap_or(50)).await;
    Ok(Json(logs))
}

async fn list_templates(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.templates().await)
}

async fn list_integrations(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.integrations())
}

async fn create_from_template(
    State(state): State<AppState>,
    Json(request): Json<FromTemplateRequest>,
) -> Result<(StatusCode, Json<EndpointView>), ApiError> {
    let template = request.template;
    let config = request.endpoint.into_config()?;
    let endpoint = state.registry.create_from_template(&template, config).await?;
    Ok((StatusCode::CREATED, Json(endpoint.into())))
}

async fn trigger_event(
    State(state): State<AppState>,
    Json(request): Json<TriggerEventRequest>,
) -> Result<(StatusCode, Json<TriggerReceipt>), ApiError> {
    let kind = EventKind::parse(&request.event)
        .ok_or_else(|| ApiError::from(ValidationError::UnknownEvent(request.event.clone())))?;
    let event = WebhookEvent::new(kind, request.session_id, request.payload);
    let receipt = state.manager.trigger_event(event).await?;
    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

async fn statistics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.queue.stats(Utc::now()).await)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    let status = state.queue.health(now).await;
    let stats = state.queue.stats(now).await;
    Json(HealthResponse { status, stats })
}
