//! Delivery orchestration: event fan-out, the dispatch loop, HTTP
//! transport, retry policy, and per-endpoint delivery logs.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::{DeliveryError, QueueFullError, RegistryError};
use crate::events::{EventKind, WebhookEvent};
use crate::queue::{delivery_priority, DeliveryQueue};
use crate::registry::{EndpointRegistry, RegistryNotification};
use crate::security::{compute_signature, RateLimiter};
use crate::types::{
    DeliveryId, DeliveryLogEntry, EndpointId, QueuedDelivery, WebhookEndpoint,
};

/// Manager tuning knobs.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// How often the dispatch loop wakes up to claim ready deliveries.
    pub dispatch_interval: Duration,
    /// Maximum deliveries claimed per dispatch pass.
    pub batch_size: usize,
    /// Per-attempt HTTP timeout.
    pub request_timeout: Duration,
    /// Backoff schedule: `base * 2^(attempt-1)` capped at `backoff_max`.
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Uniform random jitter added to every backoff delay.
    pub backoff_jitter: Duration,
    /// How often abandoned in-flight claims are swept back to the queue.
    pub stale_sweep_interval: Duration,
    /// Delivery log entries retained per endpoint.
    pub log_capacity: usize,
    pub signature_header: String,
    pub timestamp_header: String,
    /// Default per-endpoint rate limit.
    pub rate_limit_rps: u32,
    pub rate_limit_burst: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            dispatch_interval: Duration::from_secs(1),
            batch_size: 25,
            request_timeout: Duration::from_secs(10),
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(60),
            backoff_jitter: Duration::from_millis(100),
            stale_sweep_interval: Duration::from_secs(60),
            log_capacity: 100,
            signature_header: "X-Webhook-Signature".to_string(),
            timestamp_header: "X-Webhook-Timestamp".to_string(),
            rate_limit_rps: 10,
            rate_limit_burst: 20,
        }
    }
}

/// One outbound HTTP request, ready for the wire.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

/// What came back from the remote endpoint.
#[derive(Debug, Clone)]
pub struct DeliveryResponse {
    pub status: u16,
    /// Parsed `Retry-After` header, when present.
    pub retry_after: Option<Duration>,
}

/// Transport seam between the manager and the network.
///
/// Production uses [`HttpTransport`]; tests script responses instead.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn deliver(&self, request: DeliveryRequest) -> Result<DeliveryResponse, DeliveryError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryTransport for HttpTransport {
    async fn deliver(&self, request: DeliveryRequest) -> Result<DeliveryResponse, DeliveryError> {
        let mut builder = self
            .client
            .post(&request.url)
            .timeout(request.timeout)
            .body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                DeliveryError::Timeout
            } else {
                DeliveryError::Network(err.to_string())
            }
        })?;

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        Ok(DeliveryResponse {
            status: response.status().as_u16(),
            retry_after,
        })
    }
}

/// Outcome of a fan-out through [`DeliveryManager::trigger_event`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TriggerReceipt {
    pub event_id: String,
    /// Active endpoints subscribed to the event.
    pub matched: usize,
    /// Deliveries actually enqueued after filter evaluation.
    pub enqueued: usize,
}

/// Result of a direct endpoint test, bypassing the queue.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EndpointTestResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
}

/// Lifecycle notifications emitted on a broadcast channel.
#[derive(Debug, Clone)]
pub enum ManagerNotification {
    EventTriggered {
        event_id: String,
        kind: EventKind,
        matched: usize,
    },
    DeliverySucceeded {
        delivery_id: DeliveryId,
        endpoint_id: EndpointId,
    },
    DeliveryDeadLettered {
        delivery_id: DeliveryId,
        endpoint_id: EndpointId,
        error: String,
    },
}

/// Handle to the background dispatch loop.
pub struct ManagerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl ManagerHandle {
    /// Signal shutdown and wait for the loop to drain its current pass.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

/// Orchestrates deliveries: fans events out to subscribed endpoints,
/// drives the dispatch loop, applies the retry policy, and keeps
/// per-endpoint delivery logs.
pub struct DeliveryManager {
    config: ManagerConfig,
    registry: Arc<EndpointRegistry>,
    queue: Arc<DeliveryQueue>,
    rate_limiter: RateLimiter,
    transport: Arc<dyn DeliveryTransport>,
    logs: Mutex<HashMap<EndpointId, VecDeque<DeliveryLogEntry>>>,
    notify_tx: broadcast::Sender<ManagerNotification>,
}

impl DeliveryManager {
    pub fn new(
        config: ManagerConfig,
        registry: Arc<EndpointRegistry>,
        queue: Arc<DeliveryQueue>,
        transport: Arc<dyn DeliveryTransport>,
    ) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit_rps, config.rate_limit_burst);
        let (notify_tx, _) = broadcast::channel(256);
        Self {
            config,
            registry,
            queue,
            rate_limiter,
            transport,
            logs: Mutex::new(HashMap::new()),
            notify_tx,
        }
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    pub fn queue(&self) -> &Arc<DeliveryQueue> {
        &self.queue
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManagerNotification> {
        self.notify_tx.subscribe()
    }

    /// Fan an event out to every active, subscribed, filter-matching
    /// endpoint. Returns how many deliveries were enqueued.
    pub async fn trigger_event(
        &self,
        event: WebhookEvent,
    ) -> Result<TriggerReceipt, QueueFullError> {
        let now = Utc::now();
        let endpoints = self.registry.endpoints_for_event(event.event).await;
        let matched = endpoints.len();
        let mut enqueued = 0;

        for endpoint in endpoints {
            if !matches_filters(&endpoint.filters, &event.payload) {
                debug!(endpoint = %endpoint.id, event = %event.event,
                       "skipping delivery, payload filters did not match");
                continue;
            }

            let body = build_wire_body(&event, endpoint.payload_fields.as_deref());
            let delivery = QueuedDelivery {
                id: DeliveryId::generate(),
                endpoint_id: endpoint.id.clone(),
                event: event.event,
                payload: body,
                created_at: now,
                scheduled_for: now,
                attempts: 0,
                max_retries: self.queue.max_retries(),
                next_retry_at: None,
                last_error: None,
                priority: delivery_priority(event.event, &endpoint),
                metadata: HashMap::from([("event_id".to_string(), event.id.clone())]),
            };
            self.queue.enqueue(delivery).await?;
            enqueued += 1;
        }

        info!(event = %event.event, event_id = %event.id, matched, enqueued, "event triggered");
        let _ = self.notify_tx.send(ManagerNotification::EventTriggered {
            event_id: event.id.clone(),
            kind: event.event,
            matched,
        });

        Ok(TriggerReceipt {
            event_id: event.id,
            matched,
            enqueued,
        })
    }

    /// Start the background dispatch loop. The returned handle stops it.
    pub fn start(self: &Arc<Self>) -> ManagerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let manager = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut dispatch = tokio::time::interval(manager.config.dispatch_interval);
            let mut sweep = tokio::time::interval(manager.config.stale_sweep_interval);
            let mut registry_events = manager.registry.subscribe();
            info!("dispatch loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("dispatch loop stopping");
                            break;
                        }
                    }
                    _ = dispatch.tick() => {
                        manager.dispatch_pass(Utc::now()).await;
                    }
                    _ = sweep.tick() => {
                        let reclaimed = manager.queue.reclaim_stale(Utc::now()).await;
                        if reclaimed > 0 {
                            warn!(reclaimed, "reclaimed stale in-flight deliveries");
                        }
                    }
                    event = registry_events.recv() => {
                        // Drop rate-limit state for endpoints that no
                        // longer exist.
                        if let Ok(RegistryNotification::EndpointRemoved { id }) = event {
                            manager.rate_limiter.forget(&id).await;
                        }
                    }
                }
            }
        });

        ManagerHandle { shutdown_tx, task }
    }

    /// Claim one batch of ready deliveries and attempt them concurrently.
    pub async fn dispatch_pass(self: &Arc<Self>, now: DateTime<Utc>) {
        let batch = self.queue.ready_deliveries(self.config.batch_size, now).await;
        if batch.is_empty() {
            return;
        }
        debug!(count = batch.len(), "dispatching batch");

        let mut tasks = Vec::with_capacity(batch.len());
        for delivery in batch {
            let manager = Arc::clone(self);
            tasks.push(tokio::spawn(async move {
                manager.attempt_delivery(delivery).await;
            }));
        }
        for task in tasks {
            if let Err(err) = task.await {
                error!(error = %err, "delivery task panicked");
            }
        }
    }

    /// One dispatch attempt for one claimed delivery, resolving it back
    /// into the queue.
    async fn attempt_delivery(&self, delivery: QueuedDelivery) {
        let started = tokio::time::Instant::now();
        let outcome = self.try_deliver(&delivery).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        let now = Utc::now();

        match outcome {
            Ok(status) => {
                self.queue.mark_completed(&delivery.id, now).await;
                debug!(delivery = %delivery.id, status, latency_ms, "delivery succeeded");
                self.record_log(&delivery, true, Some(status), None, latency_ms, now)
                    .await;
                let _ = self.notify_tx.send(ManagerNotification::DeliverySucceeded {
                    delivery_id: delivery.id.clone(),
                    endpoint_id: delivery.endpoint_id.clone(),
                });
            }
            Err(err) if err.is_retryable() => {
                let delay = err
                    .retry_after()
                    .map(|hint| hint.min(self.config.backoff_max))
                    .unwrap_or_else(|| self.backoff_delay(delivery.attempts + 1));
                let next_retry_at = now
                    + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::seconds(60));
                warn!(delivery = %delivery.id, endpoint = %delivery.endpoint_id,
                      error = %err, delay_ms = delay.as_millis() as u64, "delivery attempt failed");
                self.queue
                    .reschedule(&delivery.id, &err.to_string(), next_retry_at, now)
                    .await;
                let status = attempt_status(&err);
                self.record_log(&delivery, false, status, Some(err.to_string()), latency_ms, now)
                    .await;
                if delivery.attempts + 1 >= delivery.max_retries {
                    let _ = self
                        .notify_tx
                        .send(ManagerNotification::DeliveryDeadLettered {
                            delivery_id: delivery.id.clone(),
                            endpoint_id: delivery.endpoint_id.clone(),
                            error: err.to_string(),
                        });
                }
            }
            Err(err) => {
                error!(delivery = %delivery.id, endpoint = %delivery.endpoint_id,
                       error = %err, "delivery failed terminally");
                self.queue.mark_failed(&delivery.id, &err.to_string(), now).await;
                let status = attempt_status(&err);
                self.record_log(&delivery, false, status, Some(err.to_string()), latency_ms, now)
                    .await;
                let _ = self
                    .notify_tx
                    .send(ManagerNotification::DeliveryDeadLettered {
                        delivery_id: delivery.id.clone(),
                        endpoint_id: delivery.endpoint_id.clone(),
                        error: err.to_string(),
                    });
            }
        }
    }

    /// Build, sign, and send one request. Returns the 2xx status on
    /// success; every failure is classified as a [`DeliveryError`].
    async fn try_deliver(&self, delivery: &QueuedDelivery) -> Result<u16, DeliveryError> {
        let endpoint = self
            .registry
            .get(&delivery.endpoint_id)
            .await
            .filter(|endpoint| endpoint.active)
            .ok_or(DeliveryError::UnknownEndpoint)?;

        let decision = self.rate_limiter.check(&endpoint.id).await;
        if !decision.allowed {
            return Err(DeliveryError::RateLimited {
                retry_after: decision.retry_after,
            });
        }

        let request = self.build_request(&endpoint, delivery)?;
        let response = self.transport.deliver(request).await?;

        match response.status {
            status @ 200..=299 => Ok(status),
            429 => Err(DeliveryError::RateLimited {
                retry_after: response.retry_after,
            }),
            status @ 400..=499 => Err(DeliveryError::ClientError { status }),
            status => Err(DeliveryError::RemoteError { status }),
        }
    }

    fn build_request(
        &self,
        endpoint: &WebhookEndpoint,
        delivery: &QueuedDelivery,
    ) -> Result<DeliveryRequest, DeliveryError> {
        let body =
            serde_json::to_vec(&delivery.payload).map_err(|e| DeliveryError::Signing(e.to_string()))?;

        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("X-Webhook-Event".to_string(), delivery.event.as_str().to_string()),
            ("X-Webhook-Delivery".to_string(), delivery.id.0.clone()),
        ];
        // Endpoint headers must not shadow the fixed set.
        let reserved = [
            "content-type",
            "x-webhook-event",
            "x-webhook-delivery",
            self.config.signature_header.as_str(),
            self.config.timestamp_header.as_str(),
        ];
        for (name, value) in &endpoint.headers {
            if reserved.iter().any(|r| r.eq_ignore_ascii_case(name)) {
                continue;
            }
            headers.push((name.clone(), value.clone()));
        }

        let secret = self
            .registry
            .reveal_secret(endpoint)
            .map_err(|e| DeliveryError::Signing(e.to_string()))?;
        if let Some(secret) = secret {
            let timestamp = Utc::now().timestamp().to_string();
            let signature = compute_signature(&secret, &timestamp, &body);
            headers.push((self.config.timestamp_header.clone(), timestamp));
            headers.push((self.config.signature_header.clone(), signature));
        }

        Ok(DeliveryRequest {
            url: endpoint.url.clone(),
            headers,
            body,
            timeout: self.config.request_timeout,
        })
    }

    /// Exponential backoff with jitter for the nth attempt (1-based).
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self
            .config
            .backoff_base
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.config.backoff_max);
        let jitter_ms = self.config.backoff_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(fastrand::u64(0..=jitter_ms))
        };
        base + jitter
    }

    /// Send a `webhook.test` event directly to one endpoint, bypassing the
    /// queue and rate limiter.
    pub async fn test_endpoint(
        &self,
        id: &EndpointId,
    ) -> Result<EndpointTestResult, RegistryError> {
        let endpoint = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

        let event = WebhookEvent::new(
            EventKind::WebhookTest,
            None,
            serde_json::json!({ "message": "test delivery", "endpoint": endpoint.name.clone() }),
        );
        let delivery = QueuedDelivery {
            id: DeliveryId::generate(),
            endpoint_id: endpoint.id.clone(),
            event: EventKind::WebhookTest,
            payload: build_wire_body(&event, None),
            created_at: Utc::now(),
            scheduled_for: Utc::now(),
            attempts: 0,
            max_retries: 0,
            next_retry_at: None,
            last_error: None,
            priority: EventKind::WebhookTest.priority(),
            metadata: HashMap::new(),
        };

        let started = tokio::time::Instant::now();
        let result = match self.build_request(&endpoint, &delivery) {
            Ok(request) => self.transport.deliver(request).await,
            Err(err) => Err(err),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        Ok(match result {
            Ok(response) if (200..300).contains(&response.status) => EndpointTestResult {
                success: true,
                status: Some(response.status),
                error: None,
                latency_ms,
            },
            Ok(response) => EndpointTestResult {
                success: false,
                status: Some(response.status),
                error: Some(format!("endpoint returned {}", response.status)),
                latency_ms,
            },
            Err(err) => EndpointTestResult {
                success: false,
                status: None,
                error: Some(err.to_string()),
                latency_ms,
            },
        })
    }

    /// Recent delivery log for one endpoint, most recent first.
    pub async fn delivery_logs(&self, endpoint_id: &EndpointId, limit: usize) -> Vec<DeliveryLogEntry> {
        let logs = self.logs.lock().await;
        match logs.get(endpoint_id) {
            Some(entries) => entries.iter().rev().take(limit).cloned().collect(),
            None => Vec::new(),
        }
    }

    async fn record_log(
        &self,
        delivery: &QueuedDelivery,
        success: bool,
        status: Option<u16>,
        error: Option<String>,
        latency_ms: u64,
        at: DateTime<Utc>,
    ) {
        let entry = DeliveryLogEntry {
            delivery_id: delivery.id.clone(),
            event: delivery.event,
            success,
            status,
            error,
            attempts: delivery.attempts + 1,
            latency_ms,
            at,
        };
        let mut logs = self.logs.lock().await;
        let entries = logs.entry(delivery.endpoint_id.clone()).or_default();
        entries.push_back(entry);
        while entries.len() > self.config.log_capacity {
            entries.pop_front();
        }
    }
}

fn attempt_status(err: &DeliveryError) -> Option<u16> {
    match err {
        DeliveryError::RemoteError { status } | DeliveryError::ClientError { status } => {
            Some(*status)
        }
        DeliveryError::RateLimited { .. } => Some(429),
        _ => None,
    }
}

/// Evaluate an endpoint's field-equality filters against an event payload.
///
/// Every filter must match a top-level payload field exactly; a missing
/// field is a mismatch. No filters means everything matches.
pub fn matches_filters(
    filters: &HashMap<String, serde_json::Value>,
    payload: &serde_json::Value,
) -> bool {
    filters
        .iter()
        .all(|(field, expected)| payload.get(field) == Some(expected))
}

/// Build the wire body for one (event, endpoint) pair, applying the
/// endpoint's payload field allow-list.
pub fn build_wire_body(event: &WebhookEvent, payload_fields: Option<&[String]>) -> serde_json::Value {
    let payload = match payload_fields {
        Some(fields) => {
            let mut trimmed = serde_json::Map::new();
            if let Some(object) = event.payload.as_object() {
                for field in fields {
                    if let Some(value) = object.get(field) {
                        trimmed.insert(field.clone(), value.clone());
                    }
                }
            }
            serde_json::Value::Object(trimmed)
        }
        None => event.payload.clone(),
    };

    let mut body = serde_json::Map::new();
    body.insert("id".to_string(), serde_json::Value::String(event.id.clone()));
    body.insert(
        "event".to_string(),
        serde_json::Value::String(event.event.as_str().to_string()),
    );
    body.insert(
        "timestamp".to_string(),
        serde_json::Value::String(event.timestamp.to_rfc3339()),
    );
    if let Some(session_id) = &event.session_id {
        body.insert(
            "session_id".to_string(),
            serde_json::Value::String(session_id.clone()),
        );
    }
    body.insert("payload".to_string(), payload);
    serde_json::Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filters_require_exact_field_equality() {
        let payload = json!({"severity": "high", "metric": "latency"});

        assert!(matches_filters(&HashMap::new(), &payload));
        assert!(matches_filters(
            &HashMap::from([("severity".to_string(), json!("high"))]),
            &payload
        ));
        assert!(!matches_filters(
            &HashMap::from([("severity".to_string(), json!("low"))]),
            &payload
        ));
        // Missing field is a mismatch, not a wildcard.
        assert!(!matches_filters(
            &HashMap::from([("region".to_string(), json!("eu"))]),
            &payload
        ));
    }

    #[test]
    fn wire_body_applies_payload_allow_list() {
        let event = WebhookEvent::new(
            EventKind::PerformanceAlert,
            Some("sess-9".to_string()),
            json!({"metric": "latency", "value": 950.0, "internal_note": "redact me"}),
        );

        let full = build_wire_body(&event, None);
        assert_eq!(full["payload"]["internal_note"], "redact me");
        assert_eq!(full["event"], "performance.alert");
        assert_eq!(full["session_id"], "sess-9");

        let allow = ["metric".to_string(), "value".to_string()];
        let trimmed = build_wire_body(&event, Some(&allow));
        assert_eq!(trimmed["payload"]["metric"], "latency");
        assert!(trimmed["payload"].get("internal_note").is_none());
        // Envelope fields survive trimming.
        assert_eq!(trimmed["id"], event.id);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let registry = Arc::new(EndpointRegistry::new(Default::default()));
        let queue = Arc::new(DeliveryQueue::new(Default::default()));
        let manager = DeliveryManager::new(
            ManagerConfig {
                backoff_base: Duration::from_millis(500),
                backoff_max: Duration::from_secs(60),
                backoff_jitter: Duration::ZERO,
                ..Default::default()
            },
            registry,
            queue,
            Arc::new(HttpTransport::new()),
        );

        assert_eq!(manager.backoff_delay(1), Duration::from_millis(500));
        assert_eq!(manager.backoff_delay(2), Duration::from_secs(1));
        assert_eq!(manager.backoff_delay(3), Duration::from_secs(2));
        assert_eq!(manager.backoff_delay(8), Duration::from_secs(60));
        // Far past the cap, including exponent overflow territory.
        assert_eq!(manager.backoff_delay(40), Duration::from_secs(60));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let registry = Arc::new(EndpointRegistry::new(Default::default()));
        let queue = Arc::new(DeliveryQueue::new(Default::default()));
        let manager = DeliveryManager::new(
            ManagerConfig {
                backoff_base: Duration::from_millis(500),
                backoff_jitter: Duration::from_millis(100),
                ..Default::default()
            },
            registry,
            queue,
            Arc::new(HttpTransport::new()),
        );

        for _ in 0..50 {
            let delay = manager.backoff_delay(1);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(600));
        }
    }

    #[test]
    fn attempt_status_extracts_http_codes() {
        assert_eq!(attempt_status(&DeliveryError::RemoteError { status: 503 }), Some(503));
        assert_eq!(attempt_status(&DeliveryError::ClientError { status: 404 }), Some(404));
        assert_eq!(
            attempt_status(&DeliveryError::RateLimited { retry_after: None }),
            Some(429)
        );
        assert_eq!(attempt_status(&DeliveryError::Timeout), None);
    }
}
