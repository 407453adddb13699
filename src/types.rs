use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::EventKind;

/// Unique identifier for a registered endpoint.
///
/// Strongly typed to avoid accidental mixing with other string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointId(pub String);

impl EndpointId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one queued delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryId(pub String);

impl DeliveryId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered delivery target.
///
/// Owned exclusively by the registry; the queue only ever holds the id.
/// The `secret` field holds the at-rest (encrypted) form when a cipher is
/// configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub id: EndpointId,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Subscribed event kinds. Empty means "all events".
    #[serde(default)]
    pub events: Vec<EventKind>,
    pub active: bool,
    /// Extra headers sent with every delivery.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Declarative allow-list of payload fields. `None` sends everything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_fields: Option<Vec<String>>,
    /// Field -> expected-value predicates matched against the payload
    /// before a delivery is enqueued.
    #[serde(default)]
    pub filters: HashMap<String, serde_json::Value>,
    /// Integration tag, e.g. "slack".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integration: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookEndpoint {
    /// Whether this endpoint wants the given event kind.
    ///
    /// An empty subscription set is a wildcard.
    pub fn subscribes_to(&self, kind: EventKind) -> bool {
        self.events.is_empty() || self.events.contains(&kind)
    }

    /// Endpoints flagged critical by naming convention get a priority
    /// boost in the delivery queue.
    pub fn is_critical(&self) -> bool {
        self.name.to_ascii_lowercase().contains("critical")
    }
}

/// Caller-supplied configuration for registering a new endpoint.
///
/// The registry assigns the id and timestamps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default)]
    pub events: Vec<EventKind>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_fields: Option<Vec<String>>,
    #[serde(default)]
    pub filters: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integration: Option<String>,
}

fn default_active() -> bool {
    true
}

impl EndpointConfig {
    /// Create a configuration subscribing to all events.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            active: true,
            ..Default::default()
        }
    }

    /// Set a shared secret used for delivery signing.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Restrict the subscription to specific event kinds.
    pub fn with_events(mut self, events: impl IntoIterator<Item = EventKind>) -> Self {
        self.events = events.into_iter().collect();
        self
    }

    /// Add an extra header sent with every delivery.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Restrict the delivered payload to the named fields.
    pub fn with_payload_fields(mut self, fields: impl IntoIterator<Item = String>) -> Self {
        self.payload_fields = Some(fields.into_iter().collect());
        self
    }

    /// Require a payload field to equal a value before delivery.
    pub fn with_filter(mut self, field: impl Into<String>, value: serde_json::Value) -> Self {
        self.filters.insert(field.into(), value);
        self
    }

    /// Tag the endpoint with an integration name.
    pub fn with_integration(mut self, integration: impl Into<String>) -> Self {
        self.integration = Some(integration.into());
        self
    }

    /// Register the endpoint in a deactivated state.
    pub fn disabled(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Partial update applied to an existing endpoint.
///
/// Fields left as `None` are preserved; id and created_at are immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub secret: Option<String>,
    pub events: Option<Vec<EventKind>>,
    pub active: Option<bool>,
    pub headers: Option<HashMap<String, String>>,
    pub payload_fields: Option<Vec<String>>,
    pub filters: Option<HashMap<String, serde_json::Value>>,
    pub integration: Option<String>,
    /// Reset the optional fields back to unset. A clear flag wins over a
    /// value supplied in the same update.
    #[serde(default)]
    pub clear_secret: bool,
    #[serde(default)]
    pub clear_payload_fields: bool,
    #[serde(default)]
    pub clear_integration: bool,
}

/// A named preset used to pre-fill endpoint configuration for a known
/// integration. Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Default subscribed events copied at creation time.
    #[serde(default)]
    pub events: Vec<EventKind>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_fields: Option<Vec<String>>,
    /// Declarative description of the fields a caller must supply.
    #[serde(default)]
    pub config_schema: Vec<TemplateField>,
}

/// One field of a template's config schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateField {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Static descriptive metadata for a supported integration.
///
/// Presentation only; not behaviorally load-bearing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookIntegration {
    pub id: String,
    pub name: String,
    pub description: String,
    pub setup: String,
    pub config_fields: Vec<String>,
}

/// One pending delivery of one event to one endpoint.
///
/// Owned exclusively by the queue once enqueued; the manager only ever
/// holds a snapshot for the duration of a single dispatch attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedDelivery {
    pub id: DeliveryId,
    pub endpoint_id: EndpointId,
    pub event: EventKind,
    /// Fully built wire body, opaque to the queue.
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Earliest dispatch time.
    pub scheduled_for: DateTime<Utc>,
    pub attempts: u32,
    /// Copied from queue config at enqueue time.
    pub max_retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Higher drains sooner.
    pub priority: i32,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A delivery that exhausted its retry budget (or failed terminally).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedDelivery {
    pub delivery: QueuedDelivery,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// One row of an endpoint's delivery log ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
    pub delivery_id: DeliveryId,
    pub event: EventKind,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
    pub latency_ms: u64,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_subscription_is_wildcard() {
        let endpoint = endpoint_with_events(vec![]);
        for kind in EventKind::all() {
            assert!(endpoint.subscribes_to(kind));
        }
    }

    #[test]
    fn specific_subscription_matches_only_its_event() {
        let endpoint = endpoint_with_events(vec![EventKind::SessionFailed]);
        assert!(endpoint.subscribes_to(EventKind::SessionFailed));
        assert!(!endpoint.subscribes_to(EventKind::SessionStarted));
    }

    #[test]
    fn critical_flag_follows_naming_convention() {
        let mut endpoint = endpoint_with_events(vec![]);
        assert!(!endpoint.is_critical());
        endpoint.name = "Critical pager".to_string();
        assert!(endpoint.is_critical());
    }

    fn endpoint_with_events(events: Vec<EventKind>) -> WebhookEndpoint {
        let now = Utc::now();
        WebhookEndpoint {
            id: EndpointId::generate(),
            name: "ops".to_string(),
            url: "https://example.com/hook".to_string(),
            secret: None,
            events,
            active: true,
            headers: HashMap::new(),
            payload_fields: None,
            filters: HashMap::new(),
            integration: None,
            created_at: now,
            updated_at: now,
        }
    }
}
