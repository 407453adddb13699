//! Canonical event enumeration and typed payload shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// All event kinds that can be delivered through the relay.
///
/// This is a closed set: every entry point that accepts an event name
/// validates against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "session.started")]
    SessionStarted,
    #[serde(rename = "session.completed")]
    SessionCompleted,
    #[serde(rename = "session.failed")]
    SessionFailed,
    #[serde(rename = "agent.message")]
    AgentMessage,
    #[serde(rename = "performance.alert")]
    PerformanceAlert,
    #[serde(rename = "anomaly.detected")]
    AnomalyDetected,
    #[serde(rename = "user.login")]
    UserLogin,
    #[serde(rename = "cost.threshold")]
    CostThreshold,
    #[serde(rename = "webhook.test")]
    WebhookTest,
}

impl EventKind {
    /// Returns all supported event kinds.
    pub fn all() -> [Self; 9] {
        [
            Self::SessionStarted,
            Self::SessionCompleted,
            Self::SessionFailed,
            Self::AgentMessage,
            Self::PerformanceAlert,
            Self::AnomalyDetected,
            Self::UserLogin,
            Self::CostThreshold,
            Self::WebhookTest,
        ]
    }

    /// Wire name of the event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStarted => "session.started",
            Self::SessionCompleted => "session.completed",
            Self::SessionFailed => "session.failed",
            Self::AgentMessage => "agent.message",
            Self::PerformanceAlert => "performance.alert",
            Self::AnomalyDetected => "anomaly.detected",
            Self::UserLogin => "user.login",
            Self::CostThreshold => "cost.threshold",
            Self::WebhookTest => "webhook.test",
        }
    }

    /// Parse an event kind from its wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "session.started" => Some(Self::SessionStarted),
            "session.completed" => Some(Self::SessionCompleted),
            "session.failed" => Some(Self::SessionFailed),
            "agent.message" => Some(Self::AgentMessage),
            "performance.alert" => Some(Self::PerformanceAlert),
            "anomaly.detected" => Some(Self::AnomalyDetected),
            "user.login" => Some(Self::UserLogin),
            "cost.threshold" => Some(Self::CostThreshold),
            "webhook.test" => Some(Self::WebhookTest),
            _ => None,
        }
    }

    /// Static dispatch priority. Higher values drain first.
    ///
    /// Failure and alert events rank above routine lifecycle events;
    /// operator test events rank last.
    pub fn priority(&self) -> i32 {
        match self {
            Self::SessionFailed => 100,
            Self::PerformanceAlert => 90,
            Self::AnomalyDetected => 85,
            Self::CostThreshold => 70,
            Self::SessionCompleted => 40,
            Self::SessionStarted => 20,
            Self::AgentMessage => 15,
            Self::UserLogin => 10,
            Self::WebhookTest => 5,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Envelope for one triggered event.
///
/// The queue and transport treat `payload` as opaque JSON; the typed
/// shapes below are what the trigger facade puts inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Unique event id (uuid v4).
    pub id: String,
    /// Event kind, serialized under its wire name.
    pub event: EventKind,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Session/correlation identifier, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Event-specific payload fields.
    pub payload: serde_json::Value,
}

impl WebhookEvent {
    pub fn new(event: EventKind, session_id: Option<String>, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event,
            timestamp: Utc::now(),
            session_id,
            payload,
        }
    }
}

/// Session lifecycle snapshot (`session.started` / `session.completed` /
/// `session.failed`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Performance alert payload (`performance.alert`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub severity: String,
    pub message: String,
}

/// Anomaly detection payload (`anomaly.detected`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: String,
    pub score: f64,
    pub description: String,
    pub observed_at: DateTime<Utc>,
}

/// Cost threshold payload (`cost.threshold`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostReport {
    pub amount_usd: f64,
    pub threshold_usd: f64,
    pub period: String,
}

/// User payload (`user.login`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
}

/// Agent message payload (`agent.message`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub session_id: String,
    pub role: String,
    pub content: String,
}
