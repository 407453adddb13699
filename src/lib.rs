//! A single-process webhook event relay.
//!
//! This crate provides a **bounded, in-memory, best-effort** delivery
//! pipeline for application events: an endpoint registry, a priority
//! retry queue, a signing/rate-limiting security layer, a delivery
//! manager, typed trigger entry points, and an HTTP management API.
//!
//! ## Guarantees
//! - Bounded resource usage (live queue, dead-letter store, logs)
//! - Explicit backpressure via [`QueueFullError`]
//! - Per-endpoint isolation (rate limits, headers, secrets, filters)
//! - Best-effort, at-least-once delivery with exponential backoff
//!
//! ## Non-Guarantees
//! - Queue durability across restarts (the endpoint catalog persists,
//!   pending deliveries do not)
//! - Exactly-once delivery
//! - Distributed coordination
//!
//! This crate is intentionally **not a hosted service**. It exists to
//! run inside the host application's process.

pub mod api;
mod error;
mod events;
mod manager;
mod queue;
mod registry;
mod security;
mod storage;
mod triggers;
mod types;

pub use error::{
    CryptoError, DeliveryError, QueueFullError, RegistryError, StorageError, TriggerError,
    ValidationError,
};
pub use events::{
    AgentMessage, Alert, Anomaly, CostReport, EventKind, SessionSnapshot, UserInfo, WebhookEvent,
};
pub use manager::{
    DeliveryManager, DeliveryRequest, DeliveryResponse, DeliveryTransport, EndpointTestResult,
    HttpTransport, ManagerConfig, ManagerHandle, ManagerNotification, TriggerReceipt,
};
pub use queue::{delivery_priority, DeliveryQueue, QueueConfig, QueueHealth, QueueStats};
pub use registry::{
    validate_url, EndpointFilter, EndpointPage, EndpointRegistry, RegistryConfig,
    RegistryNotification,
};
pub use security::{
    compute_signature, is_timestamp_fresh, verify_signature, RateLimitDecision, RateLimiter,
    SecretCipher,
};
pub use storage::{InMemoryStore, JsonFileStore, RegistryStore};
pub use triggers::EventTriggers;
pub use types::{
    DeliveryId, DeliveryLogEntry, EndpointConfig, EndpointId, EndpointUpdate, FailedDelivery,
    QueuedDelivery, TemplateField, WebhookEndpoint, WebhookIntegration, WebhookTemplate,
};
