//! Endpoint registry: the catalog of webhook endpoints, templates, and
//! integrations.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};
use url::Url;

use crate::error::{RegistryError, StorageError, ValidationError};
use crate::events::EventKind;
use crate::security::SecretCipher;
use crate::storage::RegistryStore;
use crate::types::{
    EndpointConfig, EndpointId, EndpointUpdate, TemplateField, WebhookEndpoint,
    WebhookIntegration, WebhookTemplate,
};

/// Registry behavior toggles.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// In production mode, URLs pointing at loopback/private/link-local
    /// hosts are rejected at registration time.
    pub production_mode: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            production_mode: false,
        }
    }
}

/// Notification emitted on catalog mutation.
///
/// Sent on an explicit broadcast channel so consumers are statically
/// enumerable.
#[derive(Debug, Clone)]
pub enum RegistryNotification {
    EndpointRegistered { id: EndpointId },
    EndpointUpdated { id: EndpointId },
    EndpointRemoved { id: EndpointId },
}

/// Filter and pagination options for listing endpoints.
#[derive(Debug, Clone, Default)]
pub struct EndpointFilter {
    pub active: Option<bool>,
    pub event: Option<EventKind>,
    pub integration: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// A page of endpoints plus the total match count before pagination.
#[derive(Debug, Clone)]
pub struct EndpointPage {
    pub endpoints: Vec<WebhookEndpoint>,
    pub total: usize,
}

/// Single-writer catalog of webhook endpoints.
pub struct EndpointRegistry {
    config: RegistryConfig,
    endpoints: RwLock<HashMap<EndpointId, WebhookEndpoint>>,
    templates: RwLock<HashMap<String, WebhookTemplate>>,
    store: Option<Arc<dyn RegistryStore>>,
    cipher: Option<SecretCipher>,
    notify_tx: broadcast::Sender<RegistryNotification>,
}

impl EndpointRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        let (notify_tx, _) = broadcast::channel(64);
        let templates = builtin_templates()
            .into_iter()
            .map(|template| (template.id.clone(), template))
            .collect();
        Self {
            config,
            endpoints: RwLock::new(HashMap::new()),
            templates: RwLock::new(templates),
            store: None,
            cipher: None,
            notify_tx,
        }
    }

    /// Attach a persistence adapter. Call [`EndpointRegistry::load`] before
    /// serving traffic.
    pub fn with_store(mut self, store: Arc<dyn RegistryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach an at-rest cipher for endpoint secrets.
    pub fn with_cipher(mut self, cipher: SecretCipher) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Subscribe to catalog mutation notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryNotification> {
        self.notify_tx.subscribe()
    }

    /// Load the persisted catalog, replacing the in-memory table.
    pub async fn load(&self) -> Result<usize, StorageError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let loaded = store.load_endpoints().await?;
        let count = loaded.len();
        let mut guard = self.endpoints.write().await;
        *guard = loaded
            .into_iter()
            .map(|endpoint| (endpoint.id.clone(), endpoint))
            .collect();
        info!(count, "loaded endpoint catalog");
        Ok(count)
    }

    /// Register a new endpoint. Assigns id and timestamps.
    pub async fn register(&self, config: EndpointConfig) -> Result<WebhookEndpoint, RegistryError> {
        if config.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        validate_url(&config.url, self.config.production_mode)?;

        let secret = match config.secret {
            Some(secret) => Some(self.protect_secret(&secret)?),
            None => None,
        };

        let now = Utc::now();
        let endpoint = WebhookEndpoint {
            id: EndpointId::generate(),
            name: config.name,
            url: config.url,
            secret,
            events: config.events,
            active: config.active,
            headers: config.headers,
            payload_fields: config.payload_fields,
            filters: config.filters,
            integration: config.integration,
            created_at: now,
            updated_at: now,
        };

        {
            let mut guard = self.endpoints.write().await;
            guard.insert(endpoint.id.clone(), endpoint.clone());
        }

        info!(endpoint = %endpoint.id, name = %endpoint.name, "registered endpoint");
        let _ = self.notify_tx.send(RegistryNotification::EndpointRegistered {
            id: endpoint.id.clone(),
        });
        self.persist().await;
        Ok(endpoint)
    }

    /// Apply a partial update. Id and created_at are immutable.
    pub async fn update(
        &self,
        id: &EndpointId,
        update: EndpointUpdate,
    ) -> Result<WebhookEndpoint, RegistryError> {
        if let Some(url) = &update.url {
            validate_url(url, self.config.production_mode)?;
        }
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(ValidationError::EmptyName.into());
            }
        }
        let secret = match update.secret {
            Some(secret) => Some(self.protect_secret(&secret)?),
            None => None,
        };

        let updated = {
            let mut guard = self.endpoints.write().await;
            let endpoint = guard
                .get_mut(id)
                .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

            if let Some(name) = update.name {
                endpoint.name = name;
            }
            if let Some(url) = update.url {
                endpoint.url = url;
            }
            if let Some(secret) = secret {
                endpoint.secret = Some(secret);
            }
            if let Some(events) = update.events {
                endpoint.events = events;
            }
            if let Some(active) = update.active {
                endpoint.active = active;
            }
            if let Some(headers) = update.headers {
                endpoint.headers = headers;
            }
            if let Some(fields) = update.payload_fields {
                endpoint.payload_fields = Some(fields);
            }
            if let Some(filters) = update.filters {
                endpoint.filters = filters;
            }
            if let Some(integration) = update.integration {
                endpoint.integration = Some(integration);
            }
            if update.clear_secret {
                endpoint.secret = None;
            }
            if update.clear_payload_fields {
                endpoint.payload_fields = None;
            }
            if update.clear_integration {
                endpoint.integration = None;
            }
            endpoint.updated_at = Utc::now();
            endpoint.clone()
        };

        info!(endpoint = %updated.id, "updated endpoint");
        let _ = self
            .notify_tx
            .send(RegistryNotification::EndpointUpdated { id: updated.id.clone() });
        self.persist().await;
        Ok(updated)
    }

    /// Remove an endpoint. Returns false if it was already absent.
    pub async fn unregister(&self, id: &EndpointId) -> bool {
        let removed = {
            let mut guard = self.endpoints.write().await;
            guard.remove(id).is_some()
        };
        if removed {
            info!(endpoint = %id, "unregistered endpoint");
            let _ = self
                .notify_tx
                .send(RegistryNotification::EndpointRemoved { id: id.clone() });
            self.persist().await;
        }
        removed
    }

    pub async fn get(&self, id: &EndpointId) -> Option<WebhookEndpoint> {
        self.endpoints.read().await.get(id).cloned()
    }

    /// List endpoints matching the filter, newest first, with pagination.
    pub async fn list(&self, filter: EndpointFilter) -> EndpointPage {
        let guard = self.endpoints.read().await;
        let mut matched: Vec<WebhookEndpoint> = guard
            .values()
            .filter(|endpoint| {
                filter.active.map_or(true, |a| endpoint.active == a)
                    && filter.event.map_or(true, |kind| endpoint.subscribes_to(kind))
                    && filter
                        .integration
                        .as_deref()
                        .map_or(true, |tag| endpoint.integration.as_deref() == Some(tag))
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len();
        let endpoints: Vec<WebhookEndpoint> = matched
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect();
        EndpointPage { endpoints, total }
    }

    /// Active endpoints that want the given event.
    ///
    /// This is the sole selection rule the manager relies on.
    pub async fn endpoints_for_event(&self, kind: EventKind) -> Vec<WebhookEndpoint> {
        let guard = self.endpoints.read().await;
        guard
            .values()
            .filter(|endpoint| endpoint.active && endpoint.subscribes_to(kind))
            .cloned()
            .collect()
    }

    /// Register a template. Templates are immutable once registered.
    pub async fn register_template(&self, template: WebhookTemplate) -> Result<(), RegistryError> {
        let mut guard = self.templates.write().await;
        if guard.contains_key(&template.id) {
            return Err(ValidationError::DuplicateTemplate(template.id).into());
        }
        guard.insert(template.id.clone(), template);
        Ok(())
    }

    pub async fn templates(&self) -> Vec<WebhookTemplate> {
        let guard = self.templates.read().await;
        let mut templates: Vec<WebhookTemplate> = guard.values().cloned().collect();
        templates.sort_by(|a, b| a.id.cmp(&b.id));
        templates
    }

    pub async fn template(&self, id: &str) -> Option<WebhookTemplate> {
        self.templates.read().await.get(id).cloned()
    }

    /// Materialize an endpoint from a template. Caller overrides win over
    /// template defaults; the result goes through [`EndpointRegistry::register`].
    pub async fn create_from_template(
        &self,
        template_id: &str,
        mut overrides: EndpointConfig,
    ) -> Result<WebhookEndpoint, RegistryError> {
        let template = self
            .template(template_id)
            .await
            .ok_or_else(|| ValidationError::UnknownTemplate(template_id.to_string()))?;

        if overrides.events.is_empty() {
            overrides.events = template.events;
        }
        for (name, value) in template.headers {
            overrides.headers.entry(name).or_insert(value);
        }
        if overrides.payload_fields.is_none() {
            overrides.payload_fields = template.payload_fields;
        }
        if overrides.integration.is_none() {
            overrides.integration = Some(template.id);
        }

        self.register(overrides).await
    }

    /// Static integration catalog, presentation only.
    pub fn integrations(&self) -> Vec<WebhookIntegration> {
        builtin_integrations()
    }

    /// Decrypt an endpoint's stored secret for signing.
    ///
    /// Returns the raw bytes, or an error when the cipher cannot recover
    /// them; a missing cipher with an encrypted-looking store is the
    /// caller's misconfiguration and will fail signature verification
    /// downstream, not here.
    pub fn reveal_secret(
        &self,
        endpoint: &WebhookEndpoint,
    ) -> Result<Option<Vec<u8>>, RegistryError> {
        match (&endpoint.secret, &self.cipher) {
            (None, _) => Ok(None),
            (Some(stored), Some(cipher)) => Ok(Some(cipher.decrypt(stored)?)),
            (Some(stored), None) => Ok(Some(stored.as_bytes().to_vec())),
        }
    }

    fn protect_secret(&self, secret: &str) -> Result<String, RegistryError> {
        match &self.cipher {
            Some(cipher) => Ok(cipher.encrypt_str(secret)?),
            None => Ok(secret.to_string()),
        }
    }

    /// Best-effort full-catalog save. Failures are logged, never rolled
    /// back into memory.
    async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let snapshot: Vec<WebhookEndpoint> = {
            let guard = self.endpoints.read().await;
            guard.values().cloned().collect()
        };
        if let Err(err) = store.save_endpoints(&snapshot).await {
            warn!(error = %err, "failed to persist endpoint catalog");
        }
    }
}

/// Validate an endpoint URL.
///
/// Non-HTTP(S) schemes are always rejected; production mode additionally
/// rejects loopback, private, link-local, and metadata hosts.
pub fn validate_url(raw: &str, production_mode: bool) -> Result<(), ValidationError> {
    let parsed = Url::parse(raw).map_err(|e| ValidationError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::InvalidUrl {
            url: raw.to_string(),
            reason: "scheme must be http or https".to_string(),
        });
    }

    let Some(host) = parsed.host() else {
        return Err(ValidationError::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    };

    if !production_mode {
        return Ok(());
    }

    let blocked_reason = match host {
        url::Host::Ipv4(ip) => blocked_ipv4(&ip),
        url::Host::Ipv6(ip) => blocked_ipv6(&ip),
        url::Host::Domain(domain) => {
            let lower = domain.to_ascii_lowercase();
            if lower == "localhost" || lower.ends_with(".localhost") || lower.ends_with(".local") {
                Some("loopback host")
            } else {
                None
            }
        }
    };

    match blocked_reason {
        Some(reason) => Err(ValidationError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("{reason} not allowed in production"),
        }),
        None => Ok(()),
    }
}

fn blocked_ipv4(ip: &Ipv4Addr) -> Option<&'static str> {
    // Cloud metadata services (AWS/GCP/Azure and Alibaba).
    if ip.octets() == [169, 254, 169, 254] || ip.octets() == [100, 100, 100, 200] {
        return Some("metadata service address");
    }
    if ip.is_private() {
        return Some("private address");
    }
    if ip.is_loopback() {
        return Some("loopback address");
    }
    if ip.is_link_local() {
        return Some("link-local address");
    }
    if ip.is_broadcast() || ip.is_multicast() || ip.is_unspecified() {
        return Some("special-use address");
    }
    None
}

fn blocked_ipv6(ip: &Ipv6Addr) -> Option<&'static str> {
    if ip.is_loopback() {
        return Some("loopback address");
    }
    if ip.is_unspecified() || ip.is_multicast() {
        return Some("special-use address");
    }
    let segments = ip.segments();
    // fe80::/10 link-local, fc00::/7 unique-local.
    if (segments[0] & 0xffc0) == 0xfe80 {
        return Some("link-local address");
    }
    if (segments[0] & 0xfe00) == 0xfc00 {
        return Some("private address");
    }
    None
}

fn builtin_templates() -> Vec<WebhookTemplate> {
    vec![
        WebhookTemplate {
            id: "slack".to_string(),
            name: "Slack".to_string(),
            description: "Post alerts and session failures to a Slack incoming webhook"
                .to_string(),
            events: vec![
                EventKind::SessionFailed,
                EventKind::PerformanceAlert,
                EventKind::AnomalyDetected,
            ],
            headers: HashMap::new(),
            payload_fields: None,
            config_schema: vec![TemplateField {
                name: "url".to_string(),
                description: "Slack incoming webhook URL".to_string(),
                required: true,
            }],
        },
        WebhookTemplate {
            id: "discord".to_string(),
            name: "Discord".to_string(),
            description: "Post alerts to a Discord channel webhook".to_string(),
            events: vec![EventKind::SessionFailed, EventKind::PerformanceAlert],
            headers: HashMap::new(),
            payload_fields: None,
            config_schema: vec![TemplateField {
                name: "url".to_string(),
                description: "Discord channel webhook URL".to_string(),
                required: true,
            }],
        },
        WebhookTemplate {
            id: "pagerduty".to_string(),
            name: "PagerDuty".to_string(),
            description: "Page on-call for failures and anomalies".to_string(),
            events: vec![EventKind::SessionFailed, EventKind::AnomalyDetected],
            headers: HashMap::new(),
            payload_fields: None,
            config_schema: vec![
                TemplateField {
                    name: "url".to_string(),
                    description: "PagerDuty events API URL".to_string(),
                    required: true,
                },
                TemplateField {
                    name: "secret".to_string(),
                    description: "Routing key".to_string(),
                    required: true,
                },
            ],
        },
        WebhookTemplate {
            id: "generic".to_string(),
            name: "Generic HTTP".to_string(),
            description: "Deliver every event to a generic HTTP listener".to_string(),
            events: Vec::new(),
            headers: HashMap::new(),
            payload_fields: None,
            config_schema: vec![TemplateField {
                name: "url".to_string(),
                description: "Target URL".to_string(),
                required: true,
            }],
        },
    ]
}

fn builtin_integrations() -> Vec<WebhookIntegration> {
    vec![
        WebhookIntegration {
            id: "slack".to_string(),
            name: "Slack".to_string(),
            description: "Slack incoming webhooks".to_string(),
            setup: "Create an incoming webhook in your Slack workspace and paste its URL."
                .to_string(),
            config_fields: vec!["url".to_string()],
        },
        WebhookIntegration {
            id: "discord".to_string(),
            name: "Discord".to_string(),
            description: "Discord channel webhooks".to_string(),
            setup: "Create a webhook in the channel settings and paste its URL.".to_string(),
            config_fields: vec!["url".to_string()],
        },
        WebhookIntegration {
            id: "pagerduty".to_string(),
            name: "PagerDuty".to_string(),
            description: "PagerDuty Events API".to_string(),
            setup: "Create an Events API v2 integration and use its routing key as the secret."
                .to_string(),
            config_fields: vec!["url".to_string(), "secret".to_string()],
        },
        WebhookIntegration {
            id: "generic".to_string(),
            name: "Generic HTTP".to_string(),
            description: "Any HTTPS listener accepting JSON POSTs".to_string(),
            setup: "Point the endpoint URL at your listener; configure a secret to verify \
                    signatures."
                .to_string(),
            config_fields: vec!["url".to_string(), "secret".to_string()],
        },
    ]
}
