#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use webhook_relay::{
    DeliveryError, DeliveryManager, DeliveryQueue, DeliveryRequest, DeliveryResponse,
    DeliveryTransport, EndpointRegistry, ManagerConfig, QueueConfig, RegistryConfig,
};

/// Transport that replays scripted responses and records every request.
/// Once the script runs out it answers 200.
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<DeliveryResponse, DeliveryError>>>,
    requests: Mutex<Vec<DeliveryRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn script_status(&self, status: u16) {
        self.responses.lock().await.push_back(Ok(DeliveryResponse {
            status,
            retry_after: None,
        }));
    }

    pub async fn script_response(&self, response: Result<DeliveryResponse, DeliveryError>) {
        self.responses.lock().await.push_back(response);
    }

    pub async fn seen_requests(&self) -> Vec<DeliveryRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl DeliveryTransport for MockTransport {
    async fn deliver(&self, request: DeliveryRequest) -> Result<DeliveryResponse, DeliveryError> {
        self.requests.lock().await.push(request);
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(DeliveryResponse {
                status: 200,
                retry_after: None,
            }))
    }
}

/// Manager config tuned for fast, deterministic tests: near-zero backoff
/// without jitter and a generous rate limit.
pub fn fast_manager_config() -> ManagerConfig {
    ManagerConfig {
        dispatch_interval: Duration::from_millis(10),
        backoff_base: Duration::from_millis(1),
        backoff_max: Duration::from_millis(50),
        backoff_jitter: Duration::ZERO,
        rate_limit_rps: 1000,
        rate_limit_burst: 1000,
        ..Default::default()
    }
}

pub fn stack(
    transport: Arc<MockTransport>,
    queue_config: QueueConfig,
    manager_config: ManagerConfig,
) -> (Arc<EndpointRegistry>, Arc<DeliveryQueue>, Arc<DeliveryManager>) {
    let registry = Arc::new(EndpointRegistry::new(RegistryConfig::default()));
    let queue = Arc::new(DeliveryQueue::new(queue_config));
    let manager = Arc::new(DeliveryManager::new(
        manager_config,
        Arc::clone(&registry),
        Arc::clone(&queue),
        transport,
    ));
    (registry, queue, manager)
}
