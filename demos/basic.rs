use std::sync::Arc;

use webhook_relay::{
    Alert, DeliveryManager, DeliveryQueue, EndpointConfig, EventKind, EventTriggers,
    EndpointRegistry, HttpTransport, ManagerConfig, QueueConfig, RegistryConfig,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let registry = Arc::new(EndpointRegistry::new(RegistryConfig::default()));
    let queue = Arc::new(DeliveryQueue::new(QueueConfig::default()));
    let manager = Arc::new(DeliveryManager::new(
        ManagerConfig::default(),
        Arc::clone(&registry),
        Arc::clone(&queue),
        Arc::new(HttpTransport::new()),
    ));

    registry
        .register(
            EndpointConfig::new("ops-alerts", "https://example.com/webhook")
                .with_secret("supersecret")
                .with_events([EventKind::SessionFailed, EventKind::PerformanceAlert]),
        )
        .await
        .expect("register endpoint");

    let handle = manager.start();

    let triggers = EventTriggers::new(Arc::clone(&manager));
    let receipt = triggers
        .performance_alert(&Alert {
            metric: "p99_latency_ms".to_string(),
            value: 950.0,
            threshold: 500.0,
            severity: "high".to_string(),
            message: "p99 latency above threshold".to_string(),
        })
        .await
        .expect("trigger alert");

    println!("matched {} endpoint(s), enqueued {}", receipt.matched, receipt.enqueued);

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    handle.shutdown().await;
}
