//! Priority delivery queue with an in-flight set and a bounded dead-letter
//! store.
//!
//! The queue never performs I/O and never consults a clock: callers pass
//! `now` explicitly, which keeps the retry arithmetic deterministic under
//! test. A delivery is in exactly one of three places: the live queue, the
//! in-flight set, or the dead-letter store. [`DeliveryQueue::ready_deliveries`]
//! is the only way out of the live queue, so each delivery has at most one
//! concurrent dispatch attempt.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::QueueFullError;
use crate::events::EventKind;
use crate::types::{DeliveryId, FailedDelivery, QueuedDelivery, WebhookEndpoint};

/// Queue tuning knobs.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Live queue capacity. Enqueues beyond this fail with
    /// [`QueueFullError`]; retries are exempt so a full queue cannot strand
    /// an in-flight delivery.
    pub max_queue_size: usize,
    /// Total failed attempts tolerated before dead-lettering.
    pub max_retries: u32,
    /// When false the queue degrades to FIFO.
    pub priority_enabled: bool,
    pub dead_letter_enabled: bool,
    /// Oldest entries are evicted once the dead-letter store is full.
    pub dead_letter_cap: usize,
    /// In-flight claims older than this are considered abandoned and
    /// returned to the live queue.
    pub stale_after: Duration,
    /// Number of recent completions kept for the latency average.
    pub latency_window: usize,
    /// Average latency above this degrades health to warning.
    pub latency_warning: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            max_retries: 3,
            priority_enabled: true,
            dead_letter_enabled: true,
            dead_letter_cap: 500,
            stale_after: Duration::seconds(300),
            latency_window: 100,
            latency_warning: Duration::seconds(30),
        }
    }
}

/// Effective priority for one (event, endpoint) pair.
///
/// Endpoints flagged critical by naming convention get a flat boost on top
/// of the event kind's base priority.
pub fn delivery_priority(kind: EventKind, endpoint: &WebhookEndpoint) -> i32 {
    let mut priority = kind.priority();
    if endpoint.is_critical() {
        priority += 10;
    }
    priority
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub in_flight: usize,
    pub dead_letter: usize,
    pub total_enqueued: u64,
    pub total_processed: u64,
    pub total_failed: u64,
    /// Mean latency over the recent completion window, enqueue to success.
    pub avg_latency_ms: Option<u64>,
    /// Age of the oldest live delivery.
    pub oldest_pending_secs: Option<i64>,
}

/// Coarse queue health derived from utilization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueHealth {
    Healthy,
    Warning,
    Critical,
}

struct InFlight {
    delivery: QueuedDelivery,
    claimed_at: DateTime<Utc>,
}

#[derive(Default)]
struct QueueInner {
    /// Sorted by priority descending; equal priorities stay FIFO.
    live: Vec<QueuedDelivery>,
    in_flight: HashMap<DeliveryId, InFlight>,
    dead: VecDeque<FailedDelivery>,
    total_enqueued: u64,
    total_processed: u64,
    total_failed: u64,
    latencies: VecDeque<u64>,
}

/// The delivery queue. All state sits behind one mutex; every operation is
/// a short critical section with no awaits inside.
pub struct DeliveryQueue {
    config: QueueConfig,
    inner: Mutex<QueueInner>,
}

impl DeliveryQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(QueueInner::default()),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Add a new delivery to the live queue.
    pub async fn enqueue(&self, delivery: QueuedDelivery) -> Result<(), QueueFullError> {
        let mut inner = self.inner.lock().await;
        if inner.live.len() >= self.config.max_queue_size {
            return Err(QueueFullError {
                capacity: self.config.max_queue_size,
            });
        }
        debug!(delivery = %delivery.id, endpoint = %delivery.endpoint_id,
               event = %delivery.event, priority = delivery.priority, "enqueued delivery");
        self.insert_live(&mut inner, delivery);
        inner.total_enqueued += 1;
        Ok(())
    }

    /// Claim up to `limit` deliveries whose scheduled time has passed.
    ///
    /// Claimed deliveries move to the in-flight set and must be resolved by
    /// exactly one of [`DeliveryQueue::mark_completed`],
    /// [`DeliveryQueue::mark_failed`], or [`DeliveryQueue::reschedule`].
    pub async fn ready_deliveries(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<QueuedDelivery> {
        let mut inner = self.inner.lock().await;
        let mut claimed = Vec::new();
        let mut index = 0;
        while index < inner.live.len() && claimed.len() < limit {
            if inner.live[index].scheduled_for <= now {
                let delivery = inner.live.remove(index);
                inner.in_flight.insert(
                    delivery.id.clone(),
                    InFlight {
                        delivery: delivery.clone(),
                        claimed_at: now,
                    },
                );
                claimed.push(delivery);
            } else {
                index += 1;
            }
        }
        claimed
    }

    /// Resolve an in-flight delivery as succeeded. Idempotent: resolving an
    /// unknown id is a no-op.
    pub async fn mark_completed(&self, id: &DeliveryId, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.in_flight.remove(id) else {
            return false;
        };
        inner.total_processed += 1;
        let latency = (now - entry.delivery.created_at).num_milliseconds().max(0) as u64;
        inner.latencies.push_back(latency);
        while inner.latencies.len() > self.config.latency_window {
            inner.latencies.pop_front();
        }
        true
    }

    /// Resolve an in-flight delivery as terminally failed, moving it to the
    /// dead-letter store.
    pub async fn mark_failed(&self, id: &DeliveryId, error: &str, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.in_flight.remove(id) else {
            return false;
        };
        inner.total_failed += 1;
        self.dead_letter(&mut inner, entry.delivery, error, now);
        true
    }

    /// Resolve an in-flight delivery as failed-but-retryable.
    ///
    /// Increments the attempt counter; once the retry budget is exhausted
    /// the delivery dead-letters instead. Retries re-enter the live queue
    /// regardless of capacity.
    pub async fn reschedule(
        &self,
        id: &DeliveryId,
        error: &str,
        next_retry_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.in_flight.remove(id) else {
            return false;
        };
        let mut delivery = entry.delivery;
        delivery.attempts += 1;
        delivery.last_error = Some(error.to_string());

        if delivery.attempts >= delivery.max_retries {
            inner.total_failed += 1;
            self.dead_letter(&mut inner, delivery, error, now);
            return true;
        }

        debug!(delivery = %delivery.id, attempts = delivery.attempts,
               next_retry = %next_retry_at, "rescheduled delivery");
        delivery.scheduled_for = next_retry_at;
        delivery.next_retry_at = Some(next_retry_at);
        self.insert_live(&mut inner, delivery);
        true
    }

    /// Move a dead-lettered delivery back to the live queue with a fresh
    /// retry budget.
    pub async fn retry_failed_delivery(
        &self,
        id: &DeliveryId,
        now: DateTime<Utc>,
    ) -> Result<bool, QueueFullError> {
        let mut inner = self.inner.lock().await;
        let Some(position) = inner.dead.iter().position(|f| &f.delivery.id == id) else {
            return Ok(false);
        };
        if inner.live.len() >= self.config.max_queue_size {
            return Err(QueueFullError {
                capacity: self.config.max_queue_size,
            });
        }
        let Some(failed) = inner.dead.remove(position) else {
            return Ok(false);
        };
        let mut delivery = failed.delivery;
        delivery.attempts = 0;
        delivery.scheduled_for = now;
        delivery.next_retry_at = None;
        self.insert_live(&mut inner, delivery);
        Ok(true)
    }

    /// Cancel a pending or in-flight delivery.
    ///
    /// Cancelling an in-flight claim drops its entry, so the attempt's
    /// eventual resolution becomes a no-op. Returns false when the id is
    /// dead-lettered or unknown.
    pub async fn remove_delivery(&self, id: &DeliveryId) -> bool {
        let mut inner = self.inner.lock().await;
        if let Some(position) = inner.live.iter().position(|d| &d.id == id) {
            inner.live.remove(position);
            return true;
        }
        inner.in_flight.remove(id).is_some()
    }

    /// Return abandoned in-flight claims to the queue.
    ///
    /// A claim goes stale when its dispatch task died without resolving
    /// it. The abandoned attempt is charged against the retry budget, so a
    /// delivery that keeps killing its dispatcher still dead-letters.
    pub async fn reclaim_stale(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.inner.lock().await;
        let stale: Vec<DeliveryId> = inner
            .in_flight
            .iter()
            .filter(|(_, entry)| now - entry.claimed_at > self.config.stale_after)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            if let Some(entry) = inner.in_flight.remove(id) {
                warn!(delivery = %id, "reclaiming stale in-flight delivery");
                let mut delivery = entry.delivery;
                delivery.attempts += 1;
                delivery.last_error = Some("delivery attempt abandoned".to_string());
                if delivery.attempts >= delivery.max_retries {
                    inner.total_failed += 1;
                    self.dead_letter(&mut inner, delivery, "delivery attempt abandoned", now);
                } else {
                    delivery.scheduled_for = now;
                    self.insert_live(&mut inner, delivery);
                }
            }
        }
        stale.len()
    }

    /// Snapshot of the live queue in drain order.
    pub async fn pending(&self) -> Vec<QueuedDelivery> {
        self.inner.lock().await.live.clone()
    }

    /// Snapshot of the dead-letter store, oldest first.
    pub async fn failed(&self) -> Vec<FailedDelivery> {
        self.inner.lock().await.dead.iter().cloned().collect()
    }

    pub async fn stats(&self, now: DateTime<Utc>) -> QueueStats {
        let inner = self.inner.lock().await;
        let avg_latency_ms = if inner.latencies.is_empty() {
            None
        } else {
            Some(inner.latencies.iter().sum::<u64>() / inner.latencies.len() as u64)
        };
        let oldest_pending_secs = inner
            .live
            .iter()
            .map(|d| (now - d.created_at).num_seconds())
            .max();
        QueueStats {
            pending: inner.live.len(),
            in_flight: inner.in_flight.len(),
            dead_letter: inner.dead.len(),
            total_enqueued: inner.total_enqueued,
            total_processed: inner.total_processed,
            total_failed: inner.total_failed,
            avg_latency_ms,
            oldest_pending_secs,
        }
    }

    /// Health derived from live-queue utilization, dead-letter depth, and
    /// processing latency.
    pub async fn health(&self, now: DateTime<Utc>) -> QueueHealth {
        let stats = self.stats(now).await;
        let live_utilization = stats.pending as f64 / self.config.max_queue_size.max(1) as f64;
        let dead_utilization = stats.dead_letter as f64 / self.config.dead_letter_cap.max(1) as f64;
        let slow = stats
            .avg_latency_ms
            .map(|ms| ms as i64 >= self.config.latency_warning.num_milliseconds())
            .unwrap_or(false);

        if live_utilization >= 0.9 || dead_utilization >= 1.0 {
            QueueHealth::Critical
        } else if live_utilization >= 0.7 || dead_utilization >= 0.9 || slow {
            QueueHealth::Warning
        } else {
            QueueHealth::Healthy
        }
    }

    /// Insert keeping the live queue sorted by priority descending, with
    /// FIFO order among equal priorities.
    fn insert_live(&self, inner: &mut QueueInner, delivery: QueuedDelivery) {
        if !self.config.priority_enabled {
            inner.live.push(delivery);
            return;
        }
        let position = inner
            .live
            .iter()
            .position(|existing| existing.priority < delivery.priority)
            .unwrap_or(inner.live.len());
        inner.live.insert(position, delivery);
    }

    fn dead_letter(
        &self,
        inner: &mut QueueInner,
        delivery: QueuedDelivery,
        error: &str,
        now: DateTime<Utc>,
    ) {
        if !self.config.dead_letter_enabled {
            warn!(delivery = %delivery.id, error, "dropping failed delivery (dead-letter disabled)");
            return;
        }
        warn!(delivery = %delivery.id, endpoint = %delivery.endpoint_id,
              attempts = delivery.attempts, error, "delivery dead-lettered");
        inner.dead.push_back(FailedDelivery {
            delivery,
            error: error.to_string(),
            failed_at: now,
        });
        while inner.dead.len() > self.config.dead_letter_cap {
            inner.dead.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::types::EndpointId;

    fn delivery(priority: i32, now: DateTime<Utc>) -> QueuedDelivery {
        QueuedDelivery {
            id: DeliveryId::generate(),
            endpoint_id: EndpointId("ep".to_string()),
            event: EventKind::SessionFailed,
            payload: serde_json::json!({}),
            created_at: now,
            scheduled_for: now,
            attempts: 0,
            max_retries: 3,
            next_retry_at: None,
            last_error: None,
            priority,
            metadata: HashMap::new(),
        }
    }

    fn queue() -> DeliveryQueue {
        DeliveryQueue::new(QueueConfig::default())
    }

    #[tokio::test]
    async fn drains_by_priority_then_fifo() {
        let q = queue();
        let now = Utc::now();
        let low = delivery(5, now);
        let high = delivery(100, now);
        let mid_first = delivery(40, now);
        let mid_second = delivery(40, now);

        q.enqueue(low.clone()).await.unwrap();
        q.enqueue(mid_first.clone()).await.unwrap();
        q.enqueue(high.clone()).await.unwrap();
        q.enqueue(mid_second.clone()).await.unwrap();

        let drained = q.ready_deliveries(10, now).await;
        let ids: Vec<&DeliveryId> = drained.iter().map(|d| &d.id).collect();
        assert_eq!(ids, vec![&high.id, &mid_first.id, &mid_second.id, &low.id]);
    }

    #[tokio::test]
    async fn ready_respects_limit_and_takes_highest_priority() {
        let q = queue();
        let now = Utc::now();
        for priority in [100, 20, 5] {
            q.enqueue(delivery(priority, now)).await.unwrap();
        }

        let drained = q.ready_deliveries(2, now).await;
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].priority, 100);
        assert_eq!(drained[1].priority, 20);
        assert_eq!(q.pending().await.len(), 1);
    }

    #[tokio::test]
    async fn scheduled_in_the_future_is_not_ready() {
        let q = queue();
        let now = Utc::now();
        let mut later = delivery(50, now);
        later.scheduled_for = now + Duration::seconds(30);
        q.enqueue(later).await.unwrap();

        assert!(q.ready_deliveries(10, now).await.is_empty());
        assert_eq!(
            q.ready_deliveries(10, now + Duration::seconds(31)).await.len(),
            1
        );
    }

    #[tokio::test]
    async fn enqueue_fails_at_capacity() {
        let q = DeliveryQueue::new(QueueConfig {
            max_queue_size: 2,
            ..Default::default()
        });
        let now = Utc::now();
        q.enqueue(delivery(1, now)).await.unwrap();
        q.enqueue(delivery(1, now)).await.unwrap();

        let err = q.enqueue(delivery(1, now)).await.unwrap_err();
        assert_eq!(err.capacity, 2);
    }

    #[tokio::test]
    async fn reschedule_bypasses_capacity() {
        let q = DeliveryQueue::new(QueueConfig {
            max_queue_size: 1,
            ..Default::default()
        });
        let now = Utc::now();
        let d = delivery(1, now);
        q.enqueue(d.clone()).await.unwrap();
        let claimed = q.ready_deliveries(1, now).await;
        assert_eq!(claimed.len(), 1);

        // Refill the live queue to capacity while the claim is out.
        q.enqueue(delivery(1, now)).await.unwrap();

        assert!(q.reschedule(&d.id, "503", now + Duration::seconds(1), now).await);
        assert_eq!(q.pending().await.len(), 2);
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_dead_letters() {
        let q = queue();
        let now = Utc::now();
        let d = delivery(50, now); // max_retries = 3
        let id = d.id.clone();
        q.enqueue(d).await.unwrap();

        // First two failures reschedule.
        for attempt in 1..=2u32 {
            let claimed = q.ready_deliveries(1, now).await;
            assert_eq!(claimed.len(), 1, "attempt {attempt} should be claimable");
            assert!(q.reschedule(&id, "timeout", now, now).await);
            assert_eq!(q.pending().await.len(), 1);
        }
        // Third failure exhausts max_retries = 3.
        q.ready_deliveries(1, now).await;
        q.reschedule(&id, "timeout", now, now).await;

        assert!(q.pending().await.is_empty());
        let failed = q.failed().await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].delivery.attempts, 3);
        assert_eq!(failed[0].error, "timeout");
    }

    #[tokio::test]
    async fn client_error_dead_letters_immediately() {
        let q = queue();
        let now = Utc::now();
        let d = delivery(50, now);
        let id = d.id.clone();
        q.enqueue(d).await.unwrap();
        q.ready_deliveries(1, now).await;

        assert!(q.mark_failed(&id, "client error 404", now).await);
        let failed = q.failed().await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].delivery.attempts, 0);
    }

    #[tokio::test]
    async fn mark_completed_is_idempotent() {
        let q = queue();
        let now = Utc::now();
        let d = delivery(50, now);
        let id = d.id.clone();
        q.enqueue(d).await.unwrap();
        q.ready_deliveries(1, now).await;

        assert!(q.mark_completed(&id, now).await);
        assert!(!q.mark_completed(&id, now).await);
        assert!(!q.mark_failed(&id, "late", now).await);

        let stats = q.stats(now).await;
        assert_eq!(stats.total_processed, 1);
        assert_eq!(stats.total_failed, 0);
    }

    #[tokio::test]
    async fn dead_letter_store_evicts_oldest_at_cap() {
        let q = DeliveryQueue::new(QueueConfig {
            dead_letter_cap: 2,
            ..Default::default()
        });
        let now = Utc::now();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let d = delivery(1, now);
            ids.push(d.id.clone());
            q.enqueue(d).await.unwrap();
        }
        for id in &ids {
            q.ready_deliveries(1, now).await;
            q.mark_failed(id, "410", now).await;
        }

        let failed = q.failed().await;
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[0].delivery.id, ids[1]);
        assert_eq!(failed[1].delivery.id, ids[2]);
    }

    #[tokio::test]
    async fn retry_failed_delivery_resets_the_budget() {
        let q = queue();
        let now = Utc::now();
        let d = delivery(50, now);
        let id = d.id.clone();
        q.enqueue(d).await.unwrap();
        q.ready_deliveries(1, now).await;
        q.mark_failed(&id, "404", now).await;

        assert!(q.retry_failed_delivery(&id, now).await.unwrap());
        assert!(q.failed().await.is_empty());
        let pending = q.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 0);

        assert!(!q.retry_failed_delivery(&id, now).await.unwrap());
    }

    #[tokio::test]
    async fn remove_delivery_cancels_live_and_in_flight_entries() {
        let q = queue();
        let now = Utc::now();
        let first = delivery(1, now);
        let second = delivery(1, now);
        q.enqueue(first.clone()).await.unwrap();
        q.enqueue(second.clone()).await.unwrap();
        // Equal priorities drain FIFO, so the claim takes `first`.
        let out = q.ready_deliveries(1, now).await;
        assert_eq!(out[0].id, first.id);

        assert!(q.remove_delivery(&second.id).await);
        assert!(q.pending().await.is_empty());

        // Cancelling the in-flight claim makes its resolution a no-op.
        assert!(q.remove_delivery(&first.id).await);
        assert!(!q.mark_completed(&first.id, now).await);
        assert!(!q.remove_delivery(&first.id).await);
    }

    #[tokio::test]
    async fn stale_claims_are_reclaimed_and_charged_an_attempt() {
        let q = DeliveryQueue::new(QueueConfig {
            stale_after: Duration::seconds(60),
            ..Default::default()
        });
        let now = Utc::now();
        let d = delivery(50, now);
        q.enqueue(d).await.unwrap();
        q.ready_deliveries(1, now).await;

        assert_eq!(q.reclaim_stale(now + Duration::seconds(30)).await, 0);
        assert_eq!(q.reclaim_stale(now + Duration::seconds(61)).await, 1);

        let pending = q.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);
    }

    #[tokio::test]
    async fn stale_claim_with_exhausted_budget_dead_letters() {
        let q = DeliveryQueue::new(QueueConfig {
            stale_after: Duration::seconds(60),
            ..Default::default()
        });
        let now = Utc::now();
        let mut d = delivery(50, now);
        d.max_retries = 1;
        q.enqueue(d).await.unwrap();
        q.ready_deliveries(1, now).await;

        assert_eq!(q.reclaim_stale(now + Duration::seconds(61)).await, 1);
        assert!(q.pending().await.is_empty());
        assert_eq!(q.failed().await.len(), 1);
    }

    #[tokio::test]
    async fn fifo_mode_ignores_priority() {
        let q = DeliveryQueue::new(QueueConfig {
            priority_enabled: false,
            ..Default::default()
        });
        let now = Utc::now();
        let low = delivery(5, now);
        let high = delivery(100, now);
        q.enqueue(low.clone()).await.unwrap();
        q.enqueue(high.clone()).await.unwrap();

        let drained = q.ready_deliveries(10, now).await;
        assert_eq!(drained[0].id, low.id);
        assert_eq!(drained[1].id, high.id);
    }

    #[tokio::test]
    async fn stats_track_counters_and_latency() {
        let q = queue();
        let now = Utc::now();
        let d = delivery(50, now);
        let id = d.id.clone();
        q.enqueue(d).await.unwrap();
        q.ready_deliveries(1, now).await;
        q.mark_completed(&id, now + Duration::milliseconds(250)).await;

        let stats = q.stats(now).await;
        assert_eq!(stats.total_enqueued, 1);
        assert_eq!(stats.total_processed, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.avg_latency_ms, Some(250));
    }

    #[tokio::test]
    async fn health_reflects_utilization() {
        let q = DeliveryQueue::new(QueueConfig {
            max_queue_size: 10,
            ..Default::default()
        });
        let now = Utc::now();
        assert_eq!(q.health(now).await, QueueHealth::Healthy);

        for _ in 0..7 {
            q.enqueue(delivery(1, now)).await.unwrap();
        }
        assert_eq!(q.health(now).await, QueueHealth::Warning);

        for _ in 0..2 {
            q.enqueue(delivery(1, now)).await.unwrap();
        }
        assert_eq!(q.health(now).await, QueueHealth::Critical);
    }

    #[tokio::test]
    async fn health_degrades_on_slow_processing() {
        let q = queue();
        let now = Utc::now();
        let d = delivery(1, now);
        let id = d.id.clone();
        q.enqueue(d).await.unwrap();
        q.ready_deliveries(1, now).await;
        q.mark_completed(&id, now + Duration::seconds(45)).await;

        assert_eq!(q.health(now).await, QueueHealth::Warning);
    }

    #[tokio::test]
    async fn full_dead_letter_store_is_critical() {
        let q = DeliveryQueue::new(QueueConfig {
            dead_letter_cap: 2,
            ..Default::default()
        });
        let now = Utc::now();

        for _ in 0..2 {
            let d = delivery(50, now);
            let id = d.id.clone();
            q.enqueue(d).await.unwrap();
            q.ready_deliveries(1, now).await;
            q.mark_failed(&id, "403 Forbidden", now).await;
        }

        // Eviction pins the store at its cap, so at-cap means saturated.
        assert_eq!(q.failed().await.len(), 2);
        assert_eq!(q.health(now).await, QueueHealth::Critical);
    }

    #[test]
    fn critical_endpoints_get_a_priority_boost() {
        let now = Utc::now();
        let mut endpoint = crate::types::WebhookEndpoint {
            id: EndpointId::generate(),
            name: "ops".to_string(),
            url: "https://example.com".to_string(),
            secret: None,
            events: Vec::new(),
            active: true,
            headers: HashMap::new(),
            payload_fields: None,
            filters: HashMap::new(),
            integration: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(
            delivery_priority(EventKind::SessionFailed, &endpoint),
            EventKind::SessionFailed.priority()
        );
        endpoint.name = "critical-pager".to_string();
        assert_eq!(
            delivery_priority(EventKind::SessionFailed, &endpoint),
            EventKind::SessionFailed.priority() + 10
        );
    }
}
