//! Typed entry points for raising events.
//!
//! Callers inside the host application go through this facade instead of
//! building [`WebhookEvent`] envelopes by hand, which keeps the payload
//! shapes in one place.

use std::sync::Arc;

use serde::Serialize;

use crate::error::TriggerError;
use crate::events::{
    AgentMessage, Alert, Anomaly, CostReport, EventKind, SessionSnapshot, UserInfo, WebhookEvent,
};
use crate::manager::{DeliveryManager, TriggerReceipt};

/// Typed facade over [`DeliveryManager::trigger_event`].
#[derive(Clone)]
pub struct EventTriggers {
    manager: Arc<DeliveryManager>,
}

impl EventTriggers {
    pub fn new(manager: Arc<DeliveryManager>) -> Self {
        Self { manager }
    }

    pub async fn session_started(
        &self,
        session: &SessionSnapshot,
    ) -> Result<TriggerReceipt, TriggerError> {
        self.raise(EventKind::SessionStarted, Some(session.session_id.clone()), session)
            .await
    }

    pub async fn session_completed(
        &self,
        session: &SessionSnapshot,
    ) -> Result<TriggerReceipt, TriggerError> {
        self.raise(EventKind::SessionCompleted, Some(session.session_id.clone()), session)
            .await
    }

    pub async fn session_failed(
        &self,
        session: &SessionSnapshot,
    ) -> Result<TriggerReceipt, TriggerError> {
        self.raise(EventKind::SessionFailed, Some(session.session_id.clone()), session)
            .await
    }

    pub async fn agent_message(
        &self,
        message: &AgentMessage,
    ) -> Result<TriggerReceipt, TriggerError> {
        self.raise(EventKind::AgentMessage, Some(message.session_id.clone()), message)
            .await
    }

    pub async fn performance_alert(&self, alert: &Alert) -> Result<TriggerReceipt, TriggerError> {
        self.raise(EventKind::PerformanceAlert, None, alert).await
    }

    pub async fn anomaly_detected(
        &self,
        anomaly: &Anomaly,
    ) -> Result<TriggerReceipt, TriggerError> {
        self.raise(EventKind::AnomalyDetected, None, anomaly).await
    }

    pub async fn user_login(&self, user: &UserInfo) -> Result<TriggerReceipt, TriggerError> {
        self.raise(EventKind::UserLogin, None, user).await
    }

    pub async fn cost_threshold(
        &self,
        report: &CostReport,
    ) -> Result<TriggerReceipt, TriggerError> {
        self.raise(EventKind::CostThreshold, None, report).await
    }

    async fn raise<T: Serialize>(
        &self,
        kind: EventKind,
        session_id: Option<String>,
        payload: &T,
    ) -> Result<TriggerReceipt, TriggerError> {
        let payload = serde_json::to_value(payload)?;
        let event = WebhookEvent::new(kind, session_id, payload);
        Ok(self.manager.trigger_event(event).await?)
    }
}
