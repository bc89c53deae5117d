//! Security event emission.
//!
//! The core reports security-relevant happenings (auth failures, lockouts,
//! mass revocations) to an external collaborator. Delivery is fire-and-forget
//! from the caller's point of view: `emit` spawns the delivery and the
//! critical path never awaits it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Security event types.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    /// Failed credential presentation
    AuthFailure,
    /// Consecutive failures reached the tenant's lockout threshold
    BruteForceLockout,
    /// Authentication attempted against a locked account
    LockedAccountAttempt,
    /// A session was explicitly revoked
    SessionRevoked,
    /// All sessions but the current one were revoked
    MassRevocation,
}

/// A single security event.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub kind: SecurityEventKind,
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub ip_text: Option<String>,
    pub detail: String,
    pub created_utc: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn new(
        kind: SecurityEventKind,
        tenant_id: Option<Uuid>,
        user_id: Option<Uuid>,
        ip_text: Option<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            tenant_id,
            user_id,
            ip_text,
            detail: detail.into(),
            created_utc: Utc::now(),
        }
    }
}

/// Destination for security events (audit pipeline, SIEM forwarder, ...).
#[async_trait]
pub trait SecurityEventSink: Send + Sync {
    async fn deliver(&self, event: SecurityEvent) -> Result<(), anyhow::Error>;
}

/// Handle services hold to emit events without blocking on delivery.
#[derive(Clone)]
pub struct SecurityEvents {
    sink: Arc<dyn SecurityEventSink>,
}

impl SecurityEvents {
    pub fn new(sink: Arc<dyn SecurityEventSink>) -> Self {
        Self { sink }
    }

    /// Emit an event asynchronously (non-blocking). Delivery failures are
    /// logged, never surfaced.
    pub fn emit(&self, event: SecurityEvent) {
        let sink = self.sink.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.deliver(event.clone()).await {
                tracing::error!(
                    error = %e,
                    kind = ?event.kind,
                    "Failed to deliver security event"
                );
            }
        });
    }
}

/// Sink that only writes to the log stream. Default when no collaborator is
/// wired up.
pub struct TracingEventSink;

#[async_trait]
impl SecurityEventSink for TracingEventSink {
    async fn deliver(&self, event: SecurityEvent) -> Result<(), anyhow::Error> {
        tracing::warn!(
            kind = ?event.kind,
            tenant_id = ?event.tenant_id,
            user_id = ?event.user_id,
            detail = %event.detail,
            "Security event"
        );
        Ok(())
    }
}

/// Sink that records events for test assertions.
#[derive(Default)]
pub struct MemoryEventSink {
    pub events: std::sync::Mutex<Vec<SecurityEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kinds(&self) -> Vec<SecurityEventKind> {
        self.events
            .lock()
            .map(|events| events.iter().map(|e| e.kind.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SecurityEventSink for MemoryEventSink {
    async fn deliver(&self, event: SecurityEvent) -> Result<(), anyhow::Error> {
        self.events
            .lock()
            .map_err(|e| anyhow::anyhow!("event sink mutex poisoned: {}", e))?
            .push(event);
        Ok(())
    }
}
