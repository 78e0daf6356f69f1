//! Fire-and-forget audit events.
//!
//! Sinks return nothing, so a failing sink can never fail the operation
//! that emitted the event.

use std::fmt;
use std::sync::Mutex;

/// A named audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditEvent {
    Sign,
    SignError,
    VerifyId,
    VerifyUpload,
    Stamp,
    StampError,
    SaveSig,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::Sign => "SIGN",
            AuditEvent::SignError => "SIGN_ERROR",
            AuditEvent::VerifyId => "VERIFY_ID",
            AuditEvent::VerifyUpload => "VERIFY_UPLOAD",
            AuditEvent::Stamp => "STAMP",
            AuditEvent::StampError => "STAMP_ERROR",
            AuditEvent::SaveSig => "SAVE_SIG",
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent, detail: &str);
}

/// Writes audit events to the `audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent, detail: &str) {
        tracing::info!(target: "audit", action = event.as_str(), "ACTION: {} | DETAILS: {}", event, detail);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: AuditEvent, _detail: &str) {}
}

/// Keeps events in memory, for inspection by embedders and tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<(AuditEvent, String)>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events, oldest first.
    pub fn events(&self) -> Vec<(AuditEvent, String)> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Just the event names, oldest first.
    pub fn kinds(&self) -> Vec<AuditEvent> {
        self.events().into_iter().map(|(event, _)| event).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent, detail: &str) {
        let mut events = match self.events.lock() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push((event, detail.to_string()));
    }
}
