//! Outbound reports from the engine to its host

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::event::{LogEntry, StatusUpdate};
use crate::notification::Notification;

/// Everything the engine tells its host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum EngineEvent {
    /// Partial status to merge over the host's view
    Status(StatusUpdate),
    /// A new activity log entry
    FileChange(LogEntry),
    /// A request to show a desktop notification
    Notification(Notification),
}

/// Receiving half handed to the host
pub struct ReportChannel {
    receiver: mpsc::UnboundedReceiver<EngineEvent>,
}

impl ReportChannel {
    /// Create a new report channel
    pub fn new() -> (Reporter, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Reporter { sender: Some(sender) }, Self { receiver })
    }

    /// Receive the next report
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        self.receiver.recv().await
    }

    /// Take a report if one is queued
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        self.receiver.try_recv().ok()
    }

    /// Collect everything queued right now
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Sending half owned by the engine.
///
/// Reporting never fails the caller: when the host has gone away the report
/// is dropped with a debug line.
#[derive(Clone, Default)]
pub struct Reporter {
    sender: Option<mpsc::UnboundedSender<EngineEvent>>,
}

impl Reporter {
    /// A reporter that discards everything
    pub fn disconnected() -> Self {
        Self { sender: None }
    }

    pub fn status(&self, update: StatusUpdate) {
        self.send(EngineEvent::Status(update));
    }

    pub fn file_change(&self, entry: LogEntry) {
        self.send(EngineEvent::FileChange(entry));
    }

    pub fn notification(&self, notification: Notification) {
        self.send(EngineEvent::Notification(notification));
    }

    fn send(&self, event: EngineEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(event).is_err() {
            tracing::debug!("Host report channel closed, dropping report");
        }
    }
}
