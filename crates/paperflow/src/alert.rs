//! Operator alerting for faults caught in worker tasks.

use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;

/// What is reported when a worker recovers from a fault.
#[derive(Debug, Clone, Serialize)]
pub struct AlertDetails {
    pub message: String,
    pub task_id: usize,
    pub document_id: Option<String>,
    pub backtrace: String,
}

impl AlertDetails {
    /// Mail body: the message, followed by the document id when one was in flight.
    pub fn body(&self) -> String {
        match &self.document_id {
            Some(id) => format!("{}\ndocument_id: {}\n", self.message, id),
            None => self.message.clone(),
        }
    }
}

pub trait AlertSink: Send + Sync {
    fn send_mail(&self, details: &AlertDetails) -> Result<()>;
}

/// An alert sink gated by the `alerting.enabled` setting.
#[derive(Clone, Default)]
pub struct Alerting {
    enabled: bool,
    sink: Option<Arc<dyn AlertSink>>,
}

impl Alerting {
    pub fn new(enabled: bool, sink: Option<Arc<dyn AlertSink>>) -> Self {
        Self { enabled, sink }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.sink.is_some()
    }

    /// Sends `details` if alerting is enabled. Send failures are logged only.
    pub fn notify(&self, details: &AlertDetails) {
        if !self.enabled {
            return;
        }
        let Some(sink) = &self.sink else {
            return;
        };
        if let Err(e) = sink.send_mail(details) {
            tracing::error!(task_id = details.task_id, "send error alert: {}", e);
        }
    }
}
