//! Service events and the collaborator that delivers them.

use std::fmt;

use serde::Serialize;

use crate::bundle::Bundle;
use crate::hooks::ListenerInfo;
use crate::record::ServiceRecord;

/// Kind of a service event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceEventKind {
    /// A service was registered.
    Registered,

    /// A service's properties changed.
    Modified,

    /// A service is about to be unregistered.
    Unregistering,
}

impl fmt::Display for ServiceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceEventKind::Registered => f.write_str("REGISTERED"),
            ServiceEventKind::Modified => f.write_str("MODIFIED"),
            ServiceEventKind::Unregistering => f.write_str("UNREGISTERING"),
        }
    }
}

/// Receives service events from the registry.
///
/// Events are delivered synchronously on the thread performing the change.
pub trait EventSink: fmt::Debug + Send + Sync {
    /// A service changed.
    fn service_changed(&self, owner: &Bundle, kind: ServiceEventKind, record: &ServiceRecord);

    /// The service listeners currently active. Handed to listener hooks when
    /// they are registered.
    fn listener_infos(&self) -> Vec<ListenerInfo> {
        Vec::new()
    }
}

/// Writes every event to the log and reports no listeners.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEvents;

impl EventSink for TracingEvents {
    fn service_changed(&self, owner: &Bundle, kind: ServiceEventKind, record: &ServiceRecord) {
        tracing::debug!(%owner, service = %record.id(), %kind, "Service event");
    }
}
