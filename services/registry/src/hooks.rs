//! Service hooks
//!
//! Find hooks may shrink the result of a lookup before it is returned to
//! the consumer. Listener hooks learn which bundles are listening for which
//! services. Both are ordinary services, published under [`FIND_HOOK`] and
//! [`LISTENER_HOOK`] respectively.
//!
//! A hook which returns an error or panics is logged and skipped; the
//! remaining hooks still run.
//!
//! [`FIND_HOOK`]: crate::FIND_HOOK
//! [`LISTENER_HOOK`]: crate::LISTENER_HOOK

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::bundle::Bundle;
use crate::id::ServiceId;
use crate::record::ServiceRecord;

/// Error returned by a failing hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Filters the results of service lookups.
pub trait FindHook: fmt::Debug + Send + Sync {
    /// Inspect and optionally shrink `candidates`.
    ///
    /// `name` and `filter` are the lookup's arguments; `all_services` is set
    /// when the lookup skipped assignability checks.
    fn find(
        &self,
        context: &Bundle,
        name: Option<&str>,
        filter: Option<&str>,
        all_services: bool,
        candidates: &mut FindCandidates,
    ) -> Result<(), HookError>;
}

/// A listener's interest in service events.
#[derive(Debug, Clone)]
pub struct ListenerInfo {
    bundle: Bundle,
    filter: Option<String>,
    removed: bool,
}

impl ListenerInfo {
    /// Describe a listener registered by `bundle` with an optional filter.
    pub fn new(bundle: Bundle, filter: Option<String>) -> Self {
        Self {
            bundle,
            filter,
            removed: false,
        }
    }

    /// Mark the listener as removed.
    #[must_use]
    pub fn into_removed(mut self) -> Self {
        self.removed = true;
        self
    }

    /// The bundle which registered the listener.
    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    /// The listener's filter, if any.
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Whether the listener has been removed.
    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

/// Observes service listener interest.
pub trait ListenerHook: fmt::Debug + Send + Sync {
    /// Listeners were added. Called once on registration with every
    /// currently active listener.
    fn added(&self, listeners: &[ListenerInfo]);

    /// Listeners were removed.
    fn removed(&self, listeners: &[ListenerInfo]);
}

/// Remove-only view of the candidates of a lookup.
///
/// Hooks may drop entries but can neither add nor reorder them.
#[derive(Debug)]
pub struct FindCandidates {
    records: Vec<ServiceRecord>,
}

impl FindCandidates {
    pub(crate) fn new(records: Vec<ServiceRecord>) -> Self {
        Self { records }
    }

    pub(crate) fn into_inner(self) -> Vec<ServiceRecord> {
        self.records
    }

    /// Number of remaining candidates.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether every candidate has been removed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over the remaining candidates, in lookup order.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceRecord> {
        self.records.iter()
    }

    /// Whether the given service is still a candidate.
    pub fn contains(&self, id: ServiceId) -> bool {
        self.records.iter().any(|r| r.id() == id)
    }

    /// Remove a candidate, returning whether it was present.
    pub fn remove(&mut self, id: ServiceId) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id() != id);
        self.records.len() != before
    }

    /// Keep only the candidates for which `keep` returns true.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&ServiceRecord) -> bool,
    {
        self.records.retain(keep);
    }
}

/// Run `f`, logging and swallowing any panic.
pub(crate) fn guarded<R>(what: &str, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            tracing::warn!(panic = panic_message(payload.as_ref()), "Panic in {what}");
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}

/// Pass `candidates` through each hook in turn.
pub(crate) fn filter_find(
    hooks: &[(ServiceRecord, Arc<dyn FindHook>)],
    context: &Bundle,
    name: Option<&str>,
    filter: Option<&str>,
    all_services: bool,
    candidates: Vec<ServiceRecord>,
) -> Vec<ServiceRecord> {
    let mut view = FindCandidates::new(candidates);
    for (record, hook) in hooks {
        let result = guarded("find hook", || {
            hook.find(context, name, filter, all_services, &mut view)
        });
        if let Some(Err(error)) = result {
            tracing::warn!(hook = %record.id(), %error, "Error while calling find hook");
        }
    }
    view.into_inner()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListenerChange {
    Added,
    Removed,
}

pub(crate) fn notify_listener_hook(
    record: &ServiceRecord,
    hook: &dyn ListenerHook,
    listeners: &[ListenerInfo],
    change: ListenerChange,
) {
    tracing::trace!(
        hook = %record.id(),
        ?change,
        listeners = listeners.len(),
        "Notify listener hook"
    );
    guarded("listener hook", || match change {
        ListenerChange::Added => hook.added(listeners),
        ListenerChange::Removed => hook.removed(listeners),
    });
}
