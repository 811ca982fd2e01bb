//! Service values and factories

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::bundle::Bundle;
use crate::hooks::{FindHook, ListenerHook};
use crate::record::ServiceRecord;

/// A service object handed to consumers.
///
/// Consumers recover the concrete type with [`Arc::downcast`].
pub type ServiceObject = Arc<dyn Any + Send + Sync>;

/// Produces a value per consuming bundle.
///
/// `get_service` runs at most once per consumer until that consumer has
/// released every usage, at which point `unget_service` receives the value
/// back. Both are called while the record's usage ledger is locked, so a
/// factory must not acquire or release the service it is producing.
pub trait ServiceFactory: fmt::Debug + Send + Sync {
    /// Create the value for `bundle`. Returning `None` fails the acquisition.
    fn get_service(&self, bundle: &Bundle, record: &ServiceRecord) -> Option<ServiceObject>;

    /// Dispose of a value previously produced for `bundle`.
    fn unget_service(&self, bundle: &Bundle, record: &ServiceRecord, service: ServiceObject) {
        let _ = (bundle, record, service);
    }
}

/// How a record was classified at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// A shared object.
    Object,

    /// A per-consumer factory.
    Factory,

    /// A find hook.
    FindHook,

    /// A listener hook.
    ListenerHook,
}

/// The value provider of a service.
#[derive(Clone)]
pub enum ServiceValue {
    /// The same object is handed to every consumer.
    Object(ServiceObject),

    /// Each consumer receives a value produced by the factory.
    Factory(Arc<dyn ServiceFactory>),

    /// A hook allowed to filter lookup results.
    FindHook(Arc<dyn FindHook>),

    /// A hook notified of service listener interest.
    ListenerHook(Arc<dyn ListenerHook>),
}

impl ServiceValue {
    /// Wrap a shared object.
    pub fn object<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        ServiceValue::Object(Arc::new(value))
    }

    /// Wrap a factory.
    pub fn factory<F>(factory: F) -> Self
    where
        F: ServiceFactory + 'static,
    {
        ServiceValue::Factory(Arc::new(factory))
    }

    /// Wrap a find hook.
    pub fn find_hook<H>(hook: H) -> Self
    where
        H: FindHook + 'static,
    {
        ServiceValue::FindHook(Arc::new(hook))
    }

    /// Wrap a listener hook.
    pub fn listener_hook<H>(hook: H) -> Self
    where
        H: ListenerHook + 'static,
    {
        ServiceValue::ListenerHook(Arc::new(hook))
    }

    /// The classification of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            ServiceValue::Object(_) => ValueKind::Object,
            ServiceValue::Factory(_) => ValueKind::Factory,
            ServiceValue::FindHook(_) => ValueKind::FindHook,
            ServiceValue::ListenerHook(_) => ValueKind::ListenerHook,
        }
    }
}

impl fmt::Debug for ServiceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceValue::Object(_) => f.debug_tuple("Object").finish_non_exhaustive(),
            ServiceValue::Factory(factory) => f.debug_tuple("Factory").field(factory).finish(),
            ServiceValue::FindHook(hook) => f.debug_tuple("FindHook").field(hook).finish(),
            ServiceValue::ListenerHook(hook) => {
                f.debug_tuple("ListenerHook").field(hook).finish()
            }
        }
    }
}
