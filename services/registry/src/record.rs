//! Service records
//!
//! A [`ServiceRecord`] is one registered service. It is shared between the
//! registry index, the owning bundle and every consumer holding a usage of
//! it; clones are cheap handles to the same record.
//!
//! The record's usage ledger lock serializes acquisition, release and the
//! start of teardown. The lifecycle state is always checked under that lock,
//! so no consumer can obtain a value once unregistration has begun.
//!
//! A separate reentrant lifecycle lock is held by the registry across
//! registration, property updates and the whole of teardown, together with
//! the events each of them fires. It is always taken before the ledger lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use arc_swap::ArcSwap;
use filter::{Properties, PropertyValue};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use serde::Serialize;

use crate::bundle::{Bundle, BundleId};
use crate::hooks::guarded;
use crate::id::ServiceId;
use crate::name::ServiceName;
use crate::value::{ServiceObject, ServiceValue, ValueKind};

/// Property holding the service identifier.
pub const SERVICE_ID: &str = "service.id";

/// Property holding the service ranking.
pub const SERVICE_RANKING: &str = "service.ranking";

/// Property holding the class names a service was registered under.
pub const OBJECTCLASS: &str = "objectClass";

/// Lifecycle state of a service record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceState {
    /// Visible and acquirable.
    Registered,

    /// Teardown has started.
    Unregistering,

    /// Teardown has completed.
    Unregistered,
}

impl ServiceState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ServiceState::Registered,
            1 => ServiceState::Unregistering,
            _ => ServiceState::Unregistered,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Registered => f.write_str("REGISTERED"),
            ServiceState::Unregistering => f.write_str("UNREGISTERING"),
            ServiceState::Unregistered => f.write_str("UNREGISTERED"),
        }
    }
}

struct Usage {
    bundle: Bundle,
    count: usize,
    service: ServiceObject,
}

struct RecordInner {
    id: ServiceId,
    names: Vec<ServiceName>,
    owner: Bundle,
    value: ServiceValue,
    properties: ArcSwap<Properties>,
    state: AtomicU8,
    lifecycle: ReentrantMutex<()>,
    using: Mutex<HashMap<BundleId, Usage>>,
}

/// A registered service.
#[derive(Clone)]
pub struct ServiceRecord {
    inner: Arc<RecordInner>,
}

impl ServiceRecord {
    pub(crate) fn new(
        id: ServiceId,
        names: Vec<ServiceName>,
        owner: Bundle,
        value: ServiceValue,
        properties: Properties,
    ) -> Self {
        let properties = with_synthetic(properties, id, &names);
        Self {
            inner: Arc::new(RecordInner {
                id,
                names,
                owner,
                value,
                properties: ArcSwap::from_pointee(properties),
                state: AtomicU8::new(ServiceState::Registered as u8),
                lifecycle: ReentrantMutex::new(()),
                using: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The service identifier.
    pub fn id(&self) -> ServiceId {
        self.inner.id
    }

    /// Names the service is published under, in registration order.
    pub fn names(&self) -> &[ServiceName] {
        &self.inner.names
    }

    /// The bundle which registered the service.
    pub fn owner(&self) -> &Bundle {
        &self.inner.owner
    }

    /// The value provider.
    pub fn value(&self) -> &ServiceValue {
        &self.inner.value
    }

    /// How the value was classified at registration.
    pub fn kind(&self) -> ValueKind {
        self.inner.value.kind()
    }

    /// Whether consumers receive factory-produced values.
    pub fn is_factory(&self) -> bool {
        self.kind() == ValueKind::Factory
    }

    /// A snapshot of the current properties.
    pub fn properties(&self) -> Arc<Properties> {
        self.inner.properties.load_full()
    }

    /// A single property, ignoring key case.
    pub fn property(&self, key: &str) -> Option<PropertyValue> {
        self.inner.properties.load().get(key).cloned()
    }

    /// The ranking used to order services. Non-integer rankings count as 0.
    pub fn ranking(&self) -> i64 {
        self.inner
            .properties
            .load()
            .get(SERVICE_RANKING)
            .and_then(PropertyValue::as_long)
            .unwrap_or(0)
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ServiceState {
        ServiceState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Whether the service is still registered.
    pub fn is_registered(&self) -> bool {
        self.state() == ServiceState::Registered
    }

    /// Bundles currently holding at least one usage of this service.
    pub fn using_bundles(&self) -> Vec<Bundle> {
        let mut bundles: Vec<_> = self
            .inner
            .using
            .lock()
            .values()
            .map(|usage| usage.bundle.clone())
            .collect();
        bundles.sort_by_key(Bundle::id);
        bundles
    }

    /// Outstanding usages held by the given bundle.
    pub fn use_count(&self, bundle: BundleId) -> usize {
        self.inner
            .using
            .lock()
            .get(&bundle)
            .map_or(0, |usage| usage.count)
    }

    pub(crate) fn lifecycle(&self) -> ReentrantMutexGuard<'_, ()> {
        self.inner.lifecycle.lock()
    }

    /// Swap in new properties. Refused once teardown has begun.
    pub(crate) fn update_properties(&self, properties: Properties) -> bool {
        let _lifecycle = self.lifecycle();
        if !self.is_registered() {
            return false;
        }

        let properties = with_synthetic(properties, self.inner.id, &self.inner.names);
        self.inner.properties.store(Arc::new(properties));
        true
    }

    /// Take one usage on behalf of `consumer`.
    pub(crate) fn acquire(&self, consumer: &Bundle) -> Option<ServiceObject> {
        let mut using = self.inner.using.lock();
        if !self.is_registered() {
            tracing::trace!(service = %self.inner.id, "Acquire refused, service is not registered");
            return None;
        }

        if let Some(usage) = using.get_mut(&consumer.id()) {
            usage.count += 1;
            consumer.add_service_in_use(self);
            return Some(usage.service.clone());
        }

        let service = self.produce(consumer)?;
        using.insert(
            consumer.id(),
            Usage {
                bundle: consumer.clone(),
                count: 1,
                service: service.clone(),
            },
        );
        consumer.add_service_in_use(self);
        Some(service)
    }

    fn produce(&self, consumer: &Bundle) -> Option<ServiceObject> {
        match &self.inner.value {
            ServiceValue::Object(object) => Some(object.clone()),
            ServiceValue::Factory(factory) => {
                let produced =
                    guarded("service factory", || factory.get_service(consumer, self)).flatten();
                if produced.is_none() {
                    tracing::warn!(
                        service = %self.inner.id,
                        consumer = %consumer,
                        "Service factory produced no value"
                    );
                }
                produced
            }
            ServiceValue::FindHook(hook) => Some(Arc::new(hook.clone()) as ServiceObject),
            ServiceValue::ListenerHook(hook) => Some(Arc::new(hook.clone()) as ServiceObject),
        }
    }

    /// Give back one usage held by `consumer`.
    ///
    /// Returns `false` when the consumer holds no usage of this service.
    pub(crate) fn release(&self, consumer: &Bundle) -> bool {
        let mut using = self.inner.using.lock();
        let Some(usage) = using.get_mut(&consumer.id()) else {
            return false;
        };

        usage.count -= 1;
        consumer.remove_service_in_use(self.inner.id);
        if usage.count > 0 {
            return true;
        }

        if let Some(usage) = using.remove(&consumer.id()) {
            if let ServiceValue::Factory(factory) = &self.inner.value {
                guarded("service factory", || {
                    factory.unget_service(&usage.bundle, self, usage.service)
                });
            }
        }
        true
    }

    /// Move from REGISTERED to UNREGISTERING. Only the first caller wins.
    pub(crate) fn begin_unregister(&self) -> bool {
        let _lifecycle = self.lifecycle();
        let _using = self.inner.using.lock();
        self.inner
            .state
            .compare_exchange(
                ServiceState::Registered as u8,
                ServiceState::Unregistering as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn finish_unregister(&self) {
        self.inner
            .state
            .store(ServiceState::Unregistered as u8, Ordering::Release);
    }
}

fn with_synthetic(mut properties: Properties, id: ServiceId, names: &[ServiceName]) -> Properties {
    let classes: Vec<PropertyValue> = names
        .iter()
        .map(|name| PropertyValue::from(name.class()))
        .collect();
    properties.insert(SERVICE_ID, id.get());
    properties.insert(OBJECTCLASS, PropertyValue::List(classes));
    properties
}

impl PartialEq for ServiceRecord {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ServiceRecord {}

impl fmt::Debug for ServiceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRecord")
            .field("id", &self.inner.id)
            .field("names", &self.inner.names)
            .field("owner", &self.inner.owner.id())
            .field("kind", &self.kind())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::id::IdentityGenerator;
    use crate::value::ServiceFactory;

    static_assertions::assert_impl_all!(ServiceRecord: Send, Sync, Clone);

    fn record(value: ServiceValue, properties: Properties) -> ServiceRecord {
        let ids = IdentityGenerator::default();
        ServiceRecord::new(
            ids.next(),
            vec![ServiceName::service("com.acme.Greeter")],
            Bundle::new(BundleId::new(1), "producer"),
            value,
            properties,
        )
    }

    #[derive(Debug, Default)]
    struct Counting {
        produced: AtomicUsize,
        disposed: AtomicUsize,
    }

    #[derive(Debug, Clone, Default)]
    struct CountingFactory(Arc<Counting>);

    impl ServiceFactory for CountingFactory {
        fn get_service(&self, bundle: &Bundle, _: &ServiceRecord) -> Option<ServiceObject> {
            self.0.produced.fetch_add(1, Ordering::SeqCst);
            Some(Arc::new(format!("hello {}", bundle.symbolic_name())))
        }

        fn unget_service(&self, _: &Bundle, _: &ServiceRecord, _: ServiceObject) {
            self.0.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug)]
    struct EmptyFactory;

    impl ServiceFactory for EmptyFactory {
        fn get_service(&self, _: &Bundle, _: &ServiceRecord) -> Option<ServiceObject> {
            None
        }
    }

    #[test]
    fn synthetic_properties_are_imposed() {
        let record = record(
            ServiceValue::object(()),
            Properties::new()
                .with("SERVICE.ID", 99)
                .with("service.ranking", 4),
        );
        assert_eq!(record.property(SERVICE_ID), Some(PropertyValue::Long(1)));
        assert_eq!(
            record.property("objectclass"),
            Some(PropertyValue::List(vec!["com.acme.Greeter".into()]))
        );
        assert_eq!(record.ranking(), 4);

        assert!(record.update_properties(Properties::new().with("service.id", 12)));
        assert_eq!(record.property(SERVICE_ID), Some(PropertyValue::Long(1)));
        assert_eq!(record.ranking(), 0);
    }

    #[test]
    fn non_integer_ranking_is_zero() {
        let record = record(
            ServiceValue::object(()),
            Properties::new().with(SERVICE_RANKING, "high"),
        );
        assert_eq!(record.ranking(), 0);
    }

    #[test]
    fn factory_runs_once_per_consumer() {
        let factory = CountingFactory::default();
        let record = record(ServiceValue::factory(factory.clone()), Properties::new());
        let consumer = Bundle::new(BundleId::new(2), "consumer");

        let first = record.acquire(&consumer).unwrap();
        let second = record.acquire(&consumer).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.0.produced.load(Ordering::SeqCst), 1);
        assert_eq!(record.use_count(consumer.id()), 2);
        assert_eq!(consumer.use_count(record.id()), 2);

        assert!(record.release(&consumer));
        assert_eq!(factory.0.disposed.load(Ordering::SeqCst), 0);
        assert!(record.release(&consumer));
        assert_eq!(factory.0.disposed.load(Ordering::SeqCst), 1);
        assert!(!record.release(&consumer));
        assert!(record.using_bundles().is_empty());
        assert!(consumer.services_in_use().is_empty());
    }

    #[test]
    fn empty_factory_rolls_back() {
        let record = record(ServiceValue::factory(EmptyFactory), Properties::new());
        let consumer = Bundle::new(BundleId::new(2), "consumer");
        assert!(record.acquire(&consumer).is_none());
        assert_eq!(record.use_count(consumer.id()), 0);
        assert_eq!(consumer.use_count(record.id()), 0);
    }

    #[test]
    fn no_acquire_after_teardown_begins() {
        let record = record(ServiceValue::object(5u32), Properties::new());
        let consumer = Bundle::new(BundleId::new(2), "consumer");
        assert!(record.begin_unregister());
        assert!(!record.begin_unregister());
        assert_eq!(record.state(), ServiceState::Unregistering);
        assert!(record.acquire(&consumer).is_none());
        record.finish_unregister();
        assert_eq!(record.state(), ServiceState::Unregistered);
        assert!(!record.update_properties(Properties::new().with("color", "red")));
        assert_eq!(record.property("color"), None);
    }
}
