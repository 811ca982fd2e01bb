//! # Service Registry
//!
//! A dynamic service registry for modular applications. Bundles publish
//! services under one or more capability names together with a set of
//! properties; other bundles discover them by name and [RFC 1960] property
//! filter, and take counted usages of their values.
//!
//! ## Features
//!
//! - Concurrent index with no registry-wide lock
//! - Lookups ordered by `service.ranking`, then by registration order
//! - Find hooks which can hide services from lookups
//! - Listener hooks informed of service listener interest
//! - Per-consumer usage counting and service factories
//! - A legacy namespace consulted when no bundle publishes a name
//!
//! ## Example
//!
//! ```
//! use service_registry::{Bundle, BundleId, Properties, ServiceRegistry, ServiceValue};
//!
//! let registry = ServiceRegistry::new();
//! let producer = Bundle::new(BundleId::new(1), "com.acme.greeter");
//! let consumer = Bundle::new(BundleId::new(2), "com.acme.app");
//!
//! registry
//!     .register(
//!         &producer,
//!         &["com.acme.Greeter"],
//!         ServiceValue::object(String::from("hello")),
//!         Properties::new().with("language", "en"),
//!     )
//!     .unwrap();
//!
//! let reference = registry
//!     .get_service_reference(&consumer, "com.acme.Greeter")
//!     .unwrap()
//!     .expect("greeter is registered");
//! let greeting = registry.get_service_as::<String>(&consumer, &reference).unwrap();
//! assert_eq!(greeting.as_str(), "hello");
//! assert!(registry.unget_service(&consumer, &reference));
//! ```
//!
//! [RFC 1960]: https://www.rfc-editor.org/rfc/rfc1960

mod api;
mod assignable;
mod bundle;
mod comparator;
mod config;
mod error;
mod events;
mod hooks;
mod id;
mod index;
mod lookup;
mod name;
mod record;
mod registry;
mod value;

pub use api::RegistryBuilder;
pub use assignable::{AssignAll, Assignability};
pub use bundle::{Bundle, BundleId};
pub use comparator::compare;
pub use config::{BundleConfig, RegistryConfig, RegistryFile, ServiceConfig};
pub use error::{RegistryError, RegistryResult};
pub use events::{EventSink, ServiceEventKind, TracingEvents};
pub use filter::{Filter, FilterError, FilterErrorKind, Properties, PropertyValue};
pub use hooks::{FindCandidates, FindHook, HookError, ListenerHook, ListenerInfo};
pub use id::ServiceId;
pub use name::{FIND_HOOK, HOOK_NAMESPACE, LISTENER_HOOK, Namespace, ServiceName};
pub use record::{OBJECTCLASS, SERVICE_ID, SERVICE_RANKING, ServiceRecord, ServiceState};
pub use registry::ServiceRegistry;
pub use value::{ServiceFactory, ServiceObject, ServiceValue, ValueKind};
