//! Capability names

use std::fmt;
use std::sync::Arc;

/// Class name of the find hook capability.
pub const FIND_HOOK: &str = "org.osgi.framework.hooks.service.FindHook";

/// Class name of the listener hook capability.
pub const LISTENER_HOOK: &str = "org.osgi.framework.hooks.service.ListenerHook";

/// Package containing the service hook capabilities.
pub const HOOK_NAMESPACE: &str = "org.osgi.framework.hooks.service";

/// The namespace a service name is published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Services registered by bundles.
    Service,

    /// Services contributed by the surrounding container, consulted when no
    /// bundle publishes the requested name.
    Legacy,
}

/// A capability name: the key services are published and looked up under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceName {
    namespace: Namespace,
    class: Arc<str>,
}

impl ServiceName {
    /// A name in the bundle service namespace.
    pub fn service(class: &str) -> Self {
        Self {
            namespace: Namespace::Service,
            class: class.into(),
        }
    }

    /// A name in the legacy namespace.
    pub fn legacy(class: &str) -> Self {
        Self {
            namespace: Namespace::Legacy,
            class: class.into(),
        }
    }

    /// The namespace of this name.
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// The class name, without namespace.
    pub fn class(&self) -> &str {
        &self.class
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace {
            Namespace::Service => write!(f, "service:{}", self.class),
            Namespace::Legacy => write!(f, "xservice:{}", self.class),
        }
    }
}
