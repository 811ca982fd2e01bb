//! Registry builder

use std::sync::Arc;

use crate::assignable::{AssignAll, Assignability};
use crate::config::RegistryConfig;
use crate::events::{EventSink, TracingEvents};
use crate::registry::ServiceRegistry;

/// Registry builder for configuring and creating a [`ServiceRegistry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    config: RegistryConfig,
    events: Option<Arc<dyn EventSink>>,
    assignability: Option<Arc<dyn Assignability>>,
}

impl RegistryBuilder {
    /// Create a new registry builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the registry configuration
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the sink receiving service events
    ///
    /// Defaults to [`TracingEvents`], which only logs.
    pub fn events<E>(mut self, events: E) -> Self
    where
        E: EventSink + 'static,
    {
        self.events = Some(Arc::new(events));
        self
    }

    /// Set a shared event sink
    pub fn shared_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Set the assignability check used by lookups
    ///
    /// Defaults to [`AssignAll`].
    pub fn assignability<A>(mut self, assignability: A) -> Self
    where
        A: Assignability + 'static,
    {
        self.assignability = Some(Arc::new(assignability));
        self
    }

    /// Build the registry
    pub fn build(self) -> ServiceRegistry {
        ServiceRegistry::from_parts(
            self.config,
            self.events.unwrap_or_else(|| Arc::new(TracingEvents)),
            self.assignability.unwrap_or_else(|| Arc::new(AssignAll)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let registry = RegistryBuilder::new()
            .config(RegistryConfig {
                legacy_fallback: false,
                ..Default::default()
            })
            .events(TracingEvents)
            .assignability(AssignAll)
            .build();
        assert!(!registry.config().legacy_fallback);
        assert!(registry.service_names().is_empty());
    }
}
