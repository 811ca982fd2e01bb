//! Registry configuration

use filter::Properties;
use serde::Deserialize;

use crate::bundle::{Bundle, BundleId};
use crate::error::RegistryResult;
use crate::name::HOOK_NAMESPACE;
use crate::registry::ServiceRegistry;
use crate::value::ServiceValue;

/// Tunables for a [`ServiceRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RegistryConfig {
    /// Lookups for names starting with this prefix bypass find hooks.
    pub hook_namespace: String,

    /// Fall back to the legacy namespace when no bundle publishes a name.
    pub legacy_fallback: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            hook_namespace: HOOK_NAMESPACE.to_owned(),
            legacy_fallback: true,
        }
    }
}

impl RegistryConfig {
    /// Whether lookups for `class` are exempt from find hooks.
    pub fn is_hook_name(&self, class: &str) -> bool {
        !self.hook_namespace.is_empty() && class.starts_with(&self.hook_namespace)
    }
}

/// A registry described declaratively: its config and an initial set of
/// bundles with the services they publish.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RegistryFile {
    /// Registry tunables.
    pub registry: RegistryConfig,

    /// Bundles to install.
    #[serde(rename = "bundle")]
    pub bundles: Vec<BundleConfig>,
}

/// A bundle and the services it publishes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BundleConfig {
    /// Bundle identifier.
    pub id: BundleId,

    /// Symbolic name.
    pub name: String,

    /// Services registered by this bundle.
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceConfig>,
}

/// A declared service. The service value is the declaration itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServiceConfig {
    /// Names to publish under.
    pub names: Vec<String>,

    /// Service properties.
    #[serde(default)]
    pub properties: Properties,

    /// Publish into the legacy namespace, one record per name.
    #[serde(default)]
    pub legacy: bool,
}

impl RegistryFile {
    /// Register every declared service, returning the installed bundles.
    pub fn install(&self, registry: &ServiceRegistry) -> RegistryResult<Vec<Bundle>> {
        let mut bundles = Vec::with_capacity(self.bundles.len());
        for config in &self.bundles {
            let bundle = Bundle::new(config.id, config.name.clone());

            for service in &config.services {
                if service.legacy {
                    for name in &service.names {
                        registry.register_legacy(
                            &bundle,
                            name,
                            ServiceValue::object(service.clone()),
                            service.properties.clone(),
                        )?;
                    }
                } else {
                    registry.register(
                        &bundle,
                        service.names.as_slice(),
                        ServiceValue::object(service.clone()),
                        service.properties.clone(),
                    )?;
                }
            }
            bundles.push(bundle);
        }
        Ok(bundles)
    }
}
