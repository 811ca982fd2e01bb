//! Publish a few greeters, hide one with a find hook and pick the best.
//!
//! Run with: cargo run -p service-registry --example greeter

use service_registry::{
    Bundle, BundleId, FIND_HOOK, FindCandidates, FindHook, HookError, Properties,
    ServiceRegistry, ServiceValue,
};

#[derive(Debug)]
struct HideFrench;

impl FindHook for HideFrench {
    fn find(
        &self,
        _: &Bundle,
        _: Option<&str>,
        _: Option<&str>,
        _: bool,
        candidates: &mut FindCandidates,
    ) -> Result<(), HookError> {
        candidates.retain(|record| {
            record
                .property("language")
                .and_then(|language| language.as_str().map(|l| l != "fr"))
                .unwrap_or(true)
        });
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let registry = ServiceRegistry::new();
    let producer = Bundle::new(BundleId::new(1), "com.acme.greeters");
    let consumer = Bundle::new(BundleId::new(2), "com.acme.app");

    let greeters = [("en", "Hello", 0), ("fr", "Bonjour", 10), ("de", "Hallo", 5)];
    for (language, greeting, ranking) in greeters {
        registry.register(
            &producer,
            &["com.acme.Greeter"],
            ServiceValue::object(greeting.to_string()),
            Properties::new()
                .with("language", language)
                .with("service.ranking", ranking),
        )?;
    }

    registry.register(
        &producer,
        &[FIND_HOOK],
        ServiceValue::find_hook(HideFrench),
        Properties::new(),
    )?;

    for record in registry.get_service_references(&consumer, Some("com.acme.Greeter"), None)? {
        tracing::info!(service = %record.id(), ranking = record.ranking(), "Found greeter");
    }

    if let Some(best) = registry.get_service_reference(&consumer, "com.acme.Greeter")? {
        if let Some(greeting) = registry.get_service_as::<String>(&consumer, &best) {
            println!("{greeting}, world!");
            registry.unget_service(&consumer, &best);
        }
    }

    registry.unregister_services(&producer);
    Ok(())
}
