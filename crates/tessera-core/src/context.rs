//! Shared runtime context: discovery, converters and settings.

use crate::{
    convert::{Converter, ConverterRegistry},
    discovery::{ProviderDiscovery, ProviderSource},
    error::Error,
    query::QueryRunner,
    settings::{Settings, SettingsFragment},
};
use std::sync::{Arc, LazyLock};
use tracing::debug;

static GLOBAL: LazyLock<Context> = LazyLock::new(|| {
    ContextBuilder::new()
        .discovery(Arc::clone(ProviderDiscovery::global()))
        .build()
});

///
/// Context
///
/// Everything a runner needs, assembled once. Cheap to clone; the discovery
/// instance and converter registry are shared.
///

#[derive(Clone, Debug)]
pub struct Context {
    discovery: Arc<ProviderDiscovery>,
    registry: Arc<ConverterRegistry>,
    settings: Settings,
}

impl Context {
    #[must_use]
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    /// Context over the process-wide discovery instance, built on first use.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    #[must_use]
    pub fn discovery(&self) -> &ProviderDiscovery {
        &self.discovery
    }

    #[must_use]
    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Query runner configured from this context's settings.
    pub fn runner(&self) -> Result<QueryRunner, Error> {
        QueryRunner::new(self)
    }

    pub(crate) fn discovery_arc(&self) -> Arc<ProviderDiscovery> {
        Arc::clone(&self.discovery)
    }

    pub(crate) fn registry_arc(&self) -> Arc<ConverterRegistry> {
        Arc::clone(&self.registry)
    }
}

impl Default for Context {
    fn default() -> Self {
        ContextBuilder::new().build()
    }
}

///
/// ContextBuilder
///
/// Sources are installed before anything is looked up, so every extension
/// point sees them.
///

#[derive(Default)]
pub struct ContextBuilder {
    discovery: Option<Arc<ProviderDiscovery>>,
    sources: Vec<Arc<dyn ProviderSource>>,
    fragments: Vec<SettingsFragment>,
    converters: Vec<Converter>,
}

impl ContextBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing discovery instance instead of a fresh one.
    #[must_use]
    pub fn discovery(mut self, discovery: Arc<ProviderDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    #[must_use]
    pub fn source(mut self, source: impl ProviderSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Explicit settings, applied over every provider fragment in the order
    /// given.
    #[must_use]
    pub fn fragment(mut self, fragment: SettingsFragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    /// Converter registered after everything discovered.
    #[must_use]
    pub fn converter(mut self, converter: Converter) -> Self {
        self.converters.push(converter);
        self
    }

    #[must_use]
    pub fn build(self) -> Context {
        let discovery = self.discovery.unwrap_or_default();
        for source in self.sources {
            discovery.install_arc(source);
        }

        let mut registry = ConverterRegistry::from_discovery(&discovery);
        for converter in self.converters {
            registry.register(converter);
        }
        let settings = Settings::assemble(&discovery, self.fragments);

        debug!(
            converters = registry.names().len(),
            settings = settings.len(),
            "context built"
        );

        Context {
            discovery,
            registry: Arc::new(registry),
            settings,
        }
    }
}
