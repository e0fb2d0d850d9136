//! Extension-point discovery.
//!
//! Backend modules install a [`ProviderSource`] during initialization. The
//! first lookup for an extension point scans every installed source exactly
//! once and memoizes the result for the lifetime of the discovery instance;
//! sources installed afterwards are not seen by that point.

#[cfg(test)]
mod tests;

use crate::{
    convert::{CollectionReader, Converter, ValueReader, ValueWriter},
    error::ErrorClass,
    obs::sink::{self, QueryEvent},
    params::ParamsProvider,
    query::QueryParser,
    settings::SettingsProvider,
    sort::SortProvider,
};
use std::{
    fmt,
    sync::{
        Arc, LazyLock, OnceLock, PoisonError, RwLock,
        atomic::{AtomicUsize, Ordering},
    },
};
use thiserror::Error as ThisError;
use tracing::debug;

static GLOBAL: LazyLock<Arc<ProviderDiscovery>> = LazyLock::new(|| Arc::new(ProviderDiscovery::new()));

///
/// DiscoveryError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum DiscoveryError {
    #[error("ambiguous {point} providers at priority {priority}: {}", .names.join(", "))]
    Ambiguous {
        point: ExtensionPoint,
        priority: i32,
        names: Vec<String>,
    },

    #[error("no {point} provider named '{name}'")]
    NotFound { point: ExtensionPoint, name: String },
}

impl DiscoveryError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Ambiguous { .. } => ErrorClass::AmbiguousProvider,
            Self::NotFound { .. } => ErrorClass::InvalidArgument,
        }
    }
}

///
/// ExtensionPoint
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ExtensionPoint {
    CollectionReader,
    ParamsProvider,
    QueryParser,
    SettingsProvider,
    SortProvider,
    ValueReader,
    ValueWriter,
}

impl ExtensionPoint {
    pub const ALL: [Self; 7] = [
        Self::CollectionReader,
        Self::ParamsProvider,
        Self::QueryParser,
        Self::SettingsProvider,
        Self::SortProvider,
        Self::ValueReader,
        Self::ValueWriter,
    ];

    const fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ExtensionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CollectionReader => "collection_reader",
            Self::ParamsProvider => "params_provider",
            Self::QueryParser => "query_parser",
            Self::SettingsProvider => "settings_provider",
            Self::SortProvider => "sort_provider",
            Self::ValueReader => "value_reader",
            Self::ValueWriter => "value_writer",
        };
        write!(f, "{label}")
    }
}

///
/// Provider
///
/// One implementation of one extension point. The variant self-declares
/// which point it satisfies.
///

#[derive(Clone)]
pub enum Provider {
    CollectionReader(Arc<dyn CollectionReader>),
    ParamsProvider(Arc<dyn ParamsProvider>),
    QueryParser(Arc<dyn QueryParser>),
    SettingsProvider(Arc<dyn SettingsProvider>),
    SortProvider(Arc<dyn SortProvider>),
    ValueReader(Arc<dyn ValueReader>),
    ValueWriter(Arc<dyn ValueWriter>),
}

impl Provider {
    #[must_use]
    pub const fn extension_point(&self) -> ExtensionPoint {
        match self {
            Self::CollectionReader(_) => ExtensionPoint::CollectionReader,
            Self::ParamsProvider(_) => ExtensionPoint::ParamsProvider,
            Self::QueryParser(_) => ExtensionPoint::QueryParser,
            Self::SettingsProvider(_) => ExtensionPoint::SettingsProvider,
            Self::SortProvider(_) => ExtensionPoint::SortProvider,
            Self::ValueReader(_) => ExtensionPoint::ValueReader,
            Self::ValueWriter(_) => ExtensionPoint::ValueWriter,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CollectionReader(p) => p.name(),
            Self::ParamsProvider(p) => p.name(),
            Self::QueryParser(p) => p.name(),
            Self::SettingsProvider(p) => p.name(),
            Self::SortProvider(p) => p.name(),
            Self::ValueReader(p) => p.name(),
            Self::ValueWriter(p) => p.name(),
        }
    }

    /// Higher wins in `find_unique`.
    #[must_use]
    pub fn priority(&self) -> i32 {
        match self {
            Self::CollectionReader(p) => p.priority(),
            Self::ParamsProvider(p) => p.priority(),
            Self::QueryParser(p) => p.priority(),
            Self::SettingsProvider(p) => p.priority(),
            Self::SortProvider(p) => p.priority(),
            Self::ValueReader(p) => p.priority(),
            Self::ValueWriter(p) => p.priority(),
        }
    }

    /// The converter view of converter-shaped providers.
    #[must_use]
    pub fn converter(&self) -> Option<Converter> {
        match self {
            Self::CollectionReader(p) => Some(Converter::Collection(Arc::clone(p))),
            Self::ValueReader(p) => Some(Converter::Reader(Arc::clone(p))),
            Self::ValueWriter(p) => Some(Converter::Writer(Arc::clone(p))),
            _ => None,
        }
    }
}

impl From<Converter> for Provider {
    fn from(converter: Converter) -> Self {
        match converter {
            Converter::Collection(c) => Self::CollectionReader(c),
            Converter::Reader(r) => Self::ValueReader(r),
            Converter::Writer(w) => Self::ValueWriter(w),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}, priority={})",
            self.extension_point(),
            self.name(),
            self.priority()
        )
    }
}

///
/// ProviderSource
///
/// Declares the providers a backend or user module contributes.
///

pub trait ProviderSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn providers(&self) -> Vec<Provider>;
}

///
/// StaticSource
///
/// A fixed provider list, for modules that need no logic to declare theirs.
///

pub struct StaticSource {
    name: &'static str,
    providers: Vec<Provider>,
}

impl StaticSource {
    #[must_use]
    pub const fn new(name: &'static str, providers: Vec<Provider>) -> Self {
        Self { name, providers }
    }
}

impl ProviderSource for StaticSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn providers(&self) -> Vec<Provider> {
        self.providers.clone()
    }
}

///
/// ProviderDiscovery
///

pub struct ProviderDiscovery {
    sources: RwLock<Vec<Arc<dyn ProviderSource>>>,
    slots: [OnceLock<Box<[Provider]>>; ExtensionPoint::ALL.len()],
    scans: AtomicUsize,
}

impl ProviderDiscovery {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
            slots: std::array::from_fn(|_| OnceLock::new()),
            scans: AtomicUsize::new(0),
        }
    }

    /// Process-wide instance.
    #[must_use]
    pub fn global() -> &'static Arc<Self> {
        &GLOBAL
    }

    /// Register a source. Must happen before the first lookup of any point
    /// the source contributes to.
    pub fn install(&self, source: impl ProviderSource + 'static) -> &Self {
        self.install_arc(Arc::new(source))
    }

    pub fn install_arc(&self, source: Arc<dyn ProviderSource>) -> &Self {
        debug!(source = source.name(), "provider source installed");
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(source);

        self
    }

    /// Providers for `point`, highest priority first, ties in install order.
    ///
    /// Never fails; an empty slice means nothing was declared.
    #[must_use]
    pub fn find(&self, point: ExtensionPoint) -> &[Provider] {
        self.slots[point.slot()].get_or_init(|| self.scan(point))
    }

    /// The single highest-priority provider for `point`.
    pub fn find_unique(&self, point: ExtensionPoint) -> Result<Option<&Provider>, DiscoveryError> {
        let providers = self.find(point);
        let Some(top) = providers.first() else {
            return Ok(None);
        };

        let tied: Vec<String> = providers
            .iter()
            .take_while(|p| p.priority() == top.priority())
            .map(|p| p.name().to_string())
            .collect();

        if tied.len() > 1 {
            return Err(DiscoveryError::Ambiguous {
                point,
                priority: top.priority(),
                names: tied,
            });
        }

        Ok(Some(top))
    }

    /// Explicit disambiguation by provider name.
    pub fn find_named(&self, point: ExtensionPoint, name: &str) -> Result<&Provider, DiscoveryError> {
        self.find(point)
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| DiscoveryError::NotFound {
                point,
                name: name.to_string(),
            })
    }

    /// Number of scans performed so far (at most one per extension point).
    #[must_use]
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    fn scan(&self, point: ExtensionPoint) -> Box<[Provider]> {
        self.scans.fetch_add(1, Ordering::SeqCst);

        let sources = self
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut found: Vec<Provider> = sources
            .iter()
            .flat_map(|source| source.providers())
            .filter(|p| p.extension_point() == point)
            .collect();
        found.sort_by_key(|p| std::cmp::Reverse(p.priority()));

        debug!(%point, sources = sources.len(), providers = found.len(), "extension point scanned");
        sink::record(&QueryEvent::DiscoveryScan {
            point,
            providers: found.len() as u64,
        });

        found.into_boxed_slice()
    }
}

impl Default for ProviderDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProviderDiscovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved: Vec<ExtensionPoint> = ExtensionPoint::ALL
            .into_iter()
            .filter(|point| self.slots[point.slot()].get().is_some())
            .collect();

        f.debug_struct("ProviderDiscovery")
            .field("resolved", &resolved)
            .field("scans", &self.scan_count())
            .finish_non_exhaustive()
    }
}
