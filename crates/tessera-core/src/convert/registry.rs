use crate::{
    convert::{
        CollectionReader, ConversionError, Converter, ValueReader, ValueWriter, builtin,
    },
    discovery::{ExtensionPoint, ProviderDiscovery},
    value::{Value, ValueBox, ValueType},
};
use std::{fmt, sync::Arc};
use tracing::{debug, trace};

///
/// ResolutionPath
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResolutionPath {
    Exact,
    Capability,
    Identity,
}

///
/// Resolution
///
/// Which converter a `(source, target)` pair resolves to, and why.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Resolution {
    pub path: ResolutionPath,
    pub converter: Option<&'static str>,
}

///
/// ConverterRegistry
///
/// Ordered reader/writer/collection-reader sets. Populate during
/// initialization, then share read-only.
///

#[derive(Clone, Default)]
pub struct ConverterRegistry {
    readers: Vec<Arc<dyn ValueReader>>,
    writers: Vec<Arc<dyn ValueWriter>>,
    collections: Vec<Arc<dyn CollectionReader>>,
}

impl ConverterRegistry {
    /// Empty registry; only identity and `Null` pass-through resolve.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in converters.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for converter in builtin::builtin_converters() {
            registry.register(converter);
        }

        registry
    }

    /// Built-ins first, then discovered converters in discovery order.
    ///
    /// Built-in readers answer `applies_to` for every scalar pair they can
    /// convert, so a discovered reader replaces one only by declaring an
    /// exact `signature`; exact matches are tried before any capability
    /// check. Capability-only readers take pairs no built-in handles.
    #[must_use]
    pub fn from_discovery(discovery: &ProviderDiscovery) -> Self {
        let mut registry = Self::with_builtins();

        for point in [
            ExtensionPoint::ValueReader,
            ExtensionPoint::ValueWriter,
            ExtensionPoint::CollectionReader,
        ] {
            for provider in discovery.find(point) {
                if let Some(converter) = provider.converter() {
                    registry.register(converter);
                }
            }
        }

        debug!(
            readers = registry.readers.len(),
            writers = registry.writers.len(),
            collections = registry.collections.len(),
            "converter registry assembled"
        );

        registry
    }

    pub fn register(&mut self, converter: Converter) -> &mut Self {
        match converter {
            Converter::Collection(c) => self.collections.push(c),
            Converter::Reader(r) => self.readers.push(r),
            Converter::Writer(w) => self.writers.push(w),
        }

        self
    }

    /// Names of all registered converters in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.readers
            .iter()
            .map(|r| r.name())
            .chain(self.writers.iter().map(|w| w.name()))
            .chain(self.collections.iter().map(|c| c.name()))
            .collect()
    }

    ///
    /// READ
    ///

    /// Coerce `value` toward `target`, producing a new box.
    ///
    /// `Null` resolves to a `Null` declared as `target` for every target,
    /// containers included; `Vec`/`BTreeSet` fields materialize it as an
    /// empty container and `Option` fields as `None`.
    pub fn resolve(&self, value: &ValueBox, target: &ValueType) -> Result<ValueBox, ConversionError> {
        if value.is_null() {
            return Ok(ValueBox::null_of(target.clone()));
        }

        let source = value.effective_source();
        let resolved = if target.is_multiple() {
            self.select_collection(&source, target)
                .map(|(_, reader)| reader.read(value, target, self))
        } else {
            self.select_reader(&source, target)
                .map(|(_, reader)| reader.read(value, target))
        };

        match resolved {
            Some(result) => result,
            None if source.satisfies(target) => Ok(value.clone()),
            None => Err(ConversionError::unsupported(value, target)),
        }
    }

    /// Report the resolution path for a type pair without converting.
    #[must_use]
    pub fn explain(&self, source: &ValueType, target: &ValueType) -> Option<Resolution> {
        let selected = if target.is_multiple() {
            self.select_collection(source, target)
                .map(|(path, reader)| (path, reader.name()))
        } else {
            self.select_reader(source, target)
                .map(|(path, reader)| (path, reader.name()))
        };

        match selected {
            Some((path, name)) => Some(Resolution {
                path,
                converter: Some(name),
            }),
            None if source.satisfies(target) => Some(Resolution {
                path: ResolutionPath::Identity,
                converter: None,
            }),
            None => None,
        }
    }

    fn select_reader(
        &self,
        source: &ValueType,
        target: &ValueType,
    ) -> Option<(ResolutionPath, &dyn ValueReader)> {
        let exact = self.readers.iter().find(|r| {
            r.signature()
                .is_some_and(|(from, to)| from == *source && to == *target)
        });
        if let Some(reader) = exact {
            trace!(converter = reader.name(), %source, %target, "exact reader");
            return Some((ResolutionPath::Exact, reader.as_ref()));
        }

        self.readers
            .iter()
            .find(|r| r.applies_to(source, target))
            .map(|reader| (ResolutionPath::Capability, reader.as_ref()))
    }

    fn select_collection(
        &self,
        source: &ValueType,
        target: &ValueType,
    ) -> Option<(ResolutionPath, &dyn CollectionReader)> {
        let exact = self
            .collections
            .iter()
            .find(|c| c.target().is_some_and(|to| to == *target));
        if let Some(reader) = exact {
            return Some((ResolutionPath::Exact, reader.as_ref()));
        }

        self.collections
            .iter()
            .find(|c| c.applies_to(source, target))
            .map(|reader| (ResolutionPath::Capability, reader.as_ref()))
    }

    ///
    /// WRITE
    ///

    /// Convert a value into the representation a backend stores.
    ///
    /// Kinds stored natively pass through unless a writer claims them;
    /// lists are written element by element.
    pub fn write(&self, value: &ValueBox) -> Result<ValueBox, ConversionError> {
        match value.value() {
            Value::Null => Ok(value.clone()),
            Value::List(items) => {
                let written = items
                    .iter()
                    .map(|item| {
                        self.write(&ValueBox::new(item.clone()))
                            .map(ValueBox::into_value)
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(ValueBox::new(Value::List(written)))
            }
            scalar => {
                let Some(kind) = scalar.scalar_kind() else {
                    return Ok(value.clone());
                };

                let source = ValueType::Scalar(kind);
                let writer = self
                    .writers
                    .iter()
                    .find(|w| w.source() == Some(kind))
                    .or_else(|| self.writers.iter().find(|w| w.applies_to(&source)));

                match writer {
                    Some(writer) => writer.write(value),
                    None if kind.is_backend_native() => Ok(value.clone()),
                    None => Err(ConversionError::unsupported(value, &ValueType::Any)),
                }
            }
        }
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("converters", &self.names())
            .finish()
    }
}
