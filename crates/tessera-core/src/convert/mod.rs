//! Value coercion between application types and backend representations.
//!
//! Resolution order is part of the contract and is observable through
//! [`ConverterRegistry::explain`]:
//!
//! 1. a converter whose declared signature matches exactly
//! 2. the first converter, in registration order, whose `applies_to` accepts
//! 3. identity, when the source already satisfies the target
//!
//! Targets describing multiplicity (`List`/`Set`) resolve through collection
//! readers; everything else resolves through scalar readers.

mod builtin;
mod registry;


use crate::{
    discovery::ExtensionPoint,
    error::ErrorClass,
    value::{ValueBox, ValueType},
};
use std::{fmt, sync::Arc};
use tessera_primitives::ScalarKind;
use thiserror::Error as ThisError;

// re-exports
pub use builtin::{builtin_converters, read_scalar};
pub use registry::{ConverterRegistry, Resolution, ResolutionPath};

///
/// ConversionError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ConversionError {
    #[error("field '{field}': {source}")]
    Field {
        field: String,
        source: Box<Self>,
    },

    #[error("value {value} is out of range for {to}")]
    OutOfRange { value: String, to: ValueType },

    #[error("cannot parse {value} as {to}")]
    Parse { value: String, to: ValueType },

    #[error("value of type {found} does not satisfy declared type {declared}")]
    TypeMismatch {
        declared: ValueType,
        found: ValueType,
    },

    #[error("no converter from {from} to {to} for value {value}")]
    Unsupported {
        from: ValueType,
        to: ValueType,
        value: String,
    },
}

impl ConversionError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Field { source, .. } => source.class(),
            Self::TypeMismatch { .. } => ErrorClass::InvalidArgument,
            Self::OutOfRange { .. } | Self::Parse { .. } | Self::Unsupported { .. } => {
                ErrorClass::UnsupportedConversion
            }
        }
    }

    pub(crate) fn unsupported(value: &ValueBox, to: &ValueType) -> Self {
        Self::Unsupported {
            from: value.effective_source(),
            to: to.clone(),
            value: value.value().to_string(),
        }
    }
}

///
/// ValueReader
///
/// Scalar conversion strategy. Implementations are pure: they never retain
/// or mutate shared state. A reader either declares an exact
/// `(source, target)` signature, answers `applies_to`, or both.
///

pub trait ValueReader: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32 {
        0
    }

    fn signature(&self) -> Option<(ValueType, ValueType)> {
        None
    }

    fn applies_to(&self, _source: &ValueType, _target: &ValueType) -> bool {
        false
    }

    fn read(&self, value: &ValueBox, target: &ValueType) -> Result<ValueBox, ConversionError>;
}

///
/// ValueWriter
///
/// Application-to-backend conversion strategy, selected by source kind.
///

pub trait ValueWriter: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32 {
        0
    }

    fn source(&self) -> Option<ScalarKind> {
        None
    }

    fn applies_to(&self, _source: &ValueType) -> bool {
        false
    }

    fn write(&self, value: &ValueBox) -> Result<ValueBox, ConversionError>;
}

///
/// CollectionReader
///
/// Container conversion strategy. Receives the raw source plus the target,
/// whose element type is the hint used to coerce each element through the
/// registry.
///

pub trait CollectionReader: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32 {
        0
    }

    fn target(&self) -> Option<ValueType> {
        None
    }

    fn applies_to(&self, _source: &ValueType, _target: &ValueType) -> bool {
        false
    }

    fn read(
        &self,
        value: &ValueBox,
        target: &ValueType,
        registry: &ConverterRegistry,
    ) -> Result<ValueBox, ConversionError>;
}

///
/// Converter
///
/// A registrable converter; the variant declares the extension point.
///

#[derive(Clone)]
pub enum Converter {
    Collection(Arc<dyn CollectionReader>),
    Reader(Arc<dyn ValueReader>),
    Writer(Arc<dyn ValueWriter>),
}

impl Converter {
    pub fn reader(reader: impl ValueReader + 'static) -> Self {
        Self::Reader(Arc::new(reader))
    }

    pub fn writer(writer: impl ValueWriter + 'static) -> Self {
        Self::Writer(Arc::new(writer))
    }

    pub fn collection(reader: impl CollectionReader + 'static) -> Self {
        Self::Collection(Arc::new(reader))
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Collection(c) => c.name(),
            Self::Reader(r) => r.name(),
            Self::Writer(w) => w.name(),
        }
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        match self {
            Self::Collection(c) => c.priority(),
            Self::Reader(r) => r.priority(),
            Self::Writer(w) => w.priority(),
        }
    }

    #[must_use]
    pub const fn extension_point(&self) -> ExtensionPoint {
        match self {
            Self::Collection(_) => ExtensionPoint::CollectionReader,
            Self::Reader(_) => ExtensionPoint::ValueReader,
            Self::Writer(_) => ExtensionPoint::ValueWriter,
        }
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.extension_point(), self.name())
    }
}
