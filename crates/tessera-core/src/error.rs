use crate::{
    convert::ConversionError, discovery::DiscoveryError, params::BindingError,
    query::QuerySyntaxError,
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Structured error returned by every fallible operation in the core.
/// Callers branch on `class`; `detail` carries the module-level payload.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct Error {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `class`.
    pub detail: Option<ErrorDetail>,
}

impl Error {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct an argument error raised before any work begins.
    pub fn invalid_argument(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidArgument, origin, message)
    }

    /// Construct a failure reported by a backend execution contract.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Backend, ErrorOrigin::Backend, message)
    }

    /// Attach a conversion failure to the field it occurred on.
    #[must_use]
    pub fn for_field(self, field: &str) -> Self {
        match self.detail {
            Some(ErrorDetail::Conversion(err)) => ConversionError::Field {
                field: field.to_string(),
                source: Box::new(err),
            }
            .into(),
            detail => Self {
                message: format!("{field}: {}", self.message),
                detail,
                ..self
            },
        }
    }

    #[must_use]
    pub const fn is_syntax(&self) -> bool {
        matches!(self.class, ErrorClass::QuerySyntax)
    }

    #[must_use]
    pub const fn syntax_detail(&self) -> Option<&QuerySyntaxError> {
        match &self.detail {
            Some(ErrorDetail::Syntax(err)) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub const fn binding_detail(&self) -> Option<&BindingError> {
        match &self.detail {
            Some(ErrorDetail::Binding(err)) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Module-level error payload carried by [`Error`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Binding(BindingError),

    #[error("{0}")]
    Conversion(ConversionError),

    #[error("{0}")]
    Discovery(DiscoveryError),

    #[error("{0}")]
    Syntax(QuerySyntaxError),
}

impl From<BindingError> for Error {
    fn from(err: BindingError) -> Self {
        Self {
            class: err.class(),
            origin: ErrorOrigin::Params,
            message: err.to_string(),
            detail: Some(ErrorDetail::Binding(err)),
        }
    }
}

impl From<ConversionError> for Error {
    fn from(err: ConversionError) -> Self {
        Self {
            class: err.class(),
            origin: ErrorOrigin::Convert,
            message: err.to_string(),
            detail: Some(ErrorDetail::Conversion(err)),
        }
    }
}

impl From<DiscoveryError> for Error {
    fn from(err: DiscoveryError) -> Self {
        Self {
            class: err.class(),
            origin: ErrorOrigin::Discovery,
            message: err.to_string(),
            detail: Some(ErrorDetail::Discovery(err)),
        }
    }
}

impl From<QuerySyntaxError> for Error {
    fn from(err: QuerySyntaxError) -> Self {
        Self {
            class: ErrorClass::QuerySyntax,
            origin: ErrorOrigin::Query,
            message: err.to_string(),
            detail: Some(ErrorDetail::Syntax(err)),
        }
    }
}

///
/// ErrorClass
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorClass {
    AmbiguousProvider,
    Backend,
    InvalidArgument,
    MissingBinding,
    QuerySyntax,
    UnsupportedConversion,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AmbiguousProvider => "ambiguous_provider",
            Self::Backend => "backend",
            Self::InvalidArgument => "invalid_argument",
            Self::MissingBinding => "missing_binding",
            Self::QuerySyntax => "query_syntax",
            Self::UnsupportedConversion => "unsupported_conversion",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorOrigin {
    Backend,
    Convert,
    Discovery,
    Params,
    Query,
    Settings,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Backend => "backend",
            Self::Convert => "convert",
            Self::Discovery => "discovery",
            Self::Params => "params",
            Self::Query => "query",
            Self::Settings => "settings",
        };
        write!(f, "{label}")
    }
}
