//! Named placeholder bindings.

use crate::{
    discovery::{ExtensionPoint, Provider, ProviderDiscovery},
    error::{Error, ErrorClass},
    query::Operator,
    value::{Value, ValueBox},
};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error as ThisError;

/// Reserved leading sigil marking a placeholder in query text.
pub const PLACEHOLDER_SIGIL: char = '?';

///
/// BindingError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum BindingError {
    #[error("literal {value} is not allowed in a prepared statement; bind it as a placeholder")]
    LiteralNotAllowed { value: String },

    #[error("missing binding for placeholder(s): {}", format_names(.names))]
    Missing { names: Vec<String> },

    #[error("placeholder ?{name} is not allowed in an immediate query")]
    PlaceholderNotAllowed { name: String },

    #[error("{operator} needs an ordered value, got {value}")]
    UnorderedOperand { operator: Operator, value: String },

    #[error("statement has no placeholder named ?{name}")]
    UnknownPlaceholder { name: String },

    #[error("{value} cannot be used as a key-value key")]
    UnkeyableKey { value: String },
}

impl BindingError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Missing { .. } => ErrorClass::MissingBinding,
            Self::LiteralNotAllowed { .. }
            | Self::PlaceholderNotAllowed { .. }
            | Self::UnkeyableKey { .. }
            | Self::UnknownPlaceholder { .. }
            | Self::UnorderedOperand { .. } => ErrorClass::InvalidArgument,
        }
    }
}

fn format_names(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("{PLACEHOLDER_SIGIL}{name}"))
        .collect::<Vec<_>>()
        .join(", ")
}

///
/// ParamsProvider
///
/// Adapts bound values for a backend before execution.
///

pub trait ParamsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32 {
        0
    }

    fn adapt(&self, name: &str, value: ValueBox) -> Result<ValueBox, Error>;
}

///
/// Params
///
/// Placeholder name to bound value. Names are stored without the sigil.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Params {
    bindings: BTreeMap<String, ValueBox>,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind (or rebind) `name`; a leading sigil is accepted and dropped.
    pub fn bind(&mut self, name: impl AsRef<str>, value: impl Into<Value>) -> &mut Self {
        self.bind_box(name, ValueBox::new(value))
    }

    pub fn bind_box(&mut self, name: impl AsRef<str>, value: ValueBox) -> &mut Self {
        self.bindings.insert(normalize(name.as_ref()), value);
        self
    }

    #[must_use]
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.bind(name, value);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ValueBox> {
        self.bindings.get(strip_sigil(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValueBox)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(strip_sigil(name))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Every name in `required` must be bound. Missing names are reported
    /// together, in order; nothing is defaulted.
    pub fn validate(&self, required: &BTreeSet<String>) -> Result<(), BindingError> {
        let missing: Vec<String> = required
            .iter()
            .filter(|name| !self.bindings.contains_key(name.as_str()))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(BindingError::Missing { names: missing })
        }
    }

    /// Every bound name must be one the statement declares.
    pub fn validate_known(&self, declared: &BTreeSet<String>) -> Result<(), BindingError> {
        match self.names().find(|name| !declared.contains(*name)) {
            Some(name) => Err(BindingError::UnknownPlaceholder {
                name: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Run bindings through every discovered params provider, highest
    /// priority first.
    pub fn adapt(&self, discovery: &ProviderDiscovery) -> Result<Self, Error> {
        let providers = discovery.find(ExtensionPoint::ParamsProvider);
        if providers.is_empty() {
            return Ok(self.clone());
        }

        let mut adapted = BTreeMap::new();
        for (name, value) in &self.bindings {
            let mut value = value.clone();
            for provider in providers {
                if let Provider::ParamsProvider(p) = provider {
                    value = p.adapt(name, value)?;
                }
            }
            adapted.insert(name.clone(), value);
        }

        Ok(Self { bindings: adapted })
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.bind(name, value);
        }

        params
    }
}

fn strip_sigil(name: &str) -> &str {
    name.strip_prefix(PLACEHOLDER_SIGIL).unwrap_or(name)
}

fn normalize(name: &str) -> String {
    strip_sigil(name).to_string()
}

///
/// TESTS
///
