//! Backend execution contract and the query runner.

use crate::{
    context::Context,
    convert::ConverterRegistry,
    discovery::{DiscoveryError, ExtensionPoint, Provider, ProviderDiscovery},
    error::{Error, ErrorOrigin},
    obs::sink::{self, QueryEvent},
    params::{BindingError, Params},
    query::{
        descriptor::{BoundOperation, DataModel, OperationDescriptor},
        parser::{QueryParser, StandardParser},
        prepared::PreparedStatement,
    },
    settings::Settings,
    traits::FieldValue,
    value::{Value, ValueBox},
};
use std::sync::Arc;
use tracing::debug;

/// Settings key: reject any placeholder in immediate mode.
pub const IMMEDIATE_REJECT_PLACEHOLDERS: &str = "query.immediate.reject_placeholders";

/// Settings key: allow literal operands in prepared statements.
pub const PREPARED_ALLOW_LITERALS: &str = "query.prepared.allow_literals";

///
/// Record
///
/// One raw result row: ordered `(field, ValueBox)` pairs in backend form.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Record {
    fields: Vec<(String, ValueBox)>,
}

impl Record {
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, ValueBox::new(value));
        self
    }

    /// Set `field`, replacing an existing value in place.
    pub fn set(&mut self, field: impl Into<String>, value: ValueBox) {
        let field = field.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((field, value)),
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&ValueBox> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Field value, with a missing field reading as `Null`.
    #[must_use]
    pub fn value(&self, field: &str) -> &Value {
        self.get(field).map_or(&Value::Null, ValueBox::value)
    }

    /// Coerce one field into an application type.
    pub fn get_as<T: FieldValue>(&self, field: &str, registry: &ConverterRegistry) -> Result<T, Error> {
        let null = ValueBox::null();
        let value = self.get(field).unwrap_or(&null);

        value
            .get(registry)
            .map_err(|err| Error::from(err).for_field(field))
    }

    /// Copy holding only `fields`, in that order; absent fields are skipped.
    #[must_use]
    pub fn project(&self, fields: &[String]) -> Self {
        let fields = fields
            .iter()
            .filter_map(|f| self.get(f).map(|v| (f.clone(), v.clone())))
            .collect();

        Self { fields }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &ValueBox)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, ValueBox)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, ValueBox)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (field, value) in iter {
            record.set(field, value);
        }

        record
    }
}

///
/// QueryResult
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueryResult {
    records: Vec<Record>,
}

impl QueryResult {
    #[must_use]
    pub const fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    #[must_use]
    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

impl IntoIterator for QueryResult {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

///
/// Backend
///
/// Execution contract a storage backend satisfies. Receives fully bound
/// operations; transient failures are the backend's concern.
///

pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    fn data_model(&self) -> DataModel;

    fn execute(&self, operation: &BoundOperation) -> Result<Vec<Record>, Error>;
}

///
/// PlaceholderPolicy
///
/// Immediate-mode strictness. `Resolve` binds placeholders against the
/// supplied params; `Reject` refuses any placeholder syntax.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PlaceholderPolicy {
    Reject,
    #[default]
    Resolve,
}

///
/// LiteralPolicy
///
/// Prepared-mode strictness. `Reject` requires every operand to be a
/// placeholder.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LiteralPolicy {
    #[default]
    Allow,
    Reject,
}

///
/// QueryOptions
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct QueryOptions {
    pub placeholders: PlaceholderPolicy,
    pub literals: LiteralPolicy,
}

impl QueryOptions {
    pub fn from_settings(settings: &Settings, registry: &ConverterRegistry) -> Result<Self, Error> {
        let reject_placeholders = settings.get_or(IMMEDIATE_REJECT_PLACEHOLDERS, registry, false)?;
        let allow_literals = settings.get_or(PREPARED_ALLOW_LITERALS, registry, true)?;

        Ok(Self {
            placeholders: if reject_placeholders {
                PlaceholderPolicy::Reject
            } else {
                PlaceholderPolicy::Resolve
            },
            literals: if allow_literals {
                LiteralPolicy::Allow
            } else {
                LiteralPolicy::Reject
            },
        })
    }
}

///
/// QueryRunner
///
/// Parses, binds and hands operations to a backend. Immediate mode does all
/// three per call; prepared mode parses once.
///

#[derive(Clone, Debug)]
pub struct QueryRunner {
    discovery: Arc<ProviderDiscovery>,
    registry: Arc<ConverterRegistry>,
    options: QueryOptions,
}

impl QueryRunner {
    /// Runner over `context`, with options read from its settings.
    pub fn new(context: &Context) -> Result<Self, Error> {
        let options = QueryOptions::from_settings(context.settings(), context.registry())?;

        Ok(Self {
            discovery: context.discovery_arc(),
            registry: context.registry_arc(),
            options,
        })
    }

    #[must_use]
    pub const fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub const fn options(&self) -> &QueryOptions {
        &self.options
    }

    #[must_use]
    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    ///
    /// PARSE
    ///

    /// Parse `text` for `model` with the selected grammar.
    pub fn parse(&self, text: &str, model: DataModel) -> Result<OperationDescriptor, Error> {
        if text.trim().is_empty() {
            return Err(Error::invalid_argument(
                ErrorOrigin::Query,
                "query text must not be empty",
            ));
        }

        let parser = self.select_parser(model)?;
        let result = parser.parse(text, model);

        sink::record(&QueryEvent::Parse {
            model,
            ok: result.is_ok(),
        });
        debug!(parser = parser.name(), %model, ok = result.is_ok(), "query parsed");

        result
    }

    // Highest-priority discovered grammar supporting `model`; ties are
    // ambiguous. Falls back to the standard grammar.
    fn select_parser(&self, model: DataModel) -> Result<Arc<dyn QueryParser>, Error> {
        let candidates: Vec<&Arc<dyn QueryParser>> = self
            .discovery
            .find(ExtensionPoint::QueryParser)
            .iter()
            .filter_map(|provider| match provider {
                Provider::QueryParser(p) if p.supports(model) => Some(p),
                _ => None,
            })
            .collect();

        let Some(top) = candidates.first() else {
            return Ok(Arc::new(StandardParser));
        };
        let tied: Vec<String> = candidates
            .iter()
            .take_while(|p| p.priority() == top.priority())
            .map(|p| p.name().to_string())
            .collect();

        if tied.len() > 1 {
            return Err(DiscoveryError::Ambiguous {
                point: ExtensionPoint::QueryParser,
                priority: top.priority(),
                names: tied,
            }
            .into());
        }

        Ok(Arc::clone(top))
    }

    ///
    /// EXECUTE
    ///

    /// Immediate mode: parse, resolve placeholders against `params`, execute.
    pub fn execute(
        &self,
        backend: &dyn Backend,
        text: &str,
        params: &Params,
    ) -> Result<QueryResult, Error> {
        let descriptor = self.parse(text, backend.data_model())?;

        if self.options.placeholders == PlaceholderPolicy::Reject
            && let Some(name) = descriptor.first_placeholder()
        {
            return Err(BindingError::PlaceholderNotAllowed {
                name: name.to_string(),
            }
            .into());
        }

        self.run(backend, &descriptor, params)
    }

    /// Prepared mode under the configured literal policy.
    pub fn prepare(&self, backend: &dyn Backend, text: &str) -> Result<PreparedStatement, Error> {
        self.prepare_with(backend, text, self.options.literals)
    }

    /// Prepared mode with an explicit literal policy for this call site.
    pub fn prepare_with(
        &self,
        backend: &dyn Backend,
        text: &str,
        literals: LiteralPolicy,
    ) -> Result<PreparedStatement, Error> {
        let descriptor = self.parse(text, backend.data_model())?;

        if literals == LiteralPolicy::Reject
            && let Some(value) = descriptor.first_literal()
        {
            return Err(BindingError::LiteralNotAllowed {
                value: value.to_string(),
            }
            .into());
        }

        Ok(PreparedStatement::new(descriptor))
    }

    /// Bind `descriptor` against `params` and execute it on `backend`.
    pub fn run(
        &self,
        backend: &dyn Backend,
        descriptor: &OperationDescriptor,
        params: &Params,
    ) -> Result<QueryResult, Error> {
        if descriptor.model != backend.data_model() {
            return Err(Error::invalid_argument(
                ErrorOrigin::Query,
                format!(
                    "statement parsed for the {} model cannot run on {} backend '{}'",
                    descriptor.model,
                    backend.data_model(),
                    backend.name()
                ),
            ));
        }

        let params = params.adapt(&self.discovery)?;
        let bound = descriptor.bind(&params, &self.registry);
        sink::record(&QueryEvent::Bind {
            placeholders: descriptor.placeholders().len() as u64,
            ok: bound.is_ok(),
        });
        let bound = bound?.with_sort_adapted(&self.discovery);

        self.dispatch(backend, &bound)
    }

    fn dispatch(&self, backend: &dyn Backend, bound: &BoundOperation) -> Result<QueryResult, Error> {
        let verb = bound.verb;
        let records = match backend.execute(bound) {
            Ok(records) => records,
            Err(err) => {
                sink::record(&QueryEvent::ExecuteFailed {
                    verb,
                    backend: backend.name().to_string(),
                });
                return Err(err);
            }
        };

        let records = if verb.is_mutation_only() {
            Vec::new()
        } else if verb.is_single_record() && records.len() > 1 {
            sink::record(&QueryEvent::ExecuteFailed {
                verb,
                backend: backend.name().to_string(),
            });
            return Err(Error::backend(format!(
                "backend '{}' returned {} records for a single-key {verb}",
                backend.name(),
                records.len()
            )));
        } else {
            records
        };

        sink::record(&QueryEvent::Execute {
            verb,
            backend: backend.name().to_string(),
            records: records.len() as u64,
        });
        debug!(backend = backend.name(), %verb, records = records.len(), "operation executed");

        Ok(QueryResult::new(records))
    }
}
