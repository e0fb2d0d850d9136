//! Parsed operations and their bound form.

use crate::{
    convert::ConverterRegistry,
    discovery::ProviderDiscovery,
    error::Error,
    params::Params,
    query::condition::{ConditionNode, Operand, Requirement},
    sort::SortList,
    value::Value,
};
use derive_more::Deref;
use std::{collections::BTreeSet, fmt};

///
/// DataModel
///
/// Selects the grammar family a backend speaks.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DataModel {
    Column,
    Document,
    KeyValue,
}

impl fmt::Display for DataModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column => f.write_str("column"),
            Self::Document => f.write_str("document"),
            Self::KeyValue => f.write_str("key-value"),
        }
    }
}

///
/// Verb
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Verb {
    Del,
    Delete,
    Get,
    Insert,
    Put,
    Select,
    Update,
}

impl Verb {
    /// Verbs whose result is defined to be empty.
    #[must_use]
    pub const fn is_mutation_only(self) -> bool {
        matches!(self, Self::Delete | Self::Insert | Self::Put | Self::Update)
    }

    /// Key-value verbs returning zero or one record.
    #[must_use]
    pub const fn is_single_record(self) -> bool {
        matches!(self, Self::Del | Self::Get)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Del => "del",
            Self::Delete => "delete",
            Self::Get => "get",
            Self::Insert => "insert",
            Self::Put => "put",
            Self::Select => "select",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// Target
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Target {
    Entity(String),
    Key(Operand),
}

impl Target {
    #[must_use]
    pub fn entity(&self) -> Option<&str> {
        match self {
            Self::Entity(name) => Some(name),
            Self::Key(_) => None,
        }
    }

    #[must_use]
    pub const fn key(&self) -> Option<&Operand> {
        match self {
            Self::Entity(_) => None,
            Self::Key(key) => Some(key),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(name) => f.write_str(name),
            Self::Key(key) => write!(f, "{key}"),
        }
    }
}

///
/// Assignment
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Assignment {
    pub field: String,
    pub value: Operand,
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.field, self.value)
    }
}

///
/// OperationDescriptor
///
/// Immutable result of one parse. Re-executable any number of times with
/// different [`Params`].
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OperationDescriptor {
    pub verb: Verb,
    pub model: DataModel,
    pub target: Target,
    pub value: Option<Operand>,
    pub condition: Option<ConditionNode>,
    pub sort: Option<SortList>,
    pub assignments: Vec<Assignment>,
    pub projection: Vec<String>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl OperationDescriptor {
    /// Empty descriptor for `verb` against `target`; clauses are filled in by
    /// the parser.
    #[must_use]
    pub const fn new(verb: Verb, model: DataModel, target: Target) -> Self {
        Self {
            verb,
            model,
            target,
            value: None,
            condition: None,
            sort: None,
            assignments: Vec::new(),
            projection: Vec::new(),
            skip: None,
            limit: None,
        }
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.target
            .key()
            .into_iter()
            .chain(self.value.as_ref())
            .chain(self.assignments.iter().map(|a| &a.value))
    }

    /// Every placeholder the statement references.
    #[must_use]
    pub fn placeholders(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for operand in self.operands() {
            operand.collect_placeholders(&mut out);
        }
        if let Some(condition) = &self.condition {
            condition.collect_placeholders(&mut out);
        }

        out
    }

    /// First literal operand, if the statement carries any.
    #[must_use]
    pub fn first_literal(&self) -> Option<&Value> {
        self.operands()
            .find_map(Operand::first_literal)
            .or_else(|| self.condition.as_ref().and_then(ConditionNode::first_literal))
    }

    #[must_use]
    pub fn first_placeholder(&self) -> Option<&str> {
        self.operands()
            .find_map(Operand::first_placeholder)
            .or_else(|| {
                self.condition
                    .as_ref()
                    .and_then(ConditionNode::first_placeholder)
            })
    }

    /// Resolve every operand against `params` and write values into backend
    /// form. Fails with `MissingBinding` naming every unbound placeholder.
    pub fn bind(&self, params: &Params, registry: &ConverterRegistry) -> Result<BoundOperation, Error> {
        params.validate(&self.placeholders())?;

        let target = match &self.target {
            Target::Entity(name) => Target::Entity(name.clone()),
            Target::Key(key) => {
                Target::Key(key.bind_as(params, registry, Requirement::Keyable)?)
            }
        };
        let value = self
            .value
            .as_ref()
            .map(|v| v.bind(params, registry))
            .transpose()?;
        let condition = self
            .condition
            .as_ref()
            .map(|c| c.bind(params, registry))
            .transpose()?;
        let assignments = self
            .assignments
            .iter()
            .map(|a| {
                Ok(Assignment {
                    field: a.field.clone(),
                    value: a
                        .value
                        .bind(params, registry)
                        .map_err(|err| err.for_field(&a.field))?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(BoundOperation(Self {
            target,
            value,
            condition,
            assignments,
            ..self.clone()
        }))
    }
}

impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verb)?;
        if !self.projection.is_empty() {
            write!(f, " {} from", self.projection.join(", "))?;
        }
        write!(f, " {}", self.target)?;
        if let Some(value) = &self.value {
            write!(f, " {value}")?;
        }
        if !self.assignments.is_empty() {
            f.write_str(" set ")?;
            for (i, a) in self.assignments.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{a}")?;
            }
        }
        if let Some(condition) = &self.condition {
            write!(f, " where {condition}")?;
        }
        if let Some(sort) = self.sort.as_ref().filter(|s| !s.is_empty()) {
            write!(f, " order by {sort}")?;
        }
        if let Some(skip) = self.skip {
            write!(f, " skip {skip}")?;
        }
        if let Some(limit) = self.limit {
            write!(f, " limit {limit}")?;
        }

        Ok(())
    }
}

///
/// BoundOperation
///
/// Descriptor whose operands are all backend-form values. This is what the
/// backend execution contract receives.
///

#[derive(Clone, Debug, Deref, Eq, PartialEq)]
pub struct BoundOperation(OperationDescriptor);

impl BoundOperation {
    #[must_use]
    pub fn into_inner(self) -> OperationDescriptor {
        self.0
    }

    /// Run the sort clause through every discovered sort provider.
    #[must_use]
    pub fn with_sort_adapted(mut self, discovery: &ProviderDiscovery) -> Self {
        if let Some(sort) = &self.0.sort {
            self.0.sort = Some(sort.adapt(discovery));
        }

        self
    }

    /// Bound key of a key-value operation.
    #[must_use]
    pub fn key_value(&self) -> Option<&Value> {
        self.target.key().and_then(Operand::as_value)
    }

    /// Bound value of a `put`.
    #[must_use]
    pub fn put_value(&self) -> Option<&Value> {
        self.value.as_ref().and_then(Operand::as_value)
    }

    /// Bound assignments as `(field, value)` pairs.
    pub fn assigned_values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.assignments
            .iter()
            .filter_map(|a| a.value.as_value().map(|v| (a.field.as_str(), v)))
    }
}
