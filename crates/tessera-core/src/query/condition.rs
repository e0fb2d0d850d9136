//! Condition tree produced by the `where` clause.

use crate::{
    convert::ConverterRegistry,
    error::Error,
    params::{BindingError, PLACEHOLDER_SIGIL, Params},
    value::{Value, ValueBox},
};
use std::{collections::BTreeSet, fmt};
use tessera_primitives::ScalarKind;

///
/// Operator
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operator {
    Between,
    Eq,
    Gt,
    Gte,
    In,
    Like,
    Lt,
    Lte,
    NotEq,
}

impl Operator {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Between => "BETWEEN",
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::In => "IN",
            Self::Like => "LIKE",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::NotEq => "!=",
        }
    }
}

impl Operator {
    /// Whether the operator compares by order rather than equality.
    #[must_use]
    pub const fn is_ordering(self) -> bool {
        matches!(
            self,
            Self::Between | Self::Gt | Self::Gte | Self::Lt | Self::Lte
        )
    }

    const fn requirement(self) -> Requirement {
        if self.is_ordering() {
            Requirement::Ordered(self)
        } else {
            Requirement::Any
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

///
/// Connector
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Connector {
    And,
    Not,
    Or,
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Not => f.write_str("NOT"),
            Self::Or => f.write_str("OR"),
        }
    }
}

///
/// Operand
///
/// Right-hand side of a comparison. Literals are resolved at parse time;
/// placeholders wait for a binding.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operand {
    List(Vec<Self>),
    Placeholder(String),
    Value(Value),
}

impl Operand {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn placeholder(name: impl Into<String>) -> Self {
        Self::Placeholder(name.into())
    }

    #[must_use]
    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn collect_placeholders(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::List(items) => items.iter().for_each(|item| item.collect_placeholders(out)),
            Self::Placeholder(name) => {
                out.insert(name.clone());
            }
            Self::Value(_) => {}
        }
    }

    /// First literal found, depth first.
    pub(crate) fn first_literal(&self) -> Option<&Value> {
        match self {
            Self::List(items) => items.iter().find_map(Self::first_literal),
            Self::Placeholder(_) => None,
            Self::Value(v) => Some(v),
        }
    }

    /// First placeholder found, depth first.
    pub(crate) fn first_placeholder(&self) -> Option<&str> {
        match self {
            Self::List(items) => items.iter().find_map(Self::first_placeholder),
            Self::Placeholder(name) => Some(name),
            Self::Value(_) => None,
        }
    }

    /// Replace placeholders with their bindings and write every value into
    /// backend form. Lists collapse into `Value::List`.
    pub(crate) fn bind(&self, params: &Params, registry: &ConverterRegistry) -> Result<Self, Error> {
        self.bind_as(params, registry, Requirement::Any)
    }

    /// Bind, checking each scalar against `requirement` before it is written.
    pub(crate) fn bind_as(
        &self,
        params: &Params,
        registry: &ConverterRegistry,
        requirement: Requirement,
    ) -> Result<Self, Error> {
        let value = self.resolve(params, registry, requirement)?;

        Ok(Self::Value(value))
    }

    fn resolve(
        &self,
        params: &Params,
        registry: &ConverterRegistry,
        requirement: Requirement,
    ) -> Result<Value, Error> {
        let bound = match self {
            Self::List(items) => {
                return items
                    .iter()
                    .map(|item| item.resolve(params, registry, requirement))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List);
            }
            Self::Placeholder(name) => params
                .get(name)
                .cloned()
                .ok_or_else(|| BindingError::Missing {
                    names: vec![name.clone()],
                })?,
            Self::Value(v) => ValueBox::new(v.clone()),
        };
        requirement.check(bound.value())?;

        Ok(registry.write(&bound)?.into_value())
    }
}

///
/// Requirement
///
/// Capability a bound operand must have, read from the scalar kind table.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Requirement {
    Any,
    Keyable,
    Ordered(Operator),
}

impl Requirement {
    fn check(self, value: &Value) -> Result<(), BindingError> {
        match self {
            Self::Any => Ok(()),
            Self::Keyable => {
                if value.scalar_kind().is_some_and(ScalarKind::is_keyable) {
                    Ok(())
                } else {
                    Err(BindingError::UnkeyableKey {
                        value: value.to_string(),
                    })
                }
            }
            // null never orders and evaluates to false
            Self::Ordered(operator) => {
                if value.is_null() || value.scalar_kind().is_some_and(ScalarKind::supports_ordering) {
                    Ok(())
                } else {
                    Err(BindingError::UnorderedOperand {
                        operator,
                        value: value.to_string(),
                    })
                }
            }
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Self::Placeholder(name) => write!(f, "{PLACEHOLDER_SIGIL}{name}"),
            Self::Value(v) => write!(f, "{v}"),
        }
    }
}

///
/// ConditionNode
///
/// `Not` composites hold exactly one child; `And`/`Or` at least one. The
/// parser and the constructors below only ever build those shapes.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConditionNode {
    Composite {
        connector: Connector,
        children: Vec<Self>,
    },
    Leaf {
        field: String,
        operator: Operator,
        operand: Operand,
    },
}

impl ConditionNode {
    pub fn leaf(field: impl Into<String>, operator: Operator, operand: Operand) -> Self {
        Self::Leaf {
            field: field.into(),
            operator,
            operand,
        }
    }

    /// `None` when `children` is empty.
    #[must_use]
    pub fn and(children: Vec<Self>) -> Option<Self> {
        Self::composite(Connector::And, children)
    }

    /// `None` when `children` is empty.
    #[must_use]
    pub fn or(children: Vec<Self>) -> Option<Self> {
        Self::composite(Connector::Or, children)
    }

    #[must_use]
    pub fn negate(child: Self) -> Self {
        Self::Composite {
            connector: Connector::Not,
            children: vec![child],
        }
    }

    fn composite(connector: Connector, children: Vec<Self>) -> Option<Self> {
        if children.is_empty() {
            return None;
        }

        Some(Self::Composite {
            connector,
            children,
        })
    }

    #[must_use]
    pub const fn connector(&self) -> Option<Connector> {
        match self {
            Self::Composite { connector, .. } => Some(*connector),
            Self::Leaf { .. } => None,
        }
    }

    #[must_use]
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Composite { children, .. } => children,
            Self::Leaf { .. } => &[],
        }
    }

    /// Every placeholder name referenced anywhere in the tree.
    #[must_use]
    pub fn placeholders(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_placeholders(&mut out);

        out
    }

    pub(crate) fn collect_placeholders(&self, out: &mut BTreeSet<String>) {
        self.walk_operands(&mut |operand| operand.collect_placeholders(out));
    }

    /// Field names in source order, duplicates kept.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);

        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Composite { children, .. } => {
                children.iter().for_each(|child| child.collect_fields(out));
            }
            Self::Leaf { field, .. } => out.push(field),
        }
    }

    pub(crate) fn first_literal(&self) -> Option<&Value> {
        match self {
            Self::Composite { children, .. } => children.iter().find_map(Self::first_literal),
            Self::Leaf { operand, .. } => operand.first_literal(),
        }
    }

    pub(crate) fn first_placeholder(&self) -> Option<&str> {
        match self {
            Self::Composite { children, .. } => {
                children.iter().find_map(Self::first_placeholder)
            }
            Self::Leaf { operand, .. } => operand.first_placeholder(),
        }
    }

    fn walk_operands(&self, f: &mut impl FnMut(&Operand)) {
        match self {
            Self::Composite { children, .. } => {
                for child in children {
                    child.walk_operands(f);
                }
            }
            Self::Leaf { operand, .. } => f(operand),
        }
    }

    /// Copy of the tree with every operand bound and written.
    pub(crate) fn bind(&self, params: &Params, registry: &ConverterRegistry) -> Result<Self, Error> {
        match self {
            Self::Composite {
                connector,
                children,
            } => Ok(Self::Composite {
                connector: *connector,
                children: children
                    .iter()
                    .map(|child| child.bind(params, registry))
                    .collect::<Result<_, _>>()?,
            }),
            Self::Leaf {
                field,
                operator,
                operand,
            } => Ok(Self::Leaf {
                field: field.clone(),
                operator: *operator,
                operand: operand
                    .bind_as(params, registry, operator.requirement())
                    .map_err(|err| err.for_field(field))?,
            }),
        }
    }
}

impl fmt::Display for ConditionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf {
                field,
                operator: Operator::Between,
                operand: Operand::List(bounds),
            } if bounds.len() == 2 => {
                write!(f, "{field} BETWEEN {} AND {}", bounds[0], bounds[1])
            }
            Self::Leaf {
                field,
                operator,
                operand,
            } => write!(f, "{field} {operator} {operand}"),
            Self::Composite {
                connector: Connector::Not,
                children,
            } => {
                f.write_str("NOT ")?;
                for child in children {
                    write!(f, "({child})")?;
                }
                Ok(())
            }
            Self::Composite {
                connector,
                children,
            } => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {connector} ")?;
                    }
                    match child {
                        Self::Leaf { .. } => write!(f, "{child}")?,
                        Self::Composite { .. } => write!(f, "({child})")?,
                    }
                }
                Ok(())
            }
        }
    }
}
