//! In-memory evaluation of bound operations.
//!
//! Backends that hold records in memory (and the test backends) apply a
//! bound condition, sort, window and projection with these helpers.

use crate::{
    query::{
        condition::{ConditionNode, Connector, Operator},
        descriptor::BoundOperation,
        executor::Record,
    },
    sort::{Direction, SortList},
    value::Value,
};
use std::cmp::Ordering;

///
/// Evaluate a bound condition against one record.
///
/// Pure runtime evaluation: a missing field reads as `Null`, and any
/// comparison that is not defined for the pair (including an operand that
/// was never bound) evaluates to `false`.
///
#[must_use]
pub fn matches(condition: &ConditionNode, record: &Record) -> bool {
    match condition {
        ConditionNode::Composite {
            connector,
            children,
        } => match connector {
            Connector::And => children.iter().all(|child| matches(child, record)),
            Connector::Or => children.iter().any(|child| matches(child, record)),
            Connector::Not => !children.iter().all(|child| matches(child, record)),
        },
        ConditionNode::Leaf {
            field,
            operator,
            operand,
        } => {
            let Some(expected) = operand.as_value() else {
                return false;
            };

            eval_compare(record.value(field), *operator, expected)
        }
    }
}

fn eval_compare(actual: &Value, operator: Operator, expected: &Value) -> bool {
    match operator {
        Operator::Eq => loose_eq(actual, expected),
        Operator::NotEq => !loose_eq(actual, expected),

        Operator::Lt => order(actual, expected).is_some_and(Ordering::is_lt),
        Operator::Lte => order(actual, expected).is_some_and(Ordering::is_le),
        Operator::Gt => order(actual, expected).is_some_and(Ordering::is_gt),
        Operator::Gte => order(actual, expected).is_some_and(Ordering::is_ge),

        Operator::In => match expected {
            Value::List(items) => items.iter().any(|item| loose_eq(actual, item)),
            _ => false,
        },
        Operator::Between => match expected.as_list() {
            Some([low, high]) => {
                order(actual, low).is_some_and(Ordering::is_ge)
                    && order(actual, high).is_some_and(Ordering::is_le)
            }
            _ => false,
        },
        Operator::Like => match (actual, expected) {
            (Value::Text(text), Value::Text(pattern)) => like(text, pattern),
            _ => false,
        },
    }
}

// Nulls never order, so range operators on a missing field are false.
fn order(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_null() || right.is_null() {
        return None;
    }

    left.partial_cmp_loose(right)
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match left.partial_cmp_loose(right) {
        Some(ordering) => ordering.is_eq(),
        None => left == right,
    }
}

///
/// SQL-style pattern match: `%` matches any run, `_` exactly one character.
///
#[must_use]
pub fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    // classic two-pointer wildcard match with single backtrack point
    let (mut t, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                star = Some((p, t));
                p += 1;
            }
            Some('_') => {
                t += 1;
                p += 1;
            }
            Some(c) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '%')
}

///
/// Order records by a sort list. Stable, and total over mixed value kinds:
/// numbers compare by exact value, anything else by canonical order.
///
pub fn sort_records(records: &mut [Record], sort: &SortList) {
    if sort.is_empty() {
        return;
    }

    records.sort_by(|a, b| {
        for s in sort.iter() {
            let (left, right) = (a.value(&s.field), b.value(&s.field));
            let ordering = Value::sort_cmp(left, right);
            let ordering = match s.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };

            if ordering.is_ne() {
                return ordering;
            }
        }

        Ordering::Equal
    });
}

///
/// Apply filter, sort, skip, limit and projection of a bound read.
///
#[must_use]
pub fn apply(records: impl IntoIterator<Item = Record>, operation: &BoundOperation) -> Vec<Record> {
    let mut out: Vec<Record> = records
        .into_iter()
        .filter(|record| {
            operation
                .condition
                .as_ref()
                .is_none_or(|condition| matches(condition, record))
        })
        .collect();

    if let Some(sort) = &operation.sort {
        sort_records(&mut out, sort);
    }

    let skip = operation
        .skip
        .map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX));
    let limit = operation
        .limit
        .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));

    out.into_iter()
        .skip(skip)
        .take(limit)
        .map(|record| {
            if operation.projection.is_empty() {
                record
            } else {
                record.project(&operation.projection)
            }
        })
        .collect()
}
