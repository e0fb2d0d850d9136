use crate::value::{F64_SAFE_I64, F64_SAFE_U64, Value};
use std::cmp::Ordering;

// Cross-variant order. Numeric variants sit together so mixed numeric lists
// sort into a readable shape even without widening.
const fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) => 2,
        Value::Uint(_) => 3,
        Value::Float64(_) => 4,
        Value::Date(_) => 5,
        Value::Text(_) => 6,
        Value::Ulid(_) => 7,
        Value::Blob(_) => 8,
        Value::List(_) => 9,
    }
}

/// Total order over all values: variant rank first, then the variant's own
/// order. Lists compare element-wise, shorter first on a shared prefix.
pub(crate) fn canonical_cmp(left: &Value, right: &Value) -> Ordering {
    rank(left).cmp(&rank(right)).then_with(|| match (left, right) {
        (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
        (Value::List(a), Value::List(b)) => a
            .iter()
            .zip(b)
            .map(|(x, y)| canonical_cmp(x, y))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        _ => strict_order_cmp(left, right).unwrap_or(Ordering::Equal),
    })
}

/// Same-variant order for orderable scalars; `None` otherwise.
pub(crate) fn strict_order_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    let ordering = match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Date(a), Value::Date(b)) => a.cmp(b),
        (Value::Float64(a), Value::Float64(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Uint(a), Value::Uint(b)) => a.cmp(b),
        (Value::Ulid(a), Value::Ulid(b)) => a.cmp(b),
        _ => return None,
    };

    Some(ordering)
}

/// Numeric order across `Int`, `Uint` and `Float64`. Integer pairs compare
/// exactly; floats only meet integers inside the 2^53 window.
pub(crate) fn cmp_numeric(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Uint(a), Value::Uint(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Uint(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
        (Value::Uint(a), Value::Int(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
        _ => widen(left)?.partial_cmp(&widen(right)?),
    }
}

/// Total order used to sort records. Numeric variants share one rank and
/// compare by exact value, so `Int(1)`, `Uint(1)` and `Float64(1.0)` are
/// equal; everything else falls back to the canonical order.
pub(crate) fn sort_cmp(left: &Value, right: &Value) -> Ordering {
    match (exact_numeric(left), exact_numeric(right)) {
        (Some(a), Some(b)) => a.cmp_exact(b),
        _ => sort_rank(left)
            .cmp(&sort_rank(right))
            .then_with(|| canonical_cmp(left, right)),
    }
}

const fn sort_rank(value: &Value) -> u8 {
    match value {
        Value::Int(_) | Value::Uint(_) | Value::Float64(_) => 2,
        other => rank(other),
    }
}

#[derive(Clone, Copy)]
enum Exact {
    Float(f64),
    Integer(i128),
}

impl Exact {
    fn cmp_exact(self, other: Self) -> Ordering {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(&b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(&b),
            (Self::Integer(a), Self::Float(b)) => cmp_integer_float(a, b),
            (Self::Float(a), Self::Integer(b)) => cmp_integer_float(b, a).reverse(),
        }
    }
}

fn exact_numeric(value: &Value) -> Option<Exact> {
    match *value {
        Value::Float64(f) => Some(Exact::Float(f.get())),
        Value::Int(i) => Some(Exact::Integer(i128::from(i))),
        Value::Uint(u) => Some(Exact::Integer(i128::from(u))),
        _ => None,
    }
}

// Floats at or beyond 2^64 in magnitude lie outside every integer variant.
#[expect(clippy::cast_possible_truncation)]
fn cmp_integer_float(integer: i128, float: f64) -> Ordering {
    const LIMIT: f64 = 18_446_744_073_709_551_616.0;

    if float >= LIMIT {
        return Ordering::Less;
    }
    if float <= -LIMIT {
        return Ordering::Greater;
    }

    let floor = float.floor();
    integer
        .cmp(&(floor as i128))
        .then(if float > floor {
            Ordering::Less
        } else {
            Ordering::Equal
        })
}

#[expect(clippy::cast_precision_loss)]
fn widen(value: &Value) -> Option<f64> {
    match *value {
        Value::Float64(f) => Some(f.get()),
        Value::Int(i) if i.unsigned_abs() <= F64_SAFE_I64.unsigned_abs() => Some(i as f64),
        Value::Uint(u) if u <= F64_SAFE_U64 => Some(u as f64),
        _ => None,
    }
}
