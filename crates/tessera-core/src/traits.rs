//! Application-facing conversion contract.
//!
//! The entity-to-record mapping layer lives outside this crate; it hands the
//! core `(field, ValueBox)` pairs and asks for typed values back through
//! [`FieldValue`].

use crate::value::{Date, Float64, Value, ValueType};
use std::collections::BTreeSet;
use tessera_primitives::ScalarKind;
use ulid::Ulid;

///
/// FieldValue
///
/// Conversion contract between an application type and [`Value`].
/// `value_type` is the declared target used for converter resolution;
/// `from_value` only has to accept values already shaped like that target.
///

pub trait FieldValue: Sized {
    fn value_type() -> ValueType;

    fn to_value(&self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_field_value_int {
    ( $( $type:ty => $variant:ident, $kind:ident ),* $(,)? ) => {
        $(
            impl FieldValue for $type {
                fn value_type() -> ValueType {
                    ValueType::Scalar(ScalarKind::$kind)
                }

                fn to_value(&self) -> Value {
                    Value::$variant((*self).into())
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Self::try_from(*v).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_field_value_int! {
    i8  => Int, Int,
    i16 => Int, Int,
    i32 => Int, Int,
    i64 => Int, Int,
    u8  => Uint, Uint,
    u16 => Uint, Uint,
    u32 => Uint, Uint,
    u64 => Uint, Uint,
}

impl FieldValue for bool {
    fn value_type() -> ValueType {
        ValueType::Scalar(ScalarKind::Bool)
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FieldValue for f64 {
    fn value_type() -> ValueType {
        ValueType::Scalar(ScalarKind::Float64)
    }

    fn to_value(&self) -> Value {
        Value::float(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float64(v) => Some(v.get()),
            _ => None,
        }
    }
}

impl FieldValue for f32 {
    fn value_type() -> ValueType {
        ValueType::Scalar(ScalarKind::Float64)
    }

    fn to_value(&self) -> Value {
        Value::float(f64::from(*self))
    }

    #[expect(clippy::cast_possible_truncation)]
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float64(v) => {
                let narrowed = v.get() as Self;
                narrowed.is_finite().then_some(narrowed)
            }
            _ => None,
        }
    }
}

impl FieldValue for Float64 {
    fn value_type() -> ValueType {
        ValueType::Scalar(ScalarKind::Float64)
    }

    fn to_value(&self) -> Value {
        Value::Float64(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }
}

impl FieldValue for String {
    fn value_type() -> ValueType {
        ValueType::Scalar(ScalarKind::Text)
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_text().map(ToString::to_string)
    }
}

impl FieldValue for Date {
    fn value_type() -> ValueType {
        ValueType::Scalar(ScalarKind::Date)
    }

    fn to_value(&self) -> Value {
        Value::Date(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Date(v) => Some(*v),
            _ => None,
        }
    }
}

impl FieldValue for Ulid {
    fn value_type() -> ValueType {
        ValueType::Scalar(ScalarKind::Ulid)
    }

    fn to_value(&self) -> Value {
        Value::Ulid(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Ulid(v) => Some(*v),
            _ => None,
        }
    }
}

impl FieldValue for Value {
    fn value_type() -> ValueType {
        ValueType::Any
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn value_type() -> ValueType {
        T::value_type()
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldValue::to_value)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn value_type() -> ValueType {
        ValueType::list_of(T::value_type())
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::new()),
            other => other.as_list()?.iter().map(T::from_value).collect(),
        }
    }
}

impl<T: FieldValue + Ord> FieldValue for BTreeSet<T> {
    fn value_type() -> ValueType {
        ValueType::set_of(T::value_type())
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::new()),
            other => other.as_list()?.iter().map(T::from_value).collect(),
        }
    }
}
