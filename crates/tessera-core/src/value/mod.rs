mod boxed;
mod compare;
mod date;
mod float;
mod value_type;


use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};
use tessera_primitives::ScalarKind;
use ulid::Ulid;

// re-exports
pub use boxed::ValueBox;
pub use date::Date;
pub use float::Float64;
pub use value_type::ValueType;

///
/// CONSTANTS
///

pub(crate) const F64_SAFE_I64: i64 = 1i64 << 53;
pub(crate) const F64_SAFE_U64: u64 = 1u64 << 53;

///
/// Value
///
/// Backend-neutral runtime value. Every field crossing the
/// application/backend boundary travels as one of these, inside a
/// [`ValueBox`].
///
/// Null  → absent value (optional field, SQL NULL, missing document key).
/// List  → ordered many-cardinality transport; sets are canonical lists.
///

#[remain::sorted]
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Value {
    Blob(Vec<u8>),
    Bool(bool),
    Date(Date),
    Float64(Float64),
    Int(i64),
    List(Vec<Self>),
    Null,
    Text(String),
    Uint(u64),
    Ulid(Ulid),
}

impl Value {
    ///
    /// CONSTRUCTION
    ///

    /// Build a `Value::List` from owned items.
    pub fn from_list<T>(items: Vec<T>) -> Self
    where
        T: Into<Self>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Build a finite float value; non-finite inputs become `Null`.
    #[must_use]
    pub fn float(v: f64) -> Self {
        Float64::try_new(v).map_or(Self::Null, Self::Float64)
    }

    ///
    /// TYPES
    ///

    /// Scalar kind of this value, or `None` for `Null` and `List`.
    #[must_use]
    pub const fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            Self::Blob(_) => Some(ScalarKind::Blob),
            Self::Bool(_) => Some(ScalarKind::Bool),
            Self::Date(_) => Some(ScalarKind::Date),
            Self::Float64(_) => Some(ScalarKind::Float64),
            Self::Int(_) => Some(ScalarKind::Int),
            Self::Text(_) => Some(ScalarKind::Text),
            Self::Uint(_) => Some(ScalarKind::Uint),
            Self::Ulid(_) => Some(ScalarKind::Ulid),
            Self::List(_) | Self::Null => None,
        }
    }

    /// Infer the narrowest [`ValueType`] describing this value.
    ///
    /// Lists take their element type from the first non-null element and
    /// fall back to `Any` when empty or heterogeneous.
    #[must_use]
    pub fn inferred_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Any,
            Self::List(items) => {
                let mut element = None;
                for item in items.iter().filter(|item| !item.is_null()) {
                    let ty = item.inferred_type();
                    match &element {
                        None => element = Some(ty),
                        Some(existing) if *existing == ty => {}
                        Some(_) => {
                            element = Some(ValueType::Any);
                            break;
                        }
                    }
                }

                ValueType::List(Box::new(element.unwrap_or(ValueType::Any)))
            }
            scalar => scalar
                .scalar_kind()
                .map_or(ValueType::Any, ValueType::Scalar),
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Null)
    }

    /// Returns true if the value is one of the numeric variants.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        match self.scalar_kind() {
            Some(kind) => kind.is_numeric(),
            None => false,
        }
    }

    ///
    /// ACCESSORS
    ///

    #[must_use]
    pub const fn as_text(&self) -> Option<&str> {
        if let Self::Text(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_list(&self) -> Option<&[Self]> {
        if let Self::List(xs) = self {
            Some(xs.as_slice())
        } else {
            None
        }
    }

    ///
    /// COMPARISON
    ///

    /// Total canonical comparator used by set normalization and sorting.
    #[must_use]
    pub fn canonical_cmp(left: &Self, right: &Self) -> Ordering {
        compare::canonical_cmp(left, right)
    }

    /// Total order for sorting: numeric variants compare by exact value,
    /// other values by the canonical order.
    #[must_use]
    pub fn sort_cmp(left: &Self, right: &Self) -> Ordering {
        compare::sort_cmp(left, right)
    }

    /// Cross-type numeric comparison; returns None if either side is non-numeric
    /// or cannot be widened without loss.
    #[must_use]
    pub fn cmp_numeric(&self, other: &Self) -> Option<Ordering> {
        compare::cmp_numeric(self, other)
    }

    /// Comparison used by condition evaluation: numeric widening first,
    /// then same-variant ordering. `None` when the pair is not comparable.
    #[must_use]
    pub fn partial_cmp_loose(&self, other: &Self) -> Option<Ordering> {
        if let Some(ordering) = self.cmp_numeric(other) {
            return Some(ordering);
        }

        compare::strict_order_cmp(self, other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob(bytes) => write!(f, "blob[{}]", bytes.len()),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Date(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Null => f.write_str("null"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Ulid(v) => write!(f, "{v}"),
        }
    }
}

#[macro_export]
macro_rules! impl_value_from_for {
    ( $( $type:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl From<$type> for Value {
                fn from(v: $type) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

impl_value_from_for! {
    Date       => Date,
    Float64    => Float64,
    bool       => Bool,
    i8         => Int,
    i16        => Int,
    i32        => Int,
    i64        => Int,
    &str       => Text,
    String     => Text,
    u8         => Uint,
    u16        => Uint,
    u32        => Uint,
    u64        => Uint,
    Ulid       => Ulid,
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::float(v)
    }
}

impl From<Vec<Self>> for Value {
    fn from(vec: Vec<Self>) -> Self {
        Self::List(vec)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
