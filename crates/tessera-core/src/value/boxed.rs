use crate::{
    convert::{ConversionError, ConverterRegistry},
    traits::FieldValue,
    value::{Value, ValueType},
};
use std::fmt;

///
/// ValueBox
///
/// Immutable holder of one value plus its declared source type.
/// Coercion never mutates a box; converters produce a new one.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValueBox {
    value: Value,
    source: ValueType,
}

impl ValueBox {
    /// Box a value, inferring the source type from its variant.
    pub fn new(value: impl Into<Value>) -> Self {
        let value = value.into();
        let source = value.inferred_type();

        Self { value, source }
    }

    #[must_use]
    pub const fn null() -> Self {
        Self {
            value: Value::Null,
            source: ValueType::Any,
        }
    }

    /// Box a value under an explicitly declared source type.
    ///
    /// The value must already satisfy the declared type; `Null` satisfies
    /// every declaration.
    pub fn typed(value: Value, source: ValueType) -> Result<Self, ConversionError> {
        if !value.is_null() && !value.inferred_type().satisfies(&source) && !list_fits(&value, &source)
        {
            return Err(ConversionError::TypeMismatch {
                declared: source,
                found: value.inferred_type(),
            });
        }

        Ok(Self { value, source })
    }

    /// Typed `Null` used when absence crosses a conversion unchanged.
    pub(crate) const fn null_of(source: ValueType) -> Self {
        Self {
            value: Value::Null,
            source,
        }
    }

    /// Pair a converter output with its target type; converters guarantee fit.
    pub(crate) const fn from_parts(value: Value, source: ValueType) -> Self {
        Self { value, source }
    }

    /// Box an application value under its declared field type.
    pub fn of<T: FieldValue>(value: &T) -> Self {
        Self {
            value: value.to_value(),
            source: T::value_type(),
        }
    }

    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub const fn source(&self) -> &ValueType {
        &self.source
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Declared source, or the inferred type when the declaration is `Any`.
    #[must_use]
    pub fn effective_source(&self) -> ValueType {
        if self.source == ValueType::Any {
            self.value.inferred_type()
        } else {
            self.source.clone()
        }
    }

    /// Whether this box can be handed out as `target` without conversion.
    #[must_use]
    pub fn is_instance_of(&self, target: &ValueType) -> bool {
        self.effective_source().satisfies(target)
    }

    /// Coerce through `registry` and materialize an application value.
    pub fn get<T: FieldValue>(&self, registry: &ConverterRegistry) -> Result<T, ConversionError> {
        let target = T::value_type();
        let resolved = registry.resolve(self, &target)?;

        T::from_value(resolved.value()).ok_or_else(|| ConversionError::Unsupported {
            from: resolved.source().clone(),
            to: target,
            value: resolved.value().to_string(),
        })
    }
}

// Lists whose elements each satisfy the declared element type are accepted
// even when inference widened the list to `List<Any>`.
fn list_fits(value: &Value, declared: &ValueType) -> bool {
    match (value, declared.element()) {
        (Value::List(items), Some(element)) => items.iter().all(|item| {
            item.is_null() || item.inferred_type().satisfies(element) || list_fits(item, element)
        }),
        _ => false,
    }
}

impl From<Value> for ValueBox {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for ValueBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} as {}", self.value, self.source)
    }
}
