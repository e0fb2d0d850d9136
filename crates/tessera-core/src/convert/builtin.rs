use crate::{
    convert::{
        CollectionReader, ConversionError, Converter, ConverterRegistry, ValueReader, ValueWriter,
    },
    value::{Date, F64_SAFE_I64, F64_SAFE_U64, Float64, Value, ValueBox, ValueType},
};
use tessera_primitives::{ALL_SCALAR_KINDS, ScalarKind};
use ulid::Ulid;

/// Built-in converters in registration order: one reader per scalar kind,
/// writers for kinds backends do not store natively, then list/set readers.
#[must_use]
pub fn builtin_converters() -> Vec<Converter> {
    let mut converters: Vec<Converter> = ALL_SCALAR_KINDS
        .iter()
        .map(|kind| Converter::reader(ScalarReader { kind: *kind }))
        .collect();

    converters.push(Converter::writer(TextWriter {
        kind: ScalarKind::Date,
    }));
    converters.push(Converter::writer(TextWriter {
        kind: ScalarKind::Ulid,
    }));
    converters.push(Converter::collection(ListReader));
    converters.push(Converter::collection(SetReader));

    converters
}

///
/// ScalarReader
///
/// Reads any compatible scalar into `kind`. Same-kind pairs are left to the
/// identity path.
///

struct ScalarReader {
    kind: ScalarKind,
}

impl ValueReader for ScalarReader {
    fn name(&self) -> &'static str {
        match self.kind {
            ScalarKind::Blob => "builtin.blob",
            ScalarKind::Bool => "builtin.bool",
            ScalarKind::Date => "builtin.date",
            ScalarKind::Float64 => "builtin.float64",
            ScalarKind::Int => "builtin.int",
            ScalarKind::Text => "builtin.text",
            ScalarKind::Uint => "builtin.uint",
            ScalarKind::Ulid => "builtin.ulid",
        }
    }

    fn applies_to(&self, source: &ValueType, target: &ValueType) -> bool {
        let (Some(from), Some(to)) = (source.scalar(), target.scalar()) else {
            return false;
        };

        to == self.kind && from != to && readable(from, to)
    }

    fn read(&self, value: &ValueBox, target: &ValueType) -> Result<ValueBox, ConversionError> {
        let out = read_scalar(value.value(), self.kind)
            .map_err(|err| retarget(err, value, target))?;

        Ok(ValueBox::from_parts(out, target.clone()))
    }
}

// Conversion matrix for built-in readers.
const fn readable(from: ScalarKind, to: ScalarKind) -> bool {
    use ScalarKind as K;

    match to {
        K::Text => true,
        K::Int | K::Uint | K::Float64 => from.is_numeric() || matches!(from, K::Text | K::Bool),
        K::Bool => matches!(from, K::Text | K::Int | K::Uint),
        K::Date => matches!(from, K::Text | K::Int),
        K::Ulid => matches!(from, K::Text | K::Blob),
        K::Blob => matches!(from, K::Text | K::Ulid),
    }
}

fn retarget(err: ConversionError, value: &ValueBox, target: &ValueType) -> ConversionError {
    match err {
        ConversionError::Unsupported { .. } => ConversionError::unsupported(value, target),
        other => other,
    }
}

/// Convert one scalar value into `kind`. `Null` passes through.
pub fn read_scalar(value: &Value, kind: ScalarKind) -> Result<Value, ConversionError> {
    use ScalarKind as K;

    if value.is_null() || value.scalar_kind() == Some(kind) {
        return Ok(value.clone());
    }

    let to = ValueType::Scalar(kind);
    let out_of_range = || ConversionError::OutOfRange {
        value: value.to_string(),
        to: to.clone(),
    };
    let parse = || ConversionError::Parse {
        value: value.to_string(),
        to: to.clone(),
    };
    let unsupported = || ConversionError::Unsupported {
        from: value.inferred_type(),
        to: to.clone(),
        value: value.to_string(),
    };

    let out = match (kind, value) {
        // text
        (K::Text, Value::Blob(bytes)) => {
            Value::Text(String::from_utf8(bytes.clone()).map_err(|_| parse())?)
        }
        (K::Text, Value::Date(v)) => Value::Text(v.to_string()),
        (K::Text, Value::Float64(v)) => Value::Text(v.to_string()),
        (K::Text, Value::Bool(v)) => Value::Text(v.to_string()),
        (K::Text, Value::Int(v)) => Value::Text(v.to_string()),
        (K::Text, Value::Uint(v)) => Value::Text(v.to_string()),
        (K::Text, Value::Ulid(v)) => Value::Text(v.to_string()),

        // signed
        (K::Int, Value::Uint(v)) => Value::Int(i64::try_from(*v).map_err(|_| out_of_range())?),
        (K::Int, Value::Float64(v)) => Value::Int(float_to_i64(v.get()).ok_or_else(out_of_range)?),
        (K::Int, Value::Bool(v)) => Value::Int(i64::from(*v)),
        (K::Int, Value::Text(s)) => Value::Int(s.trim().parse().map_err(|_| parse())?),

        // unsigned
        (K::Uint, Value::Int(v)) => Value::Uint(u64::try_from(*v).map_err(|_| out_of_range())?),
        (K::Uint, Value::Float64(v)) => {
            let signed = float_to_i64(v.get()).ok_or_else(out_of_range)?;
            Value::Uint(u64::try_from(signed).map_err(|_| out_of_range())?)
        }
        (K::Uint, Value::Bool(v)) => Value::Uint(u64::from(*v)),
        (K::Uint, Value::Text(s)) => Value::Uint(s.trim().parse().map_err(|_| parse())?),

        // float
        (K::Float64, Value::Int(v)) => Value::Float64(int_to_float(*v).ok_or_else(out_of_range)?),
        (K::Float64, Value::Uint(v)) => {
            Value::Float64(uint_to_float(*v).ok_or_else(out_of_range)?)
        }
        (K::Float64, Value::Bool(v)) => {
            Value::Float64(int_to_float(i64::from(*v)).ok_or_else(out_of_range)?)
        }
        (K::Float64, Value::Text(s)) => {
            let parsed: f64 = s.trim().parse().map_err(|_| parse())?;
            Value::Float64(Float64::try_new(parsed).ok_or_else(out_of_range)?)
        }

        // bool
        (K::Bool, Value::Text(s)) => Value::Bool(parse_bool(s).ok_or_else(parse)?),
        (K::Bool, Value::Int(v)) => match v {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            _ => return Err(out_of_range()),
        },
        (K::Bool, Value::Uint(v)) => match v {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            _ => return Err(out_of_range()),
        },

        // date
        (K::Date, Value::Text(s)) => Value::Date(Date::parse(s.trim()).ok_or_else(parse)?),
        (K::Date, Value::Int(days)) => {
            let days = i32::try_from(*days).map_err(|_| out_of_range())?;
            Value::Date(Date::from_days(days).ok_or_else(out_of_range)?)
        }

        // ulid
        (K::Ulid, Value::Text(s)) => Value::Ulid(Ulid::from_string(s.trim()).map_err(|_| parse())?),
        (K::Ulid, Value::Blob(bytes)) => {
            let raw: [u8; 16] = bytes.as_slice().try_into().map_err(|_| parse())?;
            Value::Ulid(Ulid::from_bytes(raw))
        }

        // blob
        (K::Blob, Value::Text(s)) => Value::Blob(s.as_bytes().to_vec()),
        (K::Blob, Value::Ulid(v)) => Value::Blob(v.to_bytes().to_vec()),

        _ => return Err(unsupported()),
    };

    Ok(out)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_i64(v: f64) -> Option<i64> {
    if v.fract() != 0.0 || v.abs() > F64_SAFE_I64 as f64 {
        return None;
    }

    Some(v as i64)
}

#[expect(clippy::cast_precision_loss)]
fn int_to_float(v: i64) -> Option<Float64> {
    if v.unsigned_abs() > F64_SAFE_U64 {
        return None;
    }

    Float64::try_new(v as f64)
}

#[expect(clippy::cast_precision_loss)]
fn uint_to_float(v: u64) -> Option<Float64> {
    if v > F64_SAFE_U64 {
        return None;
    }

    Float64::try_new(v as f64)
}

///
/// TextWriter
///
/// Stores a kind the backend has no native representation for as text.
///

struct TextWriter {
    kind: ScalarKind,
}

impl ValueWriter for TextWriter {
    fn name(&self) -> &'static str {
        match self.kind {
            ScalarKind::Date => "builtin.date_text",
            ScalarKind::Ulid => "builtin.ulid_text",
            _ => "builtin.text_writer",
        }
    }

    fn source(&self) -> Option<ScalarKind> {
        Some(self.kind)
    }

    fn write(&self, value: &ValueBox) -> Result<ValueBox, ConversionError> {
        let out = read_scalar(value.value(), ScalarKind::Text)?;

        Ok(ValueBox::from_parts(out, ValueType::Scalar(ScalarKind::Text)))
    }
}

///
/// ListReader
///

struct ListReader;

impl CollectionReader for ListReader {
    fn name(&self) -> &'static str {
        "builtin.list"
    }

    fn applies_to(&self, source: &ValueType, target: &ValueType) -> bool {
        matches!(target, ValueType::List(_)) && !source.satisfies(target)
    }

    fn read(
        &self,
        value: &ValueBox,
        target: &ValueType,
        registry: &ConverterRegistry,
    ) -> Result<ValueBox, ConversionError> {
        let items = read_elements(value, target, registry)?;

        Ok(ValueBox::from_parts(Value::List(items), target.clone()))
    }
}

///
/// SetReader
///
/// Output is canonically ordered and de-duplicated.
///

struct SetReader;

impl CollectionReader for SetReader {
    fn name(&self) -> &'static str {
        "builtin.set"
    }

    fn applies_to(&self, source: &ValueType, target: &ValueType) -> bool {
        matches!(target, ValueType::Set(_)) && !source.satisfies(target)
    }

    fn read(
        &self,
        value: &ValueBox,
        target: &ValueType,
        registry: &ConverterRegistry,
    ) -> Result<ValueBox, ConversionError> {
        let mut items = read_elements(value, target, registry)?;
        items.sort_by(Value::canonical_cmp);
        items.dedup();

        Ok(ValueBox::from_parts(Value::List(items), target.clone()))
    }
}

// A scalar source becomes a one-element container. `Null` never gets here:
// the registry resolves it to a typed `Null` first.
fn read_elements(
    value: &ValueBox,
    target: &ValueType,
    registry: &ConverterRegistry,
) -> Result<Vec<Value>, ConversionError> {
    let element = target.element().unwrap_or(&ValueType::Any);
    let raw = match value.value() {
        Value::List(items) => items.clone(),
        scalar => vec![scalar.clone()],
    };

    raw.into_iter()
        .map(|item| {
            registry
                .resolve(&ValueBox::new(item), element)
                .map(ValueBox::into_value)
        })
        .collect()
}
