//! Immutable configuration bag assembled from named fragments.


use crate::{
    convert::{ConversionError, ConverterRegistry},
    discovery::{ExtensionPoint, Provider, ProviderDiscovery},
    error::{Error, ErrorOrigin},
    traits::FieldValue,
    value::{Value, ValueBox},
};
use std::collections::BTreeMap;
use tracing::debug;

///
/// SettingsProvider
///
/// Contributes a default fragment. Fragments from providers are folded in
/// ascending priority, so higher priority overrides lower.
///

pub trait SettingsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32 {
        0
    }

    fn fragment(&self) -> SettingsFragment;
}

///
/// SettingsFragment
///
/// One named source of configuration entries.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SettingsFragment {
    name: String,
    entries: BTreeMap<String, ValueBox>,
}

impl SettingsFragment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), ValueBox::new(value));
        self
    }

    pub fn from_pairs<K, V>(name: impl Into<String>, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let entries = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), ValueBox::new(v)))
            .collect();

        Self {
            name: name.into(),
            entries,
        }
    }

    /// Parse a JSON object. Nested objects flatten into dotted keys.
    pub fn from_json(name: impl Into<String>, text: &str) -> Result<Self, Error> {
        let name = name.into();
        let json: serde_json::Value = serde_json::from_str(text).map_err(|err| {
            Error::invalid_argument(
                ErrorOrigin::Settings,
                format!("settings fragment '{name}' is not valid JSON: {err}"),
            )
        })?;

        Self::from_json_value(name, &json)
    }

    pub fn from_json_value(
        name: impl Into<String>,
        json: &serde_json::Value,
    ) -> Result<Self, Error> {
        let name = name.into();
        let serde_json::Value::Object(map) = json else {
            return Err(Error::invalid_argument(
                ErrorOrigin::Settings,
                format!("settings fragment '{name}' must be a JSON object"),
            ));
        };

        let mut entries = BTreeMap::new();
        flatten_json("", map, &mut entries);

        Ok(Self { name, entries })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ValueBox> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValueBox)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn flatten_json(
    prefix: &str,
    map: &serde_json::Map<String, serde_json::Value>,
    out: &mut BTreeMap<String, ValueBox>,
) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match value {
            serde_json::Value::Object(nested) => flatten_json(&path, nested, out),
            other => {
                out.insert(path, ValueBox::new(json_to_value(other)));
            }
        }
    }
}

fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(v) => Value::Bool(*v),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_u64().map(Value::Uint))
            .or_else(|| n.as_f64().map(Value::float))
            .unwrap_or(Value::Null),
        serde_json::Value::String(s) => Value::Text(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(_) => Value::Text(json.to_string()),
    }
}

///
/// SettingsBuilder
///

#[derive(Clone, Debug)]
pub struct SettingsBuilder {
    fragment: SettingsFragment,
}

impl SettingsBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            fragment: SettingsFragment::new(name),
        }
    }

    #[must_use]
    pub fn put(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fragment.entries.insert(key.into(), ValueBox::new(value));
        self
    }

    #[must_use]
    pub fn put_box(mut self, key: impl Into<String>, value: ValueBox) -> Self {
        self.fragment.entries.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn put_all<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (k, v) in pairs {
            self.fragment.entries.insert(k.into(), ValueBox::new(v));
        }
        self
    }

    #[must_use]
    pub fn fragment(self) -> SettingsFragment {
        self.fragment
    }

    #[must_use]
    pub fn build(self) -> Settings {
        Settings::merge([self.fragment])
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new("builder")
    }
}

///
/// Settings
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Settings {
    entries: BTreeMap<String, Entry>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Entry {
    value: ValueBox,
    origin: String,
}

impl Settings {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Left fold: later fragments override earlier ones key by key.
    pub fn merge(fragments: impl IntoIterator<Item = SettingsFragment>) -> Self {
        fragments
            .into_iter()
            .fold(Self::default(), Self::with_fragment)
    }

    #[must_use]
    pub fn with_fragment(mut self, fragment: SettingsFragment) -> Self {
        let SettingsFragment { name, entries } = fragment;
        for (key, value) in entries {
            self.entries.insert(
                key,
                Entry {
                    value,
                    origin: name.clone(),
                },
            );
        }

        self
    }

    /// Provider fragments in ascending priority, then `explicit` in caller order.
    pub fn assemble(
        discovery: &ProviderDiscovery,
        explicit: impl IntoIterator<Item = SettingsFragment>,
    ) -> Self {
        let mut providers: Vec<_> = discovery
            .find(ExtensionPoint::SettingsProvider)
            .iter()
            .filter_map(|provider| match provider {
                Provider::SettingsProvider(p) => Some(p),
                _ => None,
            })
            .collect();
        providers.sort_by_key(|p| p.priority());

        let fragments: Vec<SettingsFragment> = providers
            .into_iter()
            .map(|p| p.fragment())
            .chain(explicit)
            .collect();
        let count = fragments.len();
        let settings = Self::merge(fragments);

        debug!(fragments = count, keys = settings.len(), "settings assembled");

        settings
    }

    ///
    /// ACCESS
    ///

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ValueBox> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Typed lookup through the converter registry; `None` when absent.
    pub fn get_as<T: FieldValue>(
        &self,
        key: &str,
        registry: &ConverterRegistry,
    ) -> Result<Option<T>, Error> {
        self.get(key)
            .map(|value| value.get(registry).map_err(|err| setting_error(key, err)))
            .transpose()
    }

    pub fn get_or<T: FieldValue>(
        &self,
        key: &str,
        registry: &ConverterRegistry,
        default: T,
    ) -> Result<T, Error> {
        Ok(self.get_as(key, registry)?.unwrap_or(default))
    }

    /// First present key among aliases, in the order given.
    #[must_use]
    pub fn get_first(&self, keys: &[&str]) -> Option<&ValueBox> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// Name of the fragment that supplied `key`.
    #[must_use]
    pub fn origin(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|entry| entry.origin.as_str())
    }

    /// Entries under `prefix`, with the prefix stripped from their keys.
    #[must_use]
    pub fn prefix(&self, prefix: &str) -> Self {
        let entries = self
            .entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| (key[prefix.len()..].to_string(), entry.clone()))
            .collect();

        Self { entries }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValueBox)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), &e.value))
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn setting_error(key: &str, err: ConversionError) -> Error {
    let mut error = Error::from(ConversionError::Field {
        field: key.to_string(),
        source: Box::new(err),
    });
    error.origin = ErrorOrigin::Settings;

    error
}
