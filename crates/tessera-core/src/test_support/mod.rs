//! In-memory backends exercising the execution contract end to end.

use crate::{
    error::Error,
    query::{BoundOperation, DataModel, Record, Target, Verb, eval},
    value::{Value, ValueBox},
};
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

///
/// MemoryKv
///
/// Key-value backend. Records are `{ key, value }`.
///

#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<Vec<(Value, Value)>>,
    executed: Mutex<Vec<BoundOperation>>,
}

impl MemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executed(&self) -> Vec<BoundOperation> {
        lock(&self.executed).clone()
    }

    pub fn entry_count(&self) -> usize {
        lock(&self.entries).len()
    }

    fn record(key: &Value, value: &Value) -> Record {
        Record::new().with("key", key.clone()).with("value", value.clone())
    }
}

impl crate::query::Backend for MemoryKv {
    fn name(&self) -> &str {
        "memory-kv"
    }

    fn data_model(&self) -> DataModel {
        DataModel::KeyValue
    }

    fn execute(&self, operation: &BoundOperation) -> Result<Vec<Record>, Error> {
        lock(&self.executed).push(operation.clone());

        let key = operation
            .key_value()
            .ok_or_else(|| Error::backend("key-value operation without a bound key"))?;
        let mut entries = lock(&self.entries);
        let position = entries.iter().position(|(k, _)| k == key);

        match operation.verb {
            Verb::Put => {
                let value = operation.put_value().cloned().unwrap_or(Value::Null);
                match position {
                    Some(i) => entries[i].1 = value,
                    None => entries.push((key.clone(), value)),
                }
                Ok(Vec::new())
            }
            Verb::Get => Ok(position
                .map(|i| Self::record(&entries[i].0, &entries[i].1))
                .into_iter()
                .collect()),
            Verb::Del => Ok(position
                .map(|i| {
                    let (k, v) = entries.remove(i);
                    Self::record(&k, &v)
                })
                .into_iter()
                .collect()),
            verb => Err(Error::backend(format!("{verb} is not a key-value verb"))),
        }
    }
}

///
/// MemoryDocuments
///
/// Document backend keeping one record list per entity.
///

#[derive(Debug, Default)]
pub struct MemoryDocuments {
    entities: Mutex<BTreeMap<String, Vec<Record>>>,
    executed: Mutex<Vec<BoundOperation>>,
}

impl MemoryDocuments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `entity` with records.
    #[must_use]
    pub fn with_records(self, entity: &str, records: impl IntoIterator<Item = Record>) -> Self {
        lock(&self.entities)
            .entry(entity.to_string())
            .or_default()
            .extend(records);
        self
    }

    pub fn records(&self, entity: &str) -> Vec<Record> {
        lock(&self.entities).get(entity).cloned().unwrap_or_default()
    }

    pub fn executed(&self) -> Vec<BoundOperation> {
        lock(&self.executed).clone()
    }

    pub fn last_executed(&self) -> Option<BoundOperation> {
        lock(&self.executed).last().cloned()
    }
}

impl crate::query::Backend for MemoryDocuments {
    fn name(&self) -> &str {
        "memory-documents"
    }

    fn data_model(&self) -> DataModel {
        DataModel::Document
    }

    fn execute(&self, operation: &BoundOperation) -> Result<Vec<Record>, Error> {
        lock(&self.executed).push(operation.clone());

        let Target::Entity(entity) = &operation.target else {
            return Err(Error::backend("document operation without an entity"));
        };
        let mut entities = lock(&self.entities);
        let records = entities.entry(entity.clone()).or_default();
        let selected =
            |record: &Record| operation.condition.as_ref().is_none_or(|c| eval::matches(c, record));

        match operation.verb {
            Verb::Select => Ok(eval::apply(records.iter().cloned(), operation)),
            Verb::Insert => {
                records.push(
                    operation
                        .assigned_values()
                        .map(|(field, value)| (field, ValueBox::new(value.clone())))
                        .collect(),
                );
                Ok(Vec::new())
            }
            Verb::Update => {
                for record in records.iter_mut().filter(|r| selected(r)) {
                    for (field, value) in operation.assigned_values() {
                        record.set(field, ValueBox::new(value.clone()));
                    }
                }
                Ok(Vec::new())
            }
            Verb::Delete => {
                records.retain(|r| !selected(r));
                Ok(Vec::new())
            }
            verb => Err(Error::backend(format!("{verb} is not a document verb"))),
        }
    }
}
