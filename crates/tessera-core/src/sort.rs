//! Field ordering instructions.

use crate::discovery::{ExtensionPoint, Provider, ProviderDiscovery};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

///
/// Direction
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => f.write_str("asc"),
            Self::Desc => f.write_str("desc"),
        }
    }
}

///
/// Sort
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Desc)
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.direction)
    }
}

///
/// SortProvider
///
/// Rewrites parsed sorts for a backend, e.g. aliasing field names.
///

pub trait SortProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32 {
        0
    }

    fn adapt(&self, sort: Sort) -> Sort;
}

///
/// SortList
///
/// Ordered sorts, at most one per field. Adding a field that is already
/// present replaces it in place; removal leaves a tombstone that is
/// compacted once tombstones outnumber live entries, keeping `add` and
/// `remove` O(1) amortized.
///

#[derive(Clone, Debug, Default)]
pub struct SortList {
    slots: Vec<Option<Sort>>,
    index: HashMap<String, usize>,
    live: usize,
}

impl SortList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sort: Sort) -> &mut Self {
        if let Some(&pos) = self.index.get(&sort.field) {
            self.slots[pos] = Some(sort);
        } else {
            self.index.insert(sort.field.clone(), self.slots.len());
            self.slots.push(Some(sort));
            self.live += 1;
        }

        self
    }

    pub fn asc(&mut self, field: impl Into<String>) -> &mut Self {
        self.add(Sort::asc(field))
    }

    pub fn desc(&mut self, field: impl Into<String>) -> &mut Self {
        self.add(Sort::desc(field))
    }

    /// Remove `sort` if an equal entry is present.
    pub fn remove(&mut self, sort: &Sort) -> bool {
        let Some(&pos) = self.index.get(&sort.field) else {
            return false;
        };
        if self.slots[pos].as_ref() != Some(sort) {
            return false;
        }

        self.slots[pos] = None;
        self.index.remove(&sort.field);
        self.live -= 1;
        self.compact_if_sparse();

        true
    }

    /// Remove whatever sort is present for `field`.
    pub fn remove_field(&mut self, field: &str) -> Option<Sort> {
        let pos = self.index.remove(field)?;
        let removed = self.slots[pos].take();
        self.live -= 1;
        self.compact_if_sparse();

        removed
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Sort> {
        self.index
            .get(field)
            .and_then(|&pos| self.slots[pos].as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sort> {
        self.slots.iter().flatten()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
        self.live = 0;
    }

    /// Apply every discovered sort provider, highest priority first.
    #[must_use]
    pub fn adapt(&self, discovery: &ProviderDiscovery) -> Self {
        let providers = discovery.find(ExtensionPoint::SortProvider);

        self.iter()
            .cloned()
            .map(|sort| {
                providers.iter().fold(sort, |sort, provider| match provider {
                    Provider::SortProvider(p) => p.adapt(sort),
                    _ => sort,
                })
            })
            .collect()
    }

    fn compact_if_sparse(&mut self) {
        let tombstones = self.slots.len() - self.live;
        if tombstones <= self.live {
            return;
        }

        self.slots.retain(Option::is_some);
        for (pos, sort) in self.slots.iter().flatten().enumerate() {
            if let Some(slot) = self.index.get_mut(&sort.field) {
                *slot = pos;
            }
        }
    }
}

impl PartialEq for SortList {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for SortList {}

impl FromIterator<Sort> for SortList {
    fn from_iter<I: IntoIterator<Item = Sort>>(iter: I) -> Self {
        let mut list = Self::new();
        for sort in iter {
            list.add(sort);
        }

        list
    }
}

impl fmt::Display for SortList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, sort) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{sort}")?;
        }

        Ok(())
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::StaticSource;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn fields(list: &SortList) -> Vec<(String, Direction)> {
        list.iter()
            .map(|s| (s.field.clone(), s.direction))
            .collect()
    }

    #[test]
    fn duplicate_field_replaces_at_original_position() {
        let mut list = SortList::new();
        list.asc("name").desc("age").asc("city");
        list.desc("name");

        assert_eq!(
            fields(&list),
            vec![
                ("name".to_string(), Direction::Desc),
                ("age".to_string(), Direction::Desc),
                ("city".to_string(), Direction::Asc),
            ]
        );
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn remove_requires_structural_equality() {
        let mut list = SortList::new();
        list.asc("name").desc("age");

        assert!(!list.remove(&Sort::desc("name")));
        assert!(list.remove(&Sort::asc("name")));
        assert!(!list.remove(&Sort::asc("name")));
        assert_eq!(fields(&list), vec![("age".to_string(), Direction::Desc)]);
    }

    #[test]
    fn removed_field_can_be_added_again_at_the_end() {
        let mut list = SortList::new();
        list.asc("a").asc("b");
        list.remove_field("a");
        list.desc("a");

        assert_eq!(
            fields(&list),
            vec![
                ("b".to_string(), Direction::Asc),
                ("a".to_string(), Direction::Desc),
            ]
        );
        assert_eq!(list.get("a"), Some(&Sort::desc("a")));
    }

    #[test]
    fn compaction_keeps_lookups_consistent() {
        let mut list: SortList = (0..16).map(|i| Sort::asc(format!("f{i}"))).collect();
        for i in 0..12 {
            assert!(list.remove(&Sort::asc(format!("f{i}"))));
        }

        assert_eq!(list.len(), 4);
        assert!(list.slots.len() <= 2 * list.len() + 1);
        assert_eq!(list.get("f13"), Some(&Sort::asc("f13")));
        list.desc("f14");
        assert_eq!(list.iter().nth(2), Some(&Sort::desc("f14")));
    }

    #[test]
    fn display_lists_sorts_in_order() {
        let mut list = SortList::new();
        list.asc("name").desc("age");

        assert_eq!(list.to_string(), "name asc, age desc");
    }

    struct Alias;

    impl SortProvider for Alias {
        fn name(&self) -> &'static str {
            "test.alias"
        }

        fn adapt(&self, sort: Sort) -> Sort {
            if sort.field == "id" {
                Sort::new("_id", sort.direction)
            } else {
                sort
            }
        }
    }

    #[test]
    fn adapt_applies_discovered_providers() {
        let discovery = ProviderDiscovery::new();
        discovery.install(StaticSource::new(
            "test",
            vec![Provider::SortProvider(Arc::new(Alias))],
        ));

        let mut list = SortList::new();
        list.desc("id").asc("name");

        let adapted = list.adapt(&discovery);
        assert_eq!(
            fields(&adapted),
            vec![
                ("_id".to_string(), Direction::Desc),
                ("name".to_string(), Direction::Asc),
            ]
        );
    }

    #[derive(Clone, Debug)]
    enum Op {
        Add(u8, bool),
        Remove(u8, bool),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..6, any::<bool>()).prop_map(|(f, d)| Op::Add(f, d)),
            (0u8..6, any::<bool>()).prop_map(|(f, d)| Op::Remove(f, d)),
        ]
    }

    fn sort_for(field: u8, desc: bool) -> Sort {
        let direction = if desc { Direction::Desc } else { Direction::Asc };
        Sort::new(format!("f{field}"), direction)
    }

    proptest! {
        #[test]
        fn matches_a_naive_vec_model(ops in prop::collection::vec(arb_op(), 0..64)) {
            let mut list = SortList::new();
            let mut model: Vec<Sort> = Vec::new();

            for op in ops {
                match op {
                    Op::Add(f, d) => {
                        let sort = sort_for(f, d);
                        list.add(sort.clone());
                        match model.iter_mut().find(|s| s.field == sort.field) {
                            Some(existing) => *existing = sort,
                            None => model.push(sort),
                        }
                    }
                    Op::Remove(f, d) => {
                        let sort = sort_for(f, d);
                        let removed = list.remove(&sort);
                        let before = model.len();
                        model.retain(|s| *s != sort);
                        prop_assert_eq!(removed, model.len() != before);
                    }
                }

                prop_assert_eq!(list.iter().cloned().collect::<Vec<_>>(), model.clone());
                prop_assert_eq!(list.len(), model.len());
            }
        }
    }
}
