use crate::{
    convert::{ConversionError, ValueReader},
    discovery::{
        DiscoveryError, ExtensionPoint, Provider, ProviderDiscovery, ProviderSource, StaticSource,
    },
    error::{Error, ErrorClass},
    value::{ValueBox, ValueType},
};
use std::{
    sync::{
        Arc, Barrier,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

struct Named {
    name: &'static str,
    priority: i32,
}

impl ValueReader for Named {
    fn name(&self) -> &'static str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn read(&self, value: &ValueBox, _target: &ValueType) -> Result<ValueBox, ConversionError> {
        Ok(value.clone())
    }
}

fn reader(name: &'static str, priority: i32) -> Provider {
    Provider::ValueReader(Arc::new(Named { name, priority }))
}

struct CountingSource {
    calls: Arc<AtomicUsize>,
    providers: Vec<Provider>,
}

impl ProviderSource for CountingSource {
    fn name(&self) -> &'static str {
        "test.counting"
    }

    fn providers(&self) -> Vec<Provider> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::yield_now();
        self.providers.clone()
    }
}

fn names(providers: &[Provider]) -> Vec<&'static str> {
    providers.iter().map(Provider::name).collect()
}

#[test]
fn find_is_memoized_and_structurally_stable() {
    let discovery = ProviderDiscovery::new();
    discovery.install(StaticSource::new(
        "test",
        vec![reader("a", 0), reader("b", 5)],
    ));

    let first = discovery.find(ExtensionPoint::ValueReader);
    let second = discovery.find(ExtensionPoint::ValueReader);

    assert_eq!(names(first), vec!["b", "a"]);
    assert_eq!(names(first), names(second));
    assert!(std::ptr::eq(first, second));
    assert_eq!(discovery.scan_count(), 1);
}

#[test]
fn concurrent_first_callers_observe_exactly_one_scan() {
    const THREADS: usize = 16;

    let calls = Arc::new(AtomicUsize::new(0));
    let discovery = ProviderDiscovery::new();
    discovery.install(CountingSource {
        calls: Arc::clone(&calls),
        providers: vec![reader("x", 1), reader("y", 2), reader("z", 3)],
    });

    let barrier = Barrier::new(THREADS);
    let seen: Vec<Vec<&'static str>> = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(THREADS);
        for _ in 0..THREADS {
            handles.push(scope.spawn(|| {
                barrier.wait();
                names(discovery.find(ExtensionPoint::ValueReader))
            }));
        }

        handles
            .into_iter()
            .map(|h| h.join().expect("worker thread"))
            .collect()
    });

    assert_eq!(discovery.scan_count(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in &seen {
        assert_eq!(result, &vec!["z", "y", "x"]);
    }
}

#[test]
fn each_extension_point_is_scanned_independently() {
    let discovery = ProviderDiscovery::new();
    discovery.install(StaticSource::new("test", vec![reader("a", 0)]));

    assert_eq!(discovery.find(ExtensionPoint::ValueReader).len(), 1);
    assert!(discovery.find(ExtensionPoint::SortProvider).is_empty());
    assert!(discovery.find(ExtensionPoint::SortProvider).is_empty());
    assert_eq!(discovery.scan_count(), 2);
}

#[test]
fn sources_installed_after_resolution_are_not_picked_up() {
    let discovery = ProviderDiscovery::new();
    discovery.install(StaticSource::new("early", vec![reader("early", 0)]));
    assert_eq!(names(discovery.find(ExtensionPoint::ValueReader)), vec!["early"]);

    discovery.install(StaticSource::new("late", vec![reader("late", 9)]));
    assert_eq!(names(discovery.find(ExtensionPoint::ValueReader)), vec!["early"]);
}

#[test]
fn empty_point_reports_nothing_without_failing() {
    let discovery = ProviderDiscovery::new();

    assert!(discovery.find(ExtensionPoint::QueryParser).is_empty());
    assert!(matches!(
        discovery.find_unique(ExtensionPoint::QueryParser),
        Ok(None)
    ));
}

#[test]
fn find_unique_prefers_highest_priority() {
    let discovery = ProviderDiscovery::new();
    discovery.install(StaticSource::new(
        "test",
        vec![reader("low", 0), reader("high", 10), reader("mid", 5)],
    ));

    let unique = discovery
        .find_unique(ExtensionPoint::ValueReader)
        .expect("unambiguous")
        .expect("present");
    assert_eq!(unique.name(), "high");
}

#[test]
fn equal_top_priority_is_ambiguous() {
    let discovery = ProviderDiscovery::new();
    discovery.install(StaticSource::new("one", vec![reader("first", 3)]));
    discovery.install(StaticSource::new("two", vec![reader("second", 3), reader("low", 1)]));

    let err = discovery
        .find_unique(ExtensionPoint::ValueReader)
        .expect_err("tie at top priority");
    assert_eq!(
        err,
        DiscoveryError::Ambiguous {
            point: ExtensionPoint::ValueReader,
            priority: 3,
            names: vec!["first".to_string(), "second".to_string()],
        }
    );

    let err: Error = err.into();
    assert_eq!(err.class, ErrorClass::AmbiguousProvider);

    let named = discovery
        .find_named(ExtensionPoint::ValueReader, "second")
        .expect("named lookup");
    assert_eq!(named.name(), "second");
}

#[test]
fn find_named_reports_unknown_names() {
    let discovery = ProviderDiscovery::new();
    let err = discovery
        .find_named(ExtensionPoint::SortProvider, "nope")
        .expect_err("unknown");

    assert_eq!(err.class(), ErrorClass::InvalidArgument);
    assert!(err.to_string().contains("nope"));
}
