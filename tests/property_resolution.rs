/// Property-based tests for label resolution
///
/// These tests verify that resolution behavior follows expected patterns
/// regardless of the labels, values or graph shapes used.

use ferrous_container::{AnyArc, Container, DiError, Label, LoadOptions, TypeRegistry};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn container() -> Container {
    Container::new(Arc::new(TypeRegistry::new()))
}

// Property: a bound value resolves to the identical shared instance
proptest! {
    #[test]
    fn value_resolution_consistency(label in "\\PC{1,30}", value in "\\PC{0,50}") {
        let c = container();
        c.bind_value(label.as_str(), value.clone()).unwrap();

        let a = c.get::<String>(label.as_str()).unwrap();
        let b = c.get::<String>(label.as_str()).unwrap();
        prop_assert!(Arc::ptr_eq(&a, &b));
        prop_assert_eq!(a.as_str(), value.as_str());
    }
}

// Property: tokens with equal descriptions are distinct bindings
proptest! {
    #[test]
    fn tokens_are_unique(description in "[a-z]{0,12}", values in prop::collection::vec(any::<u32>(), 1..8)) {
        let c = container();
        let tokens: Vec<Label> = values.iter().map(|_| Label::token(&description)).collect();
        for (token, value) in tokens.iter().zip(&values) {
            c.bind_value(token, *value).unwrap();
        }
        for (token, value) in tokens.iter().zip(&values) {
            prop_assert_eq!(*c.get::<u32>(token).unwrap(), *value);
        }
        prop_assert!(!c.has_label(description.as_str()));
    }
}

// Property: factories run once per lookup, getters once in total
proptest! {
    #[test]
    fn factory_and_getter_call_counts(lookups in 1usize..20) {
        let c = container();
        let factory_calls = Arc::new(AtomicUsize::new(0));
        let getter_calls = Arc::new(AtomicUsize::new(0));
        let f = factory_calls.clone();
        let g = getter_calls.clone();
        c.bind_factory("f", move |_: &[AnyArc]| f.fetch_add(1, Ordering::SeqCst)).unwrap();
        c.bind_getter("g", move |_: &[AnyArc]| g.fetch_add(1, Ordering::SeqCst)).unwrap();

        for _ in 0..lookups {
            c.get_value("f", &[]).unwrap();
            c.get_value("g", &[]).unwrap();
        }
        prop_assert_eq!(factory_calls.load(Ordering::SeqCst), lookups);
        prop_assert_eq!(getter_calls.load(Ordering::SeqCst), 1);
    }
}

// Property: a ring of classes always reports the full ring as its cycle path
proptest! {
    #[test]
    fn ring_cycle_reports_path(size in 1usize..8) {
        struct Node;
        let registry = Arc::new(TypeRegistry::new());
        for i in 0..size {
            registry
                .class::<Node>()
                .named(format!("Node{}", i))
                .injectable()
                .constructor_types([format!("Node{}", (i + 1) % size)])
                .constructor(|_| Ok(Node))
                .register()
                .unwrap();
        }
        let c = Container::new(registry);
        c.load(&LoadOptions::default()).unwrap();

        let mut expected: Vec<String> = (0..size).map(|i| format!("Node{}", i)).collect();
        expected.push("Node0".to_string());
        match c.get_class_value("Node0", &[]) {
            Err(DiError::DependencyCycle(path)) => prop_assert_eq!(path, expected),
            other => prop_assert!(false, "expected cycle, got {:?}", other.map(|_| ())),
        }
    }
}

// Property: singletons stay singletons, other classes are rebuilt
proptest! {
    #[test]
    fn singleton_identity(singleton in any::<bool>(), lookups in 2usize..10) {
        struct Widget;
        let registry = Arc::new(TypeRegistry::new());
        let builder = registry.class::<Widget>().injectable().constructor(|_| Ok(Widget));
        let builder = if singleton { builder.singleton() } else { builder };
        builder.register().unwrap();

        let c = Container::new(registry);
        let first = c.get_class::<Widget>().unwrap();
        for _ in 1..lookups {
            let next = c.get_class::<Widget>().unwrap();
            prop_assert_eq!(Arc::ptr_eq(&first, &next), singleton);
        }
    }
}
