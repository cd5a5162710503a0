/// Memory management integration tests
///
/// These tests verify that containers release what they hold: disposed
/// members, dropped child containers and unbound values.

use ferrous_container::{Container, LoadOptions, TypeRegistry};
use std::sync::{Arc, Weak};

struct Resource;

fn registry() -> Arc<TypeRegistry> {
    let registry = Arc::new(TypeRegistry::new());
    registry
        .class::<Resource>()
        .singleton()
        .constructor(|_| Ok(Resource))
        .register()
        .unwrap();
    registry
}

#[test]
fn test_dispose_releases_singletons() {
    let container = Container::new(registry());
    container.load(&LoadOptions::default()).unwrap();
    let weak: Weak<Resource> = Arc::downgrade(&container.get_class::<Resource>().unwrap());
    assert!(weak.upgrade().is_some());

    container.dispose();
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_unbind_releases_value() {
    let container = Container::new(Arc::new(TypeRegistry::new()));
    let value = Arc::new(vec![0u8; 1024]);
    let weak = Arc::downgrade(&value);
    container.bind_instance(value).unwrap();

    assert!(weak.upgrade().is_some());
    container.unbind("Vec<u8>");
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_dropped_child_releases_its_instances() {
    let registry = registry();
    let parent = Container::new(registry.clone());
    parent.load(&LoadOptions::default()).unwrap();

    let weak = {
        let child = Container::new(registry);
        child.extend(Some(&parent));
        Arc::downgrade(&child.get_class::<Resource>().unwrap())
    };
    assert!(weak.upgrade().is_none());
    assert!(parent.member("Resource").unwrap().cached().is_none());
}

#[test]
fn test_parent_does_not_keep_child_alive() {
    let registry = registry();
    let parent = Container::new(registry.clone());
    let child = Container::new(registry);
    child.extend(Some(&parent));
    let probe = child.clone();
    drop(child);

    // The parent's subscription holds only a weak reference.
    parent.load(&LoadOptions::default()).unwrap();
    assert!(probe.has_label("Resource"));
    drop(probe);
    assert!(parent.has_label("Resource"));
}

#[test]
fn test_many_short_lived_children() {
    let registry = registry();
    let parent = Container::new(registry.clone());
    parent.load(&LoadOptions::default()).unwrap();
    let shared = parent.get_class::<Resource>().unwrap();

    for _ in 0..1000 {
        let child = Container::new(registry.clone());
        child.extend(Some(&parent));
        let own = child.get_class::<Resource>().unwrap();
        assert!(!Arc::ptr_eq(&shared, &own));
        assert!(Arc::ptr_eq(&own, &child.get_class::<Resource>().unwrap()));
    }
    // Children never cached the parent's instance.
    assert_eq!(Arc::strong_count(&shared), 2);
}
