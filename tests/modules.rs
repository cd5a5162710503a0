use ferrous_container::{ClassInfo, Container, DiError, LoadOptions, MemberKindTag, TypeRegistry};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Repository;

#[derive(Default)]
struct Mailer;

#[derive(Default)]
struct Helper;

fn registry() -> Arc<TypeRegistry> {
    let registry = Arc::new(TypeRegistry::new());
    registry.class::<Repository>().module("storage").default_constructor().register().unwrap();
    registry.class::<Mailer>().module("notify").default_constructor().register().unwrap();
    // Declared but never marked injectable.
    registry.class::<Helper>().default_constructor().register().unwrap();
    registry
}

#[test]
fn test_load_binds_injectable_classes_only() {
    let container = Container::new(registry());
    container.load(&LoadOptions::default()).unwrap();

    assert!(container.is_loaded());
    assert!(container.has_label("Repository"));
    assert!(container.has_label("Mailer"));
    assert!(!container.has_label("Helper"));
    assert_eq!(container.member("Mailer").unwrap().kind(), MemberKindTag::InjectableClass);
}

#[test]
fn test_load_filters_by_module() {
    let container = Container::new(registry());
    container.load(&LoadOptions::new().module("storage")).unwrap();

    assert!(container.has_label("Repository"));
    assert!(!container.has_label("Mailer"));
    // Classes of other modules are still reachable on demand.
    assert!(container.get_class::<Mailer>().is_ok());
}

#[test]
fn test_repeat_load_fails() {
    let container = Container::new(registry());
    container.load(&LoadOptions::default()).unwrap();
    assert!(matches!(container.load(&LoadOptions::default()), Err(DiError::ContainerRepeatLoad)));

    // Explicit lists may be loaded any number of times.
    let all = container.registry().all_metadata();
    container.load_from_metadata(&all, &LoadOptions::default()).unwrap();
    container.load_from_metadata(&all, &LoadOptions::default()).unwrap();
}

#[test]
fn test_load_from_classes_skips_unknown() {
    let container = Container::new(registry());
    container
        .load_from_classes(&[ClassInfo::of::<Mailer>(), ClassInfo::named("Unknown")], &LoadOptions::default())
        .unwrap();

    assert!(container.has_label("Mailer"));
    assert!(!container.has_label("Repository"));
    assert!(!container.is_loaded());
}

#[test]
fn test_non_injectable_class_is_not_resolvable() {
    let container = Container::new(registry());
    assert!(matches!(container.get_class::<Helper>(), Err(DiError::NotExistLabel(_))));
}

#[test]
fn test_override_parent_binds_ancestor_names() {
    struct Animal;
    struct Dog {
        _animal: Animal,
    }

    let registry = Arc::new(TypeRegistry::new());
    registry.class::<Animal>().injectable().constructor(|_| Ok(Animal)).register().unwrap();
    registry
        .class::<Dog>()
        .extends::<Animal, _>(|d| &mut d._animal)
        .override_parent()
        .constructor(|_| Ok(Dog { _animal: Animal }))
        .register()
        .unwrap();

    let container = Container::new(registry);
    container.load(&LoadOptions::default()).unwrap();

    let as_animal = container.get_class_value("Animal", &[]).unwrap();
    assert!(as_animal.downcast_ref::<Dog>().is_some());
    assert!(Arc::ptr_eq(
        &container.member("Animal").unwrap(),
        &container.member("Dog").unwrap()
    ));
}

#[test]
fn test_load_option_overrides_per_class_flag() {
    struct Base;
    struct Derived {
        _base: Base,
    }

    let registry = Arc::new(TypeRegistry::new());
    registry.class::<Base>().injectable().constructor(|_| Ok(Base)).register().unwrap();
    registry
        .class::<Derived>()
        .extends::<Base, _>(|d| &mut d._base)
        .override_parent()
        .constructor(|_| Ok(Derived { _base: Base }))
        .register()
        .unwrap();

    let off = Container::new(registry.clone());
    off.load(&LoadOptions::new().override_parent(false)).unwrap();
    assert!(off.get_class_value("Base", &[]).unwrap().downcast_ref::<Base>().is_some());

    struct Plain;
    struct Special {
        _plain: Plain,
    }
    registry.class::<Plain>().injectable().constructor(|_| Ok(Plain)).register().unwrap();
    registry
        .class::<Special>()
        .extends::<Plain, _>(|s| &mut s._plain)
        .injectable()
        .constructor(|_| Ok(Special { _plain: Plain }))
        .register()
        .unwrap();

    let on = Container::new(registry);
    on.load(&LoadOptions::new().override_parent(true)).unwrap();
    assert!(on.get_class_value("Plain", &[]).unwrap().downcast_ref::<Special>().is_some());
}

#[test]
fn test_create_immediately() {
    static BUILT: AtomicUsize = AtomicUsize::new(0);
    struct Warm;

    let registry = Arc::new(TypeRegistry::new());
    registry
        .class::<Warm>()
        .singleton()
        .create_immediately()
        .constructor(|_| {
            BUILT.fetch_add(1, Ordering::SeqCst);
            Ok(Warm)
        })
        .register()
        .unwrap();

    let container = Container::new(registry);
    container.load(&LoadOptions::default()).unwrap();
    assert_eq!(BUILT.load(Ordering::SeqCst), 1);
    assert!(container.member("Warm").unwrap().cached().is_some());

    container.get_class::<Warm>().unwrap();
    assert_eq!(BUILT.load(Ordering::SeqCst), 1);
}

#[test]
fn test_create_immediately_failure_surfaces_from_load() {
    struct NeedsConfig;

    let registry = Arc::new(TypeRegistry::new());
    registry
        .class::<NeedsConfig>()
        .create_immediately()
        .constructor_types(["config"])
        .constructor(|_| Ok(NeedsConfig))
        .register()
        .unwrap();

    let container = Container::new(registry);
    assert!(matches!(container.load(&LoadOptions::default()), Err(DiError::NotExistLabel(_))));
}

#[test]
fn test_class_loaded_fires_once_per_class() {
    let container = Container::new(registry());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let id = container.on_class_loaded(move |event| sink.lock().push(event.class_name.clone()));

    container.load(&LoadOptions::default()).unwrap();
    let all = container.registry().all_metadata();
    container.load_from_metadata(&all, &LoadOptions::default()).unwrap();

    assert_eq!(*seen.lock(), ["Repository".to_string(), "Mailer".to_string()]);

    assert!(container.off_class_loaded(id));
    assert!(!container.off_class_loaded(id));
}

#[test]
fn test_on_demand_load_fires_event() {
    let container = Container::new(registry());
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    container.on_class_loaded(move |event| {
        assert_eq!(event.member.class_name(), Some("Repository"));
        counter.fetch_add(1, Ordering::SeqCst);
    });

    container.get_class::<Repository>().unwrap();
    container.get_class::<Repository>().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
