use ferrous_container::{AnyArc, Container, DiError, Label, MemberKindTag, TypeRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn container() -> Container {
    Container::new(Arc::new(TypeRegistry::new()))
}

#[test]
fn value_roundtrip() {
    let c = container();
    c.bind_value("answer", 42u32).unwrap();

    assert_eq!(*c.get::<u32>("answer").unwrap(), 42);
    assert!(c.has_label("answer"));
    assert_eq!(c.member("answer").unwrap().kind(), MemberKindTag::Value);
}

#[test]
fn value_is_shared_not_copied() {
    let c = container();
    c.bind_value("list", vec![1, 2, 3]).unwrap();

    let a = c.get::<Vec<i32>>("list").unwrap();
    let b = c.get::<Vec<i32>>("list").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn bind_instance_uses_class_name() {
    struct Settings {
        verbose: bool,
    }

    let c = container();
    c.bind_instance(Arc::new(Settings { verbose: true })).unwrap();

    assert!(c.has_label("Settings"));
    assert!(c.get::<Settings>("Settings").unwrap().verbose);
}

#[test]
fn missing_label_is_reported() {
    let c = container();
    match c.get_value("nope", &[]) {
        Err(DiError::NotExistLabel(label)) => assert_eq!(label, "nope"),
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
}

#[test]
fn unit_value_is_rejected() {
    let c = container();
    assert!(matches!(c.bind_value("nothing", ()), Err(DiError::InvalidValue(_))));
    assert!(!c.has_label("nothing"));
}

#[test]
fn factory_runs_every_time() {
    let c = container();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    c.bind_factory("id", move |_| counter.fetch_add(1, Ordering::SeqCst)).unwrap();

    assert_eq!(*c.get::<usize>("id").unwrap(), 0);
    assert_eq!(*c.get::<usize>("id").unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(c.member("id").unwrap().kind(), MemberKindTag::Factory);
}

#[test]
fn getter_caches_first_result_and_ignores_later_args() {
    let c = container();
    c.bind_getter("first_arg", |args: &[AnyArc]| {
        args.first()
            .and_then(|a| a.downcast_ref::<String>())
            .cloned()
            .unwrap_or_default()
    })
    .unwrap();

    let one: Vec<AnyArc> = vec![Arc::new("one".to_string())];
    let two: Vec<AnyArc> = vec![Arc::new("two".to_string())];
    assert_eq!(c.get_with::<String>("first_arg", &one).unwrap().as_str(), "one");
    assert_eq!(c.get_with::<String>("first_arg", &two).unwrap().as_str(), "one");
    assert!(c.member("first_arg").unwrap().cached().is_some());
}

#[test]
fn rebinding_plain_members_replaces_them() {
    let c = container();
    c.bind_value("port", 80u16).unwrap();
    c.bind_value("port", 8080u16).unwrap();
    assert_eq!(*c.get::<u16>("port").unwrap(), 8080);

    c.bind_factory("port", |_| 9090u16).unwrap();
    assert_eq!(*c.get::<u16>("port").unwrap(), 9090);
}

#[test]
fn unbind_and_unbind_all() {
    let c = container();
    c.bind_value("a", 1u8).unwrap();
    c.bind_value("b", 2u8).unwrap();

    c.unbind("a");
    assert!(!c.has_label("a"));
    assert!(c.has_label("b"));

    c.unbind_all();
    assert!(c.is_empty());
}

#[test]
fn tokens_never_collide_with_names() {
    let c = container();
    let token = Label::token("port");
    c.bind_value(token.clone(), 1u16).unwrap();
    c.bind_value("port", 2u16).unwrap();

    assert_eq!(*c.get::<u16>(token).unwrap(), 1);
    assert_eq!(*c.get::<u16>("port").unwrap(), 2);
}

#[test]
fn typed_tokens() {
    let c = container();
    let timeout = ferrous_container::container_label::<u64>("timeout_ms");
    c.bind_value(&timeout, 250u64).unwrap();

    assert_eq!(*c.get_token(&timeout).unwrap(), 250);
    assert!(ferrous_container::is_container_label(timeout.label()));
}

#[test]
fn custom_validator() {
    use ferrous_container::ContainerOptions;

    let options = ContainerOptions::new().value_validator(|v: &AnyArc| v.downcast_ref::<i64>().map_or(true, |n| *n >= 0));
    let c = Container::with_options(Arc::new(TypeRegistry::new()), options);

    assert!(c.bind_value("ok", 1i64).is_ok());
    assert!(matches!(c.bind_value("neg", -1i64), Err(DiError::InvalidValue(_))));
    assert!(matches!(c.bind_value("unit", ()), Err(DiError::InvalidValue(_))));
}

#[test]
fn dispose_clears_everything() {
    let c = container();
    let parent = container();
    c.extend(Some(&parent));
    c.bind_value("x", 1u8).unwrap();
    c.on_class_loaded(|_| {});

    c.dispose();
    assert!(c.is_empty());
    assert!(c.parent().is_none());
}
