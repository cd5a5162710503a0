//! Type registry: per-class injection metadata and inheritance merging.
//!
//! Every class the container can build is described by one [`Metadata`]
//! record inside a [`TypeRegistry`]. A subclass record is merged with the
//! nearest ancestor that already has metadata when it is first created:
//! field types and user data are combined (child entries win), and the
//! parent's constructor parameters are copied until the subclass declares
//! its own.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::label::{class_name, Label};

pub mod params;
pub mod user_data;

pub use params::{
    fill_in_method_parameter_types, AfterCallMethod, AfterExecute, AnyArc, AnyObject, Args,
    BeforeCallMethod, BoxFuture, Constructor, FieldAssign, FieldType, MethodBody, MethodContext,
    MethodParameterOption, OnCreate, ParameterSpec, ReturnValue, ValueGetter,
};
pub use user_data::UserData;

/// Internal key of the constructor in the method table.
pub const CONSTRUCTOR_KEY: &str = "_constructor";

/// Maps a method name from the call boundary onto the method table key.
pub fn method_key(method_name: &str) -> &str {
    if method_name == "constructor" {
        CONSTRUCTOR_KEY
    } else {
        method_name
    }
}

/// Shared, mutable handle to a class's metadata.
pub type MetadataRef = Arc<RwLock<Metadata>>;

/// Projects an instance onto the embedded value of its direct parent class.
pub type Upcast =
    Arc<dyn for<'a> Fn(&'a mut AnyObject) -> Option<&'a mut AnyObject> + Send + Sync>;

/// Identity of a class: its registered name and, for Rust types, its `TypeId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassInfo {
    pub name: String,
    pub type_id: Option<TypeId>,
}

impl ClassInfo {
    pub fn of<T: Any>() -> Self {
        Self {
            name: class_name::<T>(),
            type_id: Some(TypeId::of::<T>()),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn label(&self) -> Label {
        Label::name(&self.name)
    }
}

/// Injection metadata of one class.
pub struct Metadata {
    class: ClassInfo,
    /// Set once the class has been marked for injection
    pub injectable: bool,
    pub module_name: Option<String>,
    pub singleton: bool,
    pub create_immediately: bool,
    pub override_parent: bool,
    pub on_create: Option<OnCreate>,
    /// How to build an instance from resolved constructor arguments
    pub constructor: Option<Constructor>,
    /// True while the constructor spec is the one copied from the parent
    pub copied_constructor_params: bool,
    method_parameter_types: HashMap<String, ParameterSpec>,
    field_types: BTreeMap<String, FieldType>,
    parent_class_names: Vec<String>,
    user_data: UserData,
}

impl Metadata {
    fn new(class: ClassInfo) -> Self {
        Self {
            class,
            injectable: false,
            module_name: None,
            singleton: false,
            create_immediately: false,
            override_parent: false,
            on_create: None,
            constructor: None,
            copied_constructor_params: false,
            method_parameter_types: HashMap::new(),
            field_types: BTreeMap::new(),
            parent_class_names: Vec::new(),
            user_data: UserData::new(),
        }
    }

    pub fn class(&self) -> &ClassInfo {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    /// Returns (creating if absent) the parameter spec of a method.
    pub fn method_parameter_types(&mut self, method_name: &str) -> &mut ParameterSpec {
        self.method_parameter_types
            .entry(method_key(method_name).to_string())
            .or_default()
    }

    pub fn constructor_parameter_types(&mut self) -> &mut ParameterSpec {
        self.method_parameter_types(CONSTRUCTOR_KEY)
    }

    /// Read-only lookup; does not create an entry.
    pub fn parameter_spec(&self, method_name: &str) -> Option<&ParameterSpec> {
        self.method_parameter_types.get(method_key(method_name))
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.method_parameter_types.keys().map(String::as_str)
    }

    pub fn field_types(&self) -> &BTreeMap<String, FieldType> {
        &self.field_types
    }

    pub fn field_types_mut(&mut self) -> &mut BTreeMap<String, FieldType> {
        &mut self.field_types
    }

    /// Ancestor chain, nearest first.
    pub fn parent_class_names(&self) -> &[String] {
        &self.parent_class_names
    }

    pub fn user_data(&self) -> &UserData {
        &self.user_data
    }

    pub fn user_data_mut(&mut self) -> &mut UserData {
        &mut self.user_data
    }

    /// Discards a constructor spec copied from the parent, if any.
    ///
    /// Returns true if something was discarded.
    pub fn discard_copied_constructor(&mut self) -> bool {
        if !self.copied_constructor_params {
            return false;
        }
        self.copied_constructor_params = false;
        self.constructor_parameter_types().clear_parameters();
        true
    }

    fn merge(&mut self, parent: &Metadata) {
        let mut fields = parent.field_types.clone();
        fields.extend(self.field_types.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.field_types = fields;

        self.user_data = user_data::merged(&parent.user_data, &self.user_data);

        if let Some(ctor) = parent.method_parameter_types.get(CONSTRUCTOR_KEY) {
            self.copied_constructor_params = true;
            self.method_parameter_types
                .insert(CONSTRUCTOR_KEY.to_string(), ctor.parameters_only());
        }
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metadata")
            .field("class", &self.class.name)
            .field("injectable", &self.injectable)
            .field("module_name", &self.module_name)
            .field("singleton", &self.singleton)
            .field("create_immediately", &self.create_immediately)
            .field("override_parent", &self.override_parent)
            .field("copied_constructor_params", &self.copied_constructor_params)
            .field("methods", &self.method_parameter_types)
            .field("fields", &self.field_types)
            .field("parent_class_names", &self.parent_class_names)
            .field("user_data", &self.user_data)
            .finish()
    }
}

/// Declared position of a class in its inheritance chain.
#[derive(Clone)]
struct Lineage {
    parent: Option<String>,
    upcast: Option<Upcast>,
}

#[derive(Default)]
struct RegistryInner {
    metadata: HashMap<String, MetadataRef>,
    order: Vec<String>,
    lineage: HashMap<String, Lineage>,
    type_names: HashMap<TypeId, String>,
}

/// Registry of class metadata, shared by the containers built from it.
///
/// Create one per application (or per test) and hand it to every
/// [`Container`](crate::Container) that should see its classes.
///
/// ```rust
/// use ferrous_container::{ClassInfo, TypeRegistry};
///
/// let registry = TypeRegistry::new();
/// registry.declare_class(&ClassInfo::named("Base"), None, None);
/// registry.declare_class(&ClassInfo::named("Derived"), Some("Base"), None);
///
/// registry.get_or_create(&ClassInfo::named("Base")).write().user_data_mut()
///     .insert("tag".into(), "base".into());
/// let derived = registry.get_or_create(&ClassInfo::named("Derived"));
///
/// let derived = derived.read();
/// assert_eq!(derived.parent_class_names(), ["Base".to_string()]);
/// assert_eq!(derived.user_data()["tag"], "base");
/// ```
#[derive(Default)]
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a class's direct parent and the projection onto it.
    ///
    /// Must happen before the class's metadata is created for the parent to
    /// be merged. Redeclaring replaces the previous lineage.
    pub fn declare_class(&self, class: &ClassInfo, parent: Option<&str>, upcast: Option<Upcast>) {
        let mut inner = self.inner.write();
        if let Some(id) = class.type_id {
            inner.type_names.insert(id, class.name.clone());
        }
        inner.lineage.insert(
            class.name.clone(),
            Lineage {
                parent: parent.map(str::to_string),
                upcast,
            },
        );
    }

    /// Returns the class's metadata, creating (and merging) it on first access.
    pub fn get_or_create(&self, class: &ClassInfo) -> MetadataRef {
        if let Some(existing) = self.get(&class.name) {
            return existing;
        }

        let mut inner = self.inner.write();
        if let Some(existing) = inner.metadata.get(&class.name) {
            return existing.clone();
        }
        if let Some(id) = class.type_id {
            inner.type_names.entry(id).or_insert_with(|| class.name.clone());
        }

        let mut metadata = Metadata::new(class.clone());
        let mut merged = false;
        let mut current = inner.lineage.get(&class.name).and_then(|l| l.parent.clone());
        while let Some(parent_name) = current {
            if parent_name == class.name || metadata.parent_class_names.contains(&parent_name) {
                tracing::warn!(class = %class.name, parent = %parent_name, "inheritance loop in class lineage");
                break;
            }
            metadata.parent_class_names.push(parent_name.clone());
            if !merged {
                if let Some(parent) = inner.metadata.get(&parent_name) {
                    metadata.merge(&parent.read());
                    merged = true;
                    tracing::trace!(class = %class.name, parent = %parent_name, "merged parent metadata");
                }
            }
            current = inner.lineage.get(&parent_name).and_then(|l| l.parent.clone());
        }

        let metadata = Arc::new(RwLock::new(metadata));
        inner.metadata.insert(class.name.clone(), metadata.clone());
        inner.order.push(class.name.clone());
        tracing::debug!(class = %class.name, "created class metadata");
        metadata
    }

    pub fn get(&self, class_name: &str) -> Option<MetadataRef> {
        self.inner.read().metadata.get(class_name).cloned()
    }

    pub fn get_by_type<T: Any>(&self) -> Option<MetadataRef> {
        let name = self.class_name_of(TypeId::of::<T>())?;
        self.get(&name)
    }

    /// Registered class name of a Rust type, if it was declared.
    pub fn class_name_of(&self, type_id: TypeId) -> Option<String> {
        self.inner.read().type_names.get(&type_id).cloned()
    }

    /// Registered class name of `T`, falling back to [`class_name`].
    pub fn name_of<T: Any>(&self) -> String {
        self.class_name_of(TypeId::of::<T>()).unwrap_or_else(class_name::<T>)
    }

    /// All metadata records in creation order.
    pub fn all_metadata(&self) -> Vec<MetadataRef> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|name| inner.metadata.get(name).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Direct parent and projection onto it, as declared.
    pub(crate) fn parent_of(&self, class_name: &str) -> Option<(String, Option<Upcast>)> {
        let inner = self.inner.read();
        let lineage = inner.lineage.get(class_name)?;
        Some((lineage.parent.clone()?, lineage.upcast.clone()))
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("TypeRegistry")
            .field("classes", &inner.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn named(name: &str) -> ClassInfo {
        ClassInfo::named(name)
    }

    #[test]
    fn one_record_per_class() {
        let registry = TypeRegistry::new();
        let a = registry.get_or_create(&named("A"));
        let b = registry.get_or_create(&named("A"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn records_full_chain_but_merges_nearest_only() {
        let registry = TypeRegistry::new();
        registry.declare_class(&named("B"), Some("A"), None);
        registry.declare_class(&named("C"), Some("B"), None);

        {
            let a = registry.get_or_create(&named("A"));
            a.write().user_data_mut().insert("from_a".into(), json!(1));
        }
        {
            let b = registry.get_or_create(&named("B"));
            b.write().user_data_mut().insert("from_b".into(), json!(2));
        }

        let c = registry.get_or_create(&named("C"));
        let c = c.read();
        assert_eq!(c.parent_class_names(), ["B".to_string(), "A".to_string()]);
        // B already carries A's data from its own merge.
        assert_eq!(c.user_data()["from_a"], json!(1));
        assert_eq!(c.user_data()["from_b"], json!(2));
    }

    #[test]
    fn constructor_params_are_copied_without_hooks() {
        let registry = TypeRegistry::new();
        registry.declare_class(&named("Child"), Some("Parent"), None);
        {
            let parent = registry.get_or_create(&named("Parent"));
            let mut parent = parent.write();
            let ctor = parent.constructor_parameter_types();
            ctor.set_type(0, Label::from("Dep")).unwrap();
            ctor.before_call_methods.push(BeforeCallMethod::sync(|_, _, _| Ok(())));
        }

        let child = registry.get_or_create(&named("Child"));
        let mut child = child.write();
        assert!(child.copied_constructor_params);
        let ctor = child.constructor_parameter_types();
        assert_eq!(ctor.type_at(0), Some(&Label::from("Dep")));
        assert!(ctor.before_call_methods.is_empty());

        assert!(child.discard_copied_constructor());
        assert_eq!(child.constructor_parameter_types().arity(), 0);
        assert!(!child.discard_copied_constructor());
    }

    #[test]
    fn constructor_keyword_maps_to_reserved_key() {
        assert_eq!(method_key("constructor"), CONSTRUCTOR_KEY);
        assert_eq!(method_key("run"), "run");
        let registry = TypeRegistry::new();
        let m = registry.get_or_create(&named("X"));
        m.write().method_parameter_types("constructor").set_type(0, Label::from("Y")).unwrap();
        assert!(m.read().parameter_spec(CONSTRUCTOR_KEY).is_some());
        assert!(m.read().parameter_spec("constructor").is_some());
    }

    #[test]
    fn type_names_resolve_declared_types() {
        struct Engine;
        let registry = TypeRegistry::new();
        registry.declare_class(&ClassInfo::of::<Engine>().with_name("V8"), None, None);
        assert_eq!(registry.name_of::<Engine>(), "V8");
        assert_eq!(registry.name_of::<u8>(), "u8");
    }
}
