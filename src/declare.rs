//! Declaring classes to a [`TypeRegistry`].
//!
//! The free functions apply one declaration to a metadata record. They are
//! what [`ClassBuilder`] uses and are public for integrations that generate
//! metadata themselves. Declarations are applied member by member, then
//! constructor parameters, then the class-level injectable mark last, so that
//! explicitly injected parameters win over the ones declared for the class.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::Container;
use crate::error::{DiError, DiResult};
use crate::label::Label;
use crate::metadata::params::{downcast_arc, into_return_value};
use crate::metadata::{
    fill_in_method_parameter_types, AfterCallMethod, AfterExecute, AnyArc, AnyObject, Args, BeforeCallMethod,
    ClassInfo, Constructor, FieldAssign, FieldType, Metadata, MetadataRef, MethodBody, MethodParameterOption, OnCreate,
    ReturnValue, TypeRegistry, Upcast, ValueGetter, CONSTRUCTOR_KEY,
};

/// Class-level injection options.
#[derive(Clone, Default)]
pub struct InjectableOptions {
    pub module_name: Option<String>,
    pub singleton: bool,
    pub create_immediately: bool,
    /// Replace constructor parameters copied from the parent (default `true`)
    pub override_constructor: Option<bool>,
    pub override_parent: bool,
    pub on_create: Option<OnCreate>,
    pub parameters: MethodParameterOption,
}

impl fmt::Debug for InjectableOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectableOptions")
            .field("module_name", &self.module_name)
            .field("singleton", &self.singleton)
            .field("create_immediately", &self.create_immediately)
            .field("override_constructor", &self.override_constructor)
            .field("override_parent", &self.override_parent)
            .field("has_on_create", &self.on_create.is_some())
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Options of a single parameter, field or method declaration.
///
/// A bare label converts into options that only set the type label:
///
/// ```rust
/// use ferrous_container::{InjectOptions, Label};
///
/// let options: InjectOptions = "Engine".into();
/// assert_eq!(options.type_label, Some(Label::from("Engine")));
/// ```
#[derive(Clone, Default)]
pub struct InjectOptions {
    pub type_label: Option<Label>,
    pub type_value_getter: Option<ValueGetter>,
    pub parameters: MethodParameterOption,
    pub before_call_method: Option<BeforeCallMethod>,
    pub after_call_method: Option<AfterCallMethod>,
    pub after_execute: Option<AfterExecute>,
}

impl InjectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<Label>) -> Self {
        self.type_label = Some(label.into());
        self
    }

    pub fn getter(mut self, getter: ValueGetter) -> Self {
        self.type_value_getter = Some(getter);
        self
    }

    pub fn param_types<I, L>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        self.parameters = self.parameters.with_types(labels);
        self
    }

    pub fn param_getter(mut self, index: usize, getter: ValueGetter) -> Self {
        self.parameters = self.parameters.with_getter(index, getter);
        self
    }

    pub fn before_call(mut self, hook: BeforeCallMethod) -> Self {
        self.before_call_method = Some(hook);
        self
    }

    pub fn after_call(mut self, hook: AfterCallMethod) -> Self {
        self.after_call_method = Some(hook);
        self
    }

    pub fn after_execute<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Metadata, &str, &str, Option<usize>) + Send + Sync + 'static,
    {
        self.after_execute = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for InjectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectOptions")
            .field("type_label", &self.type_label)
            .field("has_getter", &self.type_value_getter.is_some())
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl From<Label> for InjectOptions {
    fn from(label: Label) -> Self {
        Self::new().label(label)
    }
}

impl From<&str> for InjectOptions {
    fn from(label: &str) -> Self {
        Self::new().label(label)
    }
}

impl From<String> for InjectOptions {
    fn from(label: String) -> Self {
        Self::new().label(label)
    }
}

impl<T> From<&crate::label::ContainerLabel<T>> for InjectOptions {
    fn from(label: &crate::label::ContainerLabel<T>) -> Self {
        Self::new().label(label)
    }
}

/// Wraps a typed getter for use as a parameter or field value source.
///
/// ```rust
/// use ferrous_container::{value_getter, Container, TypeRegistry};
/// use std::sync::Arc;
///
/// let container = Container::new(Arc::new(TypeRegistry::new()));
/// container.bind_value("port", 8080u16).unwrap();
///
/// let getter = value_getter(|c| c.get::<u16>("port"));
/// assert_eq!(getter(&container).unwrap().downcast_ref::<u16>(), Some(&8080));
/// ```
pub fn value_getter<T, F>(f: F) -> ValueGetter
where
    T: Any + Send + Sync,
    F: Fn(&Container) -> DiResult<Arc<T>> + Send + Sync + 'static,
{
    Arc::new(move |container: &Container| -> DiResult<AnyArc> { Ok(f(container)?) })
}

fn upcast_fn<F>(f: F) -> Upcast
where
    F: for<'a> Fn(&'a mut AnyObject) -> Option<&'a mut AnyObject> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn constructor_fn<F>(f: F) -> Constructor
where
    F: Fn(Args<'_>) -> DiResult<Box<AnyObject>> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn run_after_execute(metadata: &mut Metadata, hook: Option<&AfterExecute>, member: &str, index: Option<usize>) {
    if let Some(hook) = hook {
        let class_name = metadata.class_name().to_string();
        hook(metadata, &class_name, member, index);
    }
}

// ===== Declarations on a metadata record =====

/// Marks a class injectable and fills its constructor parameters.
///
/// `native` is the constructor's declared parameter list; `None` means the
/// class declared none and reads as an empty list. Unless
/// `override_constructor` is `Some(false)`, parameters copied from the parent
/// are replaced when the class supplies its own list.
pub fn mark_injectable(metadata: &mut Metadata, native: Option<&[Label]>, options: &InjectableOptions) -> DiResult<()> {
    metadata.injectable = true;
    metadata.module_name = options.module_name.clone();
    metadata.singleton = options.singleton;
    metadata.create_immediately = options.create_immediately;
    metadata.override_parent = options.override_parent;
    metadata.on_create = options.on_create.clone();

    let keep_inherited = options.override_constructor == Some(false);
    if keep_inherited && metadata.copied_constructor_params {
        tracing::trace!(class = %metadata.class_name(), "keeping inherited constructor parameters");
        return Ok(());
    }
    if native.is_some() {
        metadata.discard_copied_constructor();
    }

    let native = native.unwrap_or(&[]);
    fill_in_method_parameter_types(
        metadata.constructor_parameter_types(),
        Some(&options.parameters),
        Some(native),
    )
}

/// Declares how one parameter of a method (or the constructor) is resolved.
pub fn inject_parameter(metadata: &mut Metadata, method_name: &str, index: usize, options: &InjectOptions) -> DiResult<()> {
    let spec = if crate::metadata::method_key(method_name) == CONSTRUCTOR_KEY {
        metadata.discard_copied_constructor();
        metadata.constructor_parameter_types()
    } else {
        metadata.method_parameter_types(method_name)
    };
    if options.type_label.is_none() && options.type_value_getter.is_none() {
        return Err(DiError::InjectNotFoundType(format!(
            "parameter {} of {}",
            index, method_name
        )));
    }
    if let Some(label) = &options.type_label {
        spec.set_type(index, label.clone())?;
    }
    if let Some(getter) = &options.type_value_getter {
        spec.set_getter(index, getter.clone())?;
    }
    run_after_execute(metadata, options.after_execute.as_ref(), method_name, Some(index));
    Ok(())
}

/// Declares an injected method: parameter types, hooks and the invocable body.
pub fn inject_method(
    metadata: &mut Metadata,
    method_name: &str,
    native: &[Label],
    options: &InjectOptions,
    body: Option<MethodBody>,
) -> DiResult<()> {
    let spec = metadata.method_parameter_types(method_name);
    fill_in_method_parameter_types(spec, Some(&options.parameters), Some(native))?;
    if let Some(hook) = &options.before_call_method {
        spec.before_call_methods.push(hook.clone());
    }
    if let Some(hook) = &options.after_call_method {
        spec.after_call_methods.push(hook.clone());
    }
    if let Some(body) = body {
        spec.body = Some(body);
    }
    run_after_execute(metadata, options.after_execute.as_ref(), method_name, None);
    Ok(())
}

/// Declares an injected field. An explicit label wins over the native type.
pub fn inject_field(
    metadata: &mut Metadata,
    field_name: &str,
    native: Option<Label>,
    options: &InjectOptions,
    assign: FieldAssign,
) -> DiResult<()> {
    let type_label = options.type_label.clone().or(native);
    if type_label.is_none() && options.type_value_getter.is_none() {
        return Err(DiError::InjectNotFoundType(format!(
            "field {}.{}",
            metadata.class_name(),
            field_name
        )));
    }
    let owner = metadata.class_name().to_string();
    metadata.field_types_mut().insert(
        field_name.to_string(),
        FieldType {
            type_label,
            getter: options.type_value_getter.clone(),
            owner,
            assign,
        },
    );
    run_after_execute(metadata, options.after_execute.as_ref(), field_name, None);
    Ok(())
}

pub fn add_before_call_method(metadata: &mut Metadata, method_name: &str, hook: BeforeCallMethod) {
    metadata.method_parameter_types(method_name).before_call_methods.push(hook);
}

pub fn add_after_call_method(metadata: &mut Metadata, method_name: &str, hook: AfterCallMethod) {
    metadata.method_parameter_types(method_name).after_call_methods.push(hook);
}

// ===== Typed builder =====

enum Declaration {
    Field {
        name: String,
        native: Option<Label>,
        options: InjectOptions,
        assign: FieldAssign,
    },
    Method {
        name: String,
        native: Vec<Label>,
        options: InjectOptions,
        body: Option<MethodBody>,
    },
    Parameter {
        method: String,
        index: usize,
        options: InjectOptions,
    },
    Before {
        method: String,
        hook: BeforeCallMethod,
    },
    After {
        method: String,
        hook: AfterCallMethod,
    },
}

impl TypeRegistry {
    /// Starts declaring `T` to this registry.
    pub fn class<T: Any + Send + Sync>(&self) -> ClassBuilder<'_, T> {
        ClassBuilder::new(self)
    }
}

/// Typed declaration of one class.
///
/// ```rust
/// use ferrous_container::{Container, LoadOptions, TypeRegistry};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Clock;
///
/// #[derive(Default)]
/// struct Greeter {
///     clock: Option<Arc<Clock>>,
/// }
///
/// let registry = Arc::new(TypeRegistry::new());
/// registry.class::<Clock>().injectable().default_constructor().register().unwrap();
/// registry
///     .class::<Greeter>()
///     .injectable()
///     .default_constructor()
///     .field::<Clock, _>("clock", |g, clock| g.clock = Some(clock))
///     .method("greet", ["greeting"], |_g: &Greeter, args| {
///         Ok(format!("{}, world", args.get::<String>(0)?))
///     })
///     .register()
///     .unwrap();
///
/// let container = Container::new(registry);
/// container.bind_value("greeting", "Hello".to_string()).unwrap();
/// container.load(&LoadOptions::default()).unwrap();
///
/// let greeter = container.get_class::<Greeter>().unwrap();
/// assert!(greeter.clock.is_some());
/// let out = container.call_sync(&greeter, "greet").unwrap().unwrap();
/// assert_eq!(out.downcast_ref::<String>().unwrap(), "Hello, world");
/// ```
pub struct ClassBuilder<'r, T> {
    registry: &'r TypeRegistry,
    class: ClassInfo,
    parent: Option<(String, Option<Upcast>)>,
    constructor: Option<Constructor>,
    constructor_types: Option<Vec<Label>>,
    injectable: Option<InjectableOptions>,
    declarations: Vec<Declaration>,
    _marker: PhantomData<fn() -> T>,
}

impl<'r, T: Any + Send + Sync> ClassBuilder<'r, T> {
    fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            class: ClassInfo::of::<T>(),
            parent: None,
            constructor: None,
            constructor_types: None,
            injectable: None,
            declarations: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Registers the class under a custom name instead of the type name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.class = self.class.with_name(name);
        self
    }

    /// Declares `P` as the direct parent, embedded in `T` at `project`.
    pub fn extends<P, F>(mut self, project: F) -> Self
    where
        P: Any + Send + Sync,
        F: Fn(&mut T) -> &mut P + Send + Sync + 'static,
    {
        let parent = self.registry.name_of::<P>();
        let upcast = upcast_fn(move |object: &mut AnyObject| {
            object
                .downcast_mut::<T>()
                .map(|child| project(child) as &mut AnyObject)
        });
        self.parent = Some((parent, Some(upcast)));
        self
    }

    /// Declares a parent by name only; inherited fields cannot be assigned.
    pub fn extends_class(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some((parent.into(), None));
        self
    }

    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(Args<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.constructor = Some(constructor_fn(move |args: Args<'_>| {
            Ok(Box::new(f(args)?) as Box<AnyObject>)
        }));
        self
    }

    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(|_| Ok(T::default()))
    }

    /// The constructor's own parameter list, as a type system would report it.
    pub fn constructor_types<I, L>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        self.constructor_types = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    /// Overrides how one constructor parameter is resolved.
    pub fn inject_param(mut self, index: usize, options: impl Into<InjectOptions>) -> Self {
        self.declarations.push(Declaration::Parameter {
            method: CONSTRUCTOR_KEY.to_string(),
            index,
            options: options.into(),
        });
        self
    }

    // ----- class-level options; each implies `injectable` -----

    fn options(&mut self) -> &mut InjectableOptions {
        self.injectable.get_or_insert_with(InjectableOptions::default)
    }

    pub fn injectable(mut self) -> Self {
        self.options();
        self
    }

    pub fn injectable_with(mut self, options: InjectableOptions) -> Self {
        self.injectable = Some(options);
        self
    }

    pub fn singleton(mut self) -> Self {
        self.options().singleton = true;
        self
    }

    pub fn module(mut self, name: impl Into<String>) -> Self {
        self.options().module_name = Some(name.into());
        self
    }

    pub fn create_immediately(mut self) -> Self {
        self.options().create_immediately = true;
        self
    }

    pub fn override_parent(mut self) -> Self {
        self.options().override_parent = true;
        self
    }

    /// Keeps constructor parameters copied from the parent.
    pub fn keep_inherited_constructor(mut self) -> Self {
        self.options().override_constructor = Some(false);
        self
    }

    pub fn on_create<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        let hook: OnCreate = Arc::new(move |object: &mut AnyObject| {
            if let Some(instance) = object.downcast_mut::<T>() {
                f(instance);
            }
        });
        self.options().on_create = Some(hook);
        self
    }

    /// Explicit constructor parameter labels, by position.
    pub fn param_types<I, L>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        let options = self.options();
        options.parameters = std::mem::take(&mut options.parameters).with_types(labels);
        self
    }

    pub fn param_getter(mut self, index: usize, getter: ValueGetter) -> Self {
        let options = self.options();
        options.parameters = std::mem::take(&mut options.parameters).with_getter(index, getter);
        self
    }

    // ----- members -----

    /// Injects a field typed by its class; `assign` stores the resolved value.
    pub fn field<V, F>(self, name: &str, assign: F) -> Self
    where
        V: Any + Send + Sync,
        F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
    {
        let native = Label::name(self.registry.name_of::<V>());
        self.push_field(name, Some(native), InjectOptions::default(), assign)
    }

    /// Injects a field resolved through explicit options.
    pub fn field_with<V, F>(self, name: &str, options: impl Into<InjectOptions>, assign: F) -> Self
    where
        V: Any + Send + Sync,
        F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
    {
        self.push_field(name, None, options.into(), assign)
    }

    fn push_field<V, F>(mut self, name: &str, native: Option<Label>, options: InjectOptions, assign: F) -> Self
    where
        V: Any + Send + Sync,
        F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
    {
        let field = name.to_string();
        let assign: FieldAssign = Arc::new(move |object: &mut AnyObject, value: AnyArc| -> DiResult<()> {
            let instance = object
                .downcast_mut::<T>()
                .ok_or_else(|| DiError::TypeMismatch(format!("instance for field {}", field)))?;
            assign(instance, downcast_arc(value, &field)?);
            Ok(())
        });
        self.declarations.push(Declaration::Field {
            name: name.to_string(),
            native,
            options,
            assign,
        });
        self
    }

    /// Declares a synchronous method whose parameters are resolved from `types`.
    pub fn method<I, L, R, F>(self, name: &str, types: I, body: F) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
        R: Any + Send + Sync,
        F: Fn(&T, Args<'_>) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        self.method_with(name, types, InjectOptions::default(), body)
    }

    pub fn method_with<I, L, R, F>(mut self, name: &str, types: I, options: impl Into<InjectOptions>, body: F) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
        R: Any + Send + Sync,
        F: Fn(&T, Args<'_>) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        let method = format!("{}.{}", self.class.name, name);
        let body = MethodBody::sync(move |instance: &AnyArc, args: Args<'_>| {
            let this = instance
                .downcast_ref::<T>()
                .ok_or_else(|| DiError::TypeMismatch(format!("receiver of {}", method)))?;
            body(this, args).map(into_return_value)
        });
        self.declarations.push(Declaration::Method {
            name: name.to_string(),
            native: types.into_iter().map(Into::into).collect(),
            options: options.into(),
            body: Some(body),
        });
        self
    }

    /// Declares an asynchronous method; it can only be invoked with [`Container::call`].
    pub fn async_method<I, L, R, F, Fut>(self, name: &str, types: I, body: F) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
        R: Any + Send + Sync,
        F: Fn(Arc<T>, Vec<AnyArc>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        self.async_method_with(name, types, InjectOptions::default(), body)
    }

    pub fn async_method_with<I, L, R, F, Fut>(
        mut self,
        name: &str,
        types: I,
        options: impl Into<InjectOptions>,
        body: F,
    ) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
        R: Any + Send + Sync,
        F: Fn(Arc<T>, Vec<AnyArc>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        let method = format!("{}.{}", self.class.name, name);
        let body = Arc::new(body);
        let body = MethodBody::from_async(move |instance: AnyArc, args: Vec<AnyArc>| {
            let receiver = downcast_arc::<T>(instance, &method);
            let body = body.clone();
            async move { Ok::<ReturnValue, anyhow::Error>(into_return_value(body(receiver?, args).await?)) }
        });
        self.declarations.push(Declaration::Method {
            name: name.to_string(),
            native: types.into_iter().map(Into::into).collect(),
            options: options.into(),
            body: Some(body),
        });
        self
    }

    /// Overrides how one method parameter is resolved.
    pub fn inject_method_param(mut self, method: &str, index: usize, options: impl Into<InjectOptions>) -> Self {
        self.declarations.push(Declaration::Parameter {
            method: method.to_string(),
            index,
            options: options.into(),
        });
        self
    }

    pub fn before_call(mut self, method: &str, hook: BeforeCallMethod) -> Self {
        self.declarations.push(Declaration::Before {
            method: method.to_string(),
            hook,
        });
        self
    }

    pub fn after_call(mut self, method: &str, hook: AfterCallMethod) -> Self {
        self.declarations.push(Declaration::After {
            method: method.to_string(),
            hook,
        });
        self
    }

    /// Applies every declaration to the registry and returns the class's metadata.
    pub fn register(self) -> DiResult<MetadataRef> {
        let (parent, upcast) = match self.parent {
            Some((name, upcast)) => (Some(name), upcast),
            None => (None, None),
        };
        self.registry.declare_class(&self.class, parent.as_deref(), upcast);
        let metadata = self.registry.get_or_create(&self.class);

        {
            let mut m = metadata.write();
            if let Some(constructor) = self.constructor {
                m.constructor = Some(constructor);
            }

            let mut parameters = Vec::new();
            for declaration in self.declarations {
                match declaration {
                    Declaration::Field {
                        name,
                        native,
                        options,
                        assign,
                    } => inject_field(&mut m, &name, native, &options, assign)?,
                    Declaration::Method {
                        name,
                        native,
                        options,
                        body,
                    } => inject_method(&mut m, &name, &native, &options, body)?,
                    Declaration::Parameter { method, index, options } => parameters.push((method, index, options)),
                    Declaration::Before { method, hook } => add_before_call_method(&mut m, &method, hook),
                    Declaration::After { method, hook } => add_after_call_method(&mut m, &method, hook),
                }
            }
            for (method, index, options) in parameters {
                inject_parameter(&mut m, &method, index, &options)?;
            }

            if let Some(options) = &self.injectable {
                mark_injectable(&mut m, self.constructor_types.as_deref(), options)?;
            }
        }

        tracing::debug!(class = %self.class.name, "registered class");
        Ok(metadata)
    }
}

impl<T> fmt::Debug for ClassBuilder<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBuilder")
            .field("class", &self.class.name)
            .field("parent", &self.parent.as_ref().map(|(name, _)| name))
            .field("declarations", &self.declarations.len())
            .field("injectable", &self.injectable)
            .finish()
    }
}
