//! The container: binding table, parent delegation and registry loading.
//!
//! A [`Container`] maps [`Label`]s to [`ContainerMember`]s. Members are plain
//! values, factories, lazily evaluated getters, or injectable classes built
//! from [`TypeRegistry`] metadata. A container may extend a parent; injectable
//! classes found upstream are copied into the child so that their
//! dependencies are looked up starting from the child.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::{ContainerOptions, LoadOptions};
use crate::error::{DiError, DiResult};
use crate::label::Label;
use crate::metadata::{AnyArc, ClassInfo, MetadataRef, TypeRegistry};

mod call;
pub mod events;
pub mod member;
mod resolve;

pub use events::{ClassLoaded, ClassLoadedListener, SubscriptionId};
pub use member::{ContainerMember, MemberKindTag, Producer};

use events::ClassLoadedListeners;

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Dependency injection container.
///
/// Cloning is cheap and yields a handle to the same container.
///
/// # Examples
///
/// ```
/// use ferrous_container::{Container, TypeRegistry};
/// use std::sync::Arc;
///
/// struct Engine { cylinders: u8 }
/// struct Car { engine: Arc<Engine> }
///
/// let registry = Arc::new(TypeRegistry::new());
/// registry.class::<Engine>()
///     .singleton()
///     .constructor(|_| Ok(Engine { cylinders: 8 }))
///     .register()
///     .unwrap();
/// registry.class::<Car>()
///     .injectable()
///     .constructor_types(["Engine"])
///     .constructor(|args| Ok(Car { engine: args.get::<Engine>(0)? }))
///     .register()
///     .unwrap();
///
/// let container = Container::new(registry);
/// container.load(&Default::default()).unwrap();
///
/// let car = container.get_class::<Car>().unwrap();
/// let engine = container.get_class::<Engine>().unwrap();
/// assert!(Arc::ptr_eq(&car.engine, &engine));
/// assert_eq!(engine.cylinders, 8);
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    id: u64,
    registry: Arc<TypeRegistry>,
    options: ContainerOptions,
    members: RwLock<HashMap<Label, Arc<ContainerMember>>>,
    parent: RwLock<Option<ParentLink>>,
    loaded: AtomicBool,
    loaded_classes: Mutex<HashSet<String>>,
    listeners: ClassLoadedListeners,
}

struct ParentLink {
    container: Container,
    subscription: SubscriptionId,
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if let Some(link) = self.parent.get_mut().take() {
            link.container.inner.listeners.unsubscribe(link.subscription);
        }
    }
}

impl Container {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_options(registry, ContainerOptions::default())
    }

    pub fn with_options(registry: Arc<TypeRegistry>, options: ContainerOptions) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                id: NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed),
                registry,
                options,
                members: RwLock::new(HashMap::new()),
                parent: RwLock::new(None),
                loaded: AtomicBool::new(false),
                loaded_classes: Mutex::new(HashSet::new()),
                listeners: ClassLoadedListeners::default(),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.inner.registry
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.inner.options
    }

    /// True if both handles refer to the same container.
    pub fn same_as(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ===== Binding table =====

    /// Binds an instance under its own class name.
    pub fn bind_instance<T: Any + Send + Sync>(&self, instance: Arc<T>) -> DiResult<&Self> {
        let label = self.inner.registry.name_of::<T>();
        self.bind_any(label, instance)
    }

    /// Binds a plain value.
    ///
    /// # Errors
    ///
    /// - [`DiError::ForbiddenOverrideInjectable`] if the label is bound to an injectable class
    /// - [`DiError::InvalidValue`] if the value fails the container's validity check
    pub fn bind_value<T: Any + Send + Sync>(&self, label: impl Into<Label>, value: T) -> DiResult<&Self> {
        self.bind_any(label, Arc::new(value))
    }

    /// Binds an already type-erased value.
    pub fn bind_any(&self, label: impl Into<Label>, value: AnyArc) -> DiResult<&Self> {
        let label = label.into();
        if !self.inner.options.is_valid(&value) {
            return Err(DiError::InvalidValue(label.to_string()));
        }
        self.insert_plain(ContainerMember::value(label, value))
    }

    /// Binds a factory called on every lookup with the lookup arguments.
    pub fn bind_factory<T, F>(&self, label: impl Into<Label>, factory: F) -> DiResult<&Self>
    where
        T: Any + Send + Sync,
        F: Fn(&[AnyArc]) -> T + Send + Sync + 'static,
    {
        self.bind_factory_any(label, Arc::new(move |args: &[AnyArc]| -> DiResult<AnyArc> { Ok(Arc::new(factory(args))) }))
    }

    pub fn bind_factory_any(&self, label: impl Into<Label>, producer: Producer) -> DiResult<&Self> {
        self.insert_plain(ContainerMember::factory(label.into(), producer))
    }

    /// Binds a getter evaluated on first lookup only; later lookups ignore their arguments.
    pub fn bind_getter<T, F>(&self, label: impl Into<Label>, getter: F) -> DiResult<&Self>
    where
        T: Any + Send + Sync,
        F: Fn(&[AnyArc]) -> T + Send + Sync + 'static,
    {
        self.bind_getter_any(label, Arc::new(move |args: &[AnyArc]| -> DiResult<AnyArc> { Ok(Arc::new(getter(args))) }))
    }

    pub fn bind_getter_any(&self, label: impl Into<Label>, producer: Producer) -> DiResult<&Self> {
        self.insert_plain(ContainerMember::getter(label.into(), producer))
    }

    fn insert_plain(&self, member: ContainerMember) -> DiResult<&Self> {
        let label = member.label().clone();
        let mut members = self.inner.members.write();
        if members.get(&label).is_some_and(|m| m.is_injectable_class()) {
            return Err(DiError::ForbiddenOverrideInjectable(label.to_string()));
        }
        tracing::debug!(label = %label, kind = ?member.kind(), "bound label");
        members.insert(label, Arc::new(member));
        Ok(self)
    }

    pub fn unbind(&self, label: impl Into<Label>) -> &Self {
        let label = label.into();
        if self.inner.members.write().remove(&label).is_some() {
            tracing::debug!(label = %label, "unbound label");
        }
        self
    }

    pub fn unbind_all(&self) {
        self.inner.members.write().clear();
    }

    /// Unbinds everything, leaves the parent and drops all class-loaded listeners.
    pub fn dispose(&self) {
        self.unbind_all();
        self.detach_parent();
        self.inner.listeners.clear();
        self.inner.loaded_classes.lock().clear();
        tracing::debug!(container = self.inner.id, "container disposed");
    }

    /// Local membership check; parents are not consulted.
    pub fn has_label(&self, label: impl Into<Label>) -> bool {
        self.inner.members.read().contains_key(&label.into())
    }

    /// The local member bound under `label`.
    pub fn member(&self, label: impl Into<Label>) -> Option<Arc<ContainerMember>> {
        self.local_member(&label.into())
    }

    pub fn labels(&self) -> Vec<Label> {
        self.inner.members.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn local_member(&self, label: &Label) -> Option<Arc<ContainerMember>> {
        self.inner.members.read().get(label).cloned()
    }

    // ===== Parent delegation =====

    /// Sets (or with `None`, clears) the fallback container.
    ///
    /// Setting a parent copies every injectable class member of the parent
    /// chain that is not bound locally, and keeps copying classes the parent
    /// loads later. Clearing removes all copied members. A parent whose chain
    /// already contains this container is ignored.
    pub fn extend(&self, parent: Option<&Container>) -> &Self {
        self.detach_parent();
        let Some(parent) = parent else {
            return self;
        };

        if parent.same_as(self) || parent.ancestors().iter().any(|a| a.same_as(self)) {
            tracing::warn!(container = self.inner.id, "refusing to extend a descendant container");
            return self;
        }

        for (label, member) in parent.injectable_members_in_chain() {
            self.extend_member(&label, &member);
        }

        let child = Arc::downgrade(&self.inner);
        let source = Arc::downgrade(&parent.inner);
        let subscription = parent.inner.listeners.subscribe(Arc::new(move |event: &ClassLoaded| {
            let (Some(inner), Some(source)) = (child.upgrade(), source.upgrade()) else {
                return;
            };
            let labels: Vec<Label> = source
                .members
                .read()
                .iter()
                .filter(|(_, m)| Arc::ptr_eq(m, &event.member))
                .map(|(label, _)| label.clone())
                .collect();
            let child = Container { inner };
            for label in labels {
                child.extend_member(&label, &event.member);
            }
        }));
        *self.inner.parent.write() = Some(ParentLink {
            container: parent.clone(),
            subscription,
        });
        tracing::debug!(container = self.inner.id, parent = parent.inner.id, "extended parent container");
        self
    }

    pub fn parent(&self) -> Option<Container> {
        self.inner.parent.read().as_ref().map(|link| link.container.clone())
    }

    /// Parent, grandparent and so on.
    pub(crate) fn ancestors(&self) -> Vec<Container> {
        let mut chain: Vec<Container> = Vec::new();
        let mut current = self.parent();
        while let Some(container) = current {
            if container.same_as(self) || chain.iter().any(|c| c.same_as(&container)) {
                break;
            }
            current = container.parent();
            chain.push(container);
        }
        chain
    }

    /// Injectable class members of this container and its ancestors, keyed by
    /// every label they are bound under (ancestor aliases included).
    fn injectable_members_in_chain(&self) -> Vec<(Label, Arc<ContainerMember>)> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for container in std::iter::once(self.clone()).chain(self.ancestors()) {
            for (label, member) in container.inner.members.read().iter() {
                if member.is_injectable_class() && seen.insert(label.clone()) {
                    out.push((label.clone(), member.clone()));
                }
            }
        }
        out
    }

    /// Binds `label` to this container's copy of the ancestor class member
    /// `source`, unless `label` is already bound locally.
    ///
    /// All labels an ancestor binds to one member share a single copy, so a
    /// singleton keeps one instance per container whichever label built it.
    pub(crate) fn extend_member(&self, label: &Label, source: &Arc<ContainerMember>) -> Option<Arc<ContainerMember>> {
        let mut members = self.inner.members.write();
        if let Some(existing) = members.get(label) {
            return Some(existing.clone());
        }
        let shared = members
            .values()
            .find(|m| m.is_copy_of(source))
            .cloned();
        let copy = match shared {
            Some(copy) => copy,
            None => Arc::new(source.extend_copy()?),
        };
        tracing::trace!(label = %label, "copied injectable member from parent");
        members.insert(label.clone(), copy.clone());
        Some(copy)
    }

    fn detach_parent(&self) {
        let link = self.inner.parent.write().take();
        if let Some(link) = link {
            link.container.inner.listeners.unsubscribe(link.subscription);
            self.inner.members.write().retain(|_, member| !member.is_extend());
            tracing::debug!(container = self.inner.id, "left parent container");
        }
    }

    // ===== Loading from the registry =====

    /// Binds every injectable class of the registry, optionally filtered by module.
    ///
    /// # Errors
    ///
    /// [`DiError::ContainerRepeatLoad`] on a second call; errors from
    /// instantiating `create_immediately` classes.
    pub fn load(&self, options: &LoadOptions) -> DiResult<()> {
        if self.inner.loaded.swap(true, Ordering::SeqCst) {
            return Err(DiError::ContainerRepeatLoad);
        }
        let all = self.inner.registry.all_metadata();
        self.load_from_metadata(&all, options)
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.load(Ordering::SeqCst)
    }

    /// Same as [`load`](Self::load) for an explicit list; may be called repeatedly.
    pub fn load_from_metadata(&self, metadata: &[MetadataRef], options: &LoadOptions) -> DiResult<()> {
        let mut loaded = Vec::new();
        let mut overrides = Vec::new();
        let mut immediate = Vec::new();

        for record in metadata {
            let (class_name, parents, override_parent, create_immediately) = {
                let m = record.read();
                if !m.injectable {
                    continue;
                }
                if let Some(module) = &options.module_name {
                    if m.module_name.as_deref() != Some(module.as_str()) {
                        continue;
                    }
                }
                (
                    m.class_name().to_string(),
                    m.parent_class_names().to_vec(),
                    options.override_parent.unwrap_or(m.override_parent),
                    m.create_immediately,
                )
            };

            let member = self.insert_class(&class_name, record.clone());
            loaded.push(member.clone());
            if override_parent {
                overrides.push((parents, member.clone()));
            }
            if create_immediately {
                immediate.push(member);
            }
        }

        if !overrides.is_empty() {
            let mut members = self.inner.members.write();
            for (parents, member) in overrides {
                for parent in parents {
                    tracing::trace!(parent = %parent, label = %member.label(), "overriding parent class binding");
                    members.insert(Label::name(parent), member.clone());
                }
            }
        }

        // Announced once every alias is bound, so listeners see the final table.
        for member in &loaded {
            self.announce(member);
        }

        for member in immediate {
            self.resolve_member(&member, &[])?;
        }
        Ok(())
    }

    /// Same as [`load_from_metadata`](Self::load_from_metadata) for classes; unknown classes are skipped.
    pub fn load_from_classes(&self, classes: &[ClassInfo], options: &LoadOptions) -> DiResult<()> {
        let metadata: Vec<MetadataRef> = classes
            .iter()
            .filter_map(|class| {
                let found = self.inner.registry.get(&class.name);
                if found.is_none() {
                    tracing::warn!(class = %class.name, "class has no metadata, skipping");
                }
                found
            })
            .collect();
        self.load_from_metadata(&metadata, options)
    }

    /// Creates (or replaces) the member of an injectable class and announces it.
    pub(crate) fn load_class(&self, class_name: &str, metadata: MetadataRef) -> Arc<ContainerMember> {
        let member = self.insert_class(class_name, metadata);
        self.announce(&member);
        member
    }

    fn insert_class(&self, class_name: &str, metadata: MetadataRef) -> Arc<ContainerMember> {
        let label = Label::name(class_name);
        let member = Arc::new(ContainerMember::class(label.clone(), metadata));
        self.inner.members.write().insert(label, member.clone());
        tracing::debug!(class = %class_name, "loaded class");
        member
    }

    /// Emits [`ClassLoaded`] the first time a class gets a member in this container.
    fn announce(&self, member: &Arc<ContainerMember>) {
        let Some(class_name) = member.class_name() else {
            return;
        };
        if self.inner.loaded_classes.lock().insert(class_name.to_string()) {
            self.inner.listeners.emit(&ClassLoaded {
                class_name: class_name.to_string(),
                member: member.clone(),
            });
        }
    }

    // ===== Notifications =====

    /// Subscribes to class-loaded events of this container.
    pub fn on_class_loaded<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ClassLoaded) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(Arc::new(listener))
    }

    pub fn off_class_loaded(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("members", &self.len())
            .field("has_parent", &self.inner.parent.read().is_some())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
