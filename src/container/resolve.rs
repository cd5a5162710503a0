//! Label resolution and instance construction.

use std::any::Any;
use std::sync::Arc;

use crate::container::member::{ContainerMember, MemberKind};
use crate::container::Container;
use crate::error::{DiError, DiResult};
use crate::internal::StackGuard;
use crate::label::{ContainerLabel, Label};
use crate::metadata::params::downcast_arc;
use crate::metadata::{AnyArc, AnyObject, Args, FieldType, MetadataRef, ParameterSpec, CONSTRUCTOR_KEY};

impl Container {
    /// Resolves a label to a type-erased value.
    ///
    /// `args` are handed to factory members and, on first evaluation, to getters.
    /// Lookup order: local members, the parent chain (class members found
    /// upstream are copied into this container first), then injectable
    /// classes of the registry not bound anywhere yet.
    pub fn get_value(&self, label: impl Into<Label>, args: &[AnyArc]) -> DiResult<AnyArc> {
        let label = label.into();
        let member = self.find_member(&label, false)?;
        self.resolve_member(&member, args)
    }

    /// Resolves a label and downcasts the value.
    pub fn get<T: Any + Send + Sync>(&self, label: impl Into<Label>) -> DiResult<Arc<T>> {
        self.get_with(label, &[])
    }

    pub fn get_with<T: Any + Send + Sync>(&self, label: impl Into<Label>, args: &[AnyArc]) -> DiResult<Arc<T>> {
        let label = label.into();
        let value = self.get_value(label.clone(), args)?;
        downcast_arc(value, label.display_name())
    }

    /// Resolves a token label with the type it was created for.
    pub fn get_token<T: Any + Send + Sync>(&self, label: &ContainerLabel<T>) -> DiResult<Arc<T>> {
        self.get(label)
    }

    /// Resolves a class by reference.
    ///
    /// Unlike plain labels, a registry class that is injectable but not yet
    /// bound is instantiated in this container before the parents are asked.
    pub fn get_class<T: Any + Send + Sync>(&self) -> DiResult<Arc<T>> {
        let name = self.registry().name_of::<T>();
        let value = self.get_class_value(&name, &[])?;
        downcast_arc(value, &name)
    }

    pub fn get_class_value(&self, class_name: &str, args: &[AnyArc]) -> DiResult<AnyArc> {
        let label = Label::name(class_name);
        let member = self.find_member(&label, true)?;
        self.resolve_member(&member, args)
    }

    fn find_member(&self, label: &Label, class_ref: bool) -> DiResult<Arc<ContainerMember>> {
        if let Some(member) = self.local_member(label) {
            return Ok(member);
        }
        if class_ref {
            if let Some(member) = self.load_on_demand(label) {
                return Ok(member);
            }
        }

        for ancestor in self.ancestors() {
            let Some(member) = ancestor.local_member(label) else {
                continue;
            };
            if !member.is_injectable_class() {
                return Ok(member);
            }
            // Re-homed here so the class's dependencies resolve from this container.
            return Ok(self.extend_member(label, &member).unwrap_or(member));
        }

        if !class_ref {
            if let Some(member) = self.load_on_demand(label) {
                return Ok(member);
            }
        }
        Err(DiError::NotExistLabel(label.to_string()))
    }

    fn load_on_demand(&self, label: &Label) -> Option<Arc<ContainerMember>> {
        let name = label.as_name()?;
        let metadata = self.registry().get(name)?;
        if !metadata.read().injectable {
            return None;
        }
        Some(self.load_class(name, metadata))
    }

    pub(crate) fn resolve_member(&self, member: &Arc<ContainerMember>, args: &[AnyArc]) -> DiResult<AnyArc> {
        match &member.kind {
            MemberKind::Value(value) => Ok(value.clone()),
            MemberKind::Factory(producer) => {
                let value = producer(args)?;
                self.validated(member.label(), value)
            }
            MemberKind::Getter { producer, cached } => {
                let existing = cached.lock().clone();
                if let Some(value) = existing {
                    return Ok(value);
                }
                let value = self.validated(member.label(), producer(args)?)?;
                Ok(cached.lock().get_or_insert(value).clone())
            }
            MemberKind::Class {
                class_name,
                metadata,
                instance,
            } => {
                let singleton = metadata.read().singleton;
                if singleton {
                    let existing = instance.lock().clone();
                    if let Some(value) = existing {
                        return Ok(value);
                    }
                }
                let built = self.instantiate(member.label(), class_name, metadata)?;
                if singleton {
                    Ok(instance.lock().get_or_insert(built).clone())
                } else {
                    Ok(built)
                }
            }
        }
    }

    fn validated(&self, label: &Label, value: AnyArc) -> DiResult<AnyArc> {
        if self.options().is_valid(&value) {
            Ok(value)
        } else {
            Err(DiError::InvalidValue(label.to_string()))
        }
    }

    fn instantiate(&self, label: &Label, class_name: &str, metadata: &MetadataRef) -> DiResult<AnyArc> {
        let _guard = StackGuard::enter(self.inner.id, label, self.options().max_depth)?;

        // Snapshot so that no metadata lock is held while user code runs.
        let (constructor, parameters, fields, on_create) = {
            let m = metadata.read();
            (
                m.constructor.clone(),
                m.parameter_spec(CONSTRUCTOR_KEY)
                    .map(ParameterSpec::parameters_only)
                    .unwrap_or_default(),
                m.field_types().clone(),
                m.on_create.clone(),
            )
        };
        let constructor = constructor
            .ok_or_else(|| DiError::InjectNotFoundType(format!("{} has no constructor", class_name)))?;

        let args = self.resolve_parameters(class_name, "constructor", &parameters)?;
        let mut instance = constructor(Args::new(&args))?;

        for (field_name, field) in &fields {
            let value = self.resolve_field(class_name, field_name, field)?;
            let target = self.project(class_name, &mut *instance, &field.owner)?;
            (field.assign)(target, value)?;
        }

        if let Some(on_create) = on_create {
            on_create(&mut *instance);
        }
        tracing::trace!(class = %class_name, "constructed instance");
        Ok(Arc::from(instance))
    }

    /// Resolves positional arguments: a custom getter wins over the label.
    pub(crate) fn resolve_parameters(
        &self,
        class_name: &str,
        method_name: &str,
        spec: &ParameterSpec,
    ) -> DiResult<Vec<AnyArc>> {
        (0..spec.arity())
            .map(|index| {
                if let Some(getter) = spec.getters.get(&index) {
                    return getter(self);
                }
                match spec.type_at(index) {
                    Some(label) => self.get_value(label.clone(), &[]),
                    None => Err(DiError::InjectNotFoundType(format!(
                        "parameter {} of {}.{}",
                        index, class_name, method_name
                    ))),
                }
            })
            .collect()
    }

    fn resolve_field(&self, class_name: &str, field_name: &str, field: &FieldType) -> DiResult<AnyArc> {
        if let Some(getter) = &field.getter {
            return getter(self);
        }
        match &field.type_label {
            Some(label) => self.get_value(label.clone(), &[]),
            None => Err(DiError::InjectNotFoundType(format!("{}.{}", class_name, field_name))),
        }
    }

    /// Walks the declared lineage from `class_name` up to `owner`.
    fn project<'a>(
        &self,
        class_name: &str,
        instance: &'a mut AnyObject,
        owner: &str,
    ) -> DiResult<&'a mut AnyObject> {
        let mut current = instance;
        let mut class = class_name.to_string();
        while class != owner {
            let (parent, upcast) = self
                .registry()
                .parent_of(&class)
                .ok_or_else(|| DiError::TypeMismatch(format!("{} is not a subclass of {}", class_name, owner)))?;
            let upcast = upcast
                .ok_or_else(|| DiError::TypeMismatch(format!("{} declares no projection onto {}", class, parent)))?;
            current = upcast(current).ok_or_else(|| DiError::TypeMismatch(format!("{} as {}", class, parent)))?;
            class = parent;
        }
        Ok(current)
    }
}
