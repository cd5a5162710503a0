//! Binding records stored in a container.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::DiResult;
use crate::label::Label;
use crate::metadata::{AnyArc, MetadataRef};

/// Produces a value from the arguments passed to `get_value`.
pub type Producer = Arc<dyn Fn(&[AnyArc]) -> DiResult<AnyArc> + Send + Sync>;

/// Discriminant of a [`ContainerMember`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKindTag {
    Value,
    Factory,
    Getter,
    InjectableClass,
}

pub(crate) enum MemberKind {
    Value(AnyArc),
    /// Called on every lookup
    Factory(Producer),
    /// Called at most once; the first result is cached
    Getter {
        producer: Producer,
        cached: Mutex<Option<AnyArc>>,
    },
    /// Built from class metadata; singletons keep their first instance
    Class {
        class_name: String,
        metadata: MetadataRef,
        instance: Mutex<Option<AnyArc>>,
    },
}

/// A binding: one label's record inside one container.
pub struct ContainerMember {
    label: Label,
    pub(crate) kind: MemberKind,
    is_extend: bool,
    /// For extend copies: the ancestor member the copy chain started from.
    origin: Option<Weak<ContainerMember>>,
}

impl ContainerMember {
    pub(crate) fn value(label: Label, value: AnyArc) -> Self {
        Self::new(label, MemberKind::Value(value))
    }

    pub(crate) fn factory(label: Label, producer: Producer) -> Self {
        Self::new(label, MemberKind::Factory(producer))
    }

    pub(crate) fn getter(label: Label, producer: Producer) -> Self {
        Self::new(
            label,
            MemberKind::Getter {
                producer,
                cached: Mutex::new(None),
            },
        )
    }

    pub(crate) fn class(label: Label, metadata: MetadataRef) -> Self {
        let class_name = metadata.read().class_name().to_string();
        Self::new(
            label,
            MemberKind::Class {
                class_name,
                metadata,
                instance: Mutex::new(None),
            },
        )
    }

    fn new(label: Label, kind: MemberKind) -> Self {
        Self {
            label,
            kind,
            is_extend: false,
            origin: None,
        }
    }

    /// Copy of a class member for a child container.
    ///
    /// Shares the metadata but starts with an empty instance slot, so the
    /// child builds its own singleton against its own bindings. Other kinds
    /// are not copied.
    pub(crate) fn extend_copy(self: &Arc<Self>) -> Option<Self> {
        match &self.kind {
            MemberKind::Class {
                class_name, metadata, ..
            } => Some(Self {
                label: self.label.clone(),
                kind: MemberKind::Class {
                    class_name: class_name.clone(),
                    metadata: metadata.clone(),
                    instance: Mutex::new(None),
                },
                is_extend: true,
                origin: Some(self.origin.clone().unwrap_or_else(|| Arc::downgrade(self))),
            }),
            _ => None,
        }
    }

    /// True if this member and `source` were copied from the same original member.
    pub(crate) fn is_copy_of(&self, source: &Arc<ContainerMember>) -> bool {
        let root = match &source.origin {
            Some(origin) => origin.as_ptr(),
            None => Arc::as_ptr(source),
        };
        self.origin.as_ref().is_some_and(|origin| std::ptr::eq(origin.as_ptr(), root))
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn kind(&self) -> MemberKindTag {
        match self.kind {
            MemberKind::Value(_) => MemberKindTag::Value,
            MemberKind::Factory(_) => MemberKindTag::Factory,
            MemberKind::Getter { .. } => MemberKindTag::Getter,
            MemberKind::Class { .. } => MemberKindTag::InjectableClass,
        }
    }

    pub fn is_injectable_class(&self) -> bool {
        matches!(self.kind, MemberKind::Class { .. })
    }

    /// True if this member was copied from a parent container.
    pub fn is_extend(&self) -> bool {
        self.is_extend
    }

    pub fn metadata(&self) -> Option<&MetadataRef> {
        match &self.kind {
            MemberKind::Class { metadata, .. } => Some(metadata),
            _ => None,
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        match &self.kind {
            MemberKind::Class { class_name, .. } => Some(class_name),
            _ => None,
        }
    }

    /// The cached getter result or singleton instance, if one exists.
    pub fn cached(&self) -> Option<AnyArc> {
        match &self.kind {
            MemberKind::Value(value) => Some(value.clone()),
            MemberKind::Factory(_) => None,
            MemberKind::Getter { cached, .. } => cached.lock().clone(),
            MemberKind::Class { instance, .. } => instance.lock().clone(),
        }
    }
}

impl fmt::Debug for ContainerMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerMember")
            .field("label", &self.label)
            .field("kind", &self.kind())
            .field("class_name", &self.class_name())
            .field("is_extend", &self.is_extend)
            .finish()
    }
}
