//! Label types for container storage and lookup.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identifier under which a value is bound in a container.
///
/// Labels are either plain names or opaque tokens. A token is unique per
/// creation: two tokens with the same description never collide with each
/// other or with a plain name.
///
/// # Examples
///
/// ```rust
/// use ferrous_container::Label;
///
/// let a = Label::from("config");
/// let b = Label::name("config");
/// assert_eq!(a, b);
///
/// let t1 = Label::token("config");
/// let t2 = Label::token("config");
/// assert_ne!(t1, t2);
/// assert_ne!(t1, a);
/// assert_eq!(t1.display_name(), "config");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    /// Plain string identifier (also used for class names)
    Name(Arc<str>),
    /// Opaque token with a unique id and a description for diagnostics
    Token(u64, Arc<str>),
}

impl Label {
    /// Creates a plain name label.
    pub fn name(name: impl AsRef<str>) -> Self {
        Label::Name(Arc::from(name.as_ref()))
    }

    /// Creates a fresh, unique token label.
    pub fn token(description: impl AsRef<str>) -> Self {
        let id = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        Label::Token(id, Arc::from(description.as_ref()))
    }

    /// The name, or the token description.
    pub fn display_name(&self) -> &str {
        match self {
            Label::Name(name) => name,
            Label::Token(_, description) => description,
        }
    }

    /// Returns the name if this is a plain name label.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Label::Name(name) => Some(name),
            Label::Token(..) => None,
        }
    }

    pub fn is_token(&self) -> bool {
        matches!(self, Label::Token(..))
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Name(name) => write!(f, "{:?}", name),
            Label::Token(id, description) => write!(f, "Token({}#{})", description, id),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Name(name) => f.write_str(name),
            Label::Token(_, description) => write!(f, "Token({})", description),
        }
    }
}

impl From<&str> for Label {
    fn from(name: &str) -> Self {
        Label::name(name)
    }
}

impl From<String> for Label {
    fn from(name: String) -> Self {
        Label::Name(Arc::from(name))
    }
}

impl From<&String> for Label {
    fn from(name: &String) -> Self {
        Label::name(name)
    }
}

impl From<&Label> for Label {
    fn from(label: &Label) -> Self {
        label.clone()
    }
}

impl<T> From<&ContainerLabel<T>> for Label {
    fn from(label: &ContainerLabel<T>) -> Self {
        label.label.clone()
    }
}

impl<T> From<ContainerLabel<T>> for Label {
    fn from(label: ContainerLabel<T>) -> Self {
        label.label
    }
}

/// A token label carrying the type of the value bound under it.
///
/// Lookup behaves exactly like an untyped [`Label::Token`]; the type parameter
/// only lets [`Container::get_token`](crate::Container::get_token) return the
/// right type without a turbofish.
///
/// ```rust
/// use ferrous_container::{container_label, Container, TypeRegistry};
/// use std::sync::Arc;
///
/// let port = container_label::<u16>("port");
/// let container = Container::new(Arc::new(TypeRegistry::new()));
/// container.bind_value(&port, 8080u16).unwrap();
/// assert_eq!(*container.get_token(&port).unwrap(), 8080);
/// ```
pub struct ContainerLabel<T> {
    label: Label,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ContainerLabel<T> {
    pub fn new(description: impl AsRef<str>) -> Self {
        Self {
            label: Label::token(description),
            _marker: PhantomData,
        }
    }

    pub fn label(&self) -> &Label {
        &self.label
    }
}

impl<T> Clone for ContainerLabel<T> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ContainerLabel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContainerLabel").field(&self.label).finish()
    }
}

/// Creates a typed token label.
pub fn container_label<T>(description: impl AsRef<str>) -> ContainerLabel<T> {
    ContainerLabel::new(description)
}

/// Returns true if the label is a token (typed or not).
pub fn is_container_label(label: &Label) -> bool {
    label.is_token()
}

/// Default class name for a Rust type: the last path segment of its type name,
/// generic arguments included.
///
/// ```rust
/// use ferrous_container::class_name;
///
/// struct Engine;
/// assert_eq!(class_name::<Engine>(), "Engine");
/// assert_eq!(class_name::<Vec<u8>>(), "Vec<u8>");
/// ```
pub fn class_name<T: ?Sized + 'static>() -> String {
    let full = std::any::type_name::<T>();
    let base_end = full.find('<').unwrap_or(full.len());
    let (base, generics) = full.split_at(base_end);
    let short = base.rsplit("::").next().unwrap_or(base);
    format!("{}{}", short, generics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn names_and_tokens_do_not_collide() {
        let mut map = HashMap::new();
        map.insert(Label::name("db"), 1);
        map.insert(Label::token("db"), 2);
        map.insert(Label::token("db"), 3);
        assert_eq!(map.len(), 3);
        assert_eq!(map[&Label::from("db")], 1);
    }

    #[test]
    fn typed_label_converts_to_its_token() {
        let typed = container_label::<String>("greeting");
        let label: Label = (&typed).into();
        assert_eq!(&label, typed.label());
        assert!(is_container_label(&label));
        assert_eq!(label.to_string(), "Token(greeting)");
    }

    #[test]
    fn class_name_strips_module_path() {
        mod inner {
            pub struct Deep;
        }
        assert_eq!(class_name::<inner::Deep>(), "Deep");
        assert_eq!(class_name::<String>(), "String");
    }
}
