//! Container and load configuration.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::metadata::AnyArc;

/// Default maximum resolution depth before giving up.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Predicate deciding whether a bound or produced value is acceptable.
pub type ValueValidator = Arc<dyn Fn(&AnyArc) -> bool + Send + Sync>;

/// Rejects the unit value, the closest thing Rust has to "no value".
pub fn reject_unit(value: &AnyArc) -> bool {
    !value.is::<()>()
}

/// Options fixed at container construction.
///
/// ```rust
/// use ferrous_container::{AnyArc, Container, ContainerOptions, DiError, TypeRegistry};
/// use std::sync::Arc;
///
/// let options = ContainerOptions::new()
///     .max_depth(64)
///     .value_validator(|value: &AnyArc| !value.downcast_ref::<String>().is_some_and(|s| s.is_empty()));
/// let container = Container::with_options(Arc::new(TypeRegistry::new()), options);
///
/// assert!(matches!(
///     container.bind_value("name", String::new()),
///     Err(DiError::InvalidValue(_))
/// ));
/// ```
#[derive(Clone)]
pub struct ContainerOptions {
    pub(crate) max_depth: usize,
    pub(crate) validator: ValueValidator,
}

impl ContainerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Replaces the validity check. The unit value is always rejected.
    pub fn value_validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&AnyArc) -> bool + Send + Sync + 'static,
    {
        self.validator = Arc::new(move |value: &AnyArc| reject_unit(value) && f(value));
        self
    }

    pub(crate) fn is_valid(&self, value: &AnyArc) -> bool {
        (self.validator)(value)
    }
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            validator: Arc::new(reject_unit),
        }
    }
}

impl fmt::Debug for ContainerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerOptions")
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

/// Options for turning registry metadata into container bindings.
///
/// With the `config` feature this can be read from configuration files:
///
/// ```rust
/// # #[cfg(feature = "config")]
/// # {
/// use ferrous_container::LoadOptions;
///
/// let options: LoadOptions = serde_json::from_str(r#"{"module_name": "billing"}"#).unwrap();
/// assert_eq!(options.module_name.as_deref(), Some("billing"));
/// assert_eq!(options.override_parent, None);
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct LoadOptions {
    /// Only load classes belonging to this module
    pub module_name: Option<String>,
    /// Also bind each class under its ancestors' names; overrides the per-class flag when set
    pub override_parent: Option<bool>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(mut self, name: impl Into<String>) -> Self {
        self.module_name = Some(name.into());
        self
    }

    pub fn override_parent(mut self, enabled: bool) -> Self {
        self.override_parent = Some(enabled);
        self
    }
}
