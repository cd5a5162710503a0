//! Error types for the dependency injection container.

use std::sync::Arc;

use thiserror::Error;

/// Dependency injection errors
///
/// Every failure the registry or a container can produce has its own variant,
/// so callers can branch on the cause instead of parsing messages.
///
/// # Examples
///
/// ```rust
/// use ferrous_container::{Container, DiError, TypeRegistry};
/// use std::sync::Arc;
///
/// let container = Container::new(Arc::new(TypeRegistry::new()));
/// match container.get_value("missing", &[]) {
///     Err(DiError::NotExistLabel(label)) => assert_eq!(label, "missing"),
///     _ => unreachable!(),
/// }
/// ```
///
/// ```rust
/// use ferrous_container::DiError;
///
/// let cycle = DiError::DependencyCycle(vec!["A".into(), "B".into(), "A".into()]);
/// assert_eq!(cycle.to_string(), "Dependency cycle: A -> B -> A");
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// A bound or produced value failed the container's validity check
    #[error("Invalid value for label: {0}")]
    InvalidValue(String),
    /// Attempt to replace a class-backed injectable binding with a plain binding
    #[error("Cannot override injectable class binding: {0}")]
    ForbiddenOverrideInjectable(String),
    /// Lookup of a label no container in the chain can resolve
    #[error("Label not found: {0}")]
    NotExistLabel(String),
    /// Resolution revisited a label that is still being constructed (includes path)
    #[error("Dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
    /// `load` was called more than once on the same container
    #[error("Container has already been loaded")]
    ContainerRepeatLoad,
    /// `call`/`call_sync` target has no injection metadata for the method
    #[error("Method {class}.{method} is not decorated for injection")]
    MethodNotDecoratedInject { class: String, method: String },
    /// A parameter or field has neither a type label nor a custom getter
    #[error("Injection type not resolvable: {0}")]
    InjectNotFoundType(String),
    /// Type-erased value could not be downcast to the requested type
    #[error("Type mismatch for: {0}")]
    TypeMismatch(String),
    /// Maximum resolution depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// `call_sync` met a hook or method that can only complete asynchronously
    #[error("Synchronous call of {0} would suspend")]
    SuspendingCall(String),
    /// The invoked method failed and no after hook replaced its result
    #[error("Invocation of {method} failed: {error}")]
    Invocation {
        method: String,
        error: Arc<anyhow::Error>,
    },
}

impl DiError {
    /// Returns the method failure carried by [`DiError::Invocation`], if any.
    pub fn invocation_error(&self) -> Option<&anyhow::Error> {
        match self {
            DiError::Invocation { error, .. } => Some(&**error),
            _ => None,
        }
    }
}

/// Result type for DI operations
///
/// A convenience type alias for `Result<T, DiError>` used throughout the crate.
///
/// ```rust
/// use ferrous_container::{DiResult, DiError};
///
/// fn failing_operation() -> DiResult<()> {
///     Err(DiError::NotExistLabel("some_label".into()))
/// }
///
/// assert!(failing_operation().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;
