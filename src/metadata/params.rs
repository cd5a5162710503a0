//! Per-method parameter specifications, field types and call hooks.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::container::Container;
use crate::error::{DiError, DiResult};
use crate::label::Label;
use crate::metadata::MetadataRef;

/// Type-erased shared value, the currency of the container.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Type-erased instance under construction.
pub type AnyObject = dyn Any + Send + Sync;

/// Boxed future used by asynchronous hooks and methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of an invoked method; `None` stands for "no value".
pub type ReturnValue = Option<AnyArc>;

/// Custom value getter for a parameter or field, called with the resolving container.
pub type ValueGetter = Arc<dyn Fn(&Container) -> DiResult<AnyArc> + Send + Sync>;

/// Builds a fresh instance from resolved constructor arguments.
pub type Constructor = Arc<dyn Fn(Args<'_>) -> DiResult<Box<AnyObject>> + Send + Sync>;

/// Assigns a resolved value onto the field of an instance.
pub type FieldAssign = Arc<dyn Fn(&mut AnyObject, AnyArc) -> DiResult<()> + Send + Sync>;

/// Called once on every freshly constructed instance.
pub type OnCreate = Arc<dyn Fn(&mut AnyObject) + Send + Sync>;

/// Called after an inject declaration has been applied: `(metadata, class, member, index)`.
pub type AfterExecute =
    Arc<dyn Fn(&mut crate::metadata::Metadata, &str, &str, Option<usize>) + Send + Sync>;

pub(crate) fn into_return_value<R: Any + Send + Sync>(value: R) -> ReturnValue {
    if TypeId::of::<R>() == TypeId::of::<()>() {
        None
    } else {
        Some(Arc::new(value))
    }
}

/// Downcasts a type-erased value, naming `what` in the error.
pub(crate) fn downcast_arc<T: Any + Send + Sync>(value: AnyArc, what: &str) -> DiResult<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| DiError::TypeMismatch(format!("{} as {}", what, std::any::type_name::<T>())))
}

/// Borrowed view over resolved arguments with typed accessors.
///
/// ```rust
/// use ferrous_container::{AnyArc, Args};
/// use std::sync::Arc;
///
/// let values: Vec<AnyArc> = vec![Arc::new(7u32), Arc::new("x".to_string())];
/// let args = Args::new(&values);
/// assert_eq!(*args.get::<u32>(0).unwrap(), 7);
/// assert!(args.get::<u32>(1).is_err());
/// assert!(args.get::<u32>(2).is_err());
/// ```
#[derive(Clone, Copy)]
pub struct Args<'a> {
    values: &'a [AnyArc],
}

impl<'a> Args<'a> {
    pub fn new(values: &'a [AnyArc]) -> Self {
        Self { values }
    }

    /// Typed access to the argument at `index`.
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> DiResult<Arc<T>> {
        let value = self
            .values
            .get(index)
            .cloned()
            .ok_or_else(|| DiError::InjectNotFoundType(format!("argument {} is missing", index)))?;
        downcast_arc(value, &format!("argument {}", index))
    }

    pub fn raw(&self, index: usize) -> Option<&'a AnyArc> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &'a [AnyArc] {
        self.values
    }
}

/// Context handed to call hooks.
#[derive(Clone)]
pub struct MethodContext {
    pub class_name: String,
    pub method_name: String,
    pub metadata: MetadataRef,
}

impl fmt::Debug for MethodContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodContext")
            .field("class_name", &self.class_name)
            .field("method_name", &self.method_name)
            .finish()
    }
}

impl fmt::Display for MethodContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.method_name)
    }
}

type SyncBefore =
    dyn Fn(&Container, &MethodContext, &mut Vec<AnyArc>) -> anyhow::Result<()> + Send + Sync;
type AsyncBefore = dyn Fn(Container, MethodContext, Vec<AnyArc>) -> BoxFuture<'static, anyhow::Result<Vec<AnyArc>>>
    + Send
    + Sync;
type SyncAfter = dyn Fn(&Container, &MethodContext, &ReturnValue, &[AnyArc], Option<&anyhow::Error>) -> anyhow::Result<ReturnValue>
    + Send
    + Sync;
type AsyncAfter = dyn Fn(
        Container,
        MethodContext,
        ReturnValue,
        Vec<AnyArc>,
        Option<Arc<anyhow::Error>>,
    ) -> BoxFuture<'static, anyhow::Result<ReturnValue>>
    + Send
    + Sync;
type SyncBody = dyn Fn(&AnyArc, Args<'_>) -> anyhow::Result<ReturnValue> + Send + Sync;
type AsyncBody =
    dyn Fn(AnyArc, Vec<AnyArc>) -> BoxFuture<'static, anyhow::Result<ReturnValue>> + Send + Sync;

/// Hook run before a decorated method; may rewrite the argument list.
#[derive(Clone)]
pub enum BeforeCallMethod {
    Sync(Arc<SyncBefore>),
    Async(Arc<AsyncBefore>),
}

impl BeforeCallMethod {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Container, &MethodContext, &mut Vec<AnyArc>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        BeforeCallMethod::Sync(Arc::new(f))
    }

    /// Asynchronous hook: receives the arguments by value and hands them back.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Container, MethodContext, Vec<AnyArc>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<AnyArc>>> + Send + 'static,
    {
        let hook: Arc<AsyncBefore> = Arc::new(
            move |c: Container, m: MethodContext, a: Vec<AnyArc>| -> BoxFuture<'static, anyhow::Result<Vec<AnyArc>>> {
                Box::pin(f(c, m, a))
            },
        );
        BeforeCallMethod::Async(hook)
    }

    pub fn is_async(&self) -> bool {
        matches!(self, BeforeCallMethod::Async(_))
    }
}

/// Hook run after a decorated method, also when the method failed.
///
/// Returning `Some(value)` replaces the propagated return value and clears a
/// pending method error.
#[derive(Clone)]
pub enum AfterCallMethod {
    Sync(Arc<SyncAfter>),
    Async(Arc<AsyncAfter>),
}

impl AfterCallMethod {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Container, &MethodContext, &ReturnValue, &[AnyArc], Option<&anyhow::Error>) -> anyhow::Result<ReturnValue>
            + Send
            + Sync
            + 'static,
    {
        AfterCallMethod::Sync(Arc::new(f))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Container, MethodContext, ReturnValue, Vec<AnyArc>, Option<Arc<anyhow::Error>>) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = anyhow::Result<ReturnValue>> + Send + 'static,
    {
        let hook: Arc<AsyncAfter> = Arc::new(
            move |c: Container,
                  m: MethodContext,
                  r: ReturnValue,
                  a: Vec<AnyArc>,
                  e: Option<Arc<anyhow::Error>>|
                  -> BoxFuture<'static, anyhow::Result<ReturnValue>> { Box::pin(f(c, m, r, a, e)) },
        );
        AfterCallMethod::Async(hook)
    }

    pub fn is_async(&self) -> bool {
        matches!(self, AfterCallMethod::Async(_))
    }
}

/// The invocable body of a decorated method.
#[derive(Clone)]
pub enum MethodBody {
    Sync(Arc<SyncBody>),
    Async(Arc<AsyncBody>),
}

impl MethodBody {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&AnyArc, Args<'_>) -> anyhow::Result<ReturnValue> + Send + Sync + 'static,
    {
        MethodBody::Sync(Arc::new(f))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(AnyArc, Vec<AnyArc>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ReturnValue>> + Send + 'static,
    {
        let body: Arc<AsyncBody> = Arc::new(
            move |instance: AnyArc, args: Vec<AnyArc>| -> BoxFuture<'static, anyhow::Result<ReturnValue>> {
                Box::pin(f(instance, args))
            },
        );
        MethodBody::Async(body)
    }

    pub fn is_async(&self) -> bool {
        matches!(self, MethodBody::Async(_))
    }
}

/// Explicit parameter labels and getters, keyed by parameter index.
#[derive(Clone, Default)]
pub struct MethodParameterOption {
    pub param_types: BTreeMap<usize, Label>,
    pub param_getters: BTreeMap<usize, ValueGetter>,
}

impl MethodParameterOption {
    pub fn is_empty(&self) -> bool {
        self.param_types.is_empty() && self.param_getters.is_empty()
    }

    /// Sets labels for parameters `0..labels.len()`.
    pub fn with_types<I, L>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        for (index, label) in labels.into_iter().enumerate() {
            self.param_types.insert(index, label.into());
        }
        self
    }

    pub fn with_getter(mut self, index: usize, getter: ValueGetter) -> Self {
        self.param_getters.insert(index, getter);
        self
    }
}

impl fmt::Debug for MethodParameterOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodParameterOption")
            .field("param_types", &self.param_types)
            .field("param_getters", &self.param_getters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Upper bound (exclusive) on parameter positions of a method.
pub const MAX_PARAMETERS: usize = 256;

fn check_parameter_index(index: usize) -> DiResult<()> {
    if index >= MAX_PARAMETERS {
        return Err(DiError::InjectNotFoundType(format!(
            "parameter index {} exceeds the limit of {}",
            index, MAX_PARAMETERS
        )));
    }
    Ok(())
}

/// Parameter labels, custom getters and call hooks of one method.
///
/// `types` is index-aligned with parameter position; `None` marks a position
/// that only a getter (or nothing yet) supplies.
#[derive(Clone, Default)]
pub struct ParameterSpec {
    pub types: Vec<Option<Label>>,
    pub getters: BTreeMap<usize, ValueGetter>,
    pub before_call_methods: Vec<BeforeCallMethod>,
    pub after_call_methods: Vec<AfterCallMethod>,
    pub body: Option<MethodBody>,
}

impl ParameterSpec {
    /// Number of parameter positions covered by labels or getters.
    pub fn arity(&self) -> usize {
        let by_getter = self.getters.keys().next_back().map_or(0, |i| i + 1);
        self.types.len().max(by_getter)
    }

    pub fn type_at(&self, index: usize) -> Option<&Label> {
        self.types.get(index).and_then(Option::as_ref)
    }

    /// Sets the label at `index`; indices at or past [`MAX_PARAMETERS`] are rejected.
    pub fn set_type(&mut self, index: usize, label: Label) -> DiResult<()> {
        check_parameter_index(index)?;
        if self.types.len() <= index {
            self.types.resize(index + 1, None);
        }
        self.types[index] = Some(label);
        Ok(())
    }

    /// Sets the custom getter at `index`, same bound as [`set_type`](Self::set_type).
    pub fn set_getter(&mut self, index: usize, getter: ValueGetter) -> DiResult<()> {
        check_parameter_index(index)?;
        self.getters.insert(index, getter);
        Ok(())
    }

    /// Drops labels and getters, keeping hooks and body.
    pub fn clear_parameters(&mut self) {
        self.types.clear();
        self.getters.clear();
    }

    /// Copy of the parameter shape without hooks or body.
    pub(crate) fn parameters_only(&self) -> Self {
        Self {
            types: self.types.clone(),
            getters: self.getters.clone(),
            ..Self::default()
        }
    }

    /// True if any hook or the body can only complete asynchronously.
    pub fn suspends(&self) -> bool {
        self.before_call_methods.iter().any(BeforeCallMethod::is_async)
            || self.after_call_methods.iter().any(AfterCallMethod::is_async)
            || self.body.as_ref().is_some_and(MethodBody::is_async)
    }
}

impl fmt::Debug for ParameterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterSpec")
            .field("types", &self.types)
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("before_call_methods", &self.before_call_methods.len())
            .field("after_call_methods", &self.after_call_methods.len())
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Injection description of one field.
#[derive(Clone)]
pub struct FieldType {
    pub type_label: Option<Label>,
    pub getter: Option<ValueGetter>,
    /// Class that declared the field; inherited fields are assigned through the upcast chain.
    pub owner: String,
    pub assign: FieldAssign,
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldType")
            .field("type_label", &self.type_label)
            .field("has_getter", &self.getter.is_some())
            .field("owner", &self.owner)
            .finish()
    }
}

/// Fills parameter labels and getters where still unset.
///
/// The first writer wins: explicit per-parameter overrides applied earlier are
/// never replaced. Fails when neither `option` nor `native` supplies anything.
pub fn fill_in_method_parameter_types(
    spec: &mut ParameterSpec,
    option: Option<&MethodParameterOption>,
    native: Option<&[Label]>,
) -> DiResult<()> {
    let option = option.filter(|o| !o.is_empty());
    if option.is_none() && native.is_none() {
        return Err(DiError::InjectNotFoundType(
            "method parameter types cannot be determined, specify them explicitly".into(),
        ));
    }

    if let Some(option) = option {
        for (&index, label) in &option.param_types {
            if spec.type_at(index).is_none() {
                spec.set_type(index, label.clone())?;
            }
        }
        for (&index, getter) in &option.param_getters {
            if !spec.getters.contains_key(&index) {
                spec.set_getter(index, getter.clone())?;
            }
        }
    }

    if let Some(native) = native {
        for (index, label) in native.iter().enumerate() {
            if spec.type_at(index).is_none() {
                spec.set_type(index, label.clone())?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<Label> {
        names.iter().map(|n| Label::from(*n)).collect()
    }

    #[test]
    fn explicit_types_win_over_native() {
        let mut spec = ParameterSpec::default();
        let option = MethodParameterOption::default().with_types(["Override"]);
        fill_in_method_parameter_types(&mut spec, Some(&option), Some(&labels(&["A", "B"]))).unwrap();

        assert_eq!(spec.type_at(0), Some(&Label::from("Override")));
        assert_eq!(spec.type_at(1), Some(&Label::from("B")));
        assert_eq!(spec.arity(), 2);
    }

    #[test]
    fn earlier_writer_is_kept() {
        let mut spec = ParameterSpec::default();
        spec.set_type(1, Label::from("Pinned")).unwrap();
        fill_in_method_parameter_types(&mut spec, None, Some(&labels(&["A", "B"]))).unwrap();
        assert_eq!(spec.type_at(0), Some(&Label::from("A")));
        assert_eq!(spec.type_at(1), Some(&Label::from("Pinned")));
    }

    #[test]
    fn nothing_to_fill_is_an_error() {
        let mut spec = ParameterSpec::default();
        let empty = MethodParameterOption::default();
        let err = fill_in_method_parameter_types(&mut spec, Some(&empty), None).unwrap_err();
        assert!(matches!(err, DiError::InjectNotFoundType(_)));

        // Empty native information is still information.
        fill_in_method_parameter_types(&mut spec, None, Some(&[])).unwrap();
        assert_eq!(spec.arity(), 0);
    }

    #[test]
    fn getters_extend_arity() {
        let mut spec = ParameterSpec::default();
        let getter: ValueGetter = Arc::new(|_| Ok(Arc::new(1u8) as AnyArc));
        let option = MethodParameterOption::default().with_getter(2, getter);
        fill_in_method_parameter_types(&mut spec, Some(&option), None).unwrap();
        assert_eq!(spec.arity(), 3);
        assert!(spec.type_at(0).is_none());
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut spec = ParameterSpec::default();
        assert!(matches!(
            spec.set_type(usize::MAX, Label::from("Huge")),
            Err(DiError::InjectNotFoundType(_))
        ));
        assert!(spec.set_type(MAX_PARAMETERS, Label::from("Edge")).is_err());
        spec.set_type(MAX_PARAMETERS - 1, Label::from("Last")).unwrap();
        assert_eq!(spec.arity(), MAX_PARAMETERS);

        let getter: ValueGetter = Arc::new(|_| Ok(Arc::new(1u8) as AnyArc));
        let option = MethodParameterOption::default().with_getter(usize::MAX, getter);
        let mut fresh = ParameterSpec::default();
        assert!(fill_in_method_parameter_types(&mut fresh, Some(&option), None).is_err());
        assert_eq!(fresh.arity(), 0);
    }
}
