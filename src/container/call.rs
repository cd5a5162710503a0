//! Method invocation with injected arguments and before/after hooks.

use std::any::Any;
use std::sync::Arc;

use crate::container::Container;
use crate::error::{DiError, DiResult};
use crate::metadata::{
    AfterCallMethod, AnyArc, Args, BeforeCallMethod, MethodBody, MethodContext, ParameterSpec, ReturnValue,
};

struct PreparedCall {
    context: MethodContext,
    spec: ParameterSpec,
    body: MethodBody,
}

impl Container {
    /// Invokes a decorated method of `instance`.
    ///
    /// Arguments are resolved from the method's parameter labels and getters,
    /// then passed through the before hooks in declaration order. After hooks
    /// run in declaration order whether or not the method failed; the first
    /// one returning `Some` replaces the return value and clears the failure.
    ///
    /// # Errors
    ///
    /// - [`DiError::MethodNotDecoratedInject`] if the method has no metadata
    /// - [`DiError::Invocation`] if the method or a hook failed
    /// - any resolution error for the arguments
    pub async fn call<T: Any + Send + Sync>(&self, instance: &Arc<T>, method_name: &str) -> DiResult<ReturnValue> {
        let class_name = self.registry().name_of::<T>();
        self.call_any(&class_name, instance.clone(), method_name).await
    }

    /// [`call`](Self::call) for a type-erased instance of a named class.
    pub async fn call_any(&self, class_name: &str, instance: AnyArc, method_name: &str) -> DiResult<ReturnValue> {
        let PreparedCall { context, spec, body } = self.prepare_call(class_name, method_name)?;
        let mut args = self.resolve_parameters(class_name, method_name, &spec)?;
        tracing::trace!(method = %context, args = args.len(), "calling method");

        for hook in &spec.before_call_methods {
            match hook {
                BeforeCallMethod::Sync(f) => f(self, &context, &mut args).map_err(|e| failed(&context, e))?,
                BeforeCallMethod::Async(f) => {
                    args = f(self.clone(), context.clone(), args)
                        .await
                        .map_err(|e| failed(&context, e))?;
                }
            }
        }

        let outcome = match &body {
            MethodBody::Sync(f) => f(&instance, Args::new(&args)),
            MethodBody::Async(f) => f(instance.clone(), args.clone()).await,
        };
        let (mut ret, mut err) = split(outcome);

        for hook in &spec.after_call_methods {
            let replaced = match hook {
                AfterCallMethod::Sync(f) => f(self, &context, &ret, &args, err.as_deref()),
                AfterCallMethod::Async(f) => {
                    f(self.clone(), context.clone(), ret.clone(), args.clone(), err.clone()).await
                }
            }
            .map_err(|e| failed(&context, e))?;
            if let Some(value) = replaced {
                ret = Some(value);
                err = None;
            }
        }

        finish(&context, ret, err)
    }

    /// Synchronous [`call`](Self::call).
    ///
    /// Fails with [`DiError::SuspendingCall`] before resolving anything if the
    /// method or one of its hooks is asynchronous.
    pub fn call_sync<T: Any + Send + Sync>(&self, instance: &Arc<T>, method_name: &str) -> DiResult<ReturnValue> {
        let class_name = self.registry().name_of::<T>();
        self.call_sync_any(&class_name, instance.clone(), method_name)
    }

    pub fn call_sync_any(&self, class_name: &str, instance: AnyArc, method_name: &str) -> DiResult<ReturnValue> {
        let PreparedCall { context, spec, body } = self.prepare_call(class_name, method_name)?;
        if spec.suspends() {
            return Err(DiError::SuspendingCall(context.to_string()));
        }
        let mut args = self.resolve_parameters(class_name, method_name, &spec)?;

        for hook in &spec.before_call_methods {
            if let BeforeCallMethod::Sync(f) = hook {
                f(self, &context, &mut args).map_err(|e| failed(&context, e))?;
            }
        }

        let outcome = match &body {
            MethodBody::Sync(f) => f(&instance, Args::new(&args)),
            MethodBody::Async(_) => return Err(DiError::SuspendingCall(context.to_string())),
        };
        let (mut ret, mut err) = split(outcome);

        for hook in &spec.after_call_methods {
            if let AfterCallMethod::Sync(f) = hook {
                if let Some(value) = f(self, &context, &ret, &args, err.as_deref()).map_err(|e| failed(&context, e))? {
                    ret = Some(value);
                    err = None;
                }
            }
        }

        finish(&context, ret, err)
    }

    fn prepare_call(&self, class_name: &str, method_name: &str) -> DiResult<PreparedCall> {
        let not_decorated = || DiError::MethodNotDecoratedInject {
            class: class_name.to_string(),
            method: method_name.to_string(),
        };
        let metadata = self.registry().get(class_name).ok_or_else(not_decorated)?;
        let (spec, body) = {
            let m = metadata.read();
            let spec = m.parameter_spec(method_name).cloned().ok_or_else(not_decorated)?;
            let body = spec.body.clone().ok_or_else(not_decorated)?;
            (spec, body)
        };
        Ok(PreparedCall {
            context: MethodContext {
                class_name: class_name.to_string(),
                method_name: method_name.to_string(),
                metadata,
            },
            spec,
            body,
        })
    }
}

fn split(outcome: anyhow::Result<ReturnValue>) -> (ReturnValue, Option<Arc<anyhow::Error>>) {
    match outcome {
        Ok(ret) => (ret, None),
        Err(err) => (None, Some(Arc::new(err))),
    }
}

fn failed(context: &MethodContext, error: anyhow::Error) -> DiError {
    DiError::Invocation {
        method: context.to_string(),
        error: Arc::new(error),
    }
}

fn finish(context: &MethodContext, ret: ReturnValue, err: Option<Arc<anyhow::Error>>) -> DiResult<ReturnValue> {
    match err {
        None => Ok(ret),
        Some(error) => {
            tracing::debug!(method = %context, error = %error, "method failed");
            Err(DiError::Invocation {
                method: context.to_string(),
                error,
            })
        }
    }
}
