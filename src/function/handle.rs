//! The two constructor paths into [`Function`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::{BoxFuture, Function, FunctionError};
use crate::protocol::{MessageSource, ResponseSink, Scope};

/// Adapts a bare handler function to [`Function`]. It has no hooks.
pub struct StaticFunction<H> {
    handler: H,
}

impl<H> StaticFunction<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<H> Function for StaticFunction<H>
where
    H: for<'a> Fn(
            &'a Scope,
            &'a mut dyn MessageSource,
            &'a mut dyn ResponseSink,
        ) -> BoxFuture<'a, Result<(), FunctionError>>
        + Send
        + Sync
        + 'static,
{
    async fn handle(
        &self,
        scope: &Scope,
        receive: &mut dyn MessageSource,
        send: &mut dyn ResponseSink,
    ) -> Result<(), FunctionError> {
        (self.handler)(scope, receive, send).await
    }
}

/// The process-wide user function, built once at startup.
#[derive(Clone)]
pub struct FunctionHandle {
    inner: Arc<dyn Function>,
}

impl FunctionHandle {
    /// Wrap a bare handler:
    ///
    /// ```ignore
    /// fn handle<'a>(
    ///     scope: &'a Scope,
    ///     receive: &'a mut dyn MessageSource,
    ///     send: &'a mut dyn ResponseSink,
    /// ) -> BoxFuture<'a, Result<(), FunctionError>> {
    ///     Box::pin(async move { /* ... */ Ok(()) })
    /// }
    /// let handle = FunctionHandle::from_handler(handle);
    /// ```
    pub fn from_handler<H>(handler: H) -> Self
    where
        H: for<'a> Fn(
                &'a Scope,
                &'a mut dyn MessageSource,
                &'a mut dyn ResponseSink,
            ) -> BoxFuture<'a, Result<(), FunctionError>>
            + Send
            + Sync
            + 'static,
    {
        Self::from_instance(StaticFunction::new(handler))
    }

    /// Build the instance by calling `factory` exactly once.
    pub fn from_factory<F, T>(factory: F) -> Self
    where
        F: FnOnce() -> T,
        T: Function,
    {
        Self::from_instance(factory())
    }

    pub fn from_instance<T: Function>(function: T) -> Self {
        Self {
            inner: Arc::new(function),
        }
    }

    pub fn function(&self) -> &dyn Function {
        self.inner.as_ref()
    }
}

impl fmt::Debug for FunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionHandle").finish_non_exhaustive()
    }
}
