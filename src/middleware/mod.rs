//! Interceptors: transport-level middleware around a [`Handler`].
//!
//! An interceptor sees every request on its way to the handler, together
//! with `next`, the rest of the chain. What it does with `next` is up to it.
//! An interceptor MAY
//!
//! - derive a new [`Context`] (tighter deadline, extra baggage);
//! - build a replacement [`Request`];
//! - write to the [`ResponseWriter`] itself, or wrap it before passing it down;
//! - inspect, replace or propagate the error returned by `next`;
//! - call `next` zero, one or many times.
//!
//! Interceptors are built once and shared by every in-flight request, and
//! may be re-entered for the same request (a retry calls `next` again). They
//! MUST NOT keep per-call state in their own fields; shared counters and
//! caches need their own synchronization.
//!
//! # Composition
//!
//! [`apply_interceptor`] binds one interceptor to one handler. Applying I2
//! and then I1 around H gives the nesting below; [`Chain`] does the same
//! from a list, first element outermost:
//!
//! ```text
//! caller ─▶ I1 ─▶ I2 ─▶ H
//!        ◀─    ◀─    ◀─
//! ```
//!
//! Built-in interceptors:
//! - [`trace::Trace`]: per-request span with caller, procedure and latency
//! - [`deadline::Timeout`]: per-request deadline

mod chain;
pub mod deadline;
pub mod trace;

use std::sync::Arc;

use crate::context::Context;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::request::Request;
use crate::response::ResponseWriter;

pub use chain::Chain;

/// Transport-level middleware for inbound requests.
///
/// Whatever `handle` returns becomes the result of the composed handler.
/// When an interceptor calls `next` it must surface the outcome, either
/// verbatim or as a deliberate transformation. Dropping an error from
/// `next` on the floor is a bug in the interceptor.
pub trait Interceptor: Send + Sync {
    fn handle<'a>(
        &'a self,
        ctx: &'a Context,
        req: &'a Request,
        resw: &'a mut dyn ResponseWriter,
        next: &'a dyn Handler,
    ) -> BoxFuture<'a>;
}

/// Applies `interceptor` to `handler`.
///
/// With `None` the very same handler comes back, not a forwarding wrapper,
/// so callers can pass an optional interceptor without special-casing it.
pub fn apply_interceptor(
    handler: BoxedHandler,
    interceptor: Option<Arc<dyn Interceptor>>,
) -> BoxedHandler {
    match interceptor {
        Some(interceptor) => Arc::new(Intercepted { handler, interceptor }),
        None => handler,
    }
}

struct Intercepted {
    handler: BoxedHandler,
    interceptor: Arc<dyn Interceptor>,
}

impl Handler for Intercepted {
    fn handle<'a>(
        &'a self,
        ctx: &'a Context,
        req: &'a Request,
        resw: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a> {
        self.interceptor.handle(ctx, req, resw, &*self.handler)
    }
}

/// An interceptor that does nothing special: it calls `next` once with the
/// arguments it was given and returns the result untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct NopInterceptor;

/// Shared [`NopInterceptor`] value.
pub static NOP_INTERCEPTOR: NopInterceptor = NopInterceptor;

impl Interceptor for NopInterceptor {
    fn handle<'a>(
        &'a self,
        ctx: &'a Context,
        req: &'a Request,
        resw: &'a mut dyn ResponseWriter,
        next: &'a dyn Handler,
    ) -> BoxFuture<'a> {
        next.handle(ctx, req, resw)
    }
}

/// Adapts a function into an [`Interceptor`].
///
/// ```rust
/// use ferry::middleware::interceptor_fn;
/// use ferry::{BoxFuture, Context, Handler, Request, ResponseWriter};
///
/// fn tag<'a>(
///     ctx: &'a Context,
///     req: &'a Request,
///     resw: &'a mut dyn ResponseWriter,
///     next: &'a dyn Handler,
/// ) -> BoxFuture<'a> {
///     Box::pin(async move {
///         let req = req.with_header("x-tagged", "1");
///         next.handle(ctx, &req, resw).await
///     })
/// }
///
/// let interceptor = interceptor_fn(tag);
/// ```
pub fn interceptor_fn<F>(f: F) -> InterceptorFn<F>
where
    F: for<'a> Fn(
            &'a Context,
            &'a Request,
            &'a mut dyn ResponseWriter,
            &'a dyn Handler,
        ) -> BoxFuture<'a>
        + Send
        + Sync,
{
    InterceptorFn(f)
}

/// Returned by [`interceptor_fn`].
#[derive(Clone, Copy)]
pub struct InterceptorFn<F>(F);

impl<F> Interceptor for InterceptorFn<F>
where
    F: for<'a> Fn(
            &'a Context,
            &'a Request,
            &'a mut dyn ResponseWriter,
            &'a dyn Handler,
        ) -> BoxFuture<'a>
        + Send
        + Sync,
{
    fn handle<'a>(
        &'a self,
        ctx: &'a Context,
        req: &'a Request,
        resw: &'a mut dyn ResponseWriter,
        next: &'a dyn Handler,
    ) -> BoxFuture<'a> {
        (self.0)(ctx, req, resw, next)
    }
}
