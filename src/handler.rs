//! The handler contract.
//!
//! # How handlers are called
//!
//! A handler is the terminal unit of work for one call. The inbound holds a
//! single composed handler behind an `Arc` and calls it once per request:
//!
//! ```text
//! fn echo<'a>(ctx, req, resw) -> BoxFuture<'a> { … }   ← user writes this
//!        ↓ handler_fn(echo)
//! Arc::new(HandlerFn(echo))                          ← built once at startup
//!        ↓ apply_interceptor(h, Some(i))
//! Arc<Intercepted { handler, interceptor }>          ← stored as BoxedHandler
//!        ↓
//! handler.handle(&ctx, &req, &mut resw).await        ← per request
//! ```
//!
//! Every argument is borrowed for the lifetime of the returned future. That
//! lets an interceptor call `next` several times against the same request
//! and sink, or hand it a derived context that lives on its own stack frame.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Result;
use crate::request::Request;
use crate::response::ResponseWriter;

/// A heap-allocated, type-erased future resolving to the call's outcome.
///
/// `Send` so tokio can move it between worker threads. The `'a` ties it to
/// the borrowed context, request and sink.
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// A handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn Handler>;

/// Handles one inbound request, writing the response through `resw`.
///
/// Implementations are shared by every in-flight request, hence
/// `Send + Sync`. The contract promises nothing about idempotence: the same
/// handler may be called zero, one or many times for one logical call,
/// depending on the interceptors around it.
pub trait Handler: Send + Sync {
    fn handle<'a>(
        &'a self,
        ctx: &'a Context,
        req: &'a Request,
        resw: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a>;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn handle<'a>(
        &'a self,
        ctx: &'a Context,
        req: &'a Request,
        resw: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a> {
        (**self).handle(ctx, req, resw)
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn handle<'a>(
        &'a self,
        ctx: &'a Context,
        req: &'a Request,
        resw: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a> {
        (**self).handle(ctx, req, resw)
    }
}

impl<H: Handler + ?Sized> Handler for &H {
    fn handle<'a>(
        &'a self,
        ctx: &'a Context,
        req: &'a Request,
        resw: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a> {
        (**self).handle(ctx, req, resw)
    }
}

/// Adapts a function into a [`Handler`].
///
/// Closures rarely infer the higher-ranked signature; a plain `fn` item
/// does:
///
/// ```rust
/// use ferry::{handler_fn, BoxFuture, Context, Request, ResponseWriter};
///
/// fn echo<'a>(_: &'a Context, req: &'a Request, resw: &'a mut dyn ResponseWriter) -> BoxFuture<'a> {
///     Box::pin(async move { resw.write(req.body()) })
/// }
///
/// let handler = handler_fn(echo);
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a Context, &'a Request, &'a mut dyn ResponseWriter) -> BoxFuture<'a>
        + Send
        + Sync,
{
    HandlerFn(f)
}

/// Returned by [`handler_fn`].
#[derive(Clone, Copy)]
pub struct HandlerFn<F>(F);

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a Context, &'a Request, &'a mut dyn ResponseWriter) -> BoxFuture<'a>
        + Send
        + Sync,
{
    fn handle<'a>(
        &'a self,
        ctx: &'a Context,
        req: &'a Request,
        resw: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a> {
        (self.0)(ctx, req, resw)
    }
}
