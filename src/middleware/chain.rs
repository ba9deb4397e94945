//! Ordered interceptor lists acting as a single interceptor.

use std::sync::Arc;

use super::Interceptor;
use crate::context::Context;
use crate::handler::{BoxFuture, Handler};
use crate::request::Request;
use crate::response::ResponseWriter;

/// A list of interceptors applied as one, first element outermost.
///
/// Applying `Chain::new([a, b])` to `h` behaves exactly like applying `b`
/// to `h` and then `a` to the result. The remaining chain is walked by
/// borrowing, so a request costs one boxed future per layer and no `Arc`
/// clones.
#[derive(Clone, Default)]
pub struct Chain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Chain {
    pub fn new(interceptors: impl IntoIterator<Item = Arc<dyn Interceptor>>) -> Self {
        Self { interceptors: interceptors.into_iter().collect() }
    }

    /// Appends `interceptor` as the new innermost layer.
    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Collapses the chain for [`apply_interceptor`](super::apply_interceptor).
    ///
    /// Empty gives `None`, a single element gives that element back, anything
    /// longer gives the chain itself.
    pub fn into_interceptor(mut self) -> Option<Arc<dyn Interceptor>> {
        match self.interceptors.len() {
            0 | 1 => self.interceptors.pop(),
            _ => Some(Arc::new(self)),
        }
    }
}

impl Interceptor for Chain {
    fn handle<'a>(
        &'a self,
        ctx: &'a Context,
        req: &'a Request,
        resw: &'a mut dyn ResponseWriter,
        next: &'a dyn Handler,
    ) -> BoxFuture<'a> {
        run(&self.interceptors, next, ctx, req, resw)
    }
}

/// The part of a chain below the interceptor currently running.
struct Rest<'c> {
    interceptors: &'c [Arc<dyn Interceptor>],
    next: &'c dyn Handler,
}

impl Handler for Rest<'_> {
    fn handle<'a>(
        &'a self,
        ctx: &'a Context,
        req: &'a Request,
        resw: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a> {
        run(self.interceptors, self.next, ctx, req, resw)
    }
}

fn run<'a>(
    interceptors: &'a [Arc<dyn Interceptor>],
    next: &'a dyn Handler,
    ctx: &'a Context,
    req: &'a Request,
    resw: &'a mut dyn ResponseWriter,
) -> BoxFuture<'a> {
    match interceptors.split_first() {
        None => next.handle(ctx, req, resw),
        Some((first, rest)) => Box::pin(async move {
            let rest = Rest { interceptors: rest, next };
            first.handle(ctx, req, resw, &rest).await
        }),
    }
}
