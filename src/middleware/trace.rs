//! Per-request tracing.
//!
//! [`Trace`] opens one `rpc` span per call and logs its outcome:
//!
//! ```text
//! INFO rpc{caller=web service=users procedure=get}: ferry::middleware::trace: ok latency_ms=3
//! ```
//!
//! Errors are logged at `warn` and returned unchanged.

use std::time::Instant;

use tracing::{Instrument, debug, info, info_span, warn};

use super::Interceptor;
use crate::context::Context;
use crate::handler::{BoxFuture, Handler};
use crate::request::Request;
use crate::response::ResponseWriter;

/// Pass-through interceptor that records a span and the outcome of each call.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Interceptor for Trace {
    fn handle<'a>(
        &'a self,
        ctx: &'a Context,
        req: &'a Request,
        resw: &'a mut dyn ResponseWriter,
        next: &'a dyn Handler,
    ) -> BoxFuture<'a> {
        let span = info_span!(
            "rpc",
            caller = req.caller(),
            service = req.service(),
            procedure = req.procedure(),
            encoding = req.encoding()
        );

        Box::pin(
            async move {
                let start = Instant::now();
                debug!(remaining_ms = ctx.remaining().map(|d| d.as_millis() as u64), "start");

                let res = next.handle(ctx, req, resw).await;
                let latency_ms = start.elapsed().as_millis() as u64;
                match &res {
                    Ok(()) => info!(latency_ms, "ok"),
                    Err(e) => warn!(latency_ms, error = %e, "failed"),
                }
                res
            }
            .instrument(span),
        )
    }
}
