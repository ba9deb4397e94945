//! Minimal ferry example: a key-value service behind three interceptors.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -X POST http://localhost:3000 \
//!        -H 'rpc-caller: curl' -H 'rpc-service: kv' -H 'rpc-procedure: get' \
//!        -H 'rpc-header-key: greeting'
//!   curl -X POST http://localhost:3000 \
//!        -H 'rpc-caller: curl' -H 'rpc-service: kv' -H 'rpc-procedure: get' \
//!        -H 'rpc-header-key: nope' -H 'context-ttl-ms: 100'

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ferry::middleware::{deadline::Timeout, trace::Trace};
use ferry::{BoxFuture, Context, Error, Handler, Interceptor, Request, ResponseWriter, Server, handler_fn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    Server::bind("0.0.0.0:3000")?
        .interceptor(Trace)
        .interceptor(CountCalls::default())
        .interceptor(Timeout::new(Duration::from_secs(2)))
        .serve(handler_fn(kv))
        .await
}

// get: looks up the `key` application header.
//
// A missing key is an application error: the body still goes out, flagged
// with `Rpc-Status: error`.
fn kv<'a>(_: &'a Context, req: &'a Request, resw: &'a mut dyn ResponseWriter) -> BoxFuture<'a> {
    Box::pin(async move {
        if req.procedure() != "get" {
            return Err(Error::bad_request(format!("unknown procedure {}", req.procedure())));
        }
        match req.header("key") {
            Some("greeting") => resw.write(b"hello"),
            _ => {
                resw.set_application_error()?;
                resw.write(b"no such key")
            }
        }
    })
}

// Shared across every request, so the counter is atomic.
#[derive(Default)]
struct CountCalls {
    calls: AtomicU64,
}

impl Interceptor for CountCalls {
    fn handle<'a>(
        &'a self,
        ctx: &'a Context,
        req: &'a Request,
        resw: &'a mut dyn ResponseWriter,
        next: &'a dyn Handler,
    ) -> BoxFuture<'a> {
        Box::pin(async move {
            let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
            resw.add_header("call-number", &n.to_string())?;
            next.handle(ctx, req, resw).await
        })
    }
}
