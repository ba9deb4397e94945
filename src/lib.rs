//! # ferry
//!
//! Composable request interceptors for a minimal RPC transport.
//!
//! ## The contract
//!
//! A [`Handler`] does the work for one call. An [`Interceptor`] wraps a
//! handler: it gets the same inputs plus `next`, the rest of the chain, and
//! decides whether to call it, how often, and with what. Composition is
//! done once at startup with [`apply_interceptor`] (or a
//! [`Chain`](middleware::Chain)), and the result is again just a handler,
//! so the transport never knows how many layers it is calling through.
//!
//! What ferry intentionally leaves to others:
//!
//! - **Routing**: one composed handler per inbound; match on
//!   [`Request::procedure`] if you need more
//! - **Retries and load balancing**: write them as interceptors
//! - **Serialization**: bodies are bytes
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use ferry::middleware::{deadline::Timeout, trace::Trace};
//! use ferry::{handler_fn, BoxFuture, Context, Request, ResponseWriter, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ferry::Error> {
//!     Server::bind("0.0.0.0:3000")?
//!         .interceptor(Trace)
//!         .interceptor(Timeout::new(Duration::from_secs(1)))
//!         .serve(handler_fn(echo))
//!         .await
//! }
//!
//! fn echo<'a>(_: &'a Context, req: &'a Request, resw: &'a mut dyn ResponseWriter) -> BoxFuture<'a> {
//!     Box::pin(async move { resw.write(req.body()) })
//! }
//! ```

mod context;
mod error;
mod handler;
mod request;
mod response;
mod server;

pub mod behavior;
pub mod middleware;

pub use context::Context;
pub use error::{Error, Result};
pub use handler::{BoxFuture, BoxedHandler, Handler, HandlerFn, handler_fn};
pub use middleware::{Interceptor, NOP_INTERCEPTOR, NopInterceptor, apply_interceptor};
pub use request::{Request, RequestBuilder};
pub use response::{ResponseBuffer, ResponseWriter};
pub use server::Server;
