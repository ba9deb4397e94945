//! HTTP inbound and graceful shutdown.
//!
//! The inbound decodes each POST into a [`Request`], runs it through one
//! composed handler and encodes whatever the handler wrote back onto the
//! wire. The handler and the server's interceptors are composed once, when
//! serving starts; every request then reuses the same `Arc`.
//!
//! # Wire mapping
//!
//! | HTTP | RPC |
//! |---|---|
//! | `Rpc-Caller`, `Rpc-Service`, `Rpc-Procedure`, `Rpc-Encoding` | request metadata |
//! | `Context-TTL-MS` | context deadline, relative to arrival |
//! | `Rpc-Header-<name>` | application header `<name>`, both directions |
//! | `Rpc-Status: error` | the handler flagged an application error |
//!
//! A handler error becomes a non-200 status (see [`Error::status_code`])
//! with the error text as a plain-text body.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the accept loop stops, in-flight connections run to
//! completion, and [`Server::serve`] returns.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{Chain, Interceptor, apply_interceptor};
use crate::request::Request;
use crate::response::ResponseBuffer;

const CALLER: &str = "rpc-caller";
const SERVICE: &str = "rpc-service";
const PROCEDURE: &str = "rpc-procedure";
const ENCODING: &str = "rpc-encoding";
const TTL_MS: &str = "context-ttl-ms";
const STATUS: &str = "rpc-status";
const APP_HEADER_PREFIX: &str = "rpc-header-";

type HttpResponse = http::Response<Full<Bytes>>;

enum Bind {
    Addr(SocketAddr),
    Listener(TcpListener),
}

/// The HTTP inbound.
pub struct Server {
    bind: Bind,
    chain: Chain,
    default_ttl: Option<Duration>,
}

impl Server {
    /// Configures the server to bind to `addr` when serving starts.
    ///
    /// ```rust,no_run
    /// use ferry::Server;
    /// let server = Server::bind("0.0.0.0:3000")?;
    /// # Ok::<(), ferry::Error>(())
    /// ```
    pub fn bind(addr: &str) -> Result<Self> {
        let addr = addr
            .parse()
            .map_err(|_| Error::InvalidAddress(addr.to_owned()))?;
        Ok(Self::with_bind(Bind::Addr(addr)))
    }

    /// Serves on an already bound listener.
    pub fn with_listener(listener: TcpListener) -> Self {
        Self::with_bind(Bind::Listener(listener))
    }

    fn with_bind(bind: Bind) -> Self {
        Self { bind, chain: Chain::default(), default_ttl: None }
    }

    /// Adds an interceptor. The first one added is the outermost.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.chain.push(Arc::new(interceptor));
        self
    }

    /// Deadline applied to requests that arrive without `Context-TTL-MS`.
    pub fn timeout(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Serves `handler` until SIGTERM or Ctrl-C, then drains.
    pub async fn serve(self, handler: impl Handler + 'static) -> Result<()> {
        self.serve_with_shutdown(handler, shutdown_signal()).await
    }

    /// Serves `handler` until `signal` resolves, then drains.
    pub async fn serve_with_shutdown(
        self,
        handler: impl Handler + 'static,
        signal: impl Future<Output = ()>,
    ) -> Result<()> {
        let listener = match self.bind {
            Bind::Addr(addr) => TcpListener::bind(addr).await?,
            Bind::Listener(listener) => listener,
        };
        let addr = listener.local_addr()?;

        let inbound = Arc::new(Inbound {
            handler: apply_interceptor(Arc::new(handler), self.chain.into_interceptor()),
            default_ttl: self.default_ttl,
        });

        info!(%addr, "ferry listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Shutdown is checked first so a signal stops accepting even
                // while connections are still queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let inbound = Arc::clone(&inbound);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // One call per request on the connection.
                        let svc = service_fn(move |req| {
                            let inbound = Arc::clone(&inbound);
                            async move { Ok::<_, Infallible>(inbound.dispatch(req).await) }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(%peer, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connections so the set stays bounded.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("ferry stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

struct Inbound {
    handler: BoxedHandler,
    default_ttl: Option<Duration>,
}

impl Inbound {
    /// Hot path: one HTTP request in, one HTTP response out. Every failure is
    /// turned into a response here, so hyper never sees an error.
    async fn dispatch(&self, req: hyper::Request<hyper::body::Incoming>) -> HttpResponse {
        if req.method() != Method::POST {
            return plain(StatusCode::METHOD_NOT_ALLOWED, "only POST is supported");
        }

        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => return plain(StatusCode::BAD_REQUEST, format!("reading body: {e}")),
        };

        let (request, ctx) = match self.decode(&parts.headers, body) {
            Ok(decoded) => decoded,
            Err(e) => return error_response(&e),
        };
        // Anything the handler spawned with a clone of `ctx` sees the call end.
        let _cancel_on_exit = ctx.drop_guard();

        let mut resw = ResponseBuffer::new();
        let res = tokio::select! {
            res = self.handler.handle(&ctx, &request, &mut resw) => res,
            () = ctx.done() => Err(ctx.err().unwrap_or(Error::DeadlineExceeded)),
        };

        match res.and_then(|()| resw.finalize()) {
            Ok(()) => {
                debug!(procedure = request.procedure(), bytes = resw.body().len(), "handled");
                encode(resw)
            }
            Err(e) => {
                warn!(procedure = request.procedure(), caller = request.caller(), error = %e, "request failed");
                error_response(&e)
            }
        }
    }

    fn decode(&self, headers: &HeaderMap, body: Bytes) -> Result<(Request, Context)> {
        let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("");

        let mut builder = Request::builder(get(SERVICE), get(PROCEDURE))
            .caller(get(CALLER))
            .encoding(get(ENCODING))
            .body(body);
        for (name, value) in headers {
            if let Some(key) = name.as_str().strip_prefix(APP_HEADER_PREFIX) {
                let value = value
                    .to_str()
                    .map_err(|_| Error::bad_request(format!("header `{name}` is not valid UTF-8")))?;
                builder = builder.header(key, value);
            }
        }
        let request = builder.build();
        request.validate()?;

        let ttl = match headers.get(TTL_MS) {
            None => self.default_ttl,
            Some(v) => {
                let ms = v
                    .to_str()
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .ok_or_else(|| Error::bad_request(format!("invalid `{TTL_MS}` header")))?;
                Some(Duration::from_millis(ms))
            }
        };

        let ctx = match ttl {
            Some(ttl) => Context::new().with_timeout(ttl),
            None => Context::new(),
        };
        Ok((request, ctx))
    }
}

fn encode(resw: ResponseBuffer) -> HttpResponse {
    let application_error = resw.is_application_error();
    let (headers, body) = resw.into_parts();

    let mut builder = http::Response::builder().status(StatusCode::OK);
    for (name, value) in headers {
        builder = builder.header(format!("{APP_HEADER_PREFIX}{name}"), value);
    }
    if application_error {
        builder = builder.header(STATUS, "error");
    }

    builder.body(Full::new(body)).unwrap_or_else(|e| {
        error!("encoding response: {e}");
        plain(StatusCode::INTERNAL_SERVER_ERROR, format!("invalid response header: {e}"))
    })
}

fn error_response(e: &Error) -> HttpResponse {
    plain(e.status_code(), e.to_string())
}

fn plain(status: StatusCode, body: impl Into<Bytes>) -> HttpResponse {
    let mut resp = http::Response::new(Full::new(body.into()));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    resp
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on SIGTERM (Kubernetes, systemd) or Ctrl-C. If a handler cannot
/// be installed the error is logged and that signal is ignored.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
