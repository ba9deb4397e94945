//! End-to-end: HTTP client → inbound → interceptors → handler.
//!
//! Outcomes are reported through `ferry::behavior`, the same way a
//! conformance client would, and the test fails if any entry failed.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use ferry::behavior::{BasicEntryBuilder, Behavior, BehaviorTester};
use ferry::middleware::trace::Trace;
use ferry::{
    BoxFuture, Context, Error, Handler, Interceptor, Request, ResponseWriter, Server, handler_fn,
};
use http::{HeaderMap, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};

/// Rejects calls without the shared token, tags the rest.
struct RequireToken;

impl Interceptor for RequireToken {
    fn handle<'a>(
        &'a self,
        ctx: &'a Context,
        req: &'a Request,
        resw: &'a mut dyn ResponseWriter,
        next: &'a dyn Handler,
    ) -> BoxFuture<'a> {
        Box::pin(async move {
            if req.header("token") != Some("secret") {
                return Err(Error::Rejected("missing token".into()));
            }
            let req = req.with_header("principal", "it");
            next.handle(ctx, &req, resw).await
        })
    }
}

fn rpc<'a>(_: &'a Context, req: &'a Request, resw: &'a mut dyn ResponseWriter) -> BoxFuture<'a> {
    Box::pin(async move {
        match req.procedure() {
            "echo" => {
                if let Some(principal) = req.header("principal") {
                    resw.add_header("principal", principal)?;
                }
                resw.write(req.body())
            }
            "missing" => {
                resw.set_application_error()?;
                resw.write(b"no such key")
            }
            "boom" => Err(Error::Unexpected("boom".into())),
            "sleep" => {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            }
            other => Err(Error::bad_request(format!("unknown procedure {other}"))),
        }
    })
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

async fn call(addr: SocketAddr, procedure: &str, extra: &[(&str, &str)], body: &'static str) -> Reply {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    tokio::spawn(conn);

    let mut req = http::Request::post("/")
        .header("rpc-caller", "it")
        .header("rpc-service", "kv")
        .header("rpc-procedure", procedure)
        .header("rpc-encoding", "raw");
    for (name, value) in extra {
        req = req.header(*name, *value);
    }
    let req = req.body(Full::new(Bytes::from_static(body.as_bytes()))).unwrap();

    let resp = sender.send_request(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    Reply { status, headers, body: String::from_utf8_lossy(&body).into_owned() }
}

fn expect(b: &mut Behavior<'_>, name: &str, reply: &Reply, status: StatusCode, body: &str) {
    if reply.status == status && reply.body == body {
        b.passf(format_args!("{name}: {status}"));
    } else {
        b.failf(format_args!(
            "{name}: expected {status} {body:?}, got {} {:?}",
            reply.status, reply.body
        ));
    }
}

#[tokio::test]
async fn interceptors_run_around_the_handler_over_http() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(
        Server::with_listener(listener)
            .interceptor(Trace)
            .interceptor(RequireToken)
            .timeout(Duration::from_secs(5))
            .serve_with_shutdown(handler_fn(rpc), async {
                let _ = stopped.await;
            }),
    );

    let mut tester = BehaviorTester::default();
    let mut b = tester.new_behavior(&BasicEntryBuilder);
    let token = [("rpc-header-token", "secret")];

    let reply = call(addr, "echo", &token, "ping").await;
    expect(&mut b, "echo", &reply, StatusCode::OK, "ping");
    if reply.headers.get("rpc-header-principal").is_some_and(|v| v == "it") {
        b.pass("replacement request reached the handler");
    } else {
        b.failf(format_args!("principal header missing: {:?}", reply.headers));
    }

    let reply = call(addr, "echo", &[], "ping").await;
    expect(&mut b, "no token", &reply, StatusCode::FORBIDDEN, "rejected: missing token");

    let reply = call(addr, "missing", &token, "").await;
    expect(&mut b, "application error", &reply, StatusCode::OK, "no such key");
    if reply.headers.get("rpc-status").is_some_and(|v| v == "error") {
        b.pass("application error flagged");
    } else {
        b.fail("rpc-status header missing");
    }

    let reply = call(addr, "boom", &token, "").await;
    expect(&mut b, "handler failure", &reply, StatusCode::INTERNAL_SERVER_ERROR, "unexpected error: boom");

    let slow = [("rpc-header-token", "secret"), ("context-ttl-ms", "50")];
    let reply = call(addr, "sleep", &slow, "").await;
    expect(&mut b, "ttl", &reply, StatusCode::GATEWAY_TIMEOUT, "deadline exceeded");

    let reply = call(addr, "", &token, "").await;
    expect(&mut b, "validation", &reply, StatusCode::BAD_REQUEST, "bad request: missing procedure");

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server drained")
        .unwrap()
        .unwrap();

    assert!(!tester.failed, "{:#?}", tester.entries);
    assert!(!tester.skipped);
    assert_eq!(tester.entries.len(), 8);
}
