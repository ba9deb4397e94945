//! Per-request deadlines.

use std::time::Duration;

use super::Interceptor;
use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxFuture, Handler};
use crate::request::Request;
use crate::response::ResponseWriter;

/// Bounds the rest of the chain by a timeout.
///
/// `next` runs under a context whose deadline is the earlier of the
/// caller's deadline and `now + timeout`. If that passes, or the context is
/// cancelled, the inner future is dropped and the call fails with
/// [`Error::DeadlineExceeded`] or [`Error::Cancelled`]. A context that is
/// already done on entry fails immediately without calling `next`.
#[derive(Clone, Copy, Debug)]
pub struct Timeout {
    timeout: Duration,
}

impl Timeout {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Interceptor for Timeout {
    fn handle<'a>(
        &'a self,
        ctx: &'a Context,
        req: &'a Request,
        resw: &'a mut dyn ResponseWriter,
        next: &'a dyn Handler,
    ) -> BoxFuture<'a> {
        Box::pin(async move {
            if let Some(err) = ctx.err() {
                return Err(err);
            }

            let ctx = ctx.with_timeout(self.timeout);
            tokio::select! {
                res = next.handle(&ctx, req, resw) => res,
                () = ctx.done() => Err(ctx.err().unwrap_or(Error::DeadlineExceeded)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::Instant;

    use super::*;
    use crate::handler::BoxedHandler;
    use crate::middleware::apply_interceptor;
    use crate::response::ResponseBuffer;

    /// Sleeps for `delay`, then records the deadline it saw.
    struct Slow {
        delay: Duration,
        started: AtomicUsize,
        finished: AtomicUsize,
        seen_deadline: std::sync::Mutex<Option<Instant>>,
    }

    impl Slow {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                started: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
                seen_deadline: std::sync::Mutex::new(None),
            })
        }
    }

    impl Handler for Slow {
        fn handle<'a>(
            &'a self,
            ctx: &'a Context,
            _req: &'a Request,
            resw: &'a mut dyn ResponseWriter,
        ) -> BoxFuture<'a> {
            Box::pin(async move {
                self.started.fetch_add(1, Ordering::SeqCst);
                *self.seen_deadline.lock().unwrap() = ctx.deadline();
                tokio::time::sleep(self.delay).await;
                self.finished.fetch_add(1, Ordering::SeqCst);
                resw.write(b"done")
            })
        }
    }

    fn with_timeout(slow: &Arc<Slow>, timeout: Duration) -> BoxedHandler {
        apply_interceptor(slow.clone(), Some(Arc::new(Timeout::new(timeout))))
    }

    #[tokio::test(start_paused = true)]
    async fn fast_handler_completes() {
        let slow = Slow::new(Duration::from_millis(10));
        let h = with_timeout(&slow, Duration::from_millis(50));
        let mut resw = ResponseBuffer::new();

        h.handle(&Context::new(), &Request::default(), &mut resw).await.unwrap();
        assert_eq!(resw.body(), b"done");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_is_cut_off() {
        let slow = Slow::new(Duration::from_secs(1));
        let h = with_timeout(&slow, Duration::from_millis(50));

        let err = h
            .handle(&Context::new(), &Request::default(), &mut ResponseBuffer::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded));
        assert_eq!(slow.started.load(Ordering::SeqCst), 1);
        assert_eq!(slow.finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tighter_upstream_deadline_wins() {
        let slow = Slow::new(Duration::from_millis(1));
        let h = with_timeout(&slow, Duration::from_secs(10));
        let ctx = Context::new().with_timeout(Duration::from_millis(20));

        h.handle(&ctx, &Request::default(), &mut ResponseBuffer::new()).await.unwrap();
        assert_eq!(*slow.seen_deadline.lock().unwrap(), ctx.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_timeout_runs_handler_to_completion() {
        let slow = Slow::new(Duration::from_secs(3600));
        let h = with_timeout(&slow, Duration::MAX);
        let mut resw = ResponseBuffer::new();

        h.handle(&Context::new(), &Request::default(), &mut resw).await.unwrap();
        assert_eq!(resw.body(), b"done");
        assert_eq!(*slow.seen_deadline.lock().unwrap(), None);

        let upstream = Context::new().with_timeout(Duration::from_millis(10));
        let err = with_timeout(&slow, Duration::MAX)
            .handle(&upstream, &Request::default(), &mut ResponseBuffer::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded));
        assert_eq!(*slow.seen_deadline.lock().unwrap(), upstream.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn done_context_never_reaches_handler() {
        let slow = Slow::new(Duration::ZERO);
        let h = with_timeout(&slow, Duration::from_secs(1));
        let ctx = Context::new();
        ctx.cancel();

        let err = h
            .handle(&ctx, &Request::default(), &mut ResponseBuffer::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(slow.started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_mid_flight_returns_promptly() {
        let slow = Slow::new(Duration::from_secs(30));
        let h = with_timeout(&slow, Duration::from_secs(60));
        let ctx = Context::new();

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            canceller.cancel();
        });

        let err = h
            .handle(&ctx, &Request::default(), &mut ResponseBuffer::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(slow.finished.load(Ordering::SeqCst), 0);
    }
}
