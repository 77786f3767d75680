use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use http::{Request, Response, StatusCode};
use http_body::Body;
use pin_project::pin_project;
use tokio::sync::Notify;
use tower::{Layer, Service};

/// Shared shutdown flag plus a count of in-flight work.
///
/// Work is either an HTTP request passing through [`GracefulShutdownLayer`]
/// or a background dashboard trigger holding an [`InFlightGuard`].
#[derive(Clone, Default)]
pub struct ShutdownState {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    is_shutting_down: AtomicBool,
    in_flight_count: AtomicUsize,
    idle: Notify,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that shutdown has started
    pub fn start_shutdown(&self) {
        self.inner.is_shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.is_shutting_down.load(Ordering::SeqCst)
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight_count.load(Ordering::SeqCst)
    }

    /// Count a unit of work until the returned guard is dropped.
    pub fn track(&self) -> InFlightGuard {
        self.inner.in_flight_count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            state: self.clone(),
        }
    }

    /// Resolves once no tracked work remains.
    pub fn completed(&self) -> impl Future<Output = ()> + Send + 'static {
        let state = self.clone();
        async move { state.wait_idle().await }
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight_count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Keeps its unit of work counted as in flight while alive.
pub struct InFlightGuard {
    state: ShutdownState,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let previous = self
            .state
            .inner
            .in_flight_count
            .fetch_sub(1, Ordering::SeqCst);
        if previous == 1 {
            self.state.inner.idle.notify_waiters();
        }
    }
}

/// Tower layer that rejects requests with 503 once shutdown has started
#[derive(Clone)]
pub struct GracefulShutdownLayer {
    state: ShutdownState,
}

impl GracefulShutdownLayer {
    pub fn new(state: ShutdownState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for GracefulShutdownLayer {
    type Service = GracefulShutdownService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GracefulShutdownService {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct GracefulShutdownService<S> {
    inner: S,
    state: ShutdownState,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for GracefulShutdownService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    ResBody: Body + Default,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = GracefulShutdownFuture<S::Future, ResBody, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        if self.state.is_shutting_down() {
            let response = Response::builder()
                .status(StatusCode::SERVICE_UNAVAILABLE)
                .body(ResBody::default())
                .expect("building empty response should not fail");

            return GracefulShutdownFuture {
                kind: FutureKind::Immediate(Some(Ok(response))),
                guard: None,
            };
        }

        let guard = self.state.track();
        GracefulShutdownFuture {
            kind: FutureKind::Inner(self.inner.call(req)),
            guard: Some(guard),
        }
    }
}

#[pin_project]
pub struct GracefulShutdownFuture<F, B, E> {
    #[pin]
    kind: FutureKind<F, B, E>,
    guard: Option<InFlightGuard>,
}

#[pin_project(project = FutureKindProj)]
enum FutureKind<F, B, E> {
    Inner(#[pin] F),
    Immediate(Option<Result<Response<B>, E>>),
}

impl<F, B, E> Future for GracefulShutdownFuture<F, B, E>
where
    F: Future<Output = Result<Response<B>, E>>,
    B: Body,
{
    type Output = Result<Response<B>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match this.kind.project() {
            FutureKindProj::Inner(fut) => {
                let result = fut.poll(cx);
                if result.is_ready() {
                    this.guard.take();
                }
                result
            }
            FutureKindProj::Immediate(response) => Poll::Ready(
                response
                    .take()
                    .expect("immediate response polled after completion"),
            ),
        }
    }
}
