use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use gate_limit::Action;
use gate_limit::Gate;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use pin_project_lite::pin_project;
use tower::BoxError;
use tower::Service;
use tracing::debug;

use crate::error::GateError;
use crate::request::GateRequest;

#[derive(Clone, Debug)]
struct GateMetrics {
    forwarded: Counter<u64>,
    rejected: Counter<u64>,
}

impl GateMetrics {
    fn new() -> Self {
        let meter = global::meter("tower_gate");
        Self {
            forwarded: meter.u64_counter("gate.forwarded").build(),
            rejected: meter.u64_counter("gate.rejected").build(),
        }
    }
}

/// Runs the gate against a request descriptor and records the outcome.
#[derive(Clone, Debug)]
pub(crate) struct Admission {
    gate: Arc<Gate>,
    trust_forwarded_for: bool,
    instruments: GateMetrics,
}

impl Admission {
    pub(crate) fn new(gate: Arc<Gate>, trust_forwarded_for: bool) -> Self {
        Self {
            gate,
            trust_forwarded_for,
            instruments: GateMetrics::new(),
        }
    }

    pub(crate) fn gate(&self) -> &Arc<Gate> {
        &self.gate
    }

    pub(crate) fn trusts_forwarded_for(&self) -> bool {
        self.trust_forwarded_for
    }

    pub(crate) fn with_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    pub(crate) fn check<R: GateRequest + ?Sized>(&self, req: &R) -> Result<(), GateError> {
        let client = req.client_id(self.trust_forwarded_for);

        match self.gate.handle(&client, req.path()) {
            Action::Forward => {
                self.instruments.forwarded.add(1, &[]);
                Ok(())
            }
            Action::Reject { retry_after_secs } => {
                self.instruments.rejected.add(1, &[]);
                debug!(%client, path = req.path(), retry_after_secs, "limit exceeded");
                Err(GateError::LimitExceeded { retry_after_secs })
            }
        }
    }
}

/// Gates requests before they reach the inner service.
///
/// Readiness is the inner service's readiness. The decision is taken in
/// `call`, because it depends on the request: forwarded requests reach the
/// inner service untouched, rejected ones resolve to
/// [`GateError::LimitExceeded`] without it ever seeing them.
#[derive(Clone, Debug)]
pub struct GateService<S> {
    inner: S,
    admission: Admission,
}

pin_project! {
    /// Either the inner service's future or an immediate rejection.
    #[project = ResponseFutureProj]
    pub enum ResponseFuture<F> {
        Forwarded {
            #[pin]
            inner: F,
        },
        Rejected {
            error: GateError,
        },
    }
}

impl<F, T, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<T, E>>,
    E: From<BoxError>,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            ResponseFutureProj::Forwarded { inner } => inner.poll(cx),
            ResponseFutureProj::Rejected { error } => {
                Poll::Ready(Err(E::from(Box::new(error.clone()))))
            }
        }
    }
}

impl<S, Req> Service<Req> for GateService<S>
where
    S: Service<Req, Error = BoxError>,
    Req: GateRequest,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        match self.admission.check(&req) {
            Ok(()) => ResponseFuture::Forwarded {
                inner: self.inner.call(req),
            },
            Err(error) => ResponseFuture::Rejected { error },
        }
    }
}

impl<S> GateService<S> {
    /// Wrap `inner`, identifying clients by their peer address only.
    pub fn new(inner: S, gate: Arc<Gate>) -> Self {
        Self {
            inner,
            admission: Admission::new(gate, false),
        }
    }

    pub(crate) fn from_admission(inner: S, admission: Admission) -> Self {
        Self { inner, admission }
    }

    /// Trust the first `X-Forwarded-For` entry over the peer address.
    ///
    /// Only enable this behind a proxy that sets the header itself.
    pub fn with_forwarded_for(mut self, trust: bool) -> Self {
        self.admission = self.admission.with_forwarded_for(trust);
        self
    }

    pub fn gate(&self) -> &Arc<Gate> {
        self.admission.gate()
    }
}
