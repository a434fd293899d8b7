use std::sync::Arc;

use gate_limit::ConfigError;
use gate_limit::Gate;
use gate_limit::LimiterConfig;
use tower::Layer;

use crate::error::GateError;
use crate::request::GateRequest;
use crate::service::Admission;
use crate::service::GateService;

/// Applies the limiter gate to requests.
///
/// Every service produced by this layer, and by its clones, shares one
/// [`Gate`] and therefore one registry of client records.
#[derive(Clone, Debug)]
pub struct GateLayer {
    admission: Admission,
}

impl GateLayer {
    /// Create a GateLayer from a configuration, failing on invalid settings.
    pub fn new(config: LimiterConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_gate(Arc::new(Gate::new(config)?)))
    }

    /// Create a GateLayer around an existing gate.
    pub fn from_gate(gate: Arc<Gate>) -> Self {
        GateLayer {
            admission: Admission::new(gate, false),
        }
    }

    /// Set whether the `X-Forwarded-For` header identifies the client.
    ///
    /// If `false` (the default), only the directly connected peer address
    /// is used.
    pub fn with_forwarded_for(mut self, trust: bool) -> Self {
        self.admission = self.admission.with_forwarded_for(trust);
        self
    }

    pub fn trusts_forwarded_for(&self) -> bool {
        self.admission.trusts_forwarded_for()
    }

    pub fn gate(&self) -> &Arc<Gate> {
        self.admission.gate()
    }

    /// Run the gate against a single request without a wrapped service.
    pub fn check<R: GateRequest + ?Sized>(&self, req: &R) -> Result<(), GateError> {
        self.admission.check(req)
    }
}

impl<S> Layer<S> for GateLayer {
    type Service = GateService<S>;

    fn layer(&self, service: S) -> Self::Service {
        GateService::from_admission(service, self.admission.clone())
    }
}
