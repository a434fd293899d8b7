use tower::ServiceBuilder;
use tower::layer::util::Stack;

use crate::GateLayer;

/// Service Builder Extension with additional useful functions for tower::ServiceBuilder.
pub trait ServiceBuilderExt<L> {
    /// Add a limiter gate layer
    fn rate_gate(self, layer: GateLayer) -> ServiceBuilder<Stack<GateLayer, L>>;
}

impl<L> ServiceBuilderExt<L> for ServiceBuilder<L> {
    fn rate_gate(self, layer: GateLayer) -> ServiceBuilder<Stack<GateLayer, L>> {
        self.layer(layer)
    }
}
