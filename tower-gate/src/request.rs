use std::net::IpAddr;
use std::net::SocketAddr;

use gate_limit::ClientId;

/// Header consulted when forwarded identities are trusted.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// What the gate needs to know about an inbound request.
pub trait GateRequest {
    /// The path that route patterns are matched against.
    fn path(&self) -> &str;

    /// Network address of the directly connected peer.
    fn peer_addr(&self) -> Option<IpAddr>;

    /// Client address reported by a reverse proxy, if any.
    fn forwarded_for(&self) -> Option<IpAddr> {
        None
    }

    /// Resolve the identity the gate partitions state by.
    ///
    /// Falls back to [`ClientId::Unknown`] when no address is available.
    fn client_id(&self, trust_forwarded_for: bool) -> ClientId {
        let forwarded = trust_forwarded_for
            .then(|| self.forwarded_for())
            .flatten();
        ClientId::from(forwarded.or_else(|| self.peer_addr()))
    }
}

impl<B> GateRequest for http::Request<B> {
    fn path(&self) -> &str {
        self.uri().path()
    }

    fn peer_addr(&self) -> Option<IpAddr> {
        connect_info(self).or_else(|| self.extensions().get::<SocketAddr>().map(|addr| addr.ip()))
    }

    fn forwarded_for(&self) -> Option<IpAddr> {
        let value = self.headers().get(X_FORWARDED_FOR)?.to_str().ok()?;
        value.split(',').next()?.trim().parse().ok()
    }
}

// Set by `into_make_service_with_connect_info`
#[cfg(feature = "axum")]
fn connect_info<B>(req: &http::Request<B>) -> Option<IpAddr> {
    req.extensions()
        .get::<axum::extract::ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
}

#[cfg(not(feature = "axum"))]
fn connect_info<B>(_req: &http::Request<B>) -> Option<IpAddr> {
    None
}
