//! # gate-limit
//!
//! `gate-limit` decides, request by request, whether a client may reach a
//! route.
//!
//! ## Core Model
//!
//! A [`Gate`] is configured with a window, a ceiling and two route pattern
//! lists. Only paths matching a deny pattern (and no allow pattern) are
//! limited; everything else is forwarded without touching any state. For
//! limited paths each client owns a [`ClientRecord`] holding the requests it
//! has left and the instant its window was last anchored.
//!
//! ## Key Concepts
//!
//! * **Free first request**: A client's first request, and its first after a
//!   window expires, is forwarded without being charged.
//! * **Sliding anchor**: Every forwarded request moves the window start to
//!   "now", so the window is measured from the last accepted request.
//! * **Per-client serialization**: The check-and-update for one client runs
//!   under that client's entry lock; different clients do not contend.
//! * **Pluggable matching**: Route patterns are interpreted by a
//!   [`RouteMatcher`]; [`GlobMatcher`] is the default.
//!
//! ## Known Limitation
//!
//! Records are never evicted automatically. A gate that sees many distinct
//! clients grows without bound unless the owner calls
//! [`Gate::purge_expired`].
//!
//! ## Example
//!
//! ```rust
//! use gate_limit::Action;
//! use gate_limit::ClientId;
//! use gate_limit::Gate;
//! use gate_limit::LimiterConfig;
//! use std::net::IpAddr;
//! use std::time::Duration;
//!
//! let config = LimiterConfig::default()
//!     .with_window(Duration::from_secs(60))
//!     .with_max_requests(5)
//!     .deny("/api/*");
//! let gate = Gate::new(config).unwrap();
//!
//! let client = ClientId::from(IpAddr::from([127, 0, 0, 1]));
//! if gate.handle(&client, "/api/users") == Action::Forward {
//!     // Request allowed
//! }
//! ```

mod config;
mod gate;
mod registry;
mod route;

pub use config::ConfigError;
pub use config::LimiterConfig;
pub use gate::Action;
pub use gate::ClientId;
pub use gate::Gate;
pub use registry::ClientRecord;
pub use registry::Registry;
pub use route::GlobMatcher;
pub use route::RouteFilter;
pub use route::RouteMatcher;
