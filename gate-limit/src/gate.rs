use std::fmt::Debug;
use std::fmt::Display;
use std::hash::Hash;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use quanta::Clock;
use tracing::debug;
use tracing::info;

use crate::config::ConfigError;
use crate::config::LimiterConfig;
use crate::registry::ClientRecord;
use crate::registry::Registry;
use crate::route::GlobMatcher;
use crate::route::RouteFilter;
use crate::route::RouteMatcher;

/// Identity used to partition limiter state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClientId {
    /// The originating network address.
    Ip(IpAddr),
    /// No usable address. Every such request shares this one bucket.
    Unknown,
}

impl From<IpAddr> for ClientId {
    fn from(ip: IpAddr) -> Self {
        Self::Ip(ip)
    }
}

impl From<Option<IpAddr>> for ClientId {
    fn from(ip: Option<IpAddr>) -> Self {
        ip.map_or(Self::Unknown, Self::Ip)
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ip(ip) => Display::fmt(ip, f),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Outcome of [`Gate::handle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Pass the request to the next stage.
    Forward,
    /// Refuse the request. The client may retry after this many seconds.
    Reject { retry_after_secs: u64 },
}

impl Action {
    pub fn is_forward(&self) -> bool {
        matches!(self, Self::Forward)
    }

    pub fn is_reject(&self) -> bool {
        !self.is_forward()
    }
}

/// The limiter gate.
///
/// Holds the configuration, the route filter and the per-client registry.
/// The registry is created empty with the gate and lives exactly as long as
/// it does. Share a gate between tasks with `Arc`.
pub struct Gate<K = ClientId>
where
    K: Eq + Hash,
{
    config: LimiterConfig,
    window: Duration,
    filter: RouteFilter,
    registry: Registry<K>,
    clock: Clock,
}

impl<K> Debug for Gate<K>
where
    K: Eq + Hash + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("config", &self.config)
            .field("tracked_clients", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl<K> Gate<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Build a gate using the [`GlobMatcher`] for route patterns.
    ///
    /// Every allow and deny pattern is compiled here, so an invalid one
    /// fails construction.
    pub fn new(config: LimiterConfig) -> Result<Self, ConfigError> {
        Self::build(config, None, Clock::new())
    }

    /// Build a gate with a custom route matcher.
    pub fn with_matcher(
        config: LimiterConfig,
        matcher: Arc<dyn RouteMatcher>,
    ) -> Result<Self, ConfigError> {
        Self::build(config, Some(matcher), Clock::new())
    }

    /// Build a gate reading time from `clock`.
    pub fn with_clock(config: LimiterConfig, clock: Clock) -> Result<Self, ConfigError> {
        Self::build(config, None, clock)
    }

    fn build(
        config: LimiterConfig,
        matcher: Option<Arc<dyn RouteMatcher>>,
        clock: Clock,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let matcher = match matcher {
            Some(matcher) => matcher,
            None => Arc::new(GlobMatcher::compile(
                config
                    .allow_list
                    .iter()
                    .chain(&config.deny_list)
                    .map(String::as_str),
            )?),
        };
        info!(
            window_ms = config.window_ms,
            max_requests = config.max_requests,
            allow = ?config.allow_list,
            deny = ?config.deny_list,
            "limiter gate configured"
        );
        Ok(Self {
            window: config.window(),
            filter: RouteFilter::new(
                config.allow_list.clone(),
                config.deny_list.clone(),
                matcher,
            ),
            registry: Registry::default(),
            config,
            clock,
        })
    }

    /// Decide whether a request from `client` for `path` may proceed.
    ///
    /// Unlimited paths never touch the registry. For limited paths the
    /// first request of a client, and the first after its window expired,
    /// are forwarded without being counted. Each later forwarded request
    /// costs one unit and re-anchors the window at the current instant.
    pub fn handle(&self, client: &K, path: &str) -> Action {
        if !self.filter.is_limited(path) {
            return Action::Forward;
        }

        let now = self.clock.now();
        let max_requests = self.config.max_requests;
        let window = self.window;

        let action = self.registry.update(client, |current| match current {
            None => (Some(ClientRecord::fresh(max_requests, now)), Action::Forward),
            Some(record) if record.is_within(now, window) => {
                if record.remaining > 1 {
                    let next = ClientRecord {
                        remaining: record.remaining - 1,
                        window_start: now,
                    };
                    (Some(next), Action::Forward)
                } else {
                    let elapsed = now.saturating_duration_since(record.window_start);
                    let retry_after_secs = retry_after_secs(window, elapsed);
                    (None, Action::Reject { retry_after_secs })
                }
            }
            Some(_) => (Some(ClientRecord::fresh(max_requests, now)), Action::Forward),
        });

        match action {
            Action::Forward => debug!(?client, path, "request forwarded"),
            Action::Reject { retry_after_secs } => {
                debug!(?client, path, retry_after_secs, "request rejected")
            }
        }
        action
    }

    /// Whether requests for `path` are subject to limiting.
    pub fn is_limited(&self, path: &str) -> bool {
        self.filter.is_limited(path)
    }

    /// Snapshot of a client's record, if it has one.
    pub fn record(&self, client: &K) -> Option<ClientRecord> {
        self.registry.get(client)
    }

    pub fn tracked_clients(&self) -> usize {
        self.registry.len()
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Drop every record whose window has already expired and return how
    /// many were removed.
    ///
    /// The gate never calls this on its own. A dropped client is treated
    /// exactly like an expired one on its next request.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let window = self.window;
        let before = self.registry.len();
        self.registry
            .retain(|_, record| record.is_within(now, window));
        let removed = before.saturating_sub(self.registry.len());
        debug!(removed, "expired client records purged");
        removed
    }
}

/// Whole seconds until the window closes, rounded half up.
fn retry_after_secs(window: Duration, elapsed: Duration) -> u64 {
    let left_ms = u64::try_from(window.saturating_sub(elapsed).as_millis()).unwrap_or(u64::MAX);
    left_ms / 1000 + u64::from(left_ms % 1000 >= 500)
}
