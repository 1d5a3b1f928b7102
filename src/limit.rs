//! Token buckets and the three-tier rate-limit gate.
//!
//! Every request passes up to three gates, in this order:
//!
//! | Tier | Keyed by | When |
//! |---|---|---|
//! | **Global** | nothing | before routing |
//! | **Client** | client identifier | before routing |
//! | **Route** | client identifier, per route | after routing, before the body is read |
//!
//! Keyed tiers need a [`ClientIdentifier`]. A keyed limit configured without
//! one is logged and skipped: the request goes through unthrottled.
//!
//! Client buckets are created on first sighting and kept for the life of the
//! [`Gate`] (or the route) that owns them. They are never re-templated.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use dashmap::DashMap;
use http::request::Parts;
use serde::Deserialize;
use tracing::{debug, warn};

/// Maps a request head to the string used as its rate-limit partition key.
pub type ClientIdentifier = Arc<dyn Fn(&Parts) -> String + Send + Sync + 'static>;

// ── RateLimit ─────────────────────────────────────────────────────────────────

/// A bucket template: refill `rate` tokens per second, hold at most `burst`.
///
/// ```rust
/// use plume::RateLimit;
///
/// let limit: RateLimit = serde_json::from_str(r#"{"rate": 5.0, "burst": 10}"#).unwrap();
/// assert_eq!(limit, RateLimit::per_second(5.0, 10));
/// ```
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct RateLimit {
    pub rate: f64,
    pub burst: u32,
}

impl RateLimit {
    pub fn per_second(rate: f64, burst: u32) -> Self {
        Self { rate, burst }
    }

    /// A limit that never denies.
    pub fn unlimited() -> Self {
        Self { rate: f64::INFINITY, burst: 0 }
    }

    /// A fresh, full bucket with this template's rate and burst.
    pub fn bucket(&self) -> TokenBucket {
        TokenBucket::new(self.rate, self.burst)
    }
}

/// Optional templates for the two app-level tiers, loadable with serde.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    pub global: Option<RateLimit>,
    pub client: Option<RateLimit>,
}

// ── TokenBucket ───────────────────────────────────────────────────────────────

/// A thread-safe token bucket.
///
/// Starts full. Each [`allow`](TokenBucket::allow) refills by the time elapsed
/// since the previous call, then takes one token if one is available.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    burst: u32,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last: Instant,
}

impl TokenBucket {
    pub fn new(rate: f64, burst: u32) -> Self {
        Self {
            rate,
            burst,
            state: Mutex::new(BucketState { tokens: f64::from(burst), last: Instant::now() }),
        }
    }

    pub fn rate(&self) -> f64 { self.rate }
    pub fn burst(&self) -> u32 { self.burst }

    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// [`allow`](TokenBucket::allow) with an explicit clock reading.
    pub fn allow_at(&self, now: Instant) -> bool {
        if self.rate == f64::INFINITY {
            return true;
        }

        // A poisoned lock only means another thread panicked mid-update; the
        // counters are still usable.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let elapsed = now.saturating_duration_since(state.last).as_secs_f64();
        if self.rate > 0.0 && elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * self.rate).min(f64::from(self.burst));
        }
        if now > state.last {
            state.last = now;
        }

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

// ── ClientBuckets ─────────────────────────────────────────────────────────────

/// One bucket per client id, cloned from a template on first sighting.
#[derive(Debug)]
pub struct ClientBuckets {
    template: RateLimit,
    buckets: DashMap<String, TokenBucket>,
}

impl ClientBuckets {
    pub fn new(template: RateLimit) -> Self {
        Self { template, buckets: DashMap::new() }
    }

    pub fn template(&self) -> RateLimit { self.template }

    /// Number of distinct clients seen so far.
    pub fn len(&self) -> usize { self.buckets.len() }

    pub fn is_empty(&self) -> bool { self.buckets.is_empty() }

    pub fn allow(&self, client: &str) -> bool {
        if let Some(bucket) = self.buckets.get(client) {
            return bucket.allow();
        }
        // `entry` holds the shard's write lock, so two first sightings of the
        // same id end up sharing one bucket.
        self.buckets
            .entry(client.to_owned())
            .or_insert_with(|| self.template.bucket())
            .allow()
    }
}

// ── Gate ──────────────────────────────────────────────────────────────────────

/// The tier that rejected a request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Tier {
    Global,
    Client,
    Route,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Global => "global",
            Self::Client => "client",
            Self::Route  => "route",
        })
    }
}

/// Rate-limit state owned by one [`App`](crate::App).
#[derive(Default)]
pub struct Gate {
    global: Option<TokenBucket>,
    clients: Option<ClientBuckets>,
    identify: Option<ClientIdentifier>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_global(&mut self, limit: RateLimit) {
        self.global = Some(limit.bucket());
    }

    pub(crate) fn set_client(&mut self, limit: RateLimit) {
        self.clients = Some(ClientBuckets::new(limit));
    }

    pub(crate) fn set_identifier(&mut self, identify: ClientIdentifier) {
        self.identify = Some(identify);
    }

    pub fn has_identifier(&self) -> bool {
        self.identify.is_some()
    }

    /// Global then client tier. Runs before routing.
    pub fn check(&self, parts: &Parts) -> Result<(), Tier> {
        if let Some(global) = &self.global {
            if !global.allow() {
                debug!(tier = %Tier::Global, "rate limited");
                return Err(Tier::Global);
            }
        }

        let Some(clients) = &self.clients else { return Ok(()) };
        match &self.identify {
            Some(identify) => {
                let client = identify(parts);
                if clients.allow(&client) {
                    Ok(())
                } else {
                    debug!(tier = %Tier::Client, %client, "rate limited");
                    Err(Tier::Client)
                }
            }
            None => {
                warn!("client limit set but no client identifier; limit not enforced");
                Ok(())
            }
        }
    }

    /// Route tier, against the matched route's own buckets.
    pub fn check_route(
        &self,
        pattern: &str,
        buckets: Option<&ClientBuckets>,
        parts: &Parts,
    ) -> Result<(), Tier> {
        let Some(buckets) = buckets else { return Ok(()) };
        let Some(identify) = &self.identify else {
            warn!(route = pattern, "route limit set but no client identifier; limit not enforced");
            return Ok(());
        };

        let client = identify(parts);
        if buckets.allow(&client) {
            Ok(())
        } else {
            debug!(tier = %Tier::Route, route = pattern, %client, "rate limited");
            Err(Tier::Route)
        }
    }
}

// ── Client identifiers ────────────────────────────────────────────────────────

/// Peer address of the connection a request arrived on.
///
/// [`Server`](crate::Server) stores it in the request extensions; embedders
/// with their own transport can do the same.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RemoteAddr(pub SocketAddr);

/// Client identifier keyed by the peer IP. Requests without a recorded
/// [`RemoteAddr`] all share the `"unknown"` bucket.
pub fn remote_ip(parts: &Parts) -> String {
    parts
        .extensions
        .get::<RemoteAddr>()
        .map(|addr| addr.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}
