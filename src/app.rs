//! The dispatcher: one inbound request in, one well-formed response out.
//!
//! # Lifecycle
//!
//! ```text
//! global + client limit ─429─▶ (done, no terminate)
//!        │
//!   route match ─404─▶ terminate(app) with no request
//!        │
//!   route limit ─429─▶ (done, no terminate)
//!        │
//!   read body ─500─▶ ┐
//!   decode    ─400─▶ ┴▶ terminate(route, app) with no request
//!        │
//!   before(app, route) → handler → after(route, app)
//!        │
//!   redirect? ── yes ─▶ status + Location
//!        │ no
//!   encode (with fallback) → write → terminate(route, app)
//! ```
//!
//! Nothing that goes wrong in here reaches the transport as an error.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use http::header::{CONTENT_TYPE, LOCATION};
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Body;
use serde_json::Value;
use tracing::{debug, warn};

use crate::body::DispatchBody;
use crate::error::Rejection;
use crate::limit::{Gate, LimitsConfig, RateLimit};
use crate::middleware::{BoxedMiddleware, Middleware, run_after, run_before};
use crate::negotiate::{Encoded, Negotiator};
use crate::request::{Request, decode_path};
use crate::response::Response;
use crate::router::Router;
use crate::serializer::Serializer;

/// An application: routes plus app-wide middleware, serializer and limits.
///
/// ```rust,no_run
/// use plume::{App, RateLimit, Router, Request, Response, limit};
/// use plume::middleware::AccessLog;
/// # async fn show(_: Request) -> Response { Response::status(http::StatusCode::OK) }
///
/// let app = App::new(Router::new().get("/users/{id}", show))
///     .middleware(AccessLog)
///     .global_limit(RateLimit::per_second(1000.0, 2000))
///     .client_limit(RateLimit::per_second(10.0, 20))
///     .client_identifier(limit::remote_ip);
/// ```
pub struct App {
    router: Router,
    middleware: Vec<BoxedMiddleware>,
    serializer: Option<Arc<Serializer>>,
    default_serializer: Arc<Serializer>,
    gate: Gate,
}

impl App {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            middleware: Vec::new(),
            serializer: None,
            default_serializer: Serializer::default_shared(),
            gate: Gate::new(),
        }
    }

    /// Appends app-level middleware.
    pub fn middleware(mut self, mw: impl Middleware) -> Self {
        self.middleware.push(Arc::new(mw));
        self
    }

    /// App-wide serializer, used when neither the response nor the route
    /// picks one. Also encodes error payloads.
    pub fn serializer(mut self, serializer: impl Into<Arc<Serializer>>) -> Self {
        self.serializer = Some(serializer.into());
        self
    }

    /// One bucket shared by every request.
    pub fn global_limit(mut self, limit: RateLimit) -> Self {
        self.gate.set_global(limit);
        self
    }

    /// One bucket per client; needs [`client_identifier`](App::client_identifier).
    pub fn client_limit(mut self, limit: RateLimit) -> Self {
        self.gate.set_client(limit);
        self
    }

    pub fn client_identifier(
        mut self,
        identify: impl Fn(&Parts) -> String + Send + Sync + 'static,
    ) -> Self {
        self.gate.set_identifier(Arc::new(identify));
        self
    }

    /// Applies whichever templates `config` sets.
    pub fn limits(mut self, config: LimitsConfig) -> Self {
        if let Some(global) = config.global {
            self.gate.set_global(global);
        }
        if let Some(client) = config.client {
            self.gate.set_client(client);
        }
        self
    }

    pub fn router(&self) -> &Router { &self.router }
    pub fn gate(&self) -> &Gate { &self.gate }

    /// Runs one request through the full pipeline.
    ///
    /// `terminate` middleware runs once the returned body has been written
    /// (polled to its end) or dropped.
    pub async fn dispatch<B>(&self, req: http::Request<B>) -> http::Response<DispatchBody>
    where
        B: Body,
        B::Error: fmt::Display,
    {
        let received_at = Instant::now();
        let (parts, body) = req.into_parts();

        if let Err(tier) = self.gate.check(&parts) {
            return bare(Rejection::RateLimited(tier).status());
        }

        let path = decode_path(parts.uri.path());
        let Some((route, params)) = self.router.match_route(parts.method.as_str(), &path) else {
            debug!(method = %parts.method, %path, "no route");
            let res = Response::new(StatusCode::NOT_FOUND, Value::Null);
            return bare(StatusCode::NOT_FOUND)
                .map(|body| body.on_complete(self.middleware.clone(), None, res));
        };

        if let Err(tier) = self.gate.check_route(route.pattern(), route.client_buckets(), &parts) {
            return bare(Rejection::RateLimited(tier).status());
        }

        let negotiator = Negotiator::new(
            route.serializer_override(),
            self.serializer.as_deref(),
            &self.default_serializer,
        );
        let chain: Vec<BoxedMiddleware> =
            route.middleware.iter().chain(&self.middleware).cloned().collect();

        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(route = route.pattern(), error = %e, "failed to read request body");
                let (res, encoded) = negotiator.reject(Rejection::BodyRead(e.to_string()));
                return write(&res, encoded).map(|body| body.on_complete(chain, None, res));
            }
        };

        let data = match negotiator.decode(&bytes) {
            Ok(data) => data,
            Err(rejection) => {
                debug!(route = route.pattern(), error = %rejection, "rejecting request body");
                let (res, encoded) = negotiator.reject(rejection);
                return write(&res, encoded).map(|body| body.on_complete(chain, None, res));
            }
        };

        let mut request = Request::new(
            Arc::new(parts),
            path,
            Some(Arc::clone(&route)),
            params,
            data,
            received_at,
        );
        run_before([&self.middleware, &route.middleware], &mut request);

        let mut response = route.handler.call(request.clone()).await;
        run_after([&route.middleware, &self.middleware], &mut response);

        let (response, out) = match response.redirect.as_deref() {
            Some(target) => {
                let out = redirect(&response, target);
                (response, out)
            }
            None => {
                let (response, encoded) = negotiator.encode(response);
                let out = write(&response, encoded);
                (response, out)
            }
        };

        out.map(|body| body.on_complete(chain, Some(request), response))
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.router.len())
            .field("middleware", &self.middleware.len())
            .field("serializer", &self.serializer.as_ref().map(|s| s.name().to_owned()))
            .finish_non_exhaustive()
    }
}

// ── Writing ───────────────────────────────────────────────────────────────────

/// Status only, empty body, no content type.
fn bare(status: StatusCode) -> http::Response<DispatchBody> {
    let mut out = http::Response::new(DispatchBody::empty());
    *out.status_mut() = status;
    out
}

fn write(res: &Response, encoded: Encoded) -> http::Response<DispatchBody> {
    let mut out = http::Response::new(DispatchBody::new(encoded.body));
    *out.status_mut() = encoded.status;
    apply_headers(out.headers_mut(), &res.headers);
    match HeaderValue::from_str(&encoded.content_type) {
        Ok(value) => {
            out.headers_mut().insert(CONTENT_TYPE, value);
        }
        Err(_) => warn!(content_type = %encoded.content_type, "serializer content type is not a valid header"),
    }
    out
}

fn redirect(res: &Response, target: &str) -> http::Response<DispatchBody> {
    let mut out = bare(res.status);
    apply_headers(out.headers_mut(), &res.headers);
    match HeaderValue::from_str(target) {
        Ok(value) => {
            out.headers_mut().insert(LOCATION, value);
        }
        Err(_) => warn!(%target, "redirect target is not a valid header value"),
    }
    out
}

fn apply_headers(map: &mut HeaderMap, headers: &[(String, String)]) {
    for (name, value) in headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!(header = %name, "skipping invalid response header"),
        }
    }
}
