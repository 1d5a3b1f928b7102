//! A single route: method, path pattern, handler and per-route settings.
//!
//! # Path patterns
//!
//! | Placeholder | Matches | Example |
//! |---|---|---|
//! | `{name}` | one or more characters within one segment | `/users/{id}` |
//! | `{*name}` | one or more characters, `/` included | `/files/{*path}` |
//!
//! Patterns are anchored at both ends: `/users/{id}` matches `/users/42` but
//! neither `/users` nor `/users/42/edit`. Everything outside a placeholder
//! matches literally.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use http::Method;
use regex::Regex;

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::limit::{ClientBuckets, RateLimit};
use crate::middleware::{BoxedMiddleware, Middleware};
use crate::serializer::Serializer;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(\*?)([A-Za-z0-9_]+)\}").unwrap_or_else(|e| panic!("placeholder regex: {e}"))
});

/// A registered `(method, pattern, handler)` binding and its settings.
pub struct Route {
    method: Method,
    pattern: String,
    matcher: Regex,
    pub(crate) handler: BoxedHandler,
    pub(crate) middleware: Vec<BoxedMiddleware>,
    pub(crate) serializer: Option<Arc<Serializer>>,
    pub(crate) clients: Option<ClientBuckets>,
}

impl Route {
    /// Builds a route.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` does not compile, e.g. when two placeholders share
    /// a name. Use [`Route::try_new`] to handle that as an error.
    pub fn new(method: Method, pattern: &str, handler: impl Handler) -> Self {
        Self::try_new(method, pattern, handler).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_new(method: Method, pattern: &str, handler: impl Handler) -> Result<Self, Error> {
        let matcher = compile(pattern).map_err(|source| Error::InvalidRoute {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(Self {
            method,
            pattern: pattern.to_owned(),
            matcher,
            handler: handler.into_boxed_handler(),
            middleware: Vec::new(),
            serializer: None,
            clients: None,
        })
    }

    /// Appends route-level middleware.
    pub fn middleware(mut self, mw: impl Middleware) -> Self {
        self.middleware.push(Arc::new(mw));
        self
    }

    pub(crate) fn prepend_middleware(&mut self, inherited: &[BoxedMiddleware]) {
        self.middleware.splice(0..0, inherited.iter().cloned());
    }

    /// Serializer for this route's request and response bodies.
    pub fn serializer(mut self, serializer: impl Into<Arc<Serializer>>) -> Self {
        self.serializer = Some(serializer.into());
        self
    }

    /// Per-client limit on this route. Each client gets its own bucket cloned
    /// from `limit`. Needs an app-level client identifier to take effect.
    pub fn limit(mut self, limit: RateLimit) -> Self {
        self.clients = Some(ClientBuckets::new(limit));
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn pattern(&self) -> &str { &self.pattern }
    pub fn rate_limit(&self) -> Option<RateLimit> { self.clients.as_ref().map(ClientBuckets::template) }
    pub fn client_buckets(&self) -> Option<&ClientBuckets> { self.clients.as_ref() }
    pub fn serializer_override(&self) -> Option<&Serializer> { self.serializer.as_deref() }

    /// Whether `path` matches this route's pattern, whatever the method.
    pub fn is_match(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }

    /// Named parameters of `path`, or `None` when it does not match.
    pub fn params(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.matcher.captures(path)?;
        let params = self.matcher
            .capture_names()
            .flatten()
            .filter_map(|name| caps.name(name).map(|m| (name.to_owned(), m.as_str().to_owned())))
            .collect();
        Some(params)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("middleware", &self.middleware.len())
            .field("serializer", &self.serializer.as_ref().map(|s| s.name().to_owned()))
            .field("limit", &self.rate_limit())
            .finish_non_exhaustive()
    }
}

/// Compiles a `{name}` pattern into an anchored regex with named groups.
fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    let mut re = String::with_capacity(pattern.len() * 2 + 2);
    re.push('^');
    if !pattern.starts_with('/') {
        re.push('/');
    }

    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(pattern) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else { continue };
        re.push_str(&regex::escape(&pattern[last..whole.start()]));
        let body = if caps.get(1).is_some_and(|star| !star.is_empty()) { ".+" } else { "[^/]+" };
        re.push_str(&format!("(?P<{}>{body})", name.as_str()));
        last = whole.end();
    }
    re.push_str(&regex::escape(&pattern[last..]));
    re.push('$');

    Regex::new(&re)
}

#[cfg(test)]
mod tests {
    use crate::{Request, Response};

    use super::*;

    async fn noop(_req: Request) -> Response {
        Response::status(http::StatusCode::OK)
    }

    fn route(pattern: &str) -> Route {
        Route::new(Method::GET, pattern, noop)
    }

    #[test]
    fn segment_placeholder() {
        let r = route("/users/{id}");
        assert_eq!(r.params("/users/42").unwrap()["id"], "42");
        assert!(!r.is_match("/users"));
        assert!(!r.is_match("/users/"));
        assert!(!r.is_match("/users/42/edit"));
    }

    #[test]
    fn multiple_placeholders() {
        let r = route("/orgs/{org}/repos/{repo}");
        let params = r.params("/orgs/rust-lang/repos/regex").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params["org"], "rust-lang");
        assert_eq!(params["repo"], "regex");
    }

    #[test]
    fn catch_all_absorbs_slashes() {
        let r = route("/files/{*path}");
        assert_eq!(r.params("/files/a/b/c.txt").unwrap()["path"], "a/b/c.txt");
        assert!(!r.is_match("/files/"));
    }

    #[test]
    fn literals_are_escaped() {
        let r = route("/v1.0/items");
        assert!(r.is_match("/v1.0/items"));
        assert!(!r.is_match("/v1x0/items"));

        let r = route("/weird/{not a name}");
        assert!(r.is_match("/weird/{not a name}"));
    }

    #[test]
    fn missing_leading_slash_is_added() {
        assert!(route("health").is_match("/health"));
    }

    #[test]
    fn static_pattern_has_no_params() {
        assert!(route("/").params("/").unwrap().is_empty());
        assert!(route("/").params("/x").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Route::try_new(Method::GET, "/{id}/{id}", noop).unwrap_err();
        assert!(matches!(err, Error::InvalidRoute { .. }));
        assert!(err.to_string().starts_with("invalid route `/{id}/{id}`"));
    }

    #[test]
    fn limit_installs_buckets() {
        let r = route("/").limit(RateLimit::per_second(1.0, 2));
        assert_eq!(r.rate_limit(), Some(RateLimit::per_second(1.0, 2)));
        assert!(r.client_buckets().unwrap().is_empty());
    }
}
