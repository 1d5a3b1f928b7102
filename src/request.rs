//! Incoming request type, as seen by middleware and handlers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use http::Method;
use http::request::Parts;
use serde_json::{Map, Value};

use crate::route::Route;

/// A routed, decoded request.
///
/// Query parameters and headers are flattened to their first value. Header
/// names are stored lower-cased and looked up case-insensitively.
#[derive(Clone)]
pub struct Request {
    pub(crate) path: String,
    pub(crate) route: Option<Arc<Route>>,
    pub(crate) params: HashMap<String, String>,
    pub(crate) data: Value,
    pub(crate) query: HashMap<String, String>,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) raw: Arc<Parts>,
    pub(crate) received_at: Instant,
}

impl Request {
    /// `path` is the percent-decoded request path the route was matched on.
    pub(crate) fn new(
        raw: Arc<Parts>,
        path: String,
        route: Option<Arc<Route>>,
        params: HashMap<String, String>,
        data: Value,
        received_at: Instant,
    ) -> Self {
        let query = raw.uri.query().map(flatten_query).unwrap_or_default();
        let headers = flatten_headers(&raw.headers);
        Self {
            path,
            route,
            params,
            data,
            query,
            headers,
            raw,
            received_at,
        }
    }

    pub fn method(&self) -> &Method { &self.raw.method }
    /// The percent-decoded path, as matched against route patterns.
    pub fn path(&self) -> &str { &self.path }

    /// The route this request was matched to.
    pub fn route(&self) -> Option<&Route> { self.route.as_deref() }

    /// The transport's request head, for anything the accessors don't cover.
    pub fn raw(&self) -> &Parts { &self.raw }

    pub fn received_at(&self) -> Instant { self.received_at }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> { &self.headers }

    /// Overwrites (or adds) a header; meant for `before` middleware.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn queries(&self) -> &HashMap<String, String> { &self.query }

    /// The whole decoded body. An empty request body decodes to `{}`.
    pub fn body(&self) -> &Value { &self.data }

    pub fn body_mut(&mut self) -> &mut Value { &mut self.data }

    /// Descends the body along a dot-delimited key path.
    ///
    /// Given `{"person":{"age":10}}`, `req.data("person.age")` is `10`.
    /// A segment naming an absent key is skipped and descent continues from
    /// the same value, so `req.data("person.x.age")` is also `10`. Descent
    /// stops at the first value that is not a map, and the value reached so
    /// far is returned.
    pub fn data(&self, path: &str) -> &Value {
        let mut current = &self.data;
        for key in path.split('.') {
            let Value::Object(map) = current else { break };
            if let Some(next) = map.get(key) {
                current = next;
            }
        }
        current
    }
}

/// An empty decoded body.
pub(crate) fn empty_body() -> Value {
    Value::Object(Map::new())
}

/// Percent-decodes a request path. Invalid UTF-8 is replaced, not rejected.
pub(crate) fn decode_path(path: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(path.as_bytes())).into_owned()
}

fn flatten_query(query: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        out.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }
    out
}

fn flatten_headers(headers: &http::HeaderMap) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for (name, value) in headers {
        // Non-visible-ASCII values can't be represented as &str; skip them.
        if let Ok(value) = value.to_str() {
            out.entry(name.as_str().to_owned()).or_insert_with(|| value.to_owned());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(uri: &str, data: Value) -> Request {
        let (parts, ()) = http::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("X-Api-Key", "first")
            .header("x-api-key", "second")
            .header("Content-Type", "application/json")
            .body(())
            .unwrap()
            .into_parts();
        let params = HashMap::from([("id".to_owned(), "42".to_owned())]);
        let path = decode_path(parts.uri.path());
        Request::new(Arc::new(parts), path, None, params, data, Instant::now())
    }

    #[test]
    fn accessors() {
        let req = request("/users/42?page=2&page=3&q=a%20b", empty_body());
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.path(), "/users/42");
        assert_eq!(req.param("id"), Some("42"));
        assert_eq!(req.param("name"), None);
        assert_eq!(req.query("page"), Some("2"));
        assert_eq!(req.query("q"), Some("a b"));
        assert_eq!(req.query("missing"), None);
        assert_eq!(req.header("X-API-KEY"), Some("first"));
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("accept"), None);
        assert!(req.route().is_none());
    }

    #[test]
    fn set_header_is_case_insensitive() {
        let mut req = request("/", empty_body());
        req.set_header("X-Trace", "abc");
        assert_eq!(req.header("x-trace"), Some("abc"));
    }

    #[test]
    fn data_descends_dot_paths() {
        let req = request("/", json!({"person": {"age": 10, "name": {"first": "Ann"}}}));
        assert_eq!(req.data("person.age"), &json!(10));
        assert_eq!(req.data("person.name.first"), &json!("Ann"));
        assert_eq!(req.data("person"), &json!({"age": 10, "name": {"first": "Ann"}}));
    }

    #[test]
    fn data_stops_at_non_maps() {
        let req = request("/", json!({"person": {"age": 10}}));
        assert_eq!(req.data("person.age.years"), &json!(10));
    }

    #[test]
    fn data_skips_missing_keys() {
        let req = request("/", json!({"person": {"age": 10}}));
        assert_eq!(req.data("person.height"), &json!({"age": 10}));
        assert_eq!(req.data("nobody"), req.body());
        assert_eq!(req.data("person.x.age"), &json!(10));
        assert_eq!(req.data("x.person.y.age"), &json!(10));
    }

    #[test]
    fn path_is_percent_decoded() {
        assert_eq!(decode_path("/users/john%20doe"), "/users/john doe");
        assert_eq!(decode_path("/a+b/%E2%9C%93"), "/a+b/\u{2713}");
        assert_eq!(decode_path("/bad/%FF"), "/bad/\u{FFFD}");
        assert_eq!(decode_path("/plain"), "/plain");
    }

    #[test]
    fn data_on_non_map_body_returns_the_body() {
        let req = request("/", json!([1, 2]));
        assert_eq!(req.data("0"), &json!([1, 2]));
    }
}
