//! Outgoing response type and the [`IntoResponse`] conversion trait.
//!
//! A handler returns data, not bytes. The dispatcher picks a
//! [`Serializer`] for it on the way out; see [`crate::negotiate`].

use std::sync::Arc;

use http::StatusCode;
use serde_json::Value;

use crate::request::empty_body;
use crate::serializer::Serializer;

/// An outgoing HTTP response.
///
/// ```rust
/// use plume::{Response, Serializer};
/// use http::StatusCode;
/// use serde_json::json;
///
/// Response::ok(json!({"id": 1}));
/// Response::new(StatusCode::CREATED, json!({"id": 42}))
///     .header("location", "/users/42");
/// Response::new(StatusCode::OK, json!({"text": "hello"}))
///     .serializer(Serializer::text());
/// Response::new(StatusCode::OK, json!({"data": "a,b\n1,2\n"}))
///     .download("report.csv");
/// Response::redirect(StatusCode::SEE_OTHER, "/login");
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) data: Value,
    pub(crate) serializer: Option<Arc<Serializer>>,
    pub(crate) redirect: Option<String>,
}

impl Response {
    pub fn new(status: StatusCode, data: Value) -> Self {
        Self { status, headers: Vec::new(), data, serializer: None, redirect: None }
    }

    /// `200 OK` with `data`.
    pub fn ok(data: Value) -> Self {
        Self::new(StatusCode::OK, data)
    }

    /// A response with an empty map as its body.
    pub fn status(status: StatusCode) -> Self {
        Self::new(status, empty_body())
    }

    /// Redirects to `target` with `status` (e.g. `302`, `303`, `307`).
    ///
    /// Redirects skip body serialization entirely.
    pub fn redirect(status: StatusCode, target: impl Into<String>) -> Self {
        Self { redirect: Some(target.into()), ..Self::new(status, Value::Null) }
    }

    /// Sets a header, replacing any existing value of the same name.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some(entry) => entry.1 = value.to_owned(),
            None => self.headers.push((name.to_owned(), value.to_owned())),
        }
    }

    /// Serializes this response with `serializer` instead of the route or
    /// app default.
    pub fn serializer(mut self, serializer: impl Into<Arc<Serializer>>) -> Self {
        self.serializer = Some(serializer.into());
        self
    }

    /// Turns this response into a file download.
    ///
    /// The body must carry the payload as a string under `data`.
    pub fn download(mut self, filename: &str) -> Self {
        self.serializer = Some(Serializer::download_shared());
        self.set_header("Content-disposition", &format!("attachment; filename={filename}"));
        self
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn set_status(&mut self, status: StatusCode) { self.status = status; }

    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn data(&self) -> &Value { &self.data }
    pub fn data_mut(&mut self) -> &mut Value { &mut self.data }

    pub fn redirect_target(&self) -> Option<&str> { self.redirect.as_deref() }
    pub fn serializer_override(&self) -> Option<&Serializer> { self.serializer.as_deref() }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into a [`Response`].
///
/// Implement on your own types to return them directly from handlers.
///
/// # Example: typed wrapper with serde
///
/// ```rust,ignore
/// use plume::{IntoResponse, Response};
/// use serde::Serialize;
///
/// struct Json<T: Serialize>(T);
///
/// impl<T: Serialize> IntoResponse for Json<T> {
///     fn into_response(self) -> Response {
///         match serde_json::to_value(&self.0) {
///             Ok(value) => Response::ok(value),
///             Err(_)    => Response::status(http::StatusCode::INTERNAL_SERVER_ERROR),
///         }
///     }
/// }
/// ```
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

/// `200 OK` with the value as body.
impl IntoResponse for Value {
    fn into_response(self) -> Response { Response::ok(self) }
}

/// Return a [`StatusCode`] directly from a handler: `return StatusCode::NO_CONTENT`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

impl IntoResponse for (StatusCode, Value) {
    fn into_response(self) -> Response { Response::new(self.0, self.1) }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn header_replaces_case_insensitively() {
        let res = Response::ok(json!({}))
            .header("X-Count", "1")
            .header("x-count", "2");
        assert_eq!(res.headers().len(), 1);
        assert_eq!(res.header_value("X-COUNT"), Some("2"));
    }

    #[test]
    fn download_sets_serializer_and_disposition() {
        let res = Response::ok(json!({"data": "abc"})).download("file.txt");
        assert_eq!(
            res.header_value("content-disposition"),
            Some("attachment; filename=file.txt")
        );
        let serializer = res.serializer_override().unwrap();
        assert_eq!(serializer.content_type(), "application/octet-stream");
        assert_eq!(serializer.raw_field(), Some("data"));
    }

    #[test]
    fn redirect_keeps_status_and_target() {
        let res = Response::redirect(StatusCode::FOUND, "/elsewhere");
        assert_eq!(res.status_code(), StatusCode::FOUND);
        assert_eq!(res.redirect_target(), Some("/elsewhere"));
    }

    #[test]
    fn conversions() {
        assert_eq!(StatusCode::NO_CONTENT.into_response().status_code(), StatusCode::NO_CONTENT);
        let res = (StatusCode::CREATED, json!({"id": 1})).into_response();
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.data(), &json!({"id": 1}));
        assert_eq!(json!([1]).into_response().status_code(), StatusCode::OK);
    }
}
