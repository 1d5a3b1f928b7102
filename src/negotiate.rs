//! Serializer selection and the encode fallback ladder.
//!
//! Which serializer handles a body depends on who configured one:
//!
//! ```text
//! decode (request body):   route → app → built-in JSON
//! encode (response body):  response → route → app → built-in JSON
//! error payloads:          app → built-in JSON
//! ```
//!
//! When encoding fails the client still gets an answer. The ladder is:
//!
//! 1. the negotiated serializer;
//! 2. `{"error": "failed to serialize output data: …"}` with the error
//!    serializer, status 500;
//! 3. the same message as literal `text/plain`, status 500.
//!
//! Step 3 cannot fail.

use bytes::Bytes;
use http::StatusCode;
use serde_json::{Map, Value};
use tracing::{error, warn};

use crate::error::Rejection;
use crate::request::empty_body;
use crate::response::Response;
use crate::serializer::Serializer;

/// Content type of the last-resort plain-text body.
pub const PLAIN_TEXT: &str = "text/plain";

/// An encoded body ready for the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct Encoded {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Bytes,
}

/// Resolves serializers for one request.
#[derive(Clone, Copy, Debug)]
pub struct Negotiator<'a> {
    route: Option<&'a Serializer>,
    app: Option<&'a Serializer>,
    fallback: &'a Serializer,
}

impl<'a> Negotiator<'a> {
    /// `fallback` is the built-in default, used when neither level sets one.
    pub fn new(
        route: Option<&'a Serializer>,
        app: Option<&'a Serializer>,
        fallback: &'a Serializer,
    ) -> Self {
        Self { route, app, fallback }
    }

    fn error_serializer(&self) -> &'a Serializer {
        self.app.unwrap_or(self.fallback)
    }

    /// Decodes a request body. An empty body is an empty map and is never
    /// handed to a serializer.
    pub fn decode(&self, body: &[u8]) -> Result<Value, Rejection> {
        if body.is_empty() {
            return Ok(empty_body());
        }
        let serializer = self.route.or(self.app).unwrap_or(self.fallback);
        serializer.decode(body).map_err(Rejection::Decode)
    }

    /// Encodes `res`, replacing it with the 500 error response if the
    /// negotiated serializer fails. The returned response is the one the
    /// client actually receives.
    pub fn encode(&self, res: Response) -> (Response, Encoded) {
        let serializer = res.serializer.as_deref()
            .or(self.route)
            .or(self.app)
            .unwrap_or(self.fallback);

        match serializer.encode(&res.data) {
            Ok(body) => {
                let encoded = Encoded {
                    status: res.status,
                    content_type: serializer.content_type().to_owned(),
                    body: Bytes::from(body),
                };
                (res, encoded)
            }
            Err(e) => {
                warn!(serializer = serializer.name(), error = %e, "response encode failed");
                self.reject(Rejection::Encode(e))
            }
        }
    }

    /// Builds the error response for a rejection that carries a payload
    /// (body read, decode or encode failure).
    pub fn reject(&self, rejection: Rejection) -> (Response, Encoded) {
        let status = rejection.status();
        let message = rejection.to_string();
        let res = Response::new(status, error_payload(&message));

        let serializer = self.error_serializer();
        let encoded = match serializer.encode(&res.data) {
            Ok(body) => Encoded {
                status,
                content_type: serializer.content_type().to_owned(),
                body: Bytes::from(body),
            },
            // Plain text keeps the rejection's own status.
            Err(e) => {
                error!(serializer = serializer.name(), error = %e, "error payload encode failed");
                Encoded {
                    status,
                    content_type: PLAIN_TEXT.to_owned(),
                    body: Bytes::from(message),
                }
            }
        };
        (res, encoded)
    }
}

/// `{"error": message}`.
pub fn error_payload(message: &str) -> Value {
    let mut map = Map::new();
    map.insert("error".to_owned(), Value::String(message.to_owned()));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::SerializeError;

    fn json() -> Serializer {
        Serializer::json()
    }

    #[test]
    fn empty_body_skips_decoding() {
        let failing = Serializer::custom("never", "x/never", |_| Ok(vec![]), |_| {
            Err(SerializeError::custom("must not be called"))
        });
        let fallback = json();
        let negotiator = Negotiator::new(Some(&failing), None, &fallback);
        assert_eq!(negotiator.decode(b"").unwrap(), json!({}));
    }

    #[test]
    fn decode_prefers_route_then_app() {
        let (text, fallback) = (Serializer::text(), json());
        let download = Serializer::download();

        let n = Negotiator::new(Some(&text), Some(&download), &fallback);
        assert_eq!(n.decode(b"hi").unwrap(), json!({"text": "hi"}));

        let n = Negotiator::new(None, Some(&download), &fallback);
        assert_eq!(n.decode(b"hi").unwrap(), json!({"data": "hi"}));

        let n = Negotiator::new(None, None, &fallback);
        assert_eq!(n.decode(br#"{"a":1}"#).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn decode_failure_is_a_400() {
        let fallback = json();
        let err = Negotiator::new(None, None, &fallback).decode(b"{oops").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("failed to parse input data: "));
    }

    #[test]
    fn encode_precedence() {
        let (text, download, fallback) = (Serializer::text(), Serializer::download(), json());
        let n = Negotiator::new(Some(&text), Some(&download), &fallback);

        let res = Response::ok(json!({"text": "t", "data": "d"}));
        assert_eq!(n.encode(res.clone()).1.body, "t");

        let (_, encoded) = n.encode(res.serializer(Serializer::json()));
        assert_eq!(encoded.content_type, "application/json");

        let n = Negotiator::new(None, Some(&download), &fallback);
        let (_, encoded) = n.encode(Response::ok(json!({"data": "d"})));
        assert_eq!(encoded.body, "d");
        assert_eq!(encoded.content_type, "application/octet-stream");
    }

    #[test]
    fn empty_data_round_trips_through_the_default() {
        let fallback = json();
        let n = Negotiator::new(None, None, &fallback);
        let data = n.decode(b"").unwrap();
        let (res, encoded) = n.encode(Response::ok(data));
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(encoded.status, StatusCode::OK);
        assert_eq!(encoded.body, "{}");
    }

    #[test]
    fn encode_failure_uses_the_app_serializer() {
        let requires_data = Serializer::raw("data", "application/x-data");
        let app = Serializer::custom("yaml-ish", "text/x-yaml", |v| {
            Ok(format!("error: {}", v["error"].as_str().unwrap_or_default()).into_bytes())
        }, |_| Ok(Value::Null));
        let fallback = json();
        let n = Negotiator::new(Some(&requires_data), Some(&app), &fallback);

        let (res, encoded) = n.encode(Response::ok(json!({"other": 1})));
        assert_eq!(encoded.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(encoded.content_type, "text/x-yaml");
        assert_eq!(encoded.body, "error: failed to serialize output data: invalid data data");
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.data(), &json!({"error": "failed to serialize output data: invalid data data"}));
    }

    #[test]
    fn encode_failure_defaults_to_json() {
        let fallback = json();
        let n = Negotiator::new(None, None, &fallback);
        let res = Response::ok(json!({})).serializer(Serializer::text());
        let (_, encoded) = n.encode(res);
        assert_eq!(encoded.content_type, "application/json");
        let body: Value = serde_json::from_slice(&encoded.body).unwrap();
        assert_eq!(body, json!({"error": "failed to serialize output data: invalid text data"}));
    }

    #[test]
    fn double_failure_degrades_to_plain_text() {
        let app = Serializer::text();
        let fallback = json();
        let n = Negotiator::new(None, Some(&app), &fallback);
        let (res, encoded) = n.encode(Response::ok(json!({"nope": true})));
        assert_eq!(encoded.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(encoded.content_type, PLAIN_TEXT);
        assert_eq!(encoded.body, "failed to serialize output data: invalid text data");
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn reject_body_read_failure() {
        let fallback = json();
        let n = Negotiator::new(None, None, &fallback);
        let (res, encoded) = n.reject(Rejection::BodyRead("connection reset".into()));
        assert_eq!(encoded.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.data(), &json!({"error": "connection reset"}));
        assert_eq!(encoded.body, r#"{"error":"connection reset"}"#);
    }

    #[test]
    fn decode_failure_stays_400_when_the_error_payload_fails() {
        let (route, app, fallback) = (json(), Serializer::text(), json());
        let n = Negotiator::new(Some(&route), Some(&app), &fallback);
        let rejection = n.decode(b"{broken").unwrap_err();
        let (res, encoded) = n.reject(rejection);
        assert_eq!(encoded.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(encoded.content_type, PLAIN_TEXT);
        assert!(encoded.body.starts_with(b"failed to parse input data: "));
    }
}
