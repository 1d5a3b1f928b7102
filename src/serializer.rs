//! Body serializers.
//!
//! A [`Serializer`] pairs an encode and a decode function with the
//! `content-type` it produces. Bodies are [`serde_json::Value`] trees on both
//! sides, whatever the wire format.
//!
//! | Built-in | Content type | Shape |
//! |---|---|---|
//! | [`Serializer::json`] | `application/json` | any value (the default) |
//! | [`Serializer::text`] | `text/plain` | raw, field `text` |
//! | [`Serializer::download`] | `application/octet-stream` | raw, field `data` |
//!
//! Raw serializers move a single string field through verbatim instead of
//! structurally encoding the tree.

use std::fmt;
use std::sync::{Arc, LazyLock};

use serde_json::{Map, Value};

use crate::error::SerializeError;

pub type EncodeFn = dyn Fn(&Value) -> Result<Vec<u8>, SerializeError> + Send + Sync + 'static;
pub type DecodeFn = dyn Fn(&[u8]) -> Result<Value, SerializeError> + Send + Sync + 'static;

static JSON: LazyLock<Arc<Serializer>> = LazyLock::new(|| Arc::new(Serializer::json()));
static DOWNLOAD: LazyLock<Arc<Serializer>> = LazyLock::new(|| Arc::new(Serializer::download()));

/// A named (content-type, encode, decode) triple.
pub struct Serializer {
    name: String,
    content_type: String,
    raw_field: Option<String>,
    encode: Box<EncodeFn>,
    decode: Box<DecodeFn>,
}

impl Serializer {
    /// JSON via `serde_json`. Used whenever nothing else is configured.
    pub fn json() -> Self {
        Self::custom(
            "json",
            "application/json",
            |value| Ok(serde_json::to_vec(value)?),
            |bytes| Ok(serde_json::from_slice(bytes)?),
        )
    }

    /// Plain text carried in the `text` field.
    pub fn text() -> Self {
        Self::raw("text", "text/plain")
    }

    /// File downloads carried in the `data` field.
    pub fn download() -> Self {
        Self::raw("data", "application/octet-stream")
    }

    /// A raw serializer passing `field` through verbatim.
    ///
    /// Encoding fails unless the body is a map whose `field` is a string.
    /// Decoding never fails: the input becomes `{field: <input>}`.
    pub fn raw(field: &str, content_type: &str) -> Self {
        let enc_field = field.to_owned();
        let dec_field = field.to_owned();
        Self {
            raw_field: Some(field.to_owned()),
            ..Self::custom(
                field,
                content_type,
                move |value| match value.get(&enc_field) {
                    Some(Value::String(s)) => Ok(s.as_bytes().to_vec()),
                    _ => Err(SerializeError::MissingField(enc_field.clone())),
                },
                move |bytes| {
                    let mut map = Map::new();
                    map.insert(dec_field.clone(), Value::String(String::from_utf8_lossy(bytes).into_owned()));
                    Ok(Value::Object(map))
                },
            )
        }
    }

    /// Any other format: bring your own functions.
    pub fn custom<E, D>(name: &str, content_type: &str, encode: E, decode: D) -> Self
    where
        E: Fn(&Value) -> Result<Vec<u8>, SerializeError> + Send + Sync + 'static,
        D: Fn(&[u8]) -> Result<Value, SerializeError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_owned(),
            content_type: content_type.to_owned(),
            raw_field: None,
            encode: Box::new(encode),
            decode: Box::new(decode),
        }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn content_type(&self) -> &str { &self.content_type }

    /// The passthrough field, for raw serializers.
    pub fn raw_field(&self) -> Option<&str> { self.raw_field.as_deref() }
    pub fn is_raw(&self) -> bool { self.raw_field.is_some() }

    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, SerializeError> {
        (self.encode)(value)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Value, SerializeError> {
        (self.decode)(bytes)
    }

    /// Wraps `data` under the raw field, ready for a raw serializer.
    /// Structured serializers get an empty map.
    pub fn make_raw_data(&self, data: impl Into<String>) -> Value {
        let mut map = Map::new();
        if let Some(field) = &self.raw_field {
            map.insert(field.clone(), Value::String(data.into()));
        }
        Value::Object(map)
    }

    /// The shared built-in JSON serializer.
    pub(crate) fn default_shared() -> Arc<Serializer> {
        Arc::clone(&JSON)
    }

    pub(crate) fn download_shared() -> Arc<Serializer> {
        Arc::clone(&DOWNLOAD)
    }
}

impl fmt::Debug for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Serializer")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("raw_field", &self.raw_field)
            .finish_non_exhaustive()
    }
}
