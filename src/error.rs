//! Error types.
//!
//! Two families live here. [`Error`] covers infrastructure and registration
//! failures that surface to the embedding program. [`Rejection`] and
//! [`SerializeError`] describe what can go wrong while dispatching one
//! request; the dispatcher turns every one of them into a well-formed HTTP
//! response, so they never reach the transport.

use http::StatusCode;
use thiserror::Error;

use crate::limit::Tier;

/// Errors returned by plume's fallible setup and serving operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{addr}`: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("invalid route `{pattern}`: {source}")]
    InvalidRoute {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Failure of a [`Serializer`](crate::Serializer) to encode or decode a body.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A raw serializer was handed data without its string field.
    #[error("invalid {0} data")]
    MissingField(String),

    #[error("{0}")]
    Custom(String),
}

impl SerializeError {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Why a request stopped short of a normal handler response.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("rate limited by the {0} gate")]
    RateLimited(Tier),

    #[error("no route matches the request")]
    RouteNotFound,

    #[error("{0}")]
    BodyRead(String),

    #[error("failed to parse input data: {0}")]
    Decode(SerializeError),

    #[error("failed to serialize output data: {0}")]
    Encode(SerializeError),
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::BodyRead(_) | Self::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Decode(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Whether the client receives an `{"error": ...}` payload for this rejection.
    pub fn has_body(&self) -> bool {
        !matches!(self, Self::RateLimited(_) | Self::RouteNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_statuses() {
        assert_eq!(Rejection::RateLimited(Tier::Global).status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(Rejection::RouteNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(Rejection::BodyRead("eof".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            Rejection::Decode(SerializeError::custom("bad")).status(),
            StatusCode::BAD_REQUEST
        );
        assert!(!Rejection::RouteNotFound.has_body());
        assert!(Rejection::Encode(SerializeError::custom("x")).has_body());
    }

    #[test]
    fn messages_carry_the_cause() {
        let err = Rejection::Encode(SerializeError::MissingField("data".into()));
        assert_eq!(err.to_string(), "failed to serialize output data: invalid data data");
    }
}
