//! Request body variants and content negotiation.

use crate::error::{ClientError, Result};
use bytes::Bytes;
use serde::Serialize;

pub const TEXT_PLAIN: &str = "text/plain";
pub const OCTET_STREAM: &str = "application/octet-stream";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const APPLICATION_JSON: &str = "application/json";

/// The shape of an outgoing request body.
///
/// Each variant maps to exactly one wire encoding and `Content-Type`; see
/// [`RequestBody::negotiate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body and no `Content-Type`.
    #[default]
    Empty,
    /// UTF-8 text sent as `text/plain`.
    Text(String),
    /// Raw bytes sent as `application/octet-stream`.
    Binary(Bytes),
    /// Ordered key/value pairs sent URL-form-encoded.
    Form(Vec<(String, String)>),
    /// A structured value sent as `application/json`.
    Json(serde_json::Value),
}

/// A body ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBody {
    pub bytes: Bytes,
    pub content_type: &'static str,
}

impl RequestBody {
    /// Build a JSON body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Serialization` if `value` cannot be represented as JSON
    /// (e.g., a map with non-string keys).
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| ClientError::Serialization(e.to_string()))
    }

    /// Build a form body from key/value pairs, preserving their order.
    pub fn form<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Encode the body and pick its `Content-Type`. `Empty` yields `None`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Serialization` if a JSON value fails to serialize.
    pub fn negotiate(&self) -> Result<Option<EncodedBody>> {
        let encoded = match self {
            Self::Empty => return Ok(None),
            Self::Text(text) => EncodedBody {
                bytes: Bytes::from(text.clone()),
                content_type: TEXT_PLAIN,
            },
            Self::Binary(bytes) => EncodedBody {
                bytes: bytes.clone(),
                content_type: OCTET_STREAM,
            },
            Self::Form(pairs) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                    .finish();
                EncodedBody {
                    bytes: Bytes::from(encoded),
                    content_type: FORM_URLENCODED,
                }
            }
            Self::Json(value) => {
                let json = serde_json::to_vec(value)
                    .map_err(|e| ClientError::Serialization(e.to_string()))?;
                EncodedBody {
                    bytes: Bytes::from(json),
                    content_type: APPLICATION_JSON,
                }
            }
        };
        Ok(Some(encoded))
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(bytes))
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::Binary(bytes)
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}
