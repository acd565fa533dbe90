//! HTTP-like payloads carried by REQUEST and RESPONSE envelopes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, RoutableError};
use crate::schema::{self, Schema};

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    Trace,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Method::Delete,
        Method::Get,
        Method::Head,
        Method::Options,
        Method::Patch,
        Method::Post,
        Method::Put,
        Method::Trace,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Delete => "DELETE",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = RoutableError;

    fn from_str(s: &str) -> Result<Self> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| RoutableError::BadRequest(format!("unknown method: {s}")))
    }
}

/// Query string value: scalar when the key appears once, list otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    One(String),
    Many(Vec<String>),
}

impl QueryValue {
    /// First value for the key.
    pub fn first(&self) -> Option<&str> {
        match self {
            QueryValue::One(s) => Some(s),
            QueryValue::Many(v) => v.first().map(String::as_str),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            QueryValue::One(prev) => {
                let prev = std::mem::take(prev);
                *self = QueryValue::Many(vec![prev, value]);
            }
            QueryValue::Many(v) => v.push(value),
        }
    }
}

/// Parsed query string.
pub type Query = BTreeMap<String, QueryValue>;

/// Build a [`Query`] from decoded pairs, keeping repeated keys in order.
pub fn collect_query<I>(pairs: I) -> Query
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut query = Query::new();
    for (k, v) in pairs {
        match query.get_mut(&k) {
            Some(existing) => existing.push(v),
            None => {
                query.insert(k, QueryValue::One(v));
            }
        }
    }
    query
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub url: String,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<BTreeMap<String, String>>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            body: None,
            headers: None,
            query: None,
            params: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Named path parameter captured by the router.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.as_ref()?.get(name).map(String::as_str)
    }

    /// Query value parsed by the router.
    pub fn query_value(&self, name: &str) -> Option<&QueryValue> {
        self.query.as_ref()?.get(name)
    }

    /// Body as a string slice, if it is a JSON string.
    pub fn body_str(&self) -> Option<&str> {
        self.body.as_ref()?.as_str()
    }

    /// Decode a payload, checking the request schema first.
    pub fn from_payload(payload: Value) -> Result<Self> {
        decode(&schema::REQUEST, payload)
    }

    pub fn to_payload(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| RoutableError::Internal(format!("request encode failed: {e}")))
    }
}

/// Response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Response {
    #[serde(deserialize_with = "uint32")]
    pub status: u32,
    #[serde(rename = "statusText")]
    pub status_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Response {
    pub fn new(status: u32, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body: None,
        }
    }

    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    /// Default reply when no handler produced a response.
    pub fn not_found() -> Self {
        Self::new(404, "Not Found")
    }

    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn body_str(&self) -> Option<&str> {
        self.body.as_ref()?.as_str()
    }

    /// Decode a payload, checking the response schema first.
    pub fn from_payload(payload: Value) -> Result<Self> {
        decode(&schema::RESPONSE, payload)
    }

    pub fn to_payload(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| RoutableError::Internal(format!("response encode failed: {e}")))
    }
}

/// Same acceptance as the schema's uint32 form: integral floats like `200.0`
/// are valid statuses.
fn uint32<'de, D>(de: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::Number(serde_json::Number::deserialize(de)?);
    if !schema::is_uint32(&value) {
        return Err(D::Error::custom(format!("{value} is not a uint32")));
    }
    value
        .as_u64()
        .or_else(|| value.as_f64().map(|f| f as u64))
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| D::Error::custom(format!("{value} is not a uint32")))
}

fn decode<T: serde::de::DeserializeOwned>(schema: &Schema, payload: Value) -> Result<T> {
    schema::check(schema, &payload).map_err(RoutableError::NonConforming)?;
    // Shape is valid; a failure here means a typed field (headers, query) holds
    // something other than strings.
    serde_json::from_value(payload)
        .map_err(|e| RoutableError::MalformedInput(format!("payload decode failed: {e}")))
}
