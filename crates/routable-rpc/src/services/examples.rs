//! In-memory `examples` resource.
//!
//! - `GET /examples`: every stored example, as a JSON text body
//! - `GET /examples/:exampleId`: one example (200 with no body when unknown)
//! - `PUT /examples/:exampleId`: create or replace; the id overrides any `key`
//!   in the body
//!
//! Bodies may be a JSON object or a string holding one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use routable_core::error::{Result, RoutableError};
use routable_core::{Request, Response};

use crate::dispatch::{reply, HandlerResult};
use crate::router::{Router, RouterOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub key: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Insertion-ordered example store.
#[derive(Debug, Default)]
pub struct ExampleStore {
    examples: RwLock<Vec<Example>>,
}

impl ExampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list(&self) -> Vec<Example> {
        self.examples.read().await.clone()
    }

    pub async fn find(&self, key: &str) -> Option<Example> {
        self.examples
            .read()
            .await
            .iter()
            .find(|e| e.key == key)
            .cloned()
    }

    /// Replace in place when the key exists, append otherwise.
    pub async fn upsert(&self, example: Example) {
        let mut examples = self.examples.write().await;
        match examples.iter_mut().find(|e| e.key == example.key) {
            Some(slot) => *slot = example,
            None => examples.push(example),
        }
    }

    pub async fn len(&self) -> usize {
        self.examples.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.examples.read().await.is_empty()
    }
}

/// Router serving the store under `/examples`.
pub fn routes(store: Arc<ExampleStore>) -> Result<Router<ExampleStore>> {
    let mut router = Router::with_options(RouterOptions {
        base: String::new(),
        context: store,
    });
    router
        .get("/examples", list)?
        .put("/examples/:exampleId", put)?
        .get("/examples/:exampleId", get)?;
    Ok(router)
}

async fn list(_req: Request, store: Arc<ExampleStore>) -> HandlerResult {
    let body = to_text(&store.list().await)?;
    reply(Response::ok().with_body(body))
}

async fn get(req: Request, store: Arc<ExampleStore>) -> HandlerResult {
    let key = example_id(&req)?;
    let mut res = Response::ok();
    if let Some(example) = store.find(key).await {
        res = res.with_body(to_text(&example)?);
    }
    reply(res)
}

async fn put(req: Request, store: Arc<ExampleStore>) -> HandlerResult {
    let key = example_id(&req)?.to_owned();
    tracing::info!(%key, "PUT /examples");

    let mut fields = decode_fields(req.body.as_ref())?;
    fields.remove("key");
    store.upsert(Example { key, fields }).await;
    reply(Response::ok())
}

fn example_id(req: &Request) -> Result<&str> {
    req.param("exampleId")
        .ok_or_else(|| RoutableError::BadRequest("missing exampleId".into()))
}

fn decode_fields(body: Option<&Value>) -> Result<Map<String, Value>> {
    let value = match body {
        Some(Value::String(text)) => serde_json::from_str(text)
            .map_err(|e| RoutableError::BadRequest(format!("example body is not json: {e}")))?,
        Some(v) => v.clone(),
        None => return Err(RoutableError::BadRequest("example body required".into())),
    };
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(RoutableError::BadRequest(
            "example body must be an object".into(),
        )),
    }
}

fn to_text<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| RoutableError::Internal(format!("encode failed: {e}")))
}
