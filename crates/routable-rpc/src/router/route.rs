use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use routable_core::error::{Result, RoutableError};
use routable_core::protocol::message::collect_query;
use routable_core::{Method, Request};

use crate::dispatch::{HandlerResult, RequestHandler, RouteHandler};

use super::pattern::PathPattern;

/// Base used to resolve relative request URLs before matching.
const LOCAL_ORIGIN: &str = "http://localhost";

/// Method a route answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMethod {
    /// Any method.
    All,
    Only(Method),
}

impl RouteMethod {
    pub fn matches(self, method: Method) -> bool {
        match self {
            RouteMethod::All => true,
            RouteMethod::Only(m) => m == method,
        }
    }
}

impl From<Method> for RouteMethod {
    fn from(m: Method) -> Self {
        RouteMethod::Only(m)
    }
}

struct Route<Ctx> {
    method: RouteMethod,
    pattern: PathPattern,
    handlers: Vec<Arc<dyn RouteHandler<Ctx>>>,
}

pub struct RouterOptions<Ctx> {
    /// Prefix prepended to every registered pattern.
    pub base: String,
    /// Shared context handed to every handler.
    pub context: Arc<Ctx>,
}

impl<Ctx: Default> Default for RouterOptions<Ctx> {
    fn default() -> Self {
        Self {
            base: String::new(),
            context: Arc::new(Ctx::default()),
        }
    }
}

/// Ordered route table.
pub struct Router<Ctx = ()> {
    base: String,
    context: Arc<Ctx>,
    routes: Vec<Route<Ctx>>,
}

impl<Ctx: Default + Send + Sync + 'static> Default for Router<Ctx> {
    fn default() -> Self {
        Self::with_options(RouterOptions::default())
    }
}

impl<Ctx: Default + Send + Sync + 'static> Router<Ctx> {
    pub fn new() -> Self {
        Self::default()
    }
}

macro_rules! method_route {
    ($(#[$doc:meta])* $name:ident, $method:expr) => {
        $(#[$doc])*
        pub fn $name<F, Fut>(&mut self, path: &str, f: F) -> Result<&mut Self>
        where
            F: Fn(Request, Arc<Ctx>) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = HandlerResult> + Send + 'static,
        {
            self.add_route($method, path, vec![Arc::new(f)])
        }
    };
}

impl<Ctx: Send + Sync + 'static> Router<Ctx> {
    pub fn with_options(opts: RouterOptions<Ctx>) -> Self {
        Self {
            base: opts.base,
            context: opts.context,
            routes: Vec::new(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Register a route with a handler chain.
    pub fn add_route(
        &mut self,
        method: impl Into<RouteMethod>,
        path: &str,
        handlers: Vec<Arc<dyn RouteHandler<Ctx>>>,
    ) -> Result<&mut Self> {
        let pattern = PathPattern::compile(&format!("{}{}", self.base, path))?;
        self.routes.push(Route {
            method: method.into(),
            pattern,
            handlers,
        });
        Ok(self)
    }

    method_route!(
        /// Route for every method.
        all,
        RouteMethod::All
    );
    method_route!(delete, Method::Delete);
    method_route!(get, Method::Get);
    method_route!(head, Method::Head);
    method_route!(options, Method::Options);
    method_route!(patch, Method::Patch);
    method_route!(post, Method::Post);
    method_route!(put, Method::Put);
    method_route!(trace, Method::Trace);

    /// Dispatch with the router's own context.
    pub async fn handle(&self, req: Request) -> HandlerResult {
        self.handle_with(req, Arc::clone(&self.context)).await
    }

    /// Dispatch with an explicit context.
    pub async fn handle_with(&self, mut req: Request, ctx: Arc<Ctx>) -> HandlerResult {
        let url = request_url(&req.url)?;
        req.query = Some(collect_query(
            url.query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        ));
        let path = url.path();

        for route in &self.routes {
            if !route.method.matches(req.method) {
                continue;
            }
            let Some(params) = route.pattern.captures(path) else {
                continue;
            };
            req.params = Some(params);

            for h in &route.handlers {
                if let Some(res) = h.call(req.clone(), Arc::clone(&ctx)).await? {
                    tracing::trace!(
                        method = %req.method,
                        pattern = route.pattern.source(),
                        status = res.status,
                        "route answered"
                    );
                    return Ok(Some(res));
                }
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl<Ctx: Send + Sync + 'static> RequestHandler for Router<Ctx> {
    async fn handle(&self, req: Request) -> HandlerResult {
        self.handle_with(req, Arc::clone(&self.context)).await
    }
}

fn request_url(raw: &str) -> Result<Url> {
    let parsed = match raw.find("://") {
        Some(i) if i > 0 => Url::parse(raw),
        _ => Url::parse(&format!("{LOCAL_ORIGIN}{raw}")),
    };
    parsed.map_err(|e| RoutableError::BadRequest(format!("invalid request url {raw:?}: {e}")))
}
