use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use routable_core::error::Result;
use routable_core::{Request, Response};

/// `Ok(None)` means "no answer here": the next handler/route is tried, and a
/// session replies 404 if nothing answers.
pub type HandlerResult = Result<Option<Response>>;

/// Session listener: answers every inbound request.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, req: Request) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> RequestHandler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, req: Request) -> HandlerResult {
        (self)(req).await
    }
}

/// One link of a route's handler chain.
#[async_trait]
pub trait RouteHandler<Ctx>: Send + Sync + 'static {
    async fn call(&self, req: Request, ctx: Arc<Ctx>) -> HandlerResult;
}

#[async_trait]
impl<Ctx, F, Fut> RouteHandler<Ctx> for F
where
    Ctx: Send + Sync + 'static,
    F: Fn(Request, Arc<Ctx>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, req: Request, ctx: Arc<Ctx>) -> HandlerResult {
        (self)(req, ctx).await
    }
}

/// Box a closure as a chain link (lets the closure's argument types infer).
pub fn handler<Ctx, F, Fut>(f: F) -> Arc<dyn RouteHandler<Ctx>>
where
    Ctx: Send + Sync + 'static,
    F: Fn(Request, Arc<Ctx>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(f)
}

/// Answer with `res`.
pub fn reply(res: Response) -> HandlerResult {
    Ok(Some(res))
}

/// Decline; let the next handler try.
pub fn pass() -> HandlerResult {
    Ok(None)
}
