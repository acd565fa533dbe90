//! Shared application state for the demo server.

use std::sync::Arc;

use routable_core::error::Result;

use crate::config::RoutableConfig;
use crate::dispatch::RequestHandler;
use crate::services::{examples, ExampleStore};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: RoutableConfig,
    store: Arc<ExampleStore>,
    listener: Arc<dyn RequestHandler>,
}

impl AppState {
    /// Build state and compile the service routes.
    /// Returns Result so main can report a bad route table instead of panicking.
    pub fn new(cfg: RoutableConfig) -> Result<Self> {
        let store = Arc::new(ExampleStore::new());
        let router = examples::routes(Arc::clone(&store))?;
        tracing::debug!(routes = router.len(), "service routes compiled");

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                store,
                listener: Arc::new(router),
            }),
        })
    }

    pub fn cfg(&self) -> &RoutableConfig {
        &self.inner.cfg
    }

    pub fn store(&self) -> Arc<ExampleStore> {
        Arc::clone(&self.inner.store)
    }

    /// Listener shared by every session.
    pub fn listener(&self) -> Arc<dyn RequestHandler> {
        Arc::clone(&self.inner.listener)
    }
}
