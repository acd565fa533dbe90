//! Session: binds one transport to the envelope protocol.
//!
//! A single demux task consumes the transport's events in order:
//! - `Open`/`Error`/`Close` settle the lifecycle waits registered by
//!   `open()` and `close()`
//! - RESPONSE/ERROR envelopes settle the pending call with the same id
//! - REQUEST envelopes go to the installed listener on their own task, and
//!   the answer (or failure) is sent back under the request's id
//!
//! Malformed inbound data is logged and dropped; it never ends the session.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures_util::future::Shared;
use futures_util::FutureExt;
use serde_json::Value;
use tokio::sync::watch;
use tracing::Instrument;

use routable_core::error::{Result, RoutableError};
use routable_core::schema;
use routable_core::{Envelope, EnvelopeType, Frame, Request, Response};

use crate::config::SessionConfig;
use crate::dispatch::RequestHandler;
use crate::transport::{CloseInfo, EventRx, Transport, TransportEvent};

use super::pending::{Completion, PendingCalls};
use super::state::SessionState;
use super::url::to_absolute_url;

/// Reserved id of the `open()` wait.
pub const OPEN_KEY: &str = "open";
/// Reserved id of the `close()` wait.
pub const CLOSE_KEY: &str = "close";

fn is_lifecycle_key(id: &str) -> bool {
    id == OPEN_KEY || id == CLOSE_KEY
}

/// Per-call options for [`Session::send`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    /// Overrides `session.request_timeout_ms`; zero waits forever.
    pub timeout: Option<Duration>,
}

impl SendOptions {
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Cheap-to-clone handle on one session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    transport: Arc<dyn Transport>,
    pending: PendingCalls,
    listener: RwLock<Option<Arc<dyn RequestHandler>>>,
    cfg: SessionConfig,
    /// In-flight lifecycle waits, joined by concurrent `open()`/`close()` callers.
    waits: Mutex<HashMap<&'static str, Shared<Completion>>>,
    done: watch::Sender<bool>,
}

impl Session {
    /// Bind a transport and start consuming its events.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(transport: Arc<dyn Transport>, events: EventRx, cfg: SessionConfig) -> Self {
        let (done, _) = watch::channel(false);
        let url = transport.url().unwrap_or_else(|| "-".into());
        let inner = Arc::new(SessionInner {
            transport,
            pending: PendingCalls::new(cfg.registry_timeout()),
            listener: RwLock::new(None),
            cfg,
            waits: Mutex::new(HashMap::new()),
            done,
        });

        let span = tracing::info_span!("session", %url);
        tokio::spawn(run(Arc::clone(&inner), events).instrument(span));

        Self { inner }
    }

    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// Outstanding calls (diagnostics).
    pub fn pending(&self) -> &PendingCalls {
        &self.inner.pending
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.cfg
    }

    /// Wait until the transport reports OPEN.
    pub async fn open(&self) -> Result<()> {
        match self.state() {
            SessionState::Open => return Ok(()),
            SessionState::Closing | SessionState::Closed => {
                return Err(RoutableError::Transport(format!(
                    "cannot open a {} transport",
                    self.state()
                )));
            }
            SessionState::Connecting | SessionState::Unknown => {}
        }

        let (wait, _) = self
            .inner
            .lifecycle_wait(OPEN_KEY, self.inner.cfg.open_timeout());
        // The open event may have been consumed between the check and the set.
        if self.state() == SessionState::Open {
            self.inner.settle_lifecycle(OPEN_KEY, Ok(Value::Null));
        }
        wait.await.map(|_| ())
    }

    /// Close the transport and wait for it to confirm.
    ///
    /// Outstanding calls are not cancelled; they keep waiting for their own
    /// timeout.
    pub async fn close(&self) -> Result<()> {
        if self.state() == SessionState::Closed {
            return Ok(());
        }

        let (wait, first) = self
            .inner
            .lifecycle_wait(CLOSE_KEY, self.inner.cfg.close_timeout());
        if !first {
            return wait.await.map(|_| ());
        }

        let outstanding: Vec<String> = self
            .inner
            .pending
            .keys()
            .into_iter()
            .filter(|k| !is_lifecycle_key(k))
            .collect();
        if !outstanding.is_empty() {
            tracing::warn!(
                count = outstanding.len(),
                ids = ?outstanding,
                "closing with outstanding calls"
            );
        }

        if let Err(e) = self.inner.transport.close().await {
            self.inner.settle_lifecycle(CLOSE_KEY, Err(e.clone()));
            return Err(e);
        }
        wait.await.map(|_| ())
    }

    /// Issue a request and wait for its response.
    pub async fn send(&self, req: Request, opts: SendOptions) -> Result<Response> {
        self.send_value(req.to_payload()?, opts).await
    }

    /// Issue an untyped request payload; it must satisfy the request schema.
    pub async fn send_value(&self, mut payload: Value, opts: SendOptions) -> Result<Response> {
        schema::check(&schema::REQUEST, &payload).map_err(RoutableError::InvalidRequest)?;

        if self.state() == SessionState::Connecting {
            self.open().await?;
        }

        if let Some(obj) = payload.as_object_mut() {
            if let Some(url) = obj.get("url").and_then(Value::as_str) {
                let abs = to_absolute_url(self.inner.transport.url().as_deref(), url);
                obj.insert("url".into(), Value::String(abs));
            }
        }

        let env = Envelope::wrap_request(payload);
        let frame = env.to_frame()?;
        let timeout = opts.timeout.unwrap_or(self.inner.cfg.request_timeout());
        let completion = self.inner.pending.set(env.id.clone(), Some(timeout));

        tracing::debug!(id = %env.id, "sending request");
        if let Err(e) = self.inner.transport.send(frame).await {
            self.inner.pending.delete(&env.id);
            return Err(e);
        }

        Response::from_payload(completion.await?)
    }

    /// Install the inbound request handler (replaces any previous one).
    pub fn listen<H: RequestHandler>(&self, handler: H) {
        self.listen_shared(Arc::new(handler));
    }

    /// Install a handler that is shared with other sessions.
    pub fn listen_shared(&self, handler: Arc<dyn RequestHandler>) {
        match self.inner.listener.write() {
            Ok(mut slot) => *slot = Some(handler),
            Err(_) => tracing::error!("listener lock poisoned; handler not installed"),
        }
    }

    /// Resolves once the session has stopped consuming transport events.
    pub async fn closed(&self) {
        let mut rx = self.inner.done.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }
}

impl SessionInner {
    fn state(&self) -> SessionState {
        SessionState::from_ready_state(self.transport.ready_state())
    }

    fn listener(&self) -> Option<Arc<dyn RequestHandler>> {
        // Poisoned lock means a writer panicked; treat as "no listener".
        self.listener.read().ok().and_then(|g| g.as_ref().cloned())
    }

    /// Join the in-flight wait for `key`, or register a new one.
    ///
    /// The flag is true for the caller that registered the wait.
    fn lifecycle_wait(&self, key: &'static str, timeout: Duration) -> (Shared<Completion>, bool) {
        let mut waits = self.waits.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(wait) = waits.get(key) {
            if self.pending.has(key) {
                return (wait.clone(), false);
            }
        }
        let wait = self.pending.set(key, Some(timeout)).shared();
        waits.insert(key, wait.clone());
        (wait, true)
    }

    /// Settle a lifecycle wait, if one is registered, removing it in one step.
    fn settle_lifecycle(&self, key: &str, outcome: Result<Value>) -> bool {
        let Some(mut call) = self.pending.get(key) else {
            return false;
        };
        match outcome {
            Ok(v) => call.resolve(v),
            Err(e) => call.reject(e),
        }
    }

    fn on_open(&self) {
        self.settle_lifecycle(OPEN_KEY, Ok(Value::Null));
    }

    fn on_error(&self, msg: String) {
        if !self.settle_lifecycle(OPEN_KEY, Err(RoutableError::Transport(msg))) {
            tracing::debug!("transport error with no open wait; ignored");
        }
    }

    fn on_close(&self, info: CloseInfo) {
        let closed = || RoutableError::Closed {
            code: info.code,
            reason: info.reason.clone(),
        };
        self.settle_lifecycle(OPEN_KEY, Err(closed()));
        let outcome = if info.was_clean {
            Ok(Value::Null)
        } else {
            Err(closed())
        };
        self.settle_lifecycle(CLOSE_KEY, outcome);
    }

    fn on_message(&self, frame: Frame) {
        let env = match Envelope::parse(&frame, None) {
            Ok(Some(env)) => env,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, len = frame.len(), "dropping inbound frame");
                return;
            }
        };

        if is_lifecycle_key(&env.id) {
            tracing::warn!(id = %env.id, "dropping envelope with reserved id");
            return;
        }

        match env.kind {
            EnvelopeType::Request => self.dispatch_request(env),
            EnvelopeType::Response => {
                let Some(mut call) = self.pending.get(&env.id) else {
                    tracing::debug!(id = %env.id, "response for unknown call (timed out?)");
                    return;
                };
                match schema::check(&schema::RESPONSE, &env.payload) {
                    Ok(()) => call.resolve(env.payload),
                    Err(errors) => {
                        tracing::warn!(id = %env.id, %errors, "non conforming response");
                        call.reject(RoutableError::NonConforming(errors))
                    }
                };
            }
            EnvelopeType::Error => {
                let Some(mut call) = self.pending.get(&env.id) else {
                    tracing::debug!(id = %env.id, "error for unknown call (timed out?)");
                    return;
                };
                call.reject(RoutableError::Remote(env.payload));
            }
        }
    }

    fn dispatch_request(&self, env: Envelope) {
        let Some(listener) = self.listener() else {
            tracing::debug!(id = %env.id, "no listener installed; request dropped");
            return;
        };

        let id = env.id;
        let mut req = match Request::from_payload(env.payload) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "dropping non conforming request");
                return;
            }
        };
        if !self.cfg.headers.is_empty() {
            req.headers
                .get_or_insert_with(Default::default)
                .extend(self.cfg.headers.clone());
        }

        tracing::debug!(id = %id, method = %req.method, url = %req.url, "inbound request");

        let transport = Arc::clone(&self.transport);
        let task = async move {
            let handled = AssertUnwindSafe(listener.handle(req)).catch_unwind().await;
            let reply = match handled {
                Ok(Ok(res)) => {
                    let res = res.unwrap_or_else(Response::not_found);
                    match res.to_payload() {
                        Ok(payload) => Envelope::wrap_response(id.as_str(), payload),
                        Err(e) => Envelope::wrap_error(id.as_str(), e.to_payload()),
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(id = %id, error = %e, "request handler failed");
                    Envelope::wrap_error(id.as_str(), e.to_payload())
                }
                Err(_) => {
                    tracing::error!(id = %id, "request handler panicked");
                    let e = RoutableError::Internal("request handler panicked".into());
                    Envelope::wrap_error(id.as_str(), e.to_payload())
                }
            };

            let sent = match reply.to_frame() {
                Ok(frame) => transport.send(frame).await,
                Err(e) => Err(e),
            };
            if let Err(e) = sent {
                tracing::warn!(id = %id, error = %e, "failed to send reply");
            }
        };
        tokio::spawn(task.in_current_span());
    }
}

async fn run(inner: Arc<SessionInner>, mut events: EventRx) {
    while let Some(event) = events.recv().await {
        let state = inner.state();
        match event {
            TransportEvent::Open => {
                tracing::debug!(%state, "transport open");
                inner.on_open();
            }
            TransportEvent::Error(msg) => {
                tracing::warn!(%state, error = %msg, "transport error");
                inner.on_error(msg);
            }
            TransportEvent::Close(info) => {
                tracing::info!(
                    %state,
                    code = info.code,
                    reason = %info.reason,
                    was_clean = info.was_clean,
                    "transport closed"
                );
                inner.on_close(info);
                break;
            }
            TransportEvent::Message(frame) => inner.on_message(frame),
        }
    }
    inner.done.send_replace(true);
}
