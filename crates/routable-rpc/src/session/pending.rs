//! Pending-call registry.
//!
//! Maps a correlation id to the continuation of an outstanding call. Each call
//! is settled at most once: resolution, rejection and timeout all remove the
//! entry (or take its reply slot) first, so whichever happens first wins and
//! the others find nothing.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use routable_core::error::{Result, RoutableError};

/// What a waiter eventually receives.
pub type Outcome = Result<Value>;

/// One outstanding call.
#[derive(Debug)]
pub struct PendingCall {
    id: String,
    seq: u64,
    deadline: Option<Instant>,
    reply: Option<oneshot::Sender<Outcome>>,
    timer: Option<AbortHandle>,
}

impl PendingCall {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the timeout fires, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_settled(&self) -> bool {
        self.reply.is_none()
    }

    /// Deliver a value. Returns false if the call was already settled.
    pub fn resolve(&mut self, value: Value) -> bool {
        self.settle(Ok(value))
    }

    /// Deliver a failure. Returns false if the call was already settled.
    pub fn reject(&mut self, err: RoutableError) -> bool {
        self.settle(Err(err))
    }

    fn settle(&mut self, outcome: Outcome) -> bool {
        self.cancel_timer();
        match self.reply.take() {
            Some(tx) => {
                // The waiter may have given up; nothing to do then.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Future handed to whoever registered the call.
#[derive(Debug)]
pub struct Completion {
    id: String,
    rx: oneshot::Receiver<Outcome>,
}

impl Completion {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Future for Completion {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx).poll(cx).map(|r| {
            // Err: the entry was deleted or replaced without being settled.
            r.unwrap_or_else(|_| {
                Err(RoutableError::Internal(format!(
                    "pending call \"{}\" dropped",
                    this.id
                )))
            })
        })
    }
}

/// Registry of outstanding calls, shared by a session and its timers.
#[derive(Debug, Clone)]
pub struct PendingCalls {
    calls: Arc<DashMap<String, PendingCall>>,
    seq: Arc<AtomicU64>,
    default_timeout: Duration,
}

impl PendingCalls {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            calls: Arc::new(DashMap::new()),
            seq: Arc::new(AtomicU64::new(1)),
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Register `id` and return its completion.
    ///
    /// `timeout` of `None` uses the registry default; `Some(Duration::ZERO)`
    /// arms no timer at all. When the timer fires it looks the id up again and
    /// rejects with `Timeout` only if this same call is still registered.
    /// Registering an id that is already pending replaces (and drops) the
    /// previous call. Must be called from within a tokio runtime.
    pub fn set(&self, id: impl Into<String>, timeout: Option<Duration>) -> Completion {
        let id = id.into();
        let (tx, rx) = oneshot::channel();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let timeout = timeout.unwrap_or(self.default_timeout);
        let armed = !timeout.is_zero();

        let call = PendingCall {
            id: id.clone(),
            seq,
            deadline: armed.then(|| Instant::now() + timeout),
            reply: Some(tx),
            timer: None,
        };
        if let Some(mut prev) = self.calls.insert(id.clone(), call) {
            prev.cancel_timer();
            tracing::warn!(id = %id, "pending call replaced before settling");
        }

        if armed {
            let calls = Arc::clone(&self.calls);
            let key = id.clone();
            let timer = tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if let Some((_, mut call)) = calls.remove_if(&key, |_, c| c.seq == seq) {
                    call.timer = None;
                    tracing::debug!(id = %key, "pending call timed out");
                    call.reject(RoutableError::Timeout(key.clone()));
                }
            });
            // If the entry is already gone the call was settled (or timed out) first.
            if let Some(mut call) = self.calls.get_mut(&id) {
                if call.seq == seq {
                    call.timer = Some(timer.abort_handle());
                }
            }
        }

        Completion { id, rx }
    }

    /// Borrow a call without removing it; cancels its timeout.
    ///
    /// Meant for lifecycle waits that are settled right away by the caller.
    /// Do not touch the registry again while holding the returned guard.
    pub fn peek(&self, id: &str) -> Option<RefMut<'_, String, PendingCall>> {
        let mut call = self.calls.get_mut(id)?;
        call.cancel_timer();
        Some(call)
    }

    /// Remove and return a call (peek + delete).
    pub fn get(&self, id: &str) -> Option<PendingCall> {
        let (_, mut call) = self.calls.remove(id)?;
        call.cancel_timer();
        Some(call)
    }

    pub fn resolve(&self, id: &str, value: Value) -> Result<()> {
        let mut call = self
            .get(id)
            .ok_or_else(|| RoutableError::NotFound(id.to_owned()))?;
        call.resolve(value);
        Ok(())
    }

    pub fn reject(&self, id: &str, reason: RoutableError) -> Result<()> {
        let mut call = self
            .get(id)
            .ok_or_else(|| RoutableError::NotFound(id.to_owned()))?;
        call.reject(reason);
        Ok(())
    }

    pub fn has(&self, id: &str) -> bool {
        self.calls.contains_key(id)
    }

    /// Drop a call without settling it; its waiter sees a dropped-call error.
    pub fn delete(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn size(&self) -> usize {
        self.calls.len()
    }

    /// Ids still pending, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.calls.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}
