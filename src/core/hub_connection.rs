//! Client side of a push-notification hub connection.
//!
//! Handlers are registered per method name and invoked in registration order
//! from a background poll task. Reconnection follows a fixed list of delays;
//! once it is exhausted the connection stays disconnected until `start` is
//! called again.

use crate::core::hub_protocol::{self, HubMessage};
use crate::domain::ports::{HubTransport, PollOutcome};
use crate::utils::error::{Result, SqmError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub type HubHandler = Arc<dyn Fn(&[Value]) + Send + Sync>;
type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;
type CloseCallback = Arc<dyn Fn(Option<&str>) + Send + Sync>;

/// Retry delays used after a dropped connection: immediately, then 2, 10 and 30 seconds.
pub const DEFAULT_RECONNECT_DELAYS: [Duration; 4] = [
    Duration::from_secs(0),
    Duration::from_secs(2),
    Duration::from_secs(10),
    Duration::from_secs(30),
];

/// Upper bound on polls spent waiting for the handshake response.
const HANDSHAKE_POLLS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Default)]
struct Callbacks {
    reconnecting: Vec<LifecycleCallback>,
    reconnected: Vec<LifecycleCallback>,
    closed: Vec<CloseCallback>,
}

struct Inner {
    transport: Arc<dyn HubTransport>,
    handlers: Mutex<HashMap<String, Vec<HubHandler>>>,
    callbacks: Mutex<Callbacks>,
    state: Mutex<ConnectionState>,
    token: Mutex<Option<String>>,
    reconnect_delays: Vec<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct HubConnection {
    inner: Arc<Inner>,
    cancel: Mutex<Option<CancellationToken>>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl HubConnection {
    pub fn new(transport: Arc<dyn HubTransport>) -> Self {
        Self::with_reconnect_delays(transport, DEFAULT_RECONNECT_DELAYS.to_vec())
    }

    pub fn with_reconnect_delays(transport: Arc<dyn HubTransport>, delays: Vec<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                handlers: Mutex::new(HashMap::new()),
                callbacks: Mutex::new(Callbacks::default()),
                state: Mutex::new(ConnectionState::Disconnected),
                token: Mutex::new(None),
                reconnect_delays: delays,
            }),
            cancel: Mutex::new(None),
            poll_task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.inner.state)
    }

    /// Registers a handler for server invocations of `method` (case-insensitive).
    pub fn on<F>(&self, method: &str, handler: F)
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        lock(&self.inner.handlers)
            .entry(method.to_lowercase())
            .or_default()
            .push(Arc::new(handler));
    }

    pub fn off(&self, method: &str) {
        lock(&self.inner.handlers).remove(&method.to_lowercase());
    }

    pub fn on_reconnecting<F: Fn() + Send + Sync + 'static>(&self, callback: F) {
        lock(&self.inner.callbacks)
            .reconnecting
            .push(Arc::new(callback));
    }

    pub fn on_reconnected<F: Fn() + Send + Sync + 'static>(&self, callback: F) {
        lock(&self.inner.callbacks)
            .reconnected
            .push(Arc::new(callback));
    }

    pub fn on_close<F: Fn(Option<&str>) + Send + Sync + 'static>(&self, callback: F) {
        lock(&self.inner.callbacks).closed.push(Arc::new(callback));
    }

    pub async fn start(&self) -> Result<()> {
        {
            let mut state = lock(&self.inner.state);
            if *state != ConnectionState::Disconnected {
                return Err(SqmError::hub(format!(
                    "Cannot start a connection that is {:?}",
                    *state
                )));
            }
            *state = ConnectionState::Connecting;
        }

        if let Err(e) = self.inner.connect().await {
            self.inner.set_state(ConnectionState::Disconnected);
            return Err(e);
        }
        self.inner.set_state(ConnectionState::Connected);
        tracing::info!("Hub connection established");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(Inner::run(self.inner.clone(), cancel.clone()));
        *lock(&self.cancel) = Some(cancel);
        *lock(&self.poll_task) = Some(task);
        Ok(())
    }

    /// Invokes `method` on the server without waiting for a result.
    pub async fn send(&self, method: &str, arguments: &[Value]) -> Result<()> {
        self.inner.send(method, arguments).await
    }

    /// A handle for sending from callbacks. It does not keep the connection alive.
    pub fn sender(&self) -> HubSender {
        HubSender {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Stops polling and tells the server to drop the connection.
    ///
    /// Best-effort: a failing DELETE is logged and the connection is still
    /// considered stopped.
    pub async fn stop(&self) {
        let cancel = lock(&self.cancel).take();
        let task = lock(&self.poll_task).take();
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("Hub poll task ended abnormally: {}", e);
            }
        }

        let token = lock(&self.inner.token).take();
        if let Some(token) = token {
            if let Err(e) = self.inner.transport.close(&token).await {
                tracing::warn!("Failed to close hub connection cleanly: {}", e);
            }
        }

        let was = std::mem::replace(&mut *lock(&self.inner.state), ConnectionState::Disconnected);
        if was != ConnectionState::Disconnected {
            tracing::info!("Hub connection stopped");
            self.inner.fire_closed(None);
        }
    }
}

#[derive(Clone)]
pub struct HubSender {
    inner: Weak<Inner>,
}

impl HubSender {
    pub async fn send(&self, method: &str, arguments: &[Value]) -> Result<()> {
        let inner = self
            .inner
            .upgrade()
            .ok_or_else(|| SqmError::hub("Connection has been dropped"))?;
        inner.send(method, arguments).await
    }
}

impl Drop for HubConnection {
    fn drop(&mut self) {
        if let Some(cancel) = lock(&self.cancel).take() {
            cancel.cancel();
        }
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
    }

    async fn send(&self, method: &str, arguments: &[Value]) -> Result<()> {
        let state = *lock(&self.state);
        if state != ConnectionState::Connected {
            return Err(SqmError::hub(format!(
                "Cannot send '{}' while the connection is {:?}",
                method, state
            )));
        }
        let token = lock(&self.token)
            .clone()
            .ok_or_else(|| SqmError::hub("Connection has no token"))?;

        let payload = hub_protocol::invocation(method, arguments)?;
        self.transport.send(&token, &payload).await
    }

    /// Negotiate, handshake, and deliver anything that arrived with the handshake.
    async fn connect(&self) -> Result<()> {
        let negotiated = self.transport.negotiate().await?;
        let token = negotiated.token().to_string();
        tracing::debug!("Negotiated hub connection {}", negotiated.connection_id);

        self.transport
            .send(&token, &hub_protocol::handshake_request()?)
            .await?;

        let mut buffer = String::new();
        for _ in 0..HANDSHAKE_POLLS {
            match self.transport.poll(&token).await? {
                PollOutcome::Messages(raw) => buffer.push_str(&raw),
                PollOutcome::Closed => {
                    return Err(SqmError::HubClosed {
                        reason: Some("closed during handshake".to_string()),
                    })
                }
            }

            if let Some(rest) = hub_protocol::parse_handshake_response(&buffer)? {
                let rest = rest.to_string();
                *lock(&self.token) = Some(token);
                return match self.process(&rest) {
                    Flow::Continue => Ok(()),
                    Flow::Close(reason) => {
                        *lock(&self.token) = None;
                        Err(SqmError::HubClosed { reason })
                    }
                    Flow::Reconnect(reason) => {
                        *lock(&self.token) = None;
                        Err(SqmError::hub(format!(
                            "Server closed the connection during handshake: {}",
                            reason
                        )))
                    }
                };
            }
        }

        Err(SqmError::hub("No handshake response from server"))
    }

    async fn run(inner: Arc<Inner>, cancel: CancellationToken) {
        loop {
            let Some(token) = lock(&inner.token).clone() else {
                break;
            };

            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = inner.transport.poll(&token) => outcome,
            };

            let reconnect_reason = match outcome {
                Ok(PollOutcome::Messages(raw)) => match inner.process(&raw) {
                    Flow::Continue => continue,
                    Flow::Close(reason) => {
                        inner.finish(reason.as_deref());
                        break;
                    }
                    Flow::Reconnect(reason) => reason,
                },
                Ok(PollOutcome::Closed) => {
                    tracing::info!("Hub server closed the connection");
                    inner.finish(None);
                    break;
                }
                Err(e) => {
                    tracing::warn!("Hub poll failed: {}", e);
                    e.to_string()
                }
            };

            if !inner.reconnect(&cancel, &reconnect_reason).await {
                break;
            }
        }
    }

    fn process(&self, raw: &str) -> Flow {
        for message in hub_protocol::parse_messages(raw) {
            match message {
                HubMessage::Invocation { target, arguments } => self.dispatch(&target, &arguments),
                HubMessage::Ping => tracing::trace!("Hub ping"),
                HubMessage::Close {
                    error,
                    allow_reconnect,
                } => {
                    tracing::info!(
                        "Hub close message received (error: {:?}, reconnect: {})",
                        error,
                        allow_reconnect
                    );
                    return if allow_reconnect {
                        Flow::Reconnect(error.unwrap_or_else(|| "server requested reconnect".to_string()))
                    } else {
                        Flow::Close(error)
                    };
                }
                HubMessage::Ignored(kind) => tracing::trace!("Ignoring hub message type {}", kind),
            }
        }

        Flow::Continue
    }

    fn dispatch(&self, target: &str, arguments: &[Value]) {
        let handlers = lock(&self.handlers)
            .get(&target.to_lowercase())
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            tracing::debug!("No handler registered for hub method '{}'", target);
            return;
        }
        for handler in handlers {
            handler(arguments);
        }
    }

    /// Returns true once reconnected, false when giving up or cancelled.
    async fn reconnect(&self, cancel: &CancellationToken, reason: &str) -> bool {
        self.set_state(ConnectionState::Reconnecting);
        *lock(&self.token) = None;
        tracing::warn!("Hub connection lost ({}), reconnecting", reason);
        let callbacks = lock(&self.callbacks).reconnecting.clone();
        for callback in callbacks {
            callback();
        }

        for (attempt, delay) in self.reconnect_delays.iter().enumerate() {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(*delay) => {}
            }

            let attempt_result = tokio::select! {
                _ = cancel.cancelled() => return false,
                result = self.connect() => result,
            };

            match attempt_result {
                Ok(()) => {
                    self.set_state(ConnectionState::Connected);
                    tracing::info!("Hub reconnected after {} attempt(s)", attempt + 1);
                    let callbacks = lock(&self.callbacks).reconnected.clone();
                    for callback in callbacks {
                        callback();
                    }
                    return true;
                }
                Err(e) => tracing::warn!("Hub reconnect attempt {} failed: {}", attempt + 1, e),
            }
        }

        tracing::error!("Hub reconnection gave up after {} attempts", self.reconnect_delays.len());
        self.finish(Some(reason));
        false
    }

    fn finish(&self, reason: Option<&str>) {
        *lock(&self.token) = None;
        self.set_state(ConnectionState::Disconnected);
        self.fire_closed(reason);
    }

    fn fire_closed(&self, reason: Option<&str>) {
        let callbacks = lock(&self.callbacks).closed.clone();
        for callback in callbacks {
            callback(reason);
        }
    }
}

enum Flow {
    Continue,
    Close(Option<String>),
    Reconnect(String),
}
