//! Long-lived stream connection with automatic reconnection.
//!
//! A [`StreamService`] owns one logical subscription to a streaming endpoint
//! for its whole lifetime. It connects through a caller-supplied connect
//! function, feeds the body through a [`LineDecoder`] to the delegate, and
//! when the connection is lost it notifies the disconnect callback and
//! schedules a reconnect on its [`Clock`]. It keeps reconnecting until
//! [`StreamService::stop`] is called; errors are only ever reported through
//! the disconnect callback.
//!
//! The connection runs as a single tokio task, so transitions never race each
//! other. The task's current [`Phase`] owns exactly one of the in-flight
//! connect attempt, the active body stream, or the pending reconnect timer.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    backoff::ReconnectDelay,
    clock::{Clock, Sleep, TokioClock},
    decoder::LineDecoder,
    error::{TwitterError, TwitterResult},
    response::{BodyStream, ConnectFuture, StreamResponse},
};

/// Receives every decoded stream message, in stream order.
pub type Delegate = Arc<dyn Fn(Value) + Send + Sync>;

/// Called after each successful connection.
pub type ConnectCallback = Arc<dyn Fn(&StreamMonitor) + Send + Sync>;

/// Called once per disconnection or failed connection attempt.
pub type DisconnectCallback = Arc<dyn Fn(&StreamMonitor, &DisconnectReason) + Send + Sync>;

type ConnectFn = Arc<dyn Fn() -> ConnectFuture + Send + Sync>;

/// Externally visible connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Not started, or stopped.
    Idle,
    /// Waiting for the connect function's response.
    Connecting,
    /// Streaming the response body.
    Connected,
    /// Waiting for the reconnect timer.
    AwaitingReconnect,
}

/// Why a connection ended.
#[derive(Debug)]
pub enum DisconnectReason {
    /// The body was fully received (or the transport could not tell).
    Done,
    /// The connection failed or the endpoint returned an error status.
    Failed(TwitterError),
}

impl DisconnectReason {
    /// Classify an error reported by the transport.
    ///
    /// An ambiguous close is indistinguishable from a clean one for the
    /// streaming API, so it becomes [`DisconnectReason::Done`].
    #[must_use]
    pub fn from_transport(err: TwitterError) -> Self {
        match err {
            TwitterError::PotentialDataLoss => Self::Done,
            other => Self::Failed(other),
        }
    }

    /// Whether the stream simply ended.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// The failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&TwitterError> {
        match self {
            Self::Done => None,
            Self::Failed(err) => Some(err),
        }
    }

    /// HTTP status of an API or rate-limit failure.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.error().and_then(TwitterError::status_code)
    }

    /// Whether the endpoint rate limited us.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Failed(err) if err.is_rate_limited())
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "Response body fully received"),
            Self::Failed(err) => write!(f, "{err}"),
        }
    }
}

struct Shared {
    state: StreamState,
    delay: ReconnectDelay,
    generation: u64,
    connections: u64,
    on_connect: Option<ConnectCallback>,
    on_disconnect: Option<DisconnectCallback>,
}

impl Shared {
    const fn new() -> Self {
        Self {
            state: StreamState::Idle,
            delay: ReconnectDelay::new(),
            generation: 0,
            connections: 0,
            on_connect: None,
            on_disconnect: None,
        }
    }
}

/// Read-only view of a [`StreamService`], handed to callbacks.
#[derive(Clone)]
pub struct StreamMonitor {
    shared: Arc<Mutex<Shared>>,
}

impl StreamMonitor {
    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.shared.lock().state
    }

    /// Delay the next reconnect will use (zero when idle).
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        self.shared.lock().delay.current()
    }

    /// Number of successful connections since the service was created.
    #[must_use]
    pub fn connections(&self) -> u64 {
        self.shared.lock().connections
    }

    /// Whether both monitors observe the same service.
    #[must_use]
    pub fn same_service(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for StreamMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.lock();
        f.debug_struct("StreamMonitor")
            .field("state", &shared.state)
            .field("delay", &shared.delay)
            .field("connections", &shared.connections)
            .finish()
    }
}

/// A reconnecting stream subscription.
pub struct StreamService {
    connect: ConnectFn,
    delegate: Delegate,
    clock: Arc<dyn Clock>,
    shared: Arc<Mutex<Shared>>,
    task: Option<JoinHandle<()>>,
}

impl StreamService {
    /// Create an unstarted service.
    ///
    /// `connect` is called once per connection attempt; `delegate` receives
    /// every decoded message.
    pub fn new<C, D>(connect: C, delegate: D) -> Self
    where
        C: Fn() -> ConnectFuture + Send + Sync + 'static,
        D: Fn(Value) + Send + Sync + 'static,
    {
        Self {
            connect: Arc::new(connect),
            delegate: Arc::new(delegate),
            clock: Arc::new(TokioClock),
            shared: Arc::new(Mutex::new(Shared::new())),
            task: None,
        }
    }

    /// Use `clock` for reconnect timers.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the callback run after each successful connection.
    pub fn set_connect_callback<F>(&self, callback: F)
    where
        F: Fn(&StreamMonitor) + Send + Sync + 'static,
    {
        self.shared.lock().on_connect = Some(Arc::new(callback));
    }

    /// Set the callback run on each disconnection.
    pub fn set_disconnect_callback<F>(&self, callback: F)
    where
        F: Fn(&StreamMonitor, &DisconnectReason) + Send + Sync + 'static,
    {
        self.shared.lock().on_disconnect = Some(Arc::new(callback));
    }

    /// A read-only view of this service.
    #[must_use]
    pub fn monitor(&self) -> StreamMonitor {
        StreamMonitor {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Whether `start()` has been called without a matching `stop()`.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.shared.lock().state
    }

    /// Delay the next reconnect will use (zero when idle).
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        self.shared.lock().delay.current()
    }

    /// Start connecting.
    ///
    /// Calls the connect function right away and drives the connection on a
    /// task spawned onto the current tokio runtime.
    ///
    /// # Errors
    ///
    /// [`TwitterError::AlreadyRunning`] if the service is already started.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(&mut self) -> TwitterResult<()> {
        if self.task.is_some() {
            return Err(TwitterError::AlreadyRunning);
        }

        let generation = {
            let mut shared = self.shared.lock();
            shared.generation += 1;
            shared.state = StreamState::Connecting;
            shared.generation
        };

        info!("Starting stream service");
        let first_attempt = (self.connect)();

        let worker = Worker {
            connect: Arc::clone(&self.connect),
            delegate: Arc::clone(&self.delegate),
            clock: Arc::clone(&self.clock),
            monitor: self.monitor(),
            generation,
        };
        let span = info_span!("twitter_stream", generation);
        self.task = Some(tokio::spawn(worker.run(first_attempt).instrument(span)));

        Ok(())
    }

    /// Stop the service.
    ///
    /// Cancels any pending reconnect timer or in-flight connect attempt,
    /// closes an active stream and resets the reconnect delay to zero. Once
    /// this returns no callback will fire until the next `start()`. If a
    /// stream was active, the disconnect callback sees one clean close.
    /// Stopping an idle service does nothing.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        let (was_connected, on_disconnect) = {
            let mut shared = self.shared.lock();
            shared.generation += 1;
            let was_connected = shared.state == StreamState::Connected;
            shared.state = StreamState::Idle;
            shared.delay.reset();
            (was_connected, shared.on_disconnect.clone())
        };

        task.abort();
        match task.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => debug!("Stream task cancelled"),
            Err(e) => warn!(error = %e, "Stream task ended abnormally"),
        }

        info!("Stream service stopped");

        if was_connected {
            if let Some(callback) = on_disconnect {
                callback(&self.monitor(), &DisconnectReason::Done);
            }
        }
    }
}

impl Drop for StreamService {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl fmt::Debug for StreamService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamService")
            .field("monitor", &self.monitor())
            .field("clock", &self.clock)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// What the connection task is currently waiting on.
enum Phase {
    Connecting(ConnectFuture),
    Connected(BodyStream),
    AwaitingReconnect(Sleep),
}

/// The connection task for one `start()`..`stop()` run.
///
/// Every state change checks `generation` first, so a run that has been
/// stopped can no longer touch the shared state or call back.
struct Worker {
    connect: ConnectFn,
    delegate: Delegate,
    clock: Arc<dyn Clock>,
    monitor: StreamMonitor,
    generation: u64,
}

impl Worker {
    async fn run(self, first_attempt: ConnectFuture) {
        let mut phase = Phase::Connecting(first_attempt);

        loop {
            let next = match phase {
                Phase::Connecting(attempt) => match attempt.await {
                    Ok(response) => self.setup_stream(response),
                    Err(err) => self.connection_lost(DisconnectReason::from_transport(err)),
                },
                Phase::Connected(body) => {
                    let reason = self.consume(body).await;
                    self.connection_lost(reason)
                }
                Phase::AwaitingReconnect(timer) => {
                    timer.await;
                    self.reconnect()
                }
            };

            match next {
                Some(next) => phase = next,
                None => return,
            }
        }
    }

    fn is_current(&self) -> bool {
        self.monitor.shared.lock().generation == self.generation
    }

    fn setup_stream(&self, response: Box<dyn StreamResponse>) -> Option<Phase> {
        let status = response.status();
        if status != 200 {
            return self.http_error(status);
        }

        let on_connect = {
            let mut shared = self.monitor.shared.lock();
            if shared.generation != self.generation {
                return None;
            }
            shared.delay.connected();
            shared.state = StreamState::Connected;
            shared.connections += 1;
            shared.on_connect.clone()
        };

        info!("Connected to stream");
        let body = response.deliver_body();
        if let Some(callback) = on_connect {
            callback(&self.monitor);
        }

        Some(Phase::Connected(body))
    }

    fn http_error(&self, status: u16) -> Option<Phase> {
        let err = TwitterError::from_status(status);

        if err.is_rate_limited() {
            let mut shared = self.monitor.shared.lock();
            if shared.generation != self.generation {
                return None;
            }
            shared.delay.rate_limited();
        }

        self.connection_lost(DisconnectReason::Failed(err))
    }

    async fn consume(&self, mut body: BodyStream) -> DisconnectReason {
        let mut decoder = LineDecoder::new();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => return DisconnectReason::from_transport(err),
            };

            let decoded = decoder.feed(&chunk, |message| {
                if self.is_current() {
                    (self.delegate)(message);
                }
            });

            if let Err(err) = decoded {
                warn!(error = %err, "Dropping stream connection after malformed message");
                return DisconnectReason::Failed(err);
            }
        }

        DisconnectReason::Done
    }

    fn connection_lost(&self, reason: DisconnectReason) -> Option<Phase> {
        let on_disconnect = {
            let mut shared = self.monitor.shared.lock();
            if shared.generation != self.generation {
                return None;
            }
            shared.state = StreamState::AwaitingReconnect;
            shared.on_disconnect.clone()
        };

        match &reason {
            DisconnectReason::Done => info!("Stream connection closed"),
            DisconnectReason::Failed(err) => {
                warn!(error = %err, status = ?err.status_code(), "Stream connection lost");
            }
        }

        if let Some(callback) = on_disconnect {
            callback(&self.monitor, &reason);
        }

        let delay = {
            let mut shared = self.monitor.shared.lock();
            if shared.generation != self.generation {
                return None;
            }
            if reason.is_rate_limited() {
                shared.delay.current()
            } else {
                shared.delay.escalate()
            }
        };

        info!(delay_secs = delay.as_secs(), "Scheduling stream reconnect");
        Some(Phase::AwaitingReconnect(self.clock.sleep(delay)))
    }

    fn reconnect(&self) -> Option<Phase> {
        {
            let mut shared = self.monitor.shared.lock();
            if shared.generation != self.generation {
                return None;
            }
            shared.state = StreamState::Connecting;
        }

        debug!("Reconnecting to stream");
        Some(Phase::Connecting((self.connect)()))
    }
}
