//! Fake connect function and stream transport.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{FutureExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use twitter_stream::{BodyStream, ConnectFuture, StreamResponse, TwitterError, TwitterResult};

type Attempt = oneshot::Sender<TwitterResult<Box<dyn StreamResponse>>>;

/// A connect function whose attempts stay pending until the test resolves
/// them, oldest first.
#[derive(Clone, Default)]
pub struct FakeConnector {
    inner: Arc<Mutex<ConnectorState>>,
}

#[derive(Default)]
struct ConnectorState {
    attempts: usize,
    pending: VecDeque<Attempt>,
}

impl FakeConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A connect function to hand to `StreamService::new`.
    pub fn connect_fn(&self) -> impl Fn() -> ConnectFuture + Send + Sync + 'static {
        let inner = Arc::clone(&self.inner);
        move || {
            let (tx, rx) = oneshot::channel();
            {
                let mut state = inner.lock();
                state.attempts += 1;
                state.pending.push_back(tx);
            }
            async move {
                rx.await
                    .unwrap_or_else(|_| Err(TwitterError::Stream("connect attempt abandoned".into())))
            }
            .boxed()
        }
    }

    /// Number of times the connect function has been called.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.inner.lock().attempts
    }

    /// Number of attempts still waiting for a result whose caller is still
    /// listening.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        let mut state = self.inner.lock();
        state.pending.retain(|tx| !tx.is_closed());
        state.pending.len()
    }

    /// Resolve the oldest live attempt with a response carrying `status`.
    ///
    /// # Panics
    ///
    /// Panics if no attempt is pending.
    pub fn respond(&self, status: u16) -> FakeBody {
        let (response, body) = FakeResponse::new(status);
        self.resolve(Ok(Box::new(response)));
        body
    }

    /// Fail the oldest live attempt, as a refused or timed out connection would.
    ///
    /// # Panics
    ///
    /// Panics if no attempt is pending.
    pub fn fail(&self, err: TwitterError) {
        self.resolve(Err(err));
    }

    fn resolve(&self, result: TwitterResult<Box<dyn StreamResponse>>) {
        let tx = {
            let mut state = self.inner.lock();
            state.pending.retain(|tx| !tx.is_closed());
            state.pending.pop_front()
        };
        let tx = tx.expect("no pending connect attempt");
        let _ = tx.send(result);
    }
}

impl fmt::Debug for FakeConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("FakeConnector")
            .field("attempts", &state.attempts)
            .field("pending", &state.pending.len())
            .finish()
    }
}

/// Response handed to the service by [`FakeConnector::respond`].
#[derive(Debug)]
pub struct FakeResponse {
    status: u16,
    rx: mpsc::UnboundedReceiver<TwitterResult<Bytes>>,
}

impl FakeResponse {
    /// A response with `status` and the handle that feeds its body.
    #[must_use]
    pub fn new(status: u16) -> (Self, FakeBody) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { status, rx }, FakeBody { tx })
    }
}

impl StreamResponse for FakeResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn deliver_body(self: Box<Self>) -> BodyStream {
        UnboundedReceiverStream::new(self.rx).boxed()
    }
}

/// Producer side of a fake stream body.
#[derive(Debug, Clone)]
pub struct FakeBody {
    tx: mpsc::UnboundedSender<TwitterResult<Bytes>>,
}

impl FakeBody {
    /// Push raw bytes.
    pub fn send(&self, chunk: impl Into<Bytes>) {
        let _ = self.tx.send(Ok(chunk.into()));
    }

    /// Push one message as a `\r\n` terminated line.
    pub fn send_json(&self, message: &Value) {
        self.send(format!("{message}\r\n"));
    }

    /// Push a keep-alive line.
    pub fn keep_alive(&self) {
        self.send("\r\n");
    }

    /// Close the body cleanly. Clones of this handle keep it open.
    pub fn finish(self) {}

    /// Close the body without knowing whether everything arrived.
    pub fn potential_data_loss(self) {
        let _ = self.tx.send(Err(TwitterError::PotentialDataLoss));
    }

    /// Drop the connection abruptly.
    pub fn fail(self, reason: &str) {
        let _ = self.tx.send(Err(TwitterError::Stream(reason.to_string())));
    }

    /// Whether the consumer stopped reading (the body was dropped).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
