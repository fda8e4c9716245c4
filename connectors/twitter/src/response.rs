//! The response side of a stream connection attempt.
//!
//! The service only needs two things from a connect result: the HTTP status
//! and a way to start receiving the body. Anything providing those can be
//! returned from a connect function, which keeps the service independent of
//! the HTTP client and of request signing.

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};

use crate::error::{TwitterError, TwitterResult};

/// Body chunks of an established stream.
///
/// The stream ending is a clean close. [`TwitterError::PotentialDataLoss`]
/// is an ambiguous close; any other error is an abrupt disconnect. Dropping
/// the stream tells the transport to stop producing.
pub type BodyStream = BoxStream<'static, TwitterResult<Bytes>>;

/// Result of one connection attempt.
pub type ConnectFuture = BoxFuture<'static, TwitterResult<Box<dyn StreamResponse>>>;

/// An HTTP response whose body can be streamed.
pub trait StreamResponse: Send {
    /// HTTP status code.
    fn status(&self) -> u16;

    /// Start delivering the body.
    fn deliver_body(self: Box<Self>) -> BodyStream;
}

/// [`StreamResponse`] over a `reqwest` response.
#[derive(Debug)]
pub struct HttpStreamResponse {
    response: reqwest::Response,
}

impl HttpStreamResponse {
    /// Wrap a response.
    #[must_use]
    pub const fn new(response: reqwest::Response) -> Self {
        Self { response }
    }
}

impl From<reqwest::Response> for HttpStreamResponse {
    fn from(response: reqwest::Response) -> Self {
        Self::new(response)
    }
}

impl StreamResponse for HttpStreamResponse {
    fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    fn deliver_body(self: Box<Self>) -> BodyStream {
        self.response
            .bytes_stream()
            .map_err(TwitterError::from)
            .boxed()
    }
}
