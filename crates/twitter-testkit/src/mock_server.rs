//! Mock streaming endpoint.
//!
//! Wraps wiremock. Bodies are served whole, so each mounted stream closes
//! cleanly once its messages have been sent.

use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Path of the filter endpoint under the base URL.
pub const FILTER_PATH: &str = "/statuses/filter.json";

/// Path of the user stream endpoint under the base URL.
pub const USER_PATH: &str = "/user.json";

/// A mock server standing in for both streaming hosts.
pub struct MockStreamServer {
    server: MockServer,
}

impl MockStreamServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to use as `stream_url` and `userstream_url`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}/", self.server.uri())
    }

    /// The underlying wiremock server.
    #[must_use]
    pub const fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Serve `messages` as a newline-delimited body, interleaved with a
    /// keep-alive line, for every request to `http_method` `request_path`.
    pub async fn serve_stream(&self, http_method: &str, request_path: &str, messages: &[Value]) {
        Mock::given(method(http_method))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(stream_body(messages)))
            .mount(&self.server)
            .await;
    }

    /// Answer the next `times` requests with `status`, ahead of any stream
    /// mounted with [`MockStreamServer::serve_stream`].
    pub async fn fail_next(&self, request_path: &str, status: u16, times: u64) {
        Mock::given(path(request_path))
            .respond_with(ResponseTemplate::new(status))
            .up_to_n_times(times)
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Requests received so far.
    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Number of requests received so far.
    pub async fn request_count(&self) -> usize {
        self.requests().await.len()
    }
}

impl std::fmt::Debug for MockStreamServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStreamServer")
            .field("uri", &self.server.uri())
            .finish()
    }
}

/// A newline-delimited stream body carrying `messages`.
#[must_use]
pub fn stream_body(messages: &[Value]) -> String {
    let mut body = String::from("\r\n");
    for message in messages {
        body.push_str(&message.to_string());
        body.push_str("\r\n");
    }
    body
}
