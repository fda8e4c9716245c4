//! Test kit for `twitter-stream`.
//!
//! - [`FakeConnector`] - a connect function whose attempts the test resolves
//! - [`FakeBody`] - push chunks into an established fake stream
//! - [`ManualClock`] - reconnect timers that only fire when advanced
//! - [`TracingCapture`] - record tracing events for assertions
//! - [`MockStreamServer`] - wiremock server for the streaming endpoints
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use twitter_stream::StreamService;
//! use twitter_testkit::{FakeConnector, ManualClock, settle};
//!
//! #[tokio::test]
//! async fn reconnects_after_close() {
//!     let connector = FakeConnector::new();
//!     let clock = ManualClock::new();
//!     let mut service = StreamService::new(connector.connect_fn(), |_| {})
//!         .with_clock(Arc::new(clock.clone()));
//!
//!     service.start().unwrap();
//!     connector.respond(200).finish();
//!     settle().await;
//!
//!     clock.advance_secs(1);
//!     settle().await;
//!     assert_eq!(connector.attempts(), 2);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod clock;
mod connector;
mod mock_server;
mod tracing_config;

pub use clock::*;
pub use connector::*;
pub use mock_server::*;
pub use tracing_config::*;

/// Let spawned tasks on a current-thread runtime run until they block.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}
