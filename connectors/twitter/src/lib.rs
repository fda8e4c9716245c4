//! Twitter streaming API client.
//!
//! Maintains a long-lived streaming connection to Twitter's `statuses/filter`
//! or user stream endpoint, delivers each newline-delimited JSON message to a
//! delegate in order, and reconnects after failures with backoff:
//!
//! - transport failures back off exponentially from 1s up to 10 minutes
//! - HTTP 420 (rate limited) backs off from a 30s floor
//! - a successful connection resets the backoff
//!
//! ```no_run
//! use twitter_stream::{FilterParams, TwitterConfig, TwitterStreamClient};
//!
//! # async fn run() -> twitter_stream::TwitterResult<()> {
//! let client = TwitterStreamClient::new(&TwitterConfig::default())?;
//! let params = FilterParams {
//!     track: Some(vec!["rust".into()]),
//!     ..Default::default()
//! };
//! let mut service = client.stream_filter(|msg| println!("{msg}"), &params)?;
//! service.start()?;
//! // ...
//! service.stop().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod backoff;
pub mod client;
pub mod clock;
pub mod config;
pub mod decoder;
pub mod error;
pub mod message;
mod oauth;
pub mod response;
pub mod service;

pub use backoff::ReconnectDelay;
pub use client::{
    FilterParams, Params, TwitterStreamClient, UserStreamParams, set_bool_param, set_list_param,
    set_str_param,
};
pub use clock::{Clock, Sleep, TokioClock};
pub use config::TwitterConfig;
pub use decoder::LineDecoder;
pub use error::{TwitterError, TwitterResult};
pub use message::{DirectMessage, StreamMessage, Tweet, UserEvent, UserMention, UserRef};
pub use oauth::OAuthSigner;
pub use response::{BodyStream, ConnectFuture, HttpStreamResponse, StreamResponse};
pub use service::{DisconnectReason, StreamMonitor, StreamService, StreamState};
