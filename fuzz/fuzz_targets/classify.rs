//! Message classification fuzz target.
//!
//! Arbitrary JSON must classify without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use twitter_stream::StreamMessage;

fuzz_target!(|data: &[u8]| {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        let _ = StreamMessage::classify(value);
    }
});
