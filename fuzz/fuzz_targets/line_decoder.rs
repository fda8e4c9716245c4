//! Line decoder fuzz target.
//!
//! Splits the input into chunks at arbitrary points and checks that the
//! decoder never panics and that chunking does not change what is decoded.

#![no_main]

use libfuzzer_sys::fuzz_target;
use twitter_stream::LineDecoder;

fuzz_target!(|data: &[u8]| {
    let Some((&split, body)) = data.split_first() else {
        return;
    };

    let mut whole = Vec::new();
    let whole_result = LineDecoder::new().feed(body, |m| whole.push(m));

    let mut chunked = Vec::new();
    let mut decoder = LineDecoder::new();
    let step = usize::from(split).max(1);
    let mut chunked_result = Ok(());
    for chunk in body.chunks(step) {
        chunked_result = decoder.feed(chunk, |m| chunked.push(m));
        if chunked_result.is_err() {
            break;
        }
    }

    assert_eq!(whole_result.is_ok(), chunked_result.is_ok());
    assert_eq!(whole, chunked);
});
