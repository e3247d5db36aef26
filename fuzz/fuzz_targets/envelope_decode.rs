//! Fuzz target for the JSON envelope codec
//!
//! Feeds arbitrary bytes to `decode_bytes` looking for:
//! - Panics in normalization
//! - Frames that decode but whose encoding does not decode again
//! - Encodings that are not stable after one normalization pass
//!
//! Invalid input must come back as an error, never a panic.

#![no_main]

use chatwire_proto::{decode, decode_bytes, encode, Envelope};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(envelope) = decode_bytes(data) else {
        return;
    };

    // Re-encoding can add timestamp precision, which may push a frame at the
    // size limit over it.
    let once = encode(&envelope);
    if once.len() > Envelope::MAX_FRAME_SIZE {
        return;
    }

    let again = decode(&once).expect("encoded envelope must decode");
    assert_eq!(encode(&again), once, "encoding is not stable");
});
