//! Fuzz target for [`FrameCodec::decode`]
//!
//! Untrusted bytes straight off a TCP socket.
//!
//! # Strategy
//!
//! - Raw input is split into arbitrary chunks and fed to the codec the way a
//!   connection task would, draining complete frames after every chunk
//! - A small maximum frame size so oversized prefixes are hit often
//!
//! # Invariants
//!
//! - NEVER panic on any input
//! - `Ok(None)` leaves the buffer untouched
//! - A decoded request re-encodes and decodes to itself

#![no_main]

use arbitrary::Arbitrary;
use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use spidlink_proto::{FrameCodec, Request};

#[derive(Debug, Arbitrary)]
struct Input {
    chunks: Vec<Vec<u8>>,
    max_frame_size: u16,
}

fuzz_target!(|input: Input| {
    let codec = FrameCodec::new(usize::from(input.max_frame_size));
    let mut buf = BytesMut::new();

    for chunk in input.chunks {
        buf.extend_from_slice(&chunk);

        loop {
            let before = buf.len();
            match codec.decode::<Request>(&mut buf) {
                Ok(Some(request)) => {
                    let mut encoded = BytesMut::new();
                    if codec.encode(&request, &mut encoded).is_ok() {
                        let decoded = codec.decode::<Request>(&mut encoded);
                        assert!(matches!(decoded, Ok(Some(ref r)) if *r == request));
                    }
                },
                Ok(None) => {
                    assert_eq!(buf.len(), before, "partial frame consumed");
                    break;
                },
                Err(_) => return,
            }
        }
    }
});
