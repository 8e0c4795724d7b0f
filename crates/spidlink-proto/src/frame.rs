//! Length-prefixed CBOR framing.
//!
//! Each frame is a 4-byte big-endian payload length followed by the CBOR
//! payload. The codec is Sans-IO: callers feed it a `BytesMut` read buffer
//! and write the encoded bytes themselves.

use bytes::{Buf, BufMut, BytesMut};
use serde::{Serialize, de::DeserializeOwned};

use crate::ProtoError;

/// Size of the length prefix in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Default maximum payload size (64 KiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Encoder/decoder for length-prefixed CBOR frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a codec that rejects payloads larger than `max_frame_size`.
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Maximum accepted payload size.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Append one encoded frame for `message` to `dst`.
    ///
    /// `dst` is left untouched if encoding fails or the payload is too large.
    pub fn encode<T: Serialize>(&self, message: &T, dst: &mut BytesMut) -> Result<(), ProtoError> {
        let mut payload = Vec::new();
        ciborium::ser::into_writer(message, &mut payload)
            .map_err(|e| ProtoError::Encode(e.to_string()))?;

        if payload.len() > self.max_frame_size {
            return Err(ProtoError::FrameTooLarge { size: payload.len(), max: self.max_frame_size });
        }

        let len = u32::try_from(payload.len()).map_err(|_| ProtoError::FrameTooLarge {
            size: payload.len(),
            max: self.max_frame_size,
        })?;

        dst.reserve(FRAME_HEADER_SIZE + payload.len());
        dst.put_u32(len);
        dst.put_slice(&payload);
        Ok(())
    }

    /// Decode one frame from the front of `src`.
    ///
    /// Returns `Ok(None)` when `src` does not yet hold a complete frame; the
    /// buffer is only consumed once a full frame is available. An oversized
    /// length prefix is rejected before the payload arrives.
    pub fn decode<T: DeserializeOwned>(&self, src: &mut BytesMut) -> Result<Option<T>, ProtoError> {
        if src.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let mut header = [0u8; FRAME_HEADER_SIZE];
        header.copy_from_slice(&src[..FRAME_HEADER_SIZE]);
        let len = u32::from_be_bytes(header) as usize;

        if len > self.max_frame_size {
            return Err(ProtoError::FrameTooLarge { size: len, max: self.max_frame_size });
        }

        if src.len() < FRAME_HEADER_SIZE + len {
            src.reserve(FRAME_HEADER_SIZE + len - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_SIZE);
        let payload = src.split_to(len);

        ciborium::de::from_reader(&payload[..])
            .map(Some)
            .map_err(|e| ProtoError::Decode(e.to_string()))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;

    fn association_request() -> Request {
        Request::RequestAssociation {
            user_id: "6f1c8a4e-2b1d-4c55-9a0e-0d1f2e3c4b5a".to_string(),
            spid_id: "0a9b8c7d-6e5f-4a3b-8c2d-1e0f9a8b7c6d".to_string(),
        }
    }

    #[test]
    fn decode_waits_for_full_frame() {
        let codec = FrameCodec::default();
        let mut encoded = BytesMut::new();
        codec.encode(&association_request(), &mut encoded).unwrap();

        let mut partial = BytesMut::from(&encoded[..encoded.len() - 1]);
        let result: Option<Request> = codec.decode(&mut partial).unwrap();
        assert!(result.is_none());
        assert_eq!(partial.len(), encoded.len() - 1, "partial frame must not be consumed");

        partial.extend_from_slice(&encoded[encoded.len() - 1..]);
        let decoded: Option<Request> = codec.decode(&mut partial).unwrap();
        assert_eq!(decoded, Some(association_request()));
        assert!(partial.is_empty());
    }

    #[test]
    fn decode_handles_back_to_back_frames() {
        let codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(&association_request(), &mut buf).unwrap();
        codec.encode(&Request::GetSpid { spid_id: "x".to_string() }, &mut buf).unwrap();

        let first: Option<Request> = codec.decode(&mut buf).unwrap();
        let second: Option<Request> = codec.decode(&mut buf).unwrap();
        let third: Option<Request> = codec.decode(&mut buf).unwrap();

        assert_eq!(first, Some(association_request()));
        assert_eq!(second, Some(Request::GetSpid { spid_id: "x".to_string() }));
        assert!(third.is_none());
    }

    #[test]
    fn decode_rejects_oversized_length_prefix() {
        let codec = FrameCodec::new(16);
        let mut buf = BytesMut::new();
        buf.put_u32(17);

        let result: Result<Option<Request>, _> = codec.decode(&mut buf);
        assert!(matches!(result, Err(ProtoError::FrameTooLarge { size: 17, max: 16 })));
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let codec = FrameCodec::new(8);
        let mut buf = BytesMut::new();

        let result = codec.encode(&association_request(), &mut buf);
        assert!(matches!(result, Err(ProtoError::FrameTooLarge { .. })));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_reports_garbage_payload() {
        let codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        buf.put_u32(3);
        buf.put_slice(&[0xff, 0xff, 0xff]);

        let result: Result<Option<Request>, _> = codec.decode(&mut buf);
        assert!(matches!(result, Err(ProtoError::Decode(_))));
    }

    proptest::proptest! {
        #[test]
        fn decode_never_panics_on_arbitrary_input(
            bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)
        ) {
            let codec = FrameCodec::new(128);
            let mut buf = BytesMut::from(&bytes[..]);
            let before = buf.len();

            match codec.decode::<Request>(&mut buf) {
                Ok(None) => proptest::prop_assert_eq!(buf.len(), before),
                Ok(Some(_)) | Err(_) => {},
            }
        }
    }
}
