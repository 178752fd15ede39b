use bytes::{Bytes, BytesMut};

pub const DEFAULT_PAYLOAD_SIZE: usize = 5 * 1024 * 1024;

const PATTERN_CHUNK: usize = 1024;

/// Builds a deterministic upload payload of exactly `size` bytes.
///
/// The content is a repeating 0..=255 sequence assembled from one reused
/// 1 KiB chunk buffer, so construction is O(size) with constant scratch
/// memory and the same size always yields byte-identical output.
pub fn synthetic_payload(size: usize) -> Bytes {
    let mut chunk = [0u8; PATTERN_CHUNK];
    for (i, byte) in chunk.iter_mut().enumerate() {
        *byte = (i % 256) as u8;
    }

    let mut buf = BytesMut::with_capacity(size);
    let mut remaining = size;
    while remaining > 0 {
        let take = remaining.min(PATTERN_CHUNK);
        buf.extend_from_slice(&chunk[..take]);
        remaining -= take;
    }
    buf.freeze()
}
