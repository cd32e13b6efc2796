//! IEC 61937 burst framing for AC-3 passthrough.
//!
//! One AC-3 sync frame is carried in a burst of 1536 stereo 16-bit frames:
//! an 8-byte preamble, the payload as 16-bit words, then zero padding.

use crate::buffer::StagingBuffer;
use crate::error::PlaybackError;

/// Burst preamble size in bytes.
pub const SPDIF_HEADER_SIZE: usize = 8;

/// Bytes in one AC-3 burst (1536 frames x 2 channels x 2 bytes).
pub const AC3_FRAME_SIZE: usize = 6144;

/// Device period for AC-3 passthrough, in frames.
pub const AC3_PERIOD_FRAMES: usize = 1536;

/// Device buffer for AC-3 passthrough, in frames.
pub const AC3_BUFFER_FRAMES: usize = 6144;

const SYNC_WORD_1: u16 = 0xF872;
const SYNC_WORD_2: u16 = 0x4E1F;
const DATA_TYPE_AC3: u16 = 0x0001;

/// Burst preamble for `payload`.
///
/// The data-type word carries the bitstream mode from the sixth payload
/// byte in its upper half.
pub fn ac3_header(payload: &[u8]) -> [u8; SPDIF_HEADER_SIZE] {
    let bsmod = payload.get(5).map_or(0, |b| u16::from(b & 0x07));
    let length_bits = (payload.len() * 8) as u16;
    let words = [SYNC_WORD_1, SYNC_WORD_2, DATA_TYPE_AC3 | (bsmod << 8), length_bits];

    let mut header = [0u8; SPDIF_HEADER_SIZE];
    for (chunk, word) in header.chunks_exact_mut(2).zip(words) {
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
    header
}

/// Swaps each byte pair on little-endian hosts so the big-endian AC-3
/// stream reads as native 16-bit words.
pub fn swap_words(data: &mut [u8]) {
    if cfg!(target_endian = "little") {
        for pair in data.chunks_exact_mut(2) {
            pair.swap(0, 1);
        }
    }
}

/// Frames the AC-3 payload held in `buffer` in place.
///
/// Returns `Ok(false)` without touching the buffer when the payload does not
/// fit in one burst.
pub fn frame_ac3(buffer: &mut StagingBuffer) -> Result<bool, PlaybackError> {
    if buffer.size() > AC3_FRAME_SIZE - SPDIF_HEADER_SIZE {
        return Ok(false);
    }
    let len = buffer.size();
    let header = ac3_header(buffer.data());
    buffer.prepend(&header)?;
    buffer.grow(AC3_FRAME_SIZE)?;
    // an odd trailing byte pairs with the first padding byte
    let end = SPDIF_HEADER_SIZE + len + len % 2;
    swap_words(&mut buffer.data_mut()[SPDIF_HEADER_SIZE..end]);
    Ok(true)
}

/// Recovers a payload of `len` bytes from a framed burst.
pub fn unframe_ac3(burst: &[u8], len: usize) -> Option<Vec<u8>> {
    let end = SPDIF_HEADER_SIZE.checked_add(len)?;
    let mut payload = burst.get(SPDIF_HEADER_SIZE..end + (len % 2))?.to_vec();
    swap_words(&mut payload);
    payload.truncate(len);
    Some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_words() {
        let mut payload = vec![0u8; 1536];
        payload[5] = 0x03;
        let header = ac3_header(&payload);
        let word = |i: usize| u16::from_ne_bytes([header[i * 2], header[i * 2 + 1]]);
        assert_eq!(word(0), 0xF872);
        assert_eq!(word(1), 0x4E1F);
        assert_eq!(word(2), 0x0301);
        assert_eq!(word(3), 1536 * 8);
    }

    #[test]
    fn test_frame_pads_to_burst() {
        let payload: Vec<u8> = (0..1536u32).map(|i| i as u8).collect();
        let mut buffer = StagingBuffer::from_slice(&payload, 0).unwrap();
        assert!(frame_ac3(&mut buffer).unwrap());
        assert_eq!(buffer.size(), AC3_FRAME_SIZE);
        assert!(buffer.data()[SPDIF_HEADER_SIZE + 1536..].iter().all(|&b| b == 0));
        assert_eq!(unframe_ac3(buffer.data(), 1536).unwrap(), payload);
    }

    #[test]
    fn test_frame_uses_headroom() {
        let mut buffer = StagingBuffer::with_headroom(SPDIF_HEADER_SIZE, AC3_FRAME_SIZE).unwrap();
        buffer.extend_from_slice(&[0x0B, 0x77, 0x01, 0x02]).unwrap();
        let capacity = buffer.capacity();
        assert!(frame_ac3(&mut buffer).unwrap());
        assert_eq!(buffer.capacity(), capacity);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let mut buffer = StagingBuffer::from_slice(&[0u8; AC3_FRAME_SIZE], 0).unwrap();
        assert!(!frame_ac3(&mut buffer).unwrap());
        assert_eq!(buffer.size(), AC3_FRAME_SIZE);
    }

    #[test]
    fn test_odd_payload_round_trip() {
        let payload = [0x0B, 0x77, 0x10];
        let mut buffer = StagingBuffer::from_slice(&payload, 0).unwrap();
        assert!(frame_ac3(&mut buffer).unwrap());
        assert_eq!(unframe_ac3(buffer.data(), 3).unwrap(), payload);
    }
}
