//! Wire layout of the shared mailbox.
//!
//! The mailbox is a single byte-packed record shared by exactly one producer
//! (the host) and one consumer (the worker):
//!
//! ```text
//! offset  size  field
//! 0       1     has_new_job       (bool, atomic)
//! 1       1     is_audio_playing  (bool, atomic)
//! 2       8192  text              (NUL terminated)
//! 8194    64    voice_id          (NUL terminated)
//! 8258    4     speed             (f32, native endian)
//! ```

use std::mem::{offset_of, size_of};
use std::path::PathBuf;

/// Version tag baked into the segment name. Bump on any layout change.
pub const BRIDGE_VERSION: &str = "v1";

/// Session-local name of the shared segment.
pub const SEGMENT_NAME: &str = "EC_DATA_POOL_01_v1";

/// Capacity of the text buffer, terminator included.
pub const TEXT_CAPACITY: usize = 8192;

/// Capacity of the voice id buffer, terminator included.
pub const VOICE_ID_CAPACITY: usize = 64;

/// Packed record as it sits in shared memory. Never instantiated; it only
/// fixes the field offsets.
#[repr(C, packed)]
#[allow(dead_code)]
pub struct SharedVoiceData {
    has_new_job: u8,
    is_audio_playing: u8,
    text: [u8; TEXT_CAPACITY],
    voice_id: [u8; VOICE_ID_CAPACITY],
    speed: f32,
}

pub const MAILBOX_SIZE: usize = size_of::<SharedVoiceData>();

pub(crate) const HAS_NEW_JOB_OFFSET: usize = offset_of!(SharedVoiceData, has_new_job);
pub(crate) const IS_AUDIO_PLAYING_OFFSET: usize = offset_of!(SharedVoiceData, is_audio_playing);
pub(crate) const TEXT_OFFSET: usize = offset_of!(SharedVoiceData, text);
pub(crate) const VOICE_ID_OFFSET: usize = offset_of!(SharedVoiceData, voice_id);
pub(crate) const SPEED_OFFSET: usize = offset_of!(SharedVoiceData, speed);

const _: () = assert!(MAILBOX_SIZE == 2 + TEXT_CAPACITY + VOICE_ID_CAPACITY + 4);
const _: () = assert!(SPEED_OFFSET == 8258);

/// One synthesis request as read out of the mailbox.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub text: String,
    pub voice_id: String,
    /// Speed multiplier, 1.0 is the nominal rate.
    pub speed: f32,
}

/// Copy `src` into `field`, keeping at most `field.len() - 1` bytes and
/// writing a NUL terminator after them.
///
/// Returns the number of payload bytes stored (terminator excluded).
pub fn encode_bounded(src: &[u8], field: &mut [u8]) -> usize {
    let Some(max) = field.len().checked_sub(1) else {
        return 0;
    };
    let len = src.len().min(max);
    field[..len].copy_from_slice(&src[..len]);
    field[len] = 0;
    len
}

/// Read a NUL terminated field back into a `String`.
///
/// A field without a terminator is read in full. Bytes that are not valid
/// UTF-8 (for example a multi-byte character cut by truncation) are replaced.
pub fn decode_bounded(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Directory that backs named segments on this platform.
pub fn default_segment_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let shm = PathBuf::from("/dev/shm");
        if shm.is_dir() {
            return shm;
        }
    }
    std::env::temp_dir()
}

/// Full path of the default named segment.
pub fn default_segment_path() -> PathBuf {
    default_segment_dir().join(SEGMENT_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn layout_matches_wire_format() {
        assert_eq!(HAS_NEW_JOB_OFFSET, 0);
        assert_eq!(IS_AUDIO_PLAYING_OFFSET, 1);
        assert_eq!(TEXT_OFFSET, 2);
        assert_eq!(VOICE_ID_OFFSET, 2 + TEXT_CAPACITY);
        assert_eq!(MAILBOX_SIZE, 8262);
    }

    #[test]
    fn segment_name_carries_version() {
        assert!(SEGMENT_NAME.ends_with(BRIDGE_VERSION));
    }

    #[test]
    fn short_input_is_copied_verbatim() {
        let mut field = [0xAAu8; 8];
        assert_eq!(encode_bounded(b"abc", &mut field), 3);
        assert_eq!(&field[..4], b"abc\0");
        assert_eq!(decode_bounded(&field), "abc");
    }

    #[test]
    fn input_at_capacity_keeps_room_for_terminator() {
        let mut field = [0u8; 4];
        assert_eq!(encode_bounded(b"abcd", &mut field), 3);
        assert_eq!(&field, b"abc\0");
    }

    #[test]
    fn empty_field_stores_nothing() {
        let mut field: [u8; 0] = [];
        assert_eq!(encode_bounded(b"abc", &mut field), 0);
    }

    #[test]
    fn decode_without_terminator_reads_whole_field() {
        assert_eq!(decode_bounded(b"xyz"), "xyz");
    }

    #[test]
    fn truncated_multibyte_character_is_replaced() {
        let mut field = [0u8; 3];
        encode_bounded("aé".as_bytes(), &mut field);
        assert_eq!(decode_bounded(&field), "a\u{FFFD}");
    }

    proptest! {
        #[test]
        fn long_text_keeps_first_capacity_minus_one_bytes(
            text in proptest::collection::vec(1u8..=255, TEXT_CAPACITY..TEXT_CAPACITY + 512)
        ) {
            let mut field = vec![0u8; TEXT_CAPACITY];
            let stored = encode_bounded(&text, &mut field);
            prop_assert_eq!(stored, TEXT_CAPACITY - 1);
            prop_assert_eq!(&field[..TEXT_CAPACITY - 1], &text[..TEXT_CAPACITY - 1]);
            prop_assert_eq!(field[TEXT_CAPACITY - 1], 0);
        }

        #[test]
        fn voice_id_never_exceeds_capacity(id in "[a-z0-9_]{0,200}") {
            let mut field = [0u8; VOICE_ID_CAPACITY];
            let stored = encode_bounded(id.as_bytes(), &mut field);
            prop_assert!(stored < VOICE_ID_CAPACITY);
            prop_assert_eq!(decode_bounded(&field), &id[..stored]);
        }
    }
}
