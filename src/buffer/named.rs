//! Buffers derived from a human-readable identifier.
//!
//! Layout: bytes 0..4 hold the lock word (host endian, unlocked), followed
//! by the identifier's UTF-8 bytes, zero-padded to a multiple of 4.
//! Every derivation allocates new memory; the identifier is only a label.

use super::{LockBuffer, SharedWords, UNLOCKED, WORD_BYTES};
use crate::common::LockError;
use std::sync::Arc;

impl LockBuffer {
    /// Build a new buffer labelled with `identifier`.
    pub fn from_name(identifier: &str) -> Result<Self, LockError> {
        if identifier.is_empty() {
            return Err(LockError::InvalidArgument(
                "buffer identifier must be a non-empty string".into(),
            ));
        }
        let mut bytes = Vec::with_capacity(WORD_BYTES + identifier.len() + WORD_BYTES);
        bytes.extend_from_slice(&UNLOCKED.to_ne_bytes());
        bytes.extend_from_slice(identifier.as_bytes());
        Ok(Self {
            region: Arc::new(SharedWords::from_bytes(&bytes)),
        })
    }

    /// Decode the identifier stored after the lock word, if any.
    pub fn identifier(&self) -> Option<String> {
        let bytes = self.to_bytes();
        let tail = bytes.get(WORD_BYTES..)?;
        let end = tail.iter().rposition(|&b| b != 0)? + 1;
        String::from_utf8(tail[..end].to_vec()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorKind;

    #[test]
    fn layout_is_word_aligned() {
        for id in ["x", "ab", "abc", "abcd", "abcde", "lock:session-42", "ключ"] {
            let b = LockBuffer::from_name(id).unwrap();
            assert_eq!(b.byte_len() % 4, 0, "{id}");
            assert!(b.byte_len() >= 4 + id.len());
            assert!(b.byte_len() < 4 + id.len() + 4);
            assert_eq!(b.load(), UNLOCKED);
        }
    }

    #[test]
    fn bytes_follow_the_word() {
        let b = LockBuffer::from_name("hello").unwrap();
        let bytes = b.to_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..4], &[0, 0, 0, 0]);
        assert_eq!(&bytes[4..9], b"hello");
        assert_eq!(&bytes[9..], &[0, 0, 0]);
        assert_eq!(b.identifier().as_deref(), Some("hello"));
    }

    #[test]
    fn derivations_are_independent() {
        let a = LockBuffer::from_name("x").unwrap();
        let b = LockBuffer::from_name("x").unwrap();
        assert!(!a.same_region(&b));
    }

    #[test]
    fn empty_identifier_rejected() {
        let err = LockBuffer::from_name("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn plain_buffer_has_no_identifier() {
        assert_eq!(LockBuffer::create().identifier(), None);
    }
}
