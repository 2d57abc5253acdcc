//! Memory regions that can carry a lock word.

use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};

/// Who can observe writes to a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sharing {
    /// Visible to every thread of this process.
    Thread,
    /// Mapped into several processes (e.g. a shm segment).
    Process,
    /// An owned allocation that no other participant can reach.
    Private,
}

/// A block of memory a lock buffer can live in.
///
/// # Safety
///
/// `as_ptr()` must stay valid for reads and atomic writes of `byte_len()`
/// bytes for as long as the implementor is alive, must never move, and
/// must only be accessed atomically by other participants.
pub unsafe trait Region: Send + Sync + 'static {
    fn as_ptr(&self) -> *const u8;
    fn byte_len(&self) -> usize;
    fn sharing(&self) -> Sharing;
}

/// Heap-allocated 32-bit atomic cells shared between threads.
pub struct SharedWords {
    words: Box<[AtomicU32]>,
}

impl SharedWords {
    pub fn zeroed(words: usize) -> Self {
        Self {
            words: (0..words).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Copy `bytes` into fresh cells, zero-padding the tail to a 4-byte boundary.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let words = bytes
            .chunks(4)
            .map(|chunk| {
                let mut w = [0u8; 4];
                w[..chunk.len()].copy_from_slice(chunk);
                AtomicU32::new(u32::from_ne_bytes(w))
            })
            .collect();
        Self { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn load(&self, idx: usize) -> Option<u32> {
        self.words.get(idx).map(|w| w.load(Ordering::Acquire))
    }
}

// SAFETY: the boxed slice is never reallocated and all access goes through AtomicU32.
unsafe impl Region for SharedWords {
    fn as_ptr(&self) -> *const u8 {
        self.words.as_ptr() as *const u8
    }

    fn byte_len(&self) -> usize {
        std::mem::size_of_val(&*self.words)
    }

    fn sharing(&self) -> Sharing {
        Sharing::Thread
    }
}

// SAFETY: the pointer and length describe the vector's live storage. The
// region reports itself private, so buffer validation rejects it before any
// atomic access is made through it.
unsafe impl Region for Vec<u8> {
    fn as_ptr(&self) -> *const u8 {
        self.as_slice().as_ptr()
    }

    fn byte_len(&self) -> usize {
        self.len()
    }

    fn sharing(&self) -> Sharing {
        Sharing::Private
    }
}

/// Memory mapped by the caller, e.g. a shm segment shared with other processes.
pub struct ForeignRegion {
    ptr: *const u8,
    len: usize,
    sharing: Sharing,
    _owner: Box<dyn Any + Send + Sync>,
}

// SAFETY: the constructor's contract requires the memory to be shareable
// across threads, and it is only touched through atomics.
unsafe impl Send for ForeignRegion {}
unsafe impl Sync for ForeignRegion {}

impl ForeignRegion {
    /// Wrap externally managed memory.
    ///
    /// `owner` is kept alive as long as the region and should own the mapping.
    ///
    /// # Safety
    ///
    /// `ptr..ptr+len` must stay mapped and writable while `owner` is alive,
    /// and every other participant must access it only through 32-bit atomics.
    pub unsafe fn from_raw_parts(
        ptr: *const u8,
        len: usize,
        sharing: Sharing,
        owner: Box<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            ptr,
            len,
            sharing,
            _owner: owner,
        }
    }
}

// SAFETY: upheld by the `from_raw_parts` contract.
unsafe impl Region for ForeignRegion {
    fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    fn byte_len(&self) -> usize {
        self.len
    }

    fn sharing(&self) -> Sharing {
        self.sharing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_pads_tail() {
        let w = SharedWords::from_bytes(&[1, 2, 3, 4, 5]);
        assert_eq!(w.len(), 2);
        assert_eq!(w.byte_len(), 8);
        assert_eq!(w.load(1), Some(u32::from_ne_bytes([5, 0, 0, 0])));
    }

    #[test]
    fn region_kinds() {
        assert_eq!(SharedWords::zeroed(1).sharing(), Sharing::Thread);
        assert_eq!(vec![0u8; 4].sharing(), Sharing::Private);
        assert!(SharedWords::zeroed(0).is_empty());
    }
}
