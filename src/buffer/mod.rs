//! Lock buffers: validated memory regions whose first 32-bit cell is the lock word.

mod named;
mod region;

pub use region::{ForeignRegion, Region, Sharing, SharedWords};

use crate::common::LockError;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Lock word value when nobody holds the lock.
pub const UNLOCKED: u32 = 0;
/// Lock word value while the lock is held.
pub const LOCKED: u32 = 1;

pub const WORD_BYTES: usize = mem::size_of::<AtomicU32>();

/// Check that a region can carry a lock word. Reads no memory.
pub fn validate_region(region: &dyn Region) -> Result<(), LockError> {
    let ptr = region.as_ptr();
    let len = region.byte_len();

    if ptr.is_null() {
        return Err(LockError::InvalidBuffer("region base pointer is null".into()));
    }
    if (ptr as usize) % mem::align_of::<AtomicU32>() != 0 {
        return Err(LockError::InvalidBuffer(format!(
            "region base {:p} is not aligned for 32-bit atomic cells",
            ptr
        )));
    }
    if len % WORD_BYTES != 0 {
        return Err(LockError::InvalidBuffer(format!(
            "region length {} is not a whole number of 32-bit cells",
            len
        )));
    }
    if len < WORD_BYTES {
        return Err(LockError::InvalidBuffer(format!(
            "region holds {} bytes, at least {} required",
            len, WORD_BYTES
        )));
    }
    if region.sharing() == Sharing::Private {
        return Err(LockError::InvalidBuffer(
            "region is backed by private memory and cannot be shared between participants".into(),
        ));
    }
    Ok(())
}

/// Shared handle to a validated region. Clones refer to the same memory.
#[derive(Clone)]
pub struct LockBuffer {
    region: Arc<dyn Region>,
}

impl LockBuffer {
    /// Allocate a fresh one-word buffer, initialised unlocked.
    pub fn create() -> Self {
        Self {
            region: Arc::new(SharedWords::zeroed(1)),
        }
    }

    /// Validate and wrap a caller-supplied region.
    pub fn from_region<R: Region>(region: R) -> Result<Self, LockError> {
        validate_region(&region)?;
        Ok(Self {
            region: Arc::new(region),
        })
    }

    /// Validate and wrap a region that is already reference counted.
    pub fn from_shared(region: Arc<dyn Region>) -> Result<Self, LockError> {
        validate_region(&*region)?;
        Ok(Self { region })
    }

    /// Re-run region validation.
    pub fn validate(&self) -> Result<(), LockError> {
        validate_region(&*self.region)
    }

    /// The lock word (cell 0).
    pub fn word(&self) -> &AtomicU32 {
        // SAFETY: validation guarantees a non-null, aligned region of at
        // least one cell, and the Region contract keeps it alive and fixed
        // for as long as `self.region` is.
        unsafe { &*(self.region.as_ptr() as *const AtomicU32) }
    }

    /// All cells of the region, lock word first.
    pub fn words(&self) -> &[AtomicU32] {
        // SAFETY: as for `word`; the length is a whole number of cells.
        unsafe {
            std::slice::from_raw_parts(
                self.region.as_ptr() as *const AtomicU32,
                self.region.byte_len() / WORD_BYTES,
            )
        }
    }

    /// Address of the lock word; the parking key for waiters.
    pub fn addr(&self) -> usize {
        self.region.as_ptr() as usize
    }

    pub fn byte_len(&self) -> usize {
        self.region.byte_len()
    }

    pub fn sharing(&self) -> Sharing {
        self.region.sharing()
    }

    pub fn load(&self) -> u32 {
        self.word().load(Ordering::Acquire)
    }

    /// True when both buffers refer to the same memory.
    pub fn same_region(&self, other: &LockBuffer) -> bool {
        self.addr() == other.addr()
    }

    /// Snapshot of the region's bytes in host byte order.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words()
            .iter()
            .flat_map(|w| w.load(Ordering::Relaxed).to_ne_bytes())
            .collect()
    }
}

impl fmt::Debug for LockBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockBuffer")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("byte_len", &self.byte_len())
            .field("sharing", &self.sharing())
            .field("word", &self.load())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorKind;

    struct Misaligned {
        inner: SharedWords,
    }

    unsafe impl Region for Misaligned {
        fn as_ptr(&self) -> *const u8 {
            unsafe { self.inner.as_ptr().add(1) }
        }
        fn byte_len(&self) -> usize {
            4
        }
        fn sharing(&self) -> Sharing {
            Sharing::Thread
        }
    }

    fn invalid_message<R: Region>(r: R) -> String {
        let err = LockBuffer::from_region(r).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidBuffer);
        err.to_string()
    }

    #[test]
    fn create_is_one_unlocked_word() {
        let b = LockBuffer::create();
        assert_eq!(b.byte_len(), 4);
        assert_eq!(b.load(), UNLOCKED);
        assert_eq!(b.sharing(), Sharing::Thread);
        assert!(b.validate().is_ok());
    }

    #[test]
    fn rejects_empty_region() {
        assert!(invalid_message(SharedWords::zeroed(0)).contains("at least 4"));
    }

    #[test]
    fn rejects_private_memory() {
        assert!(invalid_message(vec![0u8; 8]).contains("private"));
    }

    #[test]
    fn rejects_misaligned_cells() {
        let r = Misaligned {
            inner: SharedWords::zeroed(2),
        };
        assert!(invalid_message(r).contains("aligned"));
    }

    #[test]
    fn rejects_partial_cells() {
        let words = Arc::new(SharedWords::zeroed(2));
        let keep = Arc::clone(&words);
        let r = unsafe {
            ForeignRegion::from_raw_parts(words.as_ptr(), 6, Sharing::Process, Box::new(keep))
        };
        assert!(invalid_message(r).contains("whole number"));
    }

    #[test]
    fn foreign_region_shares_memory() {
        let words = Arc::new(SharedWords::zeroed(1));
        let keep = Arc::clone(&words);
        let r = unsafe {
            ForeignRegion::from_raw_parts(words.as_ptr(), 4, Sharing::Process, Box::new(keep))
        };
        let b = LockBuffer::from_region(r).unwrap();
        b.word().store(LOCKED, Ordering::Release);
        assert_eq!(words.load(0), Some(LOCKED));
        assert_eq!(b.sharing(), Sharing::Process);
    }

    #[test]
    fn clones_share_identity() {
        let a = LockBuffer::create();
        let b = a.clone();
        assert!(a.same_region(&b));
        assert!(!a.same_region(&LockBuffer::create()));
    }
}
