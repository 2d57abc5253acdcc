//! Async waiters keyed by lock-word address.
//!
//! Each waited-on address gets a [`Notify`] slot while at least one task is
//! registered on it. Slots are dropped with their last registration, so a
//! cancelled wait leaves nothing behind.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{fence, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

#[derive(Default)]
struct Slot {
    notify: Notify,
    waiters: AtomicUsize,
}

static SLOTS: Lazy<Mutex<HashMap<usize, Arc<Slot>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Registered tasks across all addresses; lets releases skip the map.
static ACTIVE: AtomicUsize = AtomicUsize::new(0);

/// One task's interest in an address. Deregisters on drop.
pub(crate) struct Registration {
    addr: usize,
    slot: Arc<Slot>,
}

impl Registration {
    pub(crate) fn new(addr: usize) -> Self {
        let slot = {
            let mut slots = SLOTS.lock();
            Arc::clone(slots.entry(addr).or_default())
        };
        slot.waiters.fetch_add(1, Ordering::SeqCst);
        ACTIVE.fetch_add(1, Ordering::SeqCst);
        Self { addr, slot }
    }

    /// Must be enabled before the caller re-checks the word.
    pub(crate) fn notified(&self) -> Notified<'_> {
        self.slot.notify.notified()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        ACTIVE.fetch_sub(1, Ordering::SeqCst);
        self.slot.waiters.fetch_sub(1, Ordering::SeqCst);
        let mut slots = SLOTS.lock();
        // Clones only happen under this lock: map + us means we are the last.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.addr);
        }
    }
}

/// Wake every task registered on `addr`. Returns how many were registered.
///
/// Callers change the word before calling this.
pub(crate) fn wake(addr: usize) -> usize {
    // Pairs with the SeqCst word load a waiter makes after registering.
    fence(Ordering::SeqCst);
    if ACTIVE.load(Ordering::SeqCst) == 0 {
        return 0;
    }
    let slot = SLOTS.lock().get(&addr).cloned();
    match slot {
        Some(slot) => {
            let woken = slot.waiters.load(Ordering::SeqCst);
            slot.notify.notify_waiters();
            woken
        }
        None => 0,
    }
}

#[cfg(test)]
pub(crate) fn registered(addr: usize) -> bool {
    SLOTS.lock().contains_key(&addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn slot_lives_as_long_as_registrations() {
        let addr = Box::into_raw(Box::new(0u32)) as usize;
        let a = Registration::new(addr);
        let b = Registration::new(addr);
        assert!(registered(addr));
        drop(a);
        assert!(registered(addr));
        drop(b);
        assert!(!registered(addr));
        // SAFETY: allocated above, never shared.
        drop(unsafe { Box::from_raw(addr as *mut u32) });
    }

    #[tokio::test]
    async fn wake_reaches_enabled_waiter() {
        let addr = Box::into_raw(Box::new(0u32)) as usize;
        let reg = Registration::new(addr);
        {
            let notified = reg.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            assert_eq!(wake(addr), 1);
            tokio::time::timeout(Duration::from_secs(1), notified)
                .await
                .unwrap();
        }
        drop(reg);
        // SAFETY: allocated above, never shared.
        drop(unsafe { Box::from_raw(addr as *mut u32) });
    }

    #[test]
    fn wake_without_registrations() {
        assert_eq!(wake(usize::MAX - 3), 0);
    }
}
