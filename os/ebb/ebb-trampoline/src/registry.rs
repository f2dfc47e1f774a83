//! # Per-Hardware-Thread Handler Registry
//!
//! Maps a hardware thread, identified by the value of its thread-pointer
//! register, to the handler and opaque context the trampoline invokes.
//!
//! Lookups run in event context on the interrupted thread and must never
//! block: if an `install` on the same thread is what got interrupted, waiting
//! for it would hang forever. Readers therefore take no lock. Each slot
//! carries a sequence counter that writers make odd for the duration of an
//! update; a reader that sees an odd or changed counter treats the slot as
//! empty. Writers are serialized among themselves by a spin lock.

use core::ffi::c_void;
use core::fmt;
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, AtomicU64, Ordering, fence};
use log::{debug, trace};

/// Capacity of the process-wide [`REGISTRY`].
pub const MAX_HARDWARE_THREADS: usize = 256;

/// The handler ABI: called with the registered context as its only argument.
pub type EbbHandler = unsafe extern "C" fn(context: *mut c_void);

/// Identity of a hardware thread: its thread-pointer register value.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadKey(u64);

impl ThreadKey {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// The key of the executing thread (`r13` on 64-bit, `r2` on 32-bit).
    #[cfg(target_arch = "powerpc64")]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    #[must_use]
    pub fn current() -> Self {
        let tp: u64;
        unsafe {
            core::arch::asm!("mr {}, 13", out(reg) tp, options(nomem, nostack, preserves_flags));
        }
        Self(tp)
    }

    /// The key of the executing thread (`r13` on 64-bit, `r2` on 32-bit).
    #[cfg(target_arch = "powerpc")]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    #[must_use]
    pub fn current() -> Self {
        let tp: usize;
        unsafe {
            core::arch::asm!("mr {}, 2", out(reg) tp, options(nomem, nostack, preserves_flags));
        }
        Self(tp as u64)
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A handler together with the context it is called with.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub handler: EbbHandler,
    pub context: *mut c_void,
}

/// The only capability the dispatch path needs.
pub trait HandlerLookup {
    /// The registration of `key`, or `None` if there is none or it is being
    /// updated right now. Must not block.
    fn lookup(&self, key: ThreadKey) -> Option<Registration>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("thread key 0 is reserved")]
    NullKey,
    #[error("all {capacity} registry slots are in use")]
    Full { capacity: usize },
    #[error("no handler installed for thread {key}")]
    NotInstalled { key: ThreadKey },
}

/// Key value of an unused slot.
const FREE: u64 = 0;

struct Slot {
    /// Even: stable. Odd: a writer is updating the fields below.
    seq: AtomicU32,
    key: AtomicU64,
    handler: AtomicPtr<()>,
    context: AtomicPtr<c_void>,
}

impl Slot {
    const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            key: AtomicU64::new(FREE),
            handler: AtomicPtr::new(core::ptr::null_mut()),
            context: AtomicPtr::new(core::ptr::null_mut()),
        }
    }

    /// Caller must hold the writer lock.
    fn publish(&self, key: u64, handler: *mut (), context: *mut c_void) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        self.key.store(key, Ordering::Relaxed);
        self.handler.store(handler, Ordering::Relaxed);
        self.context.store(context, Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    fn read(&self, key: u64) -> Option<Registration> {
        let before = self.seq.load(Ordering::Acquire);
        if before & 1 != 0 || self.key.load(Ordering::Relaxed) != key {
            return None;
        }
        let handler = self.handler.load(Ordering::Relaxed);
        let context = self.context.load(Ordering::Relaxed);
        fence(Ordering::Acquire);
        if self.seq.load(Ordering::Relaxed) != before || handler.is_null() {
            return None;
        }
        // SAFETY: non-null handler pointers are only ever stored from an
        // `EbbHandler` in `install`.
        let handler = unsafe { core::mem::transmute::<*mut (), EbbHandler>(handler) };
        Some(Registration { handler, context })
    }
}

/// Fixed-capacity, allocation-free table of handler registrations.
pub struct HandlerRegistry<const N: usize> {
    writer: AtomicBool,
    slots: [Slot; N],
}

impl<const N: usize> Default for HandlerRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> HandlerRegistry<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            writer: AtomicBool::new(false),
            slots: [const { Slot::new() }; N],
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Installs (or replaces) the handler of `key`.
    ///
    /// # Errors
    /// [`RegistryError::NullKey`] for key `0`, [`RegistryError::Full`] if a
    /// new slot is needed and none is free.
    ///
    /// # Safety
    /// Until it is uninstalled or replaced, `handler` may be called with
    /// `context` from event context on the hardware thread `key`, at any
    /// instruction boundary of that thread. `handler` must be sound to call
    /// with `context` there, must not unwind, and must only use the register
    /// classes of the trampoline variant installed for that thread.
    pub unsafe fn install(
        &self,
        key: ThreadKey,
        handler: EbbHandler,
        context: *mut c_void,
    ) -> Result<(), RegistryError> {
        if key.raw() == FREE {
            return Err(RegistryError::NullKey);
        }

        let _writer = self.lock_writers();
        let index = self
            .position(key.raw())
            .or_else(|| self.position(FREE))
            .ok_or(RegistryError::Full { capacity: N })?;

        self.slots[index].publish(key.raw(), handler as *mut (), context);
        debug!("EBB handler installed for thread {key} in slot {index}");
        Ok(())
    }

    /// Removes the handler of `key` and returns what was registered.
    ///
    /// # Errors
    /// [`RegistryError::NotInstalled`] if `key` has no handler.
    pub fn uninstall(&self, key: ThreadKey) -> Result<Registration, RegistryError> {
        let _writer = self.lock_writers();
        let index = self
            .position(key.raw())
            .filter(|_| key.raw() != FREE)
            .ok_or(RegistryError::NotInstalled { key })?;

        let previous = self.slots[index]
            .read(key.raw())
            .ok_or(RegistryError::NotInstalled { key })?;
        self.slots[index].publish(FREE, core::ptr::null_mut(), core::ptr::null_mut());
        debug!("EBB handler removed for thread {key} from slot {index}");
        Ok(previous)
    }

    /// Number of installed handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.key.load(Ordering::Acquire) != FREE)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn position(&self, key: u64) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.key.load(Ordering::Relaxed) == key)
    }

    fn lock_writers(&self) -> WriterGuard<'_> {
        // Test-and-test-and-set; installs are rare and short.
        while self
            .writer
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.writer.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
        trace!("EBB registry writer lock taken");
        WriterGuard { flag: &self.writer }
    }
}

impl<const N: usize> HandlerLookup for HandlerRegistry<N> {
    #[inline]
    fn lookup(&self, key: ThreadKey) -> Option<Registration> {
        if key.raw() == FREE {
            return None;
        }
        self.slots.iter().find_map(|slot| slot.read(key.raw()))
    }
}

struct WriterGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for WriterGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// The registry the fixed-name dispatch routine resolves handlers from.
pub static REGISTRY: HandlerRegistry<MAX_HARDWARE_THREADS> = HandlerRegistry::new();

#[cfg(test)]
mod test {
    use super::*;

    unsafe extern "C" fn nop(_context: *mut c_void) {}

    #[test]
    fn replacing_keeps_a_single_slot() {
        let registry = HandlerRegistry::<4>::new();
        let key = ThreadKey::new(0x7000);
        let mut a = 1u8;
        let mut b = 2u8;
        unsafe {
            registry.install(key, nop, (&raw mut a).cast()).unwrap();
            registry.install(key, nop, (&raw mut b).cast()).unwrap();
        }
        assert_eq!(registry.len(), 1);
        let got = registry.lookup(key).unwrap();
        assert_eq!(got.context, (&raw mut b).cast());
    }

    #[test]
    fn odd_sequence_hides_the_slot() {
        let slot = Slot::new();
        slot.publish(5, nop as *mut (), core::ptr::null_mut());
        assert!(slot.read(5).is_some());

        // A writer interrupted mid-update.
        slot.seq.fetch_add(1, Ordering::Relaxed);
        assert!(slot.read(5).is_none());
    }
}
