//! Handler dispatch: the routine the trampoline calls once the interrupted
//! context is safe on the stack.

use crate::registry::{HandlerLookup, ThreadKey};

/// Runs the handler registered for `key`, if any.
///
/// Returns `false` when there is no registration, including when one is
/// being updated at this very moment; the event is then dropped.
#[inline]
pub fn dispatch<L: HandlerLookup + ?Sized>(lookup: &L, key: ThreadKey) -> bool {
    let Some(registration) = lookup.lookup(key) else {
        return false;
    };

    // SAFETY: `HandlerRegistry::install` makes the installer vouch for the
    // handler being callable with its context in event context.
    unsafe { (registration.handler)(registration.context) };
    true
}

/// The fixed-name routine every trampoline variant branches to.
///
/// Resolves the handler for the current hardware thread from
/// [`REGISTRY`](crate::registry::REGISTRY). Does not log: it runs with event
/// delivery disabled, at an arbitrary point of the interrupted code.
#[cfg(any(target_arch = "powerpc", target_arch = "powerpc64"))]
#[unsafe(no_mangle)]
pub extern "C" fn __ebb_dispatch() {
    dispatch(&crate::registry::REGISTRY, ThreadKey::current());
}
