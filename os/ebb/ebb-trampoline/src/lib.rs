//! # Event-Based Branch Trampoline
//!
//! When a Power ISA event-based branch fires, the processor jumps to a
//! single handler address with the interrupted code's registers still live.
//! The entry points in this crate are that address: they save the registers
//! of one [`Variant`](ebb_frame::Variant) into a stack frame, call the
//! handler registered for the current hardware thread, restore everything
//! and return with `rfebb`.
//!
//! | Piece | Where |
//! |-------|-------|
//! | Naked entry points (Power ISA only) | `entry` |
//! | Fixed-name dispatch routine | [`dispatch`] |
//! | Per-thread handler table | [`registry`] |
//! | TOC establishment | [`addressing`] |
//! | Invocation states | [`state`] |
//! | Host-side model of the sequence | [`emulate`] |
//!
//! ## Installing a handler
//!
//! ```rust
//! # use core::ffi::c_void;
//! # use ebb_trampoline::registry::{HandlerLookup, HandlerRegistry, ThreadKey};
//! unsafe extern "C" fn on_event(_context: *mut c_void) {}
//!
//! let registry = HandlerRegistry::<4>::new();
//! let thread = ThreadKey::new(0x7fff_0000_7000);
//! unsafe { registry.install(thread, on_event, core::ptr::null_mut()) }.unwrap();
//! assert!(registry.lookup(thread).is_some());
//! ```
//!
//! On a Power ISA target the address to program into the EBB handler register
//! is then `entry::entry_point(Variant::GprFp)` (or whichever variant covers
//! the registers the handler uses), with handlers installed into
//! [`registry::REGISTRY`].

#![cfg_attr(not(any(test, doctest)), no_std)]
#![cfg_attr(
    any(target_arch = "powerpc", target_arch = "powerpc64"),
    feature(asm_experimental_arch)
)]
#![allow(unsafe_code)]

pub mod addressing;
pub mod dispatch;
#[cfg(feature = "emulate")]
pub mod emulate;
#[cfg(all(feature = "entry", any(target_arch = "powerpc", target_arch = "powerpc64")))]
pub mod entry;
pub mod registry;
pub mod state;

pub use dispatch::dispatch;
pub use registry::{
    EbbHandler, HandlerLookup, HandlerRegistry, MAX_HARDWARE_THREADS, REGISTRY, Registration,
    RegistryError, ThreadKey,
};
pub use state::TrampolineState;
