//! # Typed Power ISA Status and Control Registers
//!
//! The registers an event-based branch trampoline has to carry across a
//! handler call besides the data register banks:
//!
//! | Register | Width | Access |
//! |----------|-------|--------|
//! | [`Cr`](cr::Cr) | 32 | `mfcr` / `mtcrf 0xff` |
//! | [`Xer`](xer::Xer) | word | `mfxer` / `mtxer` |
//! | [`Fpscr`](fpscr::Fpscr) | 32 | `mffs` / `mtfsf 0xff` (through an FPR) |
//! | [`Vscr`](vscr::Vscr) | 32 | `mfvscr` / `mtvscr` (through a VR) |
//! | [`Vrsave`](vrsave::Vrsave) | 32 | `mfspr 256` / `mtspr 256` |
//!
//! The FPSCR and VSCR cannot be moved to a GPR directly; they are read and
//! written through a temporary floating-point or vector register. The
//! instruction-backed [`LoadRegister`]/[`StoreRegister`] implementations are
//! only compiled for Power ISA targets with the `asm` feature.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![cfg_attr(
    all(feature = "asm", any(target_arch = "powerpc", target_arch = "powerpc64")),
    feature(asm_experimental_arch)
)]
#![allow(unsafe_code)]

pub mod cr;
pub mod fpscr;
pub mod vrsave;
pub mod vscr;
pub mod xer;

pub use cr::Cr;
pub use fpscr::Fpscr;
pub use vrsave::Vrsave;
pub use vscr::Vscr;
pub use xer::Xer;

pub trait LoadRegister {
    /// Query the live register value of the executing hardware thread.
    fn load() -> Self;
}

pub trait StoreRegister {
    /// Overwrite the live register value of the executing hardware thread.
    fn store(self);
}
