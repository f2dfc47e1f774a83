//! # Trampoline Entry Points
//!
//! Four naked functions per target, one per [`Variant`]. The address of the
//! one matching the handler's register usage goes into the EBB handler
//! register; see [`entry_point`]. Each performs
//!
//! ```text
//! reserve frame → save GPRs → save CR/LR/CTR/XER (via r0)
//!   → [save FPRs, FPSCR] → [save VRs, VSCR, VRSAVE] | [save VSRs, FPSCR, VSCR, VRSAVE]
//!   → establish TOC (64-bit) → bl __ebb_dispatch
//!   → restore the same, control registers before data, GPRs last
//!   → release frame → rfebb 1
//! ```
//!
//! with every displacement taken from the matching [`FrameLayout`] constant.
//! `r0` and `r12` are only used as scratch after their own values are saved,
//! and `f0`/`v0` only after theirs.
//!
//! The two floating-point and vector control registers are captured
//! differently. The VSCR only leaves the vector unit through a VR, so it is
//! splatted across all four words and written with a 16-byte `stvx`. The
//! FPSCR lands in the low word of `f0` after `mffs` and is written with a
//! scalar 8-byte `stfd`; no wide store is involved. Both are reloaded the
//! same way they were stored.
//!
//! [`FrameLayout`]: ebb_frame::FrameLayout

use ebb_frame::Variant;

/// Signature of an entry point. Never to be called from Rust: it is entered
/// by the event-based branch facility and leaves through `rfebb`.
pub type EntryFn = unsafe extern "C" fn() -> !;

macro_rules! save_fprs {
    () => {
        concat!(
            ".irp f, 0,1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20,21,22,23,24,25,26,27,28,29,30,31\n",
            "stfd \\f, {fpr}+8*\\f(1)\n",
            ".endr\n",
            "mffs 0\n",
            "stfd 0, {fpscr}(1)\n",
        )
    };
}

macro_rules! restore_fprs {
    () => {
        concat!(
            "lfd 0, {fpscr}(1)\n",
            "mtfsf 0xff, 0\n",
            ".irp f, 0,1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20,21,22,23,24,25,26,27,28,29,30,31\n",
            "lfd \\f, {fpr}+8*\\f(1)\n",
            ".endr\n",
        )
    };
}

macro_rules! save_vrs {
    () => {
        concat!(
            ".irp v, 0,1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20,21,22,23,24,25,26,27,28,29,30,31\n",
            "li 12, {vr}+16*\\v\n",
            "stvx \\v, 1, 12\n",
            ".endr\n",
        )
    };
}

macro_rules! restore_vrs {
    () => {
        concat!(
            ".irp v, 0,1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20,21,22,23,24,25,26,27,28,29,30,31\n",
            "li 12, {vr}+16*\\v\n",
            "lvx \\v, 1, 12\n",
            ".endr\n",
        )
    };
}

macro_rules! save_vsrs {
    () => {
        concat!(
            ".irp x, 0,1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20,21,22,23,24,25,26,27,28,29,30,31,",
            "32,33,34,35,36,37,38,39,40,41,42,43,44,45,46,47,48,49,50,51,52,53,54,55,56,57,58,59,60,61,62,63\n",
            "li 12, {vsr}+16*\\x\n",
            "stxvd2x \\x, 1, 12\n",
            ".endr\n",
        )
    };
}

macro_rules! restore_vsrs {
    () => {
        concat!(
            ".irp x, 0,1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20,21,22,23,24,25,26,27,28,29,30,31,",
            "32,33,34,35,36,37,38,39,40,41,42,43,44,45,46,47,48,49,50,51,52,53,54,55,56,57,58,59,60,61,62,63\n",
            "li 12, {vsr}+16*\\x\n",
            "lxvd2x \\x, 1, 12\n",
            ".endr\n",
        )
    };
}

// `fpscr` is saved with the data banks in the FP variants, after them in the
// VSX variant. These two cover the latter.
macro_rules! save_fpscr {
    () => {
        concat!("mffs 0\n", "stfd 0, {fpscr}(1)\n")
    };
}

macro_rules! restore_fpscr {
    () => {
        concat!("lfd 0, {fpscr}(1)\n", "mtfsf 0xff, 0\n")
    };
}

// VSCR is only reachable through a VR. Splatting word 3 makes the slot read
// back correctly whatever the byte order.
macro_rules! save_vscr_vrsave {
    () => {
        concat!(
            "mfvscr 0\n",
            "vspltw 0, 0, 3\n",
            "li 12, {vscr}\n",
            "stvx 0, 1, 12\n",
            "mfspr 0, 256\n",
            "stw 0, {vrsave}(1)\n",
        )
    };
}

macro_rules! restore_vscr {
    () => {
        concat!("li 12, {vscr}\n", "lvx 0, 1, 12\n", "mtvscr 0\n")
    };
}

macro_rules! restore_vrsave {
    () => {
        concat!("lwz 0, {vrsave}(1)\n", "mtspr 256, 0\n")
    };
}

#[cfg(target_arch = "powerpc64")]
mod ppc64;
#[cfg(target_arch = "powerpc64")]
pub use ppc64::{ebb_entry_gpr, ebb_entry_gpr_fp, ebb_entry_gpr_fp_vec, ebb_entry_gpr_fp_vsx};

#[cfg(target_arch = "powerpc")]
mod ppc32;
#[cfg(target_arch = "powerpc")]
pub use ppc32::{ebb_entry_gpr, ebb_entry_gpr_fp, ebb_entry_gpr_fp_vec, ebb_entry_gpr_fp_vsx};

/// The entry point implementing `variant`.
#[must_use]
pub fn entry_fn(variant: Variant) -> EntryFn {
    match variant {
        Variant::Gpr => ebb_entry_gpr,
        Variant::GprFp => ebb_entry_gpr_fp,
        Variant::GprFpVec => ebb_entry_gpr_fp_vec,
        Variant::GprFpVsx => ebb_entry_gpr_fp_vsx,
    }
}

/// The code address to program into the EBB handler register for `variant`.
#[must_use]
pub fn entry_point(variant: Variant) -> usize {
    code_address(entry_fn(variant))
}

/// ELFv1 function pointers refer to a descriptor whose first word is the
/// code address.
#[cfg(all(target_arch = "powerpc64", target_endian = "big"))]
fn code_address(entry: EntryFn) -> usize {
    let descriptor = entry as usize as *const usize;
    // SAFETY: every ELFv1 function symbol is a descriptor in `.opd`.
    unsafe { descriptor.read() }
}

#[cfg(not(all(target_arch = "powerpc64", target_endian = "big")))]
fn code_address(entry: EntryFn) -> usize {
    entry as usize
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_variant_has_a_distinct_entry() {
        let mut addresses: Vec<_> = Variant::ALL.into_iter().map(entry_point).collect();
        addresses.sort_unstable();
        addresses.dedup();
        assert_eq!(addresses.len(), Variant::ALL.len());
        assert!(addresses.iter().all(|&address| address % 4 == 0));
    }
}
