//! # VSX Register File Aliasing
//!
//! The 64-entry VSX file is defined to overlay the two older banks:
//!
//! ```text
//!          dw0 (bits 0:63)     dw1 (bits 64:127)
//! vs0   ┌───────────────────┬───────────────────┐
//!  …    │ f0 … f31          │ (VSX only)        │
//! vs31  ├───────────────────┴───────────────────┤
//! vs32  │ v0 … v31                              │
//!  …    │                                       │
//! vs63  └───────────────────────────────────────┘
//! ```
//!
//! [`VsxSlot`] expresses one entry as a union of the full quadword and its
//! two doublewords, so a write through the FPR view is visible through the
//! quadword view and vice versa. [`VsxFile`] is the whole bank.

use core::fmt;

/// The two doublewords of a VSR, in architectural (big-endian element) order.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Doublewords {
    /// Doubleword 0; the FPR for `vs0`…`vs31`.
    pub dw0: [u8; 8],
    pub dw1: [u8; 8],
}

/// One 128-bit VSX register, viewable as a quadword or as two doublewords.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub union VsxSlot {
    quad: [u8; 16],
    halves: Doublewords,
}

const _: () = assert!(size_of::<VsxSlot>() == 16);

impl VsxSlot {
    pub const ZERO: Self = Self { quad: [0; 16] };

    #[must_use]
    pub const fn from_quad(quad: [u8; 16]) -> Self {
        Self { quad }
    }

    #[must_use]
    pub const fn quad(&self) -> [u8; 16] {
        // SAFETY: both fields are plain bytes covering the same 16 bytes.
        unsafe { self.quad }
    }

    /// The scalar floating-point view: doubleword 0 as raw `f64` bits.
    #[must_use]
    pub const fn fpr(&self) -> u64 {
        // SAFETY: both fields are plain bytes covering the same 16 bytes.
        u64::from_be_bytes(unsafe { self.halves.dw0 })
    }

    /// Writes the scalar view, leaving doubleword 1 untouched.
    pub const fn set_fpr(&mut self, bits: u64) {
        self.halves.dw0 = bits.to_be_bytes();
    }

    #[must_use]
    pub const fn dw1(&self) -> u64 {
        // SAFETY: both fields are plain bytes covering the same 16 bytes.
        u64::from_be_bytes(unsafe { self.halves.dw1 })
    }

    pub const fn set_dw1(&mut self, bits: u64) {
        self.halves.dw1 = bits.to_be_bytes();
    }
}

impl Default for VsxSlot {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for VsxSlot {
    fn eq(&self, other: &Self) -> bool {
        self.quad() == other.quad()
    }
}

impl Eq for VsxSlot {}

impl fmt::Debug for VsxSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VsxSlot({:#018x}_{:016x})", self.fpr(), self.dw1())
    }
}

/// The 64 VSX registers, with the FPR and VR banks as views into them.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct VsxFile {
    slots: [VsxSlot; 64],
}

impl Default for VsxFile {
    fn default() -> Self {
        Self::new()
    }
}

impl VsxFile {
    /// First VSR that aliases a VR.
    pub const VR_BASE: usize = 32;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [VsxSlot::ZERO; 64],
        }
    }

    #[must_use]
    pub const fn vsr(&self, n: usize) -> VsxSlot {
        self.slots[n]
    }

    pub const fn set_vsr(&mut self, n: usize, value: VsxSlot) {
        self.slots[n] = value;
    }

    /// FPR `n` (raw `f64` bits).
    ///
    /// # Panics
    /// Panics if `n >= 32`.
    #[must_use]
    pub const fn fpr(&self, n: usize) -> u64 {
        assert!(n < Self::VR_BASE, "there are 32 FPRs");
        self.slots[n].fpr()
    }

    /// # Panics
    /// Panics if `n >= 32`.
    pub const fn set_fpr(&mut self, n: usize, bits: u64) {
        assert!(n < Self::VR_BASE, "there are 32 FPRs");
        self.slots[n].set_fpr(bits);
    }

    /// VR `n` as a quadword.
    ///
    /// # Panics
    /// Panics if `n >= 32`.
    #[must_use]
    pub const fn vr(&self, n: usize) -> [u8; 16] {
        assert!(n < 32, "there are 32 VRs");
        self.slots[Self::VR_BASE + n].quad()
    }

    /// # Panics
    /// Panics if `n >= 32`.
    pub const fn set_vr(&mut self, n: usize, quad: [u8; 16]) {
        assert!(n < 32, "there are 32 VRs");
        self.slots[Self::VR_BASE + n] = VsxSlot::from_quad(quad);
    }
}
