use bitfield_struct::bitfield;

/// Binary floating-point rounding mode (`FPSCR[RN]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RoundingMode {
    Nearest = 0b00,
    TowardZero = 0b01,
    TowardPositive = 0b10,
    TowardNegative = 0b11,
}

impl RoundingMode {
    const fn into_bits(self) -> u8 {
        self as u8
    }

    const fn from_bits(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Self::Nearest,
            0b01 => Self::TowardZero,
            0b10 => Self::TowardPositive,
            _ => Self::TowardNegative,
        }
    }
}

/// Floating-Point Status and Control Register, low word (ISA bits 32:63).
///
/// The trampoline moves it with `mffs`/`mtfsf 0xff`, which covers exactly
/// this word. The decimal rounding mode in the high word is not carried.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct Fpscr {
    /// Rounding mode.
    #[bits(2)]
    pub rn: RoundingMode,
    /// Non-IEEE mode.
    pub ni: bool,
    /// Inexact exception enable.
    pub xe: bool,
    /// Zero-divide exception enable.
    pub ze: bool,
    /// Underflow exception enable.
    pub ue: bool,
    /// Overflow exception enable.
    pub oe: bool,
    /// Invalid operation exception enable.
    pub ve: bool,
    pub vxcvi: bool,
    pub vxsqrt: bool,
    pub vxsoft: bool,
    #[bits(default = false)]
    _reserved_52: bool,
    /// Floating-point result flags (C, FL, FG, FE, FU).
    #[bits(5)]
    pub fprf: u8,
    /// Fraction inexact.
    pub fi: bool,
    /// Fraction rounded.
    pub fr: bool,
    pub vxvc: bool,
    pub vximz: bool,
    pub vxzdz: bool,
    pub vxidi: bool,
    pub vxisi: bool,
    pub vxsnan: bool,
    /// Inexact exception (sticky).
    pub xx: bool,
    /// Zero-divide exception (sticky).
    pub zx: bool,
    /// Underflow exception (sticky).
    pub ux: bool,
    /// Overflow exception (sticky).
    pub ox: bool,
    /// Invalid operation summary.
    pub vx: bool,
    /// Enabled exception summary.
    pub fex: bool,
    /// Exception summary.
    pub fx: bool,
}

impl Fpscr {
    /// True if any invalid-operation exception bit is set.
    #[must_use]
    pub const fn any_invalid(self) -> bool {
        self.vxcvi()
            || self.vxsqrt()
            || self.vxsoft()
            || self.vxvc()
            || self.vximz()
            || self.vxzdz()
            || self.vxidi()
            || self.vxisi()
            || self.vxsnan()
    }

    /// Recomputes `VX` and `FEX` from the exception and enable bits.
    ///
    /// `mtfsf` cannot set these two directly; the processor derives them.
    #[must_use]
    pub const fn with_summaries(self) -> Self {
        let vx = self.any_invalid();
        let fex = (vx && self.ve())
            || (self.ox() && self.oe())
            || (self.ux() && self.ue())
            || (self.zx() && self.ze())
            || (self.xx() && self.xe());
        self.with_vx(vx).with_fex(fex)
    }
}

#[cfg(all(feature = "asm", any(target_arch = "powerpc", target_arch = "powerpc64")))]
impl crate::LoadRegister for Fpscr {
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn load() -> Self {
        // mffs leaves the register image in the low word of the FPR.
        let mut image = 0u64;
        unsafe {
            core::arch::asm!(
                "mffs {f}",
                "stfd {f}, 0({p})",
                f = out(freg) _,
                p = in(reg_nonzero) &raw mut image,
                options(nostack, preserves_flags)
            );
        }
        Self::from_bits(image as u32)
    }
}

#[cfg(all(feature = "asm", any(target_arch = "powerpc", target_arch = "powerpc64")))]
impl crate::StoreRegister for Fpscr {
    #[inline]
    fn store(self) {
        let image = u64::from(self.into_bits());
        unsafe {
            core::arch::asm!(
                "lfd {f}, 0({p})",
                "mtfsf 0xff, {f}",
                f = out(freg) _,
                p = in(reg_nonzero) &raw const image,
                options(nostack, preserves_flags)
            );
        }
    }
}
