use bitfield_struct::bitfield;

/// Condition Register.
///
/// Eight 4-bit fields. `CR0` occupies the most significant nibble, `CR7` the
/// least significant one, matching the big-endian bit numbering of the ISA
/// (`CR0` = bits 32..35 of the 64-bit view).
///
/// Each field holds `LT`, `GT`, `EQ` and `SO` from most to least significant
/// bit; see [`CrField`].
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct Cr {
    #[bits(4)]
    pub cr7: u8,
    #[bits(4)]
    pub cr6: u8,
    #[bits(4)]
    pub cr5: u8,
    #[bits(4)]
    pub cr4: u8,
    #[bits(4)]
    pub cr3: u8,
    #[bits(4)]
    pub cr2: u8,
    #[bits(4)]
    pub cr1: u8,
    #[bits(4)]
    pub cr0: u8,
}

/// One decoded 4-bit condition register field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrField {
    pub lt: bool,
    pub gt: bool,
    pub eq: bool,
    pub so: bool,
}

impl CrField {
    #[must_use]
    pub const fn from_nibble(nibble: u8) -> Self {
        Self {
            lt: nibble & 0b1000 != 0,
            gt: nibble & 0b0100 != 0,
            eq: nibble & 0b0010 != 0,
            so: nibble & 0b0001 != 0,
        }
    }

    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn into_nibble(self) -> u8 {
        ((self.lt as u8) << 3) | ((self.gt as u8) << 2) | ((self.eq as u8) << 1) | (self.so as u8)
    }
}

impl Cr {
    /// Returns field `CRn` (`n` in `0..8`).
    ///
    /// # Panics
    /// Panics if `n >= 8`.
    #[must_use]
    pub const fn field(self, n: usize) -> CrField {
        assert!(n < 8, "CR has eight fields");
        let shift = (7 - n) * 4;
        #[allow(clippy::cast_possible_truncation)]
        CrField::from_nibble(((self.into_bits() >> shift) & 0xF) as u8)
    }

    /// Returns a copy with field `CRn` replaced.
    ///
    /// # Panics
    /// Panics if `n >= 8`.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn with_field(self, n: usize, field: CrField) -> Self {
        assert!(n < 8, "CR has eight fields");
        let shift = (7 - n) * 4;
        let bits = self.into_bits() & !(0xF << shift);
        Self::from_bits(bits | ((field.into_nibble() as u32) << shift))
    }
}

#[cfg(all(feature = "asm", any(target_arch = "powerpc", target_arch = "powerpc64")))]
impl crate::LoadRegister for Cr {
    #[inline]
    fn load() -> Self {
        let cr: usize;
        unsafe {
            core::arch::asm!("mfcr {}", out(reg) cr, options(nomem, nostack, preserves_flags));
        }
        #[allow(clippy::cast_possible_truncation)]
        Self::from_bits(cr as u32)
    }
}

#[cfg(all(feature = "asm", any(target_arch = "powerpc", target_arch = "powerpc64")))]
impl crate::StoreRegister for Cr {
    #[inline]
    fn store(self) {
        let cr = self.into_bits() as usize;
        unsafe {
            core::arch::asm!("mtcrf 0xff, {}", in(reg) cr, out("cr") _, options(nomem, nostack));
        }
    }
}
