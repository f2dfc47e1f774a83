/// VRSAVE (SPR 256): software-maintained mask of live vector registers.
///
/// Bit 0 (most significant) corresponds to `v0`, bit 31 to `v31`. The
/// hardware attaches no meaning to it; it is carried so a handler that
/// reshuffles it cannot leak the change into the interrupted code.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Vrsave(u32);

impl Vrsave {
    pub const SPR: u16 = 256;

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn into_bits(self) -> u32 {
        self.0
    }

    /// Whether `v{vr}` is marked live.
    #[must_use]
    pub const fn is_live(self, vr: usize) -> bool {
        vr < 32 && self.0 & (0x8000_0000 >> vr) != 0
    }

    #[must_use]
    pub const fn with_live(self, vr: usize, live: bool) -> Self {
        if vr >= 32 {
            return self;
        }
        let bit = 0x8000_0000 >> vr;
        if live { Self(self.0 | bit) } else { Self(self.0 & !bit) }
    }
}

#[cfg(all(feature = "asm", any(target_arch = "powerpc", target_arch = "powerpc64")))]
impl crate::LoadRegister for Vrsave {
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn load() -> Self {
        let mask: usize;
        unsafe {
            core::arch::asm!("mfspr {}, 256", out(reg) mask, options(nomem, nostack, preserves_flags));
        }
        Self(mask as u32)
    }
}

#[cfg(all(feature = "asm", any(target_arch = "powerpc", target_arch = "powerpc64")))]
impl crate::StoreRegister for Vrsave {
    #[inline]
    fn store(self) {
        let mask = self.0 as usize;
        unsafe {
            core::arch::asm!("mtspr 256, {}", in(reg) mask, options(nomem, nostack, preserves_flags));
        }
    }
}
