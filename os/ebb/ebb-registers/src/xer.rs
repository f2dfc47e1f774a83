use bitfield_struct::bitfield;

/// Fixed-Point Exception Register.
///
/// Modeled at 64 bits; on 32-bit targets only the low word exists and the
/// upper half is always zero.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct Xer {
    /// Bits 57:63: byte count for `lswx`/`stswx`.
    #[bits(7)]
    pub byte_count: u8,

    #[bits(11, default = 0)]
    _reserved_7_17: u16,

    /// Bit 45: carry out of the low word (ISA 3.0).
    pub ca32: bool,

    /// Bit 44: overflow of the low word (ISA 3.0).
    pub ov32: bool,

    #[bits(9, default = 0)]
    _reserved_20_28: u16,

    /// Bit 34: Carry.
    pub ca: bool,

    /// Bit 33: Overflow.
    pub ov: bool,

    /// Bit 32: Summary Overflow (sticky).
    pub so: bool,

    #[bits(32, default = 0)]
    _reserved_32_63: u32,
}

#[cfg(all(feature = "asm", any(target_arch = "powerpc", target_arch = "powerpc64")))]
impl crate::LoadRegister for Xer {
    #[inline]
    fn load() -> Self {
        let xer: usize;
        unsafe {
            core::arch::asm!("mfxer {}", out(reg) xer, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(xer as u64)
    }
}

#[cfg(all(feature = "asm", any(target_arch = "powerpc", target_arch = "powerpc64")))]
impl crate::StoreRegister for Xer {
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn store(self) {
        let xer = self.into_bits() as usize;
        unsafe {
            core::arch::asm!("mtxer {}", in(reg) xer, out("xer") _, options(nomem, nostack));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn summary_overflow_is_bit_31() {
        let xer = Xer::new().with_so(true);
        assert_eq!(xer.into_bits(), 0x8000_0000);
    }

    #[test]
    fn carry_and_byte_count() {
        let xer = Xer::from_bits(0x2000_0015);
        assert!(xer.ca());
        assert!(!xer.ov());
        assert_eq!(xer.byte_count(), 0x15);
    }

    #[cfg(all(feature = "asm", any(target_arch = "powerpc", target_arch = "powerpc64")))]
    #[test]
    fn live_register_takes_a_stored_value() {
        use crate::{LoadRegister, StoreRegister};

        let original = Xer::load();
        let changed = original.with_ca(!original.ca()).with_byte_count(0x2A);
        changed.store();
        let seen = Xer::load();
        original.store();
        assert_eq!(seen.ca(), changed.ca());
        assert_eq!(seen.byte_count(), 0x2A);
    }
}
