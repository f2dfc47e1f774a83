use bitfield_struct::bitfield;

/// Vector Status and Control Register.
///
/// `mfvscr` places the register in word element 3 of the target VR and
/// `mtvscr` reads it from word element 3 of the source VR; the other lanes
/// are ignored.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct Vscr {
    /// Bit 63: saturation (sticky).
    pub sat: bool,

    #[bits(15, default = 0)]
    _reserved_1_15: u16,

    /// Bit 47: non-Java mode (denormals flushed to zero).
    pub nj: bool,

    #[bits(15, default = 0)]
    _reserved_17_31: u16,
}

/// `stvx`/`lvx` need a quadword-aligned image.
#[cfg(all(
    feature = "asm",
    target_feature = "altivec",
    any(target_arch = "powerpc", target_arch = "powerpc64")
))]
#[repr(C, align(16))]
struct QuadImage([u32; 4]);

#[cfg(all(
    feature = "asm",
    target_feature = "altivec",
    any(target_arch = "powerpc", target_arch = "powerpc64")
))]
impl crate::LoadRegister for Vscr {
    #[inline]
    fn load() -> Self {
        // Broadcast before storing so every lane holds the value regardless of
        // the element order of the store.
        let mut image = QuadImage([0; 4]);
        unsafe {
            core::arch::asm!(
                "mfvscr {v}",
                "vspltw {v}, {v}, 3",
                "stvx {v}, 0, {p}",
                v = out(vreg) _,
                p = in(reg_nonzero) &raw mut image,
                options(nostack, preserves_flags)
            );
        }
        Self::from_bits(image.0[0])
    }
}

#[cfg(all(
    feature = "asm",
    target_feature = "altivec",
    any(target_arch = "powerpc", target_arch = "powerpc64")
))]
impl crate::StoreRegister for Vscr {
    #[inline]
    fn store(self) {
        let image = QuadImage([self.into_bits(); 4]);
        unsafe {
            core::arch::asm!(
                "lvx {v}, 0, {p}",
                "mtvscr {v}",
                v = out(vreg) _,
                p = in(reg_nonzero) &raw const image,
                options(nostack, preserves_flags)
            );
        }
    }
}
