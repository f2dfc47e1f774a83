//! Typed access to a saved register context inside a frame's bytes.

use crate::image::{
    read_doubleword, read_u32, read_word, vmx_image, vsx_image, write_doubleword, write_u32,
    write_word,
};
use crate::layout::{FrameLayout, LayoutError, Region, Special};
use crate::vsx::VsxSlot;

/// A frame's bytes interpreted through its [`FrameLayout`].
///
/// Slot `0` of the byte slice is the trampoline's stack pointer. Values are
/// decoded the way the restoring load instruction would see them, so for the
/// extended-vector variant [`fpr`](Self::fpr) and [`vsr`](Self::vsr) read
/// the same bytes.
#[derive(Debug)]
pub struct SavedContext<'a> {
    layout: FrameLayout,
    bytes: &'a mut [u8],
}

impl<'a> SavedContext<'a> {
    /// # Errors
    /// [`LayoutError::FrameTooShort`] if `bytes` cannot hold the frame.
    pub fn new(layout: FrameLayout, bytes: &'a mut [u8]) -> Result<Self, LayoutError> {
        if bytes.len() < layout.size {
            return Err(LayoutError::FrameTooShort {
                len: bytes.len(),
                size: layout.size,
            });
        }
        Ok(Self { layout, bytes })
    }

    #[must_use]
    pub const fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    fn slot(&self, region: &Region, index: usize) -> &[u8] {
        let at = region.slot(index);
        &self.bytes[at..at + region.width]
    }

    fn slot_mut(&mut self, region: Region, index: usize) -> &mut [u8] {
        let at = region.slot(index);
        &mut self.bytes[at..at + region.width]
    }

    #[must_use]
    pub fn special(&self, reg: Special) -> u64 {
        read_word(self.slot(&self.layout.specials, reg as usize), self.layout.abi)
    }

    pub fn set_special(&mut self, reg: Special, value: u64) {
        let abi = self.layout.abi;
        write_word(self.slot_mut(self.layout.specials, reg as usize), abi, value);
    }

    #[must_use]
    pub fn gpr(&self, n: usize) -> u64 {
        read_word(self.slot(&self.layout.gpr, n), self.layout.abi)
    }

    pub fn set_gpr(&mut self, n: usize, value: u64) {
        let abi = self.layout.abi;
        write_word(self.slot_mut(self.layout.gpr, n), abi, value);
    }

    /// FPR `n` as raw `f64` bits.
    ///
    /// # Panics
    /// Panics if the variant carries no FPRs.
    #[must_use]
    pub fn fpr(&self, n: usize) -> u64 {
        read_doubleword(self.slot(&self.layout.fpr, n), self.layout.abi)
    }

    /// # Panics
    /// Panics if the variant carries no FPRs.
    pub fn set_fpr(&mut self, n: usize, bits: u64) {
        let abi = self.layout.abi;
        write_doubleword(self.slot_mut(self.layout.fpr, n), abi, bits);
    }

    /// # Panics
    /// Panics if the variant carries no FPSCR.
    #[must_use]
    pub fn fpscr(&self) -> u32 {
        // Low word of the doubleword image.
        #[allow(clippy::cast_possible_truncation)]
        let word = read_doubleword(self.slot(&self.layout.fpscr, 0), self.layout.abi) as u32;
        word
    }

    /// VR `n` as a quadword in architectural order.
    ///
    /// # Panics
    /// Panics if the variant carries no VRs.
    #[must_use]
    pub fn vr(&self, n: usize) -> [u8; 16] {
        if self.layout.variant.saves_vsx() {
            return self.vsr(32 + n).quad();
        }
        vmx_image(self.quad(&self.layout.vr, n), self.layout.abi)
    }

    /// # Panics
    /// Panics if the variant carries no VRs.
    pub fn set_vr(&mut self, n: usize, quad: [u8; 16]) {
        if self.layout.variant.saves_vsx() {
            self.set_vsr(32 + n, VsxSlot::from_quad(quad));
            return;
        }
        let image = vmx_image(quad, self.layout.abi);
        self.slot_mut(self.layout.vr, n).copy_from_slice(&image);
    }

    /// VSR `n` in architectural order.
    ///
    /// # Panics
    /// Panics if the variant is not the extended-vector one.
    #[must_use]
    pub fn vsr(&self, n: usize) -> VsxSlot {
        VsxSlot::from_quad(vsx_image(self.quad(&self.layout.vsr, n), self.layout.abi))
    }

    /// # Panics
    /// Panics if the variant is not the extended-vector one.
    pub fn set_vsr(&mut self, n: usize, value: VsxSlot) {
        let image = vsx_image(value.quad(), self.layout.abi);
        self.slot_mut(self.layout.vsr, n).copy_from_slice(&image);
    }

    /// The VSCR as `mtvscr` would pick it up (word element 3).
    ///
    /// # Panics
    /// Panics if the variant carries no VSCR.
    #[must_use]
    pub fn vscr(&self) -> u32 {
        let quad = vmx_image(self.quad(&self.layout.vscr, 0), self.layout.abi);
        u32::from_be_bytes([quad[12], quad[13], quad[14], quad[15]])
    }

    /// # Panics
    /// Panics if the variant carries no VRSAVE.
    #[must_use]
    pub fn vrsave(&self) -> u32 {
        read_u32(self.slot(&self.layout.vrsave, 0), self.layout.abi)
    }

    /// # Panics
    /// Panics if the variant carries no VRSAVE.
    pub fn set_vrsave(&mut self, mask: u32) {
        let abi = self.layout.abi;
        write_u32(self.slot_mut(self.layout.vrsave, 0), abi, mask);
    }

    fn quad(&self, region: &Region, index: usize) -> [u8; 16] {
        let mut quad = [0u8; 16];
        quad.copy_from_slice(self.slot(region, index));
        quad
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::target::Abi;
    use crate::variant::Variant;

    #[test]
    fn too_short_buffer_is_rejected() {
        let layout = FrameLayout::compute(Abi::Ppc32, Variant::Gpr);
        let mut bytes = [0u8; 64];
        assert_eq!(
            SavedContext::new(layout, &mut bytes).err(),
            Some(LayoutError::FrameTooShort { len: 64, size: 160 })
        );
    }

    #[test]
    fn gpr_slots_use_target_byte_order() {
        let layout = FrameLayout::compute(Abi::Ppc64Elfv2, Variant::Gpr);
        let mut bytes = vec![0u8; layout.size];
        let mut ctx = SavedContext::new(layout, &mut bytes).unwrap();
        ctx.set_gpr(3, 0x0102_0304_0506_0708);
        assert_eq!(ctx.gpr(3), 0x0102_0304_0506_0708);
        let at = layout.gpr_slot(3);
        assert_eq!(bytes[at], 0x08);
    }
}
