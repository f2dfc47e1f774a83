use ebb_frame::image::{
    read_doubleword, read_u32, read_word, vmx_image, vsx_image, write_doubleword, write_u32,
    write_word,
};
use ebb_frame::{Abi, STACK_POINTER, Variant, VsxFile, VsxSlot};
use ebb_registers::cr::CrField;
use ebb_registers::{Cr, Fpscr, Vrsave, Vscr, Xer};

use super::Memory;
use crate::registry::ThreadKey;

/// What the model leaves wherever the architecture says "undefined".
pub const UNDEFINED: u64 = 0xDEAD_BEEF_DEAD_BEEF;

/// Upper word of an FPR after `mffs`.
const MFFS_HIGH: u64 = 0xFFF8_0000_0000_0000;

/// Architected register state of one hardware thread.
///
/// FPRs and VRs are not stored separately: they are views into [`vsx`](Self::vsx).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cpu {
    pub abi: Abi,
    pub gpr: [u64; 32],
    pub cr: Cr,
    pub lr: u64,
    pub ctr: u64,
    pub xer: Xer,
    pub vsx: VsxFile,
    pub fpscr: Fpscr,
    pub vscr: Vscr,
    pub vrsave: Vrsave,
    pub pc: u64,
    /// Event-Based Branch Return Register.
    pub ebbrr: u64,
    /// `BESCR[GE]`: event-based branches may be taken.
    pub ebb_enabled: bool,
}

impl Cpu {
    /// All-zero state with event-based branches enabled.
    #[must_use]
    pub fn new(abi: Abi) -> Self {
        Self {
            abi,
            gpr: [0; 32],
            cr: Cr::new(),
            lr: 0,
            ctr: 0,
            xer: Xer::new(),
            vsx: VsxFile::new(),
            fpscr: Fpscr::new(),
            vscr: Vscr::new(),
            vrsave: Vrsave::default(),
            pc: 0,
            ebbrr: 0,
            ebb_enabled: true,
        }
    }

    /// Bits a GPR-sized register holds on this configuration.
    #[must_use]
    pub const fn word_mask(&self) -> u64 {
        if self.abi.word_size() == 4 {
            0xFFFF_FFFF
        } else {
            u64::MAX
        }
    }

    #[must_use]
    pub const fn stack_pointer(&self) -> u64 {
        self.gpr[STACK_POINTER]
    }

    #[must_use]
    pub const fn thread_key(&self) -> ThreadKey {
        ThreadKey::new(self.gpr[self.abi.thread_pointer()])
    }

    /// Takes an event-based branch to `handler`, as the hardware does on an
    /// enabled event. Returns `false` if delivery is disabled.
    pub const fn take_ebb(&mut self, handler: u64) -> bool {
        if !self.ebb_enabled {
            return false;
        }
        self.ebbrr = self.pc;
        self.pc = handler;
        self.ebb_enabled = false;
        true
    }

    /// `rfebb 1`
    pub const fn rfebb(&mut self) {
        self.pc = self.ebbrr;
        self.ebb_enabled = true;
    }

    const fn retire(&mut self) {
        self.pc = self.pc.wrapping_add(4);
    }

    /// `(RA|0) + d`
    const fn effective_address(&self, ra: usize, d: i64) -> u64 {
        let base = if ra == 0 { 0 } else { self.gpr[ra] };
        base.wrapping_add_signed(d) & self.word_mask()
    }

    /// `(RA|0) + (RB)`
    const fn indexed_address(&self, ra: usize, rb: usize) -> u64 {
        let base = if ra == 0 { 0 } else { self.gpr[ra] };
        base.wrapping_add(self.gpr[rb]) & self.word_mask()
    }

    /// `std`/`stw rs, d(ra)`
    pub fn store_word(&mut self, memory: &mut Memory<'_>, rs: usize, ra: usize, d: i64) {
        let ea = self.effective_address(ra, d);
        write_word(memory.slice_mut(ea, self.abi.word_size()), self.abi, self.gpr[rs]);
        self.retire();
    }

    /// `stdu`/`stwu rs, d(ra)`
    pub fn store_word_update(&mut self, memory: &mut Memory<'_>, rs: usize, ra: usize, d: i64) {
        let ea = self.effective_address(ra, d);
        write_word(memory.slice_mut(ea, self.abi.word_size()), self.abi, self.gpr[rs]);
        self.gpr[ra] = ea;
        self.retire();
    }

    /// `ld`/`lwz rt, d(ra)`
    pub fn load_word(&mut self, memory: &Memory<'_>, rt: usize, ra: usize, d: i64) {
        let ea = self.effective_address(ra, d);
        self.gpr[rt] = read_word(memory.slice(ea, self.abi.word_size()), self.abi);
        self.retire();
    }

    /// `stw rs, d(ra)`
    #[allow(clippy::cast_possible_truncation)]
    pub fn stw(&mut self, memory: &mut Memory<'_>, rs: usize, ra: usize, d: i64) {
        let ea = self.effective_address(ra, d);
        write_u32(memory.slice_mut(ea, 4), self.abi, self.gpr[rs] as u32);
        self.retire();
    }

    /// `lwz rt, d(ra)`
    pub fn lwz(&mut self, memory: &Memory<'_>, rt: usize, ra: usize, d: i64) {
        let ea = self.effective_address(ra, d);
        self.gpr[rt] = u64::from(read_u32(memory.slice(ea, 4), self.abi));
        self.retire();
    }

    /// `addi rt, ra, si`; `li rt, si` when `ra` is 0.
    pub const fn addi(&mut self, rt: usize, ra: usize, si: i64) {
        self.gpr[rt] = self.effective_address(ra, si);
        self.retire();
    }

    /// `addis rt, ra, si`
    pub const fn addis(&mut self, rt: usize, ra: usize, si: i16) {
        self.gpr[rt] = self.effective_address(ra, (si as i64) << 16);
        self.retire();
    }

    /// `bcl 20, 31, $+4`: LR := address of the next instruction.
    pub const fn bcl_next(&mut self) {
        self.lr = self.pc.wrapping_add(4) & self.word_mask();
        self.retire();
    }

    pub fn mfcr(&mut self, rt: usize) {
        self.gpr[rt] = u64::from(self.cr.into_bits());
        self.retire();
    }

    /// `mtcrf 0xff, rs`
    #[allow(clippy::cast_possible_truncation)]
    pub fn mtcr(&mut self, rs: usize) {
        self.cr = Cr::from_bits(self.gpr[rs] as u32);
        self.retire();
    }

    pub const fn mflr(&mut self, rt: usize) {
        self.gpr[rt] = self.lr;
        self.retire();
    }

    pub const fn mtlr(&mut self, rs: usize) {
        self.lr = self.gpr[rs];
        self.retire();
    }

    pub const fn mfctr(&mut self, rt: usize) {
        self.gpr[rt] = self.ctr;
        self.retire();
    }

    pub const fn mtctr(&mut self, rs: usize) {
        self.ctr = self.gpr[rs];
        self.retire();
    }

    pub fn mfxer(&mut self, rt: usize) {
        self.gpr[rt] = self.xer.into_bits() & self.word_mask();
        self.retire();
    }

    pub fn mtxer(&mut self, rs: usize) {
        self.xer = Xer::from_bits(self.gpr[rs] & self.word_mask());
        self.retire();
    }

    /// `mfspr rt, 256`
    pub fn mfvrsave(&mut self, rt: usize) {
        self.gpr[rt] = u64::from(self.vrsave.into_bits());
        self.retire();
    }

    /// `mtspr 256, rs`
    #[allow(clippy::cast_possible_truncation)]
    pub fn mtvrsave(&mut self, rs: usize) {
        self.vrsave = Vrsave::from_bits(self.gpr[rs] as u32);
        self.retire();
    }

    pub fn stfd(&mut self, memory: &mut Memory<'_>, frs: usize, ra: usize, d: i64) {
        let ea = self.effective_address(ra, d);
        write_doubleword(memory.slice_mut(ea, 8), self.abi, self.vsx.fpr(frs));
        self.retire();
    }

    /// Doubleword 1 of the target VSR becomes undefined.
    pub fn lfd(&mut self, memory: &Memory<'_>, frt: usize, ra: usize, d: i64) {
        let ea = self.effective_address(ra, d);
        let bits = read_doubleword(memory.slice(ea, 8), self.abi);
        self.set_scalar(frt, bits);
        self.retire();
    }

    /// FPSCR into the low word of `frt`.
    pub fn mffs(&mut self, frt: usize) {
        self.set_scalar(frt, MFFS_HIGH | u64::from(self.fpscr.into_bits()));
        self.retire();
    }

    /// `mtfsf 0xff, frb`. `VX` and `FEX` are derived, not copied.
    #[allow(clippy::cast_possible_truncation)]
    pub fn mtfsf(&mut self, frb: usize) {
        self.fpscr = Fpscr::from_bits(self.vsx.fpr(frb) as u32).with_summaries();
        self.retire();
    }

    fn set_scalar(&mut self, fr: usize, bits: u64) {
        let mut slot = VsxSlot::ZERO;
        slot.set_fpr(bits);
        slot.set_dw1(UNDEFINED);
        self.vsx.set_vsr(fr, slot);
    }

    /// `stvx vrs, ra, rb`; the address is truncated to 16 bytes.
    pub fn stvx(&mut self, memory: &mut Memory<'_>, vrs: usize, ra: usize, rb: usize) {
        let ea = self.indexed_address(ra, rb) & !0xF;
        let image = vmx_image(self.vsx.vr(vrs), self.abi);
        memory.slice_mut(ea, 16).copy_from_slice(&image);
        self.retire();
    }

    pub fn lvx(&mut self, memory: &Memory<'_>, vrt: usize, ra: usize, rb: usize) {
        let ea = self.indexed_address(ra, rb) & !0xF;
        let mut image = [0u8; 16];
        image.copy_from_slice(memory.slice(ea, 16));
        self.vsx.set_vr(vrt, vmx_image(image, self.abi));
        self.retire();
    }

    /// VSCR into word element 3, zeros elsewhere.
    pub fn mfvscr(&mut self, vrt: usize) {
        let mut quad = [0u8; 16];
        quad[12..].copy_from_slice(&self.vscr.into_bits().to_be_bytes());
        self.vsx.set_vr(vrt, quad);
        self.retire();
    }

    pub fn vspltw(&mut self, vrt: usize, vrb: usize, uim: usize) {
        let source = self.vsx.vr(vrb);
        let mut quad = [0u8; 16];
        for lane in quad.chunks_exact_mut(4) {
            lane.copy_from_slice(&source[4 * uim..4 * uim + 4]);
        }
        self.vsx.set_vr(vrt, quad);
        self.retire();
    }

    /// VSCR from word element 3.
    pub fn mtvscr(&mut self, vrb: usize) {
        let quad = self.vsx.vr(vrb);
        self.vscr = Vscr::from_bits(u32::from_be_bytes([quad[12], quad[13], quad[14], quad[15]]));
        self.retire();
    }

    pub fn stxvd2x(&mut self, memory: &mut Memory<'_>, xs: usize, ra: usize, rb: usize) {
        let ea = self.indexed_address(ra, rb);
        let image = vsx_image(self.vsx.vsr(xs).quad(), self.abi);
        memory.slice_mut(ea, 16).copy_from_slice(&image);
        self.retire();
    }

    pub fn lxvd2x(&mut self, memory: &Memory<'_>, xt: usize, ra: usize, rb: usize) {
        let ea = self.indexed_address(ra, rb);
        let mut image = [0u8; 16];
        image.copy_from_slice(memory.slice(ea, 16));
        self.vsx.set_vsr(xt, VsxSlot::from_quad(vsx_image(image, self.abi)));
        self.retire();
    }

    /// Overwrites what a function following the calling convention may leave
    /// changed, restricted to the register classes `variant` carries.
    pub fn clobber_volatile(&mut self, variant: Variant, seed: u64) {
        let mut garbage = Garbage(seed);
        let mask = self.word_mask();

        self.gpr[0] = garbage.next() & mask;
        for r in 3..=12 {
            self.gpr[r] = garbage.next() & mask;
        }
        for field in [0, 1, 5, 6, 7] {
            let nibble = garbage.next().to_be_bytes()[0] & 0xF;
            self.cr = self.cr.with_field(field, CrField::from_nibble(nibble));
        }
        self.lr = garbage.next() & mask;
        self.ctr = garbage.next() & mask;
        let bits = garbage.next();
        self.xer = Xer::new()
            .with_so(bits & 1 != 0)
            .with_ov(bits & 2 != 0)
            .with_ca(bits & 4 != 0)
            .with_byte_count(bits.to_be_bytes()[1] & 0x7F);

        if variant.saves_fp() {
            for fr in 0..=13 {
                self.set_scalar(fr, garbage.next());
            }
            #[allow(clippy::cast_possible_truncation)]
            let fpscr = Fpscr::from_bits(garbage.next() as u32).with_summaries();
            self.fpscr = fpscr;
        }
        if variant.saves_vec() {
            for vr in 0..=19 {
                let quad = garbage.quad();
                self.vsx.set_vr(vr, quad);
            }
            let bits = garbage.next();
            self.vscr = Vscr::new().with_sat(bits & 1 != 0).with_nj(bits & 2 != 0);
            #[allow(clippy::cast_possible_truncation)]
            let vrsave = Vrsave::from_bits(garbage.next() as u32);
            self.vrsave = vrsave;
        }
        if variant.saves_vsx() {
            for x in 0..=13 {
                let quad = garbage.quad();
                self.vsx.set_vsr(x, VsxSlot::from_quad(quad));
            }
        }
    }
}

/// `SplitMix64`.
struct Garbage(u64);

impl Garbage {
    const fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn quad(&mut self) -> [u8; 16] {
        let mut quad = [0u8; 16];
        quad[..8].copy_from_slice(&self.next().to_be_bytes());
        quad[8..].copy_from_slice(&self.next().to_be_bytes());
        quad
    }
}
