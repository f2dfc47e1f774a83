//! # Frame Layout Calculator
//!
//! Offsets are measured from the trampoline's stack pointer after the frame
//! has been reserved and grow upwards:
//!
//! ```text
//!  new SP ─►┌──────────────────────────┐ 0
//!           │ ABI header               │ back chain, LR/CR/TOC save, (ELFv1) parameter save area
//!           ├──────────────────────────┤
//!           │ CR  LR  CTR  XER         │ one word each
//!           ├──────────────────────────┤
//!           │ r0 … r31                 │ 32 words, r1 and the thread pointer never written
//!           ├──────────────────────────┤
//!           │ f0 … f31, FPSCR          │ GprFp, GprFpVec
//!           ├──────────────────────────┤ 16-aligned
//!           │ v0 … v31, VSCR, VRSAVE   │ GprFpVec
//!           ├──────────────────────────┤ 16-aligned
//!           │ vs0 … vs63               │ GprFpVsx: f0…f31 alias dw0 of vs0…vs31,
//!           │ VSCR, FPSCR, VRSAVE      │           v0…v31 alias vs32…vs63
//!           ├──────────────────────────┤ 16-aligned
//!           │ red zone (64-bit only)   │ left untouched for the interrupted code
//!  old SP ─►└──────────────────────────┘ size
//! ```
//!
//! Everything is `const fn`; [`FrameLayout::verify`] is evaluated for all
//! twelve configurations at compile time (see the bottom of this module).

use crate::target::{Abi, Target};
use crate::variant::{RegisterSet, Variant};
use core::fmt;
use core::marker::PhantomData;

/// Largest displacement a D-form load/store can encode.
pub const MAX_DISPLACEMENT: usize = 0x7FFF;

/// Width and alignment of a vector (VR/VSR) slot.
pub const QUAD: usize = 16;

/// Width of an FPR slot and of the FPSCR image.
pub const DOUBLEWORD: usize = 8;

/// Width of the VRSAVE slot.
pub const VRSAVE_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Header,
    Specials,
    Gpr,
    Fpr,
    Fpscr,
    Vr,
    Vscr,
    Vrsave,
    Vsr,
    RedZone,
}

impl RegionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Specials => "cr/lr/ctr/xer",
            Self::Gpr => "gpr",
            Self::Fpr => "fpr",
            Self::Fpscr => "fpscr",
            Self::Vr => "vr",
            Self::Vscr => "vscr",
            Self::Vrsave => "vrsave",
            Self::Vsr => "vsr",
            Self::RedZone => "red zone",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The four special-purpose registers stored in the `Specials` region, in
/// slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Special {
    Cr = 0,
    Lr = 1,
    Ctr = 2,
    Xer = 3,
}

impl Special {
    pub const ALL: [Self; 4] = [Self::Cr, Self::Lr, Self::Ctr, Self::Xer];
}

/// A run of `count` equally spaced slots of `width` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub kind: RegionKind,
    pub offset: usize,
    pub count: usize,
    pub stride: usize,
    pub width: usize,
    pub align: usize,
}

impl Region {
    #[must_use]
    pub const fn new(
        kind: RegionKind,
        offset: usize,
        count: usize,
        stride: usize,
        width: usize,
        align: usize,
    ) -> Self {
        Self {
            kind,
            offset,
            count,
            stride,
            width,
            align,
        }
    }

    /// A single slot of `width` bytes aligned to its own width.
    const fn single(kind: RegionKind, cursor: usize, width: usize) -> Self {
        Self::new(kind, align_up(cursor, width), 1, width, width, width)
    }

    /// A bank of `count` slots of `width` bytes aligned to their width.
    const fn bank(kind: RegionKind, cursor: usize, count: usize, width: usize) -> Self {
        Self::new(kind, align_up(cursor, width), count, width, width, width)
    }

    #[must_use]
    pub const fn absent(kind: RegionKind) -> Self {
        Self::new(kind, 0, 0, 0, 0, 1)
    }

    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.count != 0
    }

    /// Offset of slot `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of range for this region.
    #[must_use]
    pub const fn slot(&self, index: usize) -> usize {
        assert!(index < self.count, "slot index out of range");
        self.offset + index * self.stride
    }

    /// One past the last byte covered by this region.
    #[must_use]
    pub const fn end(&self) -> usize {
        if self.count == 0 {
            self.offset
        } else {
            self.offset + (self.count - 1) * self.stride + self.width
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end() - self.offset
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    const fn overlaps(&self, other: &Self) -> bool {
        self.is_present()
            && other.is_present()
            && self.offset < other.end()
            && other.offset < self.end()
    }

    const fn contains(&self, other: &Self) -> bool {
        self.offset <= other.offset && other.end() <= self.end()
    }
}

/// Why a layout was rejected by [`FrameLayout::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("frame size {size} is not a positive multiple of the stack alignment {align}")]
    FrameMisaligned { size: usize, align: usize },
    #[error("{kind} region at offset {offset} is not {align}-byte aligned")]
    RegionMisaligned {
        kind: RegionKind,
        offset: usize,
        align: usize,
    },
    #[error("{kind} region ends at {end}, past its limit {limit}")]
    RegionOutOfBounds {
        kind: RegionKind,
        end: usize,
        limit: usize,
    },
    #[error("{first} and {second} regions overlap")]
    Overlap {
        first: RegionKind,
        second: RegionKind,
    },
    #[error("{kind} region needs displacement {displacement}, beyond the D-form range")]
    DisplacementOutOfRange {
        kind: RegionKind,
        displacement: usize,
    },
    #[error("frame buffer holds {len} bytes, layout needs {size}")]
    FrameTooShort { len: usize, size: usize },
}

/// Offsets of every saved register class for one configuration and variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameLayout {
    pub abi: Abi,
    pub variant: Variant,
    pub header: Region,
    pub specials: Region,
    pub gpr: Region,
    pub fpr: Region,
    pub fpscr: Region,
    pub vr: Region,
    pub vscr: Region,
    pub vrsave: Region,
    pub vsr: Region,
    pub red_zone: Region,
    /// Total bytes the trampoline subtracts from the stack pointer.
    pub size: usize,
}

impl FrameLayout {
    #[must_use]
    pub const fn compute(abi: Abi, variant: Variant) -> Self {
        let word = abi.word_size();
        let header = Region::new(RegionKind::Header, 0, 1, abi.header_size(), abi.header_size(), word);
        let specials = Region::bank(RegionKind::Specials, header.end(), Special::ALL.len(), word);
        let gpr = Region::bank(RegionKind::Gpr, specials.end(), 32, word);
        let mut cursor = gpr.end();

        let mut fpr = Region::absent(RegionKind::Fpr);
        let mut fpscr = Region::absent(RegionKind::Fpscr);
        let mut vr = Region::absent(RegionKind::Vr);
        let mut vscr = Region::absent(RegionKind::Vscr);
        let mut vrsave = Region::absent(RegionKind::Vrsave);
        let mut vsr = Region::absent(RegionKind::Vsr);

        if variant.saves_vsx() {
            vsr = Region::bank(RegionKind::Vsr, cursor, 64, QUAD);
            // FPR i is doubleword 0 of VSR i; VR i is VSR 32 + i.
            fpr = Region::new(RegionKind::Fpr, vsr.offset, 32, QUAD, DOUBLEWORD, QUAD);
            vr = Region::new(RegionKind::Vr, vsr.offset + 32 * QUAD, 32, QUAD, QUAD, QUAD);
            vscr = Region::single(RegionKind::Vscr, vsr.end(), QUAD);
            fpscr = Region::single(RegionKind::Fpscr, vscr.end(), DOUBLEWORD);
            vrsave = Region::single(RegionKind::Vrsave, fpscr.end(), VRSAVE_WIDTH);
            cursor = vrsave.end();
        } else {
            if variant.saves_fp() {
                fpr = Region::bank(RegionKind::Fpr, cursor, 32, DOUBLEWORD);
                fpscr = Region::single(RegionKind::Fpscr, fpr.end(), DOUBLEWORD);
                cursor = fpscr.end();
            }
            if variant.saves_vec() {
                vr = Region::bank(RegionKind::Vr, cursor, 32, QUAD);
                vscr = Region::single(RegionKind::Vscr, vr.end(), QUAD);
                vrsave = Region::single(RegionKind::Vrsave, vscr.end(), VRSAVE_WIDTH);
                cursor = vrsave.end();
            }
        }

        let body = align_up(cursor, abi.stack_align());
        let red_zone = if abi.red_zone() == 0 {
            Region::absent(RegionKind::RedZone)
        } else {
            Region::new(RegionKind::RedZone, body, 1, abi.red_zone(), abi.red_zone(), abi.stack_align())
        };
        let size = align_up(body + abi.red_zone(), abi.stack_align());

        Self {
            abi,
            variant,
            header,
            specials,
            gpr,
            fpr,
            fpscr,
            vr,
            vscr,
            vrsave,
            vsr,
            red_zone,
            size,
        }
    }

    #[must_use]
    pub const fn of<T: Target, R: RegisterSet>() -> Self {
        Self::compute(T::ABI, R::VARIANT)
    }

    #[must_use]
    pub const fn regions(&self) -> [Region; 10] {
        [
            self.header,
            self.specials,
            self.gpr,
            self.fpr,
            self.fpscr,
            self.vr,
            self.vscr,
            self.vrsave,
            self.vsr,
            self.red_zone,
        ]
    }

    /// Regions that exist in this variant, in offset order.
    pub fn present_regions(&self) -> impl Iterator<Item = Region> {
        let mut regions = self.regions();
        regions.sort_unstable_by_key(|r| (r.offset, r.kind != RegionKind::Vsr));
        regions.into_iter().filter(Region::is_present)
    }

    /// Offset of the save slot for special register `reg`.
    #[must_use]
    pub const fn special_slot(&self, reg: Special) -> usize {
        self.specials.slot(reg as usize)
    }

    /// Offset of the save slot for GPR `n`.
    #[must_use]
    pub const fn gpr_slot(&self, n: usize) -> usize {
        self.gpr.slot(n)
    }

    /// Offset where the register data of the largest save slot ends, i.e.
    /// the first byte of padding or red zone.
    #[must_use]
    pub const fn data_end(&self) -> usize {
        let regions = self.regions();
        let mut end = 0;
        let mut i = 0;
        while i < regions.len() {
            let r = regions[i];
            if r.is_present() && !matches!(r.kind, RegionKind::RedZone) && r.end() > end {
                end = r.end();
            }
            i += 1;
        }
        end
    }

    /// Whether two regions are allowed to share bytes: only the FPR and VR
    /// views of the VSX bank, and only while they stay inside it.
    const fn is_alias(&self, a: &Region, b: &Region) -> bool {
        if !self.variant.saves_vsx() {
            return false;
        }
        match (a.kind, b.kind) {
            (RegionKind::Vsr, RegionKind::Fpr | RegionKind::Vr) => a.contains(b),
            (RegionKind::Fpr | RegionKind::Vr, RegionKind::Vsr) => b.contains(a),
            _ => false,
        }
    }

    /// Checks every structural guarantee the trampoline relies on.
    ///
    /// # Errors
    /// The first violated rule, see [`LayoutError`].
    pub const fn verify(&self) -> Result<(), LayoutError> {
        let align = self.abi.stack_align();
        if self.size == 0 || self.size % align != 0 {
            return Err(LayoutError::FrameMisaligned {
                size: self.size,
                align,
            });
        }
        // Released with `addi 1, 1, size`, so the size itself must encode.
        if self.size > MAX_DISPLACEMENT {
            return Err(LayoutError::DisplacementOutOfRange {
                kind: RegionKind::Header,
                displacement: self.size,
            });
        }

        let limit = if self.red_zone.is_present() {
            self.red_zone.offset
        } else {
            self.size
        };

        let regions = self.regions();
        let mut i = 0;
        while i < regions.len() {
            let r = regions[i];
            i += 1;
            if !r.is_present() {
                continue;
            }
            if r.offset % r.align != 0 {
                return Err(LayoutError::RegionMisaligned {
                    kind: r.kind,
                    offset: r.offset,
                    align: r.align,
                });
            }
            let bound = if matches!(r.kind, RegionKind::RedZone) {
                self.size
            } else {
                limit
            };
            if r.end() > bound {
                return Err(LayoutError::RegionOutOfBounds {
                    kind: r.kind,
                    end: r.end(),
                    limit: bound,
                });
            }
            if !matches!(r.kind, RegionKind::RedZone) && r.end() > MAX_DISPLACEMENT {
                return Err(LayoutError::DisplacementOutOfRange {
                    kind: r.kind,
                    displacement: r.end(),
                });
            }
        }

        let mut a = 0;
        while a < regions.len() {
            let mut b = a + 1;
            while b < regions.len() {
                let (x, y) = (regions[a], regions[b]);
                if x.overlaps(&y) && !self.is_alias(&x, &y) {
                    return Err(LayoutError::Overlap {
                        first: x.kind,
                        second: y.kind,
                    });
                }
                b += 1;
            }
            a += 1;
        }

        Ok(())
    }
}

/// Type-level handle to the frame of configuration `T` and variant `R`.
#[derive(Debug, Clone, Copy)]
pub struct Frame<T, R>(PhantomData<(T, R)>);

impl<T: Target, R: RegisterSet> Frame<T, R> {
    pub const LAYOUT: FrameLayout = FrameLayout::of::<T, R>();
    pub const SIZE: usize = Self::LAYOUT.size;
}

/// All twelve layouts, indexed as `[abi][variant]` in the order of
/// [`Abi::ALL`] and [`Variant::ALL`].
pub const LAYOUTS: [[FrameLayout; 4]; 3] = {
    let mut table = [[FrameLayout::compute(Abi::Ppc32, Variant::Gpr); 4]; 3];
    let mut a = 0;
    while a < Abi::ALL.len() {
        let mut v = 0;
        while v < Variant::ALL.len() {
            table[a][v] = FrameLayout::compute(Abi::ALL[a], Variant::ALL[v]);
            v += 1;
        }
        a += 1;
    }
    table
};

const _: () = {
    let mut a = 0;
    while a < LAYOUTS.len() {
        let mut v = 0;
        while v < LAYOUTS[a].len() {
            assert!(LAYOUTS[a][v].verify().is_ok(), "invalid trampoline frame layout");
            v += 1;
        }
        a += 1;
    }
};

#[must_use]
pub const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn elfv2_gpr_offsets() {
        let l = FrameLayout::compute(Abi::Ppc64Elfv2, Variant::Gpr);
        assert_eq!(l.special_slot(Special::Cr), 32);
        assert_eq!(l.special_slot(Special::Xer), 56);
        assert_eq!(l.gpr_slot(0), 64);
        assert_eq!(l.gpr_slot(31), 64 + 31 * 8);
        assert_eq!(l.red_zone.offset, 320);
        assert_eq!(l.size, 608);
        assert!(!l.fpr.is_present());
        assert!(!l.vsr.is_present());
    }

    #[test]
    fn ppc32_has_no_red_zone() {
        let l = FrameLayout::compute(Abi::Ppc32, Variant::Gpr);
        assert!(!l.red_zone.is_present());
        assert_eq!(l.gpr_slot(31), 24 + 31 * 4);
        assert_eq!(l.size, 160);
    }

    #[test]
    fn vsx_views_alias_the_vsr_bank() {
        let l = FrameLayout::compute(Abi::Ppc64Elfv1, Variant::GprFpVsx);
        assert_eq!(l.fpr.slot(5), l.vsr.slot(5));
        assert_eq!(l.vr.slot(0), l.vsr.slot(32));
        assert_eq!(l.vr.slot(31), l.vsr.slot(63));
        assert_eq!(l.fpr.width, 8);
        assert!(l.verify().is_ok());
    }

    #[test]
    fn overlap_is_rejected_outside_vsx() {
        let mut l = FrameLayout::compute(Abi::Ppc64Elfv2, Variant::GprFpVec);
        l.vr.offset = l.fpr.offset;
        assert_eq!(
            l.verify(),
            Err(LayoutError::Overlap {
                first: RegionKind::Fpr,
                second: RegionKind::Vr,
            })
        );
    }

    #[test]
    fn misaligned_vector_bank_is_rejected() {
        let mut l = FrameLayout::compute(Abi::Ppc64Elfv2, Variant::GprFpVec);
        l.vr.offset += 8;
        assert!(matches!(
            l.verify(),
            Err(LayoutError::RegionMisaligned {
                kind: RegionKind::Vr,
                align: 16,
                ..
            })
        ));
    }

    #[test]
    fn intrusion_into_red_zone_is_rejected() {
        let mut l = FrameLayout::compute(Abi::Ppc64Elfv2, Variant::GprFp);
        l.fpscr.offset = l.red_zone.offset;
        assert!(matches!(
            l.verify(),
            Err(LayoutError::RegionOutOfBounds {
                kind: RegionKind::Fpscr,
                ..
            })
        ));
    }

    #[test]
    fn odd_frame_size_is_rejected() {
        let mut l = FrameLayout::compute(Abi::Ppc32, Variant::Gpr);
        l.size -= 8;
        assert!(matches!(l.verify(), Err(LayoutError::FrameMisaligned { .. })));
    }

    #[test]
    fn frame_size_must_fit_the_release_immediate() {
        let mut l = FrameLayout::compute(Abi::Ppc64Elfv2, Variant::Gpr);
        l.size = MAX_DISPLACEMENT + 1;
        assert_eq!(
            l.verify(),
            Err(LayoutError::DisplacementOutOfRange {
                kind: RegionKind::Header,
                displacement: 0x8000,
            })
        );
    }

    #[test]
    fn present_regions_follow_the_stack_upwards() {
        let l = FrameLayout::compute(Abi::Ppc64Elfv1, Variant::GprFpVsx);
        let kinds: [Option<RegionKind>; 10] = {
            let mut kinds = [None; 10];
            for (slot, region) in kinds.iter_mut().zip(l.present_regions()) {
                *slot = Some(region.kind);
            }
            kinds
        };
        assert_eq!(kinds[0], Some(RegionKind::Header));
        assert_eq!(kinds[1], Some(RegionKind::Specials));
        assert_eq!(kinds[2], Some(RegionKind::Gpr));
        // The bank is listed before the FPR view that starts at the same byte.
        assert_eq!(kinds[3], Some(RegionKind::Vsr));
        assert_eq!(kinds[4], Some(RegionKind::Fpr));

        let mut last = 0;
        for region in l.present_regions() {
            assert!(region.offset >= last, "{:?}", region.kind);
            last = region.offset;
        }
    }

    #[test]
    fn align_up_rounds_to_power_of_two() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(584, 16), 592);
        assert_eq!(align_up(152, 8), 152);
    }
}
