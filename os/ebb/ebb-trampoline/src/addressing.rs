//! # Module Addressing
//!
//! On 64-bit targets the dispatch routine expects `r2` to hold the TOC
//! pointer of the module the trampoline lives in. The interrupted code may
//! have been running with another module's TOC, so every entry point computes
//! its own before the call:
//!
//! ```text
//!     bcl   20, 31, 2f             # LR = address of 2
//! 2:  mflr  2
//!     addis 2, 2, (.TOC. - 2b)@ha
//!     addi  2, 2, (.TOC. - 2b)@l
//! ```
//!
//! The result depends only on where the code was loaded, so running the
//! sequence again yields the same value. 32-bit targets have no TOC and skip
//! the step.

/// The `@l` half of a 32-bit displacement, as `addi` sign-extends it.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub const fn lo(displacement: i64) -> i16 {
    displacement as i16
}

/// The `@ha` half of a 32-bit displacement, adjusted for the sign extension
/// of [`lo`].
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub const fn ha(displacement: i64) -> i16 {
    ((displacement + 0x8000) >> 16) as i16
}

/// What `addis rD, rA, ha; addi rD, rD, lo` adds to `rA`.
#[must_use]
pub const fn combine(ha: i16, lo: i16) -> i64 {
    ((ha as i64) << 16) + lo as i64
}

/// Computes this module's TOC base with the same sequence the trampoline
/// entry points use.
#[cfg(target_arch = "powerpc64")]
#[inline(never)]
#[must_use]
pub fn toc_base() -> usize {
    let toc: usize;
    unsafe {
        core::arch::asm!(
            "bcl 20, 31, 2f",
            "2:",
            "mflr {toc}",
            "addis {toc}, {toc}, (.TOC. - 2b)@ha",
            "addi {toc}, {toc}, (.TOC. - 2b)@l",
            toc = out(reg_nonzero) toc,
            out("lr") _,
            options(nomem, nostack, preserves_flags),
        );
    }
    toc
}

/// The TOC pointer the calling Rust code runs with.
#[cfg(target_arch = "powerpc64")]
#[inline(always)]
#[allow(clippy::inline_always)]
#[must_use]
pub fn current_toc() -> usize {
    let toc: usize;
    unsafe {
        core::arch::asm!("mr {}, 2", out(reg) toc, options(nomem, nostack, preserves_flags));
    }
    toc
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn halves_recombine() {
        for displacement in [
            0,
            1,
            -1,
            0x7FFF,
            0x8000,
            -0x8000,
            -0x8001,
            0x1234_8000,
            0x0001_FFFF,
            -0x7654_3210,
            0x7FFF_7FFF,
        ] {
            assert_eq!(
                combine(ha(displacement), lo(displacement)),
                displacement,
                "{displacement:#x}"
            );
        }
    }

    #[test]
    fn ha_compensates_for_negative_low_half() {
        assert_eq!(lo(0x1_8000), -0x8000);
        assert_eq!(ha(0x1_8000), 2);
    }

    #[cfg(target_arch = "powerpc64")]
    #[test]
    fn toc_base_is_stable_and_matches_r2() {
        let first = toc_base();
        assert_eq!(first, toc_base());
        assert_eq!(first, current_toc());
    }
}
