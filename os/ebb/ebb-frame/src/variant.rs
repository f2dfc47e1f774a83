//! Register-set policies: which banks a trampoline variant carries.

use core::fmt;

/// The four trampoline variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variant {
    /// GPRs plus CR, LR, CTR, XER.
    Gpr,
    /// Adds the 32 FPRs and FPSCR.
    GprFp,
    /// Adds the 32 VRs, VSCR and VRSAVE on top of [`GprFp`](Self::GprFp).
    GprFpVec,
    /// GPRs plus the full 64-entry VSX file, which subsumes FPRs and VRs,
    /// with FPSCR, VSCR and VRSAVE.
    GprFpVsx,
}

impl Variant {
    pub const ALL: [Self; 4] = [Self::Gpr, Self::GprFp, Self::GprFpVec, Self::GprFpVsx];

    /// FPRs are carried (standalone or through the VSX file).
    #[must_use]
    pub const fn saves_fp(self) -> bool {
        !matches!(self, Self::Gpr)
    }

    /// VRs are carried (standalone or through the VSX file).
    #[must_use]
    pub const fn saves_vec(self) -> bool {
        matches!(self, Self::GprFpVec | Self::GprFpVsx)
    }

    /// The 64-entry VSX file is carried instead of separate FPR/VR banks.
    #[must_use]
    pub const fn saves_vsx(self) -> bool {
        matches!(self, Self::GprFpVsx)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gpr => "gpr",
            Self::GprFp => "gpr+fp",
            Self::GprFpVec => "gpr+fp+vec",
            Self::GprFpVsx => "gpr+fp+vsx",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Type-level [`Variant`].
///
/// Code generic over `R: RegisterSet` branches on the associated constants
/// only, so every instantiation folds to a fixed sequence.
pub trait RegisterSet: sealed::Sealed + Copy + fmt::Debug + Send + Sync + 'static {
    const VARIANT: Variant;
    const FP: bool = Self::VARIANT.saves_fp();
    const VEC: bool = Self::VARIANT.saves_vec();
    const VSX: bool = Self::VARIANT.saves_vsx();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gpr;
impl sealed::Sealed for Gpr {}
impl RegisterSet for Gpr {
    const VARIANT: Variant = Variant::Gpr;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GprFp;
impl sealed::Sealed for GprFp {}
impl RegisterSet for GprFp {
    const VARIANT: Variant = Variant::GprFp;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GprFpVec;
impl sealed::Sealed for GprFpVec {}
impl RegisterSet for GprFpVec {
    const VARIANT: Variant = Variant::GprFpVec;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GprFpVsx;
impl sealed::Sealed for GprFpVsx {}
impl RegisterSet for GprFpVsx {
    const VARIANT: Variant = Variant::GprFpVsx;
}
