//! Target word-size / calling-convention configurations.

use core::fmt;

/// One of the three calling conventions a frame is laid out for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Abi {
    /// 32-bit System V (big-endian).
    Ppc32,
    /// 64-bit ELFv1 (big-endian, function descriptors, TOC in r2).
    Ppc64Elfv1,
    /// 64-bit ELFv2 (little-endian, TOC in r2).
    Ppc64Elfv2,
}

impl Abi {
    pub const ALL: [Self; 3] = [Self::Ppc32, Self::Ppc64Elfv1, Self::Ppc64Elfv2];

    /// Configuration of the target being compiled for, if it is a Power ISA one.
    pub const NATIVE: Option<Self> = if cfg!(target_arch = "powerpc64") {
        if cfg!(target_endian = "little") {
            Some(Self::Ppc64Elfv2)
        } else {
            Some(Self::Ppc64Elfv1)
        }
    } else if cfg!(target_arch = "powerpc") {
        Some(Self::Ppc32)
    } else {
        None
    };

    /// GPR width in bytes.
    #[must_use]
    pub const fn word_size(self) -> usize {
        match self {
            Self::Ppc32 => 4,
            Self::Ppc64Elfv1 | Self::Ppc64Elfv2 => 8,
        }
    }

    /// Fixed header every frame starts with so the callee can store its
    /// back chain, LR (and on 64-bit CR/TOC, and on ELFv1 the parameter
    /// save area) into its caller's frame.
    #[must_use]
    pub const fn header_size(self) -> usize {
        match self {
            Self::Ppc32 => 8,
            Self::Ppc64Elfv1 => 112,
            Self::Ppc64Elfv2 => 32,
        }
    }

    /// Bytes below the interrupted stack pointer the interrupted code may
    /// legally be using without having allocated them.
    #[must_use]
    pub const fn red_zone(self) -> usize {
        match self {
            Self::Ppc32 => 0,
            Self::Ppc64Elfv1 | Self::Ppc64Elfv2 => 288,
        }
    }

    #[must_use]
    #[allow(clippy::unused_self)]
    pub const fn stack_align(self) -> usize {
        16
    }

    #[must_use]
    pub const fn is_big_endian(self) -> bool {
        match self {
            Self::Ppc32 | Self::Ppc64Elfv1 => true,
            Self::Ppc64Elfv2 => false,
        }
    }

    /// GPR holding the per-thread pointer. Never saved, never written.
    #[must_use]
    pub const fn thread_pointer(self) -> usize {
        match self {
            Self::Ppc32 => 2,
            Self::Ppc64Elfv1 | Self::Ppc64Elfv2 => 13,
        }
    }

    /// GPR the convention reserves for the TOC base, if any.
    #[must_use]
    pub const fn toc_pointer(self) -> Option<usize> {
        match self {
            Self::Ppc32 => None,
            Self::Ppc64Elfv1 | Self::Ppc64Elfv2 => Some(2),
        }
    }

    /// Whether GPR `n` is part of the saved context.
    #[must_use]
    pub const fn saves_gpr(self, n: usize) -> bool {
        n < 32 && n != STACK_POINTER && n != self.thread_pointer()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ppc32 => "ppc32",
            Self::Ppc64Elfv1 => "ppc64-elfv1",
            Self::Ppc64Elfv2 => "ppc64-elfv2",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|abi| abi.as_str() == name)
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// r1 in every configuration.
pub const STACK_POINTER: usize = 1;

/// Sealed trait pattern to restrict `Target` impls to our markers.
mod sealed {
    pub trait Sealed {}
}

/// Type-level [`Abi`], so frame layouts resolve to constants.
pub trait Target: sealed::Sealed + Copy + fmt::Debug + Send + Sync + 'static {
    const ABI: Abi;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ppc32;
impl sealed::Sealed for Ppc32 {}
impl Target for Ppc32 {
    const ABI: Abi = Abi::Ppc32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ppc64Elfv1;
impl sealed::Sealed for Ppc64Elfv1 {}
impl Target for Ppc64Elfv1 {
    const ABI: Abi = Abi::Ppc64Elfv1;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ppc64Elfv2;
impl sealed::Sealed for Ppc64Elfv2 {}
impl Target for Ppc64Elfv2 {
    const ABI: Abi = Abi::Ppc64Elfv2;
}

#[cfg(all(target_arch = "powerpc64", target_endian = "little"))]
pub type Native = Ppc64Elfv2;

#[cfg(all(target_arch = "powerpc64", target_endian = "big"))]
pub type Native = Ppc64Elfv1;

#[cfg(target_arch = "powerpc")]
pub type Native = Ppc32;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reserved_registers_are_not_saved() {
        assert!(!Abi::Ppc32.saves_gpr(1));
        assert!(!Abi::Ppc32.saves_gpr(2));
        assert!(Abi::Ppc32.saves_gpr(13));
        assert!(!Abi::Ppc64Elfv2.saves_gpr(13));
        assert!(Abi::Ppc64Elfv2.saves_gpr(2));
        assert!(!Abi::Ppc64Elfv1.saves_gpr(32));
    }

    #[test]
    fn names_round_trip() {
        for abi in Abi::ALL {
            assert_eq!(Abi::from_name(abi.as_str()), Some(abi));
        }
        assert_eq!(Abi::from_name("x86_64"), None);
    }
}
