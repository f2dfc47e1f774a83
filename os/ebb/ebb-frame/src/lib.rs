//! # Event-Based Branch Frame Layouts
//!
//! The trampoline behind a Power ISA event-based branch saves the interrupted
//! code's registers into a stack frame whose layout is fixed per target
//! configuration and per register-set variant. This crate computes those
//! layouts as constants and checks them.
//!
//! | Concept | Type |
//! |---------|------|
//! | Calling convention (word size, header gap, red zone, byte order) | [`Abi`], [`Target`] markers |
//! | Which register banks are carried | [`Variant`], [`RegisterSet`] markers |
//! | Byte offsets of every slot | [`FrameLayout`], [`Frame<T, R>`](Frame) |
//! | Interpreting saved bytes | [`SavedContext`] |
//! | FPR/VR/VSR aliasing | [`VsxSlot`], [`VsxFile`] |
//!
//! ## Typical Usage
//!
//! ```rust
//! # use ebb_frame::*;
//! let layout = Frame::<Ppc64Elfv2, GprFpVsx>::LAYOUT;
//! assert_eq!(layout.size % 16, 0);
//! assert!(layout.verify().is_ok());
//!
//! // FPR 3 lives in the first doubleword of VSR 3.
//! assert_eq!(layout.fpr.slot(3), layout.vsr.slot(3));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod context;
pub mod image;
pub mod layout;
pub mod target;
pub mod variant;
pub mod vsx;

pub use context::SavedContext;
pub use layout::{Frame, FrameLayout, LAYOUTS, LayoutError, Region, RegionKind, Special};
pub use target::{Abi, Ppc32, Ppc64Elfv1, Ppc64Elfv2, STACK_POINTER, Target};
pub use variant::{Gpr, GprFp, GprFpVec, GprFpVsx, RegisterSet, Variant};
pub use vsx::{VsxFile, VsxSlot};

#[cfg(any(target_arch = "powerpc", target_arch = "powerpc64"))]
pub use target::Native;
