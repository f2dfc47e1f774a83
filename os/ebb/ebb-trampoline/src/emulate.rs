//! # Host Emulation of the Trampoline
//!
//! The entry points only assemble for Power ISA targets. To check the save/restore
//! sequence anywhere, this module replays it instruction by instruction on a
//! modelled [`Cpu`] over a byte-addressed [`Memory`], using the very same
//! [`FrameLayout`](ebb_frame::FrameLayout) constants and the same scratch
//! registers. Effects the architecture leaves undefined, such as doubleword 1
//! of a VSR after a scalar load, are modelled as the [`UNDEFINED`] pattern so
//! that a sequence relying on them shows up.
//!
//! ```rust
//! # use ebb_frame::{Abi, GprFp, Ppc64Elfv2};
//! # use ebb_trampoline::emulate::{Cpu, Image, Memory, Trampoline};
//! let mut stack = vec![0u8; 4096];
//! let mut memory = Memory::new(0x1000, &mut stack);
//! let mut cpu = Cpu::new(Abi::Ppc64Elfv2);
//! cpu.gpr[1] = 0x1000 + 4096;
//! cpu.gpr[14] = 0x1414;
//! cpu.pc = 0x4000_0000;
//!
//! let image = Image { entry: 0x10_0000, toc: 0x10_8000 };
//! assert!(cpu.take_ebb(image.entry));
//!
//! let trampoline = Trampoline::<Ppc64Elfv2, GprFp>::new(image);
//! let transcript = trampoline.run(&mut cpu, &mut memory, |cpu, _| cpu.gpr[14] = 0);
//!
//! assert!(transcript.is_complete());
//! assert_eq!(cpu.gpr[14], 0x1414);
//! assert_eq!(cpu.pc, 0x4000_0000);
//! ```

mod cpu;
mod memory;
mod trampoline;

pub use cpu::{Cpu, UNDEFINED};
pub use memory::Memory;
pub use trampoline::{Image, Transcript, Trampoline, dispatching};
