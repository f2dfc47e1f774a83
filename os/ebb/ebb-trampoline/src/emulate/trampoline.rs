use core::marker::PhantomData;

use ebb_frame::{Frame, FrameLayout, RegisterSet, STACK_POINTER, Special, Target, Variant};

use super::{Cpu, Memory};
use crate::addressing::{ha, lo};
use crate::dispatch::dispatch;
use crate::registry::HandlerLookup;
use crate::state::TrampolineState;

/// Scratch register for special-register moves.
const R0: usize = 0;
/// Index register for the vector loads and stores.
const R12: usize = 12;
/// Scratch FPR and VR, saved before use.
const F0: usize = 0;
const V0: usize = 0;

/// Where the trampoline's code and its module's TOC live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Image {
    pub entry: u64,
    /// Value of `.TOC.` for the module (ignored on 32-bit).
    pub toc: u64,
}

/// The states one invocation went through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transcript {
    states: [TrampolineState; 7],
    len: usize,
}

impl Transcript {
    const fn new() -> Self {
        Self {
            states: [TrampolineState::Entry; 7],
            len: 1,
        }
    }

    fn advance(&mut self, to: TrampolineState) {
        let from = self.states[self.len - 1];
        assert_eq!(from.next(), Some(to), "illegal transition {from} -> {to}");
        self.states[self.len] = to;
        self.len += 1;
    }

    #[must_use]
    pub fn as_slice(&self) -> &[TrampolineState] {
        &self.states[..self.len]
    }

    #[must_use]
    pub const fn last(&self) -> TrampolineState {
        self.states[self.len - 1]
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.len == TrampolineState::SEQUENCE.len()
    }
}

/// Instruction-level model of one entry point.
#[derive(Debug, Clone, Copy)]
pub struct Trampoline<T: Target, R: RegisterSet> {
    image: Image,
    _marker: PhantomData<(T, R)>,
}

// Frame offsets are verified to fit a 16-bit displacement.
#[allow(clippy::cast_possible_wrap)]
const fn d(offset: usize) -> i64 {
    offset as i64
}

impl<T: Target, R: RegisterSet> Trampoline<T, R> {
    pub const LAYOUT: FrameLayout = Frame::<T, R>::LAYOUT;
    pub const VARIANT: Variant = R::VARIANT;

    #[must_use]
    pub const fn new(image: Image) -> Self {
        Self {
            image,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn image(&self) -> Image {
        self.image
    }

    /// Runs one invocation on a `cpu` that has just taken the branch to
    /// [`Image::entry`]. `callee` stands for the dispatch routine.
    ///
    /// # Panics
    /// Panics if `cpu` is configured for another target, is not at the entry
    /// point, or if a frame access falls outside `memory`.
    pub fn run<F>(&self, cpu: &mut Cpu, memory: &mut Memory<'_>, callee: F) -> Transcript
    where
        F: FnOnce(&mut Cpu, &mut Memory<'_>),
    {
        assert_eq!(cpu.abi, T::ABI, "CPU configured for another target");
        assert_eq!(cpu.pc, self.image.entry, "CPU is not at the entry point");
        let mut transcript = Transcript::new();

        cpu.store_word_update(memory, STACK_POINTER, STACK_POINTER, -d(Self::LAYOUT.size));
        transcript.advance(TrampolineState::FrameReserved);

        Self::save(cpu, memory);
        transcript.advance(TrampolineState::ContextSaved);

        self.establish_addressing(cpu);
        transcript.advance(TrampolineState::HandlerRunning);
        Self::call(cpu, memory, callee);

        Self::restore(cpu, memory);
        transcript.advance(TrampolineState::ContextRestored);

        cpu.addi(STACK_POINTER, STACK_POINTER, d(Self::LAYOUT.size));
        transcript.advance(TrampolineState::FrameReleased);

        cpu.rfebb();
        transcript.advance(TrampolineState::Resumed);
        transcript
    }

    fn save(cpu: &mut Cpu, memory: &mut Memory<'_>) {
        let layout = Self::LAYOUT;

        for r in 0..32 {
            if T::ABI.saves_gpr(r) {
                cpu.store_word(memory, r, STACK_POINTER, d(layout.gpr_slot(r)));
            }
        }

        cpu.mfcr(R0);
        cpu.store_word(memory, R0, STACK_POINTER, d(layout.special_slot(Special::Cr)));
        cpu.mflr(R0);
        cpu.store_word(memory, R0, STACK_POINTER, d(layout.special_slot(Special::Lr)));
        cpu.mfctr(R0);
        cpu.store_word(memory, R0, STACK_POINTER, d(layout.special_slot(Special::Ctr)));
        cpu.mfxer(R0);
        cpu.store_word(memory, R0, STACK_POINTER, d(layout.special_slot(Special::Xer)));

        if R::VSX {
            for x in 0..64 {
                cpu.addi(R12, 0, d(layout.vsr.slot(x)));
                cpu.stxvd2x(memory, x, STACK_POINTER, R12);
            }
            Self::save_fpscr(cpu, memory);
            Self::save_vscr_vrsave(cpu, memory);
            return;
        }

        if R::FP {
            for f in 0..32 {
                cpu.stfd(memory, f, STACK_POINTER, d(layout.fpr.slot(f)));
            }
            Self::save_fpscr(cpu, memory);
        }
        if R::VEC {
            for v in 0..32 {
                cpu.addi(R12, 0, d(layout.vr.slot(v)));
                cpu.stvx(memory, v, STACK_POINTER, R12);
            }
            Self::save_vscr_vrsave(cpu, memory);
        }
    }

    fn restore(cpu: &mut Cpu, memory: &mut Memory<'_>) {
        let layout = Self::LAYOUT;

        if R::VSX {
            Self::restore_vscr(cpu, memory);
            Self::restore_fpscr(cpu, memory);
            for x in 0..64 {
                cpu.addi(R12, 0, d(layout.vsr.slot(x)));
                cpu.lxvd2x(memory, x, STACK_POINTER, R12);
            }
            Self::restore_vrsave(cpu, memory);
        } else {
            if R::FP {
                Self::restore_fpscr(cpu, memory);
                for f in 0..32 {
                    cpu.lfd(memory, f, STACK_POINTER, d(layout.fpr.slot(f)));
                }
            }
            if R::VEC {
                Self::restore_vscr(cpu, memory);
                for v in 0..32 {
                    cpu.addi(R12, 0, d(layout.vr.slot(v)));
                    cpu.lvx(memory, v, STACK_POINTER, R12);
                }
                Self::restore_vrsave(cpu, memory);
            }
        }

        cpu.load_word(memory, R0, STACK_POINTER, d(layout.special_slot(Special::Cr)));
        cpu.mtcr(R0);
        cpu.load_word(memory, R0, STACK_POINTER, d(layout.special_slot(Special::Lr)));
        cpu.mtlr(R0);
        cpu.load_word(memory, R0, STACK_POINTER, d(layout.special_slot(Special::Ctr)));
        cpu.mtctr(R0);
        cpu.load_word(memory, R0, STACK_POINTER, d(layout.special_slot(Special::Xer)));
        cpu.mtxer(R0);

        for r in 0..32 {
            if T::ABI.saves_gpr(r) {
                cpu.load_word(memory, r, STACK_POINTER, d(layout.gpr_slot(r)));
            }
        }
    }

    fn save_fpscr(cpu: &mut Cpu, memory: &mut Memory<'_>) {
        cpu.mffs(F0);
        cpu.stfd(memory, F0, STACK_POINTER, d(Self::LAYOUT.fpscr.offset));
    }

    fn restore_fpscr(cpu: &mut Cpu, memory: &Memory<'_>) {
        cpu.lfd(memory, F0, STACK_POINTER, d(Self::LAYOUT.fpscr.offset));
        cpu.mtfsf(F0);
    }

    fn save_vscr_vrsave(cpu: &mut Cpu, memory: &mut Memory<'_>) {
        cpu.mfvscr(V0);
        cpu.vspltw(V0, V0, 3);
        cpu.addi(R12, 0, d(Self::LAYOUT.vscr.offset));
        cpu.stvx(memory, V0, STACK_POINTER, R12);
        cpu.mfvrsave(R0);
        cpu.stw(memory, R0, STACK_POINTER, d(Self::LAYOUT.vrsave.offset));
    }

    fn restore_vscr(cpu: &mut Cpu, memory: &Memory<'_>) {
        cpu.addi(R12, 0, d(Self::LAYOUT.vscr.offset));
        cpu.lvx(memory, V0, STACK_POINTER, R12);
        cpu.mtvscr(V0);
    }

    fn restore_vrsave(cpu: &mut Cpu, memory: &Memory<'_>) {
        cpu.lwz(memory, R0, STACK_POINTER, d(Self::LAYOUT.vrsave.offset));
        cpu.mtvrsave(R0);
    }

    /// `bcl`/`mflr`/`addis`/`addi` against `.TOC.` on 64-bit targets.
    #[allow(clippy::cast_possible_wrap)]
    fn establish_addressing(&self, cpu: &mut Cpu) {
        let Some(toc) = T::ABI.toc_pointer() else {
            return;
        };
        cpu.bcl_next();
        cpu.mflr(toc);
        let displacement = self.image.toc.wrapping_sub(cpu.gpr[toc]) as i64;
        cpu.addis(toc, toc, ha(displacement));
        cpu.addi(toc, toc, i64::from(lo(displacement)));
    }

    /// `bl` (plus the TOC-restore `nop` on 64-bit).
    fn call<F>(cpu: &mut Cpu, memory: &mut Memory<'_>, callee: F)
    where
        F: FnOnce(&mut Cpu, &mut Memory<'_>),
    {
        let return_address = cpu.pc.wrapping_add(4) & cpu.word_mask();
        cpu.lr = return_address;
        callee(cpu, memory);
        cpu.pc = return_address;
        if T::ABI.toc_pointer().is_some() {
            cpu.pc = cpu.pc.wrapping_add(4);
        }
    }
}

/// The callee the real entry points have: resolve the handler for the
/// thread in the CPU's thread-pointer register and run it, then leave every
/// volatile register of the classes `variant` carries overwritten, as any
/// compiled function is allowed to.
#[must_use]
pub fn dispatching<L: HandlerLookup + ?Sized>(
    lookup: &L,
    variant: Variant,
    seed: u64,
) -> impl FnOnce(&mut Cpu, &mut Memory<'_>) + '_ {
    move |cpu: &mut Cpu, _memory: &mut Memory<'_>| {
        dispatch(lookup, cpu.thread_key());
        cpu.clobber_volatile(variant, seed);
    }
}
