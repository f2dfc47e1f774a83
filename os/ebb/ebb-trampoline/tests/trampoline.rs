use core::ffi::c_void;
use ebb_frame::{
    Abi, Frame, Gpr, GprFp, GprFpVec, GprFpVsx, Ppc32, Ppc64Elfv1, Ppc64Elfv2, RegisterSet,
    SavedContext, Special, Target, Variant, VsxSlot,
};
use ebb_registers::fpscr::RoundingMode;
use ebb_registers::{Cr, Fpscr, Vrsave, Vscr, Xer};
use ebb_trampoline::emulate::{Cpu, Image, Memory, Trampoline, dispatching};
use ebb_trampoline::{HandlerRegistry, ThreadKey, TrampolineState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const STACK_BASE: u64 = 0x7fff_0000;
const STACK_LEN: usize = 16 * 1024;
const STACK_TOP: u64 = STACK_BASE + STACK_LEN as u64;
const FILL: u8 = 0x5A;
const RESUME_AT: u64 = 0x1000_4444;

const IMAGE: Image = Image {
    entry: 0x1001_0000,
    toc: 0x1003_8000,
};

unsafe extern "C" fn count(context: *mut c_void) {
    let counter = unsafe { &*context.cast::<AtomicUsize>() };
    counter.fetch_add(1, Ordering::Relaxed);
}

unsafe extern "C" fn nothing(_context: *mut c_void) {}

fn context_of(counter: &AtomicUsize) -> *mut c_void {
    (&raw const *counter).cast_mut().cast()
}

/// A CPU as if interrupted in the middle of some busy code.
fn interrupted(abi: Abi, thread_pointer: u64) -> Cpu {
    interrupted_with(abi, thread_pointer, 0)
}

/// Like [`interrupted`], with `salt` mixed into every register byte so that
/// differently salted CPUs share no register value.
fn interrupted_with(abi: Abi, thread_pointer: u64, salt: u8) -> Cpu {
    let mut cpu = Cpu::new(abi);
    let mask = cpu.word_mask();
    let salted = |byte: u8| u64::from_ne_bytes([byte ^ salt; 8]) & mask;
    for (r, byte) in (0x11..=0x30u8).enumerate() {
        cpu.gpr[r] = salted(byte);
    }
    cpu.gpr[1] = STACK_TOP;
    cpu.gpr[abi.thread_pointer()] = thread_pointer;

    #[allow(clippy::cast_possible_truncation)]
    let cr = salted(0xAA) as u32;
    cpu.cr = Cr::from_bits(cr);
    cpu.lr = salted(0xBB);
    cpu.ctr = salted(0xCC);
    cpu.xer = Xer::new()
        .with_so(true)
        .with_ca(salt % 2 == 0)
        .with_byte_count((0x5D ^ salt) & 0x7F);

    for x in 0..64 {
        let quad: [u8; 16] =
            core::array::from_fn(|b| u8::try_from((x * 16 + b) % 251).unwrap() ^ 0xA5 ^ salt);
        cpu.vsx.set_vsr(x, VsxSlot::from_quad(quad));
    }
    let rn = if salt % 2 == 0 {
        RoundingMode::TowardZero
    } else {
        RoundingMode::TowardPositive
    };
    cpu.fpscr = Fpscr::new()
        .with_rn(rn)
        .with_ve(true)
        .with_xx(true)
        .with_fx(true)
        .with_fprf(0b0_0100)
        .with_summaries();
    cpu.vscr = Vscr::new().with_nj(true).with_sat(true);
    cpu.vrsave = Vrsave::from_bits(0xFFF0_000F ^ u32::from(salt));

    cpu.pc = RESUME_AT;
    cpu
}

fn take_event(cpu: &mut Cpu) {
    assert!(cpu.take_ebb(IMAGE.entry));
}

fn assert_restored(before: &Cpu, after: &Cpu, variant: Variant) {
    assert_eq!(after.gpr, before.gpr, "{variant}");
    assert_eq!(after.cr, before.cr, "{variant}");
    assert_eq!(after.lr, before.lr, "{variant}");
    assert_eq!(after.ctr, before.ctr, "{variant}");
    assert_eq!(after.xer, before.xer, "{variant}");
    assert_eq!(after.pc, RESUME_AT);
    assert!(after.ebb_enabled);

    if variant.saves_vsx() {
        assert_eq!(after.vsx, before.vsx, "{variant}");
    }
    if variant.saves_fp() {
        for f in 0..32 {
            assert_eq!(after.vsx.fpr(f), before.vsx.fpr(f), "{variant}: f{f}");
        }
        assert_eq!(after.fpscr, before.fpscr, "{variant}");
    }
    if variant.saves_vec() {
        for v in 0..32 {
            assert_eq!(after.vsx.vr(v), before.vsx.vr(v), "{variant}: v{v}");
        }
        assert_eq!(after.vscr, before.vscr, "{variant}");
        assert_eq!(after.vrsave, before.vrsave, "{variant}");
    }
}

/// Every byte at or above the interrupted stack pointer minus the red zone.
fn assert_caller_memory_untouched(memory: &Memory<'_>, abi: Abi) {
    let protected = STACK_TOP - abi.red_zone() as u64;
    let len = usize::try_from(STACK_TOP - protected).unwrap();
    assert!(
        memory.slice(protected, len).iter().all(|&b| b == FILL),
        "{abi}: red zone written"
    );
}

fn round_trip<T: Target, R: RegisterSet>() {
    let abi = T::ABI;
    let tp = 0x7000_0000 + abi as u64;
    let mut stack = vec![FILL; STACK_LEN];
    let mut memory = Memory::new(STACK_BASE, &mut stack);

    let registry = HandlerRegistry::<4>::new();
    let counter = AtomicUsize::new(0);
    unsafe { registry.install(ThreadKey::new(tp), count, context_of(&counter)) }.unwrap();

    let before = interrupted(abi, tp);
    let mut cpu = before.clone();
    take_event(&mut cpu);

    let transcript = Trampoline::<T, R>::new(IMAGE).run(
        &mut cpu,
        &mut memory,
        dispatching(&registry, R::VARIANT, 0xC0FF_EE00 + abi as u64),
    );

    assert!(transcript.is_complete());
    assert_eq!(counter.load(Ordering::Relaxed), 1);
    assert_restored(&before, &cpu, R::VARIANT);
    assert_caller_memory_untouched(&memory, abi);
}

macro_rules! round_trips {
    ($($name:ident: $target:ty, $set:ty;)*) => {
        $(
            #[test]
            fn $name() {
                round_trip::<$target, $set>();
            }
        )*
    };
}

round_trips! {
    ppc32_gpr: Ppc32, Gpr;
    ppc32_gpr_fp: Ppc32, GprFp;
    ppc32_gpr_fp_vec: Ppc32, GprFpVec;
    ppc32_gpr_fp_vsx: Ppc32, GprFpVsx;
    elfv1_gpr: Ppc64Elfv1, Gpr;
    elfv1_gpr_fp: Ppc64Elfv1, GprFp;
    elfv1_gpr_fp_vec: Ppc64Elfv1, GprFpVec;
    elfv1_gpr_fp_vsx: Ppc64Elfv1, GprFpVsx;
    elfv2_gpr: Ppc64Elfv2, Gpr;
    elfv2_gpr_fp: Ppc64Elfv2, GprFp;
    elfv2_gpr_fp_vec: Ppc64Elfv2, GprFpVec;
    elfv2_gpr_fp_vsx: Ppc64Elfv2, GprFpVsx;
}

#[test]
fn event_without_a_handler_is_dropped_cleanly() {
    let mut stack = vec![FILL; STACK_LEN];
    let mut memory = Memory::new(STACK_BASE, &mut stack);
    let registry = HandlerRegistry::<4>::new();

    let before = interrupted(Abi::Ppc64Elfv2, 0x7100);
    let mut cpu = before.clone();
    take_event(&mut cpu);
    Trampoline::<Ppc64Elfv2, GprFpVec>::new(IMAGE).run(
        &mut cpu,
        &mut memory,
        dispatching(&registry, Variant::GprFpVec, 1),
    );

    assert_restored(&before, &cpu, Variant::GprFpVec);
}

#[test]
fn noop_handler_leaves_everything_as_it_was() {
    let mut stack = vec![FILL; STACK_LEN];
    let mut memory = Memory::new(STACK_BASE, &mut stack);
    let registry = HandlerRegistry::<4>::new();
    unsafe { registry.install(ThreadKey::new(0x7200), nothing, core::ptr::null_mut()) }.unwrap();

    let before = interrupted(Abi::Ppc64Elfv1, 0x7200);
    let mut cpu = before.clone();
    take_event(&mut cpu);
    Trampoline::<Ppc64Elfv1, GprFpVsx>::new(IMAGE).run(
        &mut cpu,
        &mut memory,
        dispatching(&registry, Variant::GprFpVsx, 2),
    );

    let mut expected = before;
    expected.ebbrr = RESUME_AT;
    assert_eq!(cpu, expected);
}

#[test]
fn gpr_variant_does_not_touch_floating_point_or_vector_state() {
    for abi in Abi::ALL {
        let mut stack = vec![FILL; STACK_LEN];
        let mut memory = Memory::new(STACK_BASE, &mut stack);
        let registry = HandlerRegistry::<1>::new();

        let before = interrupted(abi, 0x7300);
        let mut cpu = before.clone();
        take_event(&mut cpu);
        let callee = dispatching(&registry, Variant::Gpr, 3);
        match abi {
            Abi::Ppc32 => Trampoline::<Ppc32, Gpr>::new(IMAGE).run(&mut cpu, &mut memory, callee),
            Abi::Ppc64Elfv1 => {
                Trampoline::<Ppc64Elfv1, Gpr>::new(IMAGE).run(&mut cpu, &mut memory, callee)
            }
            Abi::Ppc64Elfv2 => {
                Trampoline::<Ppc64Elfv2, Gpr>::new(IMAGE).run(&mut cpu, &mut memory, callee)
            }
        };

        assert_eq!(cpu.vsx, before.vsx, "{abi}");
        assert_eq!(cpu.fpscr, before.fpscr, "{abi}");
        assert_eq!(cpu.vscr, before.vscr, "{abi}");
        assert_eq!(cpu.vrsave, before.vrsave, "{abi}");
    }
}

#[test]
fn handler_state_persists_across_events() {
    let mut stack = vec![FILL; STACK_LEN];
    let mut memory = Memory::new(STACK_BASE, &mut stack);
    let registry = HandlerRegistry::<4>::new();
    let counter = AtomicUsize::new(0);
    unsafe { registry.install(ThreadKey::new(0x7400), count, context_of(&counter)) }.unwrap();

    let before = interrupted(Abi::Ppc32, 0x7400);
    let mut cpu = before.clone();
    for seed in 0..5 {
        take_event(&mut cpu);
        Trampoline::<Ppc32, GprFp>::new(IMAGE).run(
            &mut cpu,
            &mut memory,
            dispatching(&registry, Variant::GprFp, seed),
        );
        assert_restored(&before, &cpu, Variant::GprFp);
    }
    assert_eq!(counter.load(Ordering::Relaxed), 5);
}

#[test]
fn misbehaving_callee_cannot_leak_into_the_interrupted_code() {
    let mut stack = vec![FILL; STACK_LEN];
    let mut memory = Memory::new(STACK_BASE, &mut stack);

    let before = interrupted(Abi::Ppc64Elfv2, 0x7500);
    let mut cpu = before.clone();
    take_event(&mut cpu);
    Trampoline::<Ppc64Elfv2, GprFpVsx>::new(IMAGE).run(&mut cpu, &mut memory, |cpu, _| {
        for r in (0..32).filter(|&r| r != 1 && r != 13) {
            cpu.gpr[r] = !cpu.gpr[r];
        }
        cpu.cr = Cr::from_bits(!cpu.cr.into_bits());
        for x in 0..64 {
            cpu.vsx.set_vsr(x, VsxSlot::from_quad([0xEE; 16]));
        }
        cpu.fpscr = Fpscr::new().with_rn(RoundingMode::TowardNegative);
        cpu.vscr = Vscr::new();
        cpu.vrsave = Vrsave::from_bits(0);
    });

    assert_restored(&before, &cpu, Variant::GprFpVsx);
}

#[test]
fn frame_seen_by_the_handler_holds_the_interrupted_context() {
    let mut stack = vec![FILL; STACK_LEN];
    let mut memory = Memory::new(STACK_BASE, &mut stack);
    let layout = Frame::<Ppc64Elfv2, GprFpVsx>::LAYOUT;

    let before = interrupted(Abi::Ppc64Elfv2, 0x7600);
    let mut cpu = before.clone();
    take_event(&mut cpu);
    Trampoline::<Ppc64Elfv2, GprFpVsx>::new(IMAGE).run(&mut cpu, &mut memory, |cpu, memory| {
        let mut frame = memory.slice(cpu.stack_pointer(), layout.size).to_vec();
        let saved = SavedContext::new(layout, &mut frame).unwrap();

        assert_eq!(saved.gpr(0), before.gpr[0]);
        assert_eq!(saved.gpr(12), before.gpr[12]);
        assert_eq!(saved.gpr(31), before.gpr[31]);
        assert_eq!(saved.special(Special::Cr), u64::from(before.cr.into_bits()));
        assert_eq!(saved.special(Special::Lr), before.lr);
        assert_eq!(saved.special(Special::Ctr), before.ctr);
        assert_eq!(saved.special(Special::Xer), before.xer.into_bits());

        for n in 0..32 {
            assert_eq!(saved.fpr(n), before.vsx.fpr(n), "f{n}");
            assert_eq!(saved.vr(n), before.vsx.vr(n), "v{n}");
        }
        assert_eq!(saved.vsr(40), before.vsx.vsr(40));
        assert_eq!(saved.fpscr(), before.fpscr.into_bits());
        assert_eq!(saved.vscr(), before.vscr.into_bits());
        assert_eq!(saved.vrsave(), before.vrsave.into_bits());
    });
}

#[test]
fn edits_to_the_saved_frame_are_what_resumes() {
    const REDIRECT: u64 = 0x1000_8888;
    let mut stack = vec![FILL; STACK_LEN];
    let mut memory = Memory::new(STACK_BASE, &mut stack);
    let layout = Frame::<Ppc32, GprFpVec>::LAYOUT;

    let before = interrupted(Abi::Ppc32, 0x7680);
    let mut cpu = before.clone();
    take_event(&mut cpu);
    Trampoline::<Ppc32, GprFpVec>::new(IMAGE).run(&mut cpu, &mut memory, |cpu, memory| {
        let frame = memory.slice_mut(cpu.stack_pointer(), layout.size);
        let mut saved = SavedContext::new(layout, frame).unwrap();
        saved.set_special(Special::Lr, REDIRECT);
        saved.set_special(Special::Ctr, 3);
        saved.set_gpr(3, 0xFFFF_FFF2);
        saved.set_vrsave(0x8000_0000);
    });

    assert_eq!(cpu.lr, REDIRECT);
    assert_eq!(cpu.ctr, 3);
    assert_eq!(cpu.gpr[3], 0xFFFF_FFF2);
    assert_eq!(cpu.vrsave, Vrsave::from_bits(0x8000_0000));

    assert_eq!(cpu.gpr[4..], before.gpr[4..]);
    assert_eq!(cpu.cr, before.cr);
    assert_eq!(cpu.xer, before.xer);
    assert_eq!(cpu.vscr, before.vscr);
    assert_eq!(cpu.pc, RESUME_AT);
}

fn vector_frame_slots_decode<T: Target>() {
    let mut stack = vec![FILL; STACK_LEN];
    let mut memory = Memory::new(STACK_BASE, &mut stack);
    let before = interrupted(T::ABI, 0x7700);
    let mut cpu = before.clone();
    take_event(&mut cpu);

    let layout = Frame::<T, GprFpVec>::LAYOUT;
    Trampoline::<T, GprFpVec>::new(IMAGE).run(&mut cpu, &mut memory, |cpu, memory| {
        let mut frame = memory.slice(cpu.stack_pointer(), layout.size).to_vec();
        let saved = SavedContext::new(layout, &mut frame).unwrap();
        for n in 0..32 {
            assert_eq!(saved.vr(n), before.vsx.vr(n), "{}: v{n}", T::ABI);
            assert_eq!(saved.fpr(n), before.vsx.fpr(n), "{}: f{n}", T::ABI);
        }
        assert_eq!(saved.vscr(), before.vscr.into_bits());
        assert_eq!(saved.fpscr(), before.fpscr.into_bits());
        assert_eq!(saved.vrsave(), before.vrsave.into_bits());
    });
}

#[test]
fn vector_frame_slots_decode_on_every_target() {
    vector_frame_slots_decode::<Ppc32>();
    vector_frame_slots_decode::<Ppc64Elfv1>();
    vector_frame_slots_decode::<Ppc64Elfv2>();
}

#[test]
fn addressing_is_the_same_on_every_invocation() {
    let mut stack = vec![FILL; STACK_LEN];
    let mut memory = Memory::new(STACK_BASE, &mut stack);
    let trampoline = Trampoline::<Ppc64Elfv2, Gpr>::new(IMAGE);

    let mut seen = Vec::new();
    let mut cpu = interrupted(Abi::Ppc64Elfv2, 0x7800);
    for foreign_toc in [0, 0x2000_0000, 0xFFFF_FFFF_0000_0000] {
        cpu.gpr[2] = foreign_toc;
        take_event(&mut cpu);
        trampoline.run(&mut cpu, &mut memory, |cpu, _| seen.push(cpu.gpr[2]));
        assert_eq!(cpu.gpr[2], foreign_toc);
    }
    assert_eq!(seen, [IMAGE.toc; 3]);
}

#[test]
fn ppc32_thread_pointer_is_never_repurposed() {
    let mut stack = vec![FILL; STACK_LEN];
    let mut memory = Memory::new(STACK_BASE, &mut stack);
    let mut cpu = interrupted(Abi::Ppc32, 0x7900);
    take_event(&mut cpu);

    Trampoline::<Ppc32, GprFpVsx>::new(IMAGE).run(&mut cpu, &mut memory, |cpu, _| {
        assert_eq!(cpu.thread_key(), ThreadKey::new(0x7900));
    });
    assert_eq!(cpu.gpr[2], 0x7900);
}

#[test]
fn events_are_not_taken_while_the_handler_runs() {
    let mut stack = vec![FILL; STACK_LEN];
    let mut memory = Memory::new(STACK_BASE, &mut stack);
    let mut cpu = interrupted(Abi::Ppc64Elfv2, 0x7A00);
    take_event(&mut cpu);

    let transcript = Trampoline::<Ppc64Elfv2, GprFp>::new(IMAGE).run(&mut cpu, &mut memory, |cpu, _| {
        assert!(!cpu.take_ebb(IMAGE.entry));
    });
    assert_eq!(transcript.as_slice(), &TrampolineState::SEQUENCE);
    assert!(cpu.ebb_enabled);
}

#[test]
fn two_hardware_threads_take_events_concurrently() {
    const EVENTS: usize = 500;

    static REGISTRY: HandlerRegistry<8> = HandlerRegistry::new();
    static COUNTERS: [AtomicUsize; 2] = [AtomicUsize::new(0), AtomicUsize::new(0)];

    let thread_pointer = |id: u64| 0x7fff_8000_0000 + id * 0x1000;
    let salt = |id: u64| 0x40 + u8::try_from(id).unwrap();
    let pattern = move |id: u64| interrupted_with(Abi::Ppc64Elfv2, thread_pointer(id), salt(id));

    let start = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2u64)
        .map(|id| {
            let start = Arc::clone(&start);
            thread::spawn(move || {
                let tp = thread_pointer(id);
                let index = usize::try_from(id).unwrap();
                unsafe {
                    REGISTRY
                        .install(ThreadKey::new(tp), count, context_of(&COUNTERS[index]))
                        .unwrap();
                }

                let mut stack = vec![FILL; STACK_LEN];
                let mut memory = Memory::new(STACK_BASE, &mut stack);
                let before = pattern(id);
                let mut cpu = before.clone();
                let trampoline = Trampoline::<Ppc64Elfv2, GprFpVsx>::new(IMAGE);

                start.wait();
                for seed in 0..EVENTS as u64 {
                    take_event(&mut cpu);
                    trampoline.run(
                        &mut cpu,
                        &mut memory,
                        dispatching(&REGISTRY, Variant::GprFpVsx, seed),
                    );
                    assert_restored(&before, &cpu, Variant::GprFpVsx);
                }
                cpu
            })
        })
        .collect();

    let resumed: Vec<Cpu> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    assert_eq!(COUNTERS[0].load(Ordering::Relaxed), EVENTS);
    assert_eq!(COUNTERS[1].load(Ordering::Relaxed), EVENTS);

    for (id, cpu) in (0..2u64).zip(&resumed) {
        let own = pattern(id);
        let other = pattern(1 - id);
        assert_eq!(cpu.gpr, own.gpr, "thread {id}");
        assert_eq!(cpu.vsx, own.vsx, "thread {id}");
        assert_eq!(cpu.fpscr, own.fpscr, "thread {id}");

        // r1 is the same stack top in both patterns.
        for r in (0..32).filter(|&r| r != 1) {
            assert_ne!(cpu.gpr[r], other.gpr[r], "thread {id}: r{r}");
        }
        for x in 0..64 {
            assert_ne!(cpu.vsx.vsr(x), other.vsx.vsr(x), "thread {id}: vs{x}");
        }
        assert_ne!(cpu.cr, other.cr, "thread {id}");
        assert_ne!(cpu.lr, other.lr, "thread {id}");
        assert_ne!(cpu.ctr, other.ctr, "thread {id}");
        assert_ne!(cpu.xer, other.xer, "thread {id}");
        assert_ne!(cpu.fpscr, other.fpscr, "thread {id}");
        assert_ne!(cpu.vrsave, other.vrsave, "thread {id}");
    }
}
