//! 64-bit entry points (ELFv1 and ELFv2). `r1` and the thread pointer `r13`
//! are never written; the frame starts below the 288-byte red zone.

use core::arch::naked_asm;
use ebb_frame::{Frame, FrameLayout, Gpr, GprFp, GprFpVec, GprFpVsx, Native, Special};

use crate::dispatch::__ebb_dispatch;

const GPR: FrameLayout = Frame::<Native, Gpr>::LAYOUT;
const GPR_FP: FrameLayout = Frame::<Native, GprFp>::LAYOUT;
const GPR_FP_VEC: FrameLayout = Frame::<Native, GprFpVec>::LAYOUT;
const GPR_FP_VSX: FrameLayout = Frame::<Native, GprFpVsx>::LAYOUT;

macro_rules! save_gprs {
    () => {
        concat!(
            ".irp r, 0,2,3,4,5,6,7,8,9,10,11,12,14,15,16,17,18,19,20,21,22,23,24,25,26,27,28,29,30,31\n",
            "std \\r, {gpr}+8*\\r(1)\n",
            ".endr\n",
        )
    };
}

macro_rules! restore_gprs {
    () => {
        concat!(
            ".irp r, 0,2,3,4,5,6,7,8,9,10,11,12,14,15,16,17,18,19,20,21,22,23,24,25,26,27,28,29,30,31\n",
            "ld \\r, {gpr}+8*\\r(1)\n",
            ".endr\n",
        )
    };
}

macro_rules! save_specials {
    () => {
        concat!(
            "mfcr 0\n",
            "std 0, {cr}(1)\n",
            "mflr 0\n",
            "std 0, {lr}(1)\n",
            "mfctr 0\n",
            "std 0, {ctr}(1)\n",
            "mfxer 0\n",
            "std 0, {xer}(1)\n",
        )
    };
}

macro_rules! restore_specials {
    () => {
        concat!(
            "ld 0, {cr}(1)\n",
            "mtcrf 0xff, 0\n",
            "ld 0, {lr}(1)\n",
            "mtlr 0\n",
            "ld 0, {ctr}(1)\n",
            "mtctr 0\n",
            "ld 0, {xer}(1)\n",
            "mtxer 0\n",
        )
    };
}

// r2 := this module's TOC, then call. The `nop` is the slot the linker may
// turn into a TOC reload, which lands in the frame header.
macro_rules! call_dispatch {
    () => {
        concat!(
            "bcl 20, 31, 2f\n",
            "2: mflr 2\n",
            "addis 2, 2, (.TOC. - 2b)@ha\n",
            "addi 2, 2, (.TOC. - 2b)@l\n",
            "bl {dispatch}\n",
            "nop\n",
        )
    };
}

/// Saves the GPRs and CR/LR/CTR/XER only.
///
/// # Safety
/// Only to be entered through an event-based branch.
#[unsafe(naked)]
pub unsafe extern "C" fn ebb_entry_gpr() -> ! {
    naked_asm!(
        // EBB entry invariants:
        //   r1    = interrupted stack pointer, 288-byte red zone below it is live
        //   r13   = thread pointer, the key of the handler registration
        //   EBBRR = resume address, BESCR[GE] = 0 until rfebb
        //   every other register is live state of the interrupted code

        // Reserve the frame; the update form also writes the back chain.
        "stdu 1, -{frame}(1)",

        // GPRs first; r0 and r12 are free scratch from here on.
        save_gprs!(),
        save_specials!(),

        // r2 := TOC, then resolve and run the handler.
        call_dispatch!(),

        // Mirror image of the save, GPRs last so r0 is reloaded at the end.
        restore_specials!(),
        restore_gprs!(),

        // Release the frame and resume at EBBRR with events enabled again.
        "addi 1, 1, {frame}",
        "rfebb 1",
        frame = const GPR.size,
        gpr = const GPR.gpr.offset,
        cr = const GPR.special_slot(Special::Cr),
        lr = const GPR.special_slot(Special::Lr),
        ctr = const GPR.special_slot(Special::Ctr),
        xer = const GPR.special_slot(Special::Xer),
        dispatch = sym __ebb_dispatch,
    )
}

/// Additionally saves the FPRs and FPSCR.
///
/// # Safety
/// Only to be entered through an event-based branch.
#[unsafe(naked)]
pub unsafe extern "C" fn ebb_entry_gpr_fp() -> ! {
    naked_asm!(
        // Reserve the frame.
        "stdu 1, -{frame}(1)",

        // Integer state.
        save_gprs!(),
        save_specials!(),

        // Register banks, then their control registers through f0/v0.
        save_fprs!(),

        // r2 := TOC, then resolve and run the handler.
        call_dispatch!(),

        // Control registers before the banks that carried them, GPRs last.
        restore_fprs!(),
        restore_specials!(),
        restore_gprs!(),

        // Release the frame and resume at EBBRR with events enabled again.
        "addi 1, 1, {frame}",
        "rfebb 1",
        frame = const GPR_FP.size,
        gpr = const GPR_FP.gpr.offset,
        cr = const GPR_FP.special_slot(Special::Cr),
        lr = const GPR_FP.special_slot(Special::Lr),
        ctr = const GPR_FP.special_slot(Special::Ctr),
        xer = const GPR_FP.special_slot(Special::Xer),
        fpr = const GPR_FP.fpr.offset,
        fpscr = const GPR_FP.fpscr.offset,
        dispatch = sym __ebb_dispatch,
    )
}

/// Additionally saves the FPRs, FPSCR, VRs, VSCR and VRSAVE.
///
/// # Safety
/// Only to be entered through an event-based branch.
#[unsafe(naked)]
pub unsafe extern "C" fn ebb_entry_gpr_fp_vec() -> ! {
    naked_asm!(
        // Reserve the frame.
        "stdu 1, -{frame}(1)",

        // Integer state.
        save_gprs!(),
        save_specials!(),

        // Register banks, then their control registers through f0/v0.
        save_fprs!(),
        save_vrs!(),
        save_vscr_vrsave!(),

        // r2 := TOC, then resolve and run the handler.
        call_dispatch!(),

        // Control registers before the banks that carried them, GPRs last.
        restore_fprs!(),
        restore_vscr!(),
        restore_vrs!(),
        restore_vrsave!(),
        restore_specials!(),
        restore_gprs!(),

        // Release the frame and resume at EBBRR with events enabled again.
        "addi 1, 1, {frame}",
        "rfebb 1",
        frame = const GPR_FP_VEC.size,
        gpr = const GPR_FP_VEC.gpr.offset,
        cr = const GPR_FP_VEC.special_slot(Special::Cr),
        lr = const GPR_FP_VEC.special_slot(Special::Lr),
        ctr = const GPR_FP_VEC.special_slot(Special::Ctr),
        xer = const GPR_FP_VEC.special_slot(Special::Xer),
        fpr = const GPR_FP_VEC.fpr.offset,
        fpscr = const GPR_FP_VEC.fpscr.offset,
        vr = const GPR_FP_VEC.vr.offset,
        vscr = const GPR_FP_VEC.vscr.offset,
        vrsave = const GPR_FP_VEC.vrsave.offset,
        dispatch = sym __ebb_dispatch,
    )
}

/// Saves all 64 VSRs, which covers the FPRs and VRs, plus FPSCR, VSCR and
/// VRSAVE.
///
/// # Safety
/// Only to be entered through an event-based branch.
#[unsafe(naked)]
pub unsafe extern "C" fn ebb_entry_gpr_fp_vsx() -> ! {
    naked_asm!(
        // Reserve the frame.
        "stdu 1, -{frame}(1)",

        // Integer state.
        save_gprs!(),
        save_specials!(),

        // Register banks, then their control registers through f0/v0.
        save_vsrs!(),
        save_fpscr!(),
        save_vscr_vrsave!(),

        // r2 := TOC, then resolve and run the handler.
        call_dispatch!(),

        // Control registers before the banks that carried them, GPRs last.
        restore_vscr!(),
        restore_fpscr!(),
        restore_vsrs!(),
        restore_vrsave!(),
        restore_specials!(),
        restore_gprs!(),

        // Release the frame and resume at EBBRR with events enabled again.
        "addi 1, 1, {frame}",
        "rfebb 1",
        frame = const GPR_FP_VSX.size,
        gpr = const GPR_FP_VSX.gpr.offset,
        cr = const GPR_FP_VSX.special_slot(Special::Cr),
        lr = const GPR_FP_VSX.special_slot(Special::Lr),
        ctr = const GPR_FP_VSX.special_slot(Special::Ctr),
        xer = const GPR_FP_VSX.special_slot(Special::Xer),
        fpscr = const GPR_FP_VSX.fpscr.offset,
        vsr = const GPR_FP_VSX.vsr.offset,
        vscr = const GPR_FP_VSX.vscr.offset,
        vrsave = const GPR_FP_VSX.vrsave.offset,
        dispatch = sym __ebb_dispatch,
    )
}
