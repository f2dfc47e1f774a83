//! Byte images the trampoline's load/store instructions produce in a frame.
//!
//! Register values are kept in architectural order: a 128-bit register is a
//! `[u8; 16]` whose byte 0 is the most significant byte (element 0 in the
//! ISA's big-endian numbering). What lands in memory then depends on the
//! instruction and the byte order of the configuration:
//!
//! | Instruction | Big-endian | Little-endian |
//! |-------------|------------|---------------|
//! | `stw`/`std`/`stfd` | MSB first | LSB first |
//! | `stvx` | register bytes as is | all 16 bytes reversed |
//! | `stxvd2x` | register bytes as is | each doubleword reversed in place |
//!
//! Both quad-word mappings are their own inverse, so the same function turns
//! a memory image back into a register value.

use crate::target::Abi;

/// `std`/`stw` of a GPR-sized value; 32-bit targets store the low word.
///
/// # Panics
/// Panics if `slot` is shorter than a word.
#[allow(clippy::cast_possible_truncation)]
pub fn write_word(slot: &mut [u8], abi: Abi, value: u64) {
    match (abi.word_size(), abi.is_big_endian()) {
        (4, true) => slot[..4].copy_from_slice(&(value as u32).to_be_bytes()),
        (4, false) => slot[..4].copy_from_slice(&(value as u32).to_le_bytes()),
        (_, true) => slot[..8].copy_from_slice(&value.to_be_bytes()),
        (_, false) => slot[..8].copy_from_slice(&value.to_le_bytes()),
    }
}

/// `ld`/`lwz` of a GPR-sized value, zero-extended.
///
/// # Panics
/// Panics if `slot` is shorter than a word.
#[must_use]
pub fn read_word(slot: &[u8], abi: Abi) -> u64 {
    if abi.word_size() == 4 {
        u64::from(read_u32(slot, abi))
    } else {
        read_doubleword(slot, abi)
    }
}

/// `stw` of a 32-bit value.
///
/// # Panics
/// Panics if `slot` is shorter than four bytes.
pub fn write_u32(slot: &mut [u8], abi: Abi, value: u32) {
    let bytes = if abi.is_big_endian() {
        value.to_be_bytes()
    } else {
        value.to_le_bytes()
    };
    slot[..4].copy_from_slice(&bytes);
}

/// `lwz` of a 32-bit value.
///
/// # Panics
/// Panics if `slot` is shorter than four bytes.
#[must_use]
pub fn read_u32(slot: &[u8], abi: Abi) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&slot[..4]);
    if abi.is_big_endian() {
        u32::from_be_bytes(bytes)
    } else {
        u32::from_le_bytes(bytes)
    }
}

/// `std`/`stfd` of a doubleword.
///
/// # Panics
/// Panics if `slot` is shorter than eight bytes.
pub fn write_doubleword(slot: &mut [u8], abi: Abi, value: u64) {
    let bytes = if abi.is_big_endian() {
        value.to_be_bytes()
    } else {
        value.to_le_bytes()
    };
    slot[..8].copy_from_slice(&bytes);
}

/// `ld`/`lfd` of a doubleword.
///
/// # Panics
/// Panics if `slot` is shorter than eight bytes.
#[must_use]
pub fn read_doubleword(slot: &[u8], abi: Abi) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&slot[..8]);
    if abi.is_big_endian() {
        u64::from_be_bytes(bytes)
    } else {
        u64::from_le_bytes(bytes)
    }
}

/// Memory image of `stvx` (and register value of `lvx`).
#[must_use]
pub fn vmx_image(quad: [u8; 16], abi: Abi) -> [u8; 16] {
    let mut image = quad;
    if !abi.is_big_endian() {
        image.reverse();
    }
    image
}

/// Memory image of `stxvd2x` (and register value of `lxvd2x`).
#[must_use]
pub fn vsx_image(quad: [u8; 16], abi: Abi) -> [u8; 16] {
    let mut image = quad;
    if !abi.is_big_endian() {
        image[..8].reverse();
        image[8..].reverse();
    }
    image
}
