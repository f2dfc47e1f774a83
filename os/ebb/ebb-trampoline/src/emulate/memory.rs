use core::ops::Range;

/// A window of emulated address space backed by a byte slice.
#[derive(Debug)]
pub struct Memory<'a> {
    base: u64,
    bytes: &'a mut [u8],
}

impl<'a> Memory<'a> {
    /// `bytes[0]` is at address `base`.
    #[must_use]
    pub fn new(base: u64, bytes: &'a mut [u8]) -> Self {
        Self { base, bytes }
    }

    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// One past the last mapped address.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base + self.bytes.len() as u64
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.bytes
    }

    /// # Panics
    /// Panics if any byte of the access is unmapped.
    #[must_use]
    pub fn slice(&self, address: u64, len: usize) -> &[u8] {
        let range = self.range(address, len);
        &self.bytes[range]
    }

    /// # Panics
    /// Panics if any byte of the access is unmapped.
    pub fn slice_mut(&mut self, address: u64, len: usize) -> &mut [u8] {
        let range = self.range(address, len);
        &mut self.bytes[range]
    }

    fn range(&self, address: u64, len: usize) -> Range<usize> {
        let start = address
            .checked_sub(self.base)
            .and_then(|offset| usize::try_from(offset).ok())
            .filter(|start| start.checked_add(len).is_some_and(|end| end <= self.bytes.len()));
        match start {
            Some(start) => start..start + len,
            None => panic!("{len}-byte access at {address:#x} outside emulated memory"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn addresses_are_relative_to_base() {
        let mut bytes = [0u8; 32];
        let mut memory = Memory::new(0x100, &mut bytes);
        memory.slice_mut(0x110, 4).copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(memory.slice(0x112, 2), &[3, 4]);
        assert_eq!(memory.end(), 0x120);
        assert_eq!(bytes[16..20], [1, 2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "outside emulated memory")]
    fn access_past_the_end_faults() {
        let mut bytes = [0u8; 32];
        let memory = Memory::new(0x100, &mut bytes);
        let _ = memory.slice(0x11C, 8);
    }

    #[test]
    #[should_panic(expected = "outside emulated memory")]
    fn access_below_base_faults() {
        let mut bytes = [0u8; 32];
        let memory = Memory::new(0x100, &mut bytes);
        let _ = memory.slice(0xF8, 4);
    }
}
