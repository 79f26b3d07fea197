//! Loaded code image and relocation metadata.
//!
//! The front-end loads the executable and hands the analysis an immutable
//! view of it: the raw bytes, the originating format, the relocation table
//! and the initial machine state. Nothing here is mutated for the duration
//! of a run.

use crate::machine::MachineState;

/// Originating executable format. Affects segment-base handling when
/// resolving constants into image offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// Flat `.COM` image, loaded at offset 0x100 of its segment.
    Com,
    /// `.EXE` image with a relocation table.
    Exe,
}

/// Immutable code image under analysis.
#[derive(Debug, Clone)]
pub struct Image {
    bytes: Vec<u8>,
    kind: ImageKind,
    relocs: Vec<u32>,
    state: MachineState,
}

impl Image {
    /// Wrap a loaded image. `relocs` holds the byte offsets at which a
    /// stored word is a segment fix-up; `state` is the initial register
    /// snapshot the loader derived from the header.
    pub fn new(bytes: Vec<u8>, kind: ImageKind, relocs: Vec<u32>, state: MachineState) -> Self {
        Self {
            bytes,
            kind,
            relocs,
            state,
        }
    }

    /// Image length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the image holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Originating format.
    pub const fn kind(&self) -> ImageKind {
        self.kind
    }

    /// Initial register snapshot.
    pub const fn state(&self) -> &MachineState {
        &self.state
    }

    /// Byte at `off`, if inside the image.
    pub fn byte(&self, off: usize) -> Option<u8> {
        self.bytes.get(off).copied()
    }

    /// Little-endian word at `off`, if both bytes are inside the image.
    pub fn word(&self, off: usize) -> Option<u16> {
        let lo = self.byte(off)?;
        let hi = self.byte(off.checked_add(1)?)?;
        Some(u16::from_le_bytes([lo, hi]))
    }

    /// True if the word stored at `off` is a relocated segment value.
    pub fn is_reloc(&self, off: u32) -> bool {
        self.relocs.contains(&off)
    }
}

/// A datum in the front-end's symbol table: a labelled byte range of the
/// image referenced by some instruction operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSym {
    /// Image offset of the datum.
    pub label: u32,
    /// Size of the datum in bytes.
    pub size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(bytes: &[u8], relocs: &[u32]) -> Image {
        Image::new(bytes.to_vec(), ImageKind::Exe, relocs.to_vec(), MachineState::new())
    }

    #[test]
    fn word_reads_little_endian() {
        let img = image(&[0x34, 0x12, 0xff], &[]);
        assert_eq!(img.word(0), Some(0x1234));
        assert_eq!(img.word(2), None);
    }

    #[test]
    fn reloc_lookup_is_by_offset() {
        let img = image(&[0; 8], &[4]);
        assert!(img.is_reloc(4));
        assert!(!img.is_reloc(5));
    }
}
