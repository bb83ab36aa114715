//! Linear walk of a node's relocation array, synchronized against the byte
//! index.

use crate::error::EmitError;
use crate::node::{Relocation, RelocationKind};

/// Translates a relocation kind into `(width_in_bytes, pc_relative)`.
///
/// The fixed table intentionally covers only the two kinds this emitter
/// implements; any other kind is a fatal, explicit error rather than a
/// silent guess.
pub fn width_and_pc_relative(kind: RelocationKind) -> Result<(u8, bool), EmitError> {
    match kind {
        RelocationKind::Abs64 => Ok((8, false)),
        RelocationKind::Rel32 => Ok((4, true)),
        RelocationKind::Other(code) => Err(EmitError::UnsupportedRelocation(code)),
    }
}

/// Walks a node's (already offset-sorted) relocation array in lockstep with
/// the driver's byte cursor.
pub struct RelocationCursor<'a> {
    relocs: &'a [Relocation],
    idx: usize,
}

impl<'a> RelocationCursor<'a> {
    pub fn new(relocs: &'a [Relocation]) -> Self {
        Self { relocs, idx: 0 }
    }

    /// The relocation at exactly `offset`, if the cursor is currently
    /// pointing at one there.
    pub fn at(&self, offset: u64) -> Option<&'a Relocation> {
        self.relocs
            .get(self.idx)
            .filter(|reloc| reloc.offset == offset)
    }

    /// Advances past the relocation just consumed by `at`.
    pub fn advance(&mut self) {
        self.idx += 1;
    }
}
