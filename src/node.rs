//! The input data model: one `ObjectNode` per unit of compiled output
//! (typically one method or one data blob) from the dependency-graph walk.

use crate::factory::Factory;

/// A relocation the linker (or this emitter, for intra-object references)
/// must resolve.
///
/// `kind` is deliberately not exhaustive of every relocation kind a code
/// generator might ever produce: `Other` exists so that a kind this emitter
/// does not implement can still be represented and rejected with
/// [`crate::EmitError::UnsupportedRelocation`] instead of being impossible to
/// construct in the first place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationKind {
    /// 8-byte absolute address.
    Abs64,
    /// 4-byte PC-relative address.
    Rel32,
    /// Any relocation kind not mapped to a width/pc-relative entry yet.
    /// The `u16` is an opaque kind code carried through for the error message.
    Other(u16),
}

/// One relocation slot within a node's data.
#[derive(Debug, Clone)]
pub struct Relocation {
    /// Byte offset where the relocation slot begins. `0 <= offset < data.len()`.
    pub offset: u64,
    pub kind: RelocationKind,
    /// Name of the symbol this relocation references.
    pub target_symbol: String,
    /// Signed addend carried alongside the relocation (not embedded in the
    /// data bytes; the slot itself is reserved as zero-filled placeholder
    /// bytes of the appropriate width).
    pub delta: i64,
}

/// A symbol defined at a byte offset within a node's data.
///
/// `0 <= offset <= data.len()`; offset `data.len()` (one past the last byte)
/// is legal and common for function-end labels.
#[derive(Debug, Clone)]
pub struct DefinedSymbol {
    pub name: String,
    pub offset: u64,
}

/// Unwind/frame information for a contiguous `[start_offset, end_offset)`
/// sub-range of a node's data.
///
/// On Windows `blob` is an opaque UNWIND_INFO record, emitted whole with no
/// relationship to the byte cursor. On Unix `blob` is a concatenation of
/// fixed-size (8 byte) CFI records; the first byte of each record is the
/// in-frame offset (relative to `start_offset`) at which the directive
/// applies.
#[derive(Debug, Clone)]
pub struct FrameInfo {
    pub start_offset: u64,
    pub end_offset: u64,
    pub blob: Vec<u8>,
}

/// One source-line mapping for a byte offset within a node's data.
#[derive(Debug, Clone)]
pub struct DebugLocInfo {
    pub native_offset: u64,
    pub file_name: String,
    pub line_number: u32,
    pub col_number: u32,
}

/// One unit of output from the dependency-graph walk.
///
/// Capability-wise every node carries data/symbols/relocations; frame info
/// and debug-line info are optional and default to empty slices rather than
/// requiring every node type to opt in with `Option<Vec<_>>` plumbing.
pub trait ObjectNode {
    /// The node's canonical name, equal to `defined_symbols()[0].name`.
    fn name(&self) -> &str;

    /// If true, the driver skips this node entirely: no section switch, no
    /// alignment, no maps are built for it.
    fn should_skip(&self) -> bool {
        false
    }

    /// The section this node's bytes belong in (e.g. `"text"`, `"data"`).
    fn section(&self) -> &str;

    /// Byte alignment required for this node's data; a power of two.
    fn alignment(&self) -> u32;

    /// The node's raw bytes. Takes the `Factory` because some code
    /// generators defer target-dependent byte production until emission
    /// time (e.g. pointer-width-dependent constant pools).
    fn get_data(&self, factory: &dyn Factory) -> Vec<u8>;

    /// Symbols defined within this node's data, in emission order.
    /// Invariant: `defined_symbols()[0].offset == 0`.
    fn defined_symbols(&self) -> &[DefinedSymbol];

    /// Relocations within this node's data, sorted strictly ascending by offset.
    fn relocations(&self) -> &[Relocation];

    /// Unwind/frame information for this node, if any. Empty by default.
    fn frame_infos(&self) -> &[FrameInfo] {
        &[]
    }

    /// Debug-line mappings for this node, if any. Empty by default.
    fn debug_locs(&self) -> &[DebugLocInfo] {
        &[]
    }
}
