//! Error types produced while emitting an object file.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while turning a sequence of [`crate::ObjectNode`]s
/// into a native object file.
///
/// Every variant except [`EmitError::Io`] represents a programmer error somewhere
/// upstream (a broken code generator or a broken dependency-graph walk): none of
/// them are retried or recovered from inside the emitter.
#[derive(Debug, Error)]
pub enum EmitError {
    /// The output object file could not be created at `path`.
    #[error("failed to open output object file at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A relocation carried a kind this emitter has no width/pc-relative entry for.
    #[error("unsupported relocation kind {0:#x}; only ABS64 and REL32 are implemented")]
    UnsupportedRelocation(u16),

    /// A node's CFI blob length was not a multiple of the 8-byte record size.
    #[error("malformed CFI blob for node {node:?}: length {len} is not a multiple of 8")]
    MalformedCfiBlob { node: String, len: usize },

    /// Two `FrameInfo`s for the same node had overlapping `[start, end)` ranges.
    #[error("frame overlap in node {node:?} at offset {offset}")]
    FrameOverlap { node: String, offset: u64 },

    /// The same canonical node name was defined twice in one `emit_object` call.
    ///
    /// Only checked in debug builds; see the concurrency/resource model notes.
    #[error("duplicate node name {0:?} within the same object file")]
    DuplicateNode(String),

    /// The underlying container rejected an operation (e.g. a relocation the
    /// chosen binary format cannot encode).
    #[error("container error: {0}")]
    Container(#[from] object::write::Error),
}
