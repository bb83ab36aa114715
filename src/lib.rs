//! Emits the output of an ahead-of-time compiler's dependency-graph walk —
//! an ordered sequence of [`ObjectNode`]s — to a native linkable object file
//! (COFF, ELF or Mach-O, chosen by the [`Factory`]'s [`TargetOs`]).
//!
//! The byte-level container encoding is delegated to the [`object`] crate;
//! this crate owns the per-node interleaving of data, symbol definitions,
//! relocation references, frame/unwind directives and debug-line records,
//! plus the platform-specific unwind strategy and symbol-name mangling.
//!
//! ```no_run
//! use aotobj::{emit_object, Architecture, DefinedSymbol, Factory, ObjectNode, TargetOs};
//!
//! struct MyFactory;
//! impl Factory for MyFactory {
//!     fn target_os(&self) -> TargetOs { TargetOs::Linux }
//!     fn architecture(&self) -> Architecture { Architecture::X86_64 }
//!     fn alternate_name(&self, _symbol: &str) -> Option<String> { None }
//! }
//!
//! struct MyNode {
//!     data: Vec<u8>,
//!     symbols: Vec<DefinedSymbol>,
//! }
//! impl ObjectNode for MyNode {
//!     fn name(&self) -> &str { &self.symbols[0].name }
//!     fn section(&self) -> &str { "text" }
//!     fn alignment(&self) -> u32 { 16 }
//!     fn get_data(&self, _factory: &dyn aotobj::Factory) -> Vec<u8> { self.data.clone() }
//!     fn defined_symbols(&self) -> &[DefinedSymbol] { &self.symbols }
//!     fn relocations(&self) -> &[aotobj::Relocation] { &[] }
//! }
//!
//! let node: Box<dyn ObjectNode> = Box::new(MyNode {
//!     data: vec![0x90, 0xc3],
//!     symbols: vec![DefinedSymbol { name: "hello".into(), offset: 0 }],
//! });
//! emit_object("out.o", &[node], &MyFactory).unwrap();
//! ```

mod debugline;
mod driver;
mod error;
mod factory;
mod frame;
mod node;
mod reloc;
mod symbol;
mod writer;

use std::path::Path;

pub use error::EmitError;
pub use factory::{Architecture, Factory, TargetOs};
pub use node::{DebugLocInfo, DefinedSymbol, FrameInfo, ObjectNode, Relocation, RelocationKind};
pub use writer::ContainerWriter;

/// Produces the object file at `path` from `nodes`, in order, under `factory`'s
/// target/naming policy. See the module-level docs for the full protocol.
pub fn emit_object(
    path: impl AsRef<Path>,
    nodes: &[Box<dyn ObjectNode>],
    factory: &dyn Factory,
) -> Result<(), EmitError> {
    let mut handle = writer::Writer::new(path, factory.target_os(), factory.architecture())?;
    driver::emit_nodes(&mut handle, nodes, factory)?;
    handle.finish()
}
