//! The Writer Handle: an opaque, exclusively-owned resource wrapping the
//! container library (`object::write::Object`) plus the output file.
//!
//! `ContainerWriter` is the narrow interface the driver emits directives
//! through: the driver is generic over it, so tests can substitute a
//! recording fake for the real, `object`-backed `Writer`.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use object::write::{Object, Relocation, SectionId, Symbol, SymbolId, SymbolSection};
use object::{
    Architecture as ObjArchitecture, BinaryFormat, Endianness, RelocationEncoding, RelocationKind,
    SectionKind, SymbolFlags, SymbolKind, SymbolScope,
};

use crate::error::EmitError;
use crate::factory::{Architecture, TargetOs};

/// The narrow interface the driver emits directives through, one call per
/// emission directive. Every method here is infallible: by the time a call
/// reaches the writer, upstream validation (relocation kind, CFI blob
/// length, frame overlap) has already happened.
pub trait ContainerWriter {
    fn switch_section(&mut self, name: &str);
    fn emit_alignment(&mut self, bytes: u32);
    fn emit_blob(&mut self, bytes: &[u8]);
    fn emit_int(&mut self, value: u64, size: u8);
    fn emit_symbol_def(&mut self, name: &str);
    fn emit_symbol_ref(&mut self, name: &str, size: u8, pc_relative: bool, delta: i64);
    fn emit_win_frame_info(&mut self, method: &str, start: u64, end: u64, blob: &[u8]);
    fn emit_cfi_start(&mut self, offset: u64);
    fn emit_cfi_end(&mut self, offset: u64);
    fn emit_cfi_blob(&mut self, offset: u64, record: &[u8; 8]);
    fn emit_debug_file_info(&mut self, names: &[String]);
    fn emit_debug_loc(&mut self, offset: u64, file_id: u32, line: u32, col: u32);
    fn flush_debug_locs(&mut self, method: &str, method_size: u64);
}

enum CfiDirective {
    Start(u64),
    End(u64),
    Blob(u64, [u8; 8]),
}

/// Bytes and metadata accumulated for the node currently between two
/// `switch_section` calls. Committed to the underlying `object::write::Object`
/// the moment the *next* `switch_section` call arrives (including the
/// terminator re-emit at the end of the node itself), which is what makes
/// that redundant call meaningful rather than a no-op.
#[derive(Default)]
struct PendingNode {
    align: u64,
    data: Vec<u8>,
    symbol_defs: Vec<(String, u64)>,
    relocs: Vec<(u64, String, u8, bool, i64)>,
    win_frames: Vec<(u64, u64, Vec<u8>)>,
    cfi_directives: Vec<CfiDirective>,
    debug_locs: Vec<(u64, u32, u32, u32)>,
    debug_method_size: Option<u64>,
}

impl PendingNode {
    fn is_empty(&self) -> bool {
        self.symbol_defs.is_empty()
    }
}

/// The real, `object`-backed Writer Handle.
///
/// Acquired via [`Writer::new`] (which eagerly opens the output file, so a
/// failure there surfaces immediately, exactly like `init_writer` returning
/// null). Released via the consuming [`Writer::finish`] on the success path,
/// or via `Drop` on every other exit path; `Drop` takes the held `File` so a
/// second close can never happen.
pub struct Writer {
    object: Object<'static>,
    out_path: PathBuf,
    file: Option<File>,
    sections: HashMap<String, SectionId>,
    current_section_id: Option<SectionId>,
    symbols: HashMap<String, SymbolId>,
    node: PendingNode,
    unwind_section: Option<SectionId>,
    cfi_section: Option<SectionId>,
    debug_loc_section: Option<SectionId>,
    debug_file_section: Option<SectionId>,
}

impl Writer {
    /// Opens `path` for writing and constructs an empty container for
    /// `target_os`/`architecture`. Mirrors `init_writer`: failure to create
    /// the file is reported as an I/O error referencing `path`.
    pub fn new(path: impl AsRef<Path>, target_os: TargetOs, architecture: Architecture) -> Result<Self, EmitError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| EmitError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let binary_format = match target_os {
            TargetOs::Windows => BinaryFormat::Coff,
            TargetOs::Linux => BinaryFormat::Elf,
            TargetOs::Osx => BinaryFormat::MachO,
        };
        let arch = match architecture {
            Architecture::X86_64 => ObjArchitecture::X86_64,
            Architecture::Aarch64 => ObjArchitecture::Aarch64,
        };
        let mut object = Object::new(binary_format, arch, Endianness::Little);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "a.out".to_string());
        object.add_file_symbol(file_name.into_bytes());

        Ok(Self {
            object,
            out_path: path.to_path_buf(),
            file: Some(file),
            sections: HashMap::new(),
            current_section_id: None,
            symbols: HashMap::new(),
            node: PendingNode::default(),
            unwind_section: None,
            cfi_section: None,
            debug_loc_section: None,
            debug_file_section: None,
        })
    }

    fn section_for(&mut self, name: &str) -> SectionId {
        if let Some(&id) = self.sections.get(name) {
            return id;
        }
        let kind = guess_section_kind(name);
        let id = match standard_section(name) {
            Some(standard) => self.object.section_id(standard),
            None => self
                .object
                .add_section(vec![], name.as_bytes().to_vec(), kind),
        };
        self.sections.insert(name.to_string(), id);
        id
    }

    fn get_or_create_symbol(&mut self, name: &str, kind: SymbolKind) -> SymbolId {
        if let Some(&id) = self.symbols.get(name) {
            return id;
        }
        let id = self.object.add_symbol(Symbol {
            name: name.as_bytes().to_vec(),
            value: 0,
            size: 0,
            kind,
            scope: SymbolScope::Dynamic,
            weak: false,
            section: SymbolSection::Undefined,
            flags: SymbolFlags::None,
        });
        self.symbols.insert(name.to_string(), id);
        id
    }

    /// Commits whatever node is currently pending into the container:
    /// defines the primary and alias symbols, applies relocations, and
    /// writes out any accumulated frame/debug auxiliary records.
    fn commit_pending_node(&mut self) {
        if self.node.is_empty() {
            return;
        }
        let section_id = self
            .current_section_id
            .expect("a node cannot be pending without an active section");
        let node = std::mem::take(&mut self.node);

        let kind = guess_symbol_kind(section_id, &self.object);
        let (primary_name, _) = &node.symbol_defs[0];
        let primary_id = self.get_or_create_symbol(primary_name, kind);
        let align = node.align.max(1);
        let start = self
            .object
            .add_symbol_data(primary_id, section_id, &node.data, align);

        for (name, offset) in node.symbol_defs.iter().skip(1) {
            let id = self.get_or_create_symbol(name, kind);
            let sym = self.object.symbol_mut(id);
            sym.section = SymbolSection::Section(section_id);
            sym.value = start + offset;
            sym.kind = kind;
        }

        for (offset, target, width, pc_relative, delta) in &node.relocs {
            let target_id = self.get_or_create_symbol(target, SymbolKind::Unknown);
            let encoded_kind = if *pc_relative {
                RelocationKind::Relative
            } else {
                RelocationKind::Absolute
            };
            self.object
                .add_relocation(
                    section_id,
                    Relocation {
                        offset: start + offset,
                        size: width * 8,
                        kind: encoded_kind,
                        encoding: RelocationEncoding::Generic,
                        symbol: target_id,
                        addend: *delta,
                    },
                )
                .expect("relocation encoding rejected by the chosen binary format");
        }

        let primary_name = primary_name.clone();
        if !node.win_frames.is_empty() {
            self.append_unwind_records(&primary_name, start, &node.win_frames);
        }
        if !node.cfi_directives.is_empty() {
            self.append_cfi_block(&primary_name, start, &node.cfi_directives);
        }
        if !node.debug_locs.is_empty() {
            self.append_debug_block(
                &primary_name,
                node.debug_method_size.unwrap_or(node.data.len() as u64),
                &node.debug_locs,
            );
        }
    }

    /// Windows unwind records: `[name_len][name][start][end][blob_len][blob]`
    /// per frame, appended to a dedicated auxiliary section. The exact
    /// UNWIND_INFO/.pdata/.xdata cross-referencing a real linker expects is
    /// out of scope here; this preserves the ordering and contents the
    /// container would otherwise be asked to lay out.
    fn append_unwind_records(&mut self, name: &str, node_start: u64, frames: &[(u64, u64, Vec<u8>)]) {
        let section = get_or_create_aux_section(
            &mut self.object,
            &mut self.sections,
            &mut self.unwind_section,
            ".unwind.blocks",
        );
        let mut buf = Vec::new();
        for (start, end, blob) in frames {
            push_str(&mut buf, name);
            buf.extend_from_slice(&(node_start + start).to_le_bytes());
            buf.extend_from_slice(&(node_start + end).to_le_bytes());
            push_bytes(&mut buf, blob);
        }
        self.object.append_section_data(section, &buf, 1);
    }

    /// Unix CFI directive stream: one block per node,
    /// `[name_len][name][count][tag,offset,(blob)]*`.
    fn append_cfi_block(&mut self, name: &str, node_start: u64, directives: &[CfiDirective]) {
        let section = get_or_create_aux_section(
            &mut self.object,
            &mut self.sections,
            &mut self.cfi_section,
            ".cfi.blocks",
        );
        let mut buf = Vec::new();
        push_str(&mut buf, name);
        buf.extend_from_slice(&(directives.len() as u32).to_le_bytes());
        for directive in directives {
            match directive {
                CfiDirective::Start(offset) => {
                    buf.push(0);
                    buf.extend_from_slice(&(node_start + offset).to_le_bytes());
                }
                CfiDirective::End(offset) => {
                    buf.push(1);
                    buf.extend_from_slice(&(node_start + offset).to_le_bytes());
                }
                CfiDirective::Blob(offset, record) => {
                    buf.push(2);
                    buf.extend_from_slice(&(node_start + offset).to_le_bytes());
                    buf.extend_from_slice(record);
                }
            }
        }
        self.object.append_section_data(section, &buf, 1);
    }

    /// Per-node debug-line block:
    /// `[name_len][name][method_size][count][offset,file_id,line,col]*`.
    fn append_debug_block(&mut self, name: &str, method_size: u64, locs: &[(u64, u32, u32, u32)]) {
        let section = get_or_create_aux_section(
            &mut self.object,
            &mut self.sections,
            &mut self.debug_loc_section,
            ".debug.blocks",
        );
        let mut buf = Vec::new();
        push_str(&mut buf, name);
        buf.extend_from_slice(&method_size.to_le_bytes());
        buf.extend_from_slice(&(locs.len() as u32).to_le_bytes());
        for (offset, file_id, line, col) in locs {
            buf.extend_from_slice(&offset.to_le_bytes());
            buf.extend_from_slice(&file_id.to_le_bytes());
            buf.extend_from_slice(&line.to_le_bytes());
            buf.extend_from_slice(&col.to_le_bytes());
        }
        self.object.append_section_data(section, &buf, 1);
    }

    /// Serializes the container and writes it to the file opened at
    /// construction time. Consumes `self`, so a second call is a compile
    /// error, not a runtime double-close.
    pub fn finish(mut self) -> Result<(), EmitError> {
        self.commit_pending_node();

        if self.object.format() == BinaryFormat::Elf {
            self.object
                .add_section(vec![], b".note.GNU-stack".to_vec(), SectionKind::Linker);
        }

        let bytes = self.object.write()?;
        let mut file = self.file.take().expect("finish called more than once");
        file.write_all(&bytes).map_err(|source| EmitError::Io {
            path: self.out_path.clone(),
            source,
        })
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        // Best-effort close on any exit path that didn't reach `finish`
        // (an earlier error, or a panic unwinding through `emit_object`).
        // Partial content on disk is permitted; the caller is expected to
        // delete it. Taking the `File` here means a later `finish` (which
        // cannot happen, since `finish` consumes `self`) could never
        // double-close it either.
        self.file.take();
    }
}

impl ContainerWriter for Writer {
    fn switch_section(&mut self, name: &str) {
        self.commit_pending_node();
        let id = self.section_for(name);
        self.current_section_id = Some(id);
        self.node.align = 1;
    }

    fn emit_alignment(&mut self, bytes: u32) {
        self.node.align = bytes as u64;
    }

    fn emit_blob(&mut self, bytes: &[u8]) {
        self.node.data.extend_from_slice(bytes);
    }

    fn emit_int(&mut self, value: u64, size: u8) {
        let bytes = value.to_le_bytes();
        self.node.data.extend_from_slice(&bytes[..size as usize]);
    }

    fn emit_symbol_def(&mut self, name: &str) {
        self.node
            .symbol_defs
            .push((name.to_string(), self.node.data.len() as u64));
    }

    fn emit_symbol_ref(&mut self, name: &str, size: u8, pc_relative: bool, delta: i64) {
        let offset = self.node.data.len() as u64;
        self.node.data.resize(self.node.data.len() + size as usize, 0);
        self.node
            .relocs
            .push((offset, name.to_string(), size, pc_relative, delta));
    }

    fn emit_win_frame_info(&mut self, _method: &str, start: u64, end: u64, blob: &[u8]) {
        self.node.win_frames.push((start, end, blob.to_vec()));
    }

    fn emit_cfi_start(&mut self, offset: u64) {
        self.node.cfi_directives.push(CfiDirective::Start(offset));
    }

    fn emit_cfi_end(&mut self, offset: u64) {
        self.node.cfi_directives.push(CfiDirective::End(offset));
    }

    fn emit_cfi_blob(&mut self, offset: u64, record: &[u8; 8]) {
        self.node.cfi_directives.push(CfiDirective::Blob(offset, *record));
    }

    fn emit_debug_file_info(&mut self, names: &[String]) {
        let section = get_or_create_aux_section(
            &mut self.object,
            &mut self.sections,
            &mut self.debug_file_section,
            ".debug.files",
        );
        let mut buf = Vec::new();
        buf.extend_from_slice(&(names.len() as u32).to_le_bytes());
        for name in names {
            push_str(&mut buf, name);
        }
        self.object.append_section_data(section, &buf, 1);
    }

    fn emit_debug_loc(&mut self, offset: u64, file_id: u32, line: u32, col: u32) {
        self.node.debug_locs.push((offset, file_id, line, col));
    }

    fn flush_debug_locs(&mut self, _method: &str, method_size: u64) {
        self.node.debug_method_size = Some(method_size);
    }
}

fn push_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn push_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn standard_section(name: &str) -> Option<object::write::StandardSection> {
    use object::write::StandardSection;
    match name {
        "text" | ".text" => Some(StandardSection::Text),
        "data" | ".data" => Some(StandardSection::Data),
        "rodata" | ".rodata" | ".rdata" => Some(StandardSection::ReadOnlyData),
        "bss" | ".bss" => Some(StandardSection::UninitializedData),
        "tls" | ".tdata" => Some(StandardSection::Tls),
        _ => None,
    }
}

fn guess_section_kind(name: &str) -> SectionKind {
    if name.contains("text") {
        SectionKind::Text
    } else if name.contains("bss") {
        SectionKind::UninitializedData
    } else {
        SectionKind::Data
    }
}

fn guess_symbol_kind(section: SectionId, object: &Object<'static>) -> SymbolKind {
    match object.section(section).kind() {
        SectionKind::Text => SymbolKind::Text,
        _ => SymbolKind::Data,
    }
}

/// Looks up (creating on first use) one of the auxiliary sections used to
/// carry unwind/CFI/debug records. A free function, not a method: it
/// takes the three disjoint fields it needs (`object`, `sections`, `cached`)
/// as separate borrows so the caller can pass `&mut self.foo` for each
/// without the borrow checker seeing a conflicting `&mut self`.
fn get_or_create_aux_section(
    object: &mut Object<'static>,
    sections: &mut HashMap<String, SectionId>,
    cached: &mut Option<SectionId>,
    name: &'static str,
) -> SectionId {
    if let Some(id) = *cached {
        return id;
    }
    let kind = if name.starts_with(".debug") {
        SectionKind::Debug
    } else {
        SectionKind::Data
    };
    let id = *sections
        .entry(name.to_string())
        .or_insert_with(|| object.add_section(vec![], name.as_bytes().to_vec(), kind));
    *cached = Some(id);
    id
}
