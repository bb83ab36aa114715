//! End-to-end tests driving the public `emit_object` entry point and parsing
//! the result back with `object::read` to confirm the container actually
//! holds what was asked for.

use std::collections::HashMap;

use aotobj::{
    Architecture, DebugLocInfo, DefinedSymbol, EmitError, Factory, FrameInfo, ObjectNode,
    Relocation, RelocationKind, TargetOs,
};
use object::read::{Object as _, ObjectSection as _, ObjectSymbol as _};

struct SimpleFactory {
    os: TargetOs,
    alternates: HashMap<String, String>,
}

impl SimpleFactory {
    fn new(os: TargetOs) -> Self {
        Self {
            os,
            alternates: HashMap::new(),
        }
    }
}

impl Factory for SimpleFactory {
    fn target_os(&self) -> TargetOs {
        self.os
    }

    fn architecture(&self) -> Architecture {
        Architecture::X86_64
    }

    fn alternate_name(&self, symbol: &str) -> Option<String> {
        self.alternates.get(symbol).cloned()
    }
}

struct FuncNode {
    name: String,
    section: String,
    data: Vec<u8>,
    symbols: Vec<DefinedSymbol>,
    relocs: Vec<Relocation>,
    frames: Vec<FrameInfo>,
    debug_locs: Vec<DebugLocInfo>,
}

impl FuncNode {
    fn new(name: &str, data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            section: "text".to_string(),
            symbols: vec![DefinedSymbol {
                name: name.to_string(),
                offset: 0,
            }],
            data,
            relocs: vec![],
            frames: vec![],
            debug_locs: vec![],
        }
    }
}

impl ObjectNode for FuncNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn section(&self) -> &str {
        &self.section
    }

    fn alignment(&self) -> u32 {
        16
    }

    fn get_data(&self, _factory: &dyn Factory) -> Vec<u8> {
        self.data.clone()
    }

    fn defined_symbols(&self) -> &[DefinedSymbol] {
        &self.symbols
    }

    fn relocations(&self) -> &[Relocation] {
        &self.relocs
    }

    fn frame_infos(&self) -> &[FrameInfo] {
        &self.frames
    }

    fn debug_locs(&self) -> &[DebugLocInfo] {
        &self.debug_locs
    }
}

fn node(n: FuncNode) -> Box<dyn ObjectNode> {
    Box::new(n)
}

#[test]
fn empty_node_gets_a_single_defined_symbol() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.o");
    let factory = SimpleFactory::new(TargetOs::Osx);

    let nodes = vec![node(FuncNode::new("empty_fn", vec![]))];
    aotobj::emit_object(&path, &nodes, &factory).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let obj = object::read::File::parse(&*bytes).unwrap();
    assert_eq!(obj.format(), object::BinaryFormat::MachO);

    // OSX mangling prefixes a leading underscore.
    assert!(obj.symbol_by_name("_empty_fn").is_some());
}

#[test]
fn single_rel32_relocation_reserves_a_four_byte_slot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rel32.o");
    let factory = SimpleFactory::new(TargetOs::Linux);

    // nop; call rel32 placeholder; ret
    let mut f = FuncNode::new("caller", vec![0x90, 0, 0, 0, 0, 0xc3]);
    f.relocs.push(Relocation {
        offset: 1,
        kind: RelocationKind::Rel32,
        target_symbol: "callee".to_string(),
        delta: -4,
    });
    let nodes = vec![node(f)];
    aotobj::emit_object(&path, &nodes, &factory).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let obj = object::read::File::parse(&*bytes).unwrap();
    assert_eq!(obj.format(), object::BinaryFormat::Elf);

    let text = obj.section_by_name("text").or_else(|| obj.section_by_name(".text")).unwrap();
    let relocations: Vec<_> = text.relocations().collect();
    assert_eq!(relocations.len(), 1);
    assert_eq!(relocations[0].0, 1);
}

#[test]
fn abs64_relocation_reserves_an_eight_byte_slot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("abs64.o");
    let factory = SimpleFactory::new(TargetOs::Linux);

    let mut f = FuncNode::new("has_ptr", vec![0; 16]);
    f.relocs.push(Relocation {
        offset: 8,
        kind: RelocationKind::Abs64,
        target_symbol: "some_global".to_string(),
        delta: 0,
    });
    let nodes = vec![node(f)];
    aotobj::emit_object(&path, &nodes, &factory).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let obj = object::read::File::parse(&*bytes).unwrap();
    let text = obj.section_by_name("text").or_else(|| obj.section_by_name(".text")).unwrap();
    let relocations: Vec<_> = text.relocations().collect();
    assert_eq!(relocations.len(), 1);
    assert_eq!(relocations[0].1.size(), 64);
}

#[test]
fn alternate_name_aliases_the_primary_symbol() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alias.o");
    let mut factory = SimpleFactory::new(TargetOs::Linux);
    factory
        .alternates
        .insert("real_name".to_string(), "real_name$variant".to_string());

    let nodes = vec![node(FuncNode::new("real_name", vec![0xc3]))];
    aotobj::emit_object(&path, &nodes, &factory).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let obj = object::read::File::parse(&*bytes).unwrap();
    assert!(obj.symbol_by_name("real_name").is_some());
    assert!(obj.symbol_by_name("real_name$variant").is_some());
}

#[test]
fn debug_info_is_suppressed_outside_windows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nodebug.o");
    let factory = SimpleFactory::new(TargetOs::Linux);

    let mut f = FuncNode::new("traced", vec![0x90, 0xc3]);
    f.debug_locs.push(DebugLocInfo {
        native_offset: 0,
        file_name: "src/lib.rs".to_string(),
        line_number: 10,
        col_number: 1,
    });
    let nodes = vec![node(f)];
    aotobj::emit_object(&path, &nodes, &factory).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let obj = object::read::File::parse(&*bytes).unwrap();
    assert!(obj.section_by_name(".debug.blocks").is_none());
    assert!(obj.section_by_name(".debug.files").is_none());
}

#[test]
fn unsupported_relocation_kind_is_a_fatal_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad_reloc.o");
    let factory = SimpleFactory::new(TargetOs::Linux);

    let mut f = FuncNode::new("bad", vec![0; 4]);
    f.relocs.push(Relocation {
        offset: 0,
        kind: RelocationKind::Other(0x9999),
        target_symbol: "x".to_string(),
        delta: 0,
    });
    let nodes = vec![node(f)];
    let err = aotobj::emit_object(&path, &nodes, &factory).unwrap_err();
    assert!(matches!(err, EmitError::UnsupportedRelocation(0x9999)));
}

#[test]
fn overlapping_frames_are_a_fatal_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overlap.o");
    let factory = SimpleFactory::new(TargetOs::Linux);

    let mut f = FuncNode::new("framed", vec![0; 32]);
    f.frames.push(FrameInfo {
        start_offset: 0,
        end_offset: 20,
        blob: vec![0; 8],
    });
    f.frames.push(FrameInfo {
        start_offset: 10,
        end_offset: 30,
        blob: vec![0; 8],
    });
    let nodes = vec![node(f)];
    let err = aotobj::emit_object(&path, &nodes, &factory).unwrap_err();
    assert!(matches!(err, EmitError::FrameOverlap { .. }));
}

#[cfg(debug_assertions)]
#[test]
fn duplicate_node_names_are_rejected_in_debug_builds() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dup.o");
    let factory = SimpleFactory::new(TargetOs::Linux);

    let nodes = vec![
        node(FuncNode::new("twice", vec![0xc3])),
        node(FuncNode::new("twice", vec![0x90])),
    ];
    let err = aotobj::emit_object(&path, &nodes, &factory).unwrap_err();
    assert!(matches!(err, EmitError::DuplicateNode(name) if name == "twice"));
}
