//! Top-level driver: section switching, per-node map construction, and the
//! byte-cursor loop that interleaves symbol defs, frame directives,
//! debug-line records and relocation references.

use std::collections::HashSet;

use crate::debugline::{DebugFileTable, DebugLocMap};
use crate::error::EmitError;
use crate::factory::{Factory, TargetOs};
use crate::frame::UnixFrameEngine;
use crate::node::ObjectNode;
use crate::reloc::{width_and_pc_relative, RelocationCursor};
use crate::symbol::SymbolMap;
use crate::writer::ContainerWriter;

/// Runs the full per-node protocol against `writer` for `nodes`, in order.
///
/// Generic over `W: ContainerWriter` so the real, `object`-backed `Writer`
/// and the test `RecordingWriter` exercise exactly the same driver logic.
pub fn emit_nodes<W: ContainerWriter>(
    writer: &mut W,
    nodes: &[Box<dyn ObjectNode>],
    factory: &dyn Factory,
) -> Result<(), EmitError> {
    let mut table = build_debug_file_table(nodes, factory);
    if !table.is_empty() {
        writer.emit_debug_file_info(table.names());
    }

    #[cfg(debug_assertions)]
    let mut seen_names: HashSet<String> = HashSet::new();

    let mut current_section: Option<String> = None;

    for node in nodes {
        if node.should_skip() {
            continue;
        }

        #[cfg(debug_assertions)]
        {
            let name = node.name().to_string();
            if !seen_names.insert(name.clone()) {
                return Err(EmitError::DuplicateNode(name));
            }
        }

        let section = node.section().to_string();
        if current_section.as_deref() != Some(section.as_str()) {
            log::debug!("switching to section {section}");
            writer.switch_section(&section);
            current_section = Some(section.clone());
        }
        writer.emit_alignment(node.alignment());

        let byte_count = emit_one_node(writer, node.as_ref(), factory, &mut table)?;

        log::trace!(
            "emitted node {} ({} bytes, {} relocations)",
            node.name(),
            byte_count,
            node.relocations().len(),
        );

        // Terminator re-emit: committed by the writer as "flush the node
        // just finished, then point at this section again".
        writer.switch_section(&section);
    }

    log::info!(
        "emitted {} node(s) across {} section(s)",
        nodes.iter().filter(|n| !n.should_skip()).count(),
        section_count(nodes),
    );

    Ok(())
}

fn section_count(nodes: &[Box<dyn ObjectNode>]) -> usize {
    let mut seen: HashSet<&str> = HashSet::new();
    for node in nodes {
        if !node.should_skip() {
            seen.insert(node.section());
        }
    }
    seen.len()
}

/// Phase 1: a pre-pass over every non-skipped node's debug-locs, building the
/// global filename table before any node is emitted. A no-op table results
/// whenever the target isn't Windows, since `DebugLocMap::build` never
/// interns a name in that case.
fn build_debug_file_table(nodes: &[Box<dyn ObjectNode>], factory: &dyn Factory) -> DebugFileTable {
    let mut table = DebugFileTable::new();
    if factory.target_os() != TargetOs::Windows {
        return table;
    }
    for node in nodes {
        if node.should_skip() {
            continue;
        }
        for loc in node.debug_locs() {
            table.intern(&loc.file_name);
        }
    }
    table
}

/// Steps 3-6 of the per-node protocol: builds the four per-node maps, then
/// walks the byte cursor `0..=N`.
fn emit_one_node<W: ContainerWriter>(
    writer: &mut W,
    node: &dyn ObjectNode,
    factory: &dyn Factory,
    table: &mut DebugFileTable,
) -> Result<u64, EmitError> {
    let os = factory.target_os();
    let data = node.get_data(factory);
    let n = data.len() as u64;

    let symbols = SymbolMap::build(node.defined_symbols(), factory);
    let debug_locs = DebugLocMap::build(node.debug_locs(), table, os);

    let mut reloc_cursor = RelocationCursor::new(node.relocations());

    let mut unix_frames = if os.is_unix() {
        Some(UnixFrameEngine::build(node.name(), node.frame_infos())?)
    } else {
        None
    };
    if os == TargetOs::Windows {
        crate::frame::validate_no_overlap(node.name(), node.frame_infos())?;
    }

    let mut i: u64 = 0;
    loop {
        for name in symbols.names_at(i) {
            writer.emit_symbol_def(name);
        }

        if let Some(engine) = unix_frames.as_mut() {
            engine.emit_at(i, writer);
        } else if i == 0 {
            // Windows: one opaque blob per frame, emitted whole with no
            // relationship to the byte cursor.
            for frame in node.frame_infos() {
                writer.emit_win_frame_info(node.name(), frame.start_offset, frame.end_offset, &frame.blob);
            }
        }

        if let Some((file_id, line, col)) = debug_locs.at(i) {
            writer.emit_debug_loc(i, file_id, line, col);
        }

        if i == n {
            break;
        }

        if let Some(reloc) = reloc_cursor.at(i) {
            let (width, pc_relative) = width_and_pc_relative(reloc.kind)?;
            let target = crate::symbol::platform_name(&reloc.target_symbol, os);
            writer.emit_symbol_ref(&target, width, pc_relative, reloc.delta);
            reloc_cursor.advance();
            i += width as u64;
        } else {
            writer.emit_blob(&data[i as usize..i as usize + 1]);
            i += 1;
        }
    }

    if !debug_locs.is_empty() {
        writer.flush_debug_locs(node.name(), n);
    }

    Ok(n)
}
