//! Debug-Line Engine: a global filename→id table across nodes, and a
//! per-node offset→(file,line,col) map.
//!
//! Debug info is emitted only for the Windows target; on Linux/OSX it is
//! intentionally suppressed for now (no DWARF line-table synthesis yet).

use std::collections::BTreeMap;

use crate::factory::TargetOs;
use crate::node::DebugLocInfo;

/// Global filename→id table, assigned in first-seen order. Built fresh for
/// every `emit_object` call and dropped at its end; there is no cross-call
/// state.
#[derive(Debug, Default)]
pub struct DebugFileTable {
    ids: std::collections::HashMap<String, u32>,
    names: Vec<String>,
}

impl DebugFileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `name`, assigning a new one (`names().len()`
    /// before insertion) the first time it is seen.
    pub fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Per-node offset→(file_id, line, col) map.
#[derive(Debug, Default)]
pub struct DebugLocMap {
    by_offset: BTreeMap<u64, (u32, u32, u32)>,
}

impl DebugLocMap {
    /// Builds the map for one node. On any target other than Windows this
    /// is unconditionally empty, regardless of what `locs` contains.
    pub fn build(locs: &[DebugLocInfo], table: &mut DebugFileTable, os: TargetOs) -> Self {
        if os != TargetOs::Windows {
            return Self::default();
        }
        let mut by_offset = BTreeMap::new();
        for loc in locs {
            let file_id = table.intern(&loc.file_name);
            by_offset.insert(loc.native_offset, (file_id, loc.line_number, loc.col_number));
        }
        Self { by_offset }
    }

    pub fn at(&self, offset: u64) -> Option<(u32, u32, u32)> {
        self.by_offset.get(&offset).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_offset.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_assigned_in_first_seen_order() {
        let mut table = DebugFileTable::new();
        assert_eq!(table.intern("a.rs"), 0);
        assert_eq!(table.intern("b.rs"), 1);
        assert_eq!(table.intern("a.rs"), 0);
        assert_eq!(table.names(), &["a.rs".to_string(), "b.rs".to_string()]);
    }

    #[test]
    fn suppressed_on_non_windows() {
        let mut table = DebugFileTable::new();
        let locs = vec![DebugLocInfo {
            native_offset: 0,
            file_name: "a.rs".into(),
            line_number: 1,
            col_number: 1,
        }];
        let map = DebugLocMap::build(&locs, &mut table, TargetOs::Linux);
        assert!(map.is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn active_on_windows() {
        let mut table = DebugFileTable::new();
        let locs = vec![DebugLocInfo {
            native_offset: 4,
            file_name: "a.rs".into(),
            line_number: 10,
            col_number: 3,
        }];
        let map = DebugLocMap::build(&locs, &mut table, TargetOs::Windows);
        assert_eq!(map.at(4), Some((0, 10, 3)));
        assert_eq!(table.names(), &["a.rs".to_string()]);
    }
}
