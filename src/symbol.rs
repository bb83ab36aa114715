//! Offset→symbol-name(s) index with platform-dependent name mangling and
//! alternate-name aliasing.

use std::collections::BTreeMap;

use crate::factory::{Factory, TargetOs};
use crate::node::DefinedSymbol;

/// Applies the one platform-dependent symbol-name rule this emitter knows
/// about: the OSX leading underscore. Used both for defined-symbol names and
/// for relocation target names (a relocation against an OSX symbol must
/// carry the underscore too).
pub fn platform_name(name: &str, os: TargetOs) -> String {
    match os {
        TargetOs::Osx => format!("_{name}"),
        TargetOs::Linux | TargetOs::Windows => name.to_string(),
    }
}

/// Per-node offset→ordered-list-of-emit-names index.
///
/// Built once per node from its `defined_symbols()` and the `Factory`'s
/// alternate-name policy; consulted once per byte offset during emission.
#[derive(Debug, Default)]
pub struct SymbolMap {
    by_offset: BTreeMap<u64, Vec<String>>,
}

impl SymbolMap {
    /// Builds the map for one node's defined symbols.
    ///
    /// For each symbol, `platform_name` is applied to the mangled input
    /// name; if the factory supplies an alternate name for that symbol, its
    /// platform name is appended immediately after, at the same offset.
    pub fn build(defined: &[DefinedSymbol], factory: &dyn Factory) -> Self {
        let os = factory.target_os();
        let mut by_offset: BTreeMap<u64, Vec<String>> = BTreeMap::new();
        for sym in defined {
            let names = by_offset.entry(sym.offset).or_default();
            names.push(platform_name(&sym.name, os));
            if let Some(alt) = factory.alternate_name(&sym.name) {
                names.push(platform_name(&alt, os));
            }
        }
        Self { by_offset }
    }

    /// Emit-names registered at `offset`, in insertion order. Empty if none.
    pub fn names_at(&self, offset: u64) -> &[String] {
        self.by_offset
            .get(&offset)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::Architecture;

    struct Fac {
        os: TargetOs,
        alt: Option<&'static str>,
    }
    impl Factory for Fac {
        fn target_os(&self) -> TargetOs {
            self.os
        }
        fn architecture(&self) -> Architecture {
            Architecture::X86_64
        }
        fn alternate_name(&self, _symbol: &str) -> Option<String> {
            self.alt.map(str::to_string)
        }
    }

    #[test]
    fn osx_gets_underscore_everywhere() {
        assert_eq!(platform_name("foo", TargetOs::Osx), "_foo");
        assert_eq!(platform_name("foo", TargetOs::Linux), "foo");
        assert_eq!(platform_name("foo", TargetOs::Windows), "foo");
    }

    #[test]
    fn alternate_name_follows_primary_at_same_offset() {
        let fac = Fac {
            os: TargetOs::Linux,
            alt: Some("Foo$entry"),
        };
        let defined = [DefinedSymbol {
            name: "Foo".into(),
            offset: 8,
        }];
        let map = SymbolMap::build(&defined, &fac);
        assert_eq!(map.names_at(8), &["Foo".to_string(), "Foo$entry".to_string()]);
        assert!(map.names_at(0).is_empty());
    }

    #[test]
    fn insertion_order_preserved_for_multiple_symbols_same_offset() {
        let fac = Fac {
            os: TargetOs::Linux,
            alt: None,
        };
        let defined = [
            DefinedSymbol {
                name: "a".into(),
                offset: 0,
            },
            DefinedSymbol {
                name: "b".into(),
                offset: 0,
            },
        ];
        let map = SymbolMap::build(&defined, &fac);
        assert_eq!(map.names_at(0), &["a".to_string(), "b".to_string()]);
    }
}
