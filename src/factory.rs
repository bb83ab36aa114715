//! The `Factory` collaborator: the handful of target- and naming-policy
//! questions the emitter needs answered but does not decide itself.

/// The operating-system target the object file is being produced for.
///
/// Selects the unwind strategy (a single opaque blob on Windows vs a stream
/// of CFI micro-records on Unix), whether debug-line records are emitted at
/// all (Windows only), and the OSX leading-underscore symbol rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetOs {
    Windows,
    Linux,
    Osx,
}

impl TargetOs {
    /// Unix here means "uses the CFI-stream unwind strategy", i.e. not Windows.
    pub fn is_unix(self) -> bool {
        !matches!(self, TargetOs::Windows)
    }
}

/// The instruction-set architecture the object file is being produced for.
///
/// Scoped to the two architectures this component supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    X86_64,
    Aarch64,
}

/// Target- and naming-policy questions supplied by the caller.
///
/// Everything the driver and its sub-components need from the outside world
/// that isn't already carried on an [`crate::ObjectNode`] goes through here:
/// which platform conventions apply, and whether a given defined symbol has
/// a second, aliased, externally-visible name.
pub trait Factory {
    /// The target operating system; selects platform dispatch everywhere
    /// mangling, unwind strategy, or debug-info policy branches on it.
    fn target_os(&self) -> TargetOs;

    /// The target architecture; needed only to construct the container.
    fn architecture(&self) -> Architecture;

    /// An optional second externally-visible name for `symbol`, emitted
    /// immediately after the primary name at the same offset.
    fn alternate_name(&self, symbol: &str) -> Option<String>;
}
