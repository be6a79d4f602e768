use {
    super::instance::{ExternKind, ExternType},
    crate::syntax::types::ValueType,
    thiserror::Error,
};

/// An impl_bug is a place where we're doing a runtime check for something
/// that should have been handled by module validation.
#[macro_export]
macro_rules! impl_bug {
    ( $fmt:literal $(, $( $arg:expr ),*)? ) => {
        $crate::runtime::error::RuntimeErrorKind::ImplementationBug(
            format!($fmt$(, $($arg,)*)?)
        )
    }
}

#[derive(Debug, Error)]
#[error("{kind}{}", render_context(.context))]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    context:  Vec<String>,
}

fn render_context(context: &[String]) -> String {
    context.iter().rev().map(|c| format!("\n  while {c}")).collect()
}

impl RuntimeError {
    pub fn with_context(mut self, msg: impl Into<String>) -> Self {
        self.context.push(msg.into());
        self
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }

    pub fn as_trap_error(&self) -> Option<&TrapKind> {
        match self.kind {
            RuntimeErrorKind::Trap(ref tk) => Some(tk),
            _ => None,
        }
    }

    /// Linkage errors are raised while resolving imports and exports; the
    /// store stays usable after any of them.
    pub fn is_linkage_error(&self) -> bool {
        matches!(
            self.kind,
            RuntimeErrorKind::ImportNotFound(..)
                | RuntimeErrorKind::ImportKindMismatch { .. }
                | RuntimeErrorKind::ImportTypeMismatch { .. }
                | RuntimeErrorKind::DuplicateName(..)
                | RuntimeErrorKind::DuplicateExport(..)
        )
    }
}

#[derive(Debug, Error)]
pub enum RuntimeErrorKind {
    #[error("unknown import \"{0}\" \"{1}\"")]
    ImportNotFound(String, String),
    #[error("import \"{module}\" \"{name}\": expected a {expected}, found a {found}")]
    ImportKindMismatch {
        module:   String,
        name:     String,
        expected: ExternKind,
        found:    ExternKind,
    },
    #[error("incompatible import type for \"{module}\" \"{name}\": expected {expected}, found {found}")]
    ImportTypeMismatch {
        module:   String,
        name:     String,
        expected: ExternType,
        found:    ExternType,
    },
    #[error("\"{0}\" \"{1}\" is already bound to a different value")]
    DuplicateName(String, String),
    #[error("duplicate export name \"{0}\"")]
    DuplicateExport(String),

    #[error("invalid {0} address {1}")]
    InvalidAddress(ExternKind, u32),
    #[error("unknown {0} index {1}")]
    IndexOutOfRange(&'static str, u32),
    #[error("unknown type index {0}")]
    TypeNotFound(u32),

    #[error("allocation failed: {0}")]
    AllocationFailure(String),
    #[error("limits exceeded: {0}")]
    LimitsExceeded(String),

    #[error("expected {expected} arguments, got {got}")]
    ArgumentCount { expected: usize, got: usize },
    #[error("argument {index}: expected {expected}, got {got}")]
    ArgumentType {
        index:    usize,
        expected: ValueType,
        got:      ValueType,
    },
    #[error("expected {expected} results, got {got}")]
    ResultCount { expected: usize, got: usize },
    #[error("result {index}: expected {expected}, got {got}")]
    ResultType {
        index:    usize,
        expected: ValueType,
        got:      ValueType,
    },
    #[error("start function must have type () -> ()")]
    StartFunctionType,

    #[error("cannot write an immutable global")]
    ImmutableGlobal,
    #[error("global holds {expected}, cannot store {got}")]
    GlobalType { expected: ValueType, got: ValueType },
    #[error("expected a value of type {expected}, got {got}")]
    ValueType { expected: ValueType, got: ValueType },

    #[error("implementation bug: {0}")]
    ImplementationBug(String),
    #[error("trap: {0}")]
    Trap(TrapKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrapKind {
    #[error("unreachable")]
    Unreachable,
    #[error("integer divide by zero")]
    IntegerDivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversionToInteger,
    #[error("out of bounds memory access at {0} of length {1}")]
    OutOfBoundsMemoryAccess(u64, usize),
    #[error("out of bounds table access at {0} of length {1}")]
    OutOfBoundsTableAccess(u64, usize),
    #[error("uninitialized element {0}")]
    UninitializedElement(u32),
    #[error("undefined element {0}")]
    UndefinedElement(u32),
    #[error("indirect call type mismatch")]
    CallIndirectTypeMismatch,
    #[error("call stack exhausted at depth {0}")]
    CallStackExhausted(usize),
}

impl From<TrapKind> for RuntimeError {
    fn from(tk: TrapKind) -> RuntimeError {
        RuntimeErrorKind::Trap(tk).into()
    }
}

impl From<RuntimeErrorKind> for RuntimeError {
    fn from(value: RuntimeErrorKind) -> Self {
        RuntimeError {
            kind:    value,
            context: vec![],
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_rendered_innermost_last() {
        let err: RuntimeError = TrapKind::Unreachable.into();
        let err = err.with_context("calling f").with_context("running start");
        assert_eq!(
            err.to_string(),
            "trap: unreachable\n  while running start\n  while calling f"
        );
        assert_eq!(err.as_trap_error(), Some(&TrapKind::Unreachable));
        assert!(!err.is_linkage_error());
    }
}
