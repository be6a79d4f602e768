use {
    crate::runtime::{
        error::{Result, RuntimeErrorKind},
        values::Value,
    },
    crate::syntax::types::GlobalType,
    wasmjit_common::true_or::TrueOr,
};

/// A global instance is the runtime representation of a global variable.
/// [Spec][Spec]
///
/// It holds an individual value and records whether it may change. The type
/// of the value is fixed by its initial value.
///
/// [Spec]: https://webassembly.github.io/spec/core/exec/runtime.html#global-instances
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalInstance {
    pub mutable: bool,
    val:         Value,
}

impl GlobalInstance {
    pub fn new(val: Value, mutable: bool) -> Self {
        GlobalInstance { mutable, val }
    }

    pub fn get(&self) -> Value {
        self.val
    }

    pub fn globaltype(&self) -> GlobalType {
        GlobalType::new(self.val.valtype(), self.mutable)
    }

    /// Immutable globals reject every write, and a mutable global keeps the
    /// value type it was created with.
    pub fn set(&mut self, val: Value) -> Result<()> {
        self.mutable.true_or(RuntimeErrorKind::ImmutableGlobal)?;
        (val.valtype() == self.val.valtype()).true_or_else(|| RuntimeErrorKind::GlobalType {
            expected: self.val.valtype(),
            got:      val.valtype(),
        })?;
        self.val = val;
        Ok(())
    }
}
