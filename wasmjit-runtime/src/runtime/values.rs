//! The values that WebAssembly programs can manipulate. [Spec][Spec]
//!
//! WebAssembly computations manipulate values of the four basic number types,
//! i.e., integers and floating-point data of 32 or 64 bit width each.
//!
//! Values are represented with an abstract syntax that makes their type
//! explicit; every consumer matches on the tag and never reads a payload under
//! the wrong one.
//!
//! [Spec]: https://webassembly.github.io/spec/core/syntax/values.html#values

use {
    super::error::{RuntimeError, RuntimeErrorKind},
    crate::syntax::types::ValueType,
    std::fmt,
};

/// A value that a WebAssembly program can manipulate. [Spec][Spec]
///
/// Equality compares bit patterns, so NaN payloads and the sign of zero are
/// preserved and observable.
///
/// [Spec]: https://webassembly.github.io/spec/core/syntax/values.html#values
#[derive(Debug, Clone, Copy)]
pub enum Value {
    I32(u32),
    I64(u64),
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn valtype(&self) -> ValueType {
        match self {
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
        }
    }

    /// The raw bits of the payload, zero-extended to 64 bits.
    pub fn bits(&self) -> u64 {
        match self {
            Value::I32(v) => *v as u64,
            Value::I64(v) => *v,
            Value::F32(v) => v.to_bits() as u64,
            Value::F64(v) => v.to_bits(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.valtype() == other.valtype() && self.bits() == other.bits()
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "i32:{v}"),
            Value::I64(v) => write!(f, "i64:{v}"),
            Value::F32(v) => write!(f, "f32:{v}"),
            Value::F64(v) => write!(f, "f64:{v}"),
        }
    }
}

impl ValueType {
    /// Each value type has an associated default value; it is the respective
    /// value 0. [Spec][Spec]
    ///
    /// [Spec]: https://webassembly.github.io/spec/core/exec/runtime.html#values
    pub fn default_value(&self) -> Value {
        match self {
            ValueType::I32 => Value::I32(0),
            ValueType::I64 => Value::I64(0),
            ValueType::F32 => Value::F32(0f32),
            ValueType::F64 => Value::F64(0f64),
        }
    }
}

/// Convenience converters between Rust primitives and [Value].
///
/// Signed integers are stored as their two's complement bit pattern.
macro_rules! froms {
    ( $ty:ty, $sty:ty, $name:ident ) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Value {
                Value::$name(v as $sty)
            }
        }

        impl TryFrom<Value> for $ty {
            type Error = RuntimeError;

            fn try_from(val: Value) -> Result<$ty, Self::Error> {
                match val {
                    Value::$name(v) => Ok(v as $ty),
                    _ => Err(RuntimeErrorKind::ValueType {
                        expected: ValueType::$name,
                        got:      val.valtype(),
                    }
                    .into()),
                }
            }
        }
    };
}

froms! { u32, u32, I32 }
froms! { i32, u32, I32 }
froms! { u64, u64, I64 }
froms! { i64, u64, I64 }
froms! { f32, f32, F32 }
froms! { f64, f64, F64 }
