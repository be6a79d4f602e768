//! The type descriptors used to classify values, functions, tables, memories
//! and globals. They are produced by the decoder and checked by the runtime at
//! every linkage point.
//!
//! [Spec]: https://webassembly.github.io/spec/core/syntax/types.html

use std::fmt;

/// Value types classify the individual values that WebAssembly code can
/// compute with and the values that a variable accepts. [Spec][Spec]
///
/// The types i32 and i64 classify 32 and 64 bit integers, respectively.
/// Integers are not inherently signed or unsigned, their interpretation is
/// determined by individual operations. The types f32 and f64 classify 32 and
/// 64 bit IEEE 754 floating-point data.
///
/// [Spec]: https://webassembly.github.io/spec/core/syntax/types.html#number-types
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
        })
    }
}

/// Result types classify the result of executing instructions or functions,
/// which is a sequence of values. [Spec][Spec]
///
/// [Spec]: https://webassembly.github.io/spec/core/syntax/types.html#result-types
pub type ResultType = [ValueType];

/// WebAssembly types parameter lists with [ResultType] too. For clarity,
/// we define the [ParamsType] alias.
pub type ParamsType = ResultType;

/// Function types classify the signature of functions, mapping a vector of
/// parameters to a vector of results. [Spec][Spec]
///
/// [Spec]: https://webassembly.github.io/spec/core/syntax/types.html#function-types
#[derive(Debug, PartialEq, Eq, Clone, Default, Hash)]
pub struct FunctionType {
    pub params: Box<ParamsType>,
    pub result: Box<ResultType>,
}

impl FunctionType {
    pub fn new(params: &ParamsType, result: &ResultType) -> Self {
        FunctionType {
            params: params.into(),
            result: result.into(),
        }
    }

    pub fn is_void(&self) -> bool {
        self.params.is_empty() && self.result.is_empty()
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, types: &[ValueType]) -> fmt::Result {
            f.write_str("(")?;
            for (i, t) in types.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{t}")?;
            }
            f.write_str(")")
        }
        list(f, &self.params)?;
        f.write_str(" -> ")?;
        list(f, &self.result)
    }
}

/// Limits classify the size range of resizeable storage associated with
/// [memory types][MemType] and [table types][TableType]. [Spec][Spec]
///
/// `upper: None` means there is no maximum. A maximum of zero is a real limit.
///
/// [Spec]: https://webassembly.github.io/spec/core/syntax/types.html#limits
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Limits {
    pub lower: u32,
    pub upper: Option<u32>,
}

impl Limits {
    pub fn new(lower: u32, upper: Option<u32>) -> Self {
        Limits { lower, upper }
    }

    /// Limits (n1, m1), (n2, m2) match iff:
    /// n1 >= n2
    /// AND
    /// m2 Empty OR m1 and m2 are non empty and m1 <= m2
    pub fn works_as(&self, other: &Limits) -> bool {
        self.lower >= other.lower
            && match (self.upper, other.upper) {
                (_, None) => true,
                (Some(su), Some(ou)) => su <= ou,
                _ => false,
            }
    }

    /// True if `lower` does not exceed a declared maximum.
    pub fn is_consistent(&self) -> bool {
        self.upper.map_or(true, |upper| self.lower <= upper)
    }
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upper {
            Some(upper) => write!(f, "{} {}", self.lower, upper),
            None => write!(f, "{}", self.lower),
        }
    }
}

/// The type of the references a table holds. Only function references are
/// supported.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemType {
    #[default]
    FuncRef,
}

/// Memory types classify linear memories and their size range, in units of
/// page size. [Spec][Spec]
///
/// [Spec]: https://webassembly.github.io/spec/core/syntax/types.html#memory-types
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemType {
    pub limits: Limits,
}

impl MemType {
    pub fn new(lower: u32, upper: Option<u32>) -> Self {
        MemType {
            limits: Limits::new(lower, upper),
        }
    }
}

/// Table types classify tables over elements of reference type within a size
/// range, in numbers of entries. [Spec][Spec]
///
/// [Spec]: https://webassembly.github.io/spec/core/syntax/types.html#table-types
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableType {
    pub limits:   Limits,
    pub elemtype: ElemType,
}

impl TableType {
    pub fn new(lower: u32, upper: Option<u32>) -> Self {
        TableType {
            limits:   Limits::new(lower, upper),
            elemtype: ElemType::FuncRef,
        }
    }
}

/// Global types classify global variables, which hold a value and can either
/// be mutable or immutable. [Spec][Spec]
///
/// [Spec]: https://webassembly.github.io/spec/core/syntax/types.html#global-types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalType {
    /// If true, the type refers to a mutable global value.
    pub mutable: bool,
    pub valtype: ValueType,
}

impl GlobalType {
    pub fn new(valtype: ValueType, mutable: bool) -> Self {
        GlobalType { mutable, valtype }
    }
}

impl fmt::Display for GlobalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mutable {
            true => write!(f, "(mut {})", self.valtype),
            false => write!(f, "{}", self.valtype),
        }
    }
}
