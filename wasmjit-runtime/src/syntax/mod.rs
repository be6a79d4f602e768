//! The decoded module the runtime instantiates.
//!
//! Parsing and validating the binary or text format is the decoder's job; what
//! arrives here is already resolved to numeric indices in the module's own
//! index spaces.

mod instruction;
pub mod types;

pub use instruction::{BlockType, Conversion, FloatOp, Instruction, IntOp, MemArg};
use {
    crate::runtime::values::Value,
    std::fmt,
    types::{FunctionType, GlobalType, MemType, TableType, ValueType},
};

/// A decoded module, with all of its definitions in index order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Module {
    pub types:    Vec<FunctionType>,
    pub imports:  Vec<Import>,
    pub funcs:    Vec<Func>,
    pub tables:   Vec<TableType>,
    pub memories: Vec<MemType>,
    pub globals:  Vec<Global>,
    pub exports:  Vec<Export>,
    pub start:    Option<u32>,
    pub elems:    Vec<ElemSegment>,
    pub data:     Vec<DataSegment>,
}

/// A group of locals of the same type, beyond the function's parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locals {
    pub count:   u32,
    pub valtype: ValueType,
}

impl Locals {
    pub fn new(count: u32, valtype: ValueType) -> Self {
        Locals { count, valtype }
    }
}

/// A function defined by the module.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Func {
    pub typeidx: u32,
    pub locals:  Vec<Locals>,
    pub body:    Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportDesc {
    /// A function import, by type index.
    Func(u32),
    Table(TableType),
    Mem(MemType),
    Global(GlobalType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: String,
    pub name:   String,
    pub desc:   ImportDesc,
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" \"{}\"", self.module, self.name)
    }
}

/// A constant expression, used for global initializers and segment offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstExpr {
    Const(Value),
    /// Reads an imported global.
    GlobalGet(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub globaltype: GlobalType,
    pub init:       ConstExpr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportDesc {
    Func(u32),
    Table(u32),
    Mem(u32),
    Global(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub name: String,
    pub desc: ExportDesc,
}

/// An active element segment: function indices copied into a table at
/// instantiation.
#[derive(Debug, Clone, PartialEq)]
pub struct ElemSegment {
    pub table:  u32,
    pub offset: ConstExpr,
    pub funcs:  Vec<u32>,
}

/// An active data segment: bytes copied into a memory at instantiation.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    pub memory: u32,
    pub offset: ConstExpr,
    pub bytes:  Vec<u8>,
}
