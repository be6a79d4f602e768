//! The instruction tree a decoder hands to the runtime for each guest function
//! body.
//!
//! Structured control instructions carry their nested bodies directly, so a
//! backend never has to recover block structure from a flat opcode stream.

use {
    super::types::ValueType,
    crate::runtime::values::Value,
    std::rc::Rc,
};

/// The result type of a structured block. Blocks produce at most one value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    #[default]
    Empty,
    Value(ValueType),
}

impl BlockType {
    pub fn arity(&self) -> usize {
        match self {
            BlockType::Empty => 0,
            BlockType::Value(_) => 1,
        }
    }
}

/// The static offset of a load or store. The effective address is the dynamic
/// operand plus this offset, computed without wrapping.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemArg {
    pub offset: u32,
}

/// Binary integer operations, shared by i32 and i64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntOp {
    Add,
    Sub,
    Mul,
    DivS,
    DivU,
    RemS,
    RemU,
    And,
    Or,
    Xor,
    Shl,
    ShrS,
    ShrU,
    Eq,
    Ne,
    LtS,
    LtU,
    GtS,
    GtU,
    LeS,
    LeU,
    GeS,
    GeU,
}

/// Binary float operations, shared by f32 and f64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    I32WrapI64,
    I64ExtendI32S,
    I64ExtendI32U,
    I32TruncF32S,
    I32TruncF64S,
    F64ConvertI32S,
    F32DemoteF64,
    F64PromoteF32,
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,
}

impl Conversion {
    pub fn input(&self) -> ValueType {
        match self {
            Conversion::I32WrapI64 | Conversion::F64ReinterpretI64 => ValueType::I64,
            Conversion::I64ExtendI32S
            | Conversion::I64ExtendI32U
            | Conversion::F64ConvertI32S
            | Conversion::F32ReinterpretI32 => ValueType::I32,
            Conversion::I32TruncF32S | Conversion::F64PromoteF32 | Conversion::I32ReinterpretF32 => {
                ValueType::F32
            }
            Conversion::I32TruncF64S | Conversion::F32DemoteF64 | Conversion::I64ReinterpretF64 => {
                ValueType::F64
            }
        }
    }
}

/// A single instruction. Indices are in the index space of the module that
/// owns the function; the runtime translates them through that module's
/// instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Unreachable,
    Nop,
    Block(BlockType, Rc<[Instruction]>),
    Loop(BlockType, Rc<[Instruction]>),
    If(BlockType, Rc<[Instruction]>, Rc<[Instruction]>),
    Br(u32),
    BrIf(u32),
    /// Branch targets indexed by the operand, then the default target.
    BrTable(Box<[u32]>, u32),
    Return,
    Call(u32),
    /// Call through table 0, expecting the type at the given type index.
    CallIndirect(u32),

    Drop,
    Select,

    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(u32),
    GlobalSet(u32),

    Load(ValueType, MemArg),
    Store(ValueType, MemArg),
    MemorySize,
    MemoryGrow,

    Const(Value),
    I32Eqz,
    I64Eqz,
    I32(IntOp),
    I64(IntOp),
    F32(FloatOp),
    F64(FloatOp),
    Convert(Conversion),
}

impl Instruction {
    pub fn i32const(v: impl Into<u32>) -> Self {
        Instruction::Const(Value::I32(v.into()))
    }

    pub fn i64const(v: impl Into<u64>) -> Self {
        Instruction::Const(Value::I64(v.into()))
    }

    pub fn f32const(v: f32) -> Self {
        Instruction::Const(Value::F32(v))
    }

    pub fn f64const(v: f64) -> Self {
        Instruction::Const(Value::F64(v))
    }

    pub fn block(bt: BlockType, body: Vec<Instruction>) -> Self {
        Instruction::Block(bt, body.into())
    }

    pub fn loop_(bt: BlockType, body: Vec<Instruction>) -> Self {
        Instruction::Loop(bt, body.into())
    }

    pub fn if_else(bt: BlockType, then: Vec<Instruction>, els: Vec<Instruction>) -> Self {
        Instruction::If(bt, then.into(), els.into())
    }

    pub fn load(valtype: ValueType, offset: u32) -> Self {
        Instruction::Load(valtype, MemArg { offset })
    }

    pub fn store(valtype: ValueType, offset: u32) -> Self {
        Instruction::Store(valtype, MemArg { offset })
    }
}
