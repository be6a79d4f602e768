use {
    super::addr::{self, Address},
    crate::syntax::types::{FunctionType, GlobalType, MemType, TableType},
    std::fmt,
};

/// An external value is the runtime representation of an entity that can be
/// imported or exported. [Spec][Spec]
///
/// It is an address denoting either a function instance, table instance, memory
/// instance, or global instances in the shared store.
///
/// [Spec]: https://webassembly.github.io/spec/core/exec/runtime.html#external-values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalVal {
    Func(Address<addr::Function>),
    Table(Address<addr::Table>),
    Memory(Address<addr::Memory>),
    Global(Address<addr::Global>),
}

impl ExternalVal {
    pub fn kind(&self) -> ExternKind {
        match self {
            ExternalVal::Func(_) => ExternKind::Func,
            ExternalVal::Table(_) => ExternKind::Table,
            ExternalVal::Memory(_) => ExternKind::Memory,
            ExternalVal::Global(_) => ExternKind::Global,
        }
    }

    /// The raw index, without its kind.
    pub fn raw(&self) -> u32 {
        match self {
            ExternalVal::Func(a) => a.0,
            ExternalVal::Table(a) => a.0,
            ExternalVal::Memory(a) => a.0,
            ExternalVal::Global(a) => a.0,
        }
    }
}

/// The four kinds of entity a module can import or export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternKind {
    Func,
    Table,
    Memory,
    Global,
}

impl fmt::Display for ExternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExternKind::Func => "function",
            ExternKind::Table => "table",
            ExternKind::Memory => "memory",
            ExternKind::Global => "global",
        })
    }
}

/// The full type of an external value, for diagnostics. [Spec][Spec]
///
/// [Spec]: https://webassembly.github.io/spec/core/syntax/types.html#external-types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternType {
    Func(FunctionType),
    Table(TableType),
    Memory(MemType),
    Global(GlobalType),
}

impl fmt::Display for ExternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternType::Func(ft) => write!(f, "(func {ft})"),
            ExternType::Table(tt) => write!(f, "(table {} funcref)", tt.limits),
            ExternType::Memory(mt) => write!(f, "(memory {})", mt.limits),
            ExternType::Global(gt) => write!(f, "(global {gt})"),
        }
    }
}

/// An export instance is the runtime representation of an export. [Spec][Spec]
///
/// It defines the export’s name and the associated external value.
///
/// [Spec]: https://webassembly.github.io/spec/core/exec/runtime.html#export-instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportInstance {
    pub name: String,
    pub addr: ExternalVal,
}
