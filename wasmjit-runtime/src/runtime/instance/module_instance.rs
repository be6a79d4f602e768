use {
    super::{
        addr::{self, Address, AddressType},
        ExportInstance, ExternalVal,
    },
    crate::{
        runtime::{
            error::{Result, RuntimeErrorKind},
            vector::Addrs,
        },
        syntax::types::FunctionType,
    },
};

/// A module instance is the runtime representation of a module. [Spec][Spec]
///
/// It is created by instantiating a module, and collects runtime
/// representations of all entities that are imported, defined, or exported by
/// the module.
///
/// Each component references runtime instances corresponding to respective
/// declarations from the original module – whether imported or defined – in
/// the order of their static indices. Function instances, table instances,
/// memory instances, and global instances are referenced with an indirection
/// through their respective addresses in the store.
///
/// It is an invariant of the semantics that all export instances in a given
/// module instance have different names.
///
/// [Spec]: https://webassembly.github.io/spec/core/exec/runtime.html#module-instances
#[derive(Debug, Default, Clone)]
pub struct ModuleInstance {
    pub types:   Box<[FunctionType]>,
    pub funcs:   Addrs<addr::Function>,
    pub tables:  Addrs<addr::Table>,
    pub mems:    Addrs<addr::Memory>,
    pub globals: Addrs<addr::Global>,
    pub exports: Box<[ExportInstance]>,
}

fn binding<K: AddressType>(addrs: &Addrs<K>, kind: &'static str, idx: u32) -> Result<Address<K>> {
    addrs
        .at(idx)
        .copied()
        .ok_or_else(|| RuntimeErrorKind::IndexOutOfRange(kind, idx).into())
}

impl ModuleInstance {
    pub fn func(&self, idx: u32) -> Result<Address<addr::Function>> {
        binding(&self.funcs, "function", idx)
    }

    pub fn table(&self, idx: u32) -> Result<Address<addr::Table>> {
        binding(&self.tables, "table", idx)
    }

    pub fn mem(&self, idx: u32) -> Result<Address<addr::Memory>> {
        binding(&self.mems, "memory", idx)
    }

    pub fn global(&self, idx: u32) -> Result<Address<addr::Global>> {
        binding(&self.globals, "global", idx)
    }

    pub fn functype(&self, idx: u32) -> Result<&FunctionType> {
        self.types
            .get(idx as usize)
            .ok_or_else(|| RuntimeErrorKind::TypeNotFound(idx).into())
    }

    pub fn resolve(&self, name: &str) -> Option<&ExportInstance> {
        self.exports.iter().find(|e| e.name == name)
    }
}

/// Accumulates the bindings of a module instance while it is being
/// instantiated; imports first, then definitions, in index order.
#[derive(Debug, Default, Clone)]
pub struct ModuleInstanceBuilder {
    pub types:   Vec<FunctionType>,
    pub funcs:   Vec<Address<addr::Function>>,
    pub tables:  Vec<Address<addr::Table>>,
    pub mems:    Vec<Address<addr::Memory>>,
    pub globals: Vec<Address<addr::Global>>,
    pub exports: Vec<ExportInstance>,
}

impl ModuleInstanceBuilder {
    pub fn add_external_val(&mut self, ev: ExternalVal) {
        match ev {
            ExternalVal::Func(a) => self.funcs.push(a),
            ExternalVal::Table(a) => self.tables.push(a),
            ExternalVal::Memory(a) => self.mems.push(a),
            ExternalVal::Global(a) => self.globals.push(a),
        }
    }

    pub fn build(self) -> ModuleInstance {
        ModuleInstance {
            types:   self.types.into_boxed_slice(),
            funcs:   self.funcs.into_iter().collect(),
            tables:  self.tables.into_iter().collect(),
            mems:    self.mems.into_iter().collect(),
            globals: self.globals.into_iter().collect(),
            exports: self.exports.into_boxed_slice(),
        }
    }
}
