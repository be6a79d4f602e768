//! Shared fixtures for the integration tests: logging setup, a host "env"
//! module, and a small builder for decoded modules.

use {
    std::{cell::RefCell, rc::Rc},
    wasmjit_runtime::{
        runtime::{
            error::Result,
            instance::{
                addr::{self, Address},
                ExternalVal,
            },
            values::Value,
            Store,
        },
        syntax::{
            types::{FunctionType, GlobalType, MemType, TableType, ValueType},
            ConstExpr, DataSegment, ElemSegment, Export, ExportDesc, Func, Global, Import,
            ImportDesc, Instruction, Locals, Module,
        },
    },
};

/// Route runtime logging to the test harness. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Everything the host functions of [register_env] have printed.
pub type Printed = Rc<RefCell<Vec<Value>>>;

/// The entities [register_env] created.
#[derive(Debug, Clone)]
pub struct Env {
    pub printed: Printed,
    pub memory:  Address<addr::Memory>,
    pub table:   Address<addr::Table>,
}

/// Register a host module named "env", in the shape of the conformance
/// suite's host module:
///
/// ```text
/// (module
///  (global (export "global_i32") i32)   ;; 666
///  (global (export "global_i64") i64)   ;; 666
///  (global (export "global_f32") f32)   ;; 666.6
///  (global (export "global_f64") f64)   ;; 666.6
///  (global (export "counter") (mut i32))
///  (table (export "table") 10 20 funcref)
///  (memory (export "memory") 1 2)
///  (func (export "print"))
///  (func (export "print_i32") (param i32))
///  (func (export "print_i64") (param i64))
///  (func (export "print_f64") (param f64))
///  (func (export "print_i32_f32") (param i32 f32))
/// )
/// ```
pub fn register_env(store: &mut Store) -> Result<Env> {
    use ValueType::*;

    let printed: Printed = Rc::default();
    let printer = |params: &[ValueType]| {
        let printed = printed.clone();
        (FunctionType::new(params, &[]), move |_: &mut Store, args: &[Value]| -> Result<Vec<Value>> {
            printed.borrow_mut().extend_from_slice(args);
            log::info!(target: "env", "print {args:?}");
            Ok(vec![])
        })
    };
    for (name, params) in [
        ("print", &[][..]),
        ("print_i32", &[I32][..]),
        ("print_i64", &[I64][..]),
        ("print_f64", &[F64][..]),
        ("print_i32_f32", &[I32, F32][..]),
    ] {
        let (ft, f) = printer(params);
        store.import_function("env", name, ft, f)?;
    }

    store.import_global("env", "global_i32", Value::I32(666), false)?;
    store.import_global("env", "global_i64", Value::I64(666), false)?;
    store.import_global("env", "global_f32", Value::F32(666.6), false)?;
    store.import_global("env", "global_f64", Value::F64(666.6), false)?;
    store.import_global("env", "counter", Value::I32(0), true)?;
    let table = store.import_table("env", "table", TableType::new(10, Some(20)))?;
    let memory = store.import_memory("env", "memory", MemType::new(1, Some(2)))?;

    Ok(Env {
        printed,
        memory,
        table,
    })
}

/// Build a [Module] definition by definition, in index order. Function types
/// are interned as they are used.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn typeidx(&mut self, params: &[ValueType], results: &[ValueType]) -> u32 {
        let ft = FunctionType::new(params, results);
        match self.module.types.iter().position(|t| *t == ft) {
            Some(i) => i as u32,
            None => {
                self.module.types.push(ft);
                self.module.types.len() as u32 - 1
            }
        }
    }

    fn import(mut self, module: &str, name: &str, desc: ImportDesc) -> Self {
        self.module.imports.push(Import {
            module: module.into(),
            name: name.into(),
            desc,
        });
        self
    }

    pub fn import_func(
        mut self,
        module: &str,
        name: &str,
        params: &[ValueType],
        results: &[ValueType],
    ) -> Self {
        let typeidx = self.typeidx(params, results);
        self.import(module, name, ImportDesc::Func(typeidx))
    }

    pub fn import_memory(self, module: &str, name: &str, lower: u32, upper: Option<u32>) -> Self {
        self.import(module, name, ImportDesc::Mem(MemType::new(lower, upper)))
    }

    pub fn import_table(self, module: &str, name: &str, lower: u32, upper: Option<u32>) -> Self {
        self.import(module, name, ImportDesc::Table(TableType::new(lower, upper)))
    }

    pub fn import_global(
        self,
        module: &str,
        name: &str,
        valtype: ValueType,
        mutable: bool,
    ) -> Self {
        self.import(module, name, ImportDesc::Global(GlobalType::new(valtype, mutable)))
    }

    pub fn func(
        mut self,
        params: &[ValueType],
        results: &[ValueType],
        locals: &[ValueType],
        body: Vec<Instruction>,
    ) -> Self {
        let typeidx = self.typeidx(params, results);
        self.module.funcs.push(Func {
            typeidx,
            locals: locals.iter().map(|vt| Locals::new(1, *vt)).collect(),
            body,
        });
        self
    }

    /// Declare a function type without defining a function, for use by
    /// `call_indirect`. Returns the builder and the type's index.
    pub fn functype(mut self, params: &[ValueType], results: &[ValueType]) -> (Self, u32) {
        let idx = self.typeidx(params, results);
        (self, idx)
    }

    pub fn memory(mut self, lower: u32, upper: Option<u32>) -> Self {
        self.module.memories.push(MemType::new(lower, upper));
        self
    }

    pub fn table(mut self, lower: u32, upper: Option<u32>) -> Self {
        self.module.tables.push(TableType::new(lower, upper));
        self
    }

    pub fn global(mut self, init: Value, mutable: bool) -> Self {
        self.module.globals.push(Global {
            globaltype: GlobalType::new(init.valtype(), mutable),
            init:       ConstExpr::Const(init),
        });
        self
    }

    pub fn export(mut self, name: &str, desc: ExportDesc) -> Self {
        self.module.exports.push(Export {
            name: name.into(),
            desc,
        });
        self
    }

    pub fn elems(mut self, offset: u32, funcs: &[u32]) -> Self {
        self.module.elems.push(ElemSegment {
            table:  0,
            offset: ConstExpr::Const(Value::I32(offset)),
            funcs:  funcs.to_vec(),
        });
        self
    }

    pub fn data(mut self, offset: u32, bytes: &[u8]) -> Self {
        self.module.data.push(DataSegment {
            memory: 0,
            offset: ConstExpr::Const(Value::I32(offset)),
            bytes:  bytes.to_vec(),
        });
        self
    }

    pub fn start(mut self, funcidx: u32) -> Self {
        self.module.start = Some(funcidx);
        self
    }

    pub fn build(self) -> Module {
        self.module
    }
}

/// The function bound to `(module_name, name)`, panicking if there is none.
pub fn func_export(store: &Store, module_name: &str, name: &str) -> Address<addr::Function> {
    match store.resolve(module_name, name) {
        Some(ExternalVal::Func(a)) => a,
        other => panic!("\"{module_name}\" \"{name}\" is not a function: {other:?}"),
    }
}
