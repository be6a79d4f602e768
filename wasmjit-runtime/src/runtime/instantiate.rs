use {
    super::{
        error::{Result, RuntimeError, RuntimeErrorKind, TrapKind},
        instance::{
            addr::{self, Address},
            ExportInstance, ExternalVal, ModuleInstanceBuilder,
        },
        store::Store,
        values::Value,
    },
    crate::{
        log_tag::Tag,
        syntax::{
            types::{FunctionType, ValueType},
            ConstExpr, ExportDesc, ImportDesc, Module,
        },
    },
    hashbrown::HashSet,
    wasmjit_common::true_or::TrueOr,
};

/// Everything about a module that can be checked before the store is touched.
struct Plan {
    imports:      Vec<ExternalVal>,
    global_inits: Vec<Value>,
}

fn offset_value(v: Value) -> Result<u32> {
    match v {
        Value::I32(o) => Ok(o),
        other => Err(RuntimeErrorKind::ValueType {
            expected: ValueType::I32,
            got:      other.valtype(),
        })?,
    }
}

impl Store {
    /// Allocate and instantiate `module`, registering its exports under
    /// `module_name`.
    ///
    /// Imports are resolved and type-checked, export names are checked, and
    /// global initializers are evaluated before anything is allocated, so any
    /// linkage error leaves the store exactly as it was. A failure after
    /// allocation has begun (a segment out of bounds, a trapping start
    /// function) abandons the instance; what was allocated for it stays in the
    /// store but is never bound in the namespace.
    pub fn instantiate(&mut self, module_name: &str, module: Module) -> Result<Address<addr::Module>> {
        self.log(Tag::Load, || {
            format!(
                "INSTANTIATE \"{module_name}\": {} imports {} funcs {} exports",
                module.imports.len(),
                module.funcs.len(),
                module.exports.len()
            )
        });
        self.instantiate_module(module_name, module)
            .map_err(|e| e.with_context(format!("instantiating \"{module_name}\"")))
    }

    fn plan(&self, module_name: &str, module: &Module) -> Result<Plan> {
        let imports = module
            .imports
            .iter()
            .map(|import| {
                self.resolve_import(import, &module.types)
                    .map_err(|e| e.with_context(format!("resolving import {import}")))
            })
            .collect::<Result<Vec<_>>>()?;

        for func in &module.funcs {
            module
                .types
                .get(func.typeidx as usize)
                .ok_or(RuntimeErrorKind::TypeNotFound(func.typeidx))?;
        }

        let imported_globals: Vec<_> = imports
            .iter()
            .filter_map(|ev| match ev {
                ExternalVal::Global(a) => Some(*a),
                _ => None,
            })
            .collect();
        let global_inits = module
            .globals
            .iter()
            .map(|g| {
                let val = self.eval_const(&g.init, &imported_globals)?;
                (val.valtype() == g.globaltype.valtype).true_or_else(|| {
                    RuntimeErrorKind::GlobalType {
                        expected: g.globaltype.valtype,
                        got:      val.valtype(),
                    }
                })?;
                Ok(val)
            })
            .collect::<Result<Vec<_>>>()?;

        let count = |kind: fn(&ImportDesc) -> bool, defined: usize| {
            module.imports.iter().filter(|i| kind(&i.desc)).count() + defined
        };
        let nfuncs = count(|d| matches!(d, ImportDesc::Func(_)), module.funcs.len());
        let ntables = count(|d| matches!(d, ImportDesc::Table(_)), module.tables.len());
        let nmems = count(|d| matches!(d, ImportDesc::Mem(_)), module.memories.len());
        let nglobals = count(|d| matches!(d, ImportDesc::Global(_)), module.globals.len());

        let mut seen = HashSet::new();
        for export in &module.exports {
            let (kind, idx, n) = match export.desc {
                ExportDesc::Func(i) => ("function", i, nfuncs),
                ExportDesc::Table(i) => ("table", i, ntables),
                ExportDesc::Mem(i) => ("memory", i, nmems),
                ExportDesc::Global(i) => ("global", i, nglobals),
            };
            ((idx as usize) < n).true_or(RuntimeErrorKind::IndexOutOfRange(kind, idx))?;
            seen.insert(export.name.as_str())
                .true_or_else(|| RuntimeErrorKind::DuplicateExport(export.name.clone()))?;
            self.resolve(module_name, &export.name)
                .is_none()
                .true_or_else(|| {
                    RuntimeErrorKind::DuplicateName(module_name.to_owned(), export.name.clone())
                })?;
        }

        if let Some(start) = module.start {
            let ft = self.start_functype(module, &imports, start)?;
            ft.is_void().true_or(RuntimeErrorKind::StartFunctionType)?;
        }

        Ok(Plan {
            imports,
            global_inits,
        })
    }

    fn start_functype(
        &self,
        module: &Module,
        imports: &[ExternalVal],
        idx: u32,
    ) -> Result<FunctionType> {
        let imported: Vec<_> = imports
            .iter()
            .filter_map(|ev| match ev {
                ExternalVal::Func(a) => Some(*a),
                _ => None,
            })
            .collect();
        match imported.get(idx as usize) {
            Some(a) => Ok(self.func(*a)?.functype().clone()),
            None => {
                let func = module
                    .funcs
                    .get(idx as usize - imported.len())
                    .ok_or(RuntimeErrorKind::IndexOutOfRange("function", idx))?;
                Ok(module.types[func.typeidx as usize].clone())
            }
        }
    }

    /// Evaluate a constant expression. `GlobalGet` may only read imported
    /// globals, given here in import order.
    fn eval_const(&self, expr: &ConstExpr, globals: &[Address<addr::Global>]) -> Result<Value> {
        match expr {
            ConstExpr::Const(v) => Ok(*v),
            ConstExpr::GlobalGet(idx) => {
                let addr = globals
                    .get(*idx as usize)
                    .ok_or(RuntimeErrorKind::IndexOutOfRange("global", *idx))?;
                self.global(*addr)
            }
        }
    }

    fn instantiate_module(
        &mut self,
        module_name: &str,
        module: Module,
    ) -> Result<Address<addr::Module>> {
        let plan = self.plan(module_name, &module)?;

        let modaddr = self.reserve_module()?;
        let mut builder = ModuleInstanceBuilder {
            types: module.types.clone(),
            ..ModuleInstanceBuilder::default()
        };
        for ev in &plan.imports {
            builder.add_external_val(*ev);
        }
        let imported_globals = builder.globals.clone();

        for func in module.funcs {
            let ft = module.types[func.typeidx as usize].clone();
            let addr = self.add_guest_function(modaddr, ft, func.locals, func.body)?;
            builder.funcs.push(addr);
        }
        for tabletype in module.tables {
            builder.tables.push(self.add_table(tabletype)?);
        }
        for memtype in module.memories {
            builder.mems.push(self.add_memory(memtype)?);
        }
        for (global, val) in module.globals.iter().zip(plan.global_inits) {
            builder
                .globals
                .push(self.add_global(val, global.globaltype.mutable)?);
        }

        for export in &module.exports {
            let addr = match export.desc {
                ExportDesc::Func(i) => ExternalVal::Func(builder.funcs[i as usize]),
                ExportDesc::Table(i) => ExternalVal::Table(builder.tables[i as usize]),
                ExportDesc::Mem(i) => ExternalVal::Memory(builder.mems[i as usize]),
                ExportDesc::Global(i) => ExternalVal::Global(builder.globals[i as usize]),
            };
            builder.exports.push(ExportInstance {
                name: export.name.clone(),
                addr,
            });
        }

        let inst = builder.build();
        let exports = inst.exports.clone();
        self.commit_module(modaddr, inst.clone())?;

        // Check every segment before writing any of them.
        let mut elems = Vec::with_capacity(module.elems.len());
        for (i, seg) in module.elems.iter().enumerate() {
            let table = inst.table(seg.table)?;
            let offset = offset_value(self.eval_const(&seg.offset, &imported_globals)?)?;
            let funcs = seg
                .funcs
                .iter()
                .map(|f| inst.func(*f).map(Some))
                .collect::<Result<Vec<_>>>()?;
            let size = self.table(table)?.size() as u64;
            (offset as u64 + funcs.len() as u64 <= size).true_or_else(|| {
                RuntimeError::from(TrapKind::OutOfBoundsTableAccess(offset as u64, funcs.len()))
            })
            .map_err(|e| e.with_context(format!("initializing element segment {i}")))?;
            elems.push((table, offset, funcs));
        }
        let mut data = Vec::with_capacity(module.data.len());
        for (i, seg) in module.data.iter().enumerate() {
            let mem = inst.mem(seg.memory)?;
            let offset = offset_value(self.eval_const(&seg.offset, &imported_globals)?)?;
            let len = self.mem(mem)?.data().len() as u64;
            (offset as u64 + seg.bytes.len() as u64 <= len).true_or_else(|| {
                RuntimeError::from(TrapKind::OutOfBoundsMemoryAccess(
                    offset as u64,
                    seg.bytes.len(),
                ))
            })
            .map_err(|e| e.with_context(format!("initializing data segment {i}")))?;
            data.push((mem, offset, &seg.bytes));
        }
        for (table, offset, funcs) in elems {
            self.table_mut(table)?.init(offset, &funcs)?;
        }
        for (mem, offset, bytes) in data {
            self.mem_mut(mem)?.write(offset as u64, bytes)?;
        }

        if let Some(start) = module.start {
            let addr = inst.func(start)?;
            self.add_start_function(addr)?;
            self.log(Tag::Load, || format!("START {addr:?}"));
            self.invoke(addr, &[])
                .map_err(|e| e.with_context("running start function"))?;
        }

        // A start function may have re-entered the store and bound one of
        // these names since planning.
        self.bind_exports(module_name, &exports)?;
        self.log(Tag::Load, || format!("INSTANTIATED \"{module_name}\" AT {modaddr:?}"));
        Ok(modaddr)
    }
}
