use {
    super::{
        config::Config,
        error::{Result, RuntimeErrorKind},
        instance::{
            addr::{self, Address},
            CompiledCode, ExportInstance, ExternKind, ExternalVal, FunctionInstance,
            GlobalInstance, GuestFunction, HostFunction, MemInstance, ModuleInstance,
            TableInstance,
        },
        namespace::Namespace,
        values::Value,
        vector::{Addrs, GrowVec},
    },
    crate::{
        log_tag::Tag,
        syntax::{
            types::{FunctionType, MemType, TableType},
            Instruction, Locals,
        },
    },
    std::rc::Rc,
    wasmjit_common::logger::{LogLogger, Logger},
};

/// The WebAssembly Store as described in [the specification][Spec].
///
/// The store represents all global state that can be manipulated by
/// WebAssembly programs. It consists of the runtime representation of all
/// instances of functions, tables, memories, and globals, plus the module
/// instances that bind them, the namespace used to resolve imports, and the
/// start functions recorded at instantiation.
///
/// Every instance object is owned here and lives until the store is dropped.
/// Everything else refers to them by [Address]; nothing is ever freed
/// individually.
///
/// [Spec]: https://webassembly.github.io/spec/core/exec/runtime.html#store
#[derive(Debug, Default)]
pub struct Store {
    logger:     LogLogger,
    config:     Config,
    // Refcounted so a running function stays borrowed while host code
    // re-enters the store mutably.
    funcs:      GrowVec<Rc<FunctionInstance>, addr::Function>,
    tables:     GrowVec<TableInstance, addr::Table>,
    mems:       GrowVec<MemInstance, addr::Memory>,
    globals:    GrowVec<GlobalInstance, addr::Global>,
    modules:    GrowVec<ModuleInstance, addr::Module>,
    names:      Namespace,
    startfuncs: Addrs<addr::Function>,
    call_depth: usize,
}

fn invalid(kind: ExternKind, raw: u32) -> RuntimeErrorKind {
    RuntimeErrorKind::InvalidAddress(kind, raw)
}

impl Store {
    pub fn new() -> Store {
        Store::default()
    }

    pub fn with_config(config: Config) -> Store {
        Store {
            config,
            ..Store::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn namespace(&self) -> &Namespace {
        &self.names
    }

    /// Addresses of the start functions of every module instantiated so far,
    /// in instantiation order.
    pub fn start_functions(&self) -> &Addrs<addr::Function> {
        &self.startfuncs
    }

    pub fn function_count(&self) -> usize {
        self.funcs.len()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub(crate) fn log(&self, tag: Tag, msg: impl FnOnce() -> String) {
        self.logger.log(tag, msg)
    }

    // Mutators.

    pub fn add_guest_function(
        &mut self,
        module: Address<addr::Module>,
        functype: FunctionType,
        locals: impl Into<Box<[Locals]>>,
        body: impl Into<Rc<[Instruction]>>,
    ) -> Result<Address<addr::Function>> {
        if !self.modules.contains(module) {
            Err(RuntimeErrorKind::ImplementationBug(format!(
                "guest function bound to missing module {module:?}"
            )))?;
        }
        let func = GuestFunction::new(functype, module, locals.into(), body.into());
        let addr = self.funcs.push(Rc::new(FunctionInstance::Guest(func)))?;
        self.log(Tag::Alloc, || format!("GUEST FUNCTION {addr:?} IN {module:?}"));
        Ok(addr)
    }

    pub fn add_host_function<F>(
        &mut self,
        functype: FunctionType,
        callback: F,
    ) -> Result<Address<addr::Function>>
    where
        F: Fn(&mut Store, &[Value]) -> Result<Vec<Value>> + 'static,
    {
        let func = HostFunction {
            functype,
            callback: Rc::new(callback),
        };
        let addr = self.funcs.push(Rc::new(FunctionInstance::Host(func)))?;
        self.log(Tag::Alloc, || format!("HOST FUNCTION {addr:?}"));
        Ok(addr)
    }

    pub fn add_memory(&mut self, memtype: MemType) -> Result<Address<addr::Memory>> {
        let mem = MemInstance::new(memtype, self.config.max_memory_pages)?;
        let addr = self.mems.push(mem)?;
        self.log(Tag::Alloc, || format!("MEMORY {addr:?} {:?}", memtype.limits));
        Ok(addr)
    }

    pub fn add_table(&mut self, tabletype: TableType) -> Result<Address<addr::Table>> {
        let table = TableInstance::new(tabletype, self.config.max_table_length)?;
        let addr = self.tables.push(table)?;
        self.log(Tag::Alloc, || format!("TABLE {addr:?} {:?}", tabletype.limits));
        Ok(addr)
    }

    pub fn add_global(&mut self, value: Value, mutable: bool) -> Result<Address<addr::Global>> {
        let addr = self.globals.push(GlobalInstance::new(value, mutable))?;
        self.log(Tag::Alloc, || format!("GLOBAL {addr:?} {value} mut={mutable}"));
        Ok(addr)
    }

    /// Reserve an empty module instance slot; it is filled in once every
    /// entity it binds has been allocated.
    pub(crate) fn reserve_module(&mut self) -> Result<Address<addr::Module>> {
        self.modules.push(ModuleInstance::default())
    }

    pub(crate) fn commit_module(
        &mut self,
        addr: Address<addr::Module>,
        inst: ModuleInstance,
    ) -> Result<()> {
        *self
            .modules
            .get_mut(addr)
            .ok_or_else(|| crate::impl_bug!("no module at {:?}", addr))? = inst;
        Ok(())
    }

    pub(crate) fn add_start_function(&mut self, addr: Address<addr::Function>) -> Result<()> {
        self.startfuncs.push(addr)?;
        Ok(())
    }

    /// True if `ev` names a live entity of its kind in this store.
    pub fn contains(&self, ev: ExternalVal) -> bool {
        match ev {
            ExternalVal::Func(a) => self.funcs.contains(a),
            ExternalVal::Table(a) => self.tables.contains(a),
            ExternalVal::Memory(a) => self.mems.contains(a),
            ExternalVal::Global(a) => self.globals.contains(a),
        }
    }

    /// Bind `(module_name, name)` to `ev`. The address is checked against the
    /// live table of its kind before anything is recorded.
    pub fn add_to_namespace(&mut self, module_name: &str, name: &str, ev: ExternalVal) -> Result<()> {
        if !self.contains(ev) {
            Err(invalid(ev.kind(), ev.raw()))?;
        }
        self.names.insert(module_name, name, ev)?;
        self.log(Tag::Link, || format!("BIND \"{module_name}\" \"{name}\" -> {ev:?}"));
        Ok(())
    }

    /// Bind all of a module's exports, or none of them.
    pub(crate) fn bind_exports(&mut self, module_name: &str, exports: &[ExportInstance]) -> Result<()> {
        if let Some(dangling) = exports.iter().find(|e| !self.contains(e.addr)) {
            Err(invalid(dangling.addr.kind(), dangling.addr.raw()))?;
        }
        let bindings: Vec<(&str, ExternalVal)> =
            exports.iter().map(|e| (e.name.as_str(), e.addr)).collect();
        self.names.insert_all(module_name, &bindings)?;
        for (name, ev) in bindings {
            self.log(Tag::Link, || format!("BIND \"{module_name}\" \"{name}\" -> {ev:?}"));
        }
        Ok(())
    }

    fn ensure_unbound(&self, module_name: &str, name: &str) -> Result<()> {
        match self.names.resolve(module_name, name) {
            Some(_) => Err(RuntimeErrorKind::DuplicateName(
                module_name.to_owned(),
                name.to_owned(),
            ))?,
            None => Ok(()),
        }
    }

    // The import API: allocate a host-provided entity and make it resolvable
    // under `(module_name, name)`. The name is checked first, so a rejected
    // import allocates nothing.

    pub fn import_function<F>(
        &mut self,
        module_name: &str,
        name: &str,
        functype: FunctionType,
        callback: F,
    ) -> Result<Address<addr::Function>>
    where
        F: Fn(&mut Store, &[Value]) -> Result<Vec<Value>> + 'static,
    {
        self.ensure_unbound(module_name, name)?;
        let addr = self.add_host_function(functype, callback)?;
        self.add_to_namespace(module_name, name, ExternalVal::Func(addr))?;
        Ok(addr)
    }

    pub fn import_memory(
        &mut self,
        module_name: &str,
        name: &str,
        memtype: MemType,
    ) -> Result<Address<addr::Memory>> {
        self.ensure_unbound(module_name, name)?;
        let addr = self.add_memory(memtype)?;
        self.add_to_namespace(module_name, name, ExternalVal::Memory(addr))?;
        Ok(addr)
    }

    pub fn import_table(
        &mut self,
        module_name: &str,
        name: &str,
        tabletype: TableType,
    ) -> Result<Address<addr::Table>> {
        self.ensure_unbound(module_name, name)?;
        let addr = self.add_table(tabletype)?;
        self.add_to_namespace(module_name, name, ExternalVal::Table(addr))?;
        Ok(addr)
    }

    pub fn import_global(
        &mut self,
        module_name: &str,
        name: &str,
        value: Value,
        mutable: bool,
    ) -> Result<Address<addr::Global>> {
        self.ensure_unbound(module_name, name)?;
        let addr = self.add_global(value, mutable)?;
        self.add_to_namespace(module_name, name, ExternalVal::Global(addr))?;
        Ok(addr)
    }

    /// Attach backend-produced code to a guest function. Returns false if the
    /// function is a host function or already has code attached.
    pub fn set_compiled_code(
        &mut self,
        addr: Address<addr::Function>,
        code: Rc<dyn CompiledCode>,
    ) -> Result<bool> {
        Ok(match &*self.func(addr)? {
            FunctionInstance::Guest(g) => g.set_compiled(code),
            FunctionInstance::Host(_) => false,
        })
    }

    // Lookups.

    pub fn func(&self, addr: Address<addr::Function>) -> Result<Rc<FunctionInstance>> {
        Ok(self
            .funcs
            .get(addr)
            .cloned()
            .ok_or_else(|| invalid(ExternKind::Func, addr.0))?)
    }

    pub fn global(&self, addr: Address<addr::Global>) -> Result<Value> {
        Ok(self.global_inst(addr)?.get())
    }

    pub fn global_inst(&self, addr: Address<addr::Global>) -> Result<&GlobalInstance> {
        Ok(self
            .globals
            .get(addr)
            .ok_or_else(|| invalid(ExternKind::Global, addr.0))?)
    }

    pub fn set_global(&mut self, addr: Address<addr::Global>, val: Value) -> Result<()> {
        self.globals
            .get_mut(addr)
            .ok_or_else(|| invalid(ExternKind::Global, addr.0))?
            .set(val)
            .map_err(|e| e.with_context(format!("writing {addr:?}")))
    }

    pub fn mem(&self, addr: Address<addr::Memory>) -> Result<&MemInstance> {
        Ok(self
            .mems
            .get(addr)
            .ok_or_else(|| invalid(ExternKind::Memory, addr.0))?)
    }

    pub fn mem_mut(&mut self, addr: Address<addr::Memory>) -> Result<&mut MemInstance> {
        Ok(self
            .mems
            .get_mut(addr)
            .ok_or_else(|| invalid(ExternKind::Memory, addr.0))?)
    }

    pub fn table(&self, addr: Address<addr::Table>) -> Result<&TableInstance> {
        Ok(self
            .tables
            .get(addr)
            .ok_or_else(|| invalid(ExternKind::Table, addr.0))?)
    }

    pub fn table_mut(&mut self, addr: Address<addr::Table>) -> Result<&mut TableInstance> {
        Ok(self
            .tables
            .get_mut(addr)
            .ok_or_else(|| invalid(ExternKind::Table, addr.0))?)
    }

    pub fn module(&self, addr: Address<addr::Module>) -> Result<&ModuleInstance> {
        Ok(self
            .modules
            .get(addr)
            .ok_or_else(|| crate::impl_bug!("no module at {:?}", addr))?)
    }

    /// Grow a memory by `pgs` pages. `Ok(None)` means the growth was rejected
    /// and the memory is unchanged.
    pub fn grow_mem(&mut self, addr: Address<addr::Memory>, pgs: u32) -> Result<Option<u32>> {
        Ok(self.mem_mut(addr)?.grow(pgs))
    }

    pub fn grow_table(
        &mut self,
        addr: Address<addr::Table>,
        elems: u32,
        val: Option<Address<addr::Function>>,
    ) -> Result<Option<u32>> {
        if let Some(f) = val {
            if !self.funcs.contains(f) {
                Err(invalid(ExternKind::Func, f.0))?;
            }
        }
        let grown = self.table_mut(addr)?.grow(elems, val);
        self.log(Tag::Mem, || match grown {
            Some(old) => format!("GROW {addr:?} {old} + {elems}"),
            None => format!("REJECT GROW {addr:?} + {elems}"),
        });
        Ok(grown)
    }

    pub fn resolve(&self, module_name: &str, name: &str) -> Option<ExternalVal> {
        self.names.resolve(module_name, name)
    }

    /// Look up a function by name in the namespace.
    pub fn resolve_func(&self, module_name: &str, name: &str) -> Result<Address<addr::Function>> {
        match self.resolve(module_name, name) {
            Some(ExternalVal::Func(addr)) => Ok(addr),
            Some(other) => Err(RuntimeErrorKind::ImportKindMismatch {
                module:   module_name.to_owned(),
                name:     name.to_owned(),
                expected: ExternKind::Func,
                found:    other.kind(),
            })?,
            None => Err(RuntimeErrorKind::ImportNotFound(
                module_name.to_owned(),
                name.to_owned(),
            ))?,
        }
    }

    // Call depth, counted across host re-entrancy.

    pub(crate) fn enter_call(&mut self) -> Result<()> {
        if self.call_depth >= self.config.max_call_depth {
            Err(super::error::TrapKind::CallStackExhausted(self.call_depth))?;
        }
        self.call_depth += 1;
        Ok(())
    }

    pub(crate) fn leave_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    pub fn call_depth(&self) -> usize {
        self.call_depth
    }
}
