//! Import matching. A candidate found in the namespace is compatible with an
//! import declaration when its kind agrees and its type is a subtype of the
//! declared one: function signatures must be identical, tables and memories
//! must have limits at least as strict (judged against their *current* size),
//! and globals must agree on both value type and mutability.

use {
    super::{
        error::{Result, RuntimeErrorKind},
        instance::{
            ExternType, ExternalVal, FunctionInstance, GlobalInstance, MemInstance, TableInstance,
        },
        store::Store,
    },
    crate::{
        log_tag::Tag,
        runtime::instance::ExternKind,
        syntax::{
            types::{FunctionType, GlobalType, Limits, MemType, TableType, ValueType},
            Import, ImportDesc,
        },
    },
};

pub fn typelist_equal(a: &[ValueType], b: &[ValueType]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

pub fn typecheck_func(expected: &FunctionType, candidate: &FunctionInstance) -> bool {
    let actual = candidate.functype();
    typelist_equal(&expected.params, &actual.params)
        && typelist_equal(&expected.result, &actual.result)
}

fn current_limits(size: u32, upper: Option<u32>) -> Limits {
    Limits::new(size, upper)
}

pub fn typecheck_table(expected: &TableType, candidate: &TableInstance) -> bool {
    let actual = current_limits(candidate.size(), candidate.tabletype.limits.upper);
    candidate.tabletype.elemtype == expected.elemtype && actual.works_as(&expected.limits)
}

pub fn typecheck_memory(expected: &MemType, candidate: &MemInstance) -> bool {
    let actual = current_limits(candidate.size(), candidate.memtype.limits.upper);
    actual.works_as(&expected.limits)
}

pub fn typecheck_global(expected: &GlobalType, candidate: &GlobalInstance) -> bool {
    candidate.globaltype() == *expected
}

fn desc_kind(desc: &ImportDesc) -> ExternKind {
    match desc {
        ImportDesc::Func(_) => ExternKind::Func,
        ImportDesc::Table(_) => ExternKind::Table,
        ImportDesc::Mem(_) => ExternKind::Memory,
        ImportDesc::Global(_) => ExternKind::Global,
    }
}

impl Store {
    /// The type of the entity at `ev`, as it would be matched by an import.
    pub fn extern_type(&self, ev: ExternalVal) -> Result<ExternType> {
        Ok(match ev {
            ExternalVal::Func(a) => ExternType::Func(self.func(a)?.functype().clone()),
            ExternalVal::Table(a) => {
                let table = self.table(a)?;
                ExternType::Table(TableType {
                    limits:   current_limits(table.size(), table.tabletype.limits.upper),
                    elemtype: table.tabletype.elemtype,
                })
            }
            ExternalVal::Memory(a) => {
                let mem = self.mem(a)?;
                ExternType::Memory(MemType {
                    limits: current_limits(mem.size(), mem.memtype.limits.upper),
                })
            }
            ExternalVal::Global(a) => ExternType::Global(self.global_inst(a)?.globaltype()),
        })
    }

    /// Check `candidate` against `import`. `types` is the importing module's
    /// type section, used to look up a function import's signature.
    pub fn check_import(
        &self,
        import: &Import,
        types: &[FunctionType],
        candidate: ExternalVal,
    ) -> Result<()> {
        let (expected, matches) = match (&import.desc, candidate) {
            (ImportDesc::Func(typeidx), ExternalVal::Func(a)) => {
                let ft = types
                    .get(*typeidx as usize)
                    .ok_or(RuntimeErrorKind::TypeNotFound(*typeidx))?;
                (ExternType::Func(ft.clone()), typecheck_func(ft, &*self.func(a)?))
            }
            (ImportDesc::Table(tt), ExternalVal::Table(a)) => {
                (ExternType::Table(*tt), typecheck_table(tt, self.table(a)?))
            }
            (ImportDesc::Mem(mt), ExternalVal::Memory(a)) => {
                (ExternType::Memory(*mt), typecheck_memory(mt, self.mem(a)?))
            }
            (ImportDesc::Global(gt), ExternalVal::Global(a)) => {
                (ExternType::Global(*gt), typecheck_global(gt, self.global_inst(a)?))
            }
            (desc, found) => Err(RuntimeErrorKind::ImportKindMismatch {
                module:   import.module.clone(),
                name:     import.name.clone(),
                expected: desc_kind(desc),
                found:    found.kind(),
            })?,
        };
        if !matches {
            let found = self.extern_type(candidate)?;
            Err(RuntimeErrorKind::ImportTypeMismatch {
                module: import.module.clone(),
                name: import.name.clone(),
                expected,
                found,
            })?;
        }
        Ok(())
    }

    /// Look up `import` in the namespace and check it.
    pub fn resolve_import(&self, import: &Import, types: &[FunctionType]) -> Result<ExternalVal> {
        let candidate = self
            .resolve(&import.module, &import.name)
            .ok_or_else(|| {
                RuntimeErrorKind::ImportNotFound(import.module.clone(), import.name.clone())
            })?;
        self.check_import(import, types, candidate)?;
        self.log(Tag::Link, || format!("RESOLVE {import} -> {candidate:?}"));
        Ok(candidate)
    }
}
