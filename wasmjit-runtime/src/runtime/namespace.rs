//! The name-keyed table used to resolve imports.

use {
    super::{
        error::{Result, RuntimeErrorKind},
        instance::{
            addr::{self, Address},
            ExternalVal,
        },
        vector::GrowVec,
    },
    hashbrown::HashMap,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceEntry {
    pub module_name: String,
    pub name:        String,
    pub addr:        ExternalVal,
}

/// Every `(module name, name)` binding registered in a store, through the
/// import API or as the export of an instantiated module.
///
/// A pair is bound at most once. Binding it again to the identical external
/// value is accepted and changes nothing, which is what re-exporting an
/// import under its original name does; binding it to anything else fails.
#[derive(Debug, Default)]
pub struct Namespace {
    entries: GrowVec<NamespaceEntry, addr::Name>,
    index:   HashMap<String, HashMap<String, Address<addr::Name>>>,
}

impl Namespace {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &NamespaceEntry> {
        self.entries.iter()
    }

    pub fn resolve(&self, module_name: &str, name: &str) -> Option<ExternalVal> {
        let addr = self.index.get(module_name)?.get(name)?;
        self.entries.get(*addr).map(|e| e.addr)
    }

    /// Whether binding the pair to `addr` would be accepted. Returns
    /// `Ok(false)` when the identical binding already exists.
    pub fn check_insert(&self, module_name: &str, name: &str, addr: ExternalVal) -> Result<bool> {
        match self.resolve(module_name, name) {
            None => Ok(true),
            Some(existing) if existing == addr => Ok(false),
            Some(_) => Err(
                RuntimeErrorKind::DuplicateName(module_name.to_owned(), name.to_owned()).into(),
            ),
        }
    }

    /// Bind the pair. The caller is responsible for `addr` being a live
    /// address of its kind.
    pub fn insert(&mut self, module_name: &str, name: &str, addr: ExternalVal) -> Result<()> {
        if !self.check_insert(module_name, name, addr)? {
            return Ok(());
        }
        let entry = self.entries.push(NamespaceEntry {
            module_name: module_name.to_owned(),
            name: name.to_owned(),
            addr,
        })?;
        self.index
            .entry(module_name.to_owned())
            .or_default()
            .insert(name.to_owned(), entry);
        Ok(())
    }

    /// Bind every pair under `module_name`, or none of them. All bindings are
    /// checked as by [Namespace::check_insert] before any is recorded.
    pub fn insert_all(&mut self, module_name: &str, bindings: &[(&str, ExternalVal)]) -> Result<()> {
        let mut fresh = Vec::with_capacity(bindings.len());
        for (name, addr) in bindings {
            if self.check_insert(module_name, name, *addr)? {
                fresh.push(NamespaceEntry {
                    module_name: module_name.to_owned(),
                    name:        (*name).to_owned(),
                    addr:        *addr,
                });
            }
        }
        let names: Vec<String> = fresh.iter().map(|e| e.name.clone()).collect();
        let entries = self.entries.extend(fresh)?;
        let index = self.index.entry(module_name.to_owned()).or_default();
        for (name, entry) in names.into_iter().zip(entries) {
            index.insert(name, entry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pair_lookup() -> Result<()> {
        let mut ns = Namespace::default();
        ns.insert("env", "f", ExternalVal::Func(Address::new(0)))?;
        ns.insert("env", "m", ExternalVal::Memory(Address::new(0)))?;
        assert_eq!(
            ns.resolve("env", "f"),
            Some(ExternalVal::Func(Address::new(0)))
        );
        assert_eq!(ns.resolve("env", "g"), None);
        assert_eq!(ns.resolve("other", "f"), None);
        Ok(())
    }

    #[test]
    fn identical_rebinding_is_a_no_op() -> Result<()> {
        let mut ns = Namespace::default();
        let f = ExternalVal::Func(Address::new(3));
        ns.insert("a", "f", f)?;
        ns.insert("a", "f", f)?;
        assert_eq!(ns.len(), 1);
        let entry = ns.entries().next().unwrap();
        assert_eq!((entry.module_name.as_str(), entry.name.as_str()), ("a", "f"));
        assert_eq!(entry.addr, f);
        Ok(())
    }

    #[test]
    fn insert_all_binds_nothing_on_conflict() -> Result<()> {
        let mut ns = Namespace::default();
        let taken = ExternalVal::Global(Address::new(0));
        ns.insert("m", "b", taken)?;
        let err = ns
            .insert_all("m", &[
                ("a", ExternalVal::Memory(Address::new(0))),
                ("b", ExternalVal::Global(Address::new(1))),
            ])
            .unwrap_err();
        assert!(matches!(err.kind, RuntimeErrorKind::DuplicateName(..)));
        assert_eq!(ns.resolve("m", "a"), None);
        assert_eq!(ns.len(), 1);

        ns.insert_all("m", &[("a", ExternalVal::Memory(Address::new(0))), ("b", taken)])?;
        assert_eq!(ns.resolve("m", "a"), Some(ExternalVal::Memory(Address::new(0))));
        assert_eq!(ns.len(), 2);
        Ok(())
    }

    #[test]
    fn conflicting_rebinding_keeps_first() -> Result<()> {
        let mut ns = Namespace::default();
        ns.insert("a", "x", ExternalVal::Func(Address::new(3)))?;
        let err = ns
            .insert("a", "x", ExternalVal::Global(Address::new(3)))
            .unwrap_err();
        assert!(err.is_linkage_error());
        assert_eq!(
            ns.resolve("a", "x"),
            Some(ExternalVal::Func(Address::new(3)))
        );
        Ok(())
    }
}
