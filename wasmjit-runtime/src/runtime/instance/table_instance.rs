use {
    super::addr::{self, Address},
    crate::{
        runtime::error::{Result, RuntimeErrorKind, TrapKind},
        syntax::types::TableType,
    },
};

/// A function reference stored in a table. `None` is the null reference.
pub type FuncRef = Option<Address<addr::Function>>;

/// A table instance is the runtime representation of a table. [Spec][Spec]
///
/// It records its type and holds a vector of nullable function references.
///
/// Table elements can be mutated through the execution of an active element
/// segment, or by external means provided by the embedder. It is an invariant
/// that the length of the element vector never exceeds the maximum size of the
/// table type, if present.
///
/// [Spec]: https://webassembly.github.io/spec/core/exec/runtime.html#table-instances
#[derive(Debug, Clone)]
pub struct TableInstance {
    /// The declared type. `limits.lower` tracks the current length.
    pub tabletype: TableType,
    length_cap:    u32,
    elem:          Vec<FuncRef>,
}

impl TableInstance {
    pub fn new(tabletype: TableType, length_cap: u32) -> Result<TableInstance> {
        let limits = tabletype.limits;
        if !limits.is_consistent() || limits.lower > length_cap {
            Err(RuntimeErrorKind::LimitsExceeded(format!(
                "table of {} elements (maximum {:?}, limit {length_cap})",
                limits.lower, limits.upper
            )))?;
        }
        let mut elem = Vec::new();
        elem.try_reserve_exact(limits.lower as usize).map_err(|e| {
            RuntimeErrorKind::AllocationFailure(format!("table of {} elements: {e}", limits.lower))
        })?;
        elem.resize(limits.lower as usize, None);
        Ok(TableInstance {
            tabletype,
            length_cap,
            elem,
        })
    }

    pub fn size(&self) -> u32 {
        self.elem.len() as u32
    }

    pub fn max_length(&self) -> u32 {
        self.tabletype
            .limits
            .upper
            .map_or(self.length_cap, |upper| upper.min(self.length_cap))
    }

    pub fn elements(&self) -> &[FuncRef] {
        &self.elem
    }

    pub fn get(&self, i: u32) -> Result<FuncRef> {
        self.elem
            .get(i as usize)
            .copied()
            .ok_or_else(|| TrapKind::OutOfBoundsTableAccess(i as u64, 1).into())
    }

    pub fn set(&mut self, i: u32, val: FuncRef) -> Result<()> {
        *self
            .elem
            .get_mut(i as usize)
            .ok_or(TrapKind::OutOfBoundsTableAccess(i as u64, 1))? = val;
        Ok(())
    }

    /// Grow by `amt` elements initialised to `val`, returning the old length.
    /// A rejected growth leaves the table untouched.
    pub fn grow(&mut self, amt: u32, val: FuncRef) -> Option<u32> {
        let oldsize = self.size();
        let newsize = oldsize.checked_add(amt)?;
        if newsize > self.max_length() {
            return None;
        }
        self.elem.try_reserve_exact(amt as usize).ok()?;
        self.elem.resize(newsize as usize, val);
        self.tabletype.limits.lower = newsize;
        Some(oldsize)
    }

    /// Write `vals` starting at `i`. Either every element is written or, if
    /// the range does not fit, none is.
    pub fn init(&mut self, i: u32, vals: &[FuncRef]) -> Result<()> {
        let start = i as usize;
        self.elem
            .get_mut(start..start + vals.len())
            .ok_or(TrapKind::OutOfBoundsTableAccess(i as u64, vals.len()))?
            .copy_from_slice(vals);
        Ok(())
    }

    pub fn fill(&mut self, n: usize, val: FuncRef, i: usize) -> Result<()> {
        self.elem
            .get_mut(i..i + n)
            .ok_or(TrapKind::OutOfBoundsTableAccess(i as u64, n))?
            .fill(val);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_null() -> Result<()> {
        let table = TableInstance::new(TableType::new(3, None), 100)?;
        assert_eq!(table.size(), 3);
        assert!(table.elements().iter().all(Option::is_none));
        assert_eq!(
            table.get(3).unwrap_err().as_trap_error(),
            Some(&TrapKind::OutOfBoundsTableAccess(3, 1))
        );
        Ok(())
    }

    #[test]
    fn growth_respects_maximum() -> Result<()> {
        let mut table = TableInstance::new(TableType::new(1, Some(4)), 100)?;
        let f = Some(Address::new(9));
        assert_eq!(table.grow(4, f), None);
        assert_eq!(table.size(), 1);
        assert_eq!(table.grow(3, f), Some(1));
        assert_eq!(table.get(3)?, f);
        assert_eq!(table.tabletype.limits.lower, 4);
        Ok(())
    }

    #[test]
    fn init_is_all_or_nothing() -> Result<()> {
        let mut table = TableInstance::new(TableType::new(2, None), 100)?;
        let refs = [Some(Address::new(1)), Some(Address::new(2))];
        assert!(table.init(1, &refs).is_err());
        assert_eq!(table.get(1)?, None);
        table.init(0, &refs)?;
        assert_eq!(table.get(1)?, Some(Address::new(2)));
        table.fill(2, None, 0)?;
        assert_eq!(table.get(0)?, None);
        Ok(())
    }

    #[test]
    fn length_above_maximum_fails() {
        assert!(TableInstance::new(TableType::new(5, Some(4)), 100).is_err());
        assert!(TableInstance::new(TableType::new(101, None), 100).is_err());
    }
}
