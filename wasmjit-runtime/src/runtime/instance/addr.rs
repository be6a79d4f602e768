use {
    std::{fmt, hash::Hash, marker::PhantomData},
    wasmjit_common::marker,
};

/// Function instances, table instances, memory instances, global instances and
/// module instances in the store are referenced with abstract addresses. These
/// are simply indices into the respective store table, never pointers, so a
/// table may relocate its backing storage while it grows without invalidating
/// any address handed out earlier. [Spec][Spec]
///
/// This is a type-safe wrapper around a u32 to use for addressing in the
/// runtime.
///
/// [Spec]: https://webassembly.github.io/spec/core/exec/runtime.html#addresses
pub struct Address<T: AddressType>(pub u32, PhantomData<T>);

impl<T: AddressType> Address<T> {
    /// The reserved sentinel that no table ever issues.
    pub const INVALID: Self = Address(u32::MAX, PhantomData);

    pub const fn new(value: u32) -> Self {
        Self(value, PhantomData)
    }

    pub fn is_valid(&self) -> bool {
        self.0 != u32::MAX
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

// Manual impls, so the marker type does not need to satisfy the bounds.
impl<T: AddressType> Clone for Address<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: AddressType> Copy for Address<T> {}
impl<T: AddressType> PartialEq for Address<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl<T: AddressType> Eq for Address<T> {}
impl<T: AddressType> PartialOrd for Address<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T: AddressType> Ord for Address<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}
impl<T: AddressType> Hash for Address<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl<T: AddressType> fmt::Debug for Address<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.is_valid() {
            true => write!(f, "{}@{}", T::NAME, self.0),
            false => write!(f, "{}@invalid", T::NAME),
        }
    }
}

impl<A: AddressType> From<u32> for Address<A> {
    fn from(value: u32) -> Self {
        Address::new(value)
    }
}

/// A marker trait for making addresses type-safe.
pub trait AddressType: Copy + fmt::Debug {
    const NAME: &'static str;
}

marker!(Function: AddressType);
marker!(Table: AddressType);
marker!(Memory: AddressType);
marker!(Global: AddressType);
marker!(Module: AddressType);
marker!(
    /// Entries in the import/export namespace.
    Name: AddressType
);
marker!(
    /// Positions in a plain list of addresses, such as a module's bindings.
    Slot: AddressType
);

/// A contiguous, half-open range of [`Address`].
///
/// Note: It is possible to remove this and use
/// [`std::ops::Range<Address<T>>`] if the step trait unstable feature is
/// enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressRange<A: AddressType> {
    pub start: Address<A>,
    pub end:   Address<A>,
}

impl<A: AddressType> AddressRange<A> {
    pub fn new(start: impl Into<Address<A>>, end: impl Into<Address<A>>) -> Self {
        AddressRange {
            start: start.into(),
            end:   end.into(),
        }
    }

    pub fn len(&self) -> usize {
        (self.end.0 - self.start.0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, addr: Address<A>) -> bool {
        self.start <= addr && addr < self.end
    }
}

impl<A: AddressType> IntoIterator for AddressRange<A> {
    type IntoIter = AddressRangeIntoIter<A>;
    type Item = Address<A>;

    fn into_iter(self) -> Self::IntoIter {
        AddressRangeIntoIter {
            cur: self.start,
            end: self.end,
        }
    }
}

pub struct AddressRangeIntoIter<A: AddressType> {
    cur: Address<A>,
    end: Address<A>,
}

impl<A: AddressType> Iterator for AddressRangeIntoIter<A> {
    type Item = Address<A>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur >= self.end {
            None
        } else {
            let out = self.cur;
            self.cur.0 += 1;
            Some(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_half_open() {
        let range: AddressRange<Function> = AddressRange::new(3, 8);
        let addrs: Vec<u32> = range.into_iter().map(|a| a.0).collect();
        assert_eq!(addrs, vec![3, 4, 5, 6, 7]);
        assert_eq!(range.len(), 5);
        assert!(range.contains(Address::new(7)));
        assert!(!range.contains(Address::new(8)));
    }

    #[test]
    fn sentinel_is_never_valid() {
        assert!(!Address::<Memory>::INVALID.is_valid());
        assert!(Address::<Memory>::new(0).is_valid());
        assert_eq!(format!("{:?}", Address::<Global>::new(2)), "Global@2");
    }
}
