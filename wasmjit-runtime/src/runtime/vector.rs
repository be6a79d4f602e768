//! The growable table discipline shared by every address space in the store.
//!
//! One generic container serves functions, tables, memories, globals, module
//! instances, namespace entries, and plain address lists. Elements are reached
//! only by [Address]; references into the backing storage must not be held
//! across a growth, which may relocate it.

use {
    super::{
        error::{Result, RuntimeErrorKind},
        instance::addr::{Address, AddressRange, AddressType, Slot},
    },
    std::marker::PhantomData,
};

/// A list of addresses of kind `K`, itself indexed by [Slot].
pub type Addrs<K> = GrowVec<Address<K>, Slot>;

#[derive(Debug)]
pub struct GrowVec<T, A: AddressType> {
    elts: Vec<T>,
    kind: PhantomData<A>,
}

impl<T, A: AddressType> Default for GrowVec<T, A> {
    fn default() -> Self {
        GrowVec {
            elts: Vec::new(),
            kind: PhantomData,
        }
    }
}

impl<T: Clone, A: AddressType> Clone for GrowVec<T, A> {
    fn clone(&self) -> Self {
        GrowVec {
            elts: self.elts.clone(),
            kind: PhantomData,
        }
    }
}

impl<T, A: AddressType> GrowVec<T, A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elts.is_empty()
    }

    pub fn contains(&self, addr: Address<A>) -> bool {
        addr.is_valid() && addr.index() < self.elts.len()
    }

    pub fn get(&self, addr: Address<A>) -> Option<&T> {
        self.elts.get(addr.index())
    }

    pub fn get_mut(&mut self, addr: Address<A>) -> Option<&mut T> {
        self.elts.get_mut(addr.index())
    }

    /// Positional access, for lists indexed by a module-local index.
    pub fn at(&self, idx: u32) -> Option<&T> {
        self.elts.get(idx as usize)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elts.iter()
    }

    /// Every address currently issued by this table.
    pub fn addresses(&self) -> AddressRange<A> {
        AddressRange::new(0, self.elts.len() as u32)
    }

    /// Make room for `n` more elements, or fail without changing the table.
    ///
    /// The sentinel [Address::INVALID] is never issued, so the last usable
    /// index is `u32::MAX - 1`.
    fn reserve(&mut self, n: usize) -> Result<u32> {
        let base = self.elts.len();
        base.checked_add(n)
            .filter(|end| *end <= u32::MAX as usize)
            .ok_or_else(|| {
                RuntimeErrorKind::AllocationFailure(format!(
                    "{} address space exhausted ({base} + {n})",
                    A::NAME
                ))
            })?;
        // try_reserve grows geometrically, keeping appends amortized O(1).
        self.elts.try_reserve(n).map_err(|e| {
            RuntimeErrorKind::AllocationFailure(format!("{} table: {e}", A::NAME))
        })?;
        Ok(base as u32)
    }

    pub fn push(&mut self, item: T) -> Result<Address<A>> {
        let addr = self.reserve(1)?;
        self.elts.push(item);
        Ok(Address::new(addr))
    }

    /// Append every item, returning the contiguous range they were placed at.
    ///
    /// Items are collected first, so an allocation failure leaves the table
    /// exactly as it was.
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) -> Result<AddressRange<A>> {
        let items: Vec<T> = items.into_iter().collect();
        let base = self.reserve(items.len())?;
        self.elts.extend(items);
        Ok(AddressRange::new(base, self.elts.len() as u32))
    }
}

impl<T: Default, A: AddressType> GrowVec<T, A> {
    /// Append `n` default slots. The returned range starts at the table's
    /// previous length.
    pub fn grow(&mut self, n: usize) -> Result<AddressRange<A>> {
        let base = self.reserve(n)?;
        self.elts.resize_with(base as usize + n, T::default);
        Ok(AddressRange::new(base, base + n as u32))
    }
}

impl<'a, T, A: AddressType> IntoIterator for &'a GrowVec<T, A> {
    type IntoIter = std::slice::Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.elts.iter()
    }
}

impl<K: AddressType> FromIterator<Address<K>> for Addrs<K> {
    fn from_iter<I: IntoIterator<Item = Address<K>>>(iter: I) -> Self {
        GrowVec {
            elts: iter.into_iter().collect(),
            kind: PhantomData,
        }
    }
}
