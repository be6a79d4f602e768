use {
    crate::{
        log_tag::Tag,
        runtime::error::{Result, RuntimeErrorKind, TrapKind},
        syntax::types::MemType,
    },
    std::ops::Range,
    wasmjit_common::logger::{LogLogger, Logger},
};

/// The WebAssembly page size, 64KiB.
pub const PAGE_SIZE: usize = 65536;

/// A memory instance is the runtime representation of a linear memory.
/// [Spec][Spec]
///
/// It records its type and holds a vector of bytes.
///
/// The length of the vector always is exactly the current page count times the
/// page size. It is an invariant that the page count never exceeds the
/// maximum of the memory type, if present, nor the store's configured cap.
///
/// [Spec]: https://webassembly.github.io/spec/core/exec/runtime.html#memory-instances
#[derive(Debug)]
pub struct MemInstance {
    logger:      LogLogger,
    /// The declared type. `limits.lower` tracks the current size.
    pub memtype: MemType,
    page_cap:    u32,
    data:        Vec<u8>,
}

fn alloc_zeroed(bytes: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(bytes)
        .map_err(|e| RuntimeErrorKind::AllocationFailure(format!("memory of {bytes} bytes: {e}")))?;
    data.resize(bytes, 0);
    Ok(data)
}

impl MemInstance {
    /// Create a new [MemInstance] of `memtype.limits.lower` zeroed pages.
    ///
    /// `page_cap` is a hard ceiling applied on top of the declared maximum.
    pub fn new(memtype: MemType, page_cap: u32) -> Result<MemInstance> {
        let limits = memtype.limits;
        if !limits.is_consistent() {
            Err(RuntimeErrorKind::LimitsExceeded(format!(
                "memory initial size {} exceeds its maximum {:?}",
                limits.lower, limits.upper
            )))?;
        }
        if limits.lower > page_cap {
            Err(RuntimeErrorKind::LimitsExceeded(format!(
                "memory of {} pages exceeds the limit of {page_cap} pages",
                limits.lower
            )))?;
        }
        let data = alloc_zeroed(limits.lower as usize * PAGE_SIZE)?;
        Ok(MemInstance {
            logger: LogLogger,
            memtype,
            page_cap,
            data,
        })
    }

    /// The current size, in pages.
    pub fn size(&self) -> u32 {
        (self.data.len() / PAGE_SIZE) as u32
    }

    pub fn max_pages(&self) -> u32 {
        self.memtype
            .limits
            .upper
            .map_or(self.page_cap, |upper| upper.min(self.page_cap))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Grow by `pgs` pages, returning the previous size in pages.
    ///
    /// A rejected growth returns `None` and leaves the memory untouched, no
    /// matter how often it is attempted.
    pub fn grow(&mut self, pgs: u32) -> Option<u32> {
        let old_size = self.size();
        let new_size = old_size.checked_add(pgs)?;
        if new_size > self.max_pages() {
            self.logger.log(Tag::Mem, || {
                format!("REJECT GROW {old_size} + {pgs} > {}", self.max_pages())
            });
            return None;
        }

        let new_len = new_size as usize * PAGE_SIZE;
        self.data.try_reserve_exact(new_len - self.data.len()).ok()?;
        self.data.resize(new_len, 0);
        self.memtype.limits.lower = new_size;
        self.logger
            .log(Tag::Mem, || format!("GROW {old_size} -> {new_size}"));
        Some(old_size)
    }

    fn offset(&self, base: u64, n: usize) -> Result<Range<usize>> {
        match base.checked_add(n as u64) {
            Some(end) if end <= self.data.len() as u64 => Ok(base as usize..end as usize),
            _ => Err(TrapKind::OutOfBoundsMemoryAccess(base, n).into()),
        }
    }

    pub fn read(&self, base: u64, n: usize) -> Result<&[u8]> {
        let range = self.offset(base, n)?;
        Ok(&self.data[range])
    }

    pub fn write(&mut self, base: u64, bs: &[u8]) -> Result<()> {
        let range = self.offset(base, bs.len())?;
        self.data[range].copy_from_slice(bs);
        Ok(())
    }

    pub fn load<const N: usize>(&self, base: u64) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(base, N)?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_tracks_pages() -> Result<()> {
        let mut mem = MemInstance::new(MemType::new(1, Some(3)), 65536)?;
        assert_eq!(mem.data().len(), PAGE_SIZE);
        assert_eq!(mem.grow(2), Some(1));
        assert_eq!(mem.size(), 3);
        assert_eq!(mem.data().len(), 3 * PAGE_SIZE);
        assert_eq!(mem.memtype.limits.lower, 3);
        Ok(())
    }

    #[test]
    fn rejected_growth_is_idempotent() -> Result<()> {
        let mut mem = MemInstance::new(MemType::new(1, Some(2)), 65536)?;
        for _ in 0..3 {
            assert_eq!(mem.grow(2), None);
            assert_eq!(mem.size(), 1);
            assert_eq!(mem.data().len(), PAGE_SIZE);
        }
        assert_eq!(mem.grow(1), Some(1));
        assert_eq!(mem.grow(1), None);
        Ok(())
    }

    #[test]
    fn cap_applies_without_declared_maximum() -> Result<()> {
        let mut mem = MemInstance::new(MemType::new(0, None), 2)?;
        assert_eq!(mem.grow(3), None);
        assert_eq!(mem.grow(2), Some(0));
        assert!(MemInstance::new(MemType::new(3, None), 2).is_err());
        Ok(())
    }

    #[test]
    fn initial_above_maximum_fails() {
        let err = MemInstance::new(MemType::new(2, Some(1)), 65536).unwrap_err();
        assert!(matches!(err.kind, RuntimeErrorKind::LimitsExceeded(_)));
    }

    #[test]
    fn bounds_are_checked() -> Result<()> {
        let mut mem = MemInstance::new(MemType::new(1, None), 65536)?;
        mem.write(PAGE_SIZE as u64 - 4, &[1, 2, 3, 4])?;
        assert_eq!(mem.load::<4>(PAGE_SIZE as u64 - 4)?, [1, 2, 3, 4]);
        let err = mem.read(PAGE_SIZE as u64 - 3, 4).unwrap_err();
        assert_eq!(
            err.as_trap_error(),
            Some(&TrapKind::OutOfBoundsMemoryAccess(PAGE_SIZE as u64 - 3, 4))
        );
        assert!(mem.read(u64::MAX, 1).is_err());
        Ok(())
    }
}
