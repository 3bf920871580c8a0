//! Amortized-doubling byte store reused across request cycles.
//!
//! # Design
//! The buffer owns a fully initialised `Vec<u8>` whose length *is* the
//! capacity, plus a separate `len` marking how much of it holds meaningful
//! data. Reads land directly in the spare tail (`spare_mut` / `commit`), so
//! no bytes are copied between the socket and the parse window.
//!
//! Growth goes through a `BufferAllocator` so tests can make it fail. A
//! failed growth leaves both the storage and `len` untouched.
//!
//! Callers must never keep raw addresses into the buffer across a call that
//! can grow it: the backing store may move. The protocol engine only stores
//! offsets and turns them into slices after the last growth.

use tracing::trace;

/// Floor capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 2048;

/// Growth could not be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("failed to grow buffer to {requested} bytes")]
pub struct AllocFailure {
    pub requested: usize,
}

/// Strategy for reserving backing storage.
pub trait BufferAllocator: Send {
    /// Reserve room for at least `additional` more elements in `storage`.
    fn reserve(&mut self, storage: &mut Vec<u8>, additional: usize) -> Result<(), AllocFailure>;
}

/// Reserves through the global allocator without aborting on exhaustion.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl BufferAllocator for SystemAllocator {
    fn reserve(&mut self, storage: &mut Vec<u8>, additional: usize) -> Result<(), AllocFailure> {
        storage.try_reserve_exact(additional).map_err(|_| AllocFailure {
            requested: storage.len().saturating_add(additional),
        })
    }
}

pub struct GrowableBuffer {
    storage: Vec<u8>,
    len: usize,
    floor: usize,
    allocator: Box<dyn BufferAllocator>,
}

impl std::fmt::Debug for GrowableBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrowableBuffer")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("floor", &self.floor)
            .finish()
    }
}

impl Default for GrowableBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl GrowableBuffer {
    /// Create an empty buffer. Storage is allocated on first use, starting
    /// at `floor` bytes.
    pub fn new(floor: usize) -> Self {
        Self::with_allocator(floor, Box::new(SystemAllocator))
    }

    pub fn with_allocator(floor: usize, allocator: Box<dyn BufferAllocator>) -> Self {
        Self {
            storage: Vec::new(),
            len: 0,
            floor: floor.max(1),
            allocator,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Meaningful bytes, `[0, len)`.
    pub fn as_slice(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Base address of the backing store. Only stable until the next growth.
    pub fn as_ptr(&self) -> *const u8 {
        self.storage.as_ptr()
    }

    /// Forget the contents but keep the allocation.
    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Drop meaningful bytes past `len`. No-op if `len` is not smaller.
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /// Grow, by doubling from the current capacity (or the floor), until at
    /// least `needed` bytes fit. Never shrinks.
    pub fn ensure_capacity(&mut self, needed: usize) -> Result<(), AllocFailure> {
        let current = self.capacity();
        if needed <= current {
            return Ok(());
        }

        let new_capacity = next_capacity(current, self.floor, needed)
            .ok_or(AllocFailure { requested: needed })?;
        self.allocator
            .reserve(&mut self.storage, new_capacity - current)?;
        self.storage.resize(new_capacity, 0);
        trace!(old = current, new = new_capacity, "buffer grown");
        Ok(())
    }

    /// Append `bytes` after the meaningful data, growing first if needed.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), AllocFailure> {
        let end = self
            .len
            .checked_add(bytes.len())
            .ok_or(AllocFailure { requested: usize::MAX })?;
        self.ensure_capacity(end)?;
        self.storage[self.len..end].copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }

    /// Writable tail of at least `min_spare` bytes, growing if the current
    /// tail is shorter. Bytes written here become meaningful via `commit`.
    pub fn spare_mut(&mut self, min_spare: usize) -> Result<&mut [u8], AllocFailure> {
        let needed = self
            .len
            .checked_add(min_spare)
            .ok_or(AllocFailure { requested: usize::MAX })?;
        self.ensure_capacity(needed)?;
        Ok(&mut self.storage[self.len..])
    }

    /// Mark `n` bytes of the spare tail as meaningful.
    pub fn commit(&mut self, n: usize) {
        debug_assert!(self.len + n <= self.capacity());
        self.len = (self.len + n).min(self.capacity());
    }
}

fn next_capacity(current: usize, floor: usize, needed: usize) -> Option<usize> {
    let mut capacity = if current == 0 { floor } else { current };
    while capacity < needed {
        capacity = capacity.checked_mul(2)?;
    }
    Some(capacity)
}
