//! Retained send-buffer pool (`hsmem`): a reference-counted arena, keyed by
//! peer index, that survives across exchange calls so repeated exchanges on
//! a stable topology reuse allocations instead of reallocating every time.

use std::cell::RefCell;
use std::rc::Rc;

/// How a peer's send buffer is laid out in the pool. `Block` is an
/// array-of-structs: one retained slot per peer, holding the whole element
/// type. `Interleaved` is struct-of-arrays: one retained slot per
/// `(peer, property)` pair. The sizing helper below implements both; this
/// crate's packer only ever drives `Block`, since the property tuple here
/// is a plain Rust struct rather than a set of independently-addressable
/// per-field arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferLayout {
    Block,
    Interleaved,
}

/// Number of retained slots needed for `n` peers under `layout`, given
/// `property_count` properties per element.
pub fn pool_size(layout: BufferLayout, n: usize, property_count: usize) -> usize {
    match layout {
        BufferLayout::Block => n,
        BufferLayout::Interleaved => n * property_count.max(1),
    }
}

/// A reference-counted, peer-indexed pool of retained buffers.
pub struct RetainedBufferPool<T> {
    slots: Vec<Option<Rc<RefCell<Vec<T>>>>>,
}

impl<T> Default for RetainedBufferPool<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> RetainedBufferPool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resize the pool to `n` slots. Any dropped slot's `Rc` is released
    /// here (decrementing its refcount); the memory itself is freed once
    /// no outstanding view references it.
    pub fn resize(&mut self, n: usize) {
        self.slots.resize_with(n, || None);
    }

    /// Get (allocating if needed) a handle to slot `index`, clearing its
    /// contents for reuse.
    pub fn checkout(&mut self, index: usize) -> Rc<RefCell<Vec<T>>> {
        let slot = self.slots[index].get_or_insert_with(|| Rc::new(RefCell::new(Vec::new())));
        slot.borrow_mut().clear();
        slot.clone()
    }

    /// Refcount of slot `index`, or 0 if never allocated.
    pub fn refcount(&self, index: usize) -> usize {
        self.slots[index]
            .as_ref()
            .map(Rc::strong_count)
            .unwrap_or(0)
    }
}

impl<T> Drop for RetainedBufferPool<T> {
    fn drop(&mut self) {
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(rc) = slot {
                let count = Rc::strong_count(rc);
                if count != 1 {
                    log::error!(
                        "retained buffer pool slot {i} dropped with {count} outstanding references"
                    );
                }
            }
        }
    }
}
