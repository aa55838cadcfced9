//! Fixed-chunk descriptor slot pool.
//!
//! Render-target descriptors are allocated from heaps of exactly
//! [`HEAP_SLOTS`] slots each. Allocation is a first-fit bit scan over each
//! heap's free mask; the pool grows by one heap when every existing heap is
//! full, so allocation never fails the caller.

/// Slots per heap. One `u64` free mask covers the whole heap.
pub const HEAP_SLOTS: u32 = 64;

/// Flat descriptor slot id: owning heap base + bit index.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct DescriptorId(pub u32);

struct Heap<T> {
    /// First slot id belonging to this heap. Ids in
    /// `[base, base + HEAP_SLOTS)` are owned by it.
    base: u32,
    /// Bit set = slot free.
    free_mask: u64,
    slots: Vec<Option<T>>,
}

impl<T> Heap<T> {
    fn new(base: u32) -> Self {
        Self {
            base,
            free_mask: u64::MAX,
            slots: (0..HEAP_SLOTS).map(|_| None).collect(),
        }
    }

    fn contains(&self, id: DescriptorId) -> bool {
        id.0 >= self.base && id.0 < self.base + HEAP_SLOTS
    }
}

/// Pool of descriptor slots backed by fixed-size heaps.
///
/// Alloc and free must be paired; freeing a slot twice or freeing an id the
/// pool never handed out is a programming error in the calling layer and is
/// asserted, not recovered.
pub struct DescriptorPool<T> {
    heaps: Vec<Heap<T>>,
    live: usize,
}

impl<T> DescriptorPool<T> {
    pub fn new() -> Self {
        Self {
            heaps: Vec::new(),
            live: 0,
        }
    }

    /// Number of outstanding allocated slots.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Allocated heap count (grows, never shrinks).
    pub fn heap_count(&self) -> usize {
        self.heaps.len()
    }

    /// Stores `value` in the first free slot, growing by one heap if all
    /// heaps are exhausted.
    pub fn alloc(&mut self, value: T) -> DescriptorId {
        for heap in &mut self.heaps {
            if heap.free_mask == 0 {
                continue;
            }

            let bit = heap.free_mask.trailing_zeros();
            heap.free_mask &= !(1u64 << bit);
            heap.slots[bit as usize] = Some(value);
            self.live += 1;
            return DescriptorId(heap.base + bit);
        }

        let base = self.heaps.len() as u32 * HEAP_SLOTS;
        log::debug!("descriptor pool: growing to heap {} (base {base})", self.heaps.len() + 1);

        let mut heap = Heap::new(base);
        heap.free_mask &= !1u64;
        heap.slots[0] = Some(value);
        self.heaps.push(heap);
        self.live += 1;
        DescriptorId(base)
    }

    /// Releases `id` and returns the stored value.
    ///
    /// # Panics
    /// Panics if no heap owns `id`; double-free trips a debug assertion.
    pub fn free(&mut self, id: DescriptorId) -> T {
        let heap = self
            .heaps
            .iter_mut()
            .find(|h| h.contains(id))
            .unwrap_or_else(|| panic!("descriptor {id:?} does not belong to any heap"));

        let bit = id.0 - heap.base;
        debug_assert!(
            heap.free_mask & (1u64 << bit) == 0,
            "double free of descriptor {id:?}"
        );

        heap.free_mask |= 1u64 << bit;
        let value = heap.slots[bit as usize].take();
        self.live -= 1;

        // The slot held a value iff the free bit was clear; reaching None here
        // means the debug assertion above was compiled out.
        value.unwrap_or_else(|| panic!("double free of descriptor {id:?}"))
    }

    /// Borrow the value stored at a live slot.
    pub fn get(&self, id: DescriptorId) -> Option<&T> {
        let heap = self.heaps.iter().find(|h| h.contains(id))?;
        heap.slots[(id.0 - heap.base) as usize].as_ref()
    }
}

impl<T> Default for DescriptorPool<T> {
    fn default() -> Self {
        Self::new()
    }
}
