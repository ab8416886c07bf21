use alloc::alloc::handle_alloc_error;
use core::alloc::Layout;
use core::alloc::LayoutError;
use core::ptr::NonNull;

use crate::bitmap;
use crate::bitmap::SlotState;
use crate::cursor::SlotIndex;
use crate::error::Error;
use crate::strategy::KeyEq;
use crate::strategy::KeyHasher;

/// Previous/next links threading the live slots of an ordered table.
///
/// The all-zero bit pattern is the unlinked state, so a freshly zeroed
/// arena needs no link initialization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Link {
    pub(crate) prev: Option<SlotIndex>,
    pub(crate) next: Option<SlotIndex>,
}

#[derive(Clone, Copy, Debug)]
struct DataLayout {
    layout: Layout,
    states_offset: usize,
    links_offset: usize,
    slots_offset: usize,
}

impl DataLayout {
    fn new(limit: usize, stride: usize, linked: bool) -> Result<Self, Error> {
        let overflow = |_: LayoutError| Error::CapacityOverflow { limit, stride };

        let states_layout = Layout::array::<u64>(bitmap::words_for(limit)).map_err(overflow)?;
        let links_layout =
            Layout::array::<Link>(if linked { limit } else { 0 }).map_err(overflow)?;
        let slot_bytes = stride
            .checked_mul(limit)
            .ok_or(Error::CapacityOverflow { limit, stride })?;
        let slots_layout = Layout::array::<u8>(slot_bytes).map_err(overflow)?;

        let (layout, states_offset) = Layout::new::<()>()
            .extend(states_layout)
            .map_err(overflow)?;
        let (layout, links_offset) = layout.extend(links_layout).map_err(overflow)?;
        let (layout, slots_offset) = layout.extend(slots_layout).map_err(overflow)?;

        Ok(DataLayout {
            layout: layout.pad_to_align(),
            states_offset,
            links_offset,
            slots_offset,
        })
    }
}

/// One exclusively owned allocation holding the state bitmap, the link
/// array (ordered tables only) and `limit` fixed-stride slots of key bytes
/// followed by value bytes.
///
/// The whole allocation is zeroed when created, so every byte is
/// initialized even for slots that never held an entry.
pub(crate) struct RawStorage {
    layout: DataLayout,
    alloc: NonNull<u8>,
    limit: usize,
    stride: usize,
    linked: bool,
}

// SAFETY: `RawStorage` uniquely owns plain bytes; there is no interior
// mutability and no thread affinity.
unsafe impl Send for RawStorage {}
// SAFETY: Shared access only ever reads.
unsafe impl Sync for RawStorage {}

impl RawStorage {
    pub(crate) fn allocate(limit: usize, stride: usize, linked: bool) -> Result<Self, Error> {
        debug_assert!(limit.is_power_of_two());
        let layout = DataLayout::new(limit, stride, linked)?;
        debug_assert!(layout.layout.size() != 0);

        // SAFETY: The layout is non-zero sized because `limit >= 1` always
        // requires at least one bitmap word. Allocation failure is reported
        // through `handle_alloc_error`.
        let alloc = unsafe {
            let raw_alloc = alloc::alloc::alloc_zeroed(layout.layout);
            if raw_alloc.is_null() {
                handle_alloc_error(layout.layout);
            }
            NonNull::new_unchecked(raw_alloc)
        };

        Ok(RawStorage {
            layout,
            alloc,
            limit,
            stride,
            linked,
        })
    }

    #[inline(always)]
    pub(crate) fn limit(&self) -> usize {
        self.limit
    }

    #[inline(always)]
    pub(crate) fn size_bytes(&self) -> usize {
        self.layout.layout.size()
    }

    #[inline(always)]
    fn links_len(&self) -> usize {
        if self.linked { self.limit } else { 0 }
    }

    #[inline(always)]
    pub(crate) fn states(&self) -> &[u64] {
        // SAFETY: The states region starts at `states_offset`, is aligned for
        // `u64`, holds `words_for(limit)` words and is fully initialized.
        unsafe {
            core::slice::from_raw_parts(
                self.alloc.add(self.layout.states_offset).cast::<u64>().as_ptr(),
                bitmap::words_for(self.limit),
            )
        }
    }

    #[inline(always)]
    pub(crate) fn links(&self) -> &[Link] {
        // SAFETY: The links region starts at `links_offset`, is aligned for
        // `Link` and holds `links_len()` entries. Zeroed memory is a valid
        // `Link` (both fields `None`).
        unsafe {
            core::slice::from_raw_parts(
                self.alloc.add(self.layout.links_offset).cast::<Link>().as_ptr(),
                self.links_len(),
            )
        }
    }

    #[inline(always)]
    pub(crate) fn slots(&self) -> &[u8] {
        // SAFETY: The slots region starts at `slots_offset` and holds
        // `limit * stride` initialized bytes.
        unsafe {
            core::slice::from_raw_parts(
                self.alloc.add(self.layout.slots_offset).as_ptr(),
                self.limit * self.stride,
            )
        }
    }

    /// Splits the arena into its three disjoint regions.
    #[inline(always)]
    pub(crate) fn parts_mut(&mut self) -> (&mut [u64], &mut [Link], &mut [u8]) {
        // SAFETY: The three regions do not overlap (they come from
        // successive `Layout::extend` calls), each is aligned and initialized
        // as described in the shared accessors, and `&mut self` guarantees
        // exclusive access for the lifetime of the returned slices.
        unsafe {
            (
                core::slice::from_raw_parts_mut(
                    self.alloc.add(self.layout.states_offset).cast::<u64>().as_ptr(),
                    bitmap::words_for(self.limit),
                ),
                core::slice::from_raw_parts_mut(
                    self.alloc.add(self.layout.links_offset).cast::<Link>().as_ptr(),
                    self.links_len(),
                ),
                core::slice::from_raw_parts_mut(
                    self.alloc.add(self.layout.slots_offset).as_ptr(),
                    self.limit * self.stride,
                ),
            )
        }
    }
}

impl Clone for RawStorage {
    fn clone(&self) -> Self {
        let copy = match RawStorage::allocate(self.limit, self.stride, self.linked) {
            Ok(copy) => copy,
            // The same geometry was accepted when `self` was built.
            Err(err) => unreachable!("{err}"),
        };

        // SAFETY: Both allocations share one layout and every byte of the
        // source is initialized.
        unsafe {
            core::ptr::copy_nonoverlapping(
                self.alloc.as_ptr(),
                copy.alloc.as_ptr(),
                self.layout.layout.size(),
            );
        }

        copy
    }
}

impl Drop for RawStorage {
    fn drop(&mut self) {
        // SAFETY: `alloc` was produced by `alloc_zeroed` with this exact layout.
        unsafe {
            alloc::alloc::dealloc(self.alloc.as_ptr(), self.layout.layout);
        }
    }
}

/// Outcome of probing for an insert position.
pub(crate) enum Probe {
    /// A live slot already holds an equal key.
    Found(usize),
    /// The key is absent; this slot (available, or the first tombstone on
    /// the probe sequence) should receive it.
    Vacant(usize),
}

/// The open-addressing engine shared by both table variants.
///
/// Probing is linear from `hash(key) & (limit - 1)` with wraparound.
/// `used` counts live slots and `tombs` counts pure tombstones; their sum
/// never exceeds half of `limit` once an insert has returned.
#[derive(Clone)]
pub(crate) struct RawTable<H, E> {
    key_size: usize,
    val_size: usize,
    used: usize,
    tombs: usize,
    hasher: H,
    eq: E,
    storage: RawStorage,
}

#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn invariant_violated(what: &str) -> ! {
    panic!("hash table invariant violated: {what}")
}

impl<H, E> RawTable<H, E> {
    #[inline(always)]
    pub(crate) fn key_size(&self) -> usize {
        self.key_size
    }

    #[inline(always)]
    pub(crate) fn val_size(&self) -> usize {
        self.val_size
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.used
    }

    #[inline(always)]
    pub(crate) fn tombs(&self) -> usize {
        self.tombs
    }

    #[inline(always)]
    pub(crate) fn limit(&self) -> usize {
        self.storage.limit()
    }

    #[inline(always)]
    fn stride(&self) -> usize {
        self.key_size + self.val_size
    }

    #[inline(always)]
    fn mask(&self) -> usize {
        self.storage.limit() - 1
    }

    pub(crate) fn load(&self) -> f64 {
        (self.used + self.tombs) as f64 / self.limit() as f64
    }

    #[inline(always)]
    pub(crate) fn exceeds_threshold(&self) -> bool {
        self.used + self.tombs > self.limit() / 2
    }

    pub(crate) fn size_bytes(&self) -> usize {
        self.storage.size_bytes()
    }

    #[inline(always)]
    pub(crate) fn state(&self, index: usize) -> SlotState {
        bitmap::get_state(self.storage.states(), index)
    }

    /// Returns `true` if `index` is in range and holds a live entry.
    #[inline(always)]
    pub(crate) fn is_live(&self, index: usize) -> bool {
        index < self.limit() && self.state(index).is_live()
    }

    #[inline(always)]
    pub(crate) fn key(&self, index: usize) -> &[u8] {
        let start = index * self.stride();
        &self.storage.slots()[start..start + self.key_size]
    }

    #[inline(always)]
    pub(crate) fn value(&self, index: usize) -> &[u8] {
        let start = index * self.stride() + self.key_size;
        &self.storage.slots()[start..start + self.val_size]
    }

    #[inline(always)]
    pub(crate) fn value_mut(&mut self, index: usize) -> &mut [u8] {
        let start = index * self.stride() + self.key_size;
        let end = start + self.val_size;
        let (_, _, slots) = self.storage.parts_mut();
        &mut slots[start..end]
    }

    /// Borrows the bitmap and the slot bytes together, for iterators that
    /// hand out mutable values.
    pub(crate) fn states_and_slots_mut(&mut self) -> (&[u64], &mut [u8]) {
        let (states, _, slots) = self.storage.parts_mut();
        (&*states, slots)
    }

    #[inline(always)]
    pub(crate) fn link(&self, index: usize) -> Link {
        self.storage.links()[index]
    }

    #[inline(always)]
    pub(crate) fn link_mut(&mut self, index: usize) -> &mut Link {
        let (_, links, _) = self.storage.parts_mut();
        &mut links[index]
    }

    /// Tombstones the live slot at `index`.
    pub(crate) fn erase_at(&mut self, index: usize) {
        debug_assert!(self.state(index).is_live());
        let (states, _, _) = self.storage.parts_mut();
        bitmap::set_bits(states, index, bitmap::DELETED);
        bitmap::clear_bits(states, index, bitmap::OCCUPIED);
        self.used -= 1;
        self.tombs += 1;
    }

    /// Marks every slot available. Slot bytes and links are left as they are.
    pub(crate) fn clear(&mut self) {
        self.storage.parts_mut().0.fill(0);
        self.used = 0;
        self.tombs = 0;
    }

    /// Swaps in a zeroed arena with twice the slots and returns the old one.
    ///
    /// Tombstones are dropped and the live count restarts at zero; the
    /// caller must move every live entry of the returned arena across with
    /// [`RawTable::place`].
    pub(crate) fn begin_grow(&mut self) -> RawStorage {
        let limit = self.limit();
        let stride = self.stride();
        let Some(new_limit) = limit.checked_mul(2) else {
            grow_failed(Error::CapacityOverflow { limit, stride });
        };

        let storage = match RawStorage::allocate(new_limit, stride, self.storage.linked) {
            Ok(storage) => storage,
            Err(err) => grow_failed(err),
        };

        trace_event!(
            old_limit = limit,
            new_limit,
            live = self.used,
            tombstones = self.tombs,
            "growing hash table"
        );

        self.used = 0;
        self.tombs = 0;
        core::mem::replace(&mut self.storage, storage)
    }
}

#[cold]
#[inline(never)]
fn grow_failed(err: Error) -> ! {
    panic!("cannot grow hash table: {err}")
}

impl<H, E> RawTable<H, E>
where
    H: KeyHasher,
    E: KeyEq,
{
    pub(crate) fn new(
        key_size: usize,
        val_size: usize,
        capacity: usize,
        hasher: H,
        eq: E,
        linked: bool,
    ) -> Result<Self, Error> {
        if !capacity.is_power_of_two() {
            return Err(Error::CapacityNotPowerOfTwo(capacity));
        }
        let stride = key_size
            .checked_add(val_size)
            .ok_or(Error::CapacityOverflow {
                limit: capacity,
                stride: usize::MAX,
            })?;

        Ok(RawTable {
            key_size,
            val_size,
            used: 0,
            tombs: 0,
            hasher,
            eq,
            storage: RawStorage::allocate(capacity, stride, linked)?,
        })
    }

    #[inline(always)]
    fn home(&self, key: &[u8]) -> usize {
        (self.hasher.hash_key(key) as usize) & self.mask()
    }

    /// Locates the live slot holding `key`.
    ///
    /// Stops at the first available slot; tombstones are stepped over.
    pub(crate) fn find(&self, key: &[u8]) -> Option<usize> {
        let mask = self.mask();
        let mut index = self.home(key);
        for _ in 0..self.limit() {
            match self.state(index) {
                SlotState::Available => return None,
                SlotState::Deleted => {}
                SlotState::Occupied | SlotState::Recycled => {
                    if self.eq.key_eq(self.key(index), key) {
                        return Some(index);
                    }
                }
            }
            index = (index + 1) & mask;
        }
        None
    }

    /// Probes for `key` on behalf of an insert.
    ///
    /// The scan runs to the first available slot so that a key living past
    /// a tombstone is found rather than duplicated. A vacant result prefers
    /// the first tombstone seen.
    pub(crate) fn probe(&self, key: &[u8]) -> Probe {
        let mask = self.mask();
        let mut index = self.home(key);
        let mut reusable = None;
        for _ in 0..self.limit() {
            match self.state(index) {
                SlotState::Available => return Probe::Vacant(reusable.unwrap_or(index)),
                SlotState::Deleted => {
                    reusable.get_or_insert(index);
                }
                SlotState::Occupied | SlotState::Recycled => {
                    if self.eq.key_eq(self.key(index), key) {
                        return Probe::Found(index);
                    }
                }
            }
            index = (index + 1) & mask;
        }

        match reusable {
            Some(index) => Probe::Vacant(index),
            None => invariant_violated("probe sequence has no vacant slot"),
        }
    }

    /// Marks the vacant slot `index` live and writes `key` into it.
    ///
    /// The value bytes are left untouched and the load threshold is not
    /// checked.
    pub(crate) fn claim(&mut self, index: usize, key: &[u8]) {
        let was = self.state(index);
        debug_assert!(!was.is_live());

        let start = index * self.stride();
        let end = start + self.key_size;
        let (states, _, slots) = self.storage.parts_mut();
        bitmap::set_bits(states, index, bitmap::OCCUPIED);
        slots[start..end].copy_from_slice(key);

        self.used += 1;
        if was.is_tombstone() {
            self.tombs -= 1;
        }
    }

    /// Copies the entry at `old_index` of `old` into the first non-live
    /// slot of its probe sequence in the current arena.
    ///
    /// Entries coming out of a table are already unique, so no key
    /// comparison happens.
    pub(crate) fn place(&mut self, old: &RawStorage, old_index: usize) -> usize {
        let stride = self.stride();
        let start = old_index * stride;
        let entry = &old.slots()[start..start + stride];

        let mask = self.mask();
        let mut index = self.home(&entry[..self.key_size]);
        while self.state(index).is_live() {
            index = (index + 1) & mask;
        }

        let (states, _, slots) = self.storage.parts_mut();
        bitmap::set_bits(states, index, bitmap::OCCUPIED);
        slots[index * stride..(index + 1) * stride].copy_from_slice(entry);
        self.used += 1;

        index
    }

    /// Re-probes for a key that was inserted right before a grow.
    ///
    /// Reaching an available slot means the rehash lost the key, which is
    /// unrecoverable.
    pub(crate) fn relocate(&self, key: &[u8]) -> usize {
        let mask = self.mask();
        let mut index = self.home(key);
        for _ in 0..self.limit() {
            match self.state(index) {
                SlotState::Available => invariant_violated("key vanished while rehashing"),
                SlotState::Deleted => {}
                SlotState::Occupied | SlotState::Recycled => {
                    if self.eq.key_eq(self.key(index), key) {
                        return index;
                    }
                }
            }
            index = (index + 1) & mask;
        }
        invariant_violated("key vanished while rehashing")
    }

    /// Distance of the live entry at `index` from its home slot.
    #[cfg(feature = "stats")]
    fn displacement(&self, index: usize) -> usize {
        index.wrapping_sub(self.home(self.key(index))) & self.mask()
    }

    /// Counts live entries by displacement from their home slot. Index `d`
    /// of the result holds the number of entries found `d` steps into their
    /// probe sequence.
    #[cfg(feature = "stats")]
    pub(crate) fn probe_histogram(&self) -> alloc::vec::Vec<usize> {
        let mut hist = alloc::vec::Vec::new();
        for index in 0..self.limit() {
            if !self.state(index).is_live() {
                continue;
            }
            let distance = self.displacement(index);
            if hist.len() <= distance {
                hist.resize(distance + 1, 0);
            }
            hist[distance] += 1;
        }
        hist
    }

    #[cfg(feature = "stats")]
    pub(crate) fn debug_stats(&self) -> DebugStats {
        let hist = self.probe_histogram();
        let total_distance: usize = hist.iter().enumerate().map(|(d, &n)| d * n).sum();

        DebugStats {
            live: self.used,
            tombstones: self.tombs,
            slots: self.limit(),
            load_factor: self.load(),
            total_bytes: self.size_bytes(),
            max_probe_distance: hist.len().saturating_sub(1),
            mean_probe_distance: if self.used == 0 {
                0.0
            } else {
                total_distance as f64 / self.used as f64
            },
        }
    }
}

/// Debug statistics for hash table analysis.
#[cfg(feature = "stats")]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of live entries
    pub live: usize,
    /// Number of tombstones awaiting reuse or rehash
    pub tombstones: usize,
    /// Total number of slots allocated
    pub slots: usize,
    /// `(live + tombstones) / slots`
    pub load_factor: f64,
    /// Total memory in bytes used by the arena
    pub total_bytes: usize,
    /// Longest distance of a live entry from its home slot
    pub max_probe_distance: usize,
    /// Mean distance of live entries from their home slots
    pub mean_probe_distance: f64,
}

#[cfg(feature = "stats")]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {} live + {} tombstones / {} slots ({:.2}% load factor)",
            self.live,
            self.tombstones,
            self.slots,
            self.load_factor * 100.0
        );
        println!(
            "Probe distance: max {}, mean {:.3}",
            self.max_probe_distance, self.mean_probe_distance
        );
        println!("Total Allocated: {} bytes", self.total_bytes);
    }
}
