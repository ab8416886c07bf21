use core::fmt::Debug;
use core::num::NonZeroUsize;

/// A slot index stored off-by-one so that `Option<SlotIndex>` has the same
/// size as `usize` and an all-zero bit pattern means `None`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub(crate) struct SlotIndex(NonZeroUsize);

impl SlotIndex {
    #[inline(always)]
    pub(crate) fn new(index: usize) -> Self {
        Self(NonZeroUsize::MIN.saturating_add(index))
    }

    #[inline(always)]
    pub(crate) fn get(self) -> usize {
        self.0.get() - 1
    }
}

impl Debug for SlotIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// A weak reference to one slot of a table, or to the end of a table.
///
/// A cursor does not borrow the table it came from. It stays meaningful
/// until the next insert that grows the table or the erasure of the entry
/// it points at. Handing a stale cursor back to a table is detected where
/// it is cheap to do so (the slot is no longer live) and reported with a
/// panic, but a stale cursor that happens to land on a different live
/// entry cannot be told apart from a fresh one.
///
/// # Examples
///
/// ```rust
/// use hmap::HashTable;
///
/// let mut table = HashTable::new(8, 8, 4);
/// table.insert(&7u64.to_ne_bytes(), &49u64.to_ne_bytes());
///
/// let cursor = table.find(&7u64.to_ne_bytes());
/// assert!(!cursor.is_end());
/// assert_eq!(table.value(cursor), &49u64.to_ne_bytes());
///
/// assert!(table.find(&8u64.to_ne_bytes()).is_end());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor {
    slot: Option<SlotIndex>,
}

impl Cursor {
    /// The end cursor shared by every table.
    pub const END: Cursor = Cursor { slot: None };

    #[inline(always)]
    pub(crate) fn at(index: usize) -> Self {
        Self {
            slot: Some(SlotIndex::new(index)),
        }
    }

    #[inline(always)]
    pub(crate) fn from_slot(slot: Option<SlotIndex>) -> Self {
        Self { slot }
    }

    #[inline(always)]
    pub(crate) fn slot(self) -> Option<SlotIndex> {
        self.slot
    }

    /// Returns `true` if this is the end cursor.
    #[inline(always)]
    pub fn is_end(self) -> bool {
        self.slot.is_none()
    }

    /// The physical slot index this cursor references, or `None` at the end.
    #[inline(always)]
    pub fn index(self) -> Option<usize> {
        self.slot.map(SlotIndex::get)
    }
}

impl Debug for Cursor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.slot {
            Some(slot) => write!(f, "Cursor({slot:?})"),
            None => f.write_str("Cursor(end)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;

    use super::*;

    #[test]
    fn slot_index_round_trips_and_is_niche_optimized() {
        for index in [0, 1, 31, 1 << 20] {
            assert_eq!(SlotIndex::new(index).get(), index);
        }
        assert_eq!(
            core::mem::size_of::<Option<SlotIndex>>(),
            core::mem::size_of::<usize>()
        );
    }

    #[test]
    fn end_cursor() {
        assert!(Cursor::END.is_end());
        assert_eq!(Cursor::END.index(), None);
        assert_eq!(Cursor::at(3).index(), Some(3));
        assert_ne!(Cursor::at(0), Cursor::END);
        assert_eq!(format!("{:?}", Cursor::at(3)), "Cursor(3)");
        assert_eq!(format!("{:?}", Cursor::END), "Cursor(end)");
    }
}
