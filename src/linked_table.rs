use core::fmt::Debug;
use core::iter::FusedIterator;

use crate::cursor::Cursor;
use crate::cursor::SlotIndex;
use crate::error::Error;
use crate::raw::Link;
use crate::raw::Probe;
use crate::raw::RawTable;
use crate::raw::invariant_violated;
use crate::strategy::BytewiseEq;
use crate::strategy::KeyEq;
use crate::strategy::KeyHasher;
use crate::strategy::WordHash;

#[cold]
#[inline(never)]
#[track_caller]
fn invalid_cursor(cursor: Cursor) -> ! {
    panic!("{cursor:?} does not reference a live entry of this table")
}

/// An open-addressing hash table that keeps its entries in a caller
/// controlled order.
///
/// Lookups behave exactly like [`HashTable`](crate::HashTable). In
/// addition every live slot sits on an intrusive doubly linked list stored
/// next to the slots, and every insert of a new key names the entry it
/// should be placed in front of. [`Cursor::END`] appends. Iteration and
/// cursor navigation follow the list, and the list order is carried across
/// every resize.
///
/// Overwriting the value of an existing key never moves it.
///
/// ## Example
///
/// ```rust
/// use hmap::Cursor;
/// use hmap::LinkedHashTable;
///
/// let mut table = LinkedHashTable::new(1, 1, 4);
/// table.push_back(b"b", &[2]);
/// table.push_back(b"d", &[4]);
/// table.insert(table.find(b"d"), b"c", &[3]);
/// table.push_front(b"a", &[1]);
///
/// let keys: Vec<u8> = table.iter().map(|(k, _)| k[0]).collect();
/// assert_eq!(keys, b"abcd");
///
/// let back = table.back();
/// assert_eq!(table.value(table.prev(back)), &[3]);
/// assert_eq!(table.next(back), Cursor::END);
/// ```
#[derive(Clone)]
pub struct LinkedHashTable<H = WordHash, E = BytewiseEq> {
    raw: RawTable<H, E>,
    head: Option<SlotIndex>,
    tail: Option<SlotIndex>,
}

impl<H, E> Debug for LinkedHashTable<H, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LinkedHashTable")
            .field("key_size", &self.raw.key_size())
            .field("value_size", &self.raw.val_size())
            .field("len", &self.raw.len())
            .field("tombstones", &self.raw.tombs())
            .field("capacity", &self.raw.limit())
            .field("head", &self.head)
            .field("tail", &self.tail)
            .finish()
    }
}

impl LinkedHashTable {
    /// Creates an ordered table with the default [`WordHash`] and
    /// [`BytewiseEq`] strategies.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not a power of two, or if the requested
    /// geometry does not fit in memory.
    #[track_caller]
    pub fn new(key_size: usize, value_size: usize, capacity: usize) -> Self {
        Self::with_strategy(key_size, value_size, capacity, WordHash, BytewiseEq)
    }

    /// Fallible version of [`LinkedHashTable::new`].
    pub fn try_new(key_size: usize, value_size: usize, capacity: usize) -> Result<Self, Error> {
        Self::try_with_strategy(key_size, value_size, capacity, WordHash, BytewiseEq)
    }
}

impl<H, E> LinkedHashTable<H, E>
where
    H: KeyHasher,
    E: KeyEq,
{
    /// Creates an ordered table with caller supplied hash and equality
    /// strategies.
    ///
    /// # Panics
    ///
    /// Same conditions as [`LinkedHashTable::new`].
    #[track_caller]
    pub fn with_strategy(
        key_size: usize,
        value_size: usize,
        capacity: usize,
        hasher: H,
        eq: E,
    ) -> Self {
        match Self::try_with_strategy(key_size, value_size, capacity, hasher, eq) {
            Ok(table) => table,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible version of [`LinkedHashTable::with_strategy`].
    pub fn try_with_strategy(
        key_size: usize,
        value_size: usize,
        capacity: usize,
        hasher: H,
        eq: E,
    ) -> Result<Self, Error> {
        Ok(Self {
            raw: RawTable::new(key_size, value_size, capacity, hasher, eq, true)?,
            head: None,
            tail: None,
        })
    }

    #[inline(always)]
    #[track_caller]
    fn check_key(&self, key: &[u8]) {
        assert_eq!(
            key.len(),
            self.raw.key_size(),
            "key length does not match the table's key size"
        );
    }

    #[inline(always)]
    #[track_caller]
    fn check_value(&self, value: &[u8]) {
        assert_eq!(
            value.len(),
            self.raw.val_size(),
            "value length does not match the table's value size"
        );
    }

    /// Inserts `key` with `value` immediately before the entry under
    /// `position`, or at the back of the order if `position` is
    /// [`Cursor::END`].
    ///
    /// If an equal key is already present its value is overwritten and its
    /// place in the order is kept. Returns a cursor to the entry; if the
    /// insert grew the table, every cursor obtained earlier (including
    /// `position`) is stale.
    ///
    /// # Panics
    ///
    /// Panics if `position` is neither the end cursor nor a cursor to a
    /// live entry, or if `key` or `value` do not have the table's widths.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hmap::Cursor;
    /// use hmap::LinkedHashTable;
    ///
    /// let mut table = LinkedHashTable::new(1, 1, 8);
    /// table.insert(Cursor::END, b"x", &[0]);
    /// table.insert(Cursor::END, b"z", &[0]);
    /// let z = table.find(b"z");
    /// table.insert(z, b"y", &[0]);
    ///
    /// // Existing keys keep their place.
    /// table.insert(table.begin(), b"z", &[9]);
    ///
    /// let order: Vec<u8> = table.iter().map(|(k, _)| k[0]).collect();
    /// assert_eq!(order, b"xyz");
    /// assert_eq!(table.get(b"z"), Some(&[9u8][..]));
    /// ```
    #[track_caller]
    pub fn insert(&mut self, position: Cursor, key: &[u8], value: &[u8]) -> Cursor {
        self.check_key(key);
        self.check_value(value);
        let before = self.live_slot(position);

        match self.raw.probe(key) {
            Probe::Found(index) => {
                self.raw.value_mut(index).copy_from_slice(value);
                Cursor::at(index)
            }
            Probe::Vacant(index) => {
                self.raw.claim(index, key);
                self.raw.value_mut(index).copy_from_slice(value);
                self.link_before(index, before);
                Cursor::at(self.settle(index, key))
            }
        }
    }

    /// Inserts at the back of the order. Equivalent to
    /// `insert(Cursor::END, key, value)`.
    #[track_caller]
    pub fn push_back(&mut self, key: &[u8], value: &[u8]) -> Cursor {
        self.insert(Cursor::END, key, value)
    }

    /// Inserts at the front of the order.
    #[track_caller]
    pub fn push_front(&mut self, key: &[u8], value: &[u8]) -> Cursor {
        self.insert(self.front(), key, value)
    }

    /// Returns the value of `key`, appending a new entry with an all-zero
    /// value at the back of the order if the key is absent.
    ///
    /// # Panics
    ///
    /// Panics if `key` does not have the table's key width.
    #[track_caller]
    pub fn get_or_insert(&mut self, key: &[u8]) -> &mut [u8] {
        self.check_key(key);

        let index = match self.raw.probe(key) {
            Probe::Found(index) => index,
            Probe::Vacant(index) => {
                self.raw.claim(index, key);
                self.raw.value_mut(index).fill(0);
                self.link_before(index, None);
                self.settle(index, key)
            }
        };
        self.raw.value_mut(index)
    }

    #[inline(always)]
    fn settle(&mut self, index: usize, key: &[u8]) -> usize {
        if !self.raw.exceeds_threshold() {
            return index;
        }

        self.grow();
        self.raw.relocate(key)
    }

    /// Rehashes into a table of twice the size, visiting entries in list
    /// order so the new list is rebuilt by appending.
    #[cold]
    #[inline(never)]
    fn grow(&mut self) {
        let live = self.raw.len();
        let old = self.raw.begin_grow();

        let mut next = self.head.take();
        self.tail = None;
        let mut moved = 0;
        while let Some(slot) = next {
            if moved == live {
                invariant_violated("ordered list is longer than the live count");
            }
            let old_index = slot.get();
            let index = self.raw.place(&old, old_index);
            self.link_before(index, None);
            next = old.links()[old_index].next;
            moved += 1;
        }

        if moved != live {
            invariant_violated("ordered list is shorter than the live count");
        }
    }

    /// Returns a cursor to the entry for `key`, or [`Cursor::END`].
    #[track_caller]
    pub fn find(&self, key: &[u8]) -> Cursor {
        self.check_key(key);
        match self.raw.find(key) {
            Some(index) => Cursor::at(index),
            None => Cursor::END,
        }
    }

    /// Returns the value stored for `key`.
    #[track_caller]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.check_key(key);
        self.raw.find(key).map(|index| self.raw.value(index))
    }

    /// Returns the value stored for `key` for in-place modification.
    #[track_caller]
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut [u8]> {
        self.check_key(key);
        let index = self.raw.find(key)?;
        Some(self.raw.value_mut(index))
    }

    /// Returns `true` if the table holds an entry for `key`.
    #[track_caller]
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.check_key(key);
        self.raw.find(key).is_some()
    }

    /// Removes the entry for `key` from the table and from the order.
    ///
    /// Returns `true` if an entry was removed. Its neighbours become
    /// adjacent.
    #[track_caller]
    pub fn erase(&mut self, key: &[u8]) -> bool {
        self.check_key(key);
        match self.raw.find(key) {
            Some(index) => {
                self.unlink(index);
                self.raw.erase_at(index);
                true
            }
            None => false,
        }
    }
}

impl<H, E> LinkedHashTable<H, E> {
    /// Threads the live slot `index` into the list right before `before`,
    /// or at the tail.
    fn link_before(&mut self, index: usize, before: Option<SlotIndex>) {
        let slot = SlotIndex::new(index);
        let prev = match before {
            Some(next) => self.raw.link(next.get()).prev,
            None => self.tail,
        };
        *self.raw.link_mut(index) = Link { prev, next: before };

        match prev {
            Some(prev) => self.raw.link_mut(prev.get()).next = Some(slot),
            None => self.head = Some(slot),
        }
        match before {
            Some(next) => self.raw.link_mut(next.get()).prev = Some(slot),
            None => self.tail = Some(slot),
        }
    }

    fn unlink(&mut self, index: usize) {
        let Link { prev, next } = self.raw.link(index);
        match prev {
            Some(prev) => self.raw.link_mut(prev.get()).next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.raw.link_mut(next.get()).prev = prev,
            None => self.tail = prev,
        }
        *self.raw.link_mut(index) = Link::default();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the table holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.raw.len() == 0
    }

    /// Number of slots. Always a power of two.
    pub fn capacity(&self) -> usize {
        self.raw.limit()
    }

    /// Number of tombstones left behind by erasures since the last grow or
    /// clear.
    pub fn tombstones(&self) -> usize {
        self.raw.tombs()
    }

    /// `(len + tombstones) / capacity`.
    pub fn load(&self) -> f64 {
        self.raw.load()
    }

    /// Width in bytes of every key.
    pub fn key_size(&self) -> usize {
        self.raw.key_size()
    }

    /// Width in bytes of every value.
    pub fn value_size(&self) -> usize {
        self.raw.val_size()
    }

    /// Size in bytes of the table's backing allocation, links included.
    pub fn allocation_size(&self) -> usize {
        self.raw.size_bytes()
    }

    /// Removes every entry and tombstone and empties the order, keeping the
    /// current allocation.
    pub fn clear(&mut self) {
        self.raw.clear();
        self.head = None;
        self.tail = None;
    }

    /// Releases the table and its backing allocation.
    ///
    /// Equivalent to dropping the table.
    pub fn destroy(self) {
        drop(self);
    }

    /// Cursor to the first entry in order, or [`Cursor::END`] when empty.
    pub fn begin(&self) -> Cursor {
        Cursor::from_slot(self.head)
    }

    /// Same as [`LinkedHashTable::begin`].
    pub fn front(&self) -> Cursor {
        Cursor::from_slot(self.head)
    }

    /// Cursor to the last entry in order, or [`Cursor::END`] when empty.
    pub fn back(&self) -> Cursor {
        Cursor::from_slot(self.tail)
    }

    /// The end cursor.
    pub fn end(&self) -> Cursor {
        Cursor::END
    }

    /// Cursor to the entry after `cursor` in order.
    ///
    /// The last entry is followed by the end cursor, and advancing the end
    /// cursor yields the end cursor.
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is neither the end cursor nor a cursor to a live
    /// entry.
    #[track_caller]
    pub fn next(&self, cursor: Cursor) -> Cursor {
        match self.live_slot(cursor) {
            Some(slot) => Cursor::from_slot(self.raw.link(slot.get()).next),
            None => Cursor::END,
        }
    }

    /// Cursor to the entry before `cursor` in order.
    ///
    /// The entry before the end cursor is the last entry; the first entry
    /// is preceded by the end cursor.
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is neither the end cursor nor a cursor to a live
    /// entry.
    #[track_caller]
    pub fn prev(&self, cursor: Cursor) -> Cursor {
        match self.live_slot(cursor) {
            Some(slot) => Cursor::from_slot(self.raw.link(slot.get()).prev),
            None => Cursor::from_slot(self.tail),
        }
    }

    /// Validates a cursor that may be the end cursor.
    #[inline(always)]
    #[track_caller]
    fn live_slot(&self, cursor: Cursor) -> Option<SlotIndex> {
        let slot = cursor.slot()?;
        if !self.raw.is_live(slot.get()) {
            invalid_cursor(cursor);
        }
        Some(slot)
    }

    #[inline(always)]
    #[track_caller]
    fn live_index(&self, cursor: Cursor) -> usize {
        match self.live_slot(cursor) {
            Some(slot) => slot.get(),
            None => invalid_cursor(cursor),
        }
    }

    /// Key bytes of the entry under `cursor`.
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is the end cursor or its slot is not live.
    #[track_caller]
    pub fn key(&self, cursor: Cursor) -> &[u8] {
        self.raw.key(self.live_index(cursor))
    }

    /// Value bytes of the entry under `cursor`.
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is the end cursor or its slot is not live.
    #[track_caller]
    pub fn value(&self, cursor: Cursor) -> &[u8] {
        self.raw.value(self.live_index(cursor))
    }

    /// Mutable value bytes of the entry under `cursor`.
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is the end cursor or its slot is not live.
    #[track_caller]
    pub fn value_mut(&mut self, cursor: Cursor) -> &mut [u8] {
        let index = self.live_index(cursor);
        self.raw.value_mut(index)
    }

    /// Key and value under `cursor`, or `None` if the cursor does not
    /// reference a live entry.
    pub fn entry_at(&self, cursor: Cursor) -> Option<(&[u8], &[u8])> {
        let index = cursor.index().filter(|&index| self.raw.is_live(index))?;
        Some((self.raw.key(index), self.raw.value(index)))
    }

    /// Returns an iterator over `(key, value)` pairs in list order.
    ///
    /// The iterator is double-ended, so `.rev()` walks from the back.
    pub fn iter(&self) -> Iter<'_, H, E> {
        Iter {
            raw: &self.raw,
            front: self.head,
            back: self.tail,
            remaining: self.raw.len(),
        }
    }

    /// Counts live entries by their distance from their home slot.
    #[cfg(feature = "stats")]
    pub fn probe_histogram(&self) -> alloc::vec::Vec<usize>
    where
        H: KeyHasher,
        E: KeyEq,
    {
        self.raw.probe_histogram()
    }

    /// Returns occupancy and probe-length statistics.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> crate::raw::DebugStats
    where
        H: KeyHasher,
        E: KeyEq,
    {
        self.raw.debug_stats()
    }
}

impl<'a, H, E> IntoIterator for &'a LinkedHashTable<H, E> {
    type Item = (&'a [u8], &'a [u8]);
    type IntoIter = Iter<'a, H, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a [`LinkedHashTable`], in list order.
pub struct Iter<'a, H, E> {
    raw: &'a RawTable<H, E>,
    front: Option<SlotIndex>,
    back: Option<SlotIndex>,
    remaining: usize,
}

impl<'a, H, E> Iterator for Iter<'a, H, E> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.front?.get();
        self.front = self.raw.link(index).next;
        self.remaining -= 1;
        Some((self.raw.key(index), self.raw.value(index)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<H, E> DoubleEndedIterator for Iter<'_, H, E> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.back?.get();
        self.back = self.raw.link(index).prev;
        self.remaining -= 1;
        Some((self.raw.key(index), self.raw.value(index)))
    }
}

impl<H, E> ExactSizeIterator for Iter<'_, H, E> {}

impl<H, E> FusedIterator for Iter<'_, H, E> {}
