use core::fmt::Debug;
use core::iter::FusedIterator;

use crate::bitmap;
use crate::cursor::Cursor;
use crate::error::Error;
use crate::raw::Probe;
use crate::raw::RawTable;
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

/// An open-addressing hash table over fixed-width byte keys and values.
///
/// Every slot stores `key_size` key bytes followed by `value_size` value
/// bytes, and the table never looks inside them except through its
/// [`KeyHasher`] and [`KeyEq`] strategies. Collisions are resolved by
/// linear probing. Erased entries leave tombstones behind; tombstones are
/// reused by later inserts and dropped whenever the table grows.
///
/// The table doubles its slot count as soon as live entries plus
/// tombstones exceed half of the slots, so `capacity()` is always a power
/// of two and `load()` never exceeds `0.5` once an insert returns.
///
/// ## Example
///
/// ```rust
/// use hmap::HashTable;
///
/// let mut table = HashTable::new(8, 8, 2);
/// for key in [1u64, 2, 3] {
///     table.insert(&key.to_ne_bytes(), &(key * 2).to_ne_bytes());
/// }
/// assert_eq!(table.len(), 3);
/// assert!(table.load() <= 0.5);
///
/// for (key, value) in table.iter() {
///     let key = u64::from_ne_bytes(key.try_into().unwrap());
///     let value = u64::from_ne_bytes(value.try_into().unwrap());
///     assert_eq!(value, key * 2);
/// }
/// ```
#[derive(Clone)]
pub struct HashTable<H = WordHash, E = BytewiseEq> {
    raw: RawTable<H, E>,
}

impl<H, E> Debug for HashTable<H, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HashTable")
            .field("key_size", &self.raw.key_size())
            .field("value_size", &self.raw.val_size())
            .field("len", &self.raw.len())
            .field("tombstones", &self.raw.tombs())
            .field("capacity", &self.raw.limit())
            .finish()
    }
}

impl HashTable {
    /// Creates a table with the default [`WordHash`] and [`BytewiseEq`]
    /// strategies.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not a power of two, or if the requested
    /// geometry does not fit in memory. Aborts through
    /// [`alloc::alloc::handle_alloc_error`] if the allocation fails.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hmap::HashTable;
    ///
    /// let table = HashTable::new(4, 12, 16);
    /// assert_eq!(table.capacity(), 16);
    /// assert!(table.is_empty());
    /// ```
    #[track_caller]
    pub fn new(key_size: usize, value_size: usize, capacity: usize) -> Self {
        Self::with_strategy(key_size, value_size, capacity, WordHash, BytewiseEq)
    }

    /// Fallible version of [`HashTable::new`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hmap::Error;
    /// use hmap::HashTable;
    ///
    /// assert!(HashTable::try_new(8, 8, 64).is_ok());
    /// assert_eq!(
    ///     HashTable::try_new(8, 8, 48).err(),
    ///     Some(Error::CapacityNotPowerOfTwo(48))
    /// );
    /// ```
    pub fn try_new(key_size: usize, value_size: usize, capacity: usize) -> Result<Self, Error> {
        Self::try_with_strategy(key_size, value_size, capacity, WordHash, BytewiseEq)
    }
}

impl<H, E> HashTable<H, E>
where
    H: KeyHasher,
    E: KeyEq,
{
    /// Creates a table with caller supplied hash and equality strategies.
    ///
    /// # Panics
    ///
    /// Same conditions as [`HashTable::new`].
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

    /// Fallible version of [`HashTable::with_strategy`].
    pub fn try_with_strategy(
        key_size: usize,
        value_size: usize,
        capacity: usize,
        hasher: H,
        eq: E,
    ) -> Result<Self, Error> {
        Ok(Self {
            raw: RawTable::new(key_size, value_size, capacity, hasher, eq, false)?,
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

    /// Inserts `key` with `value`, or overwrites the value of an existing
    /// entry with an equal key.
    ///
    /// Returns a cursor to the entry. If the insert grew the table the
    /// cursor references the entry's slot in the grown table; every cursor
    /// obtained earlier is stale.
    ///
    /// # Panics
    ///
    /// Panics if `key` or `value` do not have the table's widths.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hmap::HashTable;
    ///
    /// let mut table = HashTable::new(2, 1, 4);
    /// table.insert(b"hi", &[1]);
    /// let cursor = table.insert(b"hi", &[2]);
    ///
    /// assert_eq!(table.len(), 1);
    /// assert_eq!(table.value(cursor), &[2]);
    /// ```
    #[track_caller]
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Cursor {
        self.check_key(key);
        self.check_value(value);

        match self.raw.probe(key) {
            Probe::Found(index) => {
                self.raw.value_mut(index).copy_from_slice(value);
                Cursor::at(index)
            }
            Probe::Vacant(index) => {
                self.raw.claim(index, key);
                self.raw.value_mut(index).copy_from_slice(value);
                Cursor::at(self.settle(index, key))
            }
        }
    }

    /// Returns the value of `key`, creating the entry first if it is absent.
    ///
    /// A newly created entry has an all-zero value; callers that need
    /// something else must write it through the returned slice. This may
    /// grow the table.
    ///
    /// # Panics
    ///
    /// Panics if `key` does not have the table's key width.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hmap::HashTable;
    ///
    /// let mut counts = HashTable::new(1, 4, 8);
    /// for byte in b"abracadabra" {
    ///     let count = counts.get_or_insert(&[*byte]);
    ///     let next = u32::from_ne_bytes((&*count).try_into().unwrap()) + 1;
    ///     count.copy_from_slice(&next.to_ne_bytes());
    /// }
    ///
    /// assert_eq!(counts.len(), 5);
    /// assert_eq!(counts.get(b"a"), Some(&5u32.to_ne_bytes()[..]));
    /// ```
    #[track_caller]
    pub fn get_or_insert(&mut self, key: &[u8]) -> &mut [u8] {
        self.check_key(key);

        let index = match self.raw.probe(key) {
            Probe::Found(index) => index,
            Probe::Vacant(index) => {
                self.raw.claim(index, key);
                self.raw.value_mut(index).fill(0);
                self.settle(index, key)
            }
        };
        self.raw.value_mut(index)
    }

    /// Grows the table if the slot just claimed for `key` pushed it past
    /// the load threshold, and returns the entry's final slot.
    #[inline(always)]
    fn settle(&mut self, index: usize, key: &[u8]) -> usize {
        if !self.raw.exceeds_threshold() {
            return index;
        }

        self.grow();
        self.raw.relocate(key)
    }

    #[cold]
    #[inline(never)]
    fn grow(&mut self) {
        let live = self.raw.len();
        let old = self.raw.begin_grow();
        for index in 0..old.limit() {
            if bitmap::get_state(old.states(), index).is_live() {
                self.raw.place(&old, index);
            }
        }
        debug_assert_eq!(self.raw.len(), live);
    }

    /// Returns a cursor to the entry for `key`, or [`Cursor::END`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hmap::HashTable;
    ///
    /// let mut table = HashTable::new(8, 8, 8);
    /// table.insert(&5u64.to_ne_bytes(), &25u64.to_ne_bytes());
    ///
    /// let cursor = table.find(&5u64.to_ne_bytes());
    /// assert_eq!(table.key(cursor), &5u64.to_ne_bytes());
    /// assert_eq!(table.find(&6u64.to_ne_bytes()), table.end());
    /// ```
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

    /// Removes the entry for `key`, leaving a tombstone in its slot.
    ///
    /// Returns `true` if an entry was removed. Erasing an absent key does
    /// nothing. The table never shrinks.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hmap::HashTable;
    ///
    /// let mut table = HashTable::new(1, 1, 4);
    /// table.insert(b"k", b"v");
    ///
    /// assert!(table.erase(b"k"));
    /// assert!(!table.erase(b"k"));
    /// assert!(table.find(b"k").is_end());
    /// assert_eq!(table.tombstones(), 1);
    /// ```
    #[track_caller]
    pub fn erase(&mut self, key: &[u8]) -> bool {
        self.check_key(key);
        match self.raw.find(key) {
            Some(index) => {
                self.raw.erase_at(index);
                true
            }
            None => false,
        }
    }
}

impl<H, E> HashTable<H, E> {
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

    /// `(len + tombstones) / capacity`, the quantity that triggers growth
    /// once it would exceed `0.5`.
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

    /// Size in bytes of the table's backing allocation.
    pub fn allocation_size(&self) -> usize {
        self.raw.size_bytes()
    }

    /// Removes every entry and tombstone, keeping the current allocation.
    pub fn clear(&mut self) {
        self.raw.clear();
    }

    /// Releases the table and its backing allocation.
    ///
    /// Equivalent to dropping the table.
    pub fn destroy(self) {
        drop(self);
    }

    /// Cursor to the first live slot in physical order, or [`Cursor::END`].
    pub fn begin(&self) -> Cursor {
        self.scan_from(0)
    }

    /// The end cursor.
    pub fn end(&self) -> Cursor {
        Cursor::END
    }

    /// Cursor to the next live slot after `cursor` in physical order.
    ///
    /// Advancing the end cursor yields the end cursor.
    pub fn next(&self, cursor: Cursor) -> Cursor {
        match cursor.index() {
            Some(index) => self.scan_from(index + 1),
            None => Cursor::END,
        }
    }

    fn scan_from(&self, start: usize) -> Cursor {
        (start..self.raw.limit())
            .find(|&index| self.raw.state(index).is_live())
            .map_or(Cursor::END, Cursor::at)
    }

    #[inline(always)]
    #[track_caller]
    fn live_index(&self, cursor: Cursor) -> usize {
        match cursor.index() {
            Some(index) if self.raw.is_live(index) => index,
            _ => invalid_cursor(cursor),
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

    /// Returns an iterator over `(key, value)` pairs in physical slot order.
    ///
    /// The order depends on the hash strategy and on the table's history.
    pub fn iter(&self) -> Iter<'_, H, E> {
        Iter {
            raw: &self.raw,
            index: 0,
            remaining: self.raw.len(),
        }
    }

    /// Returns an iterator over `(key, value)` pairs with mutable values.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hmap::HashTable;
    ///
    /// let mut table = HashTable::new(1, 1, 8);
    /// table.insert(b"a", &[1]);
    /// table.insert(b"b", &[2]);
    ///
    /// for (_, value) in table.iter_mut() {
    ///     value[0] *= 10;
    /// }
    /// assert_eq!(table.get(b"b"), Some(&[20u8][..]));
    /// ```
    pub fn iter_mut(&mut self) -> IterMut<'_> {
        let key_size = self.raw.key_size();
        let stride = key_size + self.raw.val_size();
        let limit = self.raw.limit();
        let remaining = self.raw.len();
        let (states, slots) = self.raw.states_and_slots_mut();
        IterMut {
            states,
            slots,
            index: 0,
            limit,
            key_size,
            stride,
            remaining,
        }
    }

    /// Counts live entries by their distance from their home slot.
    ///
    /// Index `d` holds the number of entries that sit `d` slots past the
    /// slot their hash selects.
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

impl<'a, H, E> IntoIterator for &'a HashTable<H, E> {
    type Item = (&'a [u8], &'a [u8]);
    type IntoIter = Iter<'a, H, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a [`HashTable`], in physical slot order.
pub struct Iter<'a, H, E> {
    raw: &'a RawTable<H, E>,
    index: usize,
    remaining: usize,
}

impl<'a, H, E> Iterator for Iter<'a, H, E> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        while self.index < self.raw.limit() {
            let index = self.index;
            self.index += 1;
            if self.raw.state(index).is_live() {
                self.remaining -= 1;
                return Some((self.raw.key(index), self.raw.value(index)));
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<H, E> ExactSizeIterator for Iter<'_, H, E> {}

impl<H, E> FusedIterator for Iter<'_, H, E> {}

/// Iterator over the entries of a [`HashTable`] with mutable values.
pub struct IterMut<'a> {
    states: &'a [u64],
    slots: &'a mut [u8],
    index: usize,
    limit: usize,
    key_size: usize,
    stride: usize,
    remaining: usize,
}

impl<'a> Iterator for IterMut<'a> {
    type Item = (&'a [u8], &'a mut [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 && self.index < self.limit {
            let slots = core::mem::take(&mut self.slots);
            let (slot, rest) = slots.split_at_mut(self.stride);
            self.slots = rest;

            let index = self.index;
            self.index += 1;
            if bitmap::get_state(self.states, index).is_live() {
                self.remaining -= 1;
                let (key, value) = slot.split_at_mut(self.key_size);
                return Some((&*key, value));
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for IterMut<'_> {}

impl FusedIterator for IterMut<'_> {}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;
    use core::hash::Hasher;
    use std::collections::HashMap;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::bitmap::SlotState;

    fn word(n: u64) -> [u8; 8] {
        n.to_ne_bytes()
    }

    fn read(bytes: &[u8]) -> u64 {
        u64::from_ne_bytes(bytes.try_into().unwrap())
    }

    fn assert_invariants<H: KeyHasher, E: KeyEq>(table: &HashTable<H, E>) {
        assert!(table.capacity().is_power_of_two());
        assert!(
            (table.len() + table.tombstones()) * 2 <= table.capacity(),
            "{table:?}"
        );

        let mut live = 0;
        let mut tombs = 0;
        for index in 0..table.capacity() {
            match table.raw.state(index) {
                SlotState::Occupied | SlotState::Recycled => live += 1,
                SlotState::Deleted => tombs += 1,
                SlotState::Available => {}
            }
        }
        assert_eq!(live, table.len(), "{table:?}");
        assert_eq!(tombs, table.tombstones(), "{table:?}");
    }

    #[test]
    fn doubling_keeps_pairs() {
        let mut table = HashTable::new(8, 8, 2);
        for key in [1u64, 2, 3] {
            table.insert(&word(key), &word(key * 2));
            assert_invariants(&table);
        }
        assert!(table.capacity() >= 8);

        let mut seen = Vec::new();
        for (key, value) in table.iter() {
            assert_eq!(read(key) * 2, read(value));
            seen.push(read(key));
        }
        seen.sort_unstable();
        assert_eq!(seen, [1, 2, 3]);

        for key in [1u64, 2, 3] {
            let cursor = table.find(&word(key));
            assert_eq!(read(table.value(cursor)), key * 2);
            assert_eq!(read(table.get_or_insert(&word(key))), key * 2);
        }
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn cursor_walk_matches_iter() {
        let mut table = HashTable::new(8, 8, 4);
        for key in 0..20u64 {
            table.insert(&word(key * 7), &word(key));
        }

        let mut walked = Vec::new();
        let mut cursor = table.begin();
        while cursor != table.end() {
            walked.push((read(table.key(cursor)), read(table.value(cursor))));
            cursor = table.next(cursor);
        }
        let iterated: Vec<(u64, u64)> = table.iter().map(|(k, v)| (read(k), read(v))).collect();

        assert_eq!(walked, iterated);
        assert_eq!(walked.len(), 20);
        assert_eq!(table.next(table.end()), table.end());
    }

    #[test]
    fn duplicate_insert_overwrites() {
        let mut table = HashTable::new(8, 8, 16);
        let first = table.insert(&word(9), &word(1));
        let second = table.insert(&word(9), &word(2));

        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&word(9)), Some(&word(2)[..]));
    }

    #[test]
    fn insert_past_tombstone_updates_existing_key() {
        let mut table = HashTable::new(8, 8, 16);
        // 0, 16 and 32 share home slot 0 under the word hash
        table.insert(&word(0), &word(0));
        table.insert(&word(16), &word(1));
        table.erase(&word(0));

        let cursor = table.insert(&word(16), &word(2));
        assert_eq!(cursor.index(), Some(1));
        assert_eq!(table.len(), 1);
        assert_eq!(table.tombstones(), 1);

        let recycled = table.insert(&word(32), &word(3));
        assert_eq!(recycled.index(), Some(0));
        assert_eq!(table.raw.state(0), SlotState::Recycled);
        assert_eq!(table.tombstones(), 0);
        assert_invariants(&table);

        table.erase(&word(32));
        assert_eq!(table.raw.state(0), SlotState::Deleted);
        assert_eq!(table.get(&word(16)), Some(&word(2)[..]));
    }

    #[test]
    fn erase_then_reinsert() {
        let mut table = HashTable::new(8, 8, 8);
        table.insert(&word(4), &word(40));
        assert!(table.erase(&word(4)));
        assert!(table.find(&word(4)).is_end());
        assert!(!table.contains_key(&word(4)));
        assert_eq!(table.len(), 0);
        assert_eq!(table.tombstones(), 1);

        table.insert(&word(4), &word(41));
        assert_eq!(table.get(&word(4)), Some(&word(41)[..]));
        assert_eq!(table.tombstones(), 0);
        assert!(!table.erase(&word(5)));
    }

    #[test]
    fn tombstones_count_toward_growth_and_are_dropped_by_it() {
        let mut table = HashTable::new(8, 8, 8);
        for key in 0..4u64 {
            table.insert(&word(key), &word(key));
        }
        for key in 0..3u64 {
            table.erase(&word(key));
        }
        assert_eq!((table.len(), table.tombstones(), table.capacity()), (1, 3, 8));

        // reuses no tombstone: home slot 4 is available
        table.insert(&word(4), &word(4));
        assert_eq!(table.capacity(), 16);
        assert_eq!(table.tombstones(), 0);
        assert_eq!(table.len(), 2);
        assert_invariants(&table);
    }

    #[test]
    fn get_or_insert_creates_zeroed_value() {
        let mut table = HashTable::new(8, 8, 1);
        for key in 0..10u64 {
            table.insert(&word(key), &word(u64::MAX));
            table.erase(&word(key));
        }

        let value = table.get_or_insert(&word(3));
        assert_eq!(value, &[0u8; 8]);
        value.copy_from_slice(&word(30));

        assert_eq!(table.get(&word(3)), Some(&word(30)[..]));
        assert_eq!(table.len(), 1);
        assert_invariants(&table);
    }

    #[test]
    fn get_or_insert_grows() {
        let mut table = HashTable::new(8, 8, 2);
        for key in 0..100u64 {
            table.get_or_insert(&word(key)).copy_from_slice(&word(key + 1));
            assert_invariants(&table);
        }
        assert_eq!(table.len(), 100);
        assert_eq!(table.capacity(), 256);
        for key in 0..100u64 {
            assert_eq!(table.get(&word(key)), Some(&word(key + 1)[..]));
        }
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut table = HashTable::new(8, 8, 4);
        for key in 0..50u64 {
            table.insert(&word(key), &word(key));
        }
        table.erase(&word(7));
        let capacity = table.capacity();

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.tombstones(), 0);
        assert_eq!(table.capacity(), capacity);
        assert_eq!(table.begin(), table.end());
        assert_eq!(table.iter().count(), 0);
        assert!(table.get(&word(3)).is_none());

        table.insert(&word(3), &word(9));
        assert_eq!(table.get(&word(3)), Some(&word(9)[..]));
    }

    #[test]
    fn iter_mut_updates_values() {
        let mut table = HashTable::new(8, 8, 4);
        for key in 0..10u64 {
            table.insert(&word(key), &word(key));
        }
        table.erase(&word(5));

        let iter = table.iter_mut();
        assert_eq!(iter.len(), 9);
        for (key, value) in iter {
            value.copy_from_slice(&word(read(key) * 3));
        }

        for key in (0..10u64).filter(|&k| k != 5) {
            assert_eq!(table.get(&word(key)), Some(&word(key * 3)[..]));
        }
    }

    #[test]
    fn zero_width_keys_hold_one_entry() {
        let mut table = HashTable::new(0, 2, 2);
        table.insert(&[], &[1, 2]);
        table.insert(&[], &[3, 4]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&[]), Some(&[3u8, 4][..]));
        assert_eq!(table.iter_mut().count(), 1);

        let mut empty = HashTable::new(0, 0, 1);
        empty.insert(&[], &[]);
        assert_eq!(empty.iter_mut().count(), 1);
        assert!(empty.erase(&[]));
    }

    #[test]
    fn wide_keys_with_custom_strategy() {
        let hasher = |key: &[u8]| {
            let mut h = SipHasher::new_with_keys(7, 11);
            h.write(key);
            h.finish()
        };
        let mut table = HashTable::with_strategy(32, 4, 4, hasher, BytewiseEq);

        let key_for = |n: u32| {
            let mut key = [0u8; 32];
            key[28..].copy_from_slice(&n.to_be_bytes());
            key
        };
        for n in 0..200u32 {
            table.insert(&key_for(n), &n.to_ne_bytes());
        }
        assert_eq!(table.len(), 200);
        for n in 0..200u32 {
            assert_eq!(table.get(&key_for(n)), Some(&n.to_ne_bytes()[..]));
        }
        assert_eq!(table.get(&key_for(500)), None);
    }

    #[test]
    fn custom_equality_merges_keys() {
        let hasher = |key: &[u8]| (key[0] & 0x7F) as u64;
        let eq = |a: &[u8], b: &[u8]| a[0] & 0x7F == b[0] & 0x7F;
        let mut table = HashTable::with_strategy(1, 1, 4, hasher, eq);

        table.insert(&[0x01], &[1]);
        table.insert(&[0x81], &[2]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&[0x01]), Some(&[2u8][..]));
        assert_eq!(table.key(table.find(&[0x81])), &[0x01]);
    }

    #[test]
    fn clone_is_independent() {
        let mut table = HashTable::new(8, 8, 4);
        table.insert(&word(1), &word(1));
        let copy = table.clone();
        table.insert(&word(1), &word(2));
        table.insert(&word(2), &word(2));

        assert_eq!(copy.len(), 1);
        assert_eq!(copy.get(&word(1)), Some(&word(1)[..]));
        assert_eq!(table.get(&word(1)), Some(&word(2)[..]));
    }

    #[test]
    fn entry_at_rejects_dead_slots() {
        let mut table = HashTable::new(8, 8, 8);
        let cursor = table.insert(&word(1), &word(10));
        assert_eq!(table.entry_at(cursor), Some((&word(1)[..], &word(10)[..])));

        table.erase(&word(1));
        assert_eq!(table.entry_at(cursor), None);
        assert_eq!(table.entry_at(Cursor::END), None);
    }

    #[test]
    #[should_panic(expected = "does not reference a live entry")]
    fn dereferencing_end_panics() {
        let table = HashTable::new(8, 8, 8);
        table.key(table.end());
    }

    #[test]
    #[should_panic(expected = "does not reference a live entry")]
    fn dereferencing_erased_entry_panics() {
        let mut table = HashTable::new(8, 8, 8);
        let cursor = table.insert(&word(1), &word(1));
        table.erase(&word(1));
        table.value(cursor);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn non_power_of_two_capacity_panics() {
        HashTable::new(8, 8, 12);
    }

    #[test]
    #[should_panic(expected = "key length")]
    fn wrong_key_width_panics() {
        let mut table = HashTable::new(8, 8, 8);
        table.insert(&[1, 2, 3], &word(1));
    }

    #[test]
    fn random_operations_match_model() {
        let mut rng = SmallRng::from_os_rng();
        let mut table = HashTable::new(8, 8, 1);
        let mut model: HashMap<u64, u64> = HashMap::new();

        for round in 0..20_000u64 {
            let key = rng.random_range(0..512u64);
            match rng.random_range(0..10) {
                0..=4 => {
                    table.insert(&word(key), &word(round));
                    model.insert(key, round);
                }
                5 => {
                    let value = table.get_or_insert(&word(key));
                    let expected = *model.entry(key).or_insert(0);
                    assert_eq!(read(value), expected);
                }
                6..=8 => {
                    assert_eq!(table.erase(&word(key)), model.remove(&key).is_some());
                }
                _ => {
                    assert_eq!(table.get(&word(key)).map(read), model.get(&key).copied());
                }
            }
            assert_eq!(table.len(), model.len());
            assert!((table.len() + table.tombstones()) * 2 <= table.capacity());
        }

        assert_invariants(&table);
        let mut entries: Vec<(u64, u64)> = table.iter().map(|(k, v)| (read(k), read(v))).collect();
        let mut expected: Vec<(u64, u64)> = model.into_iter().collect();
        entries.sort_unstable();
        expected.sort_unstable();
        assert_eq!(entries, expected);
    }

    #[cfg(feature = "foldhash")]
    #[test]
    fn fold_hash_strategy() {
        let mut table = HashTable::with_strategy(8, 8, 2, crate::FoldHash::default(), BytewiseEq);
        for key in 0..1000u64 {
            table.insert(&word(key << 32), &word(key));
        }
        assert_eq!(table.len(), 1000);
        for key in 0..1000u64 {
            assert_eq!(table.get(&word(key << 32)), Some(&word(key)[..]));
        }
    }

    #[cfg(feature = "stats")]
    #[test]
    fn stats_report_probe_distances() {
        let mut table = HashTable::new(8, 8, 16);
        // home slot 0 for all three
        for key in [0u64, 16, 32] {
            table.insert(&word(key), &word(key));
        }
        table.insert(&word(5), &word(5));

        assert_eq!(table.probe_histogram(), [2, 1, 1]);
        let stats = table.debug_stats();
        assert_eq!(stats.live, 4);
        assert_eq!(stats.max_probe_distance, 2);
        assert!((stats.mean_probe_distance - 0.75).abs() < 1e-9);
    }
}
