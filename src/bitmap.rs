//! Packed two-bit slot states.
//!
//! Every slot owns two bits in a `u64` word array, 32 slots per word. Bit 0
//! marks a live entry and bit 1 marks a slot that has been erased at least
//! once since the last rehash. The four combinations are exposed as
//! [`SlotState`].

/// Number of slot states packed into one bitmap word.
pub const STATES_PER_WORD: usize = 32;

/// Bit marking a slot that holds a live entry.
pub const OCCUPIED: u64 = 0b01;

/// Bit marking a slot that held an entry which was later erased.
pub const DELETED: u64 = 0b10;

/// The state of a single slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SlotState {
    /// Never used since construction, the last `clear`, or the last rehash.
    Available = 0b00,
    /// Holds a live entry.
    Occupied = 0b01,
    /// Tombstone. Logically empty, but does not terminate a probe.
    Deleted = 0b10,
    /// A tombstone that has been reused for a live entry.
    Recycled = 0b11,
}

impl SlotState {
    #[inline(always)]
    fn from_bits(bits: u64) -> Self {
        match bits & 0b11 {
            0b00 => SlotState::Available,
            0b01 => SlotState::Occupied,
            0b10 => SlotState::Deleted,
            _ => SlotState::Recycled,
        }
    }

    /// Returns `true` for `Occupied` and `Recycled` slots.
    #[inline(always)]
    pub fn is_live(self) -> bool {
        (self as u64) & OCCUPIED != 0
    }

    /// Returns `true` for a pure tombstone.
    #[inline(always)]
    pub fn is_tombstone(self) -> bool {
        self == SlotState::Deleted
    }
}

/// Number of `u64` words needed to hold `limit` slot states.
#[inline(always)]
pub fn words_for(limit: usize) -> usize {
    limit.div_ceil(STATES_PER_WORD)
}

#[inline(always)]
fn word_index(index: usize) -> usize {
    index >> 5
}

#[inline(always)]
fn shift(index: usize) -> usize {
    (index << 1) & 63
}

/// Reads the state of slot `index`.
///
/// Panics if `index` lies beyond the words in `bitmap`.
#[inline(always)]
pub fn get_state(bitmap: &[u64], index: usize) -> SlotState {
    SlotState::from_bits(bitmap[word_index(index)] >> shift(index))
}

/// Sets `bits` (a combination of [`OCCUPIED`] and [`DELETED`]) on slot
/// `index`, leaving the slot's other bit untouched.
#[inline(always)]
pub fn set_bits(bitmap: &mut [u64], index: usize, bits: u64) {
    bitmap[word_index(index)] |= (bits & 0b11) << shift(index);
}

/// Clears `bits` on slot `index`, leaving the slot's other bit untouched.
#[inline(always)]
pub fn clear_bits(bitmap: &mut [u64], index: usize, bits: u64) {
    bitmap[word_index(index)] &= !((bits & 0b11) << shift(index));
}
