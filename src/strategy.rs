//! Hash and equality strategies over raw key bytes.
//!
//! A table never interprets its keys. It hands the key region to a
//! [`KeyHasher`] to pick the start of the probe sequence and to a [`KeyEq`]
//! to decide whether two key regions name the same entry. Both are chosen
//! per table instance at construction time.
//!
//! Plain closures work as strategies:
//!
//! ```rust
//! use hmap::HashTable;
//!
//! // Case-insensitive ASCII keys of width 4.
//! let hasher = |key: &[u8]| {
//!     key.iter()
//!         .fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(b.to_ascii_lowercase() as u64))
//! };
//! let eq = |a: &[u8], b: &[u8]| a.eq_ignore_ascii_case(b);
//!
//! let mut table = HashTable::with_strategy(4, 1, 8, hasher, eq);
//! table.insert(b"ABCD", &[1]);
//! assert_eq!(table.get(b"abcd"), Some(&[1u8][..]));
//! ```

/// Maps a key region to the seed of its probe sequence.
///
/// The table reduces the seed modulo its slot count, so only the low bits
/// matter for small tables.
pub trait KeyHasher {
    /// Returns the probe seed for `key`.
    fn hash_key(&self, key: &[u8]) -> u64;
}

/// Decides whether two key regions identify the same entry.
///
/// Implementations must be consistent with the paired [`KeyHasher`]: keys
/// that compare equal must produce the same seed.
pub trait KeyEq {
    /// Returns `true` if `a` and `b` are the same key.
    fn key_eq(&self, a: &[u8], b: &[u8]) -> bool;
}

impl<F> KeyHasher for F
where
    F: Fn(&[u8]) -> u64,
{
    #[inline(always)]
    fn hash_key(&self, key: &[u8]) -> u64 {
        self(key)
    }
}

impl<F> KeyEq for F
where
    F: Fn(&[u8], &[u8]) -> bool,
{
    #[inline(always)]
    fn key_eq(&self, a: &[u8], b: &[u8]) -> bool {
        self(a, b)
    }
}

/// The default hasher: the first `min(key_size, 8)` key bytes read as a
/// native-endian unsigned integer.
///
/// This is the identity for word-sized integer keys, which makes sequential
/// keys land in sequential slots. For keys wider than a word every byte
/// past the eighth is ignored, so structured or wide keys collide heavily
/// and should use a stronger strategy such as [`FoldHash`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WordHash;

impl KeyHasher for WordHash {
    #[inline(always)]
    fn hash_key(&self, key: &[u8]) -> u64 {
        let mut word = [0u8; 8];
        let len = key.len().min(word.len());
        word[..len].copy_from_slice(&key[..len]);
        u64::from_ne_bytes(word)
    }
}

/// The default equality: exact byte-for-byte comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BytewiseEq;

impl KeyEq for BytewiseEq {
    #[inline(always)]
    fn key_eq(&self, a: &[u8], b: &[u8]) -> bool {
        a == b
    }
}

/// A hasher mixing every key byte with `foldhash`.
///
/// Deterministic for a given seed. This is not a cryptographic hash and
/// offers no protection against adversarial keys.
#[cfg(feature = "foldhash")]
#[derive(Clone, Debug, Default)]
pub struct FoldHash {
    state: foldhash::fast::FixedState,
}

#[cfg(feature = "foldhash")]
impl FoldHash {
    /// Creates a hasher with an explicit seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            state: foldhash::fast::FixedState::with_seed(seed),
        }
    }
}

#[cfg(feature = "foldhash")]
impl KeyHasher for FoldHash {
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u64 {
        use core::hash::BuildHasher;

        self.state.hash_one(key)
    }
}
