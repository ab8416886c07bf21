#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

cfg_if::cfg_if! {
    if #[cfg(feature = "tracing")] {
        macro_rules! trace_event {
            ($($arg:tt)*) => { tracing::trace!($($arg)*) };
        }
    } else {
        macro_rules! trace_event {
            ($($arg:tt)*) => {};
        }
    }
}

pub mod bitmap;

mod cursor;

pub mod error;

/// The flat, unordered open-addressing table.
pub mod hash_table;

/// The ordered table, which threads its live slots on a doubly linked list.
pub mod linked_table;

mod raw;

pub mod strategy;

pub use bitmap::SlotState;
pub use cursor::Cursor;
pub use error::Error;
pub use hash_table::HashTable;
pub use linked_table::LinkedHashTable;
#[cfg(feature = "stats")]
pub use raw::DebugStats;
pub use strategy::BytewiseEq;
#[cfg(feature = "foldhash")]
pub use strategy::FoldHash;
pub use strategy::KeyEq;
pub use strategy::KeyHasher;
pub use strategy::WordHash;
