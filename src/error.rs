//! Error types for table construction.

/// Errors that can occur while building a table.
///
/// Both variants are only reachable from the `try_*` constructors; the
/// plain constructors treat them as fatal and panic.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested slot count is zero or not a power of two.
    #[error("table capacity must be a non-zero power of two, got {0}")]
    CapacityNotPowerOfTwo(usize),

    /// The backing allocation for the requested geometry cannot be
    /// described by a [`core::alloc::Layout`].
    #[error("table of {limit} slots with a {stride} byte stride does not fit in memory")]
    CapacityOverflow {
        /// Requested slot count.
        limit: usize,
        /// Bytes per slot (key width plus value width).
        stride: usize,
    },
}
