//! Tunables with a fixed default, mirroring how the decomposition is sized
//! when the caller doesn't pin it down explicitly.

/// Minimum number of sub-domains per process when the decomposition
/// auto-sizes itself.
pub const DEFAULT_DECOMPOSITION_GRANULARITY: usize = 64;
