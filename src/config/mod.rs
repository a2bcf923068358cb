//! Configuration and parameters
//!
//! Constants and the bit-flag options accepted by the exchange entry points.

pub mod constants;
pub mod options;

pub use constants::*;
pub use options::*;
