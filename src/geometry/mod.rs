//! Spatial structures supporting the exchange: the shift-box index used to
//! synthesize local periodic ghost images.

pub mod shift_box;

pub use shift_box::{ShiftBoxIndex, ShiftGroup};
