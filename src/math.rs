//! Scalar and point types shared across the communication core.
//!
//! Positions live in a `dim`-dimensional real space. `dim` is a const
//! generic threaded through every public type in this crate rather than a
//! runtime value, so a mismatched decomposition and particle vector is a
//! compile error instead of a panic deep inside the packer.

/// Bound satisfied by any scalar usable as a coordinate (`f32`, `f64`, ...).
pub trait Real: nalgebra::RealField + Copy {}
impl<T: nalgebra::RealField + Copy> Real for T {}

/// A point in `DIM`-dimensional space.
pub type Point<const DIM: usize, St> = nalgebra::SVector<St, DIM>;

/// A `{-1, 0, 1}^DIM` vector identifying which periodic faces, edges, or
/// corners a sub-domain ghost box touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Combination<const DIM: usize> {
    axes: [i8; DIM],
}

impl<const DIM: usize> Combination<DIM> {
    pub fn new(axes: [i8; DIM]) -> Self {
        debug_assert!(axes.iter().all(|&a| (-1..=1).contains(&a)));
        Self { axes }
    }

    pub fn zero() -> Self {
        Self { axes: [0; DIM] }
    }

    pub fn axes(&self) -> &[i8; DIM] {
        &self.axes
    }

    /// Number of axes this combination leaves untouched (value `0`).
    pub fn n_zero(&self) -> usize {
        self.axes.iter().filter(|&&a| a == 0).count()
    }

    /// Linearize into a base-3 integer unique per combination, used as the
    /// key into the shift-box index's group map.
    pub fn lin(&self) -> i64 {
        let mut acc: i64 = 0;
        for &a in self.axes.iter() {
            acc = acc * 3 + (a as i64 + 1);
        }
        acc
    }
}

/// Axis-aligned box, half-open on the high side (`[lo, hi)` per axis).
#[derive(Clone, Copy, Debug)]
pub struct Aabb<const DIM: usize, St> {
    pub lo: Point<DIM, St>,
    pub hi: Point<DIM, St>,
}

impl<const DIM: usize, St: Real> Aabb<DIM, St> {
    pub fn new(lo: Point<DIM, St>, hi: Point<DIM, St>) -> Self {
        Self { lo, hi }
    }

    pub fn contains(&self, p: &Point<DIM, St>) -> bool {
        (0..DIM).all(|i| p[i] >= self.lo[i] && p[i] < self.hi[i])
    }
}
