//! The domain-decomposition contract consumed (not built) by this crate.
//!
//! A real decomposition computes and owns the geometric partition of the
//! global domain across processes; it is injected into the exchange driver
//! by reference and has no upward pointer back to it (see `SPEC_FULL.md`
//! section 9 on the cyclic-reference design note).

use crate::math::{Aabb, Combination, Point, Real};

/// Geometric domain decomposition, queried by the labeller and the
/// shift-box index builder.
pub trait Decomposition<const DIM: usize, St: Real> {
    /// Ordered list of shift vectors, indexed by shift id.
    fn shift_vectors(&self) -> &[Point<DIM, St>];

    /// Map a periodic combination to its shift id.
    fn convert_shift(&self, combination: &Combination<DIM>) -> usize;

    /// Mutate `point` in place, wrapping it back inside the periodic
    /// domain.
    fn apply_point_bc(&self, point: &mut Point<DIM, St>);

    /// Whether `point` lies inside the global domain.
    fn is_inside(&self, point: &Point<DIM, St>) -> bool;

    /// The owning process id for `point`.
    fn processor_id(&self, point: &Point<DIM, St>) -> usize;

    /// The (possibly empty) set of remote processes whose ghost region
    /// contains `point`, each paired with the shift id to apply. When
    /// `unique` is set, at most one entry is returned per target process.
    fn ghost_processor_id_pair(&self, point: &Point<DIM, St>, unique: bool) -> Vec<(usize, usize)>;

    /// Number of near-neighbour processes (ghost-communicating peers).
    fn num_nn_processors(&self) -> usize;

    /// Map a near-peer index to its actual process id.
    fn id_to_proc(&self, i: usize) -> usize;

    /// Number of local sub-domains this process owns.
    fn num_local_sub(&self) -> usize;

    /// Number of internal ghost boxes for local sub-domain `sub`.
    fn local_n_ighost(&self, sub: usize) -> usize;

    /// The `j`-th internal ghost box of local sub-domain `sub`.
    fn local_ighost_box(&self, sub: usize, j: usize) -> Aabb<DIM, St>;

    /// The periodic combination the `j`-th internal ghost box of `sub`
    /// touches.
    fn local_ighost_combination(&self, sub: usize, j: usize) -> Combination<DIM>;

    /// Monotonically increasing revision tag. A shift-box index built at a
    /// stale generation must be rebuilt.
    fn generation(&self) -> u64;

    /// Total number of processes in the communicator.
    fn num_processors(&self) -> usize;

    /// This process's rank.
    fn my_rank(&self) -> usize;
}
