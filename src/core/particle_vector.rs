//! Particle storage: two parallel sequences plus the markers splitting them
//! into owned particles, peer ghosts, and locally-synthesized periodic
//! images.

use crate::math::{Point, Real};

/// Two parallel ordered sequences (`v_pos`, `v_prp`) plus the markers that
/// split them into owned particles `[0, g_m)`, ghosts received from peers
/// `[g_m, lg_m)`, and local periodic images `[lg_m, end)`.
///
/// `v_pos` and `v_prp` are always the same length at every observable
/// boundary (invariant 1 in `SPEC_FULL.md` section 8).
pub struct ParticleVector<const DIM: usize, St, Prp> {
    v_pos: Vec<Point<DIM, St>>,
    v_prp: Vec<Prp>,
    /// Ghost marker: boundary between owned and ghost regions.
    g_m: usize,
    /// Local-ghost marker: boundary between received ghosts and local
    /// periodic images, recorded at the start of local-image synthesis.
    lg_m: usize,
    /// Bumped on every non-`SKIP_LABELLING` `ghost_get_`. Lets a caller (or
    /// a debug assertion in `ghost_put_`) detect a `ghost_put_` paired with
    /// a stale `ghost_get_` generation, per the ordering-contract design
    /// note in `SPEC_FULL.md` section 9.
    generation: u64,
}

impl<const DIM: usize, St: Real, Prp: Clone> ParticleVector<DIM, St, Prp> {
    pub fn new() -> Self {
        Self {
            v_pos: Vec::new(),
            v_prp: Vec::new(),
            g_m: 0,
            lg_m: 0,
            generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.v_pos.len(), self.v_prp.len());
        self.v_pos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn positions(&self) -> &[Point<DIM, St>] {
        &self.v_pos
    }

    pub fn positions_mut(&mut self) -> &mut [Point<DIM, St>] {
        &mut self.v_pos
    }

    pub fn properties(&self) -> &[Prp] {
        &self.v_prp
    }

    pub fn properties_mut(&mut self) -> &mut [Prp] {
        &mut self.v_prp
    }

    pub fn g_m(&self) -> usize {
        self.g_m
    }

    pub fn lg_m(&self) -> usize {
        self.lg_m
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Ids `[0, g_m)`: owned by this process.
    pub fn owned_range(&self) -> std::ops::Range<usize> {
        0..self.g_m
    }

    /// Ids `[g_m, lg_m)`: copies received from peers.
    pub fn received_ghost_range(&self) -> std::ops::Range<usize> {
        self.g_m..self.lg_m
    }

    /// Ids `[lg_m, end)`: locally-synthesized periodic images.
    pub fn local_ghost_range(&self) -> std::ops::Range<usize> {
        self.lg_m..self.len()
    }

    pub fn push_owned(&mut self, pos: Point<DIM, St>, prp: Prp) -> usize {
        debug_assert_eq!(
            self.g_m,
            self.len(),
            "push_owned called with ghosts already present"
        );
        let id = self.v_pos.len();
        self.v_pos.push(pos);
        self.v_prp.push(prp);
        self.g_m = self.v_pos.len();
        self.lg_m = self.g_m;
        id
    }

    /// Append a received or synthesized ghost. Callers are responsible for
    /// maintaining `g_m`/`lg_m` themselves via [`Self::set_markers`].
    pub(crate) fn push_ghost(&mut self, pos: Point<DIM, St>, prp: Prp) {
        self.v_pos.push(pos);
        self.v_prp.push(prp);
    }

    /// Append onto `v_pos` alone. The packer's position and property
    /// exchanges are separate collective calls, so the two sequences are
    /// briefly out of step between them; `ghost_get_` restores the
    /// invariant with [`Self::resize_properties_to_positions`] before
    /// returning.
    pub(crate) fn append_positions(&mut self, positions: impl IntoIterator<Item = Point<DIM, St>>) {
        self.v_pos.extend(positions);
    }

    /// Append onto `v_prp` alone. See [`Self::append_positions`].
    pub(crate) fn append_properties(&mut self, properties: impl IntoIterator<Item = Prp>) {
        self.v_prp.extend(properties);
    }

    pub(crate) fn set_markers(&mut self, g_m: usize, lg_m: usize) {
        debug_assert!(g_m <= lg_m);
        debug_assert!(lg_m <= self.len());
        self.g_m = g_m;
        self.lg_m = lg_m;
    }

    pub(crate) fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Drop every ghost, leaving only `[0, g_m)`. Used at the start of
    /// `map_`.
    pub(crate) fn truncate_to_owned(&mut self) {
        self.v_pos.truncate(self.g_m);
        self.v_prp.truncate(self.g_m);
        self.lg_m = self.g_m;
    }

    /// Truncate positions to `g_m`, keeping owned positions only (used by
    /// `ghost_get_` unless `NO_POSITION` is set).
    pub(crate) fn truncate_positions_to_owned(&mut self) {
        self.v_pos.truncate(self.g_m);
    }

    /// Truncate properties to `g_m` (used by `ghost_get_` unless
    /// `SKIP_LABELLING` is set).
    pub(crate) fn truncate_properties_to_owned(&mut self) {
        self.v_prp.truncate(self.g_m);
    }

    /// Keep only owned particles whose `keep[i]` is true, in order,
    /// renumbering ids. Used by the map-path labeller's delete outcome.
    pub(crate) fn retain_owned(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.g_m);
        let mut write = 0;
        for read in 0..self.g_m {
            if keep[read] {
                if write != read {
                    self.v_pos[write] = self.v_pos[read].clone();
                    self.v_prp[write] = self.v_prp[read].clone();
                }
                write += 1;
            }
        }
        self.v_pos.truncate(write);
        self.v_prp.truncate(write);
        self.g_m = write;
        self.lg_m = write;
    }

    /// Resize `v_prp` to match `v_pos`'s length, padding with `pad` or
    /// truncating. Handles the property-subset-empty edge case in
    /// `ghost_get_` (post-condition: `|v_pos| == |v_prp|`).
    pub(crate) fn resize_properties_to_positions(&mut self, pad: Prp) {
        self.v_prp.resize(self.v_pos.len(), pad);
    }
}

impl<const DIM: usize, St: Real, Prp: Clone> Default for ParticleVector<DIM, St, Prp> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_owned_keeps_markers_in_sync() {
        let mut pv = ParticleVector::<1, f64, f64>::new();
        pv.push_owned(Point::<1, f64>::new(0.1), 1.0);
        pv.push_owned(Point::<1, f64>::new(0.2), 2.0);
        assert_eq!(pv.len(), 2);
        assert_eq!(pv.g_m(), 2);
        assert_eq!(pv.lg_m(), 2);
    }

    #[test]
    fn retain_owned_compacts_and_renumbers() {
        let mut pv = ParticleVector::<1, f64, f64>::new();
        pv.push_owned(Point::<1, f64>::new(0.1), 1.0);
        pv.push_owned(Point::<1, f64>::new(0.2), 2.0);
        pv.push_owned(Point::<1, f64>::new(0.3), 3.0);
        pv.retain_owned(&[true, false, true]);
        assert_eq!(pv.len(), 2);
        assert_eq!(pv.properties(), &[1.0, 3.0]);
    }

    #[test]
    fn truncate_to_owned_drops_ghosts() {
        let mut pv = ParticleVector::<1, f64, f64>::new();
        pv.push_owned(Point::<1, f64>::new(0.1), 1.0);
        pv.push_ghost(Point::<1, f64>::new(0.9), 9.0);
        assert_eq!(pv.len(), 2);
        pv.truncate_to_owned();
        assert_eq!(pv.len(), 1);
        assert_eq!(pv.g_m(), 1);
        assert_eq!(pv.lg_m(), 1);
    }
}
