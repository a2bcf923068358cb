//! Component A: the shift-box index.
//!
//! For each periodic face/edge/corner combination this process's local
//! sub-domains touch, precompute the list of owned boxes whose particles
//! need a locally-synthesized periodic ghost, plus the shift to apply.
//! Built lazily and rebuilt only when the decomposition's generation moves.

use indexmap::IndexMap;

use crate::domain::Decomposition;
use crate::math::{Aabb, Combination, Real};

/// One periodic-combination group: boxes sharing a single shift vector.
pub struct ShiftGroup<const DIM: usize, St> {
    pub combination: Combination<DIM>,
    pub shift_id: usize,
    pub boxes: Vec<Aabb<DIM, St>>,
}

/// Component A. See module docs.
pub struct ShiftBoxIndex<const DIM: usize, St> {
    groups: Vec<ShiftGroup<DIM, St>>,
    map_cmb: IndexMap<i64, usize>,
    built_generation: Option<u64>,
}

impl<const DIM: usize, St: Real> Default for ShiftBoxIndex<DIM, St> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const DIM: usize, St: Real> ShiftBoxIndex<DIM, St> {
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            map_cmb: IndexMap::new(),
            built_generation: None,
        }
    }

    pub fn groups(&self) -> &[ShiftGroup<DIM, St>] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Rebuild the index from `dec` unless it is already current for this
    /// decomposition's generation.
    pub fn create<D: Decomposition<DIM, St>>(&mut self, dec: &D) {
        if self.built_generation == Some(dec.generation()) {
            return;
        }
        log::debug!(
            "rebuilding shift-box index (generation {} -> {})",
            self.built_generation.unwrap_or(u64::MAX),
            dec.generation()
        );

        self.groups.clear();
        self.map_cmb.clear();

        for sub in 0..dec.num_local_sub() {
            for j in 0..dec.local_n_ighost(sub) {
                let combination = dec.local_ighost_combination(sub, j);
                if combination.n_zero() == DIM {
                    // Interior ghost of a normal sub-domain, not touching a
                    // periodic face: irrelevant to local image synthesis.
                    continue;
                }

                let lin = combination.lin();
                let group_idx = match self.map_cmb.get(&lin) {
                    Some(&idx) => idx,
                    None => {
                        let shift_id = dec.convert_shift(&combination);
                        self.groups.push(ShiftGroup {
                            combination,
                            shift_id,
                            boxes: Vec::new(),
                        });
                        let idx = self.groups.len() - 1;
                        self.map_cmb.insert(lin, idx);
                        idx
                    }
                };

                self.groups[group_idx]
                    .boxes
                    .push(dec.local_ighost_box(sub, j));
            }
        }

        self.built_generation = Some(dec.generation());
    }
}
