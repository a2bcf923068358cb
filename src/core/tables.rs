//! Per-call bookkeeping tables produced by the labeller and consumed by the
//! packer. Owned by the exchange driver, cleared at the start of the
//! operation that repopulates them.

/// Where a labelled particle is headed on the map path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapTarget {
    /// A legal destination process id.
    Proc(usize),
    /// The out-of-bound policy resolved to deletion (sentinel `-1` in the
    /// original design). Entries with this target are appended to
    /// `entries` like any other but are skipped by the packer because
    /// `p_map_req` never allocates a slot for them — they stay in the
    /// table, unused, until it is cleared at the start of the next
    /// `map_`. This mirrors the original's documented leak and is
    /// intentional; see `SPEC_FULL.md` section 9.
    Delete,
}

#[derive(Debug, Clone, Copy)]
pub struct MapEntry {
    pub local_id: usize,
    pub target: MapTarget,
}

/// Outgoing-map table `m_opart`: which owned particles are leaving and
/// where. Not sorted by target on the host path; `calc_send_buffers` reads
/// it with an auxiliary offset map.
#[derive(Default)]
pub struct OutgoingMapTable {
    pub entries: Vec<MapEntry>,
}

impl OutgoingMapTable {
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GhostEntry {
    pub local_id: usize,
    pub shift_id: usize,
}

/// Outgoing-ghost table `g_opart`, paired with the near-peer -> process id
/// list `prc_g_opart`. The order of entries within each peer's list is
/// frozen once `labelParticlesGhost` finishes and is the correspondence
/// `ghost_put_` relies on.
#[derive(Default)]
pub struct OutgoingGhostTable {
    per_peer: Vec<Vec<GhostEntry>>,
    peer_ids: Vec<usize>,
}

impl OutgoingGhostTable {
    pub fn clear(&mut self) {
        self.per_peer.clear();
        self.peer_ids.clear();
    }

    pub fn peer_ids(&self) -> &[usize] {
        &self.peer_ids
    }

    pub fn per_peer(&self) -> &[Vec<GhostEntry>] {
        &self.per_peer
    }

    /// Build from a near-peer-indexed scratch table, compacting away empty
    /// slots and recording the surviving process ids in the same order.
    pub fn build_from_scratch(&mut self, scratch: Vec<Vec<GhostEntry>>, id_to_proc: impl Fn(usize) -> usize) {
        self.per_peer.clear();
        self.peer_ids.clear();
        for (near_idx, entries) in scratch.into_iter().enumerate() {
            if entries.is_empty() {
                continue;
            }
            self.peer_ids.push(id_to_proc(near_idx));
            self.per_peer.push(entries);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LocalImageEntry {
    pub source_local_id: usize,
    pub shift_id: usize,
}

/// Local-images table `o_part_loc`: one entry per locally replicated
/// particle, produced during ghost_get and consumed during ghost_put.
#[derive(Default)]
pub struct LocalImagesTable {
    pub entries: Vec<LocalImageEntry>,
}

impl LocalImagesTable {
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Topology captured from the last exchange of a given kind, reused by the
/// `SKIP_LABELLING` fast path.
#[derive(Default, Clone)]
pub struct RecvBookkeeping {
    pub peers: Vec<usize>,
    pub sizes: Vec<usize>,
}

impl RecvBookkeeping {
    pub fn set(&mut self, peers: Vec<usize>, sizes: Vec<usize>) {
        debug_assert_eq!(peers.len(), sizes.len());
        self.peers = peers;
        self.sizes = sizes;
    }
}
