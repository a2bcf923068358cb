//! Component C: packer and unpacker.
//!
//! Builds the per-peer send buffers described in `SPEC_FULL.md` section
//! 4.C.1, and appends received buffers straight into particle storage with
//! no intermediate staging (section 4.C.3).

use crate::comm::collective::PeerSend;
use crate::comm::pool::RetainedBufferPool;
use crate::core::particle_vector::ParticleVector;
use crate::core::tables::{MapTarget, OutgoingGhostTable, OutgoingMapTable};
use crate::math::{Point, Real};
use crate::property::PropertySubset;

/// Build one send buffer per peer of `g_opart[i]`'s positions, each shifted
/// back by the shift vector the owner applied — undoing the periodic wrap
/// so the receiver sees coordinates continuous with its own sub-domain.
/// Buffers are drawn from `pool`, resized to the current peer count first
/// (dropping any excess slot's reference per `resize_retained_buffer`).
pub fn pack_ghost_positions<const DIM: usize, St: Real, Prp: Clone>(
    particles: &ParticleVector<DIM, St, Prp>,
    table: &OutgoingGhostTable,
    shifts: &[Point<DIM, St>],
    pool: &mut RetainedBufferPool<Point<DIM, St>>,
) -> Vec<PeerSend<Point<DIM, St>>> {
    let positions = particles.positions();
    pool.resize(table.peer_ids().len());
    table
        .per_peer()
        .iter()
        .zip(table.peer_ids())
        .enumerate()
        .map(|(slot, (entries, &peer))| {
            let buf = pool.checkout(slot);
            buf.borrow_mut().extend(
                entries
                    .iter()
                    .map(|e| positions[e.local_id] - shifts[e.shift_id]),
            );
            PeerSend::new(peer, buf)
        })
        .collect()
}

/// Build one send buffer per peer of `g_opart[i]`'s properties, narrowed to
/// the caller-selected subset `Sub`.
pub fn pack_ghost_properties<const DIM: usize, St: Real, Prp: Clone, Sub: PropertySubset<Prp>>(
    particles: &ParticleVector<DIM, St, Prp>,
    table: &OutgoingGhostTable,
    pool: &mut RetainedBufferPool<Sub>,
) -> Vec<PeerSend<Sub>> {
    let properties = particles.properties();
    pool.resize(table.peer_ids().len());
    table
        .per_peer()
        .iter()
        .zip(table.peer_ids())
        .enumerate()
        .map(|(slot, (entries, &peer))| {
            let buf = pool.checkout(slot);
            buf.borrow_mut()
                .extend(entries.iter().map(|e| Sub::extract(&properties[e.local_id])));
            PeerSend::new(peer, buf)
        })
        .collect()
}

/// Outcome of building the map-path send buffers: the buffers themselves,
/// plus which owned ids stay behind (neither migrating nor deleted).
pub struct MapSendBuffers<const DIM: usize, St, Prp> {
    pub positions: Vec<PeerSend<Point<DIM, St>>>,
    pub properties: Vec<PeerSend<Prp>>,
    pub keep: Vec<bool>,
}

/// Build the map-path send buffers. `m_opart` is read in table order — not
/// pre-sorted by target — using a process-indexed offset table so each
/// peer's entries land contiguously regardless of discovery order.
pub fn pack_map<const DIM: usize, St: Real, Prp: Clone>(
    particles: &ParticleVector<DIM, St, Prp>,
    table: &OutgoingMapTable,
    num_processors: usize,
    pos_pool: &mut RetainedBufferPool<Point<DIM, St>>,
    prp_pool: &mut RetainedBufferPool<Prp>,
) -> MapSendBuffers<DIM, St, Prp> {
    let positions_src = particles.positions();
    let properties_src = particles.properties();

    let mut sizes = vec![0usize; num_processors];
    for entry in &table.entries {
        if let MapTarget::Proc(pid) = entry.target {
            sizes[pid] += 1;
        }
    }

    let peers: Vec<usize> = (0..num_processors).filter(|&p| sizes[p] > 0).collect();
    let mut peer_slot = vec![usize::MAX; num_processors];
    for (slot, &pid) in peers.iter().enumerate() {
        peer_slot[pid] = slot;
    }

    pos_pool.resize(peers.len());
    prp_pool.resize(peers.len());
    let mut positions: Vec<PeerSend<Point<DIM, St>>> = peers
        .iter()
        .enumerate()
        .map(|(slot, &pid)| PeerSend::new(pid, pos_pool.checkout(slot)))
        .collect();
    let mut properties: Vec<PeerSend<Prp>> = peers
        .iter()
        .enumerate()
        .map(|(slot, &pid)| PeerSend::new(pid, prp_pool.checkout(slot)))
        .collect();

    let mut keep = vec![true; particles.g_m()];
    for entry in &table.entries {
        keep[entry.local_id] = false;
        if let MapTarget::Proc(pid) = entry.target {
            let slot = peer_slot[pid];
            positions[slot]
                .data
                .borrow_mut()
                .push(positions_src[entry.local_id]);
            properties[slot]
                .data
                .borrow_mut()
                .push(properties_src[entry.local_id].clone());
        }
    }

    MapSendBuffers {
        positions,
        properties,
        keep,
    }
}

/// Append received positions directly onto `v_pos`, matching section 4.C.3
/// ("no intermediate staging").
pub fn unpack_append_positions<const DIM: usize, St: Real, Prp: Clone>(
    particles: &mut ParticleVector<DIM, St, Prp>,
    received: Vec<Point<DIM, St>>,
) {
    particles.append_positions(received);
}

/// Append received properties directly onto `v_prp`.
pub fn unpack_append_properties<const DIM: usize, St: Real, Prp: Clone>(
    particles: &mut ParticleVector<DIM, St, Prp>,
    received: Vec<Prp>,
) {
    particles.append_properties(received);
}
