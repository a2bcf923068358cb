//! Component D: the exchange driver.
//!
//! Owns everything that must survive across calls — the shift-box index,
//! the per-call bookkeeping tables, the retained send-buffer pools, cached
//! receive topology for `SKIP_LABELLING` reuse — and orchestrates `map_`,
//! `ghost_get_`, and `ghost_put_` on top of the labeller and packer.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::comm::collective::{Collective, PeerSend, RecvSlot, RecvTopology};
use crate::comm::pack::{
    pack_ghost_positions, pack_ghost_properties, pack_map, unpack_append_positions,
    unpack_append_properties,
};
use crate::comm::pool::RetainedBufferPool;
use crate::config::constants::DEFAULT_DECOMPOSITION_GRANULARITY;
use crate::config::options::{compute_collective_opt, ExchangeOptions};
use crate::core::particle_vector::ParticleVector;
use crate::core::tables::{LocalImageEntry, LocalImagesTable, OutgoingGhostTable, OutgoingMapTable, RecvBookkeeping};
use crate::domain::{Decomposition, OutOfBoundPolicy};
use crate::error::ExchangeError;
use crate::geometry::shift_box::ShiftBoxIndex;
use crate::labeller::{label_particle_processor, label_particles_ghost};
use crate::math::{Point, Real};
use crate::property::{PropertySubset, Reducer, Replace};

/// Orchestrates the three exchange entry points for one particle container.
/// Generic over dimensionality, scalar type, and the full property tuple;
/// individual calls additionally pick a [`PropertySubset`] to narrow the
/// wire payload.
pub struct ExchangeDriver<const DIM: usize, St, Prp> {
    shift_box: ShiftBoxIndex<DIM, St>,
    map_table: OutgoingMapTable,
    ghost_table: OutgoingGhostTable,
    local_images: LocalImagesTable,
    pos_send_pool: RetainedBufferPool<Point<DIM, St>>,
    /// `map_`'s own retained send pools. Unlike the property pools below,
    /// these are typed over `Prp` directly (the driver's own type
    /// parameter), so they can be ordinary fields.
    map_pos_send_pool: RetainedBufferPool<Point<DIM, St>>,
    map_prp_send_pool: RetainedBufferPool<Prp>,
    /// Retained send pools for property payloads narrowed to a caller-chosen
    /// [`PropertySubset`], one slot for `ghost_get_` and one for
    /// `ghost_put_`. `Sub` varies per call and isn't one of the driver's own
    /// type parameters, so the pool is stored type-erased and swapped for a
    /// fresh one only when a call actually changes `Sub`; repeated calls
    /// with the same subset type reuse the same pool across calls exactly
    /// like `pos_send_pool` does.
    ghost_prp_send_pool: Option<(TypeId, Box<dyn Any>)>,
    ghost_put_send_pool: Option<(TypeId, Box<dyn Any>)>,
    /// Cached shift vectors from the last non-`SKIP_LABELLING` `ghost_get_`,
    /// used to replay local-image positions under `SKIP_LABELLING` without
    /// querying the decomposition again.
    cached_shifts: Vec<Point<DIM, St>>,
    decomposition_granularity: usize,
    out_of_bound_policy: OutOfBoundPolicy,
    recv_get: RecvBookkeeping,
    _marker: std::marker::PhantomData<Prp>,
}

/// Get (or lazily replace) the typed retained pool behind a type-erased
/// slot. Replaced only when `Sub` itself changes between calls — the common
/// case of repeated calls with the same subset type reuses the same pool,
/// same as a field typed directly over `Sub` would, which isn't possible
/// here since `Sub` isn't one of `ExchangeDriver`'s own type parameters.
fn typed_send_pool<Sub: 'static>(slot: &mut Option<(TypeId, Box<dyn Any>)>) -> &mut RetainedBufferPool<Sub> {
    let wanted = TypeId::of::<Sub>();
    let stale = !matches!(slot, Some((id, _)) if *id == wanted);
    if stale {
        *slot = Some((wanted, Box::new(RetainedBufferPool::<Sub>::new())));
    }
    slot.as_mut()
        .unwrap()
        .1
        .downcast_mut::<RetainedBufferPool<Sub>>()
        .expect("pool slot type tag matched TypeId but downcast failed")
}

/// Drop every entry received from a process outside `allowed`, per peer
/// chunk as recorded in `topo`. Used by `map_` under `MAP_LOCAL` to restrict
/// which processes' contributions are actually accepted into storage.
fn filter_by_allowed_peers<T>(data: Vec<T>, topo: &RecvTopology, allowed: &std::collections::HashSet<usize>) -> Vec<T> {
    let mut out = Vec::with_capacity(data.len());
    let mut iter = data.into_iter();
    for (&peer, &size) in topo.peers.iter().zip(topo.sizes.iter()) {
        let chunk: Vec<T> = (&mut iter).take(size).collect();
        if allowed.contains(&peer) {
            out.extend(chunk);
        } else {
            log::warn!(
                "map_: discarding {size} particle(s) received from process {peer}, not a near-neighbour under MAP_LOCAL"
            );
        }
    }
    out
}

impl<const DIM: usize, St: Real, Prp: Clone + Default> Default for ExchangeDriver<DIM, St, Prp> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const DIM: usize, St: Real, Prp: Clone + Default> ExchangeDriver<DIM, St, Prp> {
    pub fn new() -> Self {
        Self {
            shift_box: ShiftBoxIndex::new(),
            map_table: OutgoingMapTable::default(),
            ghost_table: OutgoingGhostTable::default(),
            local_images: LocalImagesTable::default(),
            pos_send_pool: RetainedBufferPool::new(),
            map_pos_send_pool: RetainedBufferPool::new(),
            map_prp_send_pool: RetainedBufferPool::new(),
            ghost_prp_send_pool: None,
            ghost_put_send_pool: None,
            cached_shifts: Vec::new(),
            decomposition_granularity: DEFAULT_DECOMPOSITION_GRANULARITY,
            out_of_bound_policy: OutOfBoundPolicy::default(),
            recv_get: RecvBookkeeping::default(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn decomposition_granularity(&self) -> usize {
        self.decomposition_granularity
    }

    pub fn set_decomposition_granularity(&mut self, n: usize) {
        self.decomposition_granularity = n;
    }

    pub fn out_of_bound_policy(&self) -> OutOfBoundPolicy {
        self.out_of_bound_policy
    }

    pub fn set_out_of_bound_policy(&mut self, policy: OutOfBoundPolicy) {
        self.out_of_bound_policy = policy;
    }

    /// Number of locally-synthesized periodic images recorded by the last
    /// non-`SKIP_LABELLING` `ghost_get_`. Exposed for testing invariant 3.
    pub fn local_image_count(&self) -> usize {
        self.local_images.entries.len()
    }

    /// The owned particle a given local image was synthesized from.
    pub fn local_image_source(&self, i: usize) -> usize {
        self.local_images.entries[i].source_local_id
    }

    /// `map_`: redistribute owned particles whose folded position no longer
    /// belongs to this process.
    pub fn map_<D, C>(
        &mut self,
        particles: &mut ParticleVector<DIM, St, Prp>,
        dec: &D,
        collective: &C,
        opt: ExchangeOptions,
    ) -> Result<(), ExchangeError>
    where
        D: Decomposition<DIM, St>,
        C: Collective,
    {
        if opt.contains(ExchangeOptions::MAP_ON_DEVICE) && !collective.supports_device() {
            log::error!("MAP_ON_DEVICE requested but the collective layer has no device support");
            return Err(ExchangeError::DeviceUnsupported);
        }

        particles.truncate_to_owned();
        label_particle_processor(particles, dec, &self.out_of_bound_policy, &mut self.map_table);

        let buffers = pack_map(
            particles,
            &self.map_table,
            dec.num_processors(),
            &mut self.map_pos_send_pool,
            &mut self.map_prp_send_pool,
        );

        particles.retain_owned(&buffers.keep);

        let collective_opt = compute_collective_opt(opt);
        let mut recv_pos: Vec<Point<DIM, St>> = Vec::new();
        let pos_topo = collective
            .send_recv(&buffers.positions, collective_opt, &mut recv_pos)
            .map_err(|e| {
                log::error!("map_ position exchange failed: {e}");
                e
            })?;
        let mut recv_prp: Vec<Prp> = Vec::new();
        let prp_topo = collective
            .send_recv(&buffers.properties, collective_opt, &mut recv_prp)
            .map_err(|e| {
                log::error!("map_ property exchange failed: {e}");
                e
            })?;

        // MAP_LOCAL restricts the receive set to near-neighbour processes:
        // it never touches what this rank sends out (a particle's
        // legitimate destination may well be a non-neighbour), only what it
        // is willing to accept back in.
        if opt.contains(ExchangeOptions::MAP_LOCAL) {
            let allowed: std::collections::HashSet<usize> =
                (0..dec.num_nn_processors()).map(|i| dec.id_to_proc(i)).collect();
            recv_pos = filter_by_allowed_peers(recv_pos, &pos_topo, &allowed);
            recv_prp = filter_by_allowed_peers(recv_prp, &prp_topo, &allowed);
        }

        unpack_append_positions(particles, recv_pos);
        unpack_append_properties(particles, recv_prp);
        let len = particles.len();
        particles.set_markers(len, len);
        Ok(())
    }

    /// `ghost_get_`: replicate a caller-selected property subset (and, by
    /// default, position) of every owned particle visible to a peer's ghost
    /// region, plus synthesize this process's own periodic images.
    pub fn ghost_get_<D, C, Sub>(
        &mut self,
        particles: &mut ParticleVector<DIM, St, Prp>,
        dec: &D,
        collective: &C,
        opt: ExchangeOptions,
    ) -> Result<(), ExchangeError>
    where
        D: Decomposition<DIM, St>,
        C: Collective,
        Sub: PropertySubset<Prp> + 'static,
    {
        let skip_labelling = opt.contains(ExchangeOptions::SKIP_LABELLING);
        let no_position = opt.contains(ExchangeOptions::NO_POSITION);
        let collective_opt = compute_collective_opt(opt);
        let g_m = particles.g_m();

        if !skip_labelling {
            // A fresh labelling rebuilds the whole ghost region from
            // scratch, so both sequences are truncated back to the owned
            // prefix and rebuilt by appending. `SKIP_LABELLING` instead
            // refreshes the existing ghost region in place — see the
            // `else` branch below — so neither sequence is touched here.
            if !no_position {
                particles.truncate_positions_to_owned();
            }
            particles.truncate_properties_to_owned();

            label_particles_ghost(particles, dec, &mut self.ghost_table);
            particles.bump_generation();

            let sends = pack_ghost_properties::<DIM, St, Prp, Sub>(
                particles,
                &self.ghost_table,
                typed_send_pool::<Sub>(&mut self.ghost_prp_send_pool),
            );
            let mut recv_prp: Vec<Sub> = Vec::new();
            let topo = collective
                .send_recv(&sends, collective_opt, &mut recv_prp)
                .map_err(|e| {
                    log::error!("ghost_get_ property exchange failed: {e}");
                    e
                })?;
            self.recv_get.set(topo.peers.clone(), topo.sizes.clone());

            let full_props: Vec<Prp> = recv_prp
                .into_iter()
                .map(|sub| {
                    let mut full = Prp::default();
                    sub.merge_into(&mut full);
                    full
                })
                .collect();
            unpack_append_properties(particles, full_props);

            if !no_position {
                self.cached_shifts = dec.shift_vectors().to_vec();
                let sends = pack_ghost_positions(
                    particles,
                    &self.ghost_table,
                    &self.cached_shifts,
                    &mut self.pos_send_pool,
                );
                let mut recv_pos: Vec<Point<DIM, St>> = Vec::new();
                collective
                    .send_recv(&sends, collective_opt, &mut recv_pos)
                    .map_err(|e| {
                        log::error!("ghost_get_ position exchange failed: {e}");
                        e
                    })?;
                unpack_append_positions(particles, recv_pos);
            }

            particles.resize_properties_to_positions(Prp::default());
            self.synthesize_local_images_labelled(particles, dec);
        } else {
            log::debug!("ghost_get_: SKIP_LABELLING, refreshing cached topology in place");

            let layout = self.recv_layout(0);
            let total_ghost: usize = self.recv_get.sizes.iter().sum();

            // Neither sequence was truncated above, so the received-ghost
            // and local-image regions from the last labelled call are
            // still sitting in `v_pos`/`v_prp` at their old values. Every
            // step below overwrites those slots in place; nothing is
            // appended, so the lengths never move.
            let sends = pack_ghost_properties::<DIM, St, Prp, Sub>(
                particles,
                &self.ghost_table,
                typed_send_pool::<Sub>(&mut self.ghost_prp_send_pool),
            );
            let mut dst_sub: Vec<Sub> = particles.properties()[g_m..g_m + total_ghost]
                .iter()
                .map(Sub::extract)
                .collect();
            collective
                .send_recv_merge(&sends, &layout, collective_opt, &mut dst_sub, &Replace)
                .map_err(|e| {
                    log::error!("ghost_get_ SKIP_LABELLING property merge failed: {e}");
                    e
                })?;
            for (i, sub) in dst_sub.into_iter().enumerate() {
                sub.merge_into(&mut particles.properties_mut()[g_m + i]);
            }

            if !no_position {
                let sends = pack_ghost_positions(
                    particles,
                    &self.ghost_table,
                    &self.cached_shifts,
                    &mut self.pos_send_pool,
                );
                let mut recv_pos: Vec<Point<DIM, St>> = Vec::new();
                let topo = collective
                    .send_recv(&sends, collective_opt, &mut recv_pos)
                    .map_err(|e| {
                        log::error!("ghost_get_ SKIP_LABELLING position exchange failed: {e}");
                        e
                    })?;
                let peer_offset = self.peer_offsets(0);
                let mut consumed = 0;
                for (&peer, &size) in topo.peers.iter().zip(topo.sizes.iter()) {
                    let base = peer_offset[&peer];
                    for j in 0..size {
                        particles.positions_mut()[g_m + base + j] = recv_pos[consumed + j];
                    }
                    consumed += size;
                }
            }

            // Local images mirror an owned particle's current property
            // (always) and position (unless `NO_POSITION`, in which case
            // the caller has asserted positions haven't moved).
            self.refresh_local_images_in_place(particles, !no_position);
        }

        debug_assert_eq!(particles.positions().len(), particles.properties().len());
        Ok(())
    }

    /// `ghost_put_`: reduce ghost-resident contributions back into their
    /// owners using an associative-commutative operator.
    pub fn ghost_put_<C, Sub, R>(
        &mut self,
        particles: &mut ParticleVector<DIM, St, Prp>,
        collective: &C,
        reducer: &R,
    ) -> Result<(), ExchangeError>
    where
        C: Collective,
        Sub: PropertySubset<Prp> + 'static,
        R: Reducer<Sub>,
    {
        let lg_m = particles.lg_m();
        let total = particles.len();
        let mut protocol_error = None;
        if total.saturating_sub(lg_m) != self.local_images.entries.len() {
            log::warn!(
                "ghost_put_ called without a matching preceding ghost_get_ (|v_prp| - lg_m = {}, expected {})",
                total.saturating_sub(lg_m),
                self.local_images.entries.len()
            );
            protocol_error = Some(ExchangeError::MissingGhostGet);
        }

        for (i, entry) in self.local_images.entries.iter().enumerate() {
            let idx = lg_m + i;
            if idx >= particles.len() {
                break;
            }
            let incoming: Sub = Sub::extract(&particles.properties()[idx]);
            let mut dst: Sub = Sub::extract(&particles.properties()[entry.source_local_id]);
            reducer.reduce(&mut dst, &incoming);
            dst.merge_into(&mut particles.properties_mut()[entry.source_local_id]);
        }

        let g_m = particles.g_m();
        let sends: Vec<PeerSend<Sub>> = {
            let properties = particles.properties();
            let pool = typed_send_pool::<Sub>(&mut self.ghost_put_send_pool);
            pool.resize(self.recv_get.peers.len());
            let mut offset = g_m;
            self.recv_get
                .peers
                .iter()
                .zip(self.recv_get.sizes.iter())
                .enumerate()
                .map(|(slot, (&peer, &size))| {
                    let buf = pool.checkout(slot);
                    buf.borrow_mut()
                        .extend((offset..offset + size).map(|id| Sub::extract(&properties[id])));
                    offset += size;
                    PeerSend::new(peer, buf)
                })
                .collect()
        };

        let mut recv: Vec<Sub> = Vec::new();
        let topo = collective
            .send_recv(&sends, crate::config::options::CollectiveOpt::empty(), &mut recv)
            .map_err(|e| {
                log::error!("ghost_put_ collective failure: {e}");
                e
            })?;

        let peer_index: HashMap<usize, usize> = self
            .ghost_table
            .peer_ids()
            .iter()
            .enumerate()
            .map(|(i, &p)| (p, i))
            .collect();
        let mut offset = 0;
        for (&peer, &size) in topo.peers.iter().zip(topo.sizes.iter()) {
            if let Some(&gi) = peer_index.get(&peer) {
                let entries = &self.ghost_table.per_peer()[gi];
                debug_assert_eq!(entries.len(), size);
                for (j, entry) in entries.iter().enumerate() {
                    let incoming = &recv[offset + j];
                    let mut dst = Sub::extract(&particles.properties()[entry.local_id]);
                    reducer.reduce(&mut dst, incoming);
                    dst.merge_into(&mut particles.properties_mut()[entry.local_id]);
                }
            }
            offset += size;
        }

        match protocol_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn peer_offsets(&self, base_g_m_relative: usize) -> HashMap<usize, usize> {
        let mut off = base_g_m_relative;
        let mut map = HashMap::new();
        for (&peer, &size) in self.recv_get.peers.iter().zip(self.recv_get.sizes.iter()) {
            map.insert(peer, off);
            off += size;
        }
        map
    }

    fn recv_layout(&self, base_offset: usize) -> Vec<RecvSlot> {
        let mut off = base_offset;
        self.recv_get
            .peers
            .iter()
            .zip(self.recv_get.sizes.iter())
            .map(|(&peer, &size)| {
                let slot = RecvSlot {
                    peer,
                    offset: off,
                    len: size,
                };
                off += size;
                slot
            })
            .collect()
    }

    fn synthesize_local_images_labelled<D: Decomposition<DIM, St>>(
        &mut self,
        particles: &mut ParticleVector<DIM, St, Prp>,
        dec: &D,
    ) {
        self.shift_box.create(dec);
        let g_m = particles.g_m();
        let cur_len = particles.len();
        particles.set_markers(g_m, cur_len);

        self.local_images.clear();
        if self.shift_box.is_empty() {
            return;
        }

        let shifts = dec.shift_vectors();
        let owned_positions: Vec<Point<DIM, St>> = particles.positions()[..g_m].to_vec();
        let owned_properties: Vec<Prp> = particles.properties()[..g_m].to_vec();

        for id in 0..g_m {
            for group in self.shift_box.groups() {
                let hit = group.boxes.iter().any(|b| b.contains(&owned_positions[id]));
                if hit {
                    self.local_images.entries.push(LocalImageEntry {
                        source_local_id: id,
                        shift_id: group.shift_id,
                    });
                    particles.push_ghost(
                        owned_positions[id] - shifts[group.shift_id],
                        owned_properties[id].clone(),
                    );
                }
            }
        }
    }

    /// Refresh the existing local-image slots `[lg_m, end)` in place from
    /// their source owned particle's current state, instead of appending —
    /// `SKIP_LABELLING` never truncates the ghost region away, so the
    /// slots from the last labelled `ghost_get_` are still there. Position
    /// is only refreshed when `refresh_position` is set; under
    /// `NO_POSITION` the caller asserts it hasn't changed.
    fn refresh_local_images_in_place(
        &self,
        particles: &mut ParticleVector<DIM, St, Prp>,
        refresh_position: bool,
    ) {
        let lg_m = particles.lg_m();
        let refreshed: Vec<(Option<Point<DIM, St>>, Prp)> = self
            .local_images
            .entries
            .iter()
            .map(|entry| {
                let prp = particles.properties()[entry.source_local_id].clone();
                let pos = refresh_position
                    .then(|| particles.positions()[entry.source_local_id] - self.cached_shifts[entry.shift_id]);
                (pos, prp)
            })
            .collect();
        for (i, (pos, prp)) in refreshed.into_iter().enumerate() {
            if let Some(pos) = pos {
                particles.positions_mut()[lg_m + i] = pos;
            }
            particles.properties_mut()[lg_m + i] = prp;
        }
    }
}
