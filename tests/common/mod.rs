//! Shared test fixtures: an in-process multi-rank `Collective` backed by
//! `std::thread` + `std::sync::mpsc`, and a couple of small decompositions
//! fixed enough to hand-check the scenarios against.

use std::any::Any;
use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, Sender};

use partghost::{Aabb, Collective, Combination, Decomposition, Point, RecvSlot, RecvTopology, Reducer, ExchangeError};

/// One rank's view of an in-process loopback communicator. Every
/// `send_recv`/`send_recv_merge` round sends *something* to every other
/// rank — real data or an `Empty` marker — so each rank can tell when it
/// has heard from everyone regardless of call order, without needing a
/// separate barrier.
pub struct ChannelCollective {
    rank: usize,
    num_processors: usize,
    senders: Vec<Sender<Box<dyn Any + Send>>>,
    receiver: Receiver<Box<dyn Any + Send>>,
}

enum MsgKind<T> {
    Data(Vec<T>),
    Empty,
}

type Envelope<T> = (usize, MsgKind<T>);

/// Build one `ChannelCollective` per rank, all wired to each other.
pub fn make_channel_collectives(num_processors: usize) -> Vec<ChannelCollective> {
    let mut senders = Vec::with_capacity(num_processors);
    let mut receivers = Vec::with_capacity(num_processors);
    for _ in 0..num_processors {
        let (tx, rx) = mpsc::channel::<Box<dyn Any + Send>>();
        senders.push(tx);
        receivers.push(rx);
    }
    receivers
        .into_iter()
        .enumerate()
        .map(|(rank, receiver)| ChannelCollective {
            rank,
            num_processors,
            senders: senders.clone(),
            receiver,
        })
        .collect()
}

impl ChannelCollective {
    fn broadcast_round<T: Send + 'static>(
        &self,
        sends: &[partghost::PeerSend<T>],
    ) -> Result<(), ExchangeError>
    where
        T: Clone,
    {
        let mut targeted = std::collections::HashSet::new();
        for ps in sends {
            targeted.insert(ps.peer);
            let data: Vec<T> = ps.data.borrow().clone();
            let envelope: Envelope<T> = (self.rank, MsgKind::Data(data));
            self.senders[ps.peer]
                .send(Box::new(envelope))
                .map_err(|e| ExchangeError::Collective(e.to_string()))?;
        }
        for peer in 0..self.num_processors {
            if peer != self.rank && !targeted.contains(&peer) {
                let envelope: Envelope<T> = (self.rank, MsgKind::Empty);
                self.senders[peer]
                    .send(Box::new(envelope))
                    .map_err(|e| ExchangeError::Collective(e.to_string()))?;
            }
        }
        Ok(())
    }
}

impl Collective for ChannelCollective {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_processors(&self) -> usize {
        self.num_processors
    }

    fn send_recv<T: Clone + Send + 'static>(
        &self,
        sends: &[partghost::PeerSend<T>],
        _opt: partghost::CollectiveOpt,
        recv: &mut Vec<T>,
    ) -> Result<RecvTopology, ExchangeError> {
        self.broadcast_round(sends)?;
        let mut peers = Vec::new();
        let mut sizes = Vec::new();
        for _ in 0..self.num_processors.saturating_sub(1) {
            let boxed = self
                .receiver
                .recv()
                .map_err(|e| ExchangeError::Collective(e.to_string()))?;
            let (from, kind) = *boxed
                .downcast::<Envelope<T>>()
                .expect("send_recv type mismatch between paired ranks");
            if let MsgKind::Data(data) = kind {
                if !data.is_empty() {
                    peers.push(from);
                    sizes.push(data.len());
                    recv.extend(data);
                }
            }
        }
        Ok(RecvTopology { peers, sizes })
    }

    fn send_recv_merge<T: Clone + Send + 'static, R: Reducer<T>>(
        &self,
        sends: &[partghost::PeerSend<T>],
        layout: &[RecvSlot],
        _opt: partghost::CollectiveOpt,
        recv: &mut [T],
        reducer: &R,
    ) -> Result<(), ExchangeError> {
        self.broadcast_round(sends)?;
        for _ in 0..self.num_processors.saturating_sub(1) {
            let boxed = self
                .receiver
                .recv()
                .map_err(|e| ExchangeError::Collective(e.to_string()))?;
            let (from, kind) = *boxed
                .downcast::<Envelope<T>>()
                .expect("send_recv_merge type mismatch between paired ranks");
            if let MsgKind::Data(data) = kind {
                if let Some(slot) = layout.iter().find(|s| s.peer == from) {
                    for (i, v) in data.into_iter().enumerate() {
                        reducer.reduce(&mut recv[slot.offset + i], &v);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Single-process periodic domain `[0, 1)` with a fixed ghost extent, used
/// by scenarios 1, 2, 3, 5 and 6. `ghost_processor_id_pair` always returns
/// empty — with one process there are no peer ghosts, only locally
/// synthesized periodic images.
pub struct Periodic1DSingleRank {
    pub extent: f64,
    pub query_count: Cell<usize>,
}

impl Periodic1DSingleRank {
    pub fn new(extent: f64) -> Self {
        Self {
            extent,
            query_count: Cell::new(0),
        }
    }

    fn bump(&self) {
        self.query_count.set(self.query_count.get() + 1);
    }
}

impl Decomposition<1, f64> for Periodic1DSingleRank {
    fn shift_vectors(&self) -> &[Point<1, f64>] {
        self.bump();
        // Leaked once per process: a fixed pair of shift vectors never
        // needs to vary at runtime for this fixture. Local images are
        // synthesized by subtracting the shift (see `ExchangeDriver`), so
        // the box near x=0 (combination `[1]`, shift_id 0) carries a
        // *negative* shift: subtracting it adds a full period, wrapping the
        // image to the high end of the domain.
        Box::leak(Box::new([Point::<1, f64>::new(-1.0), Point::<1, f64>::new(1.0)]))
    }

    fn convert_shift(&self, combination: &Combination<1>) -> usize {
        if combination.axes()[0] == 1 {
            0
        } else {
            1
        }
    }

    fn apply_point_bc(&self, point: &mut Point<1, f64>) {
        self.bump();
        if point[0] >= 1.0 {
            point[0] -= 1.0;
        } else if point[0] < 0.0 {
            point[0] += 1.0;
        }
    }

    fn is_inside(&self, _point: &Point<1, f64>) -> bool {
        true
    }

    fn processor_id(&self, _point: &Point<1, f64>) -> usize {
        self.bump();
        0
    }

    fn ghost_processor_id_pair(&self, _point: &Point<1, f64>, _unique: bool) -> Vec<(usize, usize)> {
        self.bump();
        Vec::new()
    }

    fn num_nn_processors(&self) -> usize {
        0
    }

    fn id_to_proc(&self, i: usize) -> usize {
        i
    }

    fn num_local_sub(&self) -> usize {
        1
    }

    fn local_n_ighost(&self, _sub: usize) -> usize {
        2
    }

    fn local_ighost_box(&self, _sub: usize, j: usize) -> Aabb<1, f64> {
        if j == 0 {
            Aabb::new(Point::<1, f64>::new(0.0), Point::<1, f64>::new(self.extent))
        } else {
            Aabb::new(Point::<1, f64>::new(1.0 - self.extent), Point::<1, f64>::new(1.0))
        }
    }

    fn local_ighost_combination(&self, _sub: usize, j: usize) -> Combination<1> {
        if j == 0 {
            Combination::new([1])
        } else {
            Combination::new([-1])
        }
    }

    fn generation(&self) -> u64 {
        0
    }

    fn num_processors(&self) -> usize {
        1
    }

    fn my_rank(&self) -> usize {
        0
    }
}

/// Two-process, non-periodic split of `[0, 1]` at `0.5`. Used by scenario 4
/// (map between two processes); no ghost region is exercised.
pub struct TwoProcSplit {
    pub my_rank: usize,
}

impl Decomposition<1, f64> for TwoProcSplit {
    fn shift_vectors(&self) -> &[Point<1, f64>] {
        &[]
    }

    fn convert_shift(&self, _combination: &Combination<1>) -> usize {
        0
    }

    fn apply_point_bc(&self, _point: &mut Point<1, f64>) {}

    fn is_inside(&self, _point: &Point<1, f64>) -> bool {
        true
    }

    fn processor_id(&self, point: &Point<1, f64>) -> usize {
        if point[0] < 0.5 {
            0
        } else {
            1
        }
    }

    fn ghost_processor_id_pair(&self, _point: &Point<1, f64>, _unique: bool) -> Vec<(usize, usize)> {
        Vec::new()
    }

    fn num_nn_processors(&self) -> usize {
        1
    }

    fn id_to_proc(&self, _i: usize) -> usize {
        if self.my_rank == 0 {
            1
        } else {
            0
        }
    }

    fn num_local_sub(&self) -> usize {
        1
    }

    fn local_n_ighost(&self, _sub: usize) -> usize {
        0
    }

    fn local_ighost_box(&self, _sub: usize, _j: usize) -> Aabb<1, f64> {
        Aabb::new(Point::<1, f64>::new(0.0), Point::<1, f64>::new(0.0))
    }

    fn local_ighost_combination(&self, _sub: usize, _j: usize) -> Combination<1> {
        Combination::zero()
    }

    fn generation(&self) -> u64 {
        0
    }

    fn num_processors(&self) -> usize {
        2
    }

    fn my_rank(&self) -> usize {
        self.my_rank
    }
}

/// Three-process, non-periodic split of `[0, 1)` into thirds, with only
/// adjacent ranks wired as near-neighbours (0 <-> 1 <-> 2, but never
/// 0 <-> 2 directly). A particle can still legally fold straight from rank
/// 2 to rank 0 — `processor_id` doesn't care about adjacency — which is
/// exactly what exercises `MAP_LOCAL`: the send to rank 0 is unaffected,
/// but rank 0 doesn't count rank 2 among its near-neighbours and so must
/// refuse the arrival rather than the sender refusing to send it.
pub struct ThreeProcLine {
    pub my_rank: usize,
}

impl Decomposition<1, f64> for ThreeProcLine {
    fn shift_vectors(&self) -> &[Point<1, f64>] {
        &[]
    }

    fn convert_shift(&self, _combination: &Combination<1>) -> usize {
        0
    }

    fn apply_point_bc(&self, _point: &mut Point<1, f64>) {}

    fn is_inside(&self, _point: &Point<1, f64>) -> bool {
        true
    }

    fn processor_id(&self, point: &Point<1, f64>) -> usize {
        if point[0] < 1.0 / 3.0 {
            0
        } else if point[0] < 2.0 / 3.0 {
            1
        } else {
            2
        }
    }

    fn ghost_processor_id_pair(&self, _point: &Point<1, f64>, _unique: bool) -> Vec<(usize, usize)> {
        Vec::new()
    }

    fn num_nn_processors(&self) -> usize {
        if self.my_rank == 1 {
            2
        } else {
            1
        }
    }

    fn id_to_proc(&self, i: usize) -> usize {
        match self.my_rank {
            0 => 1,
            1 => {
                if i == 0 {
                    0
                } else {
                    2
                }
            }
            2 => 1,
            _ => unreachable!("ThreeProcLine only has ranks 0..3"),
        }
    }

    fn num_local_sub(&self) -> usize {
        1
    }

    fn local_n_ighost(&self, _sub: usize) -> usize {
        0
    }

    fn local_ighost_box(&self, _sub: usize, _j: usize) -> Aabb<1, f64> {
        Aabb::new(Point::<1, f64>::new(0.0), Point::<1, f64>::new(0.0))
    }

    fn local_ighost_combination(&self, _sub: usize, _j: usize) -> Combination<1> {
        Combination::zero()
    }

    fn generation(&self) -> u64 {
        0
    }

    fn num_processors(&self) -> usize {
        3
    }

    fn my_rank(&self) -> usize {
        self.my_rank
    }
}
