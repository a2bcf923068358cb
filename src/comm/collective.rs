//! The collective message-passing layer consumed (not built) by this crate.
//!
//! Every exchange entry point reduces, eventually, to one or more calls
//! here. Real deployments back this with MPI (or a GPU-direct transport
//! under `MAP_ON_DEVICE`); tests back it with an in-process loopback
//! (`tests/common`).

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::CollectiveOpt;
use crate::error::ExchangeError;
use crate::property::Reducer;

/// One peer's outgoing buffer. Backed by a retained pool slot
/// (`crate::comm::pool::RetainedBufferPool`) rather than an owned `Vec`, so
/// repeated exchanges on a stable topology reuse the same allocation. A real
/// transport reads through the borrow to get a contiguous pointer; an
/// in-process mock clones out before crossing a thread boundary, since `Rc`
/// itself is not `Send`.
pub struct PeerSend<T> {
    pub peer: usize,
    pub data: Rc<RefCell<Vec<T>>>,
}

impl<T> PeerSend<T> {
    pub fn new(peer: usize, data: Rc<RefCell<Vec<T>>>) -> Self {
        Self { peer, data }
    }
}

/// Receive topology discovered by a `send_recv` call: which peers actually
/// sent something, and how much.
#[derive(Debug, Clone, Default)]
pub struct RecvTopology {
    pub peers: Vec<usize>,
    pub sizes: Vec<usize>,
}

/// Where, in a destination slice, a given peer's reduced contribution
/// lands. Used by `send_recv_merge` so delivery order (which a real
/// transport does not guarantee) doesn't matter.
#[derive(Debug, Clone, Copy)]
pub struct RecvSlot {
    pub peer: usize,
    pub offset: usize,
    pub len: usize,
}

/// The collective layer's contract: `SSendRecv`, `SSendRecvP`, and
/// `SSendRecvP_op` in the original design.
pub trait Collective {
    fn rank(&self) -> usize;
    fn num_processors(&self) -> usize;

    /// Whether this instance can run a `MAP_ON_DEVICE` exchange. `false` by
    /// default; a GPU-direct transport overrides it.
    fn supports_device(&self) -> bool {
        false
    }

    fn processing_units(&self) -> usize {
        1
    }

    /// Scatter `sends` to their target peers and append everything
    /// addressed to this rank onto the end of `recv`, in the order peers
    /// are discovered. This is a blocking collective: every participating
    /// process must call it with matching semantics.
    fn send_recv<T: Clone + Send + 'static>(
        &self,
        sends: &[PeerSend<T>],
        opt: CollectiveOpt,
        recv: &mut Vec<T>,
    ) -> Result<RecvTopology, ExchangeError>;

    /// Scatter `sends` and reduce everything addressed to this rank into
    /// `recv`, placing each peer's contribution at the offset given by
    /// `layout` and combining with `reducer`. Used by `ghost_put_` and by
    /// the `SKIP_LABELLING` fast path of `ghost_get_`.
    fn send_recv_merge<T: Clone + Send + 'static, R: Reducer<T>>(
        &self,
        sends: &[PeerSend<T>],
        layout: &[RecvSlot],
        opt: CollectiveOpt,
        recv: &mut [T],
        reducer: &R,
    ) -> Result<(), ExchangeError>;
}
