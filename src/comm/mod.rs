//! Communication layer: the collective trait consumed by this crate, the
//! retained buffer pool, and the packer/unpacker built on top of both.

pub mod collective;
pub mod pack;
pub mod pool;

pub use collective::{Collective, PeerSend, RecvSlot, RecvTopology};
pub use pack::{pack_ghost_positions, pack_ghost_properties, pack_map, unpack_append_positions, unpack_append_properties, MapSendBuffers};
pub use pool::{pool_size, BufferLayout, RetainedBufferPool};
