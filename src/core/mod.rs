//! Core data structures: particle storage and the per-call bookkeeping
//! tables the labeller fills and the packer reads.

pub mod particle_vector;
pub mod tables;

pub use particle_vector::ParticleVector;
pub use tables::{
    GhostEntry, LocalImageEntry, LocalImagesTable, MapEntry, MapTarget, OutgoingGhostTable,
    OutgoingMapTable, RecvBookkeeping,
};
