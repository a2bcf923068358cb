//! Communication core for a distributed particle container.
//!
//! This crate implements the three operations a domain-decomposed
//! particle-in-cell / mesh-free simulation needs to keep its local storage
//! consistent with a geometric decomposition owned elsewhere:
//!
//! - [`exchange::ExchangeDriver::map_`] — redistribute particles that have
//!   drifted out of their owning sub-domain.
//! - [`exchange::ExchangeDriver::ghost_get_`] — replicate a property subset
//!   of every particle visible across a sub-domain boundary, including
//!   periodic self-images.
//! - [`exchange::ExchangeDriver::ghost_put_`] — reduce ghost-resident
//!   contributions back into their owners.
//!
//! The geometric decomposition and the collective message-passing layer are
//! consumed through the [`domain::Decomposition`] and [`comm::Collective`]
//! traits rather than built here; this crate only owns the bookkeeping that
//! sits between them and particle storage.

pub mod comm;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod geometry;
pub mod labeller;
pub mod math;
pub mod property;

pub use comm::{Collective, PeerSend, RecvSlot, RecvTopology};
pub use config::{CollectiveOpt, ExchangeOptions, DEFAULT_DECOMPOSITION_GRANULARITY};
pub use core::ParticleVector;
pub use domain::{Decomposition, OutOfBoundOutcome, OutOfBoundPolicy};
pub use error::ExchangeError;
pub use exchange::ExchangeDriver;
pub use math::{Aabb, Combination, Point, Real};
pub use property::{Max, PropertySubset, Reducer, Replace, Sum};
