//! Error kinds surfaced by the exchange driver.
//!
//! Most runtime failure modes in this crate are either fatal (collective
//! failure) or diagnosed-and-ignored (protocol misuse, teardown invariant
//! violations). See `SPEC_FULL.md` section 7 for the rationale behind which
//! kind gets which treatment.

/// Errors a caller of [`crate::exchange::ExchangeDriver`] can act on.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// `MAP_ON_DEVICE` was requested but the collective layer reports no
    /// device support. Configuration error: no attempt is made to emulate
    /// the device path on the host.
    #[error("MAP_ON_DEVICE requested but the collective layer has no device support")]
    DeviceUnsupported,

    /// `ghost_put_` was called without a matching prior `ghost_get_`. The
    /// call still completes (the local-image range it finds is simply
    /// empty or stale), but the condition is reported rather than silently
    /// tolerated.
    #[error("ghost_put called without a preceding ghost_get (|v_prp| - lg_m != |o_part_loc|)")]
    MissingGhostGet,

    /// The collective layer failed. Fatal for the job: there is no retry at
    /// this layer.
    #[error("collective layer failure: {0}")]
    Collective(String),
}
