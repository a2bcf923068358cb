//! Bit-OR-combinable flags for the exchange entry points and for the
//! collective layer they sit on top of.

bitflags::bitflags! {
    /// Flags accepted by `map_`, `ghost_get_`, and `ghost_put_`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ExchangeOptions: u32 {
        /// ghost_get exchanges positions. Part of the default.
        const WITH_POSITION = 1 << 0;
        /// ghost_get exchanges properties only.
        const NO_POSITION = 1 << 1;
        /// Reuse cached labelling and receive topology from the previous
        /// non-skipped call of the same kind.
        const SKIP_LABELLING = 1 << 2;
        /// Caller guarantees peer sizes are unchanged since the last call,
        /// enabling the collective layer's RECEIVE_KNOWN fast path.
        const NO_CHANGE_ELEMENTS = 1 << 3;
        /// Preserve existing ghost property contents where not overwritten.
        /// Alias of SKIP_LABELLING in effect (same bit).
        const KEEP_PROPERTIES = 1 << 2;
        /// Run map entirely on device buffers.
        const MAP_ON_DEVICE = 1 << 4;
        /// Restrict map's receive set to the decomposition's near-neighbour
        /// processes.
        const MAP_LOCAL = 1 << 5;
        /// At decomposition-init time, derive the grid division from a
        /// symmetric cell list sized by the ghost extent.
        const BIND_DEC_TO_GHOST = 1 << 6;
    }
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        ExchangeOptions::WITH_POSITION
    }
}

bitflags::bitflags! {
    /// Opt bits passed down to the collective layer.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CollectiveOpt: u32 {
        const RECEIVE_KNOWN = 1 << 0;
        const KNOWN_ELEMENT_OR_BYTE = 1 << 1;
        const GPU_DIRECT = 1 << 2;
    }
}

/// Derive the collective-layer opt bits from the exchange-level options, per
/// `compute_options` in the original design: `NO_CHANGE_ELEMENTS` is the only
/// flag that currently projects onto a wire-level fast path.
pub fn compute_collective_opt(opt: ExchangeOptions) -> CollectiveOpt {
    let mut opt_ = CollectiveOpt::empty();
    if opt.contains(ExchangeOptions::NO_CHANGE_ELEMENTS) {
        opt_ |= CollectiveOpt::RECEIVE_KNOWN | CollectiveOpt::KNOWN_ELEMENT_OR_BYTE;
    }
    if opt.contains(ExchangeOptions::MAP_ON_DEVICE) {
        opt_ |= CollectiveOpt::GPU_DIRECT;
    }
    opt_
}
