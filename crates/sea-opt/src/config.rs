//! Driver configuration: a small, `Default`-able, serde-able options
//! struct threaded into the engine rather than read from globals.

use serde::{Deserialize, Serialize};

/// Tunables for [`crate::driver::Driver::run`]. None of these change the
/// *result* of a fixpoint that would otherwise terminate; they bound how
/// far a misbehaving caller (cyclic input that was supposed to be
/// monotone, but isn't, due to a caller bug upstream) can run before the
/// driver gives up with `SeaError::Unsupported`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Hard ceiling on driver iterations, so a misbehaving caller cannot
    /// hang the host process. `None` means unbounded.
    pub max_iterations: Option<usize>,
    /// Whether an escape through the program root forces hard widening.
    pub widen_escapes: bool,
    /// Emit a `tracing` event per worklist pop, for step-by-step
    /// debugging of the fixpoint.
    pub trace: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            max_iterations: Some(1_000_000),
            widen_escapes: true,
            trace: false,
        }
    }
}
