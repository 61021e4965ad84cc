//! Block-decomposed reachability for linear time-invariant systems.
//!
//! Given `x' = A x + u`, `x(0) ∈ X₀`, `u(t) ∈ U`, this crate computes a
//! sequence of per-step overapproximations `X̂₁ .. X̂_N` of the true
//! reachable set, by partitioning the state space into independent blocks
//! and propagating each block's contribution separately before recombining
//! them as a Cartesian product. The shape of that pipeline:
//!
//! - [`partition`] tiles the state variables into contiguous blocks and
//!   answers "which blocks touch variable set V" ([`partition::Partition`]).
//! - [`sets`] is the lazy set algebra every block's reach set is expressed
//!   in ([`sets::SetOps`], [`sets::SetValue`]).
//! - [`decompose`] projects a full-dimension `X₀` onto each block and
//!   overapproximates it under that block's init policy, producing the
//!   `X̂₀` a [`BlockEngine`] is constructed from.
//! - [`input_schedule`] accumulates each block's lazy input contribution
//!   across steps, collapsing on a configurable cadence.
//! - [`matrix_power`] advances the discrete transition matrix `Φ = exp(A·δ)`
//!   one power at a time, behind sparse/dense/lazy-exponential backends.
//! - [`block_engine`] is the per-step propagation loop itself, a small state
//!   machine ([`block_engine::EngineState`]) driven one step at a time.
//! - [`termination`] decides when a run stops (horizon, invariant escape, or
//!   both).
//! - [`checker`] is the storage-free variant of the engine loop used to
//!   answer "does this property hold" rather than "what's the flowpipe".
//! - [`flowpipe`] assembles the ordered, possibly-truncated sequence of
//!   reach-set records a normal run produces.
//!
//! Invariants held throughout: every per-step set is an *overapproximation*
//! of the true reachable set (never tighter); [`partition::Partition::interesting_blocks`]
//! and [`partition::Partition::diff_blocks`] always partition the block
//! index set exactly; replacing any block's overapproximation policy with a
//! strictly looser one can only grow that block's reported sets, never
//! shrink them.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod block_engine;
pub mod checker;
pub mod config;
pub mod decompose;
pub mod error;
pub mod flowpipe;
pub mod input_schedule;
pub mod matrix_power;
pub mod partition;
pub mod sets;
pub mod termination;

pub use block_engine::{BlockEngine, EngineState, PropertyPredicate, TerminationKind};
pub use config::{CollapseSchedule, ConfigError, EngineConfig, HybridAutomatonOptions};
pub use decompose::decompose_initial;
pub use error::{EngineError, EngineResult};
pub use flowpipe::{Flowpipe, ReachRecord};
pub use input_schedule::InputSchedule;
pub use matrix_power::{
    DenseMatrixPower, ExpRowExtractor, ExternalError, LazyExpMatrixPower, MatrixPower,
    SparseMatrixPower, TruncatedSeriesExtractor,
};
pub use partition::{Block, Partition, PartitionError};
pub use sets::{
    BlockPolicy, HalfSpace, MinkowskiSumArray, NumericError, SetOps, SetValue, ShapeError,
    TemplateKind,
};
pub use termination::{TerminationDecision, TerminationPolicy};

/// Run `engine` to termination, assembling the flowpipe. Equivalent to
/// calling [`flowpipe::Flowpipe::from_run`] directly; kept as a top-level
/// entry point so callers don't need to import the `flowpipe` module for
/// the common case.
pub fn reach<M: MatrixPower>(
    engine: BlockEngine<M>,
    delta: f64,
    output_function: Option<&dyn Fn(SetValue) -> SetValue>,
) -> EngineResult<Flowpipe> {
    Flowpipe::from_run(engine, delta, output_function)
}

/// Run `engine` to termination (or violation), checking `predicate` against
/// the full state each step (`eager`) or only once propagation otherwise
/// stops. Returns the first violating step index, or `0` if the property
/// held throughout.
pub fn check<M: MatrixPower>(
    engine: BlockEngine<M>,
    predicate: PropertyPredicate,
    eager: bool,
) -> EngineResult<usize> {
    checker::check(engine, predicate, eager)
}
