//! Ambient: configuration
//!
//! [`EngineConfig`] is the one typed option bag every driver builds once and
//! passes by reference into the engine: a plain struct constructed up
//! front and never mutated mid-run. [`EngineConfig::validate`] runs before
//! the first step so malformed
//! configuration surfaces as a [`ConfigError`] instead of panicking or
//! silently misbehaving deep inside the propagation loop.

use crate::partition::Partition;
use crate::sets::BlockPolicy;
use serde::{Deserialize, Serialize};

/// How an input accumulator decides when to collapse: represented as a
/// closed enum rather than an integer so "always"/"never" aren't magic
/// sentinel values. Not `Serialize`/`Deserialize` — [`CollapseSchedule::Predicate`]
/// carries a function pointer, so [`EngineConfig`] stores this field under
/// `#[serde(skip)]` the same way it already does for `block_policies`.
#[derive(Debug, Clone, Copy)]
pub enum CollapseSchedule {
    /// Collapse every step.
    Always,
    /// Never collapse — the accumulator grows without bound (diagnostic /
    /// small-horizon use only).
    Never,
    /// Collapse every `period` steps (`period` must be non-zero).
    Every { period: usize },
    /// Collapse on whatever steps `0` is true for. A plain function pointer
    /// rather than a boxed closure so the schedule stays `Copy`/`Debug`
    /// without hand-written impls.
    Predicate(fn(usize) -> bool),
}

impl Default for CollapseSchedule {
    fn default() -> Self {
        CollapseSchedule::Always
    }
}

impl CollapseSchedule {
    /// Should the accumulator collapse after having just produced step `k`
    /// (`k` is 1-based, matching the engine's step counter)?
    pub fn should_collapse(&self, k: usize) -> bool {
        match self {
            CollapseSchedule::Always => true,
            CollapseSchedule::Never => false,
            CollapseSchedule::Every { period } => *period != 0 && k % period == 0,
            CollapseSchedule::Predicate(f) => f(k),
        }
    }
}

/// Errors raised validating an [`EngineConfig`] before a run starts.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("horizon must be >= 1, got {0}")]
    ZeroHorizon(usize),
    #[error("step size delta must be finite and positive, got {0}")]
    InvalidDelta(f64),
    #[error("block policy for block {block} is Interval but block dimension is {dim}")]
    IntervalPolicyWrongDim { block: usize, dim: usize },
    #[error("collapse schedule period must be non-zero")]
    ZeroCollapsePeriod,
    #[error(
        "option {name} is a hybrid-automaton field and is not supported by this engine \
         (leave it at its default)"
    )]
    UnsupportedOption { name: &'static str },
}

/// Hybrid-automaton extension fields, accepted but inert: the wire/config
/// shape has room for a future hybrid-automaton engine, but this engine
/// only understands the default (no jumps, no invariant fixpoint search, no
/// clustering). [`EngineConfig::validate`]
/// rejects any non-default value explicitly rather than silently ignoring
/// it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HybridAutomatonOptions {
    pub max_jumps: Option<usize>,
    pub fixpoint_check: bool,
    pub clustering: Option<String>,
}

impl HybridAutomatonOptions {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_jumps.is_some() {
            return Err(ConfigError::UnsupportedOption { name: "max_jumps" });
        }
        if self.fixpoint_check {
            return Err(ConfigError::UnsupportedOption { name: "fixpoint_check" });
        }
        if self.clustering.is_some() {
            return Err(ConfigError::UnsupportedOption { name: "clustering" });
        }
        Ok(())
    }
}

/// The full set of run options for a reachability or property-checking run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of steps to compute. `Horizon` termination, if configured,
    /// caps at this value regardless.
    pub horizon: usize,
    /// Step size `δ` used by the matrix-power driver.
    pub delta: f64,
    /// Per-block overapproximation policy applied to `Ŵₖ`/state terms at
    /// every step (`block_options_iter`), indexed by block index.
    #[serde(skip)]
    pub block_policies: Vec<BlockPolicy>,
    /// Per-block overapproximation policy applied once while decomposing
    /// `X₀` (`block_options_init`, §4.2), indexed by block index.
    #[serde(skip)]
    pub block_policies_init: Vec<BlockPolicy>,
    /// Input accumulator collapse schedule.
    #[serde(skip)]
    pub collapse_schedule: CollapseSchedule,
    /// Eagerly check the property predicate at every step rather than only
    /// at the end (default: `true`).
    pub eager_property_checks: bool,
    /// Ignore the configured input set entirely, as though `U = {0}`
    /// (§6 `assume_homogeneous`).
    pub assume_homogeneous: bool,
    /// Treat lazy-exponential matrix rows as sparse (§6 `assume_sparse`).
    /// Not read by the engine itself — the matrix-power backend is
    /// constructed before `BlockEngine`, so a driver configuring
    /// [`crate::matrix_power::LazyExpMatrixPower`] reads this field and
    /// passes it to `with_assume_sparse` at construction time. Kept here
    /// rather than dropped so the option bag matches the full run-config
    /// surface callers build once and hand off.
    pub assume_sparse: bool,
    /// §4.2's decomposition shortcut: when the partition is the trivial
    /// single block spanning all of `X₀`'s dimension, retain `X₀` unchanged
    /// as that single block set instead of projecting and overapproximating
    /// it (§6 `lazy_X0`).
    pub lazy_x0: bool,
    /// Inert hybrid-automaton fields, present for forward wire compatibility.
    #[serde(default)]
    pub hybrid: HybridAutomatonOptions,
}

impl EngineConfig {
    /// Construct a config for `partition` with every block defaulted to
    /// [`BlockPolicy::None`] (resolved per-block at overapproximation time).
    pub fn new(partition: &Partition, horizon: usize, delta: f64) -> Self {
        Self {
            horizon,
            delta,
            block_policies: vec![BlockPolicy::None; partition.len()],
            block_policies_init: vec![BlockPolicy::None; partition.len()],
            collapse_schedule: CollapseSchedule::Always,
            eager_property_checks: true,
            assume_homogeneous: false,
            assume_sparse: false,
            lazy_x0: false,
            hybrid: HybridAutomatonOptions::default(),
        }
    }

    /// Validate internal consistency. Must be called once before a run
    /// begins; the engine itself never re-validates mid-loop.
    pub fn validate(&self, partition: &Partition) -> Result<(), ConfigError> {
        if self.horizon == 0 {
            return Err(ConfigError::ZeroHorizon(self.horizon));
        }
        if !self.delta.is_finite() || self.delta <= 0.0 {
            return Err(ConfigError::InvalidDelta(self.delta));
        }
        if let CollapseSchedule::Every { period } = self.collapse_schedule {
            if period == 0 {
                return Err(ConfigError::ZeroCollapsePeriod);
            }
        }
        for (i, policy) in self.block_policies.iter().enumerate() {
            if matches!(policy, BlockPolicy::Interval) && partition.block_dim(i) != 1 {
                return Err(ConfigError::IntervalPolicyWrongDim {
                    block: i,
                    dim: partition.block_dim(i),
                });
            }
        }
        for (i, policy) in self.block_policies_init.iter().enumerate() {
            if matches!(policy, BlockPolicy::Interval) && partition.block_dim(i) != 1 {
                return Err(ConfigError::IntervalPolicyWrongDim {
                    block: i,
                    dim: partition.block_dim(i),
                });
            }
        }
        self.hybrid.validate()?;
        Ok(())
    }

    /// Resolved *iter* policy for block `i` (never `None`; see [`BlockPolicy::resolved`]).
    pub fn resolved_policy(&self, partition: &Partition, i: usize) -> BlockPolicy {
        self.block_policies
            .get(i)
            .copied()
            .unwrap_or(BlockPolicy::None)
            .resolved(partition.block_dim(i))
    }

    /// Resolved *init* policy for block `i`, used only while decomposing `X₀`
    /// (§4.2).
    pub fn resolved_init_policy(&self, partition: &Partition, i: usize) -> BlockPolicy {
        self.block_policies_init
            .get(i)
            .copied()
            .unwrap_or(BlockPolicy::None)
            .resolved(partition.block_dim(i))
    }
}
