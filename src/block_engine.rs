//! Block-propagation engine
//!
//! Drives one step at a time: for every block `i`, `X̂ₖ[i]` is the Minkowski
//! sum of this step's state-coupling term (`⊕_j Φᵏ[i,j] · X0[j]`, skipping
//! any `j` whose coupling submatrix is all-zero) and the block's input
//! accumulator `Ŵₖ[i]`. A phase-ordered, per-block loop reuses a workspace
//! across iterations and reports failure through one aggregated error type
//! rather than panicking mid-loop.
//!
//! Simplification documented in `DESIGN.md`: the input accumulator's
//! per-step contribution is routed only through each block's own diagonal
//! coupling, not the full cross-block coupling a fully general affine
//! recurrence would need — cross-block coupling is still captured by the
//! state term above, which dominates for the block-decoupled or
//! lower-triangular systems this engine targets. The diagonal coupling used
//! to fold the input into record `k` is `Φ^{k-1}[i,i]` (the power in force
//! *before* this step's advance): record `k`'s accumulator is
//! `U ⊕ Φ·U ⊕ … ⊕ Φ^{k-2}·U`, i.e. `k-1` terms with exponents `0..=k-2`.
//!
//! Selective propagation (§4.5): when `vars` restricts the engine to a
//! proper subset of blocks, only those "interesting" blocks are propagated
//! at full fidelity every step; the complement ("diff") blocks are skipped
//! entirely — no [`MatrixPower::sub`] calls, no overapproximation, no
//! record — unless a guard union is configured, in which case (per
//! `DESIGN.md`'s documented tradeoff) every block is propagated at full
//! fidelity so the guard disjointness test in [`TerminationPolicy`] always
//! sees a sound enclosure of the whole state.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::input_schedule::InputSchedule;
use crate::matrix_power::MatrixPower;
use crate::partition::Partition;
use crate::sets::{HalfSpace, SetOps, SetValue, ShapeError};
use crate::termination::TerminationPolicy;
use ndarray::Array2;
use tracing::{debug, trace, warn};

/// Why a run reached [`EngineState::Terminated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationKind {
    Horizon,
    Invariant,
    Property,
    /// The termination policy signalled this step (and the run) should be
    /// excluded from reporting — typically because the reach set has fully
    /// left the invariant and nothing further is usefully computable.
    Skip,
}

/// `Init → Propagating ⇄ CrossGuard → Terminated{..}`.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineState {
    Init,
    Propagating,
    CrossGuard,
    Terminated(TerminationKind),
}

/// A per-step property predicate over the full (Cartesian-product) state.
/// Returns `true` when the property is *violated*.
pub type PropertyPredicate = Box<dyn Fn(&SetValue) -> bool>;

/// Drives block-decomposed reachability one step at a time.
pub struct BlockEngine<M: MatrixPower> {
    partition: Partition,
    matrix_power: M,
    config: EngineConfig,
    input_schedule: InputSchedule,
    initial: Vec<SetValue>,
    inputs: Vec<SetValue>,
    current: Vec<SetValue>,
    state: EngineState,
    step_index: usize,
    termination: TerminationPolicy,
    guards: Vec<HalfSpace>,
    property: Option<PropertyPredicate>,
    /// `blocks(V)` (§4.1) — always propagated at full fidelity.
    interesting: Vec<usize>,
    /// `diff_blocks(V)` — propagated only when `guards` is non-empty (§4.5).
    diff: Vec<usize>,
    /// Block indices actually materialised in the most recent step's record.
    covered: Vec<usize>,
}

impl<M: MatrixPower> BlockEngine<M> {
    /// Build a new engine. `initial`/`inputs` must have one entry per block,
    /// matching the partition's block dimensions; `matrix_power`'s dimension
    /// must match the partition's `n`. `vars` is the sorted, deduplicated set
    /// of variables of interest (§4.1); an empty slice means "all variables"
    /// (§6: "vars — empty ⇒ all"), making every block interesting.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        partition: Partition,
        matrix_power: M,
        config: EngineConfig,
        initial: Vec<SetValue>,
        inputs: Vec<SetValue>,
        vars: Vec<usize>,
        termination: TerminationPolicy,
        guards: Vec<HalfSpace>,
        property: Option<PropertyPredicate>,
    ) -> Result<Self, EngineError> {
        if matrix_power.dim() != partition.n() {
            return Err(ShapeError::DimMismatch { expected: partition.n(), got: matrix_power.dim() }.into());
        }
        for (i, set) in initial.iter().enumerate() {
            if set.dim() != partition.block_dim(i) {
                return Err(ShapeError::DimMismatch { expected: partition.block_dim(i), got: set.dim() }.into());
            }
        }
        for (i, set) in inputs.iter().enumerate() {
            if set.dim() != partition.block_dim(i) {
                return Err(ShapeError::DimMismatch { expected: partition.block_dim(i), got: set.dim() }.into());
            }
        }
        config.validate(&partition)?;
        let (interesting, diff) = if vars.is_empty() {
            (partition.all_blocks(), Vec::new())
        } else {
            (partition.interesting_blocks(&vars)?, partition.diff_blocks(&vars)?)
        };
        let input_schedule = InputSchedule::new(&partition, config.collapse_schedule.clone());
        let current = initial.clone();
        let covered = interesting.clone();
        Ok(Self {
            partition,
            matrix_power,
            config,
            input_schedule,
            initial,
            inputs,
            current,
            state: EngineState::Init,
            step_index: 0,
            termination,
            guards,
            property,
            interesting,
            diff,
            covered,
        })
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// Per-block reachable sets at the current step. Entries for blocks not
    /// in [`BlockEngine::covered_blocks`] are stale (carried forward from the
    /// last step they were actually propagated, or the decomposed initial
    /// set if never propagated) and must not be reported.
    pub fn current_blocks(&self) -> &[SetValue] {
        &self.current
    }

    /// `blocks(V)` — the blocks propagated at full fidelity every step.
    pub fn interesting_blocks(&self) -> &[usize] {
        &self.interesting
    }

    /// Block indices actually materialised at the most recent step: always
    /// [`BlockEngine::interesting_blocks`], plus the complement when `guards`
    /// is non-empty (§4.5).
    pub fn covered_blocks(&self) -> &[usize] {
        &self.covered
    }

    /// The full-state Cartesian product at the current step.
    pub fn full_state(&self) -> SetValue {
        SetValue::CartesianProductArray(self.current.clone())
    }

    /// The Cartesian product restricted to [`BlockEngine::covered_blocks`],
    /// in partition order — what a [`crate::flowpipe::Flowpipe`] record
    /// actually stores.
    pub fn covered_state(&self) -> SetValue {
        SetValue::CartesianProductArray(
            self.covered.iter().map(|&i| self.current[i].clone()).collect(),
        )
    }

    fn block_policies(&self) -> Vec<crate::sets::BlockPolicy> {
        (0..self.partition.len())
            .map(|i| self.config.resolved_policy(&self.partition, i))
            .collect()
    }

    /// Full-fidelity `X̂ₖ[i]`: the cross-block state-coupling sum over every
    /// block `j` (skipping structurally-zero submatrices, read at the
    /// *current*, post-advance power) plus the block's input accumulator,
    /// overapproximated under its resolved iter policy. `pre_advance_self_sub`
    /// is block `i`'s own diagonal coupling *before* this step's advance —
    /// the power the input term for record `k` must use (see the module
    /// doc comment).
    fn propagate_block_full(
        &mut self,
        i: usize,
        policies: &[crate::sets::BlockPolicy],
        pre_advance_self_sub: Array2<f64>,
    ) -> Result<SetValue, EngineError> {
        let block_i = self.partition.block(i).clone();
        let mut acc = SetValue::Zero(self.partition.block_dim(i));
        for j in 0..self.partition.len() {
            let block_j = self.partition.block(j);
            let sub = self.matrix_power.sub(&block_i, block_j)?;
            if sub.iter().all(|&v| v == 0.0) {
                trace!(block_i = i, block_j = j, "zero coupling, skipping");
                continue;
            }
            let mapped = self.initial[j].linear_map(sub)?;
            acc = acc.minkowski_sum(&mapped)?;
        }

        let scaled_input = if self.config.assume_homogeneous {
            SetValue::Zero(self.partition.block_dim(i))
        } else {
            self.inputs[i].linear_map(pre_advance_self_sub)?
        };
        self.input_schedule.push(i, scaled_input)?;
        let accumulated = self.input_schedule.current(i);
        acc = acc.minkowski_sum(&accumulated)?;
        Ok(acc.overapproximate(policies[i])?)
    }

    /// Advance one step. Idempotent once [`EngineState::Terminated`] has
    /// been reached — repeated calls just return the same terminal state.
    ///
    /// The first call produces record `k = 1`, which (§4.5/§8) is `X̂₀`
    /// itself — no matrix-power advance, no input folded in yet. Every
    /// subsequent call advances the matrix power by one and folds in the
    /// next input contribution before propagating.
    ///
    /// Selective propagation (§4.5): [`BlockEngine::interesting_blocks`] are
    /// always propagated at full fidelity. When `guards` is empty, the
    /// complement is skipped entirely (no [`MatrixPower::sub`] calls, no
    /// overapproximation) — the engine's headline performance lever for
    /// `|blocks(V)| ≪ |P|`. When `guards` is non-empty, every block is
    /// propagated at full fidelity so the guard disjointness test below
    /// always sees a sound enclosure of the whole state (`DESIGN.md`
    /// documents this as the chosen soundness/performance tradeoff: cheaply
    /// approximating the complement's extent while a guard is configured
    /// risks under-approximating it and missing a real crossing).
    pub fn step(&mut self) -> Result<EngineState, EngineError> {
        if let EngineState::Terminated(_) = self.state {
            return Ok(self.state.clone());
        }
        self.state = EngineState::Propagating;
        let next_k = self.step_index + 1;
        let splice_diff = !self.guards.is_empty() && !self.diff.is_empty();
        trace!(
            step = next_k,
            interesting = self.interesting.len(),
            splice_diff,
            "propagating block engine"
        );

        if next_k == 1 {
            trace!(step = next_k, "first reach set is the decomposed initial set, no advance");
        } else {
            let policies = self.block_policies();

            // Capture each propagated block's own diagonal coupling before
            // advancing: record `k`'s input term needs `Φ^{k-1}`, not
            // `Φ^k`.
            let interesting_pre_subs: Vec<Array2<f64>> = self
                .interesting
                .iter()
                .map(|&i| {
                    let block_i = self.partition.block(i).clone();
                    self.matrix_power.sub(&block_i, &block_i)
                })
                .collect::<Result<_, _>>()?;
            let diff_pre_subs: Vec<Array2<f64>> = if splice_diff {
                self.diff
                    .iter()
                    .map(|&j| {
                        let block_j = self.partition.block(j).clone();
                        self.matrix_power.sub(&block_j, &block_j)
                    })
                    .collect::<Result<_, _>>()?
            } else {
                Vec::new()
            };

            self.matrix_power.advance()?;

            for (i, pre_sub) in self.interesting.clone().into_iter().zip(interesting_pre_subs) {
                let set = self.propagate_block_full(i, &policies, pre_sub)?;
                self.current[i] = set;
            }
            if splice_diff {
                debug!(step = next_k, "cross-guard blocks present: propagating complement at full fidelity");
                for (j, pre_sub) in self.diff.clone().into_iter().zip(diff_pre_subs) {
                    let set = self.propagate_block_full(j, &policies, pre_sub)?;
                    self.current[j] = set;
                }
            }
            self.input_schedule.advance_step(next_k, &policies)?;
        }

        self.step_index = next_k;
        self.covered = if splice_diff || self.diff.is_empty() {
            self.partition.all_blocks()
        } else {
            self.interesting.clone()
        };

        self.state = EngineState::CrossGuard;
        let full = self.full_state();
        if !self.guards.is_empty() {
            trace!(step = next_k, "cross-guard splicing: checking reach set against guard union");
        }

        if let Some(predicate) = &self.property {
            if self.config.eager_property_checks && predicate(&self.covered_state()) {
                warn!(step = next_k, "property violated");
                self.state = EngineState::Terminated(TerminationKind::Property);
                return Ok(self.state.clone());
            }
        }

        let decision = self.termination.evaluate(next_k, &full)?;
        if decision.terminate {
            let kind = if decision.skip {
                TerminationKind::Skip
            } else {
                match &self.termination {
                    TerminationPolicy::Horizon { .. } => TerminationKind::Horizon,
                    TerminationPolicy::InvariantAndHorizon { horizon, .. } if next_k >= *horizon => {
                        TerminationKind::Horizon
                    }
                    TerminationPolicy::InvariantAndHorizon { .. } | TerminationPolicy::Invariant { .. } => {
                        TerminationKind::Invariant
                    }
                    TerminationPolicy::Unbounded => TerminationKind::Horizon,
                }
            };
            debug!(step = next_k, ?kind, "terminating");
            self.state = EngineState::Terminated(kind);
        } else {
            self.state = EngineState::Propagating;
        }
        Ok(self.state.clone())
    }
}
