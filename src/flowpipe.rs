//! Flowpipe assembly
//!
//! An ordered, append-only, possibly-truncated sequence of timestamped
//! reach-set records: fields assembled once per run, in order, never
//! mutated after the fact. [`Flowpipe::from_run`] drives a [`BlockEngine`] to termination and
//! truncates the sequence at whatever step ended propagation. If an
//! `output_function` is configured, it transforms each stored record
//! rather than merely being accepted and ignored.

use crate::block_engine::{BlockEngine, EngineState, TerminationKind};
use crate::error::EngineError;
use crate::matrix_power::MatrixPower;
use crate::sets::SetValue;

/// One timestamped reach-set record.
#[derive(Debug, Clone)]
pub struct ReachRecord {
    pub step: usize,
    /// Start of the time interval this record covers, `(step - 1) * delta`.
    pub t_start: f64,
    /// End of the time interval this record covers, `step * delta`.
    pub t_end: f64,
    /// The reach set at this step restricted to [`BlockEngine::covered_blocks`],
    /// after `output_function` has been applied if one was configured.
    pub state: SetValue,
    /// The partition block indices `state` actually covers, in partition
    /// order (§3: "the set of partition blocks it covers").
    pub covered_blocks: Vec<usize>,
}

/// An ordered, append-only sequence of [`ReachRecord`]s, possibly truncated
/// before the configured horizon by early termination.
#[derive(Debug, Clone)]
pub struct Flowpipe {
    records: Vec<ReachRecord>,
    truncated_at: Option<TerminationKind>,
}

impl Flowpipe {
    /// Drive `engine` step by step until it terminates, recording one
    /// [`ReachRecord`] per non-skipped step. `delta` is the step size used to
    /// stamp each record's `[t_start, t_end]` interval (`t_end = step *
    /// delta`). `output_function`, if given, transforms the full-state set
    /// before it's stored — e.g. projecting onto a subset of variables for
    /// reporting.
    pub fn from_run<M: MatrixPower>(
        mut engine: BlockEngine<M>,
        delta: f64,
        output_function: Option<&dyn Fn(SetValue) -> SetValue>,
    ) -> Result<Self, EngineError> {
        let mut records = Vec::new();
        let mut truncated_at = None;
        loop {
            let state = engine.step()?;
            match state {
                EngineState::Terminated(kind) => {
                    if kind != TerminationKind::Skip {
                        records.push(make_record(&engine, delta, output_function));
                    }
                    if kind != TerminationKind::Horizon {
                        truncated_at = Some(kind);
                    }
                    break;
                }
                _ => {
                    records.push(make_record(&engine, delta, output_function));
                }
            }
        }
        Ok(Self { records, truncated_at })
    }

    pub fn records(&self) -> &[ReachRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `Some(reason)` if the run ended before exhausting its horizon
    /// normally (invariant escape, property violation, or an explicit skip).
    pub fn truncated_at(&self) -> Option<TerminationKind> {
        self.truncated_at
    }
}

fn make_record<M: MatrixPower>(
    engine: &BlockEngine<M>,
    delta: f64,
    output_function: Option<&dyn Fn(SetValue) -> SetValue>,
) -> ReachRecord {
    let raw = engine.covered_state();
    let state = match output_function {
        Some(f) => f(raw),
        None => raw,
    };
    let step = engine.step_index();
    ReachRecord {
        step,
        t_start: (step - 1) as f64 * delta,
        t_end: step as f64 * delta,
        state,
        covered_blocks: engine.covered_blocks().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::matrix_power::DenseMatrixPower;
    use crate::partition::Partition;
    use crate::termination::TerminationPolicy;
    use ndarray::Array2;

    fn build(horizon: usize, termination: TerminationPolicy) -> BlockEngine<DenseMatrixPower> {
        let partition = Partition::new(1, vec![0..1]).unwrap();
        let mp = DenseMatrixPower::new(Array2::eye(1)).unwrap();
        let config = EngineConfig::new(&partition, horizon, 1.0);
        BlockEngine::new(
            partition,
            mp,
            config,
            vec![SetValue::Interval { lo: 0.0, hi: 0.0 }],
            vec![SetValue::Interval { lo: 1.0, hi: 1.0 }],
            vec![],
            termination,
            vec![],
            None,
        )
        .unwrap()
    }

    #[test]
    fn horizon_run_produces_exactly_horizon_records() {
        let engine = build(4, TerminationPolicy::Horizon { horizon: 4 });
        let fp = Flowpipe::from_run(engine, 0.1, None).unwrap();
        assert_eq!(fp.len(), 4);
        assert_eq!(fp.truncated_at(), None);
        assert!((fp.records()[3].t_start - 0.3).abs() < 1e-9);
        assert!((fp.records()[3].t_end - 0.4).abs() < 1e-9);
    }

    #[test]
    fn invariant_escape_truncates_before_horizon() {
        use crate::sets::HalfSpace;
        use ndarray::Array1;
        let guard = vec![HalfSpace { normal: Array1::from(vec![1.0]), offset: 1.5 }];
        let engine = build(10, TerminationPolicy::Invariant { guards: guard });
        let fp = Flowpipe::from_run(engine, 1.0, None).unwrap();
        assert!(fp.len() < 10);
        assert_eq!(fp.truncated_at(), Some(TerminationKind::Skip));
    }

    #[test]
    fn output_function_transforms_stored_records() {
        let engine = build(2, TerminationPolicy::Horizon { horizon: 2 });
        let project = |s: SetValue| -> SetValue {
            match s {
                SetValue::CartesianProductArray(blocks) => blocks.into_iter().next().unwrap(),
                other => other,
            }
        };
        let fp = Flowpipe::from_run(engine, 1.0, Some(&project)).unwrap();
        assert!(matches!(fp.records()[0].state, SetValue::Interval { .. }));
    }
}
