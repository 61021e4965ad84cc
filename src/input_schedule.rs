//! Input accumulator schedule
//!
//! One [`MinkowskiSumArray`] per block accumulates the lazy sum `Ŵₖ` of that
//! block's contributions from the input set `U` across steps. Collapsing
//! (folding the array down to a single overapproximated term) happens on the
//! cadence given by a [`CollapseSchedule`]; the "forget prior summands"
//! memory optimization is the array's own job — this module just drives
//! *when* to call it, not *how*.

use crate::config::CollapseSchedule;
use crate::partition::Partition;
use crate::sets::{BlockPolicy, MinkowskiSumArray, NumericError, SetValue, ShapeError};

/// Per-block input accumulators for one run, plus the shared collapse
/// cadence.
#[derive(Debug, Clone)]
pub struct InputSchedule {
    accumulators: Vec<MinkowskiSumArray>,
    schedule: CollapseSchedule,
}

impl InputSchedule {
    /// One empty accumulator per block of `partition`.
    pub fn new(partition: &Partition, schedule: CollapseSchedule) -> Self {
        let accumulators = partition.iter().map(|b| MinkowskiSumArray::new(b.len())).collect();
        Self { accumulators, schedule }
    }

    /// Append a new input-set contribution to block `block`'s accumulator.
    pub fn push(&mut self, block: usize, term: SetValue) -> Result<(), ShapeError> {
        self.accumulators[block].push(term)
    }

    /// Lazy view of block `block`'s current accumulated sum `Ŵₖ`, without
    /// collapsing it.
    pub fn current(&self, block: usize) -> SetValue {
        self.accumulators[block].as_set_value()
    }

    /// Number of summands currently held for `block` (diagnostic / test
    /// hook into the memory-bound behavior of the collapse schedule).
    pub fn term_count(&self, block: usize) -> usize {
        self.accumulators[block].len()
    }

    /// Apply the collapse schedule for having just completed step `k`: every
    /// block whose schedule fires is folded down to a single
    /// overapproximated term under `policies[block]`.
    pub fn advance_step(&mut self, k: usize, policies: &[BlockPolicy]) -> Result<(), NumericError> {
        if !self.schedule.should_collapse(k) {
            return Ok(());
        }
        for (acc, &policy) in self.accumulators.iter_mut().zip(policies.iter()) {
            acc.collapse(policy)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(lo: f64, hi: f64) -> SetValue {
        SetValue::Interval { lo, hi }
    }

    #[test]
    fn push_rejects_wrong_block_dim() {
        let p = Partition::new(2, vec![0..2]).unwrap();
        let mut sched = InputSchedule::new(&p, CollapseSchedule::Always);
        assert!(sched.push(0, interval(0.0, 1.0)).is_err());
    }

    #[test]
    fn term_count_resets_on_collapse_with_constant_direction_policy() {
        let p = Partition::new(1, vec![0..1]).unwrap();
        let mut sched = InputSchedule::new(&p, CollapseSchedule::Every { period: 2 });
        sched.push(0, interval(0.0, 1.0)).unwrap();
        assert_eq!(sched.term_count(0), 1);
        sched.advance_step(1, &[BlockPolicy::Interval]).unwrap();
        // Schedule period 2: step 1 does not fire.
        assert_eq!(sched.term_count(0), 1);
        sched.push(0, interval(0.0, 1.0)).unwrap();
        assert_eq!(sched.term_count(0), 2);
        sched.advance_step(2, &[BlockPolicy::Interval]).unwrap();
        // Step 2 fires: constant-direction policy forgets, array collapses to 1.
        assert_eq!(sched.term_count(0), 1);
    }

    #[test]
    fn never_schedule_never_collapses() {
        let p = Partition::new(1, vec![0..1]).unwrap();
        let mut sched = InputSchedule::new(&p, CollapseSchedule::Never);
        for _ in 0..5 {
            sched.push(0, interval(0.0, 1.0)).unwrap();
        }
        sched.advance_step(5, &[BlockPolicy::Interval]).unwrap();
        assert_eq!(sched.term_count(0), 5);
    }

    #[test]
    fn eps_polygon_policy_retains_history_across_collapses() {
        let p = Partition::new(2, vec![0..2]).unwrap();
        let mut sched = InputSchedule::new(&p, CollapseSchedule::Always);
        sched
            .push(0, SetValue::Hyperrectangle { low: ndarray::Array1::zeros(2), high: ndarray::Array1::ones(2) })
            .unwrap();
        sched.advance_step(1, &[BlockPolicy::EpsPolygon { eps: 0.2 }]).unwrap();
        assert_eq!(sched.term_count(0), 1);
        sched
            .push(0, SetValue::Hyperrectangle { low: ndarray::Array1::zeros(2), high: ndarray::Array1::ones(2) })
            .unwrap();
        sched.advance_step(2, &[BlockPolicy::EpsPolygon { eps: 0.2 }]).unwrap();
        // history-dependent policy: nothing was dropped by the first collapse.
        assert_eq!(sched.term_count(0), 2);
    }

    #[test]
    fn current_is_accessible_without_forcing_a_collapse() {
        let p = Partition::new(1, vec![0..1]).unwrap();
        let mut sched = InputSchedule::new(&p, CollapseSchedule::Never);
        sched.push(0, interval(0.0, 2.0)).unwrap();
        let lazy = sched.current(0);
        assert_eq!(lazy.dim(), 1);
    }
}
