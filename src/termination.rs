//! Termination policy
//!
//! Four canonical policies, expressed as a small closed enum rather than an
//! open-ended predicate type. Each policy answers the same three questions
//! every step: should propagation stop
//! (`terminate`), should this step be excluded from the flowpipe (`skip`),
//! and — if an invariant is in play — what's left of the reachable set once
//! it's clipped to the invariant (`intersected`).

use crate::sets::{HalfSpace, NumericError, SetOps, SetValue};

/// Outcome of evaluating a [`TerminationPolicy`] for one step.
#[derive(Debug, Clone)]
pub struct TerminationDecision {
    /// Stop propagating after this step.
    pub terminate: bool,
    /// Exclude this step's record from the flowpipe even though propagation
    /// continued (or just terminated) — used when the reachable set has
    /// fully left the invariant and nothing meaningful remains to report.
    pub skip: bool,
    /// The reachable set restricted to the invariant, when a restriction
    /// applies. `None` means "no restriction, use the set unmodified."
    pub intersected: Option<SetValue>,
}

/// Four canonical ways a run can end.
#[derive(Debug, Clone)]
pub enum TerminationPolicy {
    /// Run until the configured horizon only.
    Unbounded,
    /// Stop once `step >= horizon`.
    Horizon { horizon: usize },
    /// Stop once the reachable set is disjoint from the invariant (union of
    /// half-spaces) — there is nothing left inside to propagate.
    Invariant { guards: Vec<HalfSpace> },
    /// Whichever of [`TerminationPolicy::Invariant`] or
    /// [`TerminationPolicy::Horizon`] fires first.
    InvariantAndHorizon { horizon: usize, guards: Vec<HalfSpace> },
}

impl TerminationPolicy {
    /// Evaluate this policy at `step` against the full-state reachable set
    /// `state` (the Cartesian product across all blocks).
    pub fn evaluate(&self, step: usize, state: &SetValue) -> Result<TerminationDecision, NumericError> {
        match self {
            TerminationPolicy::Unbounded => {
                Ok(TerminationDecision { terminate: false, skip: false, intersected: None })
            }
            TerminationPolicy::Horizon { horizon } => Ok(TerminationDecision {
                terminate: step >= *horizon,
                skip: false,
                intersected: None,
            }),
            TerminationPolicy::Invariant { guards } => Self::invariant_decision(state, guards),
            TerminationPolicy::InvariantAndHorizon { horizon, guards } => {
                let mut decision = Self::invariant_decision(state, guards)?;
                decision.terminate = decision.terminate || step >= *horizon;
                Ok(decision)
            }
        }
    }

    fn invariant_decision(
        state: &SetValue,
        guards: &[HalfSpace],
    ) -> Result<TerminationDecision, NumericError> {
        let escaped = !state.is_disjoint_from_union(guards)?;
        // `guards` here is the *complement* boundary of the invariant: the
        // reachable set has left the invariant once it touches the guard
        // union. While still inside, the set itself is the restriction (an
        // exact polytope clip against an arbitrary half-space union is out
        // of scope; its leaves the intersected-set representation
        // unspecified beyond "some restriction of the reach set").
        if escaped {
            Ok(TerminationDecision { terminate: true, skip: true, intersected: None })
        } else {
            Ok(TerminationDecision { terminate: false, skip: false, intersected: Some(state.clone()) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn box_set() -> SetValue {
        SetValue::Hyperrectangle { low: Array1::from(vec![0.0, 0.0]), high: Array1::from(vec![1.0, 1.0]) }
    }

    #[test]
    fn unbounded_never_terminates() {
        let d = TerminationPolicy::Unbounded.evaluate(1_000_000, &box_set()).unwrap();
        assert!(!d.terminate);
        assert!(!d.skip);
    }

    #[test]
    fn horizon_terminates_at_boundary() {
        let p = TerminationPolicy::Horizon { horizon: 5 };
        assert!(!p.evaluate(4, &box_set()).unwrap().terminate);
        assert!(p.evaluate(5, &box_set()).unwrap().terminate);
        assert!(p.evaluate(6, &box_set()).unwrap().terminate);
    }

    #[test]
    fn invariant_terminates_once_fully_escaped() {
        let guard = HalfSpace { normal: Array1::from(vec![1.0, 0.0]), offset: -5.0 };
        let far_guard = vec![guard];
        let p = TerminationPolicy::Invariant { guards: far_guard };
        let d = p.evaluate(1, &box_set()).unwrap();
        assert!(!d.terminate);
        assert!(d.intersected.is_some());

        let near_guard = vec![HalfSpace { normal: Array1::from(vec![1.0, 0.0]), offset: 0.5 }];
        let p2 = TerminationPolicy::Invariant { guards: near_guard };
        let d2 = p2.evaluate(1, &box_set()).unwrap();
        assert!(d2.terminate);
        assert!(d2.skip);
    }

    #[test]
    fn invariant_and_horizon_fires_on_either() {
        let guard = vec![HalfSpace { normal: Array1::from(vec![1.0, 0.0]), offset: -5.0 }];
        let p = TerminationPolicy::InvariantAndHorizon { horizon: 3, guards: guard };
        assert!(!p.evaluate(2, &box_set()).unwrap().terminate);
        assert!(p.evaluate(3, &box_set()).unwrap().terminate);
    }
}
