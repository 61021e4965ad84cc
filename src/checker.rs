//! Property-checking engine
//!
//! A storage-free variant of the block-propagation loop: drives the same
//! [`BlockEngine`] step function but never assembles a [`crate::flowpipe::Flowpipe`].
//! It replays the same per-step shape as a full run but only ever needs to
//! answer "did this check pass", not produce an artifact.
//!
//! Returns the first violating step index (1-based), or `0` if the property
//! holds throughout the horizon.

use crate::block_engine::{BlockEngine, EngineState, PropertyPredicate, TerminationKind};
use crate::error::EngineError;
use crate::matrix_power::MatrixPower;

/// Run `engine` to termination (or horizon), checking `predicate` against
/// the full state at every step including the terminal one (`eager`), or
/// only at the terminal step (non-eager).
///
/// `engine` must already have been constructed with no property predicate of
/// its own (`property: None`) — this driver owns the check itself so it can
/// report which step violated, not just that one did.
pub fn check<M: MatrixPower>(
    mut engine: BlockEngine<M>,
    predicate: PropertyPredicate,
    eager: bool,
) -> Result<usize, EngineError> {
    loop {
        let state = engine.step()?;
        match state {
            EngineState::Terminated(TerminationKind::Property) => {
                unreachable!("checker drives its own predicate; engine must be built with property: None")
            }
            EngineState::Terminated(_) => {
                if predicate(&engine.covered_state()) {
                    return Ok(engine.step_index());
                }
                return Ok(0);
            }
            _ => {
                if eager && predicate(&engine.covered_state()) {
                    return Ok(engine.step_index());
                }
            }
        }
    }
}
