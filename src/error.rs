//! Crate-root error taxonomy
//!
//! Each fallible subsystem raises its own `thiserror` enum close to where the
//! failure originates (`config::ConfigError`, `sets::ShapeError`,
//! `sets::NumericError`, `matrix_power::ExternalError`); [`EngineError`]
//! aggregates them with `#[from]` so call sites that don't care which
//! subsystem failed can use a single type. No variant here retries — all
//! failures propagate to the driver unchanged.

use crate::config::ConfigError;
use crate::matrix_power::ExternalError;
use crate::partition::PartitionError;
use crate::sets::{NumericError, ShapeError};

/// Top-level failure mode of a reachability or property-checking run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid configuration, surfaced before iteration begins.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Block-dimension mismatch or misaligned matrix-power rows.
    #[error(transparent)]
    Shape(#[from] ShapeError),
    /// Non-finite set coordinates or an unexpected empty intermediate set.
    #[error(transparent)]
    Numeric(#[from] NumericError),
    /// A collaborator (set algebra, matrix exponential, property predicate)
    /// reported failure.
    #[error(transparent)]
    External(#[from] ExternalError),
    /// Malformed partition or out-of-range/unsorted variables of interest
    /// (§4.1); treated as a configuration error by the taxonomy in §7.
    #[error(transparent)]
    Partition(#[from] PartitionError),
}

/// Convenience alias used throughout the engine's hot path.
pub type EngineResult<T> = Result<T, EngineError>;
