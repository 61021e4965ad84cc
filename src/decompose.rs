//! Decomposition of `X₀` (§4.2, consumer of C1)
//!
//! Projects a full-dimension initial set onto each block of a [`Partition`]
//! and overapproximates the projection under that block's *init* policy,
//! producing the per-block `X̂₀` a [`crate::block_engine::BlockEngine`] is
//! built from. The trivial single-block passthrough shortcut (`lazy_X0`)
//! skips projection and overapproximation entirely when the caller already
//! knows the set needs no splitting.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::partition::Partition;
use crate::sets::{SetOps, SetValue};
use ndarray::Array2;

/// Build `X̂₀ := [approx_i(π_{P[i]}(x0))]_i`.
///
/// When `config.lazy_x0` is set and `partition` is the trivial single block
/// spanning all of `x0`'s dimension, `x0` is returned unchanged as that one
/// block's set (§4.2's shortcut) regardless of the configured init policy.
pub fn decompose_initial(
    x0: &SetValue,
    partition: &Partition,
    config: &EngineConfig,
) -> Result<Vec<SetValue>, EngineError> {
    if config.lazy_x0 && partition.len() == 1 && partition.block_dim(0) == x0.dim() {
        return Ok(vec![x0.clone()]);
    }
    let mut blocks = Vec::with_capacity(partition.len());
    for i in 0..partition.len() {
        let block = partition.block(i);
        let mut proj = Array2::<f64>::zeros((block.len(), x0.dim()));
        for (row, col) in block.clone().enumerate() {
            proj[[row, col]] = 1.0;
        }
        let projected = x0.linear_map(proj)?;
        let policy = config.resolved_init_policy(partition, i);
        blocks.push(projected.overapproximate(policy)?);
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sets::BlockPolicy;
    use ndarray::Array1;

    #[test]
    fn projects_each_block_onto_its_own_coordinates() {
        let partition = Partition::new(3, vec![0..2, 2..3]).unwrap();
        let config = EngineConfig::new(&partition, 1, 1.0);
        let x0 = SetValue::Hyperrectangle {
            low: Array1::from(vec![-1.0, -2.0, 5.0]),
            high: Array1::from(vec![1.0, 2.0, 5.0]),
        };
        let blocks = decompose_initial(&x0, &partition, &config).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].dim(), 2);
        assert_eq!(blocks[1].dim(), 1);
        assert!((blocks[0].support(&Array1::from(vec![1.0, 0.0])).unwrap() - 1.0).abs() < 1e-9);
        assert!((blocks[1].support(&Array1::from(vec![1.0])).unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn lazy_x0_shortcut_retains_the_original_set_unchanged() {
        let partition = Partition::trivial(2).unwrap();
        let mut config = EngineConfig::new(&partition, 1, 1.0);
        config.lazy_x0 = true;
        // An init policy that would otherwise overapproximate to a box — the
        // shortcut must bypass it entirely.
        config.block_policies_init[0] = BlockPolicy::Hyperrectangle;
        let x0 = SetValue::Template {
            dim: 2,
            directions: vec![Array1::from(vec![1.0, 0.0])],
            offsets: vec![3.0],
        };
        let blocks = decompose_initial(&x0, &partition, &config).unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(matches!(blocks[0], SetValue::Template { .. }));
    }

    #[test]
    fn without_lazy_x0_a_trivial_partition_still_projects_and_overapproximates() {
        let partition = Partition::trivial(1).unwrap();
        let mut config = EngineConfig::new(&partition, 1, 1.0);
        config.block_policies_init[0] = BlockPolicy::Interval;
        let x0 = SetValue::Hyperrectangle { low: Array1::from(vec![-1.0]), high: Array1::from(vec![2.0]) };
        let blocks = decompose_initial(&x0, &partition, &config).unwrap();
        assert!(matches!(blocks[0], SetValue::Interval { .. }));
    }
}
