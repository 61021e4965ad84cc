//! Partition & block index
//!
//! A [`Partition`] tiles `{1..n}` (0-indexed here: `{0..n}`) into an ordered
//! sequence of contiguous, ascending, non-empty blocks. Given a sorted subset
//! of variables of interest `V`, [`Partition::interesting_blocks`] computes
//! `blocks(V)` — the partition indices touching `V` — and
//! [`Partition::diff_blocks`] computes the complement. Both are returned
//! ascending; their union is always `{0..partition.len()}`.

#![allow(missing_docs)]

use std::ops::Range;

/// Errors raised while constructing or validating a [`Partition`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("block {index} is empty")]
    EmptyBlock { index: usize },
    #[error("partition has a gap or overlap at variable {var}: expected next block to start there")]
    NotContiguous { var: usize },
    #[error("partition covers {covered} variables but n = {n}")]
    CoverageMismatch { covered: usize, n: usize },
    #[error("variable {var} is out of range for n = {n}")]
    VarOutOfRange { var: usize, n: usize },
    #[error("variables of interest must be sorted and deduplicated (found {prev} before {next})")]
    VarsNotSorted { prev: usize, next: usize },
}

/// One contiguous, ascending range of variable indices (half-open).
pub type Block = Range<usize>;

/// An ordered partition of `{0..n}` into contiguous, non-empty blocks.
///
/// Invariant: block concatenation equals `0..n` exactly, in order (checked at
/// construction; the partition is immutable thereafter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    n: usize,
    blocks: Vec<Block>,
}

impl Partition {
    /// Build and validate a partition over `{0..n}` from an ordered sequence
    /// of contiguous blocks.
    pub fn new(n: usize, blocks: Vec<Block>) -> Result<Self, PartitionError> {
        let mut expected_start = 0usize;
        for (i, b) in blocks.iter().enumerate() {
            if b.is_empty() {
                return Err(PartitionError::EmptyBlock { index: i });
            }
            if b.start != expected_start {
                return Err(PartitionError::NotContiguous { var: expected_start });
            }
            expected_start = b.end;
        }
        if expected_start != n {
            return Err(PartitionError::CoverageMismatch { covered: expected_start, n });
        }
        Ok(Self { n, blocks })
    }

    /// The trivial single-block partition spanning all of `{0..n}`.
    pub fn trivial(n: usize) -> Result<Self, PartitionError> {
        Self::new(n, vec![0..n])
    }

    /// Number of state variables covered.
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of blocks.
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The `i`-th block's variable range.
    #[inline]
    pub fn block(&self, i: usize) -> &Block {
        &self.blocks[i]
    }

    /// Dimension (length) of block `i`.
    #[inline]
    pub fn block_dim(&self, i: usize) -> usize {
        self.blocks[i].len()
    }

    /// Iterate all blocks in partition order.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    /// Find which block contains variable `var`, if any.
    pub fn block_of(&self, var: usize) -> Option<usize> {
        if var >= self.n {
            return None;
        }
        // Blocks are contiguous and ascending: binary search on start.
        match self.blocks.binary_search_by(|b| {
            if var < b.start {
                std::cmp::Ordering::Greater
            } else if var >= b.end {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Equal
            }
        }) {
            Ok(i) => Some(i),
            Err(_) => None,
        }
    }

    fn validate_vars(&self, vars: &[usize]) -> Result<(), PartitionError> {
        let mut prev: Option<usize> = None;
        for &v in vars {
            if v >= self.n {
                return Err(PartitionError::VarOutOfRange { var: v, n: self.n });
            }
            if let Some(p) = prev {
                if v <= p {
                    return Err(PartitionError::VarsNotSorted { prev: p, next: v });
                }
            }
            prev = Some(v);
        }
        Ok(())
    }

    /// `blocks(V)`: the ascending, deduplicated set of block indices whose
    /// block contains at least one variable of `vars`. `vars` must be sorted
    /// ascending and deduplicated.
    pub fn interesting_blocks(&self, vars: &[usize]) -> Result<Vec<usize>, PartitionError> {
        self.validate_vars(vars)?;
        let mut out = Vec::new();
        for &v in vars {
            let bi = self.block_of(v).expect("validated in range");
            if out.last() != Some(&bi) {
                out.push(bi);
            }
        }
        Ok(out)
    }

    /// `diff_blocks(V)`: the ascending complement of [`interesting_blocks`]
    /// within `{0..self.len()}`.
    pub fn diff_blocks(&self, vars: &[usize]) -> Result<Vec<usize>, PartitionError> {
        let interesting = self.interesting_blocks(vars)?;
        let mut out = Vec::with_capacity(self.blocks.len() - interesting.len());
        let mut it = interesting.iter().peekable();
        for i in 0..self.blocks.len() {
            if it.peek() == Some(&&i) {
                it.next();
            } else {
                out.push(i);
            }
        }
        Ok(out)
    }

    /// All block indices in ascending order — used when `vars` is omitted
    /// (default: all variables of interest).
    pub fn all_blocks(&self) -> Vec<usize> {
        (0..self.blocks.len()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_gaps_and_overlaps() {
        assert_eq!(
            Partition::new(4, vec![0..2, 3..4]).unwrap_err(),
            PartitionError::NotContiguous { var: 2 }
        );
        assert_eq!(
            Partition::new(4, vec![0..3, 2..4]).unwrap_err(),
            PartitionError::NotContiguous { var: 3 }
        );
    }

    #[test]
    fn rejects_coverage_mismatch() {
        assert_eq!(
            Partition::new(5, vec![0..2, 2..4]).unwrap_err(),
            PartitionError::CoverageMismatch { covered: 4, n: 5 }
        );
    }

    #[test]
    fn rejects_empty_block() {
        assert_eq!(
            Partition::new(2, vec![0..0, 0..2]).unwrap_err(),
            PartitionError::EmptyBlock { index: 0 }
        );
    }

    #[test]
    fn interesting_and_diff_blocks_partition_p() {
        // 5D decoupled blocks: [0,1], [2,3], [4]
        let p = Partition::new(5, vec![0..2, 2..4, 4..5]).unwrap();
        let interesting = p.interesting_blocks(&[0, 1]).unwrap();
        assert_eq!(interesting, vec![0]);
        let diff = p.diff_blocks(&[0, 1]).unwrap();
        assert_eq!(diff, vec![1, 2]);

        // union covers 0..|P| exactly once.
        let mut union: Vec<usize> = interesting.iter().chain(diff.iter()).copied().collect();
        union.sort_unstable();
        assert_eq!(union, vec![0, 1, 2]);
    }

    #[test]
    fn vars_equal_all_gives_every_block_interesting() {
        let p = Partition::new(4, vec![0..2, 2..4]).unwrap();
        let all_vars: Vec<usize> = (0..4).collect();
        let interesting = p.interesting_blocks(&all_vars).unwrap();
        assert_eq!(interesting, vec![0, 1]);
        assert!(p.diff_blocks(&all_vars).unwrap().is_empty());
    }

    #[test]
    fn unsorted_vars_rejected() {
        let p = Partition::new(4, vec![0..2, 2..4]).unwrap();
        assert!(matches!(
            p.interesting_blocks(&[1, 0]),
            Err(PartitionError::VarsNotSorted { .. })
        ));
    }

    #[test]
    fn block_of_finds_containing_block() {
        let p = Partition::new(6, vec![0..1, 1..4, 4..6]).unwrap();
        assert_eq!(p.block_of(0), Some(0));
        assert_eq!(p.block_of(2), Some(1));
        assert_eq!(p.block_of(5), Some(2));
        assert_eq!(p.block_of(6), None);
    }
}
