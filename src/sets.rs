//! Lazy set algebra
//!
//! A closed tagged variant over the concrete set kinds the engine actually
//! produces or consumes ([`SetValue`]), combined with a capability trait
//! ([`SetOps`]) exposing the handful of operations the engine core calls
//! through — polymorphism over set representations means the engine
//! (`block_engine`, `input_schedule`) only ever goes through [`SetOps`]; the
//! variant and its geometry live here.
//!
//! The set-theoretic primitives (Minkowski sum, linear map, overapproximation,
//! disjointness) are treated as a self-contained concern here — a full
//! polyhedral/support-function library is out of scope. What's implemented
//! here is the minimal concrete backing needed to exercise the engine
//! end-to-end: axis-aligned boxes, 1-D intervals, a handful of fixed
//! template-direction polytopes (box / octagon / box+diagonals), and a
//! direction-sampled polygon standing in for "ε-close" refinement. All of it
//! is exact for the block dimensions the engine is meant for (1 or 2); for
//! higher dimensions template polytopes fall back to an axis-aligned bound
//! when queried off their own defining directions (documented at the call
//! site below) — sound, but not as tight as a real LP-based support query.

#![allow(missing_docs)]

use ndarray::{Array1, Array2};

/// Errors raised by shape/dimension checks in the set algebra.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ShapeError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimMismatch { expected: usize, got: usize },
    #[error("linear map matrix has {cols} columns but the operand has dimension {dim}")]
    MatrixDimMismatch { cols: usize, dim: usize },
    #[error("template kind {kind} is not defined for dimension {dim}")]
    UnsupportedTemplateDim { kind: &'static str, dim: usize },
}

/// Errors raised by numeric evaluation of the set algebra.
#[derive(Debug, thiserror::Error)]
pub enum NumericError {
    #[error("non-finite coordinate produced while evaluating a set operation")]
    NonFinite,
    #[error("expected a non-empty set but the result was empty")]
    UnexpectedEmpty,
}

/// A half-space `{x : normal·x <= offset}`. A *union* of half-spaces models a
/// guard or invariant boundary; a convex set `S` is
/// disjoint from the union iff it is disjoint from every member (Minkowski
/// sums/unions distribute over intersection with `S`).
#[derive(Debug, Clone)]
pub struct HalfSpace {
    pub normal: Array1<f64>,
    pub offset: f64,
}

/// Which fixed direction set a [`BlockPolicy::Template`] samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// `±e_i` for each axis — an axis-aligned box, same shape as
    /// [`BlockPolicy::Hyperrectangle`] but expressed via the template path.
    Box,
    /// 2-D only: axes plus both diagonals (`±(e_0+e_1)`, `±(e_0-e_1)`).
    Octagon,
    /// Axes plus every pairwise diagonal `±(e_i+e_j)`, `±(e_i-e_j)`, `i<j`.
    BoxPlusDiagonals,
}

/// Per-block overapproximation policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockPolicy {
    /// Valid only for 1-D blocks.
    Interval,
    /// Axis-aligned bounding box.
    Hyperrectangle,
    /// Direction-sampled polygon; tighter as `eps` shrinks.
    EpsPolygon { eps: f64 },
    /// Fixed template-direction polytope.
    Template(TemplateKind),
    /// Keep the operand unchanged (no overapproximation).
    Passthrough,
    /// No configured policy — the engine substitutes the per-dimension
    /// default (interval for 1-D blocks, hyperrectangle otherwise).
    None,
}

impl BlockPolicy {
    /// Resolve `None` to the dimension-dependent default; all other variants
    /// pass through unchanged.
    pub fn resolved(self, dim: usize) -> BlockPolicy {
        match self {
            BlockPolicy::None => {
                if dim == 1 {
                    BlockPolicy::Interval
                } else {
                    BlockPolicy::Hyperrectangle
                }
            }
            other => other,
        }
    }

    /// The "forget prior summands" capability bit: `true`
    /// when the policy's overapproximation directions are fixed regardless
    /// of history, so a [`MinkowskiSumArray`] may safely drop its exact
    /// summands right after collapsing. Only ε-close polygon refinement,
    /// whose direction count depends on `eps` but whose *tightness* depends
    /// on replaying the exact history, needs to retain summands.
    pub fn depends_on_history(self) -> bool {
        matches!(self, BlockPolicy::EpsPolygon { .. })
    }
}

/// The closed tagged variant of concrete set values the engine manipulates.
#[derive(Debug, Clone)]
pub enum SetValue {
    /// The additive identity for Minkowski sum: `{0}^dim`.
    Zero(usize),
    /// A 1-D interval `[lo, hi]`.
    Interval { lo: f64, hi: f64 },
    /// An axis-aligned box given by per-axis bounds.
    Hyperrectangle { low: Array1<f64>, high: Array1<f64> },
    /// A polytope defined by a fixed set of outward-facing unit directions
    /// and their support offsets (`direction·x <= offset`).
    Template { dim: usize, directions: Vec<Array1<f64>>, offsets: Vec<f64> },
    /// A lazy linear map `matrix · inner`, materialised only when queried.
    LinearMap { matrix: Array2<f64>, inner: Box<SetValue> },
    /// A lazy pairwise Minkowski sum. The engine never chains more than one
    /// of these in sequence — prefer [`SetValue::MinkowskiSumArray`] for
    /// running accumulations.
    MinkowskiSum(Box<SetValue>, Box<SetValue>),
    /// A flattened array of summands representing their Minkowski sum;
    /// avoids the stack depth a right-leaning tree of pairwise
    /// [`SetValue::MinkowskiSum`] nodes would accumulate.
    MinkowskiSumArray(usize, Vec<SetValue>),
    /// The Cartesian product of per-block sets, in partition order.
    CartesianProductArray(Vec<SetValue>),
}

impl SetValue {
    /// Dimension of the ambient space this value inhabits.
    pub fn dim(&self) -> usize {
        match self {
            SetValue::Zero(n) => *n,
            SetValue::Interval { .. } => 1,
            SetValue::Hyperrectangle { low, .. } => low.len(),
            SetValue::Template { dim, .. } => *dim,
            SetValue::LinearMap { matrix, .. } => matrix.nrows(),
            SetValue::MinkowskiSum(a, _) => a.dim(),
            SetValue::MinkowskiSumArray(dim, _) => *dim,
            SetValue::CartesianProductArray(blocks) => blocks.iter().map(SetValue::dim).sum(),
        }
    }
}

fn unit_axis(direction: &Array1<f64>) -> Option<(usize, f64)> {
    let mut found: Option<(usize, f64)> = None;
    for (i, &v) in direction.iter().enumerate() {
        if v != 0.0 {
            if found.is_some() || v.abs() != 1.0 {
                return None;
            }
            found = Some((i, v));
        }
    }
    found
}

fn template_directions(kind: TemplateKind, dim: usize) -> Result<Vec<Array1<f64>>, ShapeError> {
    let mut dirs = Vec::new();
    for i in 0..dim {
        let mut pos = Array1::zeros(dim);
        pos[i] = 1.0;
        let mut neg = Array1::zeros(dim);
        neg[i] = -1.0;
        dirs.push(pos);
        dirs.push(neg);
    }
    match kind {
        TemplateKind::Box => Ok(dirs),
        TemplateKind::Octagon => {
            if dim != 2 {
                return Err(ShapeError::UnsupportedTemplateDim { kind: "Octagon", dim });
            }
            push_diagonals(&mut dirs, dim);
            Ok(dirs)
        }
        TemplateKind::BoxPlusDiagonals => {
            push_diagonals(&mut dirs, dim);
            Ok(dirs)
        }
    }
}

fn push_diagonals(dirs: &mut Vec<Array1<f64>>, dim: usize) {
    for i in 0..dim {
        for j in (i + 1)..dim {
            let mut plus = Array1::zeros(dim);
            plus[i] = 1.0;
            plus[j] = 1.0;
            let mut minus = Array1::zeros(dim);
            minus[i] = 1.0;
            minus[j] = -1.0;
            dirs.push(plus.clone());
            dirs.push(-&plus);
            dirs.push(minus.clone());
            dirs.push(-&minus);
        }
    }
}

/// Number of evenly spaced sampling directions for an ε-close polygon. More
/// directions (smaller `eps`) means a tighter polygon; the map is monotone,
/// which is what backs the monotonicity-of-overapproximation test.
fn eps_polygon_direction_count(eps: f64) -> usize {
    let eps = eps.max(1e-9);
    let n = (std::f64::consts::PI / (2.0 * eps).sqrt()).ceil() as usize;
    n.clamp(8, 256)
}

fn polygon_directions(n: usize, dim: usize) -> Vec<Array1<f64>> {
    if dim != 2 {
        // Fall back to the axis directions for non-2D blocks; eps-polygon is
        // only meaningful in the plane.
        return template_directions(TemplateKind::Box, dim).unwrap_or_default();
    }
    (0..n)
        .map(|k| {
            let theta = 2.0 * std::f64::consts::PI * (k as f64) / (n as f64);
            Array1::from(vec![theta.cos(), theta.sin()])
        })
        .collect()
}

/// Capability trait the engine calls through; see module docs.
pub trait SetOps {
    fn dim(&self) -> usize;
    /// `max_{x in self} direction . x`. Must be finite for a non-empty,
    /// bounded set; a [`NumericError::NonFinite`] signals a malformed value.
    fn support(&self, direction: &Array1<f64>) -> Result<f64, NumericError>;
    /// `matrix · self`, lazily.
    fn linear_map(&self, matrix: Array2<f64>) -> Result<SetValue, ShapeError>;
    /// `self ⊕ other`, lazily (a single pairwise sum; see
    /// [`SetValue::MinkowskiSum`]'s docs for when to prefer the array form).
    fn minkowski_sum(&self, other: &SetValue) -> Result<SetValue, ShapeError>;
    /// Overapproximate `self` under `policy`, producing a concrete destination
    /// set. `policy` must already be resolved (see [`BlockPolicy::resolved`]).
    fn overapproximate(&self, policy: BlockPolicy) -> Result<SetValue, NumericError>;
    /// Is `self` disjoint from the union of `guards`?
    fn is_disjoint_from_union(&self, guards: &[HalfSpace]) -> Result<bool, NumericError>;
}

impl SetOps for SetValue {
    fn dim(&self) -> usize {
        SetValue::dim(self)
    }

    fn support(&self, direction: &Array1<f64>) -> Result<f64, NumericError> {
        let v = match self {
            SetValue::Zero(_) => 0.0,
            SetValue::Interval { lo, hi } => (direction[0] * lo).max(direction[0] * hi),
            SetValue::Hyperrectangle { low, high } => low
                .iter()
                .zip(high.iter())
                .zip(direction.iter())
                .map(|((&l, &h), &d)| (d * l).max(d * h))
                .sum(),
            SetValue::Template { dim, directions, offsets } => {
                template_support(*dim, directions, offsets, direction)
            }
            SetValue::LinearMap { matrix, inner } => {
                // support_{M·S}(d) = support_S(M^T d)
                let dt = matrix.t().dot(direction);
                inner.support(&dt)?
            }
            SetValue::MinkowskiSum(a, b) => a.support(direction)? + b.support(direction)?,
            SetValue::MinkowskiSumArray(_, terms) => {
                let mut acc = 0.0;
                for t in terms {
                    acc += t.support(direction)?;
                }
                acc
            }
            SetValue::CartesianProductArray(blocks) => {
                // direction is split across blocks in order.
                let mut acc = 0.0;
                let mut offset = 0;
                for b in blocks {
                    let d = b.dim();
                    let sub = direction.slice(ndarray::s![offset..offset + d]).to_owned();
                    acc += b.support(&sub)?;
                    offset += d;
                }
                acc
            }
        };
        if !v.is_finite() {
            return Err(NumericError::NonFinite);
        }
        Ok(v)
    }

    fn linear_map(&self, matrix: Array2<f64>) -> Result<SetValue, ShapeError> {
        if matrix.ncols() != self.dim() {
            return Err(ShapeError::MatrixDimMismatch { cols: matrix.ncols(), dim: self.dim() });
        }
        Ok(SetValue::LinearMap { matrix, inner: Box::new(self.clone()) })
    }

    fn minkowski_sum(&self, other: &SetValue) -> Result<SetValue, ShapeError> {
        if self.dim() != other.dim() {
            return Err(ShapeError::DimMismatch { expected: self.dim(), got: other.dim() });
        }
        Ok(SetValue::MinkowskiSum(Box::new(self.clone()), Box::new(other.clone())))
    }

    fn overapproximate(&self, policy: BlockPolicy) -> Result<SetValue, NumericError> {
        let dim = self.dim();
        match policy {
            BlockPolicy::Passthrough => Ok(self.clone()),
            BlockPolicy::None => self.overapproximate(BlockPolicy::None.resolved(dim)),
            BlockPolicy::Interval => {
                let e = Array1::from(vec![1.0]);
                let neg_e = Array1::from(vec![-1.0]);
                let hi = self.support(&e)?;
                let lo = -self.support(&neg_e)?;
                Ok(SetValue::Interval { lo, hi })
            }
            BlockPolicy::Hyperrectangle => {
                let mut low = Array1::zeros(dim);
                let mut high = Array1::zeros(dim);
                for i in 0..dim {
                    let mut e = Array1::zeros(dim);
                    e[i] = 1.0;
                    high[i] = self.support(&e)?;
                    e[i] = -1.0;
                    low[i] = -self.support(&e)?;
                }
                Ok(SetValue::Hyperrectangle { low, high })
            }
            BlockPolicy::Template(kind) => {
                let dirs = template_directions(kind, dim)
                    .map_err(|_| NumericError::UnexpectedEmpty)?;
                let mut offsets = Vec::with_capacity(dirs.len());
                for d in &dirs {
                    offsets.push(self.support(d)?);
                }
                Ok(SetValue::Template { dim, directions: dirs, offsets })
            }
            BlockPolicy::EpsPolygon { eps } => {
                let n = eps_polygon_direction_count(eps);
                let dirs = polygon_directions(n, dim);
                let mut offsets = Vec::with_capacity(dirs.len());
                for d in &dirs {
                    offsets.push(self.support(d)?);
                }
                Ok(SetValue::Template { dim, directions: dirs, offsets })
            }
        }
    }

    fn is_disjoint_from_union(&self, guards: &[HalfSpace]) -> Result<bool, NumericError> {
        // Disjoint from {x : normal.x <= offset} iff every point of self has
        // normal.x > offset, i.e. min_self(normal.x) > offset, i.e.
        // support_self(-normal) < -offset.
        for g in guards {
            let neg_normal = g.normal.mapv(|v| -v);
            let s = self.support(&neg_normal)?;
            if s >= -g.offset {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Support query for a fixed-direction template. Exact when `direction`
/// matches one of the template's own directions (within floating tolerance);
/// otherwise falls back to the axis-aligned bound recoverable from the
/// template's own axis directions, which is always a sound (if looser)
/// overapproximation since the polytope is an intersection of at least as
/// many half-spaces as the box.
fn template_support(
    dim: usize,
    directions: &[Array1<f64>],
    offsets: &[f64],
    direction: &Array1<f64>,
) -> f64 {
    const TOL: f64 = 1e-9;
    for (d, &o) in directions.iter().zip(offsets) {
        let norm_d = d.dot(d).sqrt();
        let norm_dir = direction.dot(direction).sqrt();
        if norm_d > TOL && norm_dir > TOL {
            let cos = d.dot(direction) / (norm_d * norm_dir);
            if (cos - 1.0).abs() < TOL && (norm_d - norm_dir).abs() < TOL {
                return o;
            }
        }
    }
    // Axis-aligned fallback bound.
    let mut low = Array1::from_elem(dim, f64::NEG_INFINITY);
    let mut high = Array1::from_elem(dim, f64::INFINITY);
    for (d, &o) in directions.iter().zip(offsets) {
        if let Some((axis, sign)) = unit_axis(d) {
            if sign > 0.0 {
                high[axis] = high[axis].min(o);
            } else {
                low[axis] = low[axis].max(-o);
            }
        }
    }
    low.iter()
        .zip(high.iter())
        .zip(direction.iter())
        .map(|((&l, &h), &d)| {
            let l = if l.is_finite() { l } else { 0.0 };
            let h = if h.is_finite() { h } else { 0.0 };
            (d * l).max(d * h)
        })
        .sum()
}

/// An append-mostly container of lazy Minkowski summands with in-place
/// collapse. [`collapse`](MinkowskiSumArray::collapse) folds every summand
/// accumulated so far into one overapproximated term; whether the exact
/// summands survive that fold (kept for a future tighter re-collapse) or
/// are dropped (memory snaps back to one term) is controlled by the
/// policy's [`BlockPolicy::depends_on_history`] bit.
#[derive(Debug, Clone)]
pub struct MinkowskiSumArray {
    dim: usize,
    terms: Vec<SetValue>,
}

impl MinkowskiSumArray {
    pub fn new(dim: usize) -> Self {
        Self { dim, terms: Vec::new() }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn push(&mut self, term: SetValue) -> Result<(), ShapeError> {
        if term.dim() != self.dim {
            return Err(ShapeError::DimMismatch { expected: self.dim, got: term.dim() });
        }
        self.terms.push(term);
        Ok(())
    }

    /// A lazy [`SetValue`] view of the array without collapsing it.
    pub fn as_set_value(&self) -> SetValue {
        SetValue::MinkowskiSumArray(self.dim, self.terms.clone())
    }

    /// Overapproximate everything accumulated so far under `policy`. If the
    /// policy does not depend on history, the array is replaced by a single
    /// term holding the overapproximation (memory drops back to O(1)); if it
    /// does, every summand is retained so a future collapse can re-derive a
    /// tighter bound from the full history.
    pub fn collapse(&mut self, policy: BlockPolicy) -> Result<SetValue, NumericError> {
        let snapshot = self.as_set_value();
        let overapprox = snapshot.overapproximate(policy)?;
        if !policy.depends_on_history() {
            self.terms = vec![overapprox.clone()];
        }
        Ok(overapprox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(v: Vec<f64>) -> Array1<f64> {
        Array1::from(v)
    }

    #[test]
    fn hyperrectangle_support_matches_corners() {
        let r = SetValue::Hyperrectangle { low: dir(vec![-1.0, -2.0]), high: dir(vec![3.0, 4.0]) };
        assert_eq!(r.support(&dir(vec![1.0, 0.0])).unwrap(), 3.0);
        assert_eq!(r.support(&dir(vec![-1.0, 0.0])).unwrap(), 1.0);
        assert_eq!(r.support(&dir(vec![0.0, 1.0])).unwrap(), 4.0);
        assert_eq!(r.support(&dir(vec![0.0, -1.0])).unwrap(), 2.0);
    }

    #[test]
    fn zero_set_is_minkowski_identity() {
        let z = SetValue::Zero(2);
        let r = SetValue::Hyperrectangle { low: dir(vec![-1.0, -1.0]), high: dir(vec![1.0, 1.0]) };
        let sum = z.minkowski_sum(&r).unwrap();
        for d in [dir(vec![1.0, 0.0]), dir(vec![0.0, 1.0]), dir(vec![1.0, 1.0])] {
            assert_eq!(sum.support(&d).unwrap(), r.support(&d).unwrap());
        }
    }

    #[test]
    fn linear_map_rejects_dim_mismatch() {
        let r = SetValue::Hyperrectangle { low: dir(vec![0.0]), high: dir(vec![1.0]) };
        let m = Array2::from_shape_vec((2, 2), vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        assert!(matches!(r.linear_map(m), Err(ShapeError::MatrixDimMismatch { .. })));
    }

    #[test]
    fn overapproximate_interval_matches_bounds() {
        let r = SetValue::Hyperrectangle { low: dir(vec![-2.0]), high: dir(vec![5.0]) };
        let i = r.overapproximate(BlockPolicy::Interval).unwrap();
        match i {
            SetValue::Interval { lo, hi } => {
                assert!((lo - (-2.0)).abs() < 1e-9);
                assert!((hi - 5.0).abs() < 1e-9);
            }
            _ => panic!("expected interval"),
        }
    }

    #[test]
    fn eps_polygon_tighter_with_smaller_eps_is_monotone_subset() {
        // Tighter eps (more directions) should never *exceed* the looser
        // eps's bound in any sampled direction: a looser policy's result is
        // a superset.
        let base = SetValue::Hyperrectangle { low: dir(vec![-1.0, -1.0]), high: dir(vec![1.0, 1.0]) };
        let tight = base.overapproximate(BlockPolicy::EpsPolygon { eps: 0.01 }).unwrap();
        let loose = base.overapproximate(BlockPolicy::EpsPolygon { eps: 1.0 }).unwrap();
        for k in 0..16 {
            let theta = 2.0 * std::f64::consts::PI * (k as f64) / 16.0;
            let d = dir(vec![theta.cos(), theta.sin()]);
            assert!(tight.support(&d).unwrap() <= loose.support(&d).unwrap() + 1e-9);
        }
    }

    #[test]
    fn minkowski_sum_array_collapse_forgets_unless_history_dependent() {
        let mut arr = MinkowskiSumArray::new(1);
        arr.push(SetValue::Interval { lo: 0.0, hi: 1.0 }).unwrap();
        arr.push(SetValue::Interval { lo: 0.0, hi: 1.0 }).unwrap();
        assert_eq!(arr.len(), 2);
        arr.collapse(BlockPolicy::Hyperrectangle).unwrap();
        // Hyperrectangle has constant directions: history is forgotten.
        assert_eq!(arr.len(), 1);

        let mut arr2 = MinkowskiSumArray::new(2);
        arr2.push(SetValue::Hyperrectangle { low: dir(vec![0.0, 0.0]), high: dir(vec![1.0, 1.0]) })
            .unwrap();
        arr2.collapse(BlockPolicy::EpsPolygon { eps: 0.1 }).unwrap();
        // EpsPolygon depends on history: nothing is dropped.
        assert_eq!(arr2.len(), 1);
        arr2.push(SetValue::Hyperrectangle { low: dir(vec![0.0, 0.0]), high: dir(vec![1.0, 1.0]) })
            .unwrap();
        assert_eq!(arr2.len(), 2);
    }

    #[test]
    fn is_disjoint_from_union_detects_intersection() {
        let r = SetValue::Hyperrectangle { low: dir(vec![0.0, 0.0]), high: dir(vec![1.0, 1.0]) };
        let far = HalfSpace { normal: dir(vec![1.0, 0.0]), offset: -5.0 };
        let near = HalfSpace { normal: dir(vec![1.0, 0.0]), offset: 0.5 };
        assert!(r.is_disjoint_from_union(&[far.clone()]).unwrap());
        assert!(!r.is_disjoint_from_union(&[far, near]).unwrap());
    }

    #[test]
    fn cartesian_product_support_splits_direction_by_block() {
        let a = SetValue::Interval { lo: -1.0, hi: 1.0 };
        let b = SetValue::Interval { lo: -2.0, hi: 2.0 };
        let prod = SetValue::CartesianProductArray(vec![a, b]);
        assert_eq!(prod.dim(), 2);
        assert_eq!(prod.support(&dir(vec![1.0, 1.0])).unwrap(), 3.0);
    }
}
