//! Distance policies: angular, Euclidean, and Manhattan.
//!
//! A policy is a set of static capabilities over node records: the ranking
//! distance between raw vectors, the signed margin against a stored split
//! plane, side selection, split construction via the two-means heuristic,
//! and the mapping from internal to user-facing distance. Policies are unit
//! types dispatched statically, since every operation here sits on the hot
//! path of both build and search.
//!
//! The policy also fixes the record layout: Minkowski metrics (Euclidean,
//! Manhattan) store a plane offset `a` between the descendant count and the
//! children pair, angular does not. The layout is part of the file format.

use crate::config::TWO_MEANS_ITERATIONS;
use crate::forest::node::{NodeMut, NodeRef};
use crate::rng::Kiss64Random;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Angular {}
    impl Sealed for super::Euclidean {}
    impl Sealed for super::Manhattan {}
}

/// Static capability set of a distance metric.
///
/// Sealed: the record layout each metric implies is burned into the on-disk
/// format, so the set of metrics is fixed.
pub trait Metric: sealed::Sealed + Sized {
    /// Byte offset of the children pair in a node record. Minkowski layouts
    /// store the plane offset ahead of it, angular layouts do not.
    const CHILDREN_OFFSET: usize;

    /// Internal distance used for ranking. Squared for Euclidean,
    /// `2 − 2·cos` for angular, L1 for Manhattan.
    fn distance(x: &[f32], y: &[f32]) -> f32;

    /// Signed distance from `y` to the split plane stored in `split`.
    fn margin(split: NodeRef<'_, Self>, y: &[f32]) -> f32;

    /// Which side of the plane `y` falls on (`true` = the positive-margin
    /// child). An exact zero margin is broken by coin flip.
    fn side(split: NodeRef<'_, Self>, y: &[f32], rng: &mut Kiss64Random) -> bool {
        let m = Self::margin(split, y);
        if m != 0.0 {
            m > 0.0
        } else {
            rng.flip()
        }
    }

    /// Fill `split` with a hyperplane separating `children`: run two-means
    /// and take the normalized difference of the centroids as the normal.
    fn create_split(
        children: &[NodeRef<'_, Self>],
        rng: &mut Kiss64Random,
        split: &mut NodeMut<'_, Self>,
    );

    /// Map an internal distance to the user-facing value.
    fn normalized_distance(d: f32) -> f32;

    /// Short tag for diagnostics.
    fn name() -> &'static str;
}

/// Cosine-based metric. Record layout: count, children, vector.
pub struct Angular;

/// Squared-L2 metric. Record layout: count, plane offset, children, vector.
pub struct Euclidean;

/// L1 metric. Same record layout as [`Euclidean`].
pub struct Manhattan;

pub(crate) fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn normalize(v: &mut [f32]) {
    let n = norm(v);
    for x in v {
        *x /= n;
    }
}

fn dot(x: &[f32], y: &[f32]) -> f32 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}

/// Two-centroid assignment, weighted by cluster size to keep the split
/// balanced: each sampled point moves the centroid whose size-scaled
/// distance is smaller, as a running mean. In cosine mode both seeds and
/// every incoming point are scaled to unit norm.
fn two_means<M: Metric>(
    nodes: &[NodeRef<'_, M>],
    rng: &mut Kiss64Random,
    cosine: bool,
) -> (Vec<f32>, Vec<f32>) {
    let count = nodes.len();
    let i = rng.index(count);
    let mut j = rng.index(count - 1);
    j += usize::from(j >= i); // ensure i != j

    let mut iv = nodes[i].vector().to_vec();
    let mut jv = nodes[j].vector().to_vec();
    if cosine {
        normalize(&mut iv);
        normalize(&mut jv);
    }

    let mut ic = 1i32;
    let mut jc = 1i32;
    for _ in 0..TWO_MEANS_ITERATIONS {
        let k = nodes[rng.index(count)].vector();
        let di = ic as f32 * M::distance(&iv, k);
        let dj = jc as f32 * M::distance(&jv, k);
        let norm_k = if cosine { norm(k) } else { 1.0 };
        if di < dj {
            for (z, x) in iv.iter_mut().enumerate() {
                *x = (*x * ic as f32 + k[z] / norm_k) / (ic + 1) as f32;
            }
            ic += 1;
        } else if dj < di {
            for (z, x) in jv.iter_mut().enumerate() {
                *x = (*x * jc as f32 + k[z] / norm_k) / (jc + 1) as f32;
            }
            jc += 1;
        }
        // exact tie: leave both centroids alone
    }
    (iv, jv)
}

/// Margin for layouts that carry a plane offset.
fn minkowski_margin<M: Metric>(split: NodeRef<'_, M>, y: &[f32]) -> f32 {
    split.plane_offset() + dot(split.vector(), y)
}

/// Split construction shared by the Minkowski metrics: normal from
/// two-means, offset chosen so the plane passes through the midpoint of
/// the two centroids.
fn minkowski_create_split<M: Metric>(
    children: &[NodeRef<'_, M>],
    rng: &mut Kiss64Random,
    split: &mut NodeMut<'_, M>,
) {
    let (iv, jv) = two_means::<M>(children, rng, false);
    let v = split.vector_mut();
    for (z, x) in v.iter_mut().enumerate() {
        *x = iv[z] - jv[z];
    }
    normalize(v);
    let a = -split
        .as_ref()
        .vector()
        .iter()
        .enumerate()
        .map(|(z, x)| x * (iv[z] + jv[z]) / 2.0)
        .sum::<f32>();
    split.set_plane_offset(a);
}

impl Metric for Angular {
    const CHILDREN_OFFSET: usize = 4;

    fn distance(x: &[f32], y: &[f32]) -> f32 {
        // (a/|a| − b/|b|)² expands to 2 − 2·cos; computed from the three
        // dot products so no intermediate normalization is needed.
        let mut pp = 0.0;
        let mut qq = 0.0;
        let mut pq = 0.0;
        for (a, b) in x.iter().zip(y) {
            pp += a * a;
            qq += b * b;
            pq += a * b;
        }
        let ppqq = pp * qq;
        if ppqq > 0.0 {
            2.0 - 2.0 * pq / ppqq.sqrt()
        } else {
            2.0 // either vector has zero norm
        }
    }

    fn margin(split: NodeRef<'_, Self>, y: &[f32]) -> f32 {
        dot(split.vector(), y)
    }

    fn create_split(
        children: &[NodeRef<'_, Self>],
        rng: &mut Kiss64Random,
        split: &mut NodeMut<'_, Self>,
    ) {
        let (iv, jv) = two_means::<Self>(children, rng, true);
        let v = split.vector_mut();
        for (z, x) in v.iter_mut().enumerate() {
            *x = iv[z] - jv[z];
        }
        normalize(v);
    }

    fn normalized_distance(d: f32) -> f32 {
        // Squared distances can come out as -0.0; clamp before the sqrt.
        d.max(0.0).sqrt()
    }

    fn name() -> &'static str {
        "angular"
    }
}

impl Metric for Euclidean {
    const CHILDREN_OFFSET: usize = 8;

    fn distance(x: &[f32], y: &[f32]) -> f32 {
        x.iter().zip(y).map(|(a, b)| (a - b) * (a - b)).sum()
    }

    fn margin(split: NodeRef<'_, Self>, y: &[f32]) -> f32 {
        minkowski_margin(split, y)
    }

    fn create_split(
        children: &[NodeRef<'_, Self>],
        rng: &mut Kiss64Random,
        split: &mut NodeMut<'_, Self>,
    ) {
        minkowski_create_split(children, rng, split);
    }

    fn normalized_distance(d: f32) -> f32 {
        d.max(0.0).sqrt()
    }

    fn name() -> &'static str {
        "euclidean"
    }
}

impl Metric for Manhattan {
    const CHILDREN_OFFSET: usize = 8;

    fn distance(x: &[f32], y: &[f32]) -> f32 {
        x.iter().zip(y).map(|(a, b)| (a - b).abs()).sum()
    }

    fn margin(split: NodeRef<'_, Self>, y: &[f32]) -> f32 {
        minkowski_margin(split, y)
    }

    fn create_split(
        children: &[NodeRef<'_, Self>],
        rng: &mut Kiss64Random,
        split: &mut NodeMut<'_, Self>,
    ) {
        minkowski_create_split(children, rng, split);
    }

    fn normalized_distance(d: f32) -> f32 {
        d.max(0.0)
    }

    fn name() -> &'static str {
        "manhattan"
    }
}
