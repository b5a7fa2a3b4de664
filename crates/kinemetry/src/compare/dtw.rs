//! Dynamic time warping over per-frame feature vectors.
//!
//! Two recordings of the same exercise rarely run at the same tempo.
//! DTW finds the monotonic frame pairing that minimizes summed feature
//! distance, so per-frame comparison happens between corresponding
//! movement phases instead of equal timestamps.

use super::CompareError;

/// Outcome of warping sequence `a` onto sequence `b`.
#[derive(Debug, Clone)]
pub struct DtwResult {
    /// Matched index pairs (index into a, index into b), monotonic in
    /// both components, covering both sequences end to end.
    pub path: Vec<(usize, usize)>,
    /// Summed feature distance along the path.
    pub cost: f64,
    /// `cost` divided by path length.
    pub normalized_cost: f64,
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Align two feature sequences.
///
/// The cost matrix is O(n·m); `max_len` bounds both dimensions and
/// `should_cancel` is polled once per matrix row so long comparisons
/// can be abandoned from another layer.
pub fn align(
    a: &[Vec<f64>],
    b: &[Vec<f64>],
    max_len: usize,
    should_cancel: &dyn Fn() -> bool,
) -> Result<DtwResult, CompareError> {
    if a.len() < 3 || b.len() < 3 {
        return Err(CompareError::InsufficientData {
            reason: format!("sequences of {} and {} frames, need at least 3", a.len(), b.len()),
        });
    }
    if a.len() > max_len || b.len() > max_len {
        return Err(CompareError::InsufficientData {
            reason: format!(
                "sequence of {} frames exceeds the {max_len}-frame cap",
                a.len().max(b.len())
            ),
        });
    }
    let dim = a[0].len();
    if dim == 0 || a.iter().chain(b.iter()).any(|v| v.len() != dim) {
        return Err(CompareError::InsufficientData {
            reason: "inconsistent feature dimensions".to_string(),
        });
    }

    let (n, m) = (a.len(), b.len());
    let mut acc = vec![f64::INFINITY; (n + 1) * (m + 1)];
    let idx = |i: usize, j: usize| i * (m + 1) + j;
    acc[idx(0, 0)] = 0.0;

    for i in 1..=n {
        if should_cancel() {
            return Err(CompareError::Cancelled);
        }
        for j in 1..=m {
            let d = euclidean(&a[i - 1], &b[j - 1]);
            let best = acc[idx(i - 1, j)]
                .min(acc[idx(i, j - 1)])
                .min(acc[idx(i - 1, j - 1)]);
            acc[idx(i, j)] = d + best;
        }
    }

    // backtrack from the corner, preferring the diagonal on ties
    let mut path = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        path.push((i - 1, j - 1));
        let diag = acc[idx(i - 1, j - 1)];
        let up = acc[idx(i - 1, j)];
        let left = acc[idx(i, j - 1)];
        if diag <= up && diag <= left {
            i -= 1;
            j -= 1;
        } else if up <= left {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    path.reverse();

    let cost = acc[idx(n, m)];
    Ok(DtwResult {
        normalized_cost: cost / path.len() as f64,
        cost,
        path,
    })
}
