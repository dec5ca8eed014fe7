//! Truncated singular value decomposition for dense interaction matrices.
//!
//! The rank-`k` reconstruction `Uₖ·Σₖ·Vₖᵀ` of a matrix `A` is the
//! projection of `A` onto its top-`k` singular subspace. That subspace is
//! the dominant eigenspace of the Gram matrix `AᵀA` (right side) or `AAᵀ`
//! (left side), which block power iteration finds without computing the
//! remaining eigenpairs. The smaller of the two Gram matrices is used.

use ndarray::{Array2, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::RecommendError;

const MAX_ITERATIONS: usize = 500;
const TOLERANCE: f64 = 1e-10;
/// Fixed so that repeated calls on the same matrix agree
const SEED: u64 = 0x5eed;

/// Rank-`rank` approximation of `matrix`, same shape as the input
pub fn reconstruct(matrix: &Array2<f64>, rank: usize) -> Result<Array2<f64>, RecommendError> {
    let (rows, cols) = matrix.dim();
    if rows == 0 || cols == 0 {
        return Err(RecommendError::Computation(
            "cannot factorize an empty matrix".to_string(),
        ));
    }

    if matrix.iter().any(|value| !value.is_finite()) {
        return Err(RecommendError::Computation(
            "non-finite value in interaction matrix".to_string(),
        ));
    }

    // Keeping every singular vector reproduces the matrix itself
    if rank >= rows.min(cols) {
        return Ok(matrix.clone());
    }

    let right_side = cols <= rows;
    let gram = if right_side {
        matrix.t().dot(matrix)
    } else {
        matrix.dot(&matrix.t())
    };

    let basis = dominant_subspace(&gram, rank)?;

    // (A·V)·Vᵀ and U·(Uᵀ·A) keep every product thin
    let reconstructed = if right_side {
        matrix.dot(&basis).dot(&basis.t())
    } else {
        basis.dot(&basis.t().dot(matrix))
    };

    if reconstructed.iter().any(|value| !value.is_finite()) {
        return Err(RecommendError::Computation(
            "non-finite value in reconstruction".to_string(),
        ));
    }

    Ok(reconstructed)
}

/// Orthonormal basis of the top-`k` eigenspace of a symmetric PSD matrix
///
/// Directions with a zero eigenvalue are dropped, so the basis may have
/// fewer than `k` columns when the matrix is rank-deficient. Those
/// directions contribute nothing to a reconstruction.
pub fn dominant_subspace(gram: &Array2<f64>, k: usize) -> Result<Array2<f64>, RecommendError> {
    let n = gram.nrows();
    if n != gram.ncols() {
        return Err(RecommendError::Computation(format!(
            "subspace iteration needs a square matrix, got {}x{}",
            n,
            gram.ncols()
        )));
    }

    let k = k.min(n);
    let mut rng = StdRng::seed_from_u64(SEED);
    let start = Array2::from_shape_fn((n, k), |_| rng.gen_range(-1.0..1.0));
    let mut basis = orthonormalize(&start);

    for iteration in 1..=MAX_ITERATIONS {
        let next = orthonormalize(&gram.dot(&basis));
        if next.iter().any(|value| !value.is_finite()) {
            return Err(RecommendError::Computation(
                "non-finite value in subspace iteration".to_string(),
            ));
        }

        let drift = subspace_drift(&basis, &next);
        basis = next;

        if basis.ncols() == 0 || drift <= TOLERANCE * (basis.ncols() as f64).sqrt() {
            tracing::debug!(iteration, rank = basis.ncols(), "Subspace iteration converged");
            return Ok(basis);
        }
    }

    // A tie between the k-th and (k+1)-th eigenvalue has no unique top-k
    // subspace; any basis spanning the tie is as good as another.
    tracing::warn!(
        iterations = MAX_ITERATIONS,
        rank = basis.ncols(),
        "Subspace iteration stopped before converging"
    );
    Ok(basis)
}

/// Modified Gram-Schmidt over the columns, dropping dependent ones
fn orthonormalize(matrix: &Array2<f64>) -> Array2<f64> {
    let mut columns: Vec<ndarray::Array1<f64>> = Vec::with_capacity(matrix.ncols());

    for column in matrix.axis_iter(Axis(1)) {
        let original_norm = column.dot(&column).sqrt();
        let mut v = column.to_owned();

        for q in &columns {
            let projection = q.dot(&v);
            v.scaled_add(-projection, q);
        }

        let norm = v.dot(&v).sqrt();
        if norm > 0.0 && norm > TOLERANCE * original_norm {
            columns.push(v / norm);
        }
    }

    let mut basis = Array2::zeros((matrix.nrows(), columns.len()));
    for (j, q) in columns.iter().enumerate() {
        basis.column_mut(j).assign(q);
    }
    basis
}

/// How much of `next` lies outside the span of `previous`
fn subspace_drift(previous: &Array2<f64>, next: &Array2<f64>) -> f64 {
    let projected = previous.dot(&previous.t().dot(next));
    (next - &projected).iter().map(|x| x * x).sum::<f64>().sqrt()
}
