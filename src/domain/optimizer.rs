//! Minimum-variance portfolio optimizer.
//!
//! Solves
//!
//! ```text
//! minimize   w' Σ w
//! subject to sum(w) = 1,  w_i >= 0
//! ```
//!
//! with a primal active-set method. Each iteration minimizes the quadratic
//! model over the free weights along directions that keep the budget,
//! using the eigendecomposition of the budget-projected Hessian. Zero
//! curvature directions are left alone, so a positive semi-definite Σ
//! (zero-variance assets, duplicated assets, fewer observations than
//! assets) still produces a feasible minimizer instead of NaN weights.
//! Anything the method cannot resolve is reported as
//! [`RiskcastError::SolverFailure`].

use crate::domain::error::RiskcastError;
use crate::domain::returns::ReturnTable;
use nalgebra::{DMatrix, DVector, SymmetricEigen};

pub const DEFAULT_TOLERANCE: f64 = 1e-10;
pub const DEFAULT_MAX_ITERATIONS: usize = 500;

/// Final weights may undershoot zero or miss the budget by this much
/// before the point is rejected as infeasible.
const FEASIBILITY_TOLERANCE: f64 = 1e-8;
/// Eigenvalues of the projected Hessian at or below this fraction of the
/// largest are treated as zero curvature.
const RANK_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    /// Step, model-decrease and multiplier threshold, relative to the
    /// scaled Hessian.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinVarianceSolution {
    pub weights: Vec<f64>,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// Aligned with the table's ticker order.
    pub weights: Vec<f64>,
    /// `mu · w`, in daily fractional return.
    pub expected_return: f64,
    /// `w' Σ w`, a variance in squared daily return.
    pub risk: f64,
    pub iterations: usize,
}

impl OptimizationResult {
    /// Square root of `risk`.
    pub fn daily_std(&self) -> f64 {
        self.risk.max(0.0).sqrt()
    }
}

/// Minimum-variance, fully invested, long-only weights for `table`.
pub fn optimize_portfolio(
    table: &ReturnTable,
    settings: &SolverSettings,
) -> Result<OptimizationResult, RiskcastError> {
    let cov = table.covariance_matrix()?;
    let mu = DVector::from_vec(table.mean_vector());

    let solution = solve_min_variance(&cov, settings)?;
    let w = DVector::from_column_slice(&solution.weights);

    let expected_return = mu.dot(&w);
    let risk = w.dot(&(&cov * &w));

    tracing::debug!(
        assets = table.n_assets(),
        observations = table.n_observations(),
        iterations = solution.iterations,
        risk,
        "optimized portfolio"
    );

    Ok(OptimizationResult {
        weights: solution.weights,
        expected_return,
        risk,
        iterations: solution.iterations,
    })
}

/// Active-set solve of the minimum-variance QP for covariance `cov`.
pub fn solve_min_variance(
    cov: &DMatrix<f64>,
    settings: &SolverSettings,
) -> Result<MinVarianceSolution, RiskcastError> {
    let n = cov.nrows();
    if n == 0 {
        return Err(RiskcastError::invalid("covariance matrix is empty"));
    }
    if cov.ncols() != n {
        return Err(RiskcastError::ShapeMismatch {
            expected: n,
            actual: cov.ncols(),
        });
    }
    if cov.iter().any(|v| !v.is_finite()) {
        return Err(RiskcastError::invalid("covariance matrix has non-finite entries"));
    }
    if !(settings.tolerance.is_finite() && settings.tolerance > 0.0) {
        return Err(RiskcastError::invalid(format!(
            "solver tolerance must be positive, got {}",
            settings.tolerance
        )));
    }
    if settings.max_iterations == 0 {
        return Err(RiskcastError::invalid("solver needs at least one iteration"));
    }

    // Scaling Σ does not move the minimizer and keeps the tolerances unitless.
    let scale = cov.amax();
    let hessian = if scale > 0.0 {
        cov * (2.0 / scale)
    } else {
        cov * 2.0
    };

    let mut w = DVector::from_element(n, 1.0 / n as f64);
    let mut at_bound = vec![false; n];
    let mut released = false;

    for iteration in 1..=settings.max_iterations {
        let gradient = &hessian * &w;
        let free: Vec<usize> = (0..n).filter(|&i| !at_bound[i]).collect();
        let step = equality_step(&hessian, &gradient, &free)?;

        // model decrease of the full step, against the current objective
        let slope: f64 = free
            .iter()
            .enumerate()
            .map(|(k, &i)| gradient[i] * step[k])
            .sum();
        let decrease = -0.5 * slope;
        let objective = 0.5 * w.dot(&gradient);
        let negligible =
            !released && decrease <= settings.tolerance * (objective + settings.tolerance);
        released = false;

        if step.amax() <= settings.tolerance || negligible {
            // stationary on the working set: check the bound multipliers
            let lambda = free.iter().map(|&i| gradient[i]).sum::<f64>() / free.len() as f64;
            let release = (0..n)
                .filter(|&i| at_bound[i])
                .map(|i| (i, gradient[i] - lambda))
                .filter(|&(_, multiplier)| multiplier < -settings.tolerance)
                .min_by(|a, b| a.1.total_cmp(&b.1));

            match release {
                Some((i, multiplier)) => {
                    tracing::trace!(iteration, asset = i, multiplier, "releasing bound");
                    at_bound[i] = false;
                    released = true;
                    continue;
                }
                None => {
                    return Ok(MinVarianceSolution {
                        weights: feasible_weights(&w)?,
                        iterations: iteration,
                    });
                }
            }
        }

        let mut alpha = 1.0;
        let mut blocking = None;
        for (k, &i) in free.iter().enumerate() {
            if step[k] < 0.0 {
                let ratio = (w[i] / -step[k]).max(0.0);
                if ratio <= alpha {
                    alpha = ratio;
                    blocking = Some(i);
                }
            }
        }

        for (k, &i) in free.iter().enumerate() {
            w[i] += alpha * step[k];
        }
        if let Some(i) = blocking {
            tracing::trace!(iteration, asset = i, alpha, "adding bound");
            w[i] = 0.0;
            at_bound[i] = true;
        }
    }

    Err(RiskcastError::solver(format!(
        "iteration limit of {} reached without convergence",
        settings.max_iterations
    )))
}

/// Search direction on the free weights: `p = -(P H_FF P)^+ P g_F` with
/// `P = I - 11'/m`, the minimizer of the quadratic model among directions
/// with `sum(p) = 0`. For a positive semi-definite Hessian the gradient has
/// no component along zero-curvature eigenvectors, so those are skipped.
fn equality_step(
    hessian: &DMatrix<f64>,
    gradient: &DVector<f64>,
    free: &[usize],
) -> Result<DVector<f64>, RiskcastError> {
    let m = free.len();
    if m < 2 {
        return Ok(DVector::zeros(m));
    }

    let sub = DMatrix::from_fn(m, m, |a, b| hessian[(free[a], free[b])]);
    let row_means: Vec<f64> = (0..m).map(|a| sub.row(a).sum() / m as f64).collect();
    let col_means: Vec<f64> = (0..m).map(|b| sub.column(b).sum() / m as f64).collect();
    let grand_mean = row_means.iter().sum::<f64>() / m as f64;
    // P H P, symmetric up to rounding
    let projected = DMatrix::from_fn(m, m, |a, b| {
        sub[(a, b)] - row_means[a] - col_means[b] + grand_mean
    });

    let mut g = DVector::from_fn(m, |a, _| gradient[free[a]]);
    let g_mean = g.mean();
    g.add_scalar_mut(-g_mean);

    let eigen = SymmetricEigen::new(projected);
    let largest = eigen.eigenvalues.iter().copied().fold(0.0_f64, f64::max);
    let mut step = DVector::zeros(m);
    if largest <= 0.0 {
        return Ok(step);
    }
    let cutoff = largest * RANK_TOLERANCE;
    for (k, &value) in eigen.eigenvalues.iter().enumerate() {
        if value > cutoff {
            let direction = eigen.eigenvectors.column(k);
            step.axpy(-direction.dot(&g) / value, &direction, 1.0);
        }
    }
    let drift = step.mean();
    step.add_scalar_mut(-drift);

    if step.iter().any(|v| !v.is_finite()) {
        return Err(RiskcastError::solver("numerical failure: non-finite search direction"));
    }
    Ok(step)
}

fn feasible_weights(w: &DVector<f64>) -> Result<Vec<f64>, RiskcastError> {
    if w.iter().any(|v| !v.is_finite()) {
        return Err(RiskcastError::solver("numerical failure: non-finite weights"));
    }
    let min = w.iter().copied().fold(f64::INFINITY, f64::min);
    if min < -FEASIBILITY_TOLERANCE {
        return Err(RiskcastError::solver(format!(
            "infeasible point: weight {min:.3e} below zero"
        )));
    }
    let total = w.sum();
    if (total - 1.0).abs() > FEASIBILITY_TOLERANCE {
        return Err(RiskcastError::solver(format!(
            "infeasible point: weights sum to {total}"
        )));
    }
    Ok(w.iter().map(|&v| v.max(0.0)).collect())
}
