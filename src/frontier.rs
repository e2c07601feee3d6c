//! # Efficient Frontier
//!
//! $$
//! \sigma^\*(t) = \min_{\mathbf{w}} \sqrt{\mathbf{w}^\top \Sigma \mathbf{w}}
//! \quad \text{s.t.} \quad \mathbf{1}^\top \mathbf{w} = 1, \; \mu^\top \mathbf{w} = t
//! $$
//!
//! Maximum-Sharpe, minimum-variance and target-return solves, plus the sweep
//! that traces the frontier from the minimum-variance return up to 1.1 times
//! the best single-asset return.

use ndarray::Array1;
use rayon::prelude::*;
use tracing::debug;
use tracing::warn;

use crate::error::FrontierError;
use crate::error::FrontierResult;
use crate::metrics::NegativeSharpe;
use crate::metrics::PortfolioVariance;
use crate::metrics::volatility;
use crate::returns::check_annualization_factor;
use crate::returns::mean_returns;
use crate::solver::EqualityConstraint;
use crate::solver::LinearConstraint;
use crate::solver::OptimizationResult;
use crate::solver::SolverConfig;
use crate::solver::minimize;
use crate::types::CovarianceMatrix;
use crate::types::FrontierCurve;
use crate::types::FrontierPoint;
use crate::types::ReturnMatrix;

/// The sweep extends past the best single asset by this factor.
const SWEEP_EXTENSION: f64 = 1.1;

/// Maximize the Sharpe ratio under the budget constraint and box bounds.
///
/// Starts from the uniform portfolio, as every solve in this crate does, so
/// repeated runs are reproducible.
pub fn max_sharpe_weights(
  returns: &ReturnMatrix,
  cov: &CovarianceMatrix,
  risk_free: f64,
  annualization_factor: f64,
  bounds: &[(f64, f64)],
  solver: &SolverConfig,
) -> FrontierResult<OptimizationResult> {
  ensure_square(cov)?;
  let n = cov.nrows();
  let objective = NegativeSharpe {
    returns,
    cov,
    risk_free,
    annualization_factor,
  };
  let budget = LinearConstraint::budget(n);
  let constraints: [&dyn EqualityConstraint; 1] = [&budget];

  minimize(&objective, &constraints, bounds, &uniform_weights(n), solver)
}

/// Minimize portfolio variance under the budget constraint and box bounds.
pub fn min_variance_weights(
  cov: &CovarianceMatrix,
  bounds: &[(f64, f64)],
  solver: &SolverConfig,
) -> FrontierResult<OptimizationResult> {
  ensure_square(cov)?;
  let n = cov.nrows();
  let objective = PortfolioVariance { cov };
  let budget = LinearConstraint::budget(n);
  let constraints: [&dyn EqualityConstraint; 1] = [&budget];

  minimize(&objective, &constraints, bounds, &uniform_weights(n), solver)
}

/// Minimize variance while pinning the annualized return to `target`.
pub fn target_return_weights(
  cov: &CovarianceMatrix,
  annualized_means: &[f64],
  target: f64,
  bounds: &[(f64, f64)],
  solver: &SolverConfig,
) -> FrontierResult<OptimizationResult> {
  ensure_square(cov)?;
  let n = cov.nrows();
  if annualized_means.len() != n {
    return Err(FrontierError::shape_mismatch(
      "annualized means",
      n,
      annualized_means.len(),
    ));
  }
  let objective = PortfolioVariance { cov };
  let budget = LinearConstraint::budget(n);
  let pin = LinearConstraint::target_return(annualized_means, target);
  let constraints: [&dyn EqualityConstraint; 2] = [&budget, &pin];

  minimize(&objective, &constraints, bounds, &uniform_weights(n), solver)
}

/// Trace the efficient frontier, solving the minimum-variance portfolio first.
///
/// Fails with [`FrontierError::SolverNonConvergence`] when the minimum-variance
/// anchor itself cannot be solved; per-target failures inside the sweep are
/// skipped and counted instead.
pub fn efficient_frontier(
  returns: &ReturnMatrix,
  cov: &CovarianceMatrix,
  annualization_factor: f64,
  num_points: usize,
  bounds: &[(f64, f64)],
  solver: &SolverConfig,
) -> FrontierResult<FrontierCurve> {
  let mvp = min_variance_weights(cov, bounds, solver)?;
  if !mvp.converged {
    return Err(FrontierError::non_convergence(
      mvp.iterations,
      mvp.constraint_violation,
    ));
  }
  efficient_frontier_from_mvp(
    returns,
    cov,
    &mvp.weights,
    annualization_factor,
    num_points,
    bounds,
    solver,
  )
}

/// Frontier sweep anchored at an already-solved minimum-variance portfolio.
///
/// Targets are `num_points` evenly spaced annualized returns from the
/// minimum-variance return to [`SWEEP_EXTENSION`] times the best single-asset
/// return; a degenerate range collapses to the single anchor target. Targets
/// whose solve fails (infeasible under the bounds, non-convergence) are
/// dropped from the curve and counted in [`FrontierCurve::skipped`]. The sweep
/// itself runs in parallel; points come back in ascending target order.
pub fn efficient_frontier_from_mvp(
  returns: &ReturnMatrix,
  cov: &CovarianceMatrix,
  mvp_weights: &[f64],
  annualization_factor: f64,
  num_points: usize,
  bounds: &[(f64, f64)],
  solver: &SolverConfig,
) -> FrontierResult<FrontierCurve> {
  ensure_square(cov)?;
  check_annualization_factor(annualization_factor)?;
  let n = cov.nrows();
  if mvp_weights.len() != n {
    return Err(FrontierError::shape_mismatch(
      "minimum-variance weights",
      n,
      mvp_weights.len(),
    ));
  }
  if bounds.len() != n {
    return Err(FrontierError::shape_mismatch("bounds", n, bounds.len()));
  }

  let periodic = mean_returns(returns)?;
  if periodic.len() != n {
    return Err(FrontierError::shape_mismatch(
      "return columns",
      n,
      periodic.len(),
    ));
  }
  let annualized: Vec<f64> = periodic.iter().map(|m| m * annualization_factor).collect();

  let mvp_return: f64 = annualized
    .iter()
    .zip(mvp_weights)
    .map(|(m, w)| m * w)
    .sum();
  let best_single = annualized.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
  let upper = SWEEP_EXTENSION * best_single;

  let targets: Vec<f64> = if num_points == 0 {
    Vec::new()
  } else if upper <= mvp_return {
    // Degenerate range: a one-asset universe or a pathological mean vector.
    vec![mvp_return]
  } else {
    Array1::linspace(mvp_return, upper, num_points).to_vec()
  };

  let solved: Vec<Option<FrontierPoint>> = targets
    .par_iter()
    .map(|&target| solve_sweep_point(cov, &annualized, target, bounds, solver))
    .collect();

  let mut points = Vec::with_capacity(solved.len());
  let mut skipped = 0usize;
  for outcome in solved {
    match outcome {
      Some(point) => points.push(point),
      None => skipped += 1,
    }
  }

  if points.is_empty() && skipped > 0 {
    warn!(
      "efficient frontier sweep produced no points: all {} targets skipped",
      skipped
    );
  }

  Ok(FrontierCurve { points, skipped })
}

fn solve_sweep_point(
  cov: &CovarianceMatrix,
  annualized_means: &[f64],
  target: f64,
  bounds: &[(f64, f64)],
  solver: &SolverConfig,
) -> Option<FrontierPoint> {
  let result = target_return_weights(cov, annualized_means, target, bounds, solver).ok()?;
  if !result.converged {
    debug!(
      "skipping frontier target {:.6}: no converged solve after {} iterations",
      target, result.iterations
    );
    return None;
  }
  let vol = volatility(&result.weights, cov).ok()?;
  Some(FrontierPoint {
    target_return: target,
    volatility: vol,
    weights: result.weights,
  })
}

pub(crate) fn uniform_weights(n: usize) -> Vec<f64> {
  vec![1.0 / n as f64; n]
}

fn ensure_square(cov: &CovarianceMatrix) -> FrontierResult<()> {
  if cov.nrows() != cov.ncols() {
    return Err(FrontierError::shape_mismatch(
      "covariance",
      cov.nrows(),
      cov.ncols(),
    ));
  }
  Ok(())
}
