//! # Portfolio Metrics
//!
//! $$
//! S = \frac{\mathbf{w}^\top \mu \cdot a - r_f}{\sqrt{\mathbf{w}^\top \Sigma \mathbf{w}}}
//! $$
//!
//! Annualized expected return, volatility and Sharpe ratio of a weight vector,
//! plus the objective adapters consumed by the constrained solver.

use argmin::core::CostFunction;
use ndarray::ArrayView1;

use crate::error::FrontierError;
use crate::error::FrontierResult;
use crate::returns::check_annualization_factor;
use crate::returns::mean_returns;
use crate::types::CovarianceMatrix;
use crate::types::ReturnMatrix;

/// Quadratic forms below this are treated as structurally negative.
const VARIANCE_FLOOR: f64 = -1e-12;

/// Volatilities below this make the Sharpe ratio undefined.
const MIN_VOLATILITY: f64 = 1e-12;

/// Annualized expected portfolio return `sum_i mean(r_i) w_i * a`.
pub fn expected_return(
  weights: &[f64],
  returns: &ReturnMatrix,
  annualization_factor: f64,
) -> FrontierResult<f64> {
  check_annualization_factor(annualization_factor)?;
  if weights.len() != returns.ncols() {
    return Err(FrontierError::shape_mismatch(
      "weights",
      returns.ncols(),
      weights.len(),
    ));
  }

  let mu = mean_returns(returns)?;
  let periodic: f64 = mu.iter().zip(weights).map(|(m, w)| m * w).sum();
  Ok(periodic * annualization_factor)
}

/// Portfolio variance `w' S w`, clamped to zero for sub-tolerance roundoff.
///
/// A quadratic form meaningfully below zero means the covariance is not
/// positive semi-definite and fails with [`FrontierError::NegativeVariance`].
pub fn portfolio_variance(weights: &[f64], cov: &CovarianceMatrix) -> FrontierResult<f64> {
  check_weight_shapes(weights, cov)?;

  let w = ArrayView1::from(weights);
  let variance = w.dot(&cov.dot(&w));

  if variance < VARIANCE_FLOOR {
    return Err(FrontierError::NegativeVariance { variance });
  }
  Ok(variance.max(0.0))
}

/// Annualized portfolio volatility `sqrt(w' S w)`.
pub fn volatility(weights: &[f64], cov: &CovarianceMatrix) -> FrontierResult<f64> {
  Ok(portfolio_variance(weights, cov)?.sqrt())
}

/// Sharpe ratio `(E[r_p] - r_f) / sigma_p` at an annualized risk-free rate.
pub fn sharpe_ratio(
  weights: &[f64],
  returns: &ReturnMatrix,
  cov: &CovarianceMatrix,
  risk_free: f64,
  annualization_factor: f64,
) -> FrontierResult<f64> {
  let er = expected_return(weights, returns, annualization_factor)?;
  let vol = volatility(weights, cov)?;

  if vol < MIN_VOLATILITY {
    return Err(FrontierError::UndefinedSharpe { volatility: vol });
  }
  Ok((er - risk_free) / vol)
}

fn check_weight_shapes(weights: &[f64], cov: &CovarianceMatrix) -> FrontierResult<()> {
  if cov.nrows() != cov.ncols() {
    return Err(FrontierError::shape_mismatch(
      "covariance",
      cov.nrows(),
      cov.ncols(),
    ));
  }
  if weights.len() != cov.nrows() {
    return Err(FrontierError::shape_mismatch(
      "weights",
      cov.nrows(),
      weights.len(),
    ));
  }
  Ok(())
}

/// Negated Sharpe ratio objective; minimizing it maximizes the Sharpe ratio.
///
/// Degenerate evaluations (undefined Sharpe, shape problems) surface as an
/// infinite cost so line searches back away from them instead of aborting.
pub struct NegativeSharpe<'a> {
  /// Periodic return matrix.
  pub returns: &'a ReturnMatrix,
  /// Annualized covariance.
  pub cov: &'a CovarianceMatrix,
  /// Annualized risk-free rate.
  pub risk_free: f64,
  /// Periods per year.
  pub annualization_factor: f64,
}

impl CostFunction for NegativeSharpe<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, w: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    match sharpe_ratio(
      w,
      self.returns,
      self.cov,
      self.risk_free,
      self.annualization_factor,
    ) {
      Ok(s) if s.is_finite() => Ok(-s),
      _ => Ok(f64::INFINITY),
    }
  }
}

/// Portfolio-variance objective for minimum-variance solves.
pub struct PortfolioVariance<'a> {
  /// Annualized covariance.
  pub cov: &'a CovarianceMatrix,
}

impl CostFunction for PortfolioVariance<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, w: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    match portfolio_variance(w, self.cov) {
      Ok(v) if v.is_finite() => Ok(v),
      _ => Ok(f64::INFINITY),
    }
  }
}
