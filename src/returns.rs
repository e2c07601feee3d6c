//! # Returns Pipeline
//!
//! $$
//! r_{t,i} = \frac{p_{t+1,i}}{p_{t,i}} - 1
//! $$
//!
//! Price history to per-period returns, annualized mean returns and the
//! annualized sample covariance.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;

use crate::error::FrontierError;
use crate::error::FrontierResult;
use crate::types::CovarianceMatrix;
use crate::types::PriceMatrix;
use crate::types::ReturnMatrix;

/// Convert a T x N price matrix into its (T-1) x N simple-return matrix.
///
/// Row t of the output is the return from period t to t+1, matching a
/// percentage-change with the leading undefined row dropped. Any non-finite
/// return (NaN or zero prices upstream) fails with [`FrontierError::PriceGap`]
/// rather than flowing into the statistics.
pub fn simple_returns(prices: &PriceMatrix) -> FrontierResult<ReturnMatrix> {
  let rows = prices.nrows();
  if rows < 2 {
    return Err(FrontierError::insufficient_data(2, rows));
  }

  let returns = ReturnMatrix::from_shape_fn((rows - 1, prices.ncols()), |(t, i)| {
    prices[[t + 1, i]] / prices[[t, i]] - 1.0
  });

  for ((row, column), r) in returns.indexed_iter() {
    if !r.is_finite() {
      return Err(FrontierError::PriceGap { row, column });
    }
  }

  Ok(returns)
}

/// Per-asset arithmetic mean of periodic returns (not yet annualized).
pub fn mean_returns(returns: &ReturnMatrix) -> FrontierResult<Array1<f64>> {
  returns
    .mean_axis(Axis(0))
    .ok_or_else(|| FrontierError::insufficient_data(1, 0))
}

/// Sample covariance of the return columns scaled by the annualization factor.
///
/// Uses the N-1 denominator over the return rows. The factor here must be the
/// same one applied to mean returns; [`crate::engine::FrontierConfig`] threads
/// a single value through both so the scalings cannot diverge.
pub fn annualized_covariance(
  returns: &ReturnMatrix,
  annualization_factor: f64,
) -> FrontierResult<CovarianceMatrix> {
  check_annualization_factor(annualization_factor)?;
  if returns.nrows() < 2 {
    return Err(FrontierError::insufficient_data(2, returns.nrows()));
  }

  // CorrelationExt treats rows as random variables, so covary the transpose.
  let cov = returns
    .t()
    .cov(1.0)
    .map_err(|_| FrontierError::SingularCovariance)?;
  let cov = cov * annualization_factor;

  if cov.iter().any(|v| !v.is_finite()) {
    return Err(FrontierError::SingularCovariance);
  }

  Ok(cov)
}

/// Pearson correlation matrix of the return columns.
pub fn correlation_matrix(returns: &ReturnMatrix) -> FrontierResult<Array2<f64>> {
  if returns.nrows() < 2 {
    return Err(FrontierError::insufficient_data(2, returns.nrows()));
  }

  let corr = returns
    .t()
    .pearson_correlation()
    .map_err(|_| FrontierError::SingularCovariance)?;

  if corr.iter().any(|v| !v.is_finite()) {
    return Err(FrontierError::SingularCovariance);
  }

  Ok(corr)
}

pub(crate) fn check_annualization_factor(factor: f64) -> FrontierResult<()> {
  if !factor.is_finite() || factor <= 0.0 {
    return Err(FrontierError::invalid_input(format!(
      "annualization factor must be positive and finite, got {factor}"
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn simple_returns_match_percentage_change() {
    let prices = array![[100.0, 50.0], [110.0, 45.0], [121.0, 54.0]];
    let returns = simple_returns(&prices).unwrap();

    assert_eq!(returns.dim(), (2, 2));
    assert_abs_diff_eq!(returns[[0, 0]], 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(returns[[0, 1]], -0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(returns[[1, 0]], 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(returns[[1, 1]], 0.2, epsilon = 1e-12);
  }

  #[test]
  fn single_period_history_is_rejected() {
    let prices = array![[100.0, 50.0]];
    assert_eq!(
      simple_returns(&prices),
      Err(FrontierError::insufficient_data(2, 1))
    );
  }

  #[test]
  fn nan_price_is_reported_as_gap() {
    let prices = array![[100.0, 50.0], [110.0, f64::NAN], [121.0, 54.0]];
    assert_eq!(
      simple_returns(&prices),
      Err(FrontierError::PriceGap { row: 0, column: 1 })
    );
  }

  #[test]
  fn zero_price_is_reported_as_gap() {
    let prices = array![[100.0, 50.0], [110.0, 0.0], [121.0, 54.0]];
    // 0 -> 54 divides by zero in the second transition.
    assert_eq!(
      simple_returns(&prices),
      Err(FrontierError::PriceGap { row: 1, column: 1 })
    );
  }

  #[test]
  fn mean_returns_average_each_column() {
    let returns = array![[0.1, -0.1], [0.3, 0.1]];
    let mu = mean_returns(&returns).unwrap();

    assert_abs_diff_eq!(mu[0], 0.2, epsilon = 1e-12);
    assert_abs_diff_eq!(mu[1], 0.0, epsilon = 1e-12);
  }

  #[test]
  fn covariance_matches_hand_computation() {
    let returns = array![[0.1, -0.1], [-0.1, 0.1]];
    let cov = annualized_covariance(&returns, 12.0).unwrap();

    // Sample variance of (+0.1, -0.1) is 0.02; annualized by 12.
    assert_abs_diff_eq!(cov[[0, 0]], 0.24, epsilon = 1e-12);
    assert_abs_diff_eq!(cov[[1, 1]], 0.24, epsilon = 1e-12);
    assert_abs_diff_eq!(cov[[0, 1]], -0.24, epsilon = 1e-12);
    assert_abs_diff_eq!(cov[[1, 0]], -0.24, epsilon = 1e-12);
  }

  #[test]
  fn covariance_is_symmetric_with_nonnegative_diagonal() {
    let returns = array![
      [0.02, -0.01, 0.005],
      [-0.015, 0.03, -0.002],
      [0.01, 0.012, 0.004],
      [-0.005, -0.02, 0.001]
    ];
    let cov = annualized_covariance(&returns, 252.0).unwrap();

    for i in 0..3 {
      assert!(cov[[i, i]] >= 0.0);
      for j in 0..3 {
        assert_abs_diff_eq!(cov[[i, j]], cov[[j, i]], epsilon = 1e-12);
      }
    }
  }

  #[test]
  fn covariance_needs_two_return_rows() {
    let returns = array![[0.1, -0.1]];
    assert_eq!(
      annualized_covariance(&returns, 12.0),
      Err(FrontierError::insufficient_data(2, 1))
    );
  }

  #[test]
  fn non_positive_factor_is_rejected() {
    let returns = array![[0.1, -0.1], [-0.1, 0.1]];
    assert!(matches!(
      annualized_covariance(&returns, 0.0),
      Err(FrontierError::InvalidInput { .. })
    ));
    assert!(matches!(
      annualized_covariance(&returns, -12.0),
      Err(FrontierError::InvalidInput { .. })
    ));
  }

  #[test]
  fn perfectly_opposed_columns_have_unit_anticorrelation() {
    let returns = array![[0.1, -0.1], [-0.1, 0.1], [0.05, -0.05]];
    let corr = correlation_matrix(&returns).unwrap();

    assert_abs_diff_eq!(corr[[0, 0]], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(corr[[1, 1]], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(corr[[0, 1]], -1.0, epsilon = 1e-12);
  }

  #[test]
  fn constant_column_correlation_is_singular() {
    let returns = array![[0.01, 0.02], [0.01, -0.01], [0.01, 0.03]];
    assert_eq!(
      correlation_matrix(&returns),
      Err(FrontierError::SingularCovariance)
    );
  }
}
