//! # Frontier Engine
//!
//! $$
//! \text{prices} \longrightarrow (\mu, \Sigma) \longrightarrow
//! \left( \mathbf{w}^\*_{\text{sharpe}}, \mathbf{w}^\*_{\text{mvp}}, \sigma^\*(t) \right)
//! $$
//!
//! High-level orchestration API: a price history goes in, the maximum-Sharpe
//! portfolio, the minimum-variance portfolio, the efficient frontier and the
//! per-asset risk/return points come out in one report.

use tracing::info;

use crate::error::FrontierError;
use crate::error::FrontierResult;
use crate::frontier::efficient_frontier_from_mvp;
use crate::frontier::max_sharpe_weights;
use crate::frontier::min_variance_weights;
use crate::metrics::expected_return;
use crate::metrics::sharpe_ratio;
use crate::metrics::volatility;
use crate::returns::annualized_covariance;
use crate::returns::simple_returns;
use crate::solver::OptimizationResult;
use crate::solver::SolverConfig;
use crate::types::AssetPoint;
use crate::types::AssetUniverse;
use crate::types::Bounds;
use crate::types::CovarianceMatrix;
use crate::types::FrontierReport;
use crate::types::PortfolioPoint;
use crate::types::PriceMatrix;
use crate::types::ReturnMatrix;

/// Runtime configuration for [`FrontierEngine`].
#[derive(Clone, Debug)]
pub struct FrontierConfig {
  /// Periods per year; applied exactly once to means and covariance.
  pub annualization_factor: f64,
  /// Risk-free rate used in Sharpe computations.
  pub risk_free_rate: f64,
  /// Per-asset weight box applied to every solve.
  pub bounds: Bounds,
  /// Number of return targets swept along the frontier.
  pub num_frontier_points: usize,
  /// Inner solver settings shared by all solves.
  pub solver: SolverConfig,
}

impl Default for FrontierConfig {
  fn default() -> Self {
    Self {
      annualization_factor: 252.0,
      risk_free_rate: 0.0,
      bounds: Bounds::default(),
      num_frontier_points: 200,
      solver: SolverConfig::default(),
    }
  }
}

/// Single entry-point engine for the full frontier workflow.
#[derive(Clone, Debug)]
pub struct FrontierEngine {
  config: FrontierConfig,
}

impl FrontierEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: FrontierConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &FrontierConfig {
    &self.config
  }

  /// Run the full analysis for a price history.
  ///
  /// `prices` holds one row per period and one column per asset, aligned with
  /// `universe`. The two headline solves must converge; a non-converged
  /// maximum-Sharpe or minimum-variance solve is reported as
  /// [`FrontierError::SolverNonConvergence`]. Individual frontier targets are
  /// allowed to fail and only reduce the curve.
  pub fn analyze(
    &self,
    universe: &AssetUniverse,
    prices: &PriceMatrix,
  ) -> FrontierResult<FrontierReport> {
    let n = universe.len();
    if n < 2 {
      return Err(FrontierError::insufficient_data(2, n));
    }
    if prices.ncols() != n {
      return Err(FrontierError::shape_mismatch(
        "price columns",
        n,
        prices.ncols(),
      ));
    }
    self.config.bounds.validate()?;
    if !self.config.bounds.admits_budget(n) {
      return Err(FrontierError::infeasible(format!(
        "box bounds ({}, {}) cannot sum to 1 across {} assets",
        self.config.bounds.lower, self.config.bounds.upper, n
      )));
    }

    let returns = simple_returns(prices)?;
    let cov = annualized_covariance(&returns, self.config.annualization_factor)?;
    let boxes = self.config.bounds.per_asset(n);

    let optimal = require_converged(max_sharpe_weights(
      &returns,
      &cov,
      self.config.risk_free_rate,
      self.config.annualization_factor,
      &boxes,
      &self.config.solver,
    )?)?;
    let mvp = require_converged(min_variance_weights(&cov, &boxes, &self.config.solver)?)?;

    let frontier = efficient_frontier_from_mvp(
      &returns,
      &cov,
      &mvp.weights,
      self.config.annualization_factor,
      self.config.num_frontier_points,
      &boxes,
      &self.config.solver,
    )?;

    let optimal_point = self.portfolio_point(&optimal.weights, &returns, &cov)?;
    let mvp_point = self.portfolio_point(&mvp.weights, &returns, &cov)?;

    let assets = universe
      .tickers()
      .iter()
      .enumerate()
      .map(|(i, ticker)| {
        let mut unit = vec![0.0; n];
        unit[i] = 1.0;
        Ok(AssetPoint {
          ticker: ticker.clone(),
          point: self.portfolio_point(&unit, &returns, &cov)?,
        })
      })
      .collect::<FrontierResult<Vec<_>>>()?;

    info!(
      "frontier analysis complete: sharpe {:.4}, mvp volatility {:.4}, {} frontier points ({} skipped)",
      optimal_point.sharpe,
      mvp_point.volatility,
      frontier.len(),
      frontier.skipped
    );

    Ok(FrontierReport {
      optimal_weights: optimal.weights,
      optimal: optimal_point,
      mvp_weights: mvp.weights,
      mvp: mvp_point,
      frontier,
      assets,
    })
  }

  fn portfolio_point(
    &self,
    weights: &[f64],
    returns: &ReturnMatrix,
    cov: &CovarianceMatrix,
  ) -> FrontierResult<PortfolioPoint> {
    Ok(PortfolioPoint {
      expected_return: expected_return(weights, returns, self.config.annualization_factor)?,
      volatility: volatility(weights, cov)?,
      sharpe: sharpe_ratio(
        weights,
        returns,
        cov,
        self.config.risk_free_rate,
        self.config.annualization_factor,
      )?,
    })
  }
}

fn require_converged(result: OptimizationResult) -> FrontierResult<OptimizationResult> {
  if result.converged {
    Ok(result)
  } else {
    Err(FrontierError::non_convergence(
      result.iterations,
      result.constraint_violation,
    ))
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;
  use crate::returns::mean_returns;

  fn synthetic_prices(rows: usize, drifts: &[f64], vols: &[f64], seed: u64) -> PriceMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let n = drifts.len();
    let mut prices = PriceMatrix::zeros((rows, n));
    for i in 0..n {
      let mut level = 100.0;
      for t in 0..rows {
        prices[[t, i]] = level;
        level *= 1.0 + drifts[i] + vols[i] * noise.sample(&mut rng);
      }
    }
    prices
  }

  fn universe(n: usize) -> AssetUniverse {
    AssetUniverse::new((0..n).map(|i| format!("A{i:02}")).collect()).unwrap()
  }

  fn in_box(weights: &[f64], lower: f64, upper: f64) {
    for w in weights {
      assert!(
        *w >= lower - 1e-9 && *w <= upper + 1e-9,
        "weight {w} escapes [{lower}, {upper}]"
      );
    }
  }

  #[test]
  fn monthly_history_produces_a_consistent_report() {
    let prices = synthetic_prices(
      60,
      &[0.006, 0.008, 0.010, 0.012],
      &[0.012, 0.018, 0.024, 0.030],
      42,
    );
    let engine = FrontierEngine::new(FrontierConfig {
      annualization_factor: 12.0,
      risk_free_rate: 0.02,
      bounds: Bounds::new(-2.0, 2.0).unwrap(),
      num_frontier_points: 30,
      solver: SolverConfig::default(),
    });

    let report = engine.analyze(&universe(4), &prices).unwrap();

    let optimal_sum: f64 = report.optimal_weights.iter().sum();
    let mvp_sum: f64 = report.mvp_weights.iter().sum();
    assert_abs_diff_eq!(optimal_sum, 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(mvp_sum, 1.0, epsilon = 1e-6);
    in_box(&report.optimal_weights, -2.0, 2.0);
    in_box(&report.mvp_weights, -2.0, 2.0);

    assert!(report.optimal.sharpe >= report.mvp.sharpe - 1e-6);
    assert!(report.mvp.volatility <= report.optimal.volatility + 1e-6);
    for asset in &report.assets {
      assert!(report.optimal.sharpe >= asset.point.sharpe - 1e-6);
    }

    assert!(!report.frontier.is_empty());
    for pair in report.frontier.points.windows(2) {
      assert!(pair[1].target_return > pair[0].target_return);
    }
  }

  #[test]
  fn per_asset_points_annualize_exactly_once() {
    let prices = synthetic_prices(48, &[0.005, 0.009], &[0.015, 0.025], 9);
    let engine = FrontierEngine::new(FrontierConfig {
      annualization_factor: 12.0,
      risk_free_rate: 0.0,
      bounds: Bounds::new(-1.0, 1.0).unwrap(),
      num_frontier_points: 5,
      solver: SolverConfig::default(),
    });

    let report = engine.analyze(&universe(2), &prices).unwrap();

    let returns = simple_returns(&prices).unwrap();
    let means = mean_returns(&returns).unwrap();
    let cov = annualized_covariance(&returns, 12.0).unwrap();

    for (i, asset) in report.assets.iter().enumerate() {
      assert_abs_diff_eq!(asset.point.expected_return, means[i] * 12.0, epsilon = 1e-9);
      assert_abs_diff_eq!(asset.point.volatility, cov[[i, i]].sqrt(), epsilon = 1e-9);
    }
  }

  #[test]
  fn the_default_box_caps_a_dominant_asset() {
    let mut drifts = vec![0.001; 12];
    drifts[3] = 0.05;
    let vols = vec![0.03; 12];
    let prices = synthetic_prices(90, &drifts, &vols, 17);
    let engine = FrontierEngine::new(FrontierConfig {
      annualization_factor: 12.0,
      risk_free_rate: 0.0,
      num_frontier_points: 12,
      ..FrontierConfig::default()
    });

    let report = engine.analyze(&universe(12), &prices).unwrap();

    assert_abs_diff_eq!(report.optimal_weights[3], 0.10, epsilon = 1e-6);
    in_box(&report.optimal_weights, -0.08, 0.10);
    in_box(&report.mvp_weights, -0.08, 0.10);
    assert_eq!(
      report.frontier.len() + report.frontier.skipped,
      12,
      "every target is either solved or counted"
    );
  }

  #[test]
  fn mismatched_price_columns_are_rejected() {
    let prices = synthetic_prices(24, &[0.005, 0.007], &[0.01, 0.02], 3);
    let engine = FrontierEngine::new(FrontierConfig::default());

    let result = engine.analyze(&universe(3), &prices);
    assert!(matches!(result, Err(FrontierError::ShapeMismatch { .. })));
  }

  #[test]
  fn single_asset_universes_are_rejected() {
    let prices = synthetic_prices(24, &[0.005], &[0.01], 3);
    let engine = FrontierEngine::new(FrontierConfig::default());

    let result = engine.analyze(&universe(1), &prices);
    assert!(matches!(
      result,
      Err(FrontierError::InsufficientData {
        required: 2,
        actual: 1
      })
    ));
  }

  #[test]
  fn default_box_without_room_for_the_budget_is_rejected() {
    // Nine assets capped at 0.10 each can only reach 0.9 of the budget.
    let prices = PriceMatrix::ones((3, 9));
    let engine = FrontierEngine::new(FrontierConfig::default());

    let result = engine.analyze(&universe(9), &prices);
    assert!(matches!(result, Err(FrontierError::InfeasibleConstraint { .. })));
  }
}
