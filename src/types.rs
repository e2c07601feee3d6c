//! # Core Types
//!
//! $$
//! \mathbf{w} \in \mathbb{R}^N, \quad \mathbf{1}^\top \mathbf{w} = 1
//! $$
//!
//! Shared input and output types for frontier analysis.

use ndarray::Array2;

use crate::error::FrontierError;
use crate::error::FrontierResult;

/// Price history, one row per period, one column per asset.
pub type PriceMatrix = Array2<f64>;

/// Per-period simple returns, one row per period transition, one column per asset.
pub type ReturnMatrix = Array2<f64>;

/// Symmetric N x N asset covariance.
pub type CovarianceMatrix = Array2<f64>;

/// Ordered collection of unique asset identifiers.
///
/// Column i of a [`PriceMatrix`] and entry i of every weight vector refer to
/// `tickers()[i]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetUniverse {
  tickers: Vec<String>,
}

impl AssetUniverse {
  /// Build a universe from tickers, rejecting empty lists and duplicates.
  pub fn new(tickers: Vec<String>) -> FrontierResult<Self> {
    if tickers.is_empty() {
      return Err(FrontierError::insufficient_data(1, 0));
    }

    for (i, ticker) in tickers.iter().enumerate() {
      if tickers[..i].contains(ticker) {
        return Err(FrontierError::DuplicateAsset {
          ticker: ticker.clone(),
        });
      }
    }

    Ok(Self { tickers })
  }

  /// Number of assets.
  pub fn len(&self) -> usize {
    self.tickers.len()
  }

  /// True when the universe holds no assets (unreachable via [`AssetUniverse::new`]).
  pub fn is_empty(&self) -> bool {
    self.tickers.is_empty()
  }

  /// Tickers in column order.
  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  /// Column index of a ticker, if present.
  pub fn position(&self, ticker: &str) -> Option<usize> {
    self.tickers.iter().position(|t| t == ticker)
  }
}

/// Uniform per-asset box bounds on portfolio weights.
///
/// Negative lower bounds permit short positions up to the given magnitude.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
  /// Lower weight bound applied to every asset.
  pub lower: f64,
  /// Upper weight bound applied to every asset.
  pub upper: f64,
}

impl Default for Bounds {
  fn default() -> Self {
    Self {
      lower: -0.08,
      upper: 0.10,
    }
  }
}

impl Bounds {
  /// Construct bounds after checking ordering and finiteness.
  pub fn new(lower: f64, upper: f64) -> FrontierResult<Self> {
    let bounds = Self { lower, upper };
    bounds.validate()?;
    Ok(bounds)
  }

  /// Ensure the interval is finite and non-empty.
  pub fn validate(&self) -> FrontierResult<()> {
    if !self.lower.is_finite() || !self.upper.is_finite() {
      return Err(FrontierError::infeasible("bounds must be finite"));
    }
    if self.lower > self.upper {
      return Err(FrontierError::infeasible(format!(
        "lower bound {} exceeds upper bound {}",
        self.lower, self.upper
      )));
    }
    Ok(())
  }

  /// Expand to one `(lower, upper)` pair per asset.
  pub fn per_asset(&self, n: usize) -> Vec<(f64, f64)> {
    vec![(self.lower, self.upper); n]
  }

  /// True when a full-investment portfolio can exist inside the box.
  pub fn admits_budget(&self, n: usize) -> bool {
    let n = n as f64;
    n * self.lower <= 1.0 && n * self.upper >= 1.0
  }
}

/// Annualized summary of a single portfolio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PortfolioPoint {
  /// Annualized expected return.
  pub expected_return: f64,
  /// Annualized volatility.
  pub volatility: f64,
  /// Sharpe ratio at the configured risk-free rate.
  pub sharpe: f64,
}

/// A single asset plotted as the portfolio holding only that asset.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetPoint {
  /// Asset identifier.
  pub ticker: String,
  /// Risk/return summary of the unit-weight portfolio.
  pub point: PortfolioPoint,
}

/// One converged point of the efficient frontier sweep.
#[derive(Clone, Debug, PartialEq)]
pub struct FrontierPoint {
  /// Annualized target return pinned by the equality constraint.
  pub target_return: f64,
  /// Annualized volatility of the minimum-variance portfolio at that target.
  pub volatility: f64,
  /// Converged weights.
  pub weights: Vec<f64>,
}

/// Efficient frontier as an ascending-return sequence of converged points.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrontierCurve {
  /// Converged sweep points in ascending target-return order.
  pub points: Vec<FrontierPoint>,
  /// Number of sweep targets skipped because their solve failed.
  pub skipped: usize,
}

impl FrontierCurve {
  /// Number of converged points.
  pub fn len(&self) -> usize {
    self.points.len()
  }

  /// True when every sweep target was skipped.
  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  /// Target returns in sweep order.
  pub fn returns(&self) -> Vec<f64> {
    self.points.iter().map(|p| p.target_return).collect()
  }

  /// Volatilities in sweep order.
  pub fn volatilities(&self) -> Vec<f64> {
    self.points.iter().map(|p| p.volatility).collect()
  }
}

/// Full output of [`crate::engine::FrontierEngine::analyze`].
#[derive(Clone, Debug, PartialEq)]
pub struct FrontierReport {
  /// Maximum-Sharpe (tangency) portfolio weights.
  pub optimal_weights: Vec<f64>,
  /// Risk/return summary of the maximum-Sharpe portfolio.
  pub optimal: PortfolioPoint,
  /// Minimum-variance portfolio weights.
  pub mvp_weights: Vec<f64>,
  /// Risk/return summary of the minimum-variance portfolio.
  pub mvp: PortfolioPoint,
  /// Efficient frontier sweep.
  pub frontier: FrontierCurve,
  /// Single-asset portfolios in universe order, for scatter overlays.
  pub assets: Vec<AssetPoint>,
}
