//! # Errors
//!
//! Typed failure taxonomy for the returns pipeline, portfolio metrics and the
//! constrained solver.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type FrontierResult<T> = std::result::Result<T, FrontierError>;

/// Errors surfaced by frontier computations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrontierError {
  /// An input dimension does not match the rest of the problem.
  #[error("shape mismatch for {what}: expected {expected}, got {actual}")]
  ShapeMismatch {
    /// Which input disagreed.
    what: &'static str,
    /// Dimension implied by the rest of the inputs.
    expected: usize,
    /// Dimension actually supplied.
    actual: usize,
  },

  /// Too few observations (or assets) to compute the requested quantity.
  #[error("insufficient data: need at least {required}, got {actual}")]
  InsufficientData {
    /// Minimum count required.
    required: usize,
    /// Count actually supplied.
    actual: usize,
  },

  /// A price observation produced a non-finite return.
  #[error("non-finite return at row {row}, column {column}: price history has a gap")]
  PriceGap {
    /// Return-matrix row of the offending value.
    row: usize,
    /// Asset column of the offending value.
    column: usize,
  },

  /// The quadratic form `w' S w` evaluated meaningfully below zero.
  #[error("negative portfolio variance {variance}: covariance is not positive semi-definite")]
  NegativeVariance {
    /// The offending quadratic-form value.
    variance: f64,
  },

  /// Covariance estimation failed or produced non-finite entries.
  #[error("covariance matrix is singular or could not be estimated")]
  SingularCovariance,

  /// Sharpe ratio requested for a portfolio with (numerically) zero volatility.
  #[error("Sharpe ratio undefined: volatility {volatility} is numerically zero")]
  UndefinedSharpe {
    /// Volatility that failed the threshold.
    volatility: f64,
  },

  /// The solver exhausted its iteration budget or met an unsolvable subproblem.
  #[error(
    "solver failed to converge after {iterations} iterations (constraint violation {constraint_violation:.3e})"
  )]
  SolverNonConvergence {
    /// Iterations performed before giving up.
    iterations: u32,
    /// Equality-constraint violation at the final iterate.
    constraint_violation: f64,
  },

  /// The constraint set admits no feasible point.
  #[error("infeasible constraints: {reason}")]
  InfeasibleConstraint {
    /// Human-readable description of the conflict.
    reason: String,
  },

  /// The asset universe contains a repeated ticker.
  #[error("duplicate asset `{ticker}` in universe")]
  DuplicateAsset {
    /// The repeated identifier.
    ticker: String,
  },

  /// A scalar input is outside its meaningful range.
  #[error("invalid input: {reason}")]
  InvalidInput {
    /// What was wrong with the value.
    reason: String,
  },
}

impl FrontierError {
  /// Shape-mismatch constructor.
  #[must_use]
  pub fn shape_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
    Self::ShapeMismatch {
      what,
      expected,
      actual,
    }
  }

  /// Insufficient-data constructor.
  #[must_use]
  pub fn insufficient_data(required: usize, actual: usize) -> Self {
    Self::InsufficientData { required, actual }
  }

  /// Non-convergence constructor.
  #[must_use]
  pub fn non_convergence(iterations: u32, constraint_violation: f64) -> Self {
    Self::SolverNonConvergence {
      iterations,
      constraint_violation,
    }
  }

  /// Infeasible-constraint constructor.
  #[must_use]
  pub fn infeasible(reason: impl Into<String>) -> Self {
    Self::InfeasibleConstraint {
      reason: reason.into(),
    }
  }

  /// Invalid-input constructor.
  #[must_use]
  pub fn invalid_input(reason: impl Into<String>) -> Self {
    Self::InvalidInput {
      reason: reason.into(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_messages_are_informative() {
    let err = FrontierError::shape_mismatch("weights", 4, 3);
    assert_eq!(
      err.to_string(),
      "shape mismatch for weights: expected 4, got 3"
    );

    let err = FrontierError::insufficient_data(2, 1);
    assert_eq!(err.to_string(), "insufficient data: need at least 2, got 1");

    let err = FrontierError::PriceGap { row: 7, column: 2 };
    assert!(err.to_string().contains("row 7"));
    assert!(err.to_string().contains("column 2"));
  }

  #[test]
  fn errors_compare_by_value() {
    assert_eq!(
      FrontierError::insufficient_data(2, 0),
      FrontierError::InsufficientData {
        required: 2,
        actual: 0
      }
    );
    assert_ne!(
      FrontierError::SingularCovariance,
      FrontierError::UndefinedSharpe { volatility: 0.0 }
    );
  }
}
