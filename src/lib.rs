//! # frontier-rs
//!
//! $$
//! \max_{\mathbf{w}} \; \frac{\mu^\top \mathbf{w} - r_f}{\sqrt{\mathbf{w}^\top \Sigma \mathbf{w}}}
//! \quad \text{s.t.} \quad \mathbf{1}^\top \mathbf{w} = 1, \; \ell \le w_i \le u
//! $$
//!
//! Mean-variance portfolio analytics: simple returns and annualized moments
//! from a price history, a sequential quadratic programming solver for
//! box-bounded equality-constrained problems, maximum-Sharpe and
//! minimum-variance portfolios, and the efficient frontier traced between
//! the minimum-variance return and the best single asset.

pub mod engine;
pub mod error;
pub mod frontier;
pub mod metrics;
pub mod returns;
pub mod solver;
pub mod types;

pub use engine::FrontierConfig;
pub use engine::FrontierEngine;
pub use error::FrontierError;
pub use error::FrontierResult;
pub use frontier::efficient_frontier;
pub use frontier::efficient_frontier_from_mvp;
pub use frontier::max_sharpe_weights;
pub use frontier::min_variance_weights;
pub use frontier::target_return_weights;
pub use metrics::NegativeSharpe;
pub use metrics::PortfolioVariance;
pub use metrics::expected_return;
pub use metrics::portfolio_variance;
pub use metrics::sharpe_ratio;
pub use metrics::volatility;
pub use returns::annualized_covariance;
pub use returns::correlation_matrix;
pub use returns::mean_returns;
pub use returns::simple_returns;
pub use solver::EqualityConstraint;
pub use solver::LinearConstraint;
pub use solver::OptimizationResult;
pub use solver::SolverConfig;
pub use solver::minimize;
pub use types::AssetPoint;
pub use types::AssetUniverse;
pub use types::Bounds;
pub use types::CovarianceMatrix;
pub use types::FrontierCurve;
pub use types::FrontierPoint;
pub use types::FrontierReport;
pub use types::PortfolioPoint;
pub use types::PriceMatrix;
pub use types::ReturnMatrix;
