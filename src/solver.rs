//! # Constrained Solver
//!
//! $$
//! \min_{\mathbf{d}} \; \mathbf{g}^\top \mathbf{d} + \tfrac{1}{2} \mathbf{d}^\top B \mathbf{d}
//! \quad \text{s.t.} \quad A \mathbf{d} = -\mathbf{c}, \; \mathbf{l} \le \mathbf{w} + \mathbf{d} \le \mathbf{u}
//! $$
//!
//! Sequential quadratic programming for smooth objectives under equality
//! constraints and per-asset box bounds. Each iteration linearizes the
//! constraints, solves the bound-respecting quadratic subproblem through an
//! active-set sequence of KKT systems, and advances with a backtracking line
//! search on an L1 merit function. Curvature is maintained by damped BFGS
//! updates, so the objective only ever needs cost evaluations.

use argmin::core::CostFunction;
use nalgebra::DMatrix;
use nalgebra::DVector;

use crate::error::FrontierError;
use crate::error::FrontierResult;

/// Step size for the default finite-difference constraint gradient.
const FD_STEP: f64 = 1e-6;

/// Armijo sufficient-decrease coefficient.
const ARMIJO_C: f64 = 1e-4;

/// Smallest backtracking step before the line search gives up.
const MIN_ALPHA: f64 = 1e-10;

/// Residual tolerance for the linearized constraints inside the subproblem.
const QP_FEAS_TOL: f64 = 1e-8;

/// Slack allowed before a step component counts as bound-violating.
const QP_BOUND_TOL: f64 = 1e-12;

/// Tuning knobs for [`minimize`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverConfig {
  /// Convergence tolerance on the step norm, constraint violation and
  /// objective change.
  pub tolerance: f64,
  /// Iteration cap before the solver reports non-convergence.
  pub max_iterations: u32,
  /// Relative step for central-difference objective gradients.
  pub gradient_step: f64,
}

impl Default for SolverConfig {
  fn default() -> Self {
    Self {
      tolerance: 1e-8,
      max_iterations: 200,
      gradient_step: 1e-6,
    }
  }
}

/// Outcome of a [`minimize`] run.
///
/// Numerical failure (iteration cap, unsolvable subproblem, non-finite
/// objective) is reported through `converged = false`; `Err` is reserved for
/// malformed inputs.
#[derive(Clone, Debug)]
pub struct OptimizationResult {
  /// Final iterate.
  pub weights: Vec<f64>,
  /// Objective value at the final iterate.
  pub objective: f64,
  /// Outer iterations performed.
  pub iterations: u32,
  /// Whether the tolerances were met.
  pub converged: bool,
  /// L1 norm of the equality-constraint violation at the final iterate.
  pub constraint_violation: f64,
}

/// A single scalar equality constraint `c(w) = 0`.
pub trait EqualityConstraint {
  /// Constraint residual at `w`.
  fn value(&self, weights: &[f64]) -> f64;

  /// Constraint gradient at `w`; the default uses central differences.
  fn gradient(&self, weights: &[f64]) -> Vec<f64> {
    let mut grad = vec![0.0; weights.len()];
    let mut probe = weights.to_vec();
    for i in 0..weights.len() {
      let h = FD_STEP * (1.0 + weights[i].abs());
      probe[i] = weights[i] + h;
      let plus = self.value(&probe);
      probe[i] = weights[i] - h;
      let minus = self.value(&probe);
      probe[i] = weights[i];
      grad[i] = (plus - minus) / (2.0 * h);
    }
    grad
  }
}

/// Affine constraint `a . w = rhs` with an exact gradient.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearConstraint {
  /// Coefficient vector `a`.
  pub coefficients: Vec<f64>,
  /// Right-hand side.
  pub rhs: f64,
}

impl LinearConstraint {
  /// Full-investment constraint `sum(w) = 1`.
  #[must_use]
  pub fn budget(n: usize) -> Self {
    Self {
      coefficients: vec![1.0; n],
      rhs: 1.0,
    }
  }

  /// Pin the annualized portfolio return to `target`.
  #[must_use]
  pub fn target_return(annualized_means: &[f64], target: f64) -> Self {
    Self {
      coefficients: annualized_means.to_vec(),
      rhs: target,
    }
  }
}

impl EqualityConstraint for LinearConstraint {
  fn value(&self, weights: &[f64]) -> f64 {
    dot(&self.coefficients, weights) - self.rhs
  }

  fn gradient(&self, _weights: &[f64]) -> Vec<f64> {
    self.coefficients.clone()
  }
}

/// Minimize `objective` subject to equality constraints and box bounds.
///
/// The starting point is clamped into the box before iterating; every
/// subsequent iterate stays inside it. Callers that need reproducible solves
/// pass the uniform vector `1/n` as `initial`.
pub fn minimize<O: CostFunction<Param = Vec<f64>, Output = f64>>(
  objective: &O,
  constraints: &[&dyn EqualityConstraint],
  bounds: &[(f64, f64)],
  initial: &[f64],
  config: &SolverConfig,
) -> FrontierResult<OptimizationResult> {
  let n = initial.len();
  validate_inputs(constraints, bounds, initial, config)?;

  let mut w: Vec<f64> = initial
    .iter()
    .zip(bounds)
    .map(|(x, (lo, hi))| x.clamp(*lo, *hi))
    .collect();

  let mut f = eval_cost(objective, &w);
  let mut violation = constraint_violation(constraints, &w);
  let mut iterations = 0u32;
  let mut converged = false;

  if !f.is_finite() {
    return Ok(OptimizationResult {
      weights: w,
      objective: f,
      iterations,
      converged,
      constraint_violation: violation,
    });
  }

  let mut gradient = match objective_gradient(objective, &w, config.gradient_step) {
    Some(g) => g,
    None => {
      return Ok(OptimizationResult {
        weights: w,
        objective: f,
        iterations,
        converged,
        constraint_violation: violation,
      });
    }
  };

  let mut b_mat = DMatrix::<f64>::identity(n, n);
  let mut penalty = 1.0f64;

  for iteration in 1..=config.max_iterations {
    iterations = iteration;

    let residuals: Vec<f64> = constraints.iter().map(|c| c.value(&w)).collect();
    let jacobian: Vec<Vec<f64>> = constraints.iter().map(|c| c.gradient(&w)).collect();
    let qp_rhs: Vec<f64> = residuals.iter().map(|c| -c).collect();
    let lower_step: Vec<f64> = w.iter().zip(bounds).map(|(wi, (lo, _))| lo - wi).collect();
    let upper_step: Vec<f64> = w.iter().zip(bounds).map(|(wi, (_, hi))| hi - wi).collect();

    let (direction, multipliers) = match solve_qp_subproblem(
      &b_mat,
      &gradient,
      &jacobian,
      &qp_rhs,
      &lower_step,
      &upper_step,
    ) {
      Some(step) => step,
      None => break,
    };

    let step_norm = infinity_norm(&direction);
    if step_norm <= config.tolerance && violation <= config.tolerance {
      converged = true;
      break;
    }

    penalty = penalty.max(2.0 * infinity_norm(&multipliers) + 1.0);

    let merit = f + penalty * violation;
    let slope = (dot(&gradient, &direction) - penalty * violation).min(0.0);

    let mut alpha = 1.0f64;
    let accepted = loop {
      let trial: Vec<f64> = w
        .iter()
        .zip(&direction)
        .zip(bounds)
        .map(|((wi, di), (lo, hi))| (wi + alpha * di).clamp(*lo, *hi))
        .collect();
      let trial_cost = eval_cost(objective, &trial);
      let trial_violation = constraint_violation(constraints, &trial);
      let trial_merit = trial_cost + penalty * trial_violation;

      if trial_merit.is_finite() && trial_merit <= merit + ARMIJO_C * alpha * slope {
        break Some((trial, trial_cost, trial_violation, alpha));
      }

      alpha *= 0.5;
      if alpha < MIN_ALPHA {
        break None;
      }
    };

    let (next_w, next_f, next_violation, alpha) = match accepted {
      Some(step) => step,
      None => {
        // The merit function is flat along the step within roundoff; feasible
        // iterates are at a stationary point for any practical purpose.
        converged = violation <= config.tolerance;
        break;
      }
    };

    let next_gradient = match objective_gradient(objective, &next_w, config.gradient_step) {
      Some(g) => g,
      None => {
        w = next_w;
        f = next_f;
        violation = next_violation;
        break;
      }
    };

    let step: Vec<f64> = next_w.iter().zip(&w).map(|(a, b)| a - b).collect();
    let curvature: Vec<f64> = next_gradient
      .iter()
      .zip(&gradient)
      .map(|(a, b)| a - b)
      .collect();
    bfgs_update(
      &mut b_mat,
      &DVector::from_column_slice(&step),
      &DVector::from_column_slice(&curvature),
    );

    let objective_change = (f - next_f).abs();
    let objective_settled = objective_change <= config.tolerance * (1.0 + next_f.abs());

    w = next_w;
    f = next_f;
    violation = next_violation;
    gradient = next_gradient;

    // Only trust a tiny objective change when the full step was taken.
    if alpha == 1.0 && objective_settled && violation <= config.tolerance {
      converged = true;
      break;
    }
  }

  Ok(OptimizationResult {
    weights: w,
    objective: f,
    iterations,
    converged,
    constraint_violation: violation,
  })
}

fn validate_inputs(
  constraints: &[&dyn EqualityConstraint],
  bounds: &[(f64, f64)],
  initial: &[f64],
  config: &SolverConfig,
) -> FrontierResult<()> {
  let n = initial.len();
  if n == 0 {
    return Err(FrontierError::insufficient_data(1, 0));
  }
  if bounds.len() != n {
    return Err(FrontierError::shape_mismatch("bounds", n, bounds.len()));
  }
  for (lo, hi) in bounds {
    if !lo.is_finite() || !hi.is_finite() {
      return Err(FrontierError::infeasible("bounds must be finite"));
    }
    if lo > hi {
      return Err(FrontierError::infeasible(format!(
        "lower bound {lo} exceeds upper bound {hi}"
      )));
    }
  }
  if !config.tolerance.is_finite()
    || config.tolerance <= 0.0
    || !config.gradient_step.is_finite()
    || config.gradient_step <= 0.0
    || config.max_iterations == 0
  {
    return Err(FrontierError::invalid_input(
      "solver tolerance, gradient step and iteration cap must be positive",
    ));
  }
  for constraint in constraints {
    let grad = constraint.gradient(initial);
    if grad.len() != n {
      return Err(FrontierError::shape_mismatch(
        "constraint gradient",
        n,
        grad.len(),
      ));
    }
  }
  Ok(())
}

fn eval_cost<O: CostFunction<Param = Vec<f64>, Output = f64>>(
  objective: &O,
  weights: &Vec<f64>,
) -> f64 {
  match objective.cost(weights) {
    Ok(value) if !value.is_nan() => value,
    _ => f64::INFINITY,
  }
}

fn objective_gradient<O: CostFunction<Param = Vec<f64>, Output = f64>>(
  objective: &O,
  weights: &[f64],
  step: f64,
) -> Option<Vec<f64>> {
  let mut grad = vec![0.0; weights.len()];
  let mut probe = weights.to_vec();
  for i in 0..weights.len() {
    let h = step * (1.0 + weights[i].abs());
    probe[i] = weights[i] + h;
    let plus = eval_cost(objective, &probe);
    probe[i] = weights[i] - h;
    let minus = eval_cost(objective, &probe);
    probe[i] = weights[i];
    let slope = (plus - minus) / (2.0 * h);
    if !slope.is_finite() {
      return None;
    }
    grad[i] = slope;
  }
  Some(grad)
}

fn constraint_violation(constraints: &[&dyn EqualityConstraint], weights: &[f64]) -> f64 {
  constraints.iter().map(|c| c.value(weights).abs()).sum()
}

/// Solve the bound-constrained QP subproblem by progressively fixing blocking
/// variables at their bounds and re-solving the reduced equality KKT system.
///
/// Returns the step and the equality multipliers, or `None` when the
/// linearized constraints cannot be met inside the box (or a KKT system is
/// singular).
fn solve_qp_subproblem(
  b_mat: &DMatrix<f64>,
  gradient: &[f64],
  jacobian: &[Vec<f64>],
  rhs: &[f64],
  lower_step: &[f64],
  upper_step: &[f64],
) -> Option<(Vec<f64>, Vec<f64>)> {
  let n = gradient.len();
  let m = jacobian.len();
  let mut fixed: Vec<Option<f64>> = vec![None; n];

  for _pass in 0..=n {
    let free: Vec<usize> = (0..n).filter(|&i| fixed[i].is_none()).collect();
    let nf = free.len();

    if nf == 0 {
      let direction: Vec<f64> = fixed.iter().map(|t| t.unwrap_or(0.0)).collect();
      let residual = (0..m)
        .map(|k| (dot(&jacobian[k], &direction) - rhs[k]).abs())
        .fold(0.0f64, f64::max);
      if residual <= QP_FEAS_TOL {
        return Some((direction, vec![0.0; m]));
      }
      return None;
    }

    let dim = nf + m;
    let mut kkt = DMatrix::<f64>::zeros(dim, dim);
    let mut kkt_rhs = DVector::<f64>::zeros(dim);

    for (r, &i) in free.iter().enumerate() {
      for (c, &j) in free.iter().enumerate() {
        kkt[(r, c)] = b_mat[(i, j)];
      }
      for k in 0..m {
        kkt[(r, nf + k)] = jacobian[k][i];
        kkt[(nf + k, r)] = jacobian[k][i];
      }

      let mut v = gradient[i];
      for j in 0..n {
        if let Some(t) = fixed[j] {
          v += b_mat[(i, j)] * t;
        }
      }
      kkt_rhs[r] = -v;
    }
    for k in 0..m {
      let mut v = rhs[k];
      for j in 0..n {
        if let Some(t) = fixed[j] {
          v -= jacobian[k][j] * t;
        }
      }
      kkt_rhs[nf + k] = v;
    }

    let solution = kkt.lu().solve(&kkt_rhs)?;

    let mut direction = vec![0.0; n];
    for (r, &i) in free.iter().enumerate() {
      direction[i] = solution[r];
    }
    for j in 0..n {
      if let Some(t) = fixed[j] {
        direction[j] = t;
      }
    }
    if direction.iter().any(|v| !v.is_finite()) {
      return None;
    }

    // Ratio test: fix the first-blocking component at its bound offset.
    let mut blocking: Option<(usize, f64, f64)> = None;
    for &i in &free {
      let di = direction[i];
      let (violates, bound) = if di > upper_step[i] + QP_BOUND_TOL {
        (true, upper_step[i].max(0.0))
      } else if di < lower_step[i] - QP_BOUND_TOL {
        (true, lower_step[i].min(0.0))
      } else {
        (false, 0.0)
      };
      if violates {
        let ratio = if di.abs() > 1e-16 { bound / di } else { 0.0 };
        if blocking.map_or(true, |(_, best, _)| ratio < best) {
          blocking = Some((i, ratio, bound));
        }
      }
    }

    match blocking {
      None => {
        let multipliers: Vec<f64> = (0..m).map(|k| solution[nf + k]).collect();
        return Some((direction, multipliers));
      }
      Some((i, _, bound)) => fixed[i] = Some(bound),
    }
  }

  None
}

/// Powell-damped BFGS update keeping the Hessian model positive definite.
fn bfgs_update(b_mat: &mut DMatrix<f64>, step: &DVector<f64>, curvature: &DVector<f64>) {
  if step.norm() < 1e-14 {
    return;
  }

  let bs = &*b_mat * step;
  let sbs = step.dot(&bs);
  if sbs <= 1e-16 {
    return;
  }

  let sy = step.dot(curvature);
  let theta = if sy < 0.2 * sbs {
    0.8 * sbs / (sbs - sy)
  } else {
    1.0
  };
  let damped = curvature * theta + &bs * (1.0 - theta);
  let s_damped = step.dot(&damped);
  if s_damped <= 1e-16 {
    return;
  }

  *b_mat = &*b_mat - (&bs * bs.transpose()) / sbs + (&damped * damped.transpose()) / s_damped;
}

fn infinity_norm(xs: &[f64]) -> f64 {
  xs.iter().fold(0.0f64, |acc, x| acc.max(x.abs()))
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
  a.iter().zip(b).map(|(x, y)| x * y).sum()
}
