//! Damped Gauss-Newton driver for [`ConstrainedLeastSquares`] problems.
//!
//! Each iteration linearizes at the current iterate and solves
//!
//! ```text
//! [ JᵀJ + μI   J_cᵀ ] [ dx ]   [ -Jᵀ f ]
//! [ J_c        0    ] [ λ  ] = [ -c    ]
//! ```
//!
//! through an SVD, so dependent constraint rows are tolerated. A step is
//! accepted when it lowers the merit `‖f‖² + ‖c‖²`; otherwise `μ` grows and
//! the step is retried.
//!
//! The Jacobians stay sparse and `JᵀJ` is a sparse product, but the step
//! system itself is a dense `(n + m)²` matrix. This is a reference driver
//! for meshes up to a few hundred vertices.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};

use crate::mesh_error::PolyMeshError;
use crate::optimization::traits::{ConstrainedLeastSquares, IterationControl, NumericalDiagnostics};

/// Tuning of [`LevenbergMarquardt`].
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevenbergMarquardtParams {
    pub max_iterations: usize,
    pub initial_damping: f64,
    /// Factor applied to `μ` after a rejected step.
    pub damping_increase: f64,
    /// Divisor applied to `μ` after an accepted step.
    pub damping_decrease: f64,
    /// Give up on the current iterate once `μ` exceeds this.
    pub max_damping: f64,
    /// Converged once the merit drops to this value.
    pub energy_tolerance: f64,
    /// Converged once `‖dx‖ <= step_tolerance * (1 + ‖x‖)`, or once the
    /// linear model predicts no decrease above rounding.
    pub step_tolerance: f64,
    /// Relative singular value cutoff of the step system.
    pub rank_tolerance: f64,
}

impl Default for LevenbergMarquardtParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            initial_damping: 1e-4,
            damping_increase: 2.0,
            damping_decrease: 3.0,
            max_damping: 1e12,
            energy_tolerance: 1e-20,
            step_tolerance: 1e-12,
            rank_tolerance: 1e-12,
        }
    }
}

/// Why the driver stopped.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    EnergyTolerance,
    StepTolerance,
    /// `post_iteration` asked to stop.
    Requested,
    /// No damping level produced a decrease.
    Stalled,
    MaxIterations,
    /// Energy or constraints evaluated to a non-finite merit.
    NonFinite,
}

impl Termination {
    pub fn is_converged(self) -> bool {
        matches!(self, Termination::EnergyTolerance | Termination::StepTolerance)
    }
}

/// Outcome of a solve.
#[derive(Clone, Debug)]
pub struct OptimizationReport {
    pub termination: Termination,
    /// Accepted steps.
    pub iterations: usize,
    /// `‖f‖² + ‖c‖²` at `x`.
    pub merit: f64,
    /// Every NaN flagged during the run.
    pub diagnostics: NumericalDiagnostics,
    /// Return value of `post_optimization`.
    pub usable: bool,
    pub x: DVector<f64>,
}

impl OptimizationReport {
    pub fn converged(&self) -> bool {
        self.termination.is_converged()
    }
}

/// Linearization at one iterate.
struct Linearization {
    f: DVector<f64>,
    jacobian: CsrMatrix<f64>,
    c: DVector<f64>,
    constraint_jacobian: CsrMatrix<f64>,
}

impl Linearization {
    fn merit(&self) -> f64 {
        self.f.norm_squared() + self.c.norm_squared()
    }

    /// Merit decrease predicted by the linear model for step `dx`.
    fn predicted_decrease(&self, dx: &DVector<f64>) -> f64 {
        let f = &self.f + &self.jacobian * dx;
        let c = &self.c + &self.constraint_jacobian * dx;
        self.merit() - (f.norm_squared() + c.norm_squared())
    }
}

#[derive(Clone, Debug, Default)]
pub struct LevenbergMarquardt {
    params: LevenbergMarquardtParams,
}

impl LevenbergMarquardt {
    pub fn new(params: LevenbergMarquardtParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &LevenbergMarquardtParams {
        &self.params
    }

    /// Solve starting from `problem.initial_solution()`.
    pub fn solve<P>(&self, problem: &mut P) -> Result<OptimizationReport, PolyMeshError>
    where
        P: ConstrainedLeastSquares + ?Sized,
    {
        let x0 = problem.initial_solution();
        self.solve_from(problem, x0)
    }

    /// Solve starting from an explicit iterate.
    pub fn solve_from<P>(
        &self,
        problem: &mut P,
        x0: DVector<f64>,
    ) -> Result<OptimizationReport, PolyMeshError>
    where
        P: ConstrainedLeastSquares + ?Sized,
    {
        if x0.len() != problem.x_size() {
            return Err(PolyMeshError::DimensionMismatch {
                what: "starting iterate",
                expected: problem.x_size(),
                found: x0.len(),
            });
        }
        let p = &self.params;
        let mut x = x0;
        let mut mu = p.initial_damping;
        let mut diagnostics = NumericalDiagnostics::default();
        let mut iterations = 0;
        let mut merit: f64;

        let termination = loop {
            problem.pre_iteration(&x);
            let lin = linearize(problem, &x, &mut diagnostics)?;
            merit = lin.merit();
            log::debug!("lm iteration {iterations}: merit {merit:e}, damping {mu:e}");

            if !merit.is_finite() {
                log::warn!("non-finite merit at iteration {iterations}");
                break Termination::NonFinite;
            }
            if merit <= p.energy_tolerance {
                break Termination::EnergyTolerance;
            }
            if iterations >= p.max_iterations {
                break Termination::MaxIterations;
            }

            let jt = lin.jacobian.transpose();
            let jtj = DMatrix::from(&(&jt * &lin.jacobian));
            let gradient = &jt * &lin.f;
            let mut accepted = None;
            let mut first_attempt = true;
            let mut at_rest = false;
            while mu <= p.max_damping {
                let Some(dx) = self.damped_step(&jtj, &gradient, &lin, mu) else {
                    mu *= p.damping_increase;
                    first_attempt = false;
                    continue;
                };
                // x is stationary when the lightly damped step is tiny or
                // cannot lower the merit beyond rounding
                if first_attempt
                    && (dx.norm() <= p.step_tolerance * (1.0 + x.norm())
                        || lin.predicted_decrease(&dx) <= 4.0 * f64::EPSILON * merit)
                {
                    at_rest = true;
                    break;
                }
                first_attempt = false;
                let trial = &x + &dx;
                let trial_merit = evaluate_merit(problem, &trial, &mut diagnostics)?;
                if trial_merit.is_finite() && trial_merit < merit {
                    mu = (mu / p.damping_decrease).max(f64::MIN_POSITIVE);
                    accepted = Some((trial, dx, trial_merit));
                    break;
                }
                log::trace!("rejected step: merit {trial_merit:e} >= {merit:e}");
                mu *= p.damping_increase;
            }

            if at_rest {
                break Termination::StepTolerance;
            }
            let Some((trial, dx, trial_merit)) = accepted else {
                log::warn!("no decrease found with damping up to {:e}", p.max_damping);
                break Termination::Stalled;
            };
            x = trial;
            merit = trial_merit;
            iterations += 1;

            if problem.post_iteration(&x) == IterationControl::Stop {
                break Termination::Requested;
            }
            if dx.norm() <= p.step_tolerance * (1.0 + x.norm()) {
                break Termination::StepTolerance;
            }
        };

        let usable = problem.post_optimization(&x);
        log::debug!(
            "lm finished after {iterations} iterations: {termination:?}, merit {merit:e}"
        );
        Ok(OptimizationReport {
            termination,
            iterations,
            merit,
            diagnostics,
            usable,
            x,
        })
    }

    /// `None` when the step system could not be solved.
    fn damped_step(
        &self,
        jtj: &DMatrix<f64>,
        gradient: &DVector<f64>,
        lin: &Linearization,
        mu: f64,
    ) -> Option<DVector<f64>> {
        let n = jtj.nrows();
        let m = lin.c.len();
        let mut kkt = DMatrix::zeros(n + m, n + m);
        kkt.view_mut((0, 0), (n, n)).copy_from(jtj);
        for i in 0..n {
            kkt[(i, i)] += mu;
        }
        for (r, c, &v) in lin.constraint_jacobian.triplet_iter() {
            kkt[(n + r, c)] += v;
            kkt[(c, n + r)] += v;
        }

        let rhs = DVector::from_iterator(
            n + m,
            gradient.iter().chain(lin.c.iter()).map(|v| -v),
        );
        let svd = kkt.svd(true, true);
        let cutoff = self.params.rank_tolerance * svd.singular_values.max();
        let sol = svd.solve(&rhs, cutoff).ok()?;
        let dx = DVector::from_iterator(n, sol.iter().take(n).copied());
        dx.iter().all(|v| v.is_finite()).then_some(dx)
    }
}

fn linearize<P>(
    problem: &mut P,
    x: &DVector<f64>,
    diagnostics: &mut NumericalDiagnostics,
) -> Result<Linearization, PolyMeshError>
where
    P: ConstrainedLeastSquares + ?Sized,
{
    diagnostics.merge(problem.update_energy(x)?);
    diagnostics.merge(problem.update_jacobian(x)?);
    problem.update_constraints(x)?;
    Ok(Linearization {
        f: problem.energy().clone(),
        jacobian: problem.energy_jacobian().clone(),
        c: problem.constraints().clone(),
        constraint_jacobian: problem.constraint_jacobian().clone(),
    })
}

fn evaluate_merit<P>(
    problem: &mut P,
    x: &DVector<f64>,
    diagnostics: &mut NumericalDiagnostics,
) -> Result<f64, PolyMeshError>
where
    P: ConstrainedLeastSquares + ?Sized,
{
    diagnostics.merge(problem.update_energy(x)?);
    problem.update_constraints(x)?;
    Ok(problem.energy().norm_squared() + problem.constraints().norm_squared())
}
