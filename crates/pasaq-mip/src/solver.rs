use good_lp::solvers::microlp::microlp;
use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel,
    Variable,
};

use crate::problem::{Bound, Direction, MipProblem};
use crate::solution::{MipSolution, Termination};

/// Options for one mixed-integer solve
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct MipOptions {
    /// Report inconsistent column bounds as `BoundError` instead of `RootError`
    pub presolve: bool,
    /// Objective value a solution must reach to be of interest
    pub cutoff: Option<f64>,
    /// Slack allowed when comparing against the cutoff and empty-row bounds
    pub tolerance: f64,
}

impl Default for MipOptions {
    fn default() -> Self {
        Self {
            presolve: true,
            cutoff: None,
            tolerance: 1e-9,
        }
    }
}

impl MipOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_presolve(mut self, presolve: bool) -> Self {
        self.presolve = presolve;
        self
    }

    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Hands a [`MipProblem`] to `good_lp` with the pure-Rust `microlp` backend
/// and maps the outcome onto [`Termination`].
///
/// The backend runs its own branch and bound to completion, so `MipGap`,
/// `TimeLimit` and `Stopped` are never reported here.
#[derive(Debug, Clone, Default)]
pub struct MipSolver {
    options: MipOptions,
}

impl MipSolver {
    pub fn new(options: MipOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MipOptions {
        &self.options
    }

    pub fn solve(&self, problem: &MipProblem) -> MipSolution {
        if let Err(e) = problem.check_bounds() {
            log::debug!("{}: {}", problem.name, e);
            let status = if self.options.presolve {
                Termination::BoundError
            } else {
                Termination::RootError
            };
            return MipSolution::terminated(status);
        }

        let entries = problem.row_entries();
        for (row, terms) in problem.rows.iter().zip(&entries) {
            let empty = terms.iter().all(|&(_, v)| v == 0.0);
            if empty && !row.bound.contains(0.0, self.options.tolerance) {
                log::debug!("{}: empty row {} excludes zero", problem.name, row.name);
                return MipSolution::terminated(Termination::NoPrimalFeasible);
            }
        }

        let mut vars = ProblemVariables::new();
        let columns = problem
            .columns
            .iter()
            .map(|column| {
                let bound = column.effective_bound();
                let mut definition = variable().name(column.name.clone());
                if column.is_integer() {
                    definition = definition.integer();
                }
                if bound.lower().is_finite() {
                    definition = definition.min(bound.lower());
                }
                if bound.upper().is_finite() {
                    definition = definition.max(bound.upper());
                }
                vars.add(definition)
            })
            .collect::<Vec<Variable>>();

        let mut objective = Expression::with_capacity(columns.len());
        for (column, &var) in problem.columns.iter().zip(&columns) {
            if column.objective != 0.0 {
                objective.add_mul(column.objective, var);
            }
        }

        let unsolved = match problem.direction {
            Direction::Maximize => vars.maximise(objective),
            Direction::Minimize => vars.minimise(objective),
        };
        let mut model = unsolved.using(microlp);

        for (row, terms) in problem.rows.iter().zip(&entries) {
            if terms.is_empty() {
                continue;
            }
            let lhs = || {
                let mut expr = Expression::with_capacity(terms.len());
                for &(col, value) in terms {
                    expr.add_mul(value, columns[col]);
                }
                expr
            };
            model = match row.bound {
                Bound::Free => model,
                Bound::Lower(l) => model.with(constraint!(lhs() >= l)),
                Bound::Upper(u) => model.with(constraint!(lhs() <= u)),
                Bound::Fixed(v) => model.with(constraint!(lhs() == v)),
                Bound::Double(l, u) => model
                    .with(constraint!(lhs() >= l))
                    .with(constraint!(lhs() <= u)),
            };
        }

        let solution = match model.solve() {
            Ok(solution) => solution,
            Err(e) => {
                let status = termination_of(&e);
                log::debug!("{}: {} ({})", problem.name, status, e);
                return MipSolution::terminated(status);
            }
        };

        let values = problem
            .columns
            .iter()
            .zip(&columns)
            .map(|(column, &var)| {
                let value = solution.value(var);
                if column.is_integer() { value.round() } else { value }
            })
            .collect::<Vec<f64>>();
        let objective_value = problem.objective_value(&values);

        if let Some(cutoff) = self.options.cutoff {
            let sense = match problem.direction {
                Direction::Maximize => 1.0,
                Direction::Minimize => -1.0,
            };
            if objective_value * sense < cutoff * sense - self.options.tolerance {
                log::trace!(
                    "{}: optimum {:.3e} misses cutoff {:.3e}",
                    problem.name,
                    objective_value,
                    cutoff
                );
                return MipSolution::terminated(Termination::NoPrimalFeasible);
            }
        }

        MipSolution {
            status: Termination::Success,
            values,
            objective_value,
        }
    }
}

fn termination_of(error: &ResolutionError) -> Termination {
    match error {
        ResolutionError::Infeasible => Termination::NoPrimalFeasible,
        ResolutionError::Unbounded => Termination::NoDualFeasible,
        _ => Termination::Failure,
    }
}
