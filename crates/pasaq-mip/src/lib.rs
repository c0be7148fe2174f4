//! Mixed-integer programs as plain data, solved through `good_lp`.

mod problem;
mod solution;
mod solver;

pub use problem::{Bound, Column, Direction, MipProblem, ProblemError, Row, VarKind};
pub use solution::{MipSolution, Termination};
pub use solver::{MipOptions, MipSolver};
