//! Defender strategies for Stackelberg security games against a
//! quantal-response attacker.
//!
//! The defender's best achievable expected utility is found by bisection:
//! each probe builds a mixed-integer program over a piecewise-linear
//! approximation of the utility curves and asks whether the threshold can be
//! reached.

mod bounds;
mod error;
mod formulation;
mod game;
mod linearize;
mod model;
mod oracle;
mod search;

pub use bounds::{estimate_bounds, uniform_strategy, Bracket};
pub use error::PasaqError;
pub use formulation::{Formulation, ThresholdRow, Variables};
pub use game::{
    attacker_utility, defender_utility, expected_attacker_utility, expected_defender_utility,
    quantal_response, quantal_response_distribution, AssignmentMatrix, GameError, PayoffMatrix,
    SecurityGame, Strategy,
};
pub use linearize::{alpha, beta, f1, f2, theta, Linearization};
pub use model::{Model, ModelError, VarGroup};
pub use oracle::{check_feasibility, Feasibility};
pub use search::{binary_search, BinarySearch, Probe, SearchConfig, SearchOutcome, SearchState};

pub use pasaq_mip::{Bound, MipOptions, Termination, VarKind};
