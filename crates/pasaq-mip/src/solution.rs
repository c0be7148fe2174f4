/// Why an integer optimization stopped
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Solved to optimality
    Success,
    /// Some column has inconsistent bounds
    BoundError,
    /// Inconsistent column bounds with presolve off
    RootError,
    /// No integer feasible solution exists (or none reaches the cutoff)
    NoPrimalFeasible,
    /// The relaxation is unbounded
    NoDualFeasible,
    /// The backend reported some other failure
    Failure,
    /// Relative gap fell under the configured tolerance
    MipGap,
    /// Time limit exhausted
    TimeLimit,
    /// Node limit exhausted
    Stopped,
}

impl Termination {
    pub fn is_success(&self) -> bool {
        *self == Termination::Success
    }

    /// Short uppercase tag used in logs
    pub fn label(&self) -> &'static str {
        match self {
            Termination::Success => "SUCCESS",
            Termination::BoundError => "EBOUND",
            Termination::RootError => "EROOT",
            Termination::NoPrimalFeasible => "ENOPFS",
            Termination::NoDualFeasible => "ENODFS",
            Termination::Failure => "EFAIL",
            Termination::MipGap => "EMIPGAP",
            Termination::TimeLimit => "ETMLIM",
            Termination::Stopped => "ESTOP",
        }
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The result of one mixed-integer solve
#[derive(Debug, Clone)]
pub struct MipSolution {
    pub status: Termination,
    /// Integer-feasible column values; empty when none was found
    pub values: Vec<f64>,
    /// Objective of the solution, NaN when there is none
    pub objective_value: f64,
}

impl MipSolution {
    pub fn terminated(status: Termination) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective_value: f64::NAN,
        }
    }

    pub fn has_incumbent(&self) -> bool {
        !self.values.is_empty()
    }
}
