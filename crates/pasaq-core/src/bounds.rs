use crate::game::{expected_defender_utility, GameError, PayoffMatrix, Strategy};

/// The `[lower, upper]` utility range kept by the binary search
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub lower: f64,
    pub upper: f64,
}

impl Bracket {
    pub fn new(lower: f64, upper: f64) -> Result<Self, GameError> {
        let bracket = Self { lower, upper };
        bracket.validate()?;
        Ok(bracket)
    }

    pub fn validate(&self) -> Result<(), GameError> {
        if !self.lower.is_finite() || !self.upper.is_finite() || self.lower > self.upper {
            return Err(GameError::DegenerateInput(format!(
                "invalid bracket [{}, {}]",
                self.lower, self.upper
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn midpoint(&self) -> f64 {
        (self.upper + self.lower) / 2.0
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Even split of the budget used for the lower bound. Never below full
/// coverage per target.
pub fn uniform_strategy(budget: f64, targets: usize) -> Strategy {
    let coverage = (budget / targets as f64).max(1.0);
    vec![coverage; targets]
}

/// Initial bracket: the uniform strategy's expected defender utility up to
/// the sum of every defender reward.
///
/// The result is not validated. With mixed-sign defender rewards the lower
/// end can exceed the upper one.
pub fn estimate_bounds(budget: f64, pm: &PayoffMatrix, lambda: f64) -> Result<Bracket, GameError> {
    let targets = pm.require_targets()?;
    let uniform = uniform_strategy(budget, targets);
    let lower = expected_defender_utility(&uniform, pm, lambda)?;
    let upper = pm.defender_reward.iter().sum();
    Ok(Bracket { lower, upper })
}
