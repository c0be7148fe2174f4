use thiserror::Error;

/// Per-target coverage probabilities
pub type Strategy = Vec<f64>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GameError {
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),
}

fn degenerate(message: impl Into<String>) -> GameError {
    GameError::DegenerateInput(message.into())
}

/// Rewards and penalties of both players, indexed by target
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct PayoffMatrix {
    /// Defender payoff when the attacked target is covered
    pub defender_reward: Vec<f64>,
    /// Defender payoff when the attacked target is uncovered
    pub defender_penalty: Vec<f64>,
    /// Attacker payoff when the attacked target is uncovered
    pub attacker_reward: Vec<f64>,
    /// Attacker payoff when the attacked target is covered
    pub attacker_penalty: Vec<f64>,
}

impl PayoffMatrix {
    pub fn new(
        defender_reward: Vec<f64>,
        defender_penalty: Vec<f64>,
        attacker_reward: Vec<f64>,
        attacker_penalty: Vec<f64>,
    ) -> Result<Self, GameError> {
        let matrix = Self {
            defender_reward,
            defender_penalty,
            attacker_reward,
            attacker_penalty,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    /// Equal lengths and finite entries. An empty matrix is valid here; the
    /// operations that need targets reject it.
    pub fn validate(&self) -> Result<(), GameError> {
        let t = self.defender_reward.len();
        let lengths = [
            self.defender_penalty.len(),
            self.attacker_reward.len(),
            self.attacker_penalty.len(),
        ];
        if lengths.iter().any(|&l| l != t) {
            return Err(degenerate(format!(
                "payoff vectors differ in length ({}, {}, {}, {})",
                t, lengths[0], lengths[1], lengths[2]
            )));
        }
        let mut all = self
            .defender_reward
            .iter()
            .chain(&self.defender_penalty)
            .chain(&self.attacker_reward)
            .chain(&self.attacker_penalty);
        if all.any(|v| !v.is_finite()) {
            return Err(degenerate("payoffs must be finite"));
        }
        Ok(())
    }

    pub fn num_targets(&self) -> usize {
        self.defender_reward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_targets() == 0
    }

    /// Fails unless the matrix is well formed and has at least one target
    pub fn require_targets(&self) -> Result<usize, GameError> {
        self.validate()?;
        if self.is_empty() {
            return Err(degenerate("the target set is empty"));
        }
        Ok(self.num_targets())
    }
}

/// Coverage contributed by each candidate schedule (columns) to each
/// target (rows)
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentMatrix {
    rows: Vec<Vec<f64>>,
}

impl AssignmentMatrix {
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self, GameError> {
        let matrix = Self { rows };
        matrix.validate()?;
        Ok(matrix)
    }

    /// One schedule per target, each covering only its own target
    pub fn identity(targets: usize) -> Self {
        let rows = (0..targets)
            .map(|i| (0..targets).map(|j| if i == j { 1.0 } else { 0.0 }).collect::<Vec<f64>>())
            .collect();
        Self { rows }
    }

    pub fn validate(&self) -> Result<(), GameError> {
        let schedules = self.num_schedules();
        if schedules == 0 {
            return Err(degenerate("the assignment matrix has no schedules"));
        }
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != schedules {
                return Err(degenerate(format!(
                    "assignment row {} has {} schedules, expected {}",
                    i,
                    row.len(),
                    schedules
                )));
            }
            if let Some(v) = row.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(degenerate(format!("assignment row {} has invalid entry {}", i, v)));
            }
        }
        Ok(())
    }

    pub fn num_targets(&self) -> usize {
        self.rows.len()
    }

    pub fn num_schedules(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    pub fn get(&self, target: usize, schedule: usize) -> f64 {
        self.rows[target][schedule]
    }

    pub fn row(&self, target: usize) -> &[f64] {
        &self.rows[target]
    }

    /// Coverage implied by a schedule mixture: `sum_j A[i][j] * a[j]`
    pub fn coverage(&self, mixture: &[f64]) -> Strategy {
        self.rows
            .iter()
            .map(|row| row.iter().zip(mixture).map(|(a, w)| a * w).sum::<f64>())
            .collect()
    }
}

/// A payoff matrix together with the schedules that can cover its targets
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityGame {
    payoffs: PayoffMatrix,
    assignment: AssignmentMatrix,
}

impl SecurityGame {
    pub fn new(payoffs: PayoffMatrix, assignment: AssignmentMatrix) -> Result<Self, GameError> {
        let game = Self { payoffs, assignment };
        game.validate()?;
        Ok(game)
    }

    pub fn validate(&self) -> Result<(), GameError> {
        let targets = self.payoffs.require_targets()?;
        self.assignment.validate()?;
        if self.assignment.num_targets() != targets {
            return Err(degenerate(format!(
                "assignment matrix has {} rows for {} targets",
                self.assignment.num_targets(),
                targets
            )));
        }
        Ok(())
    }

    pub fn payoffs(&self) -> &PayoffMatrix {
        &self.payoffs
    }

    pub fn assignment(&self) -> &AssignmentMatrix {
        &self.assignment
    }

    pub fn num_targets(&self) -> usize {
        self.payoffs.num_targets()
    }

    pub fn num_schedules(&self) -> usize {
        self.assignment.num_schedules()
    }
}

/// Attacker's payoff for attacking target `i` under coverage `x`
///
/// # Panics
///
/// Panics if `i` is not a valid index into both `x` and `pm`. The
/// distribution and expected-utility functions check lengths first.
pub fn attacker_utility(i: usize, x: &[f64], pm: &PayoffMatrix) -> f64 {
    x[i] * pm.attacker_penalty[i] + (1.0 - x[i]) * pm.attacker_reward[i]
}

/// Defender's payoff when target `i` is attacked under coverage `x`
///
/// # Panics
///
/// Panics if `i` is not a valid index into both `x` and `pm`.
pub fn defender_utility(i: usize, x: &[f64], pm: &PayoffMatrix) -> f64 {
    x[i] * pm.defender_reward[i] + (1.0 - x[i]) * pm.defender_penalty[i]
}

fn check_strategy(x: &[f64], pm: &PayoffMatrix) -> Result<usize, GameError> {
    let targets = pm.require_targets()?;
    if x.len() != targets {
        return Err(degenerate(format!(
            "strategy covers {} targets, payoffs describe {}",
            x.len(),
            targets
        )));
    }
    Ok(targets)
}

/// Probability of the attacker choosing each target: a softmax of attacker
/// utility with rationality `lambda`.
pub fn quantal_response_distribution(
    x: &[f64],
    pm: &PayoffMatrix,
    lambda: f64,
) -> Result<Vec<f64>, GameError> {
    let targets = check_strategy(x, pm)?;
    let exponents: Vec<f64> = (0..targets).map(|i| lambda * attacker_utility(i, x, pm)).collect();
    // Shifting by the largest exponent keeps exp() finite
    let shift = exponents.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = exponents.iter().map(|e| (e - shift).exp()).collect();
    let total: f64 = weights.iter().sum();
    Ok(weights.into_iter().map(|w| w / total).collect())
}

pub fn quantal_response(
    i: usize,
    x: &[f64],
    pm: &PayoffMatrix,
    lambda: f64,
) -> Result<f64, GameError> {
    let distribution = quantal_response_distribution(x, pm, lambda)?;
    distribution
        .get(i)
        .copied()
        .ok_or_else(|| degenerate(format!("target {} does not exist", i)))
}

/// Defender utility averaged over the attacker's quantal response
pub fn expected_defender_utility(
    x: &[f64],
    pm: &PayoffMatrix,
    lambda: f64,
) -> Result<f64, GameError> {
    let q = quantal_response_distribution(x, pm, lambda)?;
    Ok(q.iter().enumerate().map(|(i, qi)| qi * defender_utility(i, x, pm)).sum())
}

/// Attacker utility averaged over its own quantal response
pub fn expected_attacker_utility(
    x: &[f64],
    pm: &PayoffMatrix,
    lambda: f64,
) -> Result<f64, GameError> {
    let q = quantal_response_distribution(x, pm, lambda)?;
    Ok(q.iter().enumerate().map(|(i, qi)| qi * attacker_utility(i, x, pm)).sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn symmetric() -> PayoffMatrix {
        PayoffMatrix::new(
            vec![30.0, 30.0],
            vec![-15.0, -15.0],
            vec![30.0, 30.0],
            vec![-30.0, -30.0],
        )
        .unwrap()
    }

    #[test]
    fn test_player_utilities() {
        let pm = symmetric();
        let x = vec![0.25, 1.0];
        assert!((attacker_utility(0, &x, &pm) - 15.0).abs() < 1e-12);
        assert!((attacker_utility(1, &x, &pm) + 30.0).abs() < 1e-12);
        assert!((defender_utility(0, &x, &pm) + 3.75).abs() < 1e-12);
        assert!((defender_utility(1, &x, &pm) - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_symmetric_coverage_splits_attack_evenly() {
        let pm = symmetric();
        let x = vec![0.5, 0.5];
        assert!((quantal_response(0, &x, &pm, 0.5).unwrap() - 0.5).abs() < 1e-12);
        assert!((expected_defender_utility(&x, &pm, 0.5).unwrap() - 7.5).abs() < 1e-9);
        assert!(expected_attacker_utility(&x, &pm, 0.5).unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_rational_attacker_picks_weakest_target() {
        let pm = symmetric();
        let x = vec![0.1, 0.9];
        let q = quantal_response_distribution(&x, &pm, 50.0).unwrap();
        assert!(q[0] > 0.999);
        assert!(q.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_zero_lambda_is_uniform() {
        let pm = symmetric();
        let q = quantal_response_distribution(&[0.0, 1.0], &pm, 0.0).unwrap();
        assert_eq!(q, vec![0.5, 0.5]);
    }

    #[test]
    fn test_empty_target_set_is_degenerate() {
        let pm = PayoffMatrix::new(vec![], vec![], vec![], vec![]).unwrap();
        assert!(matches!(
            quantal_response(0, &[], &pm, 0.5),
            Err(GameError::DegenerateInput(_))
        ));
        assert!(expected_defender_utility(&[], &pm, 0.5).is_err());
    }

    #[test]
    fn test_mismatched_lengths_are_degenerate() {
        let result = PayoffMatrix::new(vec![1.0, 2.0], vec![0.0], vec![1.0, 2.0], vec![0.0, 0.0]);
        assert!(matches!(result, Err(GameError::DegenerateInput(_))));

        let pm = symmetric();
        assert!(quantal_response_distribution(&[0.5], &pm, 0.5).is_err());
    }

    #[test]
    fn test_assignment_validation() {
        assert!(AssignmentMatrix::new(vec![vec![1.0, 0.5], vec![0.0]]).is_err());
        assert!(AssignmentMatrix::new(vec![vec![1.0, -0.5]]).is_err());
        assert!(AssignmentMatrix::new(vec![vec![]]).is_err());

        let a = AssignmentMatrix::new(vec![vec![1.0, 0.5], vec![0.0, 0.5]]).unwrap();
        assert_eq!(a.num_targets(), 2);
        assert_eq!(a.num_schedules(), 2);
        assert_eq!(a.coverage(&[0.4, 0.6]), vec![0.7, 0.3]);
    }

    #[test]
    fn test_game_requires_matching_target_counts() {
        let pm = symmetric();
        assert!(SecurityGame::new(pm.clone(), AssignmentMatrix::identity(3)).is_err());
        let game = SecurityGame::new(pm, AssignmentMatrix::identity(2)).unwrap();
        assert_eq!(game.num_targets(), 2);
        assert_eq!(game.num_schedules(), 2);

        let empty = PayoffMatrix::new(vec![], vec![], vec![], vec![]).unwrap();
        let result = SecurityGame::new(empty, AssignmentMatrix::identity(1));
        assert!(matches!(result, Err(GameError::DegenerateInput(_))));
    }

    #[test]
    fn test_identity_assignment() {
        let a = AssignmentMatrix::identity(3);
        assert_eq!(a.coverage(&[0.1, 0.2, 0.3]), vec![0.1, 0.2, 0.3]);
    }

    proptest! {
        #[test]
        fn proptest_quantal_response_is_a_distribution(
            x in proptest::collection::vec(0.0f64..=1.0, 1..8),
            lambda in 0.0f64..5.0,
        ) {
            let t = x.len();
            let pm = PayoffMatrix::new(
                (0..t).map(|i| 10.0 + i as f64).collect(),
                (0..t).map(|i| -5.0 - i as f64).collect(),
                (0..t).map(|i| 20.0 - i as f64).collect(),
                (0..t).map(|i| -10.0 + i as f64).collect(),
            ).unwrap();
            let q = quantal_response_distribution(&x, &pm, lambda).unwrap();
            let total: f64 = q.iter().sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
            prop_assert!(q.iter().all(|&v| (0.0..=1.0).contains(&v)));

            let ud = expected_defender_utility(&x, &pm, lambda).unwrap();
            let lo = (0..t).map(|i| defender_utility(i, &x, &pm)).fold(f64::INFINITY, f64::min);
            let hi = (0..t).map(|i| defender_utility(i, &x, &pm)).fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(ud >= lo - 1e-9 && ud <= hi + 1e-9);
        }
    }
}
