use log::trace;
use pasaq_mip::{MipOptions, Termination};

use crate::error::PasaqError;
use crate::formulation::Formulation;
use crate::game::Strategy;

/// Verdict of one feasibility probe
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Feasibility {
    pub achievable: bool,
    /// Per-target coverage; empty unless achievable
    pub strategy: Strategy,
    /// Schedule weights `a_j` behind `strategy`; empty unless achievable
    pub mixture: Vec<f64>,
    pub termination: Termination,
    /// Optimal value of the threshold slack, NaN without an incumbent
    pub objective: f64,
}

/// Solve the feasibility model for threshold `r`.
///
/// `r` is achievable when the search ends successfully with a zero optimum.
/// Any other termination is reported but counts as not achievable.
pub fn check_feasibility(
    r: f64,
    formulation: &Formulation<'_>,
    options: &MipOptions,
    tolerance: f64,
) -> Result<Feasibility, PasaqError> {
    let (mut model, vars) = formulation.build(r)?;
    trace!("{}", model);

    let options = options.clone().with_cutoff(-tolerance);
    let termination = model.solve(&options)?;
    let objective = model.objective_value()?;
    let achievable = termination == Termination::Success && objective.abs() <= tolerance;

    let (strategy, mixture) = if achievable {
        let segments = formulation.segments();
        let strategy = (0..formulation.game().num_targets())
            .map(|i| {
                (0..segments)
                    .map(|k| model.value(vars.x, formulation.cell(i, k)))
                    .sum::<Result<f64, _>>()
            })
            .collect::<Result<Strategy, _>>()?;
        let mixture = (1..=formulation.game().num_schedules())
            .map(|j| model.value(vars.a, j))
            .collect::<Result<Vec<f64>, _>>()?;
        (strategy, mixture)
    } else {
        (Strategy::new(), Vec::new())
    };

    Ok(Feasibility {
        achievable,
        strategy,
        mixture,
        termination,
        objective,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{AssignmentMatrix, PayoffMatrix, SecurityGame};

    fn game() -> SecurityGame {
        let pm = PayoffMatrix::new(
            vec![30.0, 30.0],
            vec![-15.0, -15.0],
            vec![30.0, 30.0],
            vec![-30.0, -30.0],
        )
        .unwrap();
        let a = AssignmentMatrix::new(vec![vec![0.5], vec![0.5]]).unwrap();
        SecurityGame::new(pm, a).unwrap()
    }

    #[test]
    fn test_low_threshold_is_achievable() {
        let game = game();
        let formulation = Formulation::new(&game, 1.0, 0.5, 5).unwrap();
        let result = check_feasibility(-5.0, &formulation, &MipOptions::default(), 1e-9).unwrap();
        assert!(result.achievable);
        assert_eq!(result.termination, Termination::Success);
        assert_eq!(result.strategy.len(), 2);
        assert!((result.strategy[0] - result.strategy[1]).abs() < 1e-6);
        assert!(result.strategy.iter().all(|&x| (0.0..=0.5 + 1e-9).contains(&x)));
    }

    #[test]
    fn test_high_threshold_is_not_achievable() {
        let game = game();
        let formulation = Formulation::new(&game, 1.0, 0.5, 5).unwrap();
        let result = check_feasibility(22.5, &formulation, &MipOptions::default(), 1e-9).unwrap();
        assert!(!result.achievable);
        assert_eq!(result.termination, Termination::NoPrimalFeasible);
        assert!(result.strategy.is_empty());
    }

    #[test]
    fn test_mixture_reproduces_coverage() {
        let pm = PayoffMatrix::new(
            vec![30.0, 20.0],
            vec![-15.0, -10.0],
            vec![30.0, 20.0],
            vec![-30.0, -20.0],
        )
        .unwrap();
        let a = AssignmentMatrix::new(vec![vec![1.0, 0.3], vec![0.0, 0.7]]).unwrap();
        let game = SecurityGame::new(pm, a).unwrap();
        let formulation = Formulation::new(&game, 1.0, 0.5, 3).unwrap();

        let result = check_feasibility(-10.0, &formulation, &MipOptions::default(), 1e-9).unwrap();
        assert!(result.achievable);
        assert_eq!(result.mixture.len(), 2);
        assert!(result.mixture.iter().all(|&v| v >= -1e-9));
        assert!(result.mixture.iter().sum::<f64>() <= 1.0 + 1e-9);

        let coverage = game.assignment().coverage(&result.mixture);
        for (c, x) in coverage.iter().zip(&result.strategy) {
            assert!((c - x).abs() < 1e-6);
        }
    }

    #[test]
    fn test_rejected_threshold_has_no_mixture() {
        let game = game();
        let formulation = Formulation::new(&game, 1.0, 0.5, 5).unwrap();
        let result = check_feasibility(22.5, &formulation, &MipOptions::default(), 1e-9).unwrap();
        assert!(result.mixture.is_empty());
        assert!(result.objective < 0.0);
    }
}
