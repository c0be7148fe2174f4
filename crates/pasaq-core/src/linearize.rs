//! Piecewise-linear approximation of the quantal-response utility curves.
//!
//! For target `i` the defender's expected utility under coverage `x` is a
//! ratio of sums of `θ(i)·f1(i, x_i)` and `θ(i)·f2(i, x_i)` terms. Both
//! curves are replaced by their secants over `K` equal-width segments of
//! `[0, 1]`, so they become linear in the per-segment fill variables.

use crate::game::{GameError, PayoffMatrix};

/// Attacker value scale at zero coverage: `exp(λ·R_a)`
pub fn theta(i: usize, pm: &PayoffMatrix, lambda: f64) -> f64 {
    (lambda * pm.attacker_reward[i]).exp()
}

/// Defender value swing: `R_d − P_d`
pub fn alpha(i: usize, pm: &PayoffMatrix) -> f64 {
    pm.defender_reward[i] - pm.defender_penalty[i]
}

/// Attacker value slope: `λ·(R_a − P_a)`
pub fn beta(i: usize, pm: &PayoffMatrix, lambda: f64) -> f64 {
    lambda * (pm.attacker_reward[i] - pm.attacker_penalty[i])
}

pub fn f1(i: usize, x: f64, pm: &PayoffMatrix, lambda: f64) -> f64 {
    (-beta(i, pm, lambda) * x).exp()
}

pub fn f2(i: usize, x: f64, pm: &PayoffMatrix, lambda: f64) -> f64 {
    x * (-beta(i, pm, lambda) * x).exp()
}

/// Precomputed secant slopes for every (target, segment) pair
#[derive(Debug, Clone)]
pub struct Linearization {
    segments: usize,
    scaled_theta: Vec<f64>,
    alpha: Vec<f64>,
    f1_slopes: Vec<Vec<f64>>,
    f2_slopes: Vec<Vec<f64>>,
}

impl Linearization {
    pub fn new(pm: &PayoffMatrix, lambda: f64, segments: usize) -> Result<Self, GameError> {
        let targets = pm.require_targets()?;
        if segments == 0 {
            return Err(GameError::DegenerateInput("segment count must be positive".into()));
        }
        if !lambda.is_finite() || lambda < 0.0 {
            return Err(GameError::DegenerateInput(format!("invalid rationality {}", lambda)));
        }

        // θ relative to its largest value, in log space, so it never overflows
        let top = pm
            .attacker_reward
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let scaled_theta = (0..targets)
            .map(|i| (lambda * (pm.attacker_reward[i] - top)).exp())
            .collect::<Vec<f64>>();
        let alpha = (0..targets).map(|i| alpha(i, pm)).collect::<Vec<f64>>();

        let width = 1.0 / segments as f64;
        let slopes = |f: &dyn Fn(usize, f64) -> f64| -> Vec<Vec<f64>> {
            (0..targets)
                .map(|i| {
                    (0..segments)
                        .map(|k| {
                            let start = k as f64 * width;
                            let end = (k + 1) as f64 * width;
                            (f(i, end) - f(i, start)) / width
                        })
                        .collect::<Vec<f64>>()
                })
                .collect()
        };
        let f1_slopes = slopes(&|i, x| f1(i, x, pm, lambda));
        let f2_slopes = slopes(&|i, x| f2(i, x, pm, lambda));

        Ok(Self {
            segments,
            scaled_theta,
            alpha,
            f1_slopes,
            f2_slopes,
        })
    }

    pub fn segments(&self) -> usize {
        self.segments
    }

    pub fn num_targets(&self) -> usize {
        self.alpha.len()
    }

    pub fn segment_width(&self) -> f64 {
        1.0 / self.segments as f64
    }

    /// `θ(i) / max_j θ(j)`
    pub fn scaled_theta(&self, i: usize) -> f64 {
        self.scaled_theta[i]
    }

    pub fn alpha(&self, i: usize) -> f64 {
        self.alpha[i]
    }

    /// Secant slope of `f1` over segment `k` (0-based) of target `i`
    pub fn f1_slope(&self, i: usize, k: usize) -> f64 {
        self.f1_slopes[i][k]
    }

    /// Secant slope of `f2` over segment `k` (0-based) of target `i`
    pub fn f2_slope(&self, i: usize, k: usize) -> f64 {
        self.f2_slopes[i][k]
    }

    /// Split a coverage value into in-order segment fills
    pub fn fill(&self, x: f64) -> Vec<f64> {
        let width = self.segment_width();
        (0..self.segments)
            .map(|k| (x - k as f64 * width).clamp(0.0, width))
            .collect()
    }

    /// Piecewise-linear value of `f1(i, x)`
    pub fn approximate_f1(&self, i: usize, x: f64) -> f64 {
        let fill = self.fill(x);
        1.0 + fill.iter().enumerate().map(|(k, v)| v * self.f1_slope(i, k)).sum::<f64>()
    }

    /// Piecewise-linear value of `f2(i, x)`
    pub fn approximate_f2(&self, i: usize, x: f64) -> f64 {
        let fill = self.fill(x);
        fill.iter().enumerate().map(|(k, v)| v * self.f2_slope(i, k)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payoffs() -> PayoffMatrix {
        PayoffMatrix::new(
            vec![30.0, 10.0],
            vec![-15.0, -5.0],
            vec![30.0, 8.0],
            vec![-30.0, -2.0],
        )
        .unwrap()
    }

    #[test]
    fn test_curve_parameters() {
        let pm = payoffs();
        assert_eq!(alpha(0, &pm), 45.0);
        assert_eq!(beta(1, &pm, 0.5), 5.0);
        assert!((theta(1, &pm, 0.5) - 4.0f64.exp()).abs() < 1e-9);
        assert_eq!(f1(0, 0.0, &pm, 0.5), 1.0);
        assert_eq!(f2(0, 0.0, &pm, 0.5), 0.0);
        assert!((f2(1, 0.5, &pm, 0.5) - 0.5 * (-2.5f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_exact_at_breakpoints() {
        let pm = payoffs();
        let lin = Linearization::new(&pm, 0.5, 5).unwrap();
        for i in 0..2 {
            for k in 0..=5 {
                let x = k as f64 / 5.0;
                assert!((lin.approximate_f1(i, x) - f1(i, x, &pm, 0.5)).abs() < 1e-12);
                assert!((lin.approximate_f2(i, x) - f2(i, x, &pm, 0.5)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_secant_lies_above_convex_f1() {
        let pm = payoffs();
        let lin = Linearization::new(&pm, 0.5, 4).unwrap();
        for step in 0..=40 {
            let x = step as f64 / 40.0;
            assert!(lin.approximate_f1(1, x) >= f1(1, x, &pm, 0.5) - 1e-12);
        }
    }

    #[test]
    fn test_fill_is_in_order() {
        let pm = payoffs();
        let lin = Linearization::new(&pm, 0.5, 4).unwrap();
        let fill = lin.fill(0.6);
        assert_eq!(fill.len(), 4);
        assert_eq!(fill[0], 0.25);
        assert_eq!(fill[1], 0.25);
        assert!((fill[2] - 0.1).abs() < 1e-12);
        assert_eq!(fill[3], 0.0);
    }

    #[test]
    fn test_scaled_theta_is_relative_to_largest() {
        let pm = payoffs();
        let lin = Linearization::new(&pm, 0.5, 2).unwrap();
        assert_eq!(lin.scaled_theta(0), 1.0);
        let expected = theta(1, &pm, 0.5) / theta(0, &pm, 0.5);
        assert!((lin.scaled_theta(1) - expected).abs() < 1e-15);
    }

    #[test]
    fn test_rejects_degenerate_parameters() {
        let pm = payoffs();
        assert!(Linearization::new(&pm, 0.5, 0).is_err());
        assert!(Linearization::new(&pm, f64::NAN, 3).is_err());
        let empty = PayoffMatrix::new(vec![], vec![], vec![], vec![]).unwrap();
        assert!(matches!(
            Linearization::new(&empty, 0.5, 3),
            Err(GameError::DegenerateInput(_))
        ));
    }
}
