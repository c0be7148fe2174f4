use log::{debug, info, warn};
use pasaq_mip::{MipOptions, Termination};

use crate::bounds::{estimate_bounds, Bracket};
use crate::error::PasaqError;
use crate::formulation::Formulation;
use crate::game::{GameError, SecurityGame, Strategy};
use crate::oracle::check_feasibility;

/// Parameters of the binary search and of every feasibility model it builds
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Stop once the bracket is at most this wide
    pub epsilon: f64,
    /// Number of linearization segments (K)
    pub segments: usize,
    /// Attacker rationality
    pub lambda: f64,
    /// Defender resource budget
    pub budget: f64,
    /// Probe cap; `None` probes until convergence
    pub max_iterations: Option<usize>,
    /// How close to zero the optimum must be for a threshold to count
    pub feasibility_tolerance: f64,
    /// Starting bracket; estimated from the payoffs when absent
    pub bracket: Option<Bracket>,
    pub mip: MipOptions,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.5,
            segments: 5,
            lambda: 0.5,
            budget: 1.0,
            max_iterations: None,
            feasibility_tolerance: 1e-9,
            bracket: None,
            mip: MipOptions::default(),
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_segments(mut self, segments: usize) -> Self {
        self.segments = segments;
        self
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_budget(mut self, budget: f64) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn with_feasibility_tolerance(mut self, tol: f64) -> Self {
        self.feasibility_tolerance = tol;
        self
    }

    pub fn with_bracket(mut self, bracket: Bracket) -> Self {
        self.bracket = Some(bracket);
        self
    }

    pub fn with_mip_options(mut self, options: MipOptions) -> Self {
        self.mip = options;
        self
    }

    fn validate(&self) -> Result<(), GameError> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(GameError::DegenerateInput(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        if !self.feasibility_tolerance.is_finite() || self.feasibility_tolerance < 0.0 {
            return Err(GameError::DegenerateInput(format!(
                "invalid feasibility tolerance {}",
                self.feasibility_tolerance
            )));
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    EstimatingBounds,
    Probing,
    Converged,
}

/// One feasibility query and the bracket it left behind
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    pub threshold: f64,
    pub achievable: bool,
    pub termination: Termination,
    pub bracket: Bracket,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// Lower end of the final bracket
    pub utility: f64,
    pub bracket: Bracket,
    /// Coverage from the last achievable probe; empty if none was achievable
    pub strategy: Strategy,
    /// Schedule weights realising `strategy`; empty alongside it
    pub mixture: Vec<f64>,
    pub probes: Vec<Probe>,
    /// False when the probe cap stopped the search first
    pub converged: bool,
}

/// Bisection on the defender's utility threshold.
///
/// Correct only while feasibility is non-increasing in the threshold. Payoffs
/// breaking that still converge, to a wrong value.
#[derive(Debug, Clone)]
pub struct BinarySearch<'a> {
    formulation: Formulation<'a>,
    config: SearchConfig,
    state: SearchState,
    bracket: Bracket,
    best: Strategy,
    best_mixture: Vec<f64>,
    probes: Vec<Probe>,
}

impl<'a> BinarySearch<'a> {
    pub fn new(game: &'a SecurityGame, config: SearchConfig) -> Result<Self, PasaqError> {
        config.validate()?;
        let formulation = Formulation::new(game, config.budget, config.lambda, config.segments)?;
        let mut search = Self {
            formulation,
            config,
            state: SearchState::EstimatingBounds,
            bracket: Bracket { lower: 0.0, upper: 0.0 },
            best: Strategy::new(),
            best_mixture: Vec::new(),
            probes: Vec::new(),
        };
        search.estimate()?;
        Ok(search)
    }

    fn estimate(&mut self) -> Result<(), PasaqError> {
        let bracket = match self.config.bracket {
            Some(bracket) => {
                bracket.validate()?;
                bracket
            }
            None => {
                let payoffs = self.formulation.game().payoffs();
                let estimated = estimate_bounds(self.config.budget, payoffs, self.config.lambda)?;
                if estimated.lower > estimated.upper {
                    warn!(
                        "estimated bounds [{:.4}, {:.4}] are inverted, keeping the lower bound",
                        estimated.lower, estimated.upper
                    );
                }
                estimated
            }
        };
        info!(
            "searching [{:.4}, {:.4}] with epsilon {} over {} targets",
            bracket.lower,
            bracket.upper,
            self.config.epsilon,
            self.formulation.game().num_targets()
        );
        self.bracket = bracket;
        // An estimated bracket may be inverted; it is treated as already narrow
        self.state = if bracket.width() > self.config.epsilon {
            SearchState::Probing
        } else {
            SearchState::Converged
        };
        Ok(())
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn bracket(&self) -> Bracket {
        self.bracket
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    /// Query the midpoint and halve the bracket. `None` once converged.
    pub fn step(&mut self) -> Result<Option<Probe>, PasaqError> {
        if self.state != SearchState::Probing {
            return Ok(None);
        }

        let r = self.bracket.midpoint();
        if r <= self.bracket.lower || r >= self.bracket.upper {
            // Bracket narrower than float resolution
            self.state = SearchState::Converged;
            return Ok(None);
        }

        let tolerance = self.config.feasibility_tolerance;
        let verdict = check_feasibility(r, &self.formulation, &self.config.mip, tolerance)?;
        if verdict.achievable {
            self.bracket.lower = r;
            self.best = verdict.strategy;
            self.best_mixture = verdict.mixture;
        } else {
            self.bracket.upper = r;
        }

        let probe = Probe {
            threshold: r,
            achievable: verdict.achievable,
            termination: verdict.termination,
            bracket: self.bracket,
        };
        debug!(
            "probe {}: r = {:.6} {} ({}), bracket [{:.6}, {:.6}]",
            self.probes.len() + 1,
            r,
            if probe.achievable { "achievable" } else { "not achievable" },
            probe.termination,
            self.bracket.lower,
            self.bracket.upper
        );
        self.probes.push(probe.clone());

        if self.bracket.width() <= self.config.epsilon {
            self.state = SearchState::Converged;
        }
        Ok(Some(probe))
    }

    /// Probe until converged or the probe cap is reached
    pub fn run(mut self) -> Result<SearchOutcome, PasaqError> {
        while self.state == SearchState::Probing {
            if let Some(cap) = self.config.max_iterations {
                if self.probes.len() >= cap {
                    let width = self.bracket.width();
                    warn!("stopped after {} probes with bracket width {}", cap, width);
                    break;
                }
            }
            self.step()?;
        }
        Ok(self.finish())
    }

    pub fn finish(self) -> SearchOutcome {
        let converged = self.state == SearchState::Converged;
        info!(
            "defender utility {:.6} after {} probes{}",
            self.bracket.lower,
            self.probes.len(),
            if converged { "" } else { " (not converged)" }
        );
        SearchOutcome {
            utility: self.bracket.lower,
            bracket: self.bracket,
            strategy: self.best,
            mixture: self.best_mixture,
            probes: self.probes,
            converged,
        }
    }
}

/// Run a full search on `game`
pub fn binary_search(
    game: &SecurityGame,
    config: SearchConfig,
) -> Result<SearchOutcome, PasaqError> {
    BinarySearch::new(game, config)?.run()
}
