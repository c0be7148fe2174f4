//! The mixed-integer feasibility program for one utility threshold.
//!
//! Variable groups:
//! - `x[(i, k)]` fill of segment `k` of target `i`'s coverage
//! - `z[(i, k)]` binary unlock indicator of that segment
//! - `a[j]` mixture weight of schedule `j`
//! - `w` slack of the threshold row, at most 0; the objective maximises it
//!
//! The optimum is 0 exactly when some coverage reaches the threshold under
//! the piecewise-linear approximation.

use pasaq_mip::{Bound, VarKind};

use crate::game::{GameError, SecurityGame};
use crate::linearize::Linearization;
use crate::model::{Model, ModelError, VarGroup};

/// Handles of the four variable groups of a built model
#[derive(Debug, Clone, Copy)]
pub struct Variables {
    pub x: VarGroup,
    pub z: VarGroup,
    pub a: VarGroup,
    pub w: VarGroup,
}

/// Linear form of the threshold condition:
/// `constant + sum(coefficients[i][k] * x[(i, k)]) <= 0`
#[derive(Debug, Clone)]
pub struct ThresholdRow {
    pub coefficients: Vec<Vec<f64>>,
    pub constant: f64,
}

impl ThresholdRow {
    /// Left-hand side for a given set of segment fills
    pub fn evaluate(&self, fills: &[Vec<f64>]) -> f64 {
        self.constant
            + self
                .coefficients
                .iter()
                .zip(fills)
                .map(|(c, x)| c.iter().zip(x).map(|(c, x)| c * x).sum::<f64>())
                .sum::<f64>()
    }

    /// Largest absolute coefficient, 1 when every entry is zero
    fn scale(&self) -> f64 {
        let largest = self
            .coefficients
            .iter()
            .flatten()
            .chain(std::iter::once(&self.constant))
            .fold(0.0f64, |acc, c| acc.max(c.abs()));
        if largest > 0.0 { largest } else { 1.0 }
    }
}

/// Builds feasibility models for one game; the linearization is shared by
/// every threshold.
#[derive(Debug, Clone)]
pub struct Formulation<'a> {
    game: &'a SecurityGame,
    budget: f64,
    linearization: Linearization,
}

impl<'a> Formulation<'a> {
    pub fn new(
        game: &'a SecurityGame,
        budget: f64,
        lambda: f64,
        segments: usize,
    ) -> Result<Self, GameError> {
        game.validate()?;
        if !budget.is_finite() || budget < 0.0 {
            return Err(GameError::DegenerateInput(format!("invalid resource budget {}", budget)));
        }
        let linearization = Linearization::new(game.payoffs(), lambda, segments)?;
        Ok(Self {
            game,
            budget,
            linearization,
        })
    }

    pub fn game(&self) -> &SecurityGame {
        self.game
    }

    pub fn linearization(&self) -> &Linearization {
        &self.linearization
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn segments(&self) -> usize {
        self.linearization.segments()
    }

    /// 1-based sub-index of segment `k` of target `i` (both 0-based)
    pub fn cell(&self, i: usize, k: usize) -> usize {
        i * self.segments() + k + 1
    }

    /// Coefficients of the threshold condition at utility `r`
    pub fn threshold_row(&self, r: f64) -> ThresholdRow {
        let lin = &self.linearization;
        let pm = self.game.payoffs();
        let mut constant = 0.0;
        let coefficients = (0..self.game.num_targets())
            .map(|i| {
                let theta = lin.scaled_theta(i);
                let base = theta * (r - pm.defender_penalty[i]);
                constant += base;
                (0..self.segments())
                    .map(|k| base * lin.f1_slope(i, k) - theta * lin.alpha(i) * lin.f2_slope(i, k))
                    .collect::<Vec<f64>>()
            })
            .collect();
        ThresholdRow { coefficients, constant }
    }

    /// Assemble the feasibility model for threshold `r`
    pub fn build(&self, r: f64) -> Result<(Model, Variables), ModelError> {
        let mut model = Model::new(format!("pasaq[r={}]", r));
        let vars = self.declare_variables(&mut model)?;
        self.budget_constraint(&mut model, &vars)?;
        self.segment_bounds(&mut model, &vars)?;
        self.segment_unlock_constraints(&mut model, &vars)?;
        self.segment_order_constraints(&mut model, &vars)?;
        self.unlock_indicators(&mut model, &vars)?;
        self.mixture_constraints(&mut model, &vars)?;
        self.mixture_total_constraint(&mut model, &vars)?;
        self.mixture_weight_bounds(&mut model, &vars)?;
        self.threshold_objective(&mut model, &vars, r)?;
        Ok((model, vars))
    }

    fn declare_variables(&self, model: &mut Model) -> Result<Variables, ModelError> {
        let cells = self.game.num_targets() * self.segments();
        Ok(Variables {
            x: model.declare("x", cells)?,
            z: model.declare("z", cells)?,
            a: model.declare("a", self.game.num_schedules())?,
            w: model.declare("w", 1)?,
        })
    }

    fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        let segments = self.segments();
        (0..self.game.num_targets()).flat_map(move |i| (0..segments).map(move |k| (i, k)))
    }

    /// Total coverage within the resource budget
    fn budget_constraint(&self, model: &mut Model, vars: &Variables) -> Result<(), ModelError> {
        model.add_named_row("budget")?;
        for (i, k) in self.cells() {
            model.add_term(vars.x, self.cell(i, k), 1.0)?;
        }
        model.set_row_bound(Bound::Upper(self.budget))
    }

    /// Each segment fill lies in [0, 1/K]
    fn segment_bounds(&self, model: &mut Model, vars: &Variables) -> Result<(), ModelError> {
        let width = self.linearization.segment_width();
        for (i, k) in self.cells() {
            model.set_bound(vars.x, self.cell(i, k), Bound::Double(0.0, width))?;
        }
        Ok(())
    }

    /// A set indicator saturates its segment: `z/K - x <= 0`
    fn segment_unlock_constraints(
        &self,
        model: &mut Model,
        vars: &Variables,
    ) -> Result<(), ModelError> {
        let width = self.linearization.segment_width();
        for (i, k) in self.cells() {
            let cell = self.cell(i, k);
            model.add_named_row(format!("unlock[{},{}]", i + 1, k + 1))?;
            model.add_term(vars.z, cell, width)?;
            model.add_term(vars.x, cell, -1.0)?;
            model.set_row_bound(Bound::Upper(0.0))?;
        }
        Ok(())
    }

    /// Segment k+1 stays empty unless segment k is unlocked
    fn segment_order_constraints(
        &self,
        model: &mut Model,
        vars: &Variables,
    ) -> Result<(), ModelError> {
        for (i, k) in self.cells().filter(|&(_, k)| k + 1 < self.segments()) {
            model.add_named_row(format!("order[{},{}]", i + 1, k + 1))?;
            model.add_term(vars.x, self.cell(i, k + 1), 1.0)?;
            model.add_term(vars.z, self.cell(i, k), -1.0)?;
            model.set_row_bound(Bound::Upper(0.0))?;
        }
        Ok(())
    }

    fn unlock_indicators(&self, model: &mut Model, vars: &Variables) -> Result<(), ModelError> {
        for (i, k) in self.cells() {
            let cell = self.cell(i, k);
            model.set_kind(vars.z, cell, VarKind::Binary)?;
            model.set_bound(vars.z, cell, Bound::Double(0.0, 1.0))?;
        }
        Ok(())
    }

    /// Coverage of each target equals the schedule mixture's contribution
    fn mixture_constraints(&self, model: &mut Model, vars: &Variables) -> Result<(), ModelError> {
        let assignment = self.game.assignment();
        for i in 0..self.game.num_targets() {
            model.add_named_row(format!("mixture[{}]", i + 1))?;
            for k in 0..self.segments() {
                model.add_term(vars.x, self.cell(i, k), 1.0)?;
            }
            for (j, &effect) in assignment.row(i).iter().enumerate() {
                if effect != 0.0 {
                    model.add_term(vars.a, j + 1, -effect)?;
                }
            }
            model.set_row_bound(Bound::Fixed(0.0))?;
        }
        Ok(())
    }

    fn mixture_total_constraint(
        &self,
        model: &mut Model,
        vars: &Variables,
    ) -> Result<(), ModelError> {
        model.add_named_row("mixture_total")?;
        for j in 1..=vars.a.len() {
            model.add_term(vars.a, j, 1.0)?;
        }
        model.set_row_bound(Bound::Upper(1.0))
    }

    fn mixture_weight_bounds(&self, model: &mut Model, vars: &Variables) -> Result<(), ModelError> {
        for j in 1..=vars.a.len() {
            model.set_bound(vars.a, j, Bound::Double(0.0, 1.0))?;
        }
        Ok(())
    }

    /// `threshold + w <= 0` scaled to unit magnitude, maximising `w <= 0`
    fn threshold_objective(
        &self,
        model: &mut Model,
        vars: &Variables,
        r: f64,
    ) -> Result<(), ModelError> {
        let row = self.threshold_row(r);
        let scale = row.scale();

        model.add_named_row("threshold")?;
        for (i, k) in self.cells() {
            let coefficient = row.coefficients[i][k] / scale;
            if coefficient != 0.0 {
                model.add_term(vars.x, self.cell(i, k), coefficient)?;
            }
        }
        model.add_term(vars.w, 1, 1.0)?;
        model.set_row_bound(Bound::Upper(-row.constant / scale))?;

        model.set_bound(vars.w, 1, Bound::Upper(0.0))?;
        model.set_objective(vars.w, 1, 1.0)?;
        model.maximize();
        Ok(())
    }
}
