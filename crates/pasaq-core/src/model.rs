//! Symbolic model builder over [`MipProblem`].
//!
//! Decision variables are declared in named groups. Each group owns a
//! contiguous run of solver columns and is addressed through a [`VarGroup`]
//! handle plus a 1-based sub-index. Rows are appended one at a time and only
//! the newest row accepts terms.

use std::fmt;
use std::ops::RangeInclusive;

use log::debug;
use pasaq_mip::{
    Bound, Direction, MipOptions, MipProblem, MipSolution, MipSolver, ProblemError, Termination,
    VarKind,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Variable group '{0}' is already declared")]
    DuplicateDeclaration(String),
    #[error("Variable group '{0}' is not declared")]
    UndeclaredReference(String),
    #[error("Index {index} is outside 1..={len} for variable group '{group}'")]
    OutOfRange { group: String, index: usize, len: usize },
    #[error("Variable group '{0}' must own at least one column")]
    EmptyGroup(String),
    #[error("No row has been added yet")]
    RowNotReady,
    #[error("Model '{0}' has not been solved")]
    NotSolved(String),
    #[error("Invalid problem data: {0}")]
    Load(#[from] ProblemError),
}

/// Handle to a declared variable group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarGroup {
    id: usize,
    first: usize,
    len: usize,
}

impl VarGroup {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inclusive solver column range (0-based)
    pub fn columns(&self) -> RangeInclusive<usize> {
        self.first..=self.first + self.len - 1
    }
}

#[derive(Debug, Clone)]
struct GroupEntry {
    name: String,
    handle: VarGroup,
}

#[derive(Debug, Clone)]
pub struct Model {
    problem: MipProblem,
    groups: Vec<GroupEntry>,
    /// Terms of each row, indexed by row
    terms: Vec<Vec<(usize, f64)>>,
    solution: Option<MipSolution>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            problem: MipProblem::new(name),
            groups: Vec::new(),
            terms: Vec::new(),
            solution: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.problem.name
    }

    /// Reserve `count` new columns under `name`
    pub fn declare(&mut self, name: &str, count: usize) -> Result<VarGroup, ModelError> {
        if self.groups.iter().any(|g| g.name == name) {
            return Err(ModelError::DuplicateDeclaration(name.to_string()));
        }
        if count == 0 {
            return Err(ModelError::EmptyGroup(name.to_string()));
        }

        let first = self.problem.add_columns(count);
        for sub in 1..=count {
            self.problem.set_column_name(first + sub - 1, format!("{}[{}]", name, sub))?;
        }
        let handle = VarGroup {
            id: self.groups.len(),
            first,
            len: count,
        };
        self.groups.push(GroupEntry {
            name: name.to_string(),
            handle,
        });
        Ok(handle)
    }

    pub fn group(&self, name: &str) -> Result<VarGroup, ModelError> {
        self.groups
            .iter()
            .find(|g| g.name == name)
            .map(|g| g.handle)
            .ok_or_else(|| ModelError::UndeclaredReference(name.to_string()))
    }

    pub fn column_range(&self, name: &str) -> Result<RangeInclusive<usize>, ModelError> {
        Ok(self.group(name)?.columns())
    }

    pub fn group_name(&self, group: VarGroup) -> Result<&str, ModelError> {
        self.entry(group).map(|e| e.name.as_str())
    }

    fn entry(&self, group: VarGroup) -> Result<&GroupEntry, ModelError> {
        self.groups
            .get(group.id)
            .filter(|e| e.handle == group)
            .ok_or_else(|| ModelError::UndeclaredReference(format!("#{}", group.id)))
    }

    /// Solver column of `group[sub]`
    fn column(&self, group: VarGroup, sub: usize) -> Result<usize, ModelError> {
        let entry = self.entry(group)?;
        if sub == 0 || sub > group.len {
            return Err(ModelError::OutOfRange {
                group: entry.name.clone(),
                index: sub,
                len: group.len,
            });
        }
        Ok(group.first + sub - 1)
    }

    /// Append an unlabelled row; it becomes the current row
    pub fn add_row(&mut self) -> usize {
        let row = self.problem.add_rows(1);
        self.terms.push(Vec::new());
        row
    }

    pub fn add_named_row(&mut self, name: impl Into<String>) -> Result<usize, ModelError> {
        let row = self.add_row();
        self.problem.set_row_name(row, name)?;
        Ok(row)
    }

    pub fn current_row(&self) -> Option<usize> {
        self.terms.len().checked_sub(1)
    }

    fn require_row(&self) -> Result<usize, ModelError> {
        self.current_row().ok_or(ModelError::RowNotReady)
    }

    /// Add `coefficient * group[sub]` to the current row
    pub fn add_term(
        &mut self,
        group: VarGroup,
        sub: usize,
        coefficient: f64,
    ) -> Result<(), ModelError> {
        let row = self.require_row()?;
        let column = self.column(group, sub)?;
        self.terms[row].push((column, coefficient));
        Ok(())
    }

    pub fn set_row_bound(&mut self, bound: Bound) -> Result<(), ModelError> {
        let row = self.require_row()?;
        self.problem.set_row_bound(row, bound)?;
        Ok(())
    }

    pub fn set_bound(
        &mut self,
        group: VarGroup,
        sub: usize,
        bound: Bound,
    ) -> Result<(), ModelError> {
        let column = self.column(group, sub)?;
        self.problem.set_column_bound(column, bound)?;
        Ok(())
    }

    pub fn set_kind(
        &mut self,
        group: VarGroup,
        sub: usize,
        kind: VarKind,
    ) -> Result<(), ModelError> {
        let column = self.column(group, sub)?;
        self.problem.set_column_kind(column, kind)?;
        Ok(())
    }

    pub fn set_objective(
        &mut self,
        group: VarGroup,
        sub: usize,
        value: f64,
    ) -> Result<(), ModelError> {
        let column = self.column(group, sub)?;
        self.problem.set_objective_coefficient(column, value)?;
        Ok(())
    }

    pub fn maximize(&mut self) {
        self.problem.set_direction(Direction::Maximize);
    }

    pub fn minimize(&mut self) {
        self.problem.set_direction(Direction::Minimize);
    }

    pub fn num_rows(&self) -> usize {
        self.problem.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.problem.num_columns()
    }

    /// Load the accumulated rows into the problem and solve it
    pub fn solve(&mut self, options: &MipOptions) -> Result<Termination, ModelError> {
        let size = self.terms.iter().map(Vec::len).sum();
        let mut rows = Vec::with_capacity(size);
        let mut cols = Vec::with_capacity(size);
        let mut values = Vec::with_capacity(size);
        for (row, terms) in self.terms.iter().enumerate() {
            for &(col, value) in terms {
                rows.push(row);
                cols.push(col);
                values.push(value);
            }
        }
        self.problem.load_matrix(&rows, &cols, &values)?;

        let solution = MipSolver::new(options.clone()).solve(&self.problem);
        debug!(
            "{}: {} ({} rows, {} columns)",
            self.problem.name,
            solution.status,
            self.num_rows(),
            self.num_columns()
        );
        let status = solution.status;
        self.solution = Some(solution);
        Ok(status)
    }

    pub fn is_solved(&self) -> bool {
        self.solution.is_some()
    }

    fn solution(&self) -> Result<&MipSolution, ModelError> {
        self.solution
            .as_ref()
            .ok_or_else(|| ModelError::NotSolved(self.problem.name.clone()))
    }

    pub fn termination(&self) -> Result<Termination, ModelError> {
        Ok(self.solution()?.status)
    }

    /// Objective of the incumbent; NaN when the search found none
    pub fn objective_value(&self) -> Result<f64, ModelError> {
        Ok(self.solution()?.objective_value)
    }

    /// Value of `group[sub]` in the incumbent; NaN when the search found none
    pub fn value(&self, group: VarGroup, sub: usize) -> Result<f64, ModelError> {
        let solution = self.solution()?;
        let column = self.column(group, sub)?;
        Ok(solution.values.get(column).copied().unwrap_or(f64::NAN))
    }
}

fn write_bound(f: &mut fmt::Formatter<'_>, bound: Bound) -> fmt::Result {
    match bound {
        Bound::Free => write!(f, "free"),
        Bound::Lower(l) => write!(f, ">= {}", l),
        Bound::Upper(u) => write!(f, "<= {}", u),
        Bound::Double(l, u) => write!(f, "in [{}, {}]", l, u),
        Bound::Fixed(v) => write!(f, "= {}", v),
    }
}

fn write_term(f: &mut fmt::Formatter<'_>, coefficient: f64, name: &str) -> fmt::Result {
    if coefficient < 0.0 {
        write!(f, " - {} {}", -coefficient, name)
    } else {
        write!(f, " + {} {}", coefficient, name)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let problem = &self.problem;
        let direction = match problem.direction {
            Direction::Minimize => "minimize",
            Direction::Maximize => "maximize",
        };
        write!(f, "{} ({})\n  obj:", problem.name, direction)?;
        for column in problem.columns.iter().filter(|c| c.objective != 0.0) {
            write_term(f, column.objective, &column.name)?;
        }
        writeln!(f)?;

        writeln!(f, "subject to")?;
        for (row, terms) in problem.rows.iter().zip(&self.terms) {
            write!(f, "  {}:", row.name)?;
            for &(col, value) in terms {
                write_term(f, value, &problem.columns[col].name)?;
            }
            write!(f, " ")?;
            write_bound(f, row.bound)?;
            writeln!(f)?;
        }

        writeln!(f, "bounds")?;
        for column in &problem.columns {
            write!(f, "  {} ", column.name)?;
            write_bound(f, column.effective_bound())?;
            if column.kind != VarKind::Continuous {
                write!(f, " {:?}", column.kind)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_declare_assigns_contiguous_ranges() {
        let mut model = Model::new("m");
        let x = model.declare("x", 4).unwrap();
        let z = model.declare("z", 2).unwrap();
        assert_eq!(x.columns(), 0..=3);
        assert_eq!(z.columns(), 4..=5);
        assert_eq!(model.column_range("z").unwrap(), 4..=5);
        assert_eq!(model.group("x").unwrap(), x);
        assert_eq!(model.group_name(z).unwrap(), "z");
        assert_eq!(model.num_columns(), 6);
    }

    #[test]
    fn test_declaration_errors() {
        let mut model = Model::new("m");
        model.declare("x", 2).unwrap();
        assert_eq!(
            model.declare("x", 1),
            Err(ModelError::DuplicateDeclaration("x".into()))
        );
        assert_eq!(model.declare("e", 0), Err(ModelError::EmptyGroup("e".into())));
        assert_eq!(
            model.column_range("y"),
            Err(ModelError::UndeclaredReference("y".into()))
        );
    }

    #[test]
    fn test_terms_need_a_row() {
        let mut model = Model::new("m");
        let x = model.declare("x", 3).unwrap();
        assert_eq!(model.add_term(x, 1, 1.0), Err(ModelError::RowNotReady));
        assert_eq!(model.set_row_bound(Bound::Upper(1.0)), Err(ModelError::RowNotReady));

        model.add_row();
        for sub in 1..=3 {
            model.add_term(x, sub, 1.0).unwrap();
        }
        assert!(matches!(
            model.add_term(x, 4, 1.0),
            Err(ModelError::OutOfRange { index: 4, len: 3, .. })
        ));
        assert!(matches!(model.add_term(x, 0, 1.0), Err(ModelError::OutOfRange { index: 0, .. })));
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let mut other = Model::new("other");
        other.declare("a", 1).unwrap();
        let foreign = other.declare("b", 5).unwrap();

        let mut model = Model::new("m");
        model.declare("x", 1).unwrap();
        assert!(matches!(
            model.set_bound(foreign, 1, Bound::Free),
            Err(ModelError::UndeclaredReference(_))
        ));
    }

    #[test]
    fn test_results_need_a_solve() {
        let mut model = Model::new("m");
        let x = model.declare("x", 1).unwrap();
        assert_eq!(model.objective_value(), Err(ModelError::NotSolved("m".into())));
        assert_eq!(model.value(x, 1), Err(ModelError::NotSolved("m".into())));
        assert!(model.termination().is_err());
        assert!(!model.is_solved());
    }

    #[test]
    fn test_solve_small_mip() {
        // maximize 2x + 3y, x + y <= 1.5, y binary, x in [0, 1]
        let mut model = Model::new("small");
        let x = model.declare("x", 1).unwrap();
        let y = model.declare("y", 1).unwrap();
        model.set_bound(x, 1, Bound::Double(0.0, 1.0)).unwrap();
        model.set_kind(y, 1, VarKind::Binary).unwrap();
        model.add_named_row("capacity").unwrap();
        model.add_term(x, 1, 1.0).unwrap();
        model.add_term(y, 1, 1.0).unwrap();
        model.set_row_bound(Bound::Upper(1.5)).unwrap();
        model.set_objective(x, 1, 2.0).unwrap();
        model.set_objective(y, 1, 3.0).unwrap();
        model.maximize();

        let status = model.solve(&MipOptions::default()).unwrap();
        assert_eq!(status, Termination::Success);
        assert!((model.objective_value().unwrap() - 4.0).abs() < 1e-6);
        assert!((model.value(x, 1).unwrap() - 0.5).abs() < 1e-6);
        assert_eq!(model.value(y, 1).unwrap(), 1.0);
    }

    #[test]
    fn test_infeasible_model_reports_status() {
        let mut model = Model::new("none");
        let x = model.declare("x", 1).unwrap();
        model.add_row();
        model.add_term(x, 1, 1.0).unwrap();
        model.set_row_bound(Bound::Lower(2.0)).unwrap();
        model.set_bound(x, 1, Bound::Double(0.0, 1.0)).unwrap();

        let status = model.solve(&MipOptions::default()).unwrap();
        assert_eq!(status, Termination::NoPrimalFeasible);
        assert!(model.value(x, 1).unwrap().is_nan());
    }

    #[test]
    fn test_display_lists_rows_and_bounds() {
        let mut model = Model::new("show");
        let x = model.declare("x", 2).unwrap();
        model.add_named_row("sum").unwrap();
        model.add_term(x, 1, 1.0).unwrap();
        model.add_term(x, 2, -2.0).unwrap();
        model.set_row_bound(Bound::Upper(3.0)).unwrap();
        model.set_objective(x, 1, 1.0).unwrap();
        model.set_kind(x, 2, VarKind::Binary).unwrap();

        let text = model.to_string();
        assert!(text.starts_with("show (minimize)"));
        assert!(text.contains("  sum: + 1 x[1] - 2 x[2] <= 3"));
        assert!(text.contains("  x[2] in [0, 1] Binary"));
    }

    proptest! {
        #[test]
        fn proptest_group_ranges_are_disjoint(sizes in prop::collection::vec(1usize..20, 1..8)) {
            let mut model = Model::new("p");
            let groups: Vec<VarGroup> = sizes
                .iter()
                .enumerate()
                .map(|(i, &n)| model.declare(&format!("g{}", i), n).unwrap())
                .collect();
            for (group, &n) in groups.iter().zip(&sizes) {
                prop_assert_eq!(group.columns().count(), n);
            }
            for (i, a) in groups.iter().enumerate() {
                for b in &groups[i + 1..] {
                    prop_assert!(a.columns().end() < b.columns().start());
                }
            }
            prop_assert_eq!(model.num_columns(), sizes.iter().sum::<usize>());
        }
    }
}
