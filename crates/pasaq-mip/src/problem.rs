use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    #[error("Column {index} does not exist (problem has {count} columns)")]
    UnknownColumn { index: usize, count: usize },
    #[error("Row {index} does not exist (problem has {count} rows)")]
    UnknownRow { index: usize, count: usize },
    #[error("Matrix arrays differ in length: {rows} rows, {cols} columns, {values} values")]
    MismatchedArrays { rows: usize, cols: usize, values: usize },
    #[error("Invalid bounds on column {index}: lower {lower} exceeds upper {upper}")]
    InvalidBounds { index: usize, lower: f64, upper: f64 },
}

/// Bound attached to a row or a column
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    /// -inf < x < +inf
    Free,
    /// l <= x
    Lower(f64),
    /// x <= u
    Upper(f64),
    /// l <= x <= u
    Double(f64, f64),
    /// x = v
    Fixed(f64),
}

impl Bound {
    pub fn lower(&self) -> f64 {
        match *self {
            Bound::Lower(l) | Bound::Double(l, _) | Bound::Fixed(l) => l,
            Bound::Free | Bound::Upper(_) => f64::NEG_INFINITY,
        }
    }

    pub fn upper(&self) -> f64 {
        match *self {
            Bound::Upper(u) | Bound::Double(_, u) | Bound::Fixed(u) => u,
            Bound::Free | Bound::Lower(_) => f64::INFINITY,
        }
    }

    /// Rebuild a bound from its two ends, choosing the narrowest variant
    pub fn from_range(lower: f64, upper: f64) -> Self {
        match (lower.is_finite(), upper.is_finite()) {
            (false, false) => Bound::Free,
            (true, false) => Bound::Lower(lower),
            (false, true) => Bound::Upper(upper),
            (true, true) if lower == upper => Bound::Fixed(lower),
            (true, true) => Bound::Double(lower, upper),
        }
    }

    pub fn contains(&self, value: f64, tolerance: f64) -> bool {
        value >= self.lower() - tolerance && value <= self.upper() + tolerance
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Continuous,
    Integer,
    /// Integer restricted to {0, 1}
    Binary,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub bound: Bound,
    pub kind: VarKind,
    pub objective: f64,
}

impl Column {
    pub fn is_integer(&self) -> bool {
        self.kind != VarKind::Continuous
    }

    /// Bound as the solver sees it; binaries are clipped to [0, 1]
    pub fn effective_bound(&self) -> Bound {
        match self.kind {
            VarKind::Binary => {
                Bound::from_range(self.bound.lower().max(0.0), self.bound.upper().min(1.0))
            }
            _ => self.bound,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Row {
    pub name: String,
    pub bound: Bound,
}

/// A mixed-integer linear program stored as bounded columns, bounded rows
/// and a sparse constraint matrix.
#[derive(Debug, Clone)]
pub struct MipProblem {
    pub name: String,
    pub direction: Direction,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    /// Sparse (row, column, value) entries
    pub matrix: Vec<(usize, usize, f64)>,
}

impl MipProblem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Minimize,
            columns: Vec::new(),
            rows: Vec::new(),
            matrix: Vec::new(),
        }
    }

    /// Append `count` columns, returning the index of the first one.
    /// New columns are continuous, non-negative and absent from the objective.
    pub fn add_columns(&mut self, count: usize) -> usize {
        let first = self.columns.len();
        for i in 0..count {
            self.columns.push(Column {
                name: format!("c{}", first + i),
                bound: Bound::Lower(0.0),
                kind: VarKind::Continuous,
                objective: 0.0,
            });
        }
        first
    }

    /// Append `count` free rows, returning the index of the first one
    pub fn add_rows(&mut self, count: usize) -> usize {
        let first = self.rows.len();
        for i in 0..count {
            self.rows.push(Row {
                name: format!("r{}", first + i),
                bound: Bound::Free,
            });
        }
        first
    }

    pub fn set_column_name(
        &mut self,
        index: usize,
        name: impl Into<String>,
    ) -> Result<(), ProblemError> {
        self.column_mut(index)?.name = name.into();
        Ok(())
    }

    pub fn set_row_name(
        &mut self,
        index: usize,
        name: impl Into<String>,
    ) -> Result<(), ProblemError> {
        self.row_mut(index)?.name = name.into();
        Ok(())
    }

    pub fn set_row_bound(&mut self, index: usize, bound: Bound) -> Result<(), ProblemError> {
        self.row_mut(index)?.bound = bound;
        Ok(())
    }

    pub fn set_column_bound(&mut self, index: usize, bound: Bound) -> Result<(), ProblemError> {
        self.column_mut(index)?.bound = bound;
        Ok(())
    }

    pub fn set_column_kind(&mut self, index: usize, kind: VarKind) -> Result<(), ProblemError> {
        self.column_mut(index)?.kind = kind;
        Ok(())
    }

    pub fn set_objective_coefficient(
        &mut self,
        index: usize,
        value: f64,
    ) -> Result<(), ProblemError> {
        self.column_mut(index)?.objective = value;
        Ok(())
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Replace the constraint matrix with the entries given as parallel arrays
    pub fn load_matrix(
        &mut self,
        rows: &[usize],
        cols: &[usize],
        values: &[f64],
    ) -> Result<(), ProblemError> {
        if rows.len() != cols.len() || cols.len() != values.len() {
            return Err(ProblemError::MismatchedArrays {
                rows: rows.len(),
                cols: cols.len(),
                values: values.len(),
            });
        }

        let mut matrix = Vec::with_capacity(values.len());
        for ((&r, &c), &v) in rows.iter().zip(cols).zip(values) {
            if r >= self.rows.len() {
                return Err(ProblemError::UnknownRow { index: r, count: self.rows.len() });
            }
            if c >= self.columns.len() {
                return Err(ProblemError::UnknownColumn { index: c, count: self.columns.len() });
            }
            matrix.push((r, c, v));
        }
        self.matrix = matrix;
        Ok(())
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Matrix entries grouped by row, duplicates summed
    pub fn row_entries(&self) -> Vec<Vec<(usize, f64)>> {
        let mut grouped: Vec<Vec<(usize, f64)>> = vec![Vec::new(); self.rows.len()];
        for &(r, c, v) in &self.matrix {
            match grouped[r].iter_mut().find(|(col, _)| *col == c) {
                Some(entry) => entry.1 += v,
                None => grouped[r].push((c, v)),
            }
        }
        grouped
    }

    /// Value of the objective for a full column assignment
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.columns.iter().zip(values).map(|(c, v)| c.objective * v).sum()
    }

    /// Columns whose double bounds are inverted
    pub fn check_bounds(&self) -> Result<(), ProblemError> {
        for (index, column) in self.columns.iter().enumerate() {
            let bound = column.effective_bound();
            if bound.lower() > bound.upper() {
                return Err(ProblemError::InvalidBounds {
                    index,
                    lower: bound.lower(),
                    upper: bound.upper(),
                });
            }
        }
        Ok(())
    }

    fn column_mut(&mut self, index: usize) -> Result<&mut Column, ProblemError> {
        let count = self.columns.len();
        self.columns.get_mut(index).ok_or(ProblemError::UnknownColumn { index, count })
    }

    fn row_mut(&mut self, index: usize) -> Result<&mut Row, ProblemError> {
        let count = self.rows.len();
        self.rows.get_mut(index).ok_or(ProblemError::UnknownRow { index, count })
    }
}
