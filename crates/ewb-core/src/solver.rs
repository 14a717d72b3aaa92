//! Linear solve for the built-in backend
//!
//! Matrices arrive in compressed-sparse-column form from `mna::SparseBuilder`.
//! Workbench circuits are small, so a dense LU with partial pivoting is used.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("matrix pattern does not match dimension")]
    AnalyzeFailed,
    #[error("matrix is singular")]
    FactorFailed,
    #[error("right-hand side does not match dimension")]
    SolveFailed,
}

pub trait LinearSolver {
    fn prepare(&mut self, n: usize);
    fn analyze(&mut self, ap: &[i64], ai: &[i64]) -> Result<(), SolverError>;
    fn factor(&mut self, ap: &[i64], ai: &[i64], ax: &[f64]) -> Result<(), SolverError>;
    fn solve(&mut self, rhs: &mut [f64]) -> Result<(), SolverError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug)]
pub struct DenseSolver {
    pub n: usize,
    lu: Vec<f64>,
    pivots: Vec<usize>,
}

impl DenseSolver {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            lu: vec![0.0; n * n],
            pivots: (0..n).collect(),
        }
    }

    fn fill(&mut self, ap: &[i64], ai: &[i64], ax: &[f64]) -> Result<(), SolverError> {
        let n = self.n;
        if ap.len() != n + 1 {
            return Err(SolverError::AnalyzeFailed);
        }
        self.lu.fill(0.0);
        for col in 0..n {
            let start = ap[col] as usize;
            let end = ap[col + 1] as usize;
            for idx in start..end.min(ai.len()).min(ax.len()) {
                let row = ai[idx] as usize;
                if row < n {
                    self.lu[row * n + col] += ax[idx];
                }
            }
        }
        Ok(())
    }

    fn factorize(&mut self) -> Result<(), SolverError> {
        let n = self.n;
        for (i, pivot) in self.pivots.iter_mut().enumerate() {
            *pivot = i;
        }
        for k in 0..n {
            let mut pivot = k;
            let mut max_val = self.lu[k * n + k].abs();
            for i in (k + 1)..n {
                let val = self.lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    pivot = i;
                }
            }
            if max_val == 0.0 {
                return Err(SolverError::FactorFailed);
            }
            if pivot != k {
                for j in 0..n {
                    self.lu.swap(k * n + j, pivot * n + j);
                }
                self.pivots.swap(k, pivot);
            }
            let pivot_val = self.lu[k * n + k];
            for i in (k + 1)..n {
                let factor = self.lu[i * n + k] / pivot_val;
                self.lu[i * n + k] = factor;
                for j in (k + 1)..n {
                    self.lu[i * n + j] -= factor * self.lu[k * n + j];
                }
            }
        }
        Ok(())
    }
}

impl LinearSolver for DenseSolver {
    fn prepare(&mut self, n: usize) {
        if self.n != n {
            self.n = n;
            self.lu.resize(n * n, 0.0);
            self.pivots = (0..n).collect();
        }
    }

    fn analyze(&mut self, ap: &[i64], _ai: &[i64]) -> Result<(), SolverError> {
        if ap.len() != self.n + 1 {
            return Err(SolverError::AnalyzeFailed);
        }
        Ok(())
    }

    fn factor(&mut self, ap: &[i64], ai: &[i64], ax: &[f64]) -> Result<(), SolverError> {
        self.fill(ap, ai, ax)?;
        self.factorize()
    }

    fn solve(&mut self, rhs: &mut [f64]) -> Result<(), SolverError> {
        let n = self.n;
        if rhs.len() != n {
            return Err(SolverError::SolveFailed);
        }
        let mut b: Vec<f64> = self.pivots.iter().map(|p| rhs[*p]).collect();
        for i in 0..n {
            let mut sum = b[i];
            for j in 0..i {
                sum -= self.lu[i * n + j] * b[j];
            }
            b[i] = sum;
        }
        for i in (0..n).rev() {
            let mut sum = b[i];
            for j in (i + 1)..n {
                sum -= self.lu[i * n + j] * rhs[j];
            }
            rhs[i] = sum / self.lu[i * n + i];
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "dense-lu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csc(dense: &[[f64; 2]; 2]) -> (Vec<i64>, Vec<i64>, Vec<f64>) {
        let mut ap = vec![0];
        let mut ai = Vec::new();
        let mut ax = Vec::new();
        for col in 0..2 {
            for (row, values) in dense.iter().enumerate() {
                if values[col] != 0.0 {
                    ai.push(row as i64);
                    ax.push(values[col]);
                }
            }
            ap.push(ai.len() as i64);
        }
        (ap, ai, ax)
    }

    #[test]
    fn solves_with_pivoting() {
        // [0 1; 2 1] x = [3; 5] -> x = [1, 3]
        let (ap, ai, ax) = csc(&[[0.0, 1.0], [2.0, 1.0]]);
        let mut solver = DenseSolver::new(2);
        solver.analyze(&ap, &ai).unwrap();
        solver.factor(&ap, &ai, &ax).unwrap();
        let mut rhs = vec![3.0, 5.0];
        solver.solve(&mut rhs).unwrap();
        assert!((rhs[0] - 1.0).abs() < 1e-12);
        assert!((rhs[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn singular_matrix_fails_to_factor() {
        let (ap, ai, ax) = csc(&[[1.0, 1.0], [1.0, 1.0]]);
        let mut solver = DenseSolver::new(2);
        assert_eq!(solver.factor(&ap, &ai, &ax), Err(SolverError::FactorFailed));
    }
}
