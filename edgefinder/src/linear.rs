//! Dense two-dimensional grids of probabilities.

use std::ops::{Index, IndexMut};

/// A row-major matrix of `f64` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}
impl Matrix {
    /// # Panics
    /// If the number of cells overflows `usize`.
    pub fn allocate(rows: usize, cols: usize) -> Self {
        let len = rows
            .checked_mul(cols)
            .unwrap_or_else(|| panic!("a {rows}x{cols} matrix has too many cells"));
        Self {
            data: vec![0.0; len],
            rows,
            cols,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn flatten(&self) -> &[f64] {
        &self.data
    }

    pub fn flatten_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn row_slice(&self, row: usize) -> &[f64] {
        let start = self.offset(row, 0);
        &self.data[start..start + self.cols]
    }

    /// Every cell as `(row, col, value)`, in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let cols = self.cols;
        self.data
            .iter()
            .enumerate()
            .map(move |(index, &value)| (index / cols, index % cols, value))
    }

    /// Sum of each row.
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.rows).map(|row| self.row_slice(row).iter().sum()).collect()
    }

    /// Sum of each column.
    pub fn col_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.cols];
        for (_, col, value) in self.cells() {
            sums[col] += value;
        }
        sums
    }

    /// Sum of the cells whose coordinates satisfy `predicate`.
    pub fn sum_where(&self, mut predicate: impl FnMut(usize, usize) -> bool) -> f64 {
        self.cells()
            .filter(|&(row, col, _)| predicate(row, col))
            .map(|(_, _, value)| value)
            .sum()
    }

    /// The largest cell as `(row, col, value)`; the first in row-major order on ties. `None` if
    /// the matrix is empty.
    pub fn argmax(&self) -> Option<(usize, usize, f64)> {
        self.cells().fold(None, |best, cell| match best {
            Some((_, _, value)) if value >= cell.2 => best,
            _ => Some(cell),
        })
    }

    #[inline]
    fn offset(&self, row: usize, col: usize) -> usize {
        assert!(row < self.rows, "row {row} out of bounds for a {}x{} matrix", self.rows, self.cols);
        assert!(col < self.cols, "column {col} out of bounds for a {}x{} matrix", self.rows, self.cols);
        row * self.cols + col
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        &self.data[self.offset(row, col)]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        let offset = self.offset(row, col);
        &mut self.data[offset]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential(rows: usize, cols: usize) -> Matrix {
        let mut matrix = Matrix::allocate(rows, cols);
        for (index, value) in matrix.flatten_mut().iter_mut().enumerate() {
            *value = index as f64;
        }
        matrix
    }

    #[test]
    fn index_row_major() {
        let mut matrix = sequential(3, 4);
        assert_eq!(6.0, matrix[(1, 2)]);
        matrix[(2, 3)] = -1.0;
        assert_eq!(-1.0, matrix.flatten()[11]);
        assert_eq!(&[4.0, 5.0, 6.0, 7.0], matrix.row_slice(1));
    }

    #[test]
    #[should_panic = "row 3 out of bounds for a 3x4 matrix"]
    fn row_out_of_bounds() {
        sequential(3, 4)[(3, 0)];
    }

    #[test]
    #[should_panic = "column 4 out of bounds for a 3x4 matrix"]
    fn col_out_of_bounds() {
        sequential(3, 4)[(0, 4)];
    }

    #[test]
    #[should_panic = "too many cells"]
    fn allocate_overflow() {
        Matrix::allocate(usize::MAX, 2);
    }

    #[test]
    fn marginals() {
        let matrix = sequential(2, 3);
        assert_eq!(vec![3.0, 12.0], matrix.row_sums());
        assert_eq!(vec![3.0, 5.0, 7.0], matrix.col_sums());
    }

    #[test]
    fn sum_over_diagonal() {
        let matrix = sequential(3, 3);
        assert_eq!(12.0, matrix.sum_where(|row, col| row == col));
        assert_eq!(16.0, matrix.sum_where(|row, col| row > col));
    }

    #[test]
    fn argmax_prefers_first() {
        let mut matrix = Matrix::allocate(2, 2);
        assert_eq!(Some((0, 0, 0.0)), matrix.argmax());
        matrix[(0, 1)] = 0.4;
        matrix[(1, 0)] = 0.4;
        assert_eq!(Some((0, 1, 0.4)), matrix.argmax());
        assert_eq!(None, Matrix::allocate(0, 3).argmax());
    }
}
