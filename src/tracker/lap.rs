//! Rectangular linear assignment on top of the Jonker-Volgenant solver.
//!
//! The `lapjv` crate only handles square matrices. Rectangular problems and
//! problems with a cost limit are embedded into a square
//! `(rows + cols) x (rows + cols)` matrix:
//!
//! ```text
//!            cols           rows
//!       +-------------+-------------+
//! rows  |  real cost  |   filler    |
//!       +-------------+-------------+
//! cols  |   filler    |      0      |
//!       +-------------+-------------+
//! ```
//!
//! The filler is `cost_limit / 2`, so a real pair is only chosen when it is
//! cheaper than leaving both its row and its column unassigned. Without a
//! limit the filler is `max(cost) + 1`. Assignments that land in the padding
//! are reported as `-1`.

use ndarray::{Array2, s};

use crate::error::TrackerError;

/// Result of [`lapjv`].
#[derive(Debug, Clone, PartialEq)]
pub struct LapjvSolution {
    /// Column assigned to each row, `-1` when unassigned.
    pub rowsol: Vec<isize>,
    /// Row assigned to each column, `-1` when unassigned.
    pub colsol: Vec<isize>,
    /// Total cost of the real (non-padding) assignments.
    pub cost: f64,
}

/// Solve the minimum-cost assignment for `cost`.
///
/// Non-square matrices require `extend_cost`. A finite `cost_limit` always
/// extends the matrix and acts as a reject option: no returned pair costs
/// more than the limit. An infinite limit is the same as no limit.
pub fn lapjv(
    cost: &Array2<f32>,
    extend_cost: bool,
    cost_limit: Option<f64>,
) -> Result<LapjvSolution, TrackerError> {
    let (n_rows, n_cols) = cost.dim();

    if n_rows != n_cols && !extend_cost {
        return Err(TrackerError::NonSquareCost {
            rows: n_rows,
            cols: n_cols,
        });
    }

    if n_rows == 0 || n_cols == 0 {
        return Ok(LapjvSolution {
            rowsol: vec![-1; n_rows],
            colsol: vec![-1; n_cols],
            cost: 0.0,
        });
    }

    if cost.iter().any(|c| !c.is_finite()) {
        return Err(TrackerError::Assignment("cost matrix has non-finite entries".into()));
    }
    let cost_limit = cost_limit.filter(|limit| *limit != f64::INFINITY);
    if cost_limit.is_some_and(|limit| !limit.is_finite()) {
        return Err(TrackerError::Assignment("cost limit is not finite".into()));
    }

    let extended = extend_cost || cost_limit.is_some();
    let square = if extended {
        extend(cost, cost_limit)
    } else {
        cost.mapv(f64::from)
    };

    let (x, y) = ::lapjv::lapjv(&square)
        .map_err(|e| TrackerError::Assignment(format!("{e:?}")))?;

    let rowsol: Vec<isize> = x[..n_rows]
        .iter()
        .map(|&j| if j < n_cols { j as isize } else { -1 })
        .collect();
    let colsol: Vec<isize> = y[..n_cols]
        .iter()
        .map(|&i| if i < n_rows { i as isize } else { -1 })
        .collect();

    let total: f64 = rowsol
        .iter()
        .enumerate()
        .filter(|(_, j)| **j >= 0)
        .map(|(i, &j)| square[[i, j as usize]])
        .sum();

    Ok(LapjvSolution {
        rowsol,
        colsol,
        cost: total,
    })
}

fn extend(cost: &Array2<f32>, cost_limit: Option<f64>) -> Array2<f64> {
    let (n_rows, n_cols) = cost.dim();
    let n = n_rows + n_cols;

    let filler = match cost_limit {
        Some(limit) => limit / 2.0,
        None => {
            let max = cost.iter().fold(f32::NEG_INFINITY, |m, &c| m.max(c));
            f64::from(max) + 1.0
        }
    };

    let mut square = Array2::from_elem((n, n), filler);
    square.slice_mut(s![n_rows.., n_cols..]).fill(0.0);
    square
        .slice_mut(s![..n_rows, ..n_cols])
        .assign(&cost.mapv(f64::from));
    square
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn assert_permutation(sol: &LapjvSolution) {
        let n = sol.rowsol.len();
        let mut seen = vec![false; n];
        for (i, &j) in sol.rowsol.iter().enumerate() {
            assert!(j >= 0, "row {i} unassigned");
            assert!(!seen[j as usize], "column {j} assigned twice");
            seen[j as usize] = true;
            assert_eq!(sol.colsol[j as usize], i as isize);
        }
    }

    #[test]
    fn test_square_is_complete_permutation() {
        let cost = array![[4.0f32, 1.0, 3.0], [2.0, 0.0, 5.0], [3.0, 2.0, 2.0]];
        let sol = lapjv(&cost, false, None).unwrap();

        assert_permutation(&sol);
        assert_eq!(sol.rowsol, vec![1, 0, 2]);
        assert_relative_eq!(sol.cost, 5.0);
    }

    #[test]
    fn test_square_extended_without_limit_is_complete() {
        let cost = array![[0.9f32, 0.1], [0.2, 0.95]];
        let sol = lapjv(&cost, true, None).unwrap();
        assert_permutation(&sol);
        assert_eq!(sol.rowsol, vec![1, 0]);
    }

    #[test]
    fn test_rectangular_requires_extension() {
        let cost = Array2::<f32>::zeros((2, 3));
        assert_eq!(
            lapjv(&cost, false, None),
            Err(TrackerError::NonSquareCost { rows: 2, cols: 3 })
        );
    }

    #[test]
    fn test_rectangular_more_columns() {
        let cost = array![[0.5f32, 0.1, 0.9], [0.2, 0.3, 0.8]];
        let sol = lapjv(&cost, true, None).unwrap();

        assert_eq!(sol.rowsol, vec![1, 0]);
        assert_eq!(sol.colsol, vec![1, 0, -1]);
        assert_relative_eq!(sol.cost, 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_cost_limit_rejects_expensive_pairs() {
        let cost = array![[0.1f32, 0.95], [0.9, 0.85], [0.99, 0.2]];
        let sol = lapjv(&cost, true, Some(0.8)).unwrap();

        assert_eq!(sol.rowsol, vec![0, -1, 1]);
        assert_eq!(sol.colsol, vec![0, 2]);
        for (i, &j) in sol.rowsol.iter().enumerate() {
            if j >= 0 {
                assert!(cost[[i, j as usize]] <= 0.8);
            }
        }
    }

    #[test]
    fn test_cost_limit_everything_rejected() {
        let cost = array![[0.9f32, 1.0], [1.0, 0.95]];
        let sol = lapjv(&cost, true, Some(0.8)).unwrap();
        assert_eq!(sol.rowsol, vec![-1, -1]);
        assert_eq!(sol.colsol, vec![-1, -1]);
        assert_eq!(sol.cost, 0.0);
    }

    #[test]
    fn test_infinite_limit_is_no_limit() {
        let cost = array![[0.1f32, 0.9], [0.2, 0.3]];
        let unlimited = lapjv(&cost, true, Some(f64::INFINITY)).unwrap();
        assert_eq!(unlimited, lapjv(&cost, true, None).unwrap());
        assert_eq!(unlimited.rowsol, vec![0, 1]);
        assert_relative_eq!(unlimited.cost, 0.4, epsilon = 1e-6);

        assert!(matches!(
            lapjv(&cost, true, Some(f64::NAN)),
            Err(TrackerError::Assignment(_))
        ));
    }

    #[test]
    fn test_empty() {
        let cost = Array2::<f32>::zeros((0, 3));
        let sol = lapjv(&cost, true, Some(0.8)).unwrap();
        assert!(sol.rowsol.is_empty());
        assert_eq!(sol.colsol, vec![-1, -1, -1]);
    }

    #[test]
    fn test_non_finite_cost_is_an_error() {
        let cost = array![[f32::NAN, 0.1], [0.2, 0.3]];
        assert!(matches!(
            lapjv(&cost, true, Some(0.8)),
            Err(TrackerError::Assignment(_))
        ));
    }

    #[test]
    fn test_deterministic() {
        let cost = array![[0.3f32, 0.3, 0.3], [0.3, 0.3, 0.3]];
        let a = lapjv(&cost, true, Some(0.8)).unwrap();
        let b = lapjv(&cost, true, Some(0.8)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.rowsol.iter().filter(|j| **j >= 0).count(), 2);
    }
}
