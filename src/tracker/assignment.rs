//! Linear assignment solvers.
//!
//! All solvers share one contract: given an M x N cost matrix and a maximum
//! accepted cost, return the matched (row, column) pairs plus the rows and
//! columns left over. Pairs costing more than the threshold are never
//! returned as matches. Cells above the threshold are replaced by a large
//! constant before solving, so the exact solvers maximise the number of
//! feasible matches first and minimise their total cost second.

use log::warn;
use ndarray::Array2;
use pathfinding::kuhn_munkres::kuhn_munkres_min;
use pathfinding::matrix::Matrix;

use crate::tracker::matching::AssignmentResult;

/// Cost given to padding cells and to pairs above the threshold.
const INFEASIBLE: f64 = 1e6;

/// Fixed-point scale for the integer Kuhn-Munkres solver.
const HUNGARIAN_SCALE: f64 = 1e6;

/// Strategy for minimum-cost bipartite matching.
pub trait AssignmentSolver {
    fn solve(&self, cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult;
}

/// Built-in solver selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Solver {
    /// Exact Jonker-Volgenant solver (`lapjv`).
    #[default]
    JonkerVolgenant,
    /// Exact Hungarian (Kuhn-Munkres) solver.
    Hungarian,
    /// Greedy lowest-cost-first matching; approximate but allocation-light.
    Greedy,
}

impl AssignmentSolver for Solver {
    fn solve(&self, cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
        match self {
            Self::JonkerVolgenant => JonkerVolgenant.solve(cost_matrix, thresh),
            Self::Hungarian => Hungarian.solve(cost_matrix, thresh),
            Self::Greedy => Greedy.solve(cost_matrix, thresh),
        }
    }
}

fn gated(cost: f32, thresh: f32) -> f64 {
    if cost <= thresh { cost as f64 } else { INFEASIBLE }
}

/// Jonker-Volgenant solver over a square, padded copy of the matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct JonkerVolgenant;

impl AssignmentSolver for JonkerVolgenant {
    fn solve(&self, cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
        let (num_rows, num_cols) = cost_matrix.dim();
        if num_rows == 0 || num_cols == 0 {
            return AssignmentResult::all_unmatched(num_rows, num_cols);
        }

        let size = num_rows.max(num_cols);
        let padded = Array2::from_shape_fn((size, size), |(i, j)| {
            if i < num_rows && j < num_cols {
                gated(cost_matrix[[i, j]], thresh)
            } else {
                INFEASIBLE
            }
        });

        match lapjv::lapjv(&padded) {
            Ok((row_to_col, _)) => AssignmentResult::from_row_assignment(
                cost_matrix,
                row_to_col.into_iter().enumerate().map(|(r, c)| (r, Some(c))),
                thresh,
            ),
            Err(err) => {
                warn!("lapjv failed on {num_rows}x{num_cols} cost matrix: {err:?}");
                AssignmentResult::all_unmatched(num_rows, num_cols)
            }
        }
    }
}

/// Hungarian solver backed by `pathfinding`'s Kuhn-Munkres implementation.
///
/// Costs are converted to fixed point; the matrix is transposed when there
/// are more rows than columns since the solver assigns every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hungarian;

impl AssignmentSolver for Hungarian {
    fn solve(&self, cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
        let (num_rows, num_cols) = cost_matrix.dim();
        if num_rows == 0 || num_cols == 0 {
            return AssignmentResult::all_unmatched(num_rows, num_cols);
        }

        let transpose = num_rows > num_cols;
        let (rows, cols) = if transpose {
            (num_cols, num_rows)
        } else {
            (num_rows, num_cols)
        };

        let mut weights = Matrix::new(rows, cols, 0_i64);
        for ((i, j), &cost) in cost_matrix.indexed_iter() {
            let fixed = (gated(cost, thresh) * HUNGARIAN_SCALE).round() as i64;
            if transpose {
                weights[(j, i)] = fixed;
            } else {
                weights[(i, j)] = fixed;
            }
        }

        let (_total, assignment) = kuhn_munkres_min(&weights);
        let pairs = assignment.into_iter().enumerate().map(|(r, c)| {
            if transpose { (c, Some(r)) } else { (r, Some(c)) }
        });
        AssignmentResult::from_row_assignment(cost_matrix, pairs, thresh)
    }
}

/// Repeatedly takes the cheapest remaining feasible pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl AssignmentSolver for Greedy {
    fn solve(&self, cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
        let (num_rows, num_cols) = cost_matrix.dim();
        if num_rows == 0 || num_cols == 0 {
            return AssignmentResult::all_unmatched(num_rows, num_cols);
        }

        let mut candidates: Vec<(f32, usize, usize)> = cost_matrix
            .indexed_iter()
            .filter(|&(_, &cost)| cost <= thresh)
            .map(|((i, j), &cost)| (cost, i, j))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then((a.1, a.2).cmp(&(b.1, b.2))));

        let mut row_taken = vec![false; num_rows];
        let mut col_taken = vec![false; num_cols];
        let mut pairs = Vec::new();
        for (_, i, j) in candidates {
            if row_taken[i] || col_taken[j] {
                continue;
            }
            row_taken[i] = true;
            col_taken[j] = true;
            pairs.push((i, Some(j)));
        }

        AssignmentResult::from_row_assignment(cost_matrix, pairs, thresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const EXACT: [Solver; 2] = [Solver::JonkerVolgenant, Solver::Hungarian];

    fn known_3x3() -> Array2<f32> {
        // Unique optimum: (0,1) + (1,0) + (2,2) = 0.5
        array![[0.4, 0.1, 0.3], [0.2, 0.0, 0.5], [0.3, 0.2, 0.2]]
    }

    #[test]
    fn test_exact_solvers_find_optimum() {
        for solver in EXACT {
            let result = solver.solve(&known_3x3(), 1.0);
            assert_eq!(result.matches, vec![(0, 1), (1, 0), (2, 2)], "{solver:?}");
            assert!(result.unmatched_tracks.is_empty());
            assert!(result.unmatched_detections.is_empty());
        }
    }

    #[test]
    fn test_greedy_is_approximate() {
        let result = Solver::Greedy.solve(&known_3x3(), 1.0);
        // Takes (1,1) = 0.0 first, then (2,2), then (0,0): total 0.6.
        assert_eq!(result.matches, vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn test_threshold_excludes_pairs() {
        for solver in [Solver::JonkerVolgenant, Solver::Hungarian, Solver::Greedy] {
            let result = solver.solve(&known_3x3(), 0.15);
            assert!(
                result.matches.iter().all(|&(i, j)| known_3x3()[[i, j]] <= 0.15),
                "{solver:?}: {result:?}"
            );
            assert_eq!(
                result.matches.len() + result.unmatched_tracks.len(),
                3,
                "{solver:?}"
            );
            assert_eq!(
                result.matches.len() + result.unmatched_detections.len(),
                3,
                "{solver:?}"
            );
        }
    }

    #[test]
    fn test_threshold_rejects_optimal_pair() {
        // Unconstrained optimum is (0,1) + (1,0), but (1,0) exceeds the threshold.
        let costs = array![[0.9_f32, 0.3], [0.5, 0.95]];
        for solver in EXACT {
            let result = solver.solve(&costs, 0.35);
            assert_eq!(result.matches, vec![(0, 1)], "{solver:?}");
            assert_eq!(result.unmatched_tracks, vec![1]);
            assert_eq!(result.unmatched_detections, vec![0]);
        }
    }

    #[test]
    fn test_rectangular_matrices() {
        let wide = array![[0.9_f32, 0.1, 0.8], [0.2, 0.9, 0.9]];
        let tall = wide.t().to_owned();
        for solver in EXACT {
            let result = solver.solve(&wide, 0.5);
            assert_eq!(result.matches, vec![(0, 1), (1, 0)], "{solver:?}");
            assert!(result.unmatched_tracks.is_empty());
            assert_eq!(result.unmatched_detections, vec![2]);

            let result = solver.solve(&tall, 0.5);
            assert_eq!(result.matches, vec![(0, 1), (1, 0)], "{solver:?}");
            assert_eq!(result.unmatched_tracks, vec![2]);
            assert!(result.unmatched_detections.is_empty());
        }
    }

    #[test]
    fn test_empty_sides() {
        for solver in [Solver::JonkerVolgenant, Solver::Hungarian, Solver::Greedy] {
            let no_tracks = Array2::<f32>::zeros((0, 3));
            let result = solver.solve(&no_tracks, 0.8);
            assert!(result.matches.is_empty());
            assert!(result.unmatched_tracks.is_empty());
            assert_eq!(result.unmatched_detections, vec![0, 1, 2]);

            let no_dets = Array2::<f32>::zeros((2, 0));
            let result = solver.solve(&no_dets, 0.8);
            assert!(result.matches.is_empty());
            assert_eq!(result.unmatched_tracks, vec![0, 1]);
            assert!(result.unmatched_detections.is_empty());
        }
    }
}
