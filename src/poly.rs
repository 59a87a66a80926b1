//! Polynomial basis expansion of feature rows.
//!
//! Output columns follow the usual ordering: the bias term, then every
//! monomial of degree 1, 2, .. `degree` as combinations with replacement of
//! the input columns in lexicographic order. For inputs `[a, b]` and degree 2
//! this is `[1, a, b, a², ab, b²]`.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmentationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolynomialFeatures {
    pub degree: usize,
    /// Keep only products of distinct columns (no `a²`).
    pub interaction_only: bool,
    pub include_bias: bool,
}

impl Default for PolynomialFeatures {
    fn default() -> Self {
        Self {
            degree: 4,
            interaction_only: false,
            include_bias: true,
        }
    }
}

impl PolynomialFeatures {
    pub fn new(degree: usize) -> Self {
        Self {
            degree,
            ..Self::default()
        }
    }

    /// Column-index tuples, one per output column.
    fn terms(&self, n_inputs: usize) -> Vec<Vec<usize>> {
        let mut terms = Vec::new();
        if self.include_bias {
            terms.push(Vec::new());
        }
        for d in 1..=self.degree {
            let mut current = Vec::with_capacity(d);
            self.push_combinations(n_inputs, d, 0, &mut current, &mut terms);
        }
        terms
    }

    fn push_combinations(
        &self,
        n_inputs: usize,
        remaining: usize,
        start: usize,
        current: &mut Vec<usize>,
        out: &mut Vec<Vec<usize>>,
    ) {
        if remaining == 0 {
            out.push(current.clone());
            return;
        }
        for col in start..n_inputs {
            current.push(col);
            let next = if self.interaction_only { col + 1 } else { col };
            self.push_combinations(n_inputs, remaining - 1, next, current, out);
            current.pop();
        }
    }

    /// Number of output columns for `n_inputs` input columns.
    pub fn output_width(&self, n_inputs: usize) -> usize {
        self.terms(n_inputs).len()
    }

    /// Expand every row of `features`. The term structure is re-derived from
    /// the input width on each call; nothing is remembered between calls.
    pub fn expand(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if self.degree == 0 {
            return Err(SegmentationError::InvalidConfig {
                parameter: "poly_degree",
                reason: "must be at least 1".into(),
            });
        }
        let (rows, cols) = features.dim();
        let terms = self.terms(cols);
        log::debug!(
            "polynomial expansion: {rows}x{cols} -> {rows}x{} (degree {})",
            terms.len(),
            self.degree
        );

        let mut out = Array2::zeros((rows, terms.len()));
        for (row, mut dst) in features.rows().into_iter().zip(out.rows_mut()) {
            for (j, term) in terms.iter().enumerate() {
                dst[j] = term.iter().map(|&c| row[c]).product();
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn degree_two_matches_reference_ordering() {
        let x = array![[2.0, 3.0]];
        let out = PolynomialFeatures::new(2).expand(x.view()).unwrap();
        assert_eq!(out, array![[1.0, 2.0, 3.0, 4.0, 6.0, 9.0]]);
    }

    #[test]
    fn interaction_only_drops_powers() {
        let poly = PolynomialFeatures {
            degree: 2,
            interaction_only: true,
            include_bias: false,
        };
        let out = poly.expand(array![[2.0, 3.0, 5.0]].view()).unwrap();
        assert_eq!(out, array![[2.0, 3.0, 5.0, 6.0, 10.0, 15.0]]);
    }

    #[test]
    fn six_features_degree_four_gives_210_columns() {
        // C(6 + 4, 4)
        assert_eq!(PolynomialFeatures::default().output_width(6), 210);
        let x = Array2::from_elem((3, 6), 0.5);
        assert_eq!(PolynomialFeatures::default().expand(x.view()).unwrap().dim(), (3, 210));
    }

    #[test]
    fn expansion_is_deterministic_per_call() {
        let x = array![[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]];
        let poly = PolynomialFeatures::default();
        assert_eq!(poly.expand(x.view()).unwrap(), poly.expand(x.view()).unwrap());
    }

    #[test]
    fn zero_degree_is_rejected() {
        let x = array![[1.0]];
        assert!(PolynomialFeatures::new(0).expand(x.view()).is_err());
    }
}
