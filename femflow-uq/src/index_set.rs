//! Multi-index sets of the polynomial chaos basis and tensor quadrature.
use crate::hermite::evaluate_hermite_poly;

/// All multi-indices of length `m` with total degree at most `p`.
///
/// Indices are grouped by total degree, starting with the zero index. Within one degree
/// they are ordered lexicographically with the first entry varying slowest, so the basis
/// function of index `i` for the first degree is the linear polynomial in the `i`-th variable.
pub fn compute_index_set_jp(p: usize, m: usize) -> Vec<Vec<usize>> {
    let mut set = Vec::new();
    for degree in 0..=p {
        let mut index = vec![0; m];
        push_with_degree(&mut set, &mut index, 0, degree);
    }
    set
}

fn push_with_degree(set: &mut Vec<Vec<usize>>, index: &mut [usize], position: usize, remaining: usize) {
    if position + 1 >= index.len() {
        if let Some(last) = index.last_mut() {
            *last = remaining;
            set.push(index.to_vec());
        } else if remaining == 0 {
            set.push(Vec::new());
        }
        return;
    }
    for k in (0..=remaining).rev() {
        index[position] = k;
        push_with_degree(set, index, position + 1, remaining - k);
    }
    index[position] = 0;
}

/// All `n^m` tuples with entries in `0..n`, in lexicographic order.
pub fn compute_tensor_product_set(n: usize, m: usize) -> Vec<Vec<usize>> {
    let total = n.pow(m as u32);
    (0..total)
        .map(|mut linear| {
            let mut tuple = vec![0; m];
            for entry in tuple.iter_mut().rev() {
                *entry = linear % n;
                linear /= n;
            }
            tuple
        })
        .collect()
}

/// The multivariate Hermite basis of a multi-index set evaluated at the nodes of a tensor
/// product Gauss-Hermite rule.
#[derive(Debug, Clone, PartialEq)]
pub struct MultivariateHermite {
    /// `values[i][j]` is basis function `i` at tensor node `j`.
    pub values: Vec<Vec<f64>>,
    pub weights: Vec<f64>,
    /// Coordinates of every tensor node.
    pub points: Vec<Vec<f64>>,
}

impl MultivariateHermite {
    /// Evaluates the basis of `jp` on the tensor rule `tp` built from `num_points` points per
    /// dimension.
    pub fn evaluate(num_points: usize, p: usize, jp: &[Vec<usize>], tp: &[Vec<usize>]) -> Self {
        let table = evaluate_hermite_poly(num_points, p);
        let values = jp
            .iter()
            .map(|index| {
                tp.iter()
                    .map(|node| {
                        index
                            .iter()
                            .zip(node)
                            .map(|(&order, &k)| table.values[order][k])
                            .product()
                    })
                    .collect()
            })
            .collect();
        let weights = tp
            .iter()
            .map(|node| node.iter().map(|&k| table.weights[k]).product())
            .collect();
        let points = tp
            .iter()
            .map(|node| node.iter().map(|&k| table.points[k]).collect())
            .collect();
        Self {
            values,
            weights,
            points,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.weights.len()
    }

    /// Evaluates the expansion $\sum_i c_i H_i$ at node `j`.
    pub fn expansion_at(&self, coefficients: &[f64], j: usize) -> f64 {
        coefficients
            .iter()
            .zip(&self.values)
            .map(|(c, values)| c * values[j])
            .sum()
    }
}

/// Number of multi-indices in `Jp`, the binomial coefficient `C(m + p, p)`.
pub fn jp_cardinality(p: usize, m: usize) -> usize {
    (1..=p).fold(1, |acc, k| acc * (m + k) / k)
}
