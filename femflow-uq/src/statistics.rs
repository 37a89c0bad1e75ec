//! Statistics of a scalar quantity of interest given by its polynomial chaos coefficients.
use crate::hermite::evaluate_hermite_poly_histogram;
use crate::index_set::{compute_index_set_jp, compute_tensor_product_set, MultivariateHermite};
use crate::karhunen_loeve::FieldIntegral;
use femflow::assembly::{assemble_scalar, ElementData, ElementFunctional};
use femflow::element::map_gradients;
use femflow::solution::{FieldId, MultiLevelSolution};
use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

/// Upper bound on the Gauss-Hermite points per dimension used for the moments.
pub const MAX_MOMENT_QUADRATURE_POINTS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatisticsError {
    /// At least one moment must be requested.
    NoMoments,
    CoefficientMismatch { expected: usize, actual: usize },
}

impl fmt::Display for StatisticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMoments => write!(f, "The total number of moments has to be a positive integer."),
            Self::CoefficientMismatch { expected, actual } => write!(
                f,
                "Expected {} chaos coefficients, got {}.",
                expected, actual
            ),
        }
    }
}

impl Error for StatisticsError {}

struct DomainArea;

impl ElementFunctional for DomainArea {
    fn evaluate(&self, element: &ElementData) -> f64 {
        let coords = element.planar_coordinates();
        let geometry = element.geometry_table();
        (0..geometry.num_points())
            .map(|q| map_gradients(&coords, geometry, geometry, q).weight)
            .sum()
    }
}

/// The chaos coefficients $\alpha_j = \frac{1}{|D|} \int_D u_j \, dx$ of the spatial mean of
/// the solution.
pub fn coefficients_for_quantity_of_interest(solution: &MultiLevelSolution, sg_fields: &[FieldId]) -> Vec<f64> {
    let time = solution.time();
    let area = assemble_scalar(solution, &DomainArea, time);
    sg_fields
        .iter()
        .map(|&field| {
            let fe = solution.fe_type(field);
            assemble_scalar(solution, &FieldIntegral { field, fe }, time) / area
        })
        .collect()
}

/// Cumulants $\kappa_1, \dots, \kappa_n$ from the raw moments $\mu_1, \dots, \mu_n$ with the
/// recursion $\kappa_n = \mu_n - \sum_{k=1}^{n-1} \binom{n-1}{k-1} \kappa_k \mu_{n-k}$.
pub fn cumulants_from_moments(moments: &[f64]) -> Vec<f64> {
    let mut cumulants: Vec<f64> = Vec::with_capacity(moments.len());
    for n in 1..=moments.len() {
        let mut kappa = moments[n - 1];
        let mut binomial = 1.0;
        for k in 1..n {
            // binomial = C(n - 1, k - 1)
            kappa -= binomial * cumulants[k - 1] * moments[n - k - 1];
            binomial *= (n - k) as f64 / k as f64;
        }
        cumulants.push(kappa);
    }
    cumulants
}

/// Moments and cumulants of the quantity of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StochasticData {
    /// Raw moments $E[Q^n]$ for `n = 1..=tot_moments`.
    pub moments: Vec<f64>,
    pub mean: f64,
    pub variance: f64,
    pub std_deviation: f64,
    /// Raw moments of $(Q - \mu) / \sigma$.
    pub standardized_moments: Vec<f64>,
    pub cumulants: Vec<f64>,
    pub standardized_cumulants: Vec<f64>,
    pub quadrature_points: usize,
}

impl StochasticData {
    /// Computes the first `tot_moments` moments of $Q = \sum_i \alpha_i H_i(\xi)$ with a tensor
    /// Gauss-Hermite rule that integrates the moments exactly, within the point cap.
    pub fn compute(alphas: &[f64], p: usize, m: usize, tot_moments: usize) -> Result<Self, StatisticsError> {
        if tot_moments == 0 {
            return Err(StatisticsError::NoMoments);
        }
        let jp = compute_index_set_jp(p, m);
        if jp.len() != alphas.len() {
            return Err(StatisticsError::CoefficientMismatch {
                expected: jp.len(),
                actual: alphas.len(),
            });
        }

        let desired = (tot_moments * p + 1 + 1) / 2;
        let quadrature_points = desired.min(MAX_MOMENT_QUADRATURE_POINTS);
        if desired > MAX_MOMENT_QUADRATURE_POINTS {
            warn!(
                "Fewer quadrature points than needed for the moments. Needed: {}, used: {}",
                desired, quadrature_points
            );
        }
        let tp = compute_tensor_product_set(quadrature_points, m);
        let hermite = MultivariateHermite::evaluate(quadrature_points, p, &jp, &tp);
        let qoi: Vec<f64> = (0..hermite.num_nodes())
            .map(|j| hermite.expansion_at(alphas, j))
            .collect();

        let expectation = |f: &dyn Fn(f64) -> f64| -> f64 {
            hermite
                .weights
                .iter()
                .zip(&qoi)
                .map(|(w, &q)| w * f(q))
                .sum()
        };

        let moments: Vec<f64> = (1..=tot_moments)
            .map(|n| expectation(&|q| q.powi(n as i32)))
            .collect();
        let mean = moments[0];
        let variance = expectation(&|q| (q - mean).powi(2));
        let std_deviation = variance.sqrt();
        let standardized_moments: Vec<f64> = (1..=tot_moments)
            .map(|n| expectation(&|q| ((q - mean) / std_deviation).powi(n as i32)))
            .collect();

        Ok(Self {
            cumulants: cumulants_from_moments(&moments),
            standardized_cumulants: cumulants_from_moments(&standardized_moments),
            moments,
            mean,
            variance,
            std_deviation,
            standardized_moments,
            quadrature_points,
        })
    }

    pub fn log_summary(&self) {
        info!("Mean: {:.14}", self.mean);
        info!("Standard deviation: {:.14}", self.std_deviation);
        info!("Variance: {:.14}", self.variance);
        info!("Standardized moments: {:?}", self.standardized_moments);
        info!("Moments: {:?}", self.moments);
        info!("Standardized cumulants: {:?}", self.standardized_cumulants);
        info!("Cumulants: {:?}", self.cumulants);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramSettings {
    pub samples: usize,
    /// Interval of the standardized quantity of interest covered by the bins.
    pub start: f64,
    pub end: f64,
    pub seed: u64,
}

impl Default for HistogramSettings {
    fn default() -> Self {
        Self {
            samples: 100000,
            start: -5.0,
            end: 3.0,
            seed: 0,
        }
    }
}

impl HistogramSettings {
    /// Sturges-type rule $\lfloor 1 + 3.3 \ln N \rfloor$.
    pub fn num_bins(&self) -> usize {
        (1.0 + 3.3 * (self.samples as f64).ln()).floor() as usize
    }

    pub fn bin_width(&self) -> f64 {
        (self.end - self.start).abs() / self.num_bins() as f64
    }

    pub fn bin_centers(&self) -> Vec<f64> {
        let delta = self.bin_width();
        (0..self.num_bins())
            .map(|i| self.start + (i as f64 + 0.5) * delta)
            .collect()
    }
}

/// Sampled density of the standardized quantity of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub centers: Vec<f64>,
    /// Normalized such that the histogram integrates to one.
    pub pdf: Vec<f64>,
    /// Gaussian kernel density estimate at the bin centers, with the bin width as bandwidth.
    pub kde: Vec<f64>,
    /// Samples that fell outside every bin.
    pub uncaptured: usize,
    /// Moments of the samples with $Q \in (start, end)$.
    pub monte_carlo_moments: Vec<f64>,
    pub monte_carlo_standardized_moments: Vec<f64>,
    pub monte_carlo_variance: f64,
}

/// Samples $Q = \sum_i \alpha_i H_i(\xi)$ for standard normal $\xi$ and bins the standardized
/// samples.
pub fn histogram_pdf(
    alphas: &[f64],
    p: usize,
    m: usize,
    data: &StochasticData,
    settings: &HistogramSettings,
) -> Histogram {
    let jp = compute_index_set_jp(p, m);
    let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
    let xi: Vec<Vec<f64>> = (0..settings.samples)
        .map(|_| (0..m).map(|_| rng.sample(StandardNormal)).collect())
        .collect();

    let qoi: Vec<f64> = xi
        .par_iter()
        .map(|sample| {
            let hermite = evaluate_hermite_poly_histogram(p, sample);
            jp.iter()
                .zip(alphas)
                .map(|(index, alpha)| {
                    let h: f64 = index.iter().enumerate().map(|(k, &order)| hermite[order][k]).product();
                    alpha * h
                })
                .sum()
        })
        .collect();
    let standardized: Vec<f64> = qoi
        .iter()
        .map(|q| (q - data.mean) / data.std_deviation)
        .collect();

    let bins = settings.num_bins();
    let delta = settings.bin_width();
    let mut counts = vec![0.0; bins];
    let mut uncaptured = 0;
    for &t in &standardized {
        let position = ((t - settings.start) / delta).floor();
        if position >= 0.0 && (position as usize) < bins {
            counts[position as usize] += 1.0;
        } else {
            uncaptured += 1;
        }
    }
    if uncaptured > 0 {
        warn!("{} samples are not in any histogram bin", uncaptured);
    }
    let integral: f64 = counts.iter().map(|c| c * delta).sum();
    let pdf = counts.iter().map(|c| c / integral).collect();
    debug!("Histogram integral before normalization: {}", integral);

    let inside: Vec<usize> = (0..qoi.len())
        .filter(|&k| qoi[k] > settings.start && qoi[k] < settings.end)
        .collect();
    let count = inside.len() as f64;
    let sample_moment = |values: &[f64], n: usize| -> f64 {
        inside.iter().map(|&k| values[k].powi(n as i32)).sum::<f64>() / count
    };
    let tot_moments = data.moments.len();
    let monte_carlo_moments: Vec<f64> = (1..=tot_moments).map(|n| sample_moment(&qoi, n)).collect();
    let monte_carlo_standardized_moments = (1..=tot_moments)
        .map(|n| sample_moment(&standardized, n))
        .collect();
    let monte_carlo_mean = monte_carlo_moments.first().copied().unwrap_or(0.0);
    let monte_carlo_variance = inside
        .iter()
        .map(|&k| (qoi[k] - monte_carlo_mean).powi(2))
        .sum::<f64>()
        / count;

    let centers = settings.bin_centers();
    let normalization = 1.0 / ((2.0 * std::f64::consts::PI).sqrt() * settings.samples as f64 * delta);
    let kde = centers
        .par_iter()
        .map(|&x| {
            standardized
                .iter()
                .map(|t| {
                    let z = (x - t) / delta;
                    (-0.5 * z * z).exp()
                })
                .sum::<f64>()
                * normalization
        })
        .collect();

    Histogram {
        centers,
        pdf,
        kde,
        uncaptured,
        monte_carlo_moments,
        monte_carlo_standardized_moments,
        monte_carlo_variance,
    }
}
