use femflow_uq::statistics::{
    cumulants_from_moments, histogram_pdf, HistogramSettings, StatisticsError, StochasticData,
    MAX_MOMENT_QUADRATURE_POINTS,
};
use matrixcompare::assert_scalar_eq;

/// The explicit moment-cumulant relations up to order six.
fn explicit_cumulants(m: &[f64]) -> Vec<f64> {
    vec![
        m[0],
        m[1] - m[0] * m[0],
        m[2] - 3.0 * m[1] * m[0] + 2.0 * m[0].powi(3),
        m[3] - 4.0 * m[2] * m[0] - 3.0 * m[1] * m[1] + 12.0 * m[1] * m[0] * m[0] - 6.0 * m[0].powi(4),
        m[4] - 5.0 * m[3] * m[0] - 10.0 * m[2] * m[1] + 20.0 * m[2] * m[0] * m[0] + 30.0 * m[1] * m[1] * m[0]
            - 60.0 * m[1] * m[0].powi(3)
            + 24.0 * m[0].powi(5),
        m[5] - 6.0 * m[4] * m[0] - 15.0 * m[3] * m[1] + 30.0 * m[3] * m[0] * m[0] - 10.0 * m[2] * m[2]
            + 120.0 * m[2] * m[1] * m[0]
            - 120.0 * m[2] * m[0].powi(3)
            + 30.0 * m[1].powi(3)
            - 270.0 * m[1].powi(2) * m[0].powi(2)
            + 360.0 * m[1] * m[0].powi(4)
            - 120.0 * m[0].powi(6),
    ]
}

#[test]
fn cumulant_recursion_matches_explicit_formulas() {
    let moments = [0.3, 1.2, -0.4, 2.5, 0.7, 5.1];
    let recursion = cumulants_from_moments(&moments);
    let explicit = explicit_cumulants(&moments);
    for (a, b) in recursion.iter().zip(&explicit) {
        assert_scalar_eq!(*a, *b, comp = abs, tol = 1e-12);
    }
}

#[test]
fn seventh_cumulant_of_centered_moments() {
    // With zero mean, k7 = m7 - 35 m3 m4 - 21 m2 m5 + 210 m2^2 m3
    let moments = [0.0, 1.5, 0.2, 4.0, -0.3, 9.0, 1.1];
    let kappa = cumulants_from_moments(&moments)[6];
    let (m2, m3, m4, m5, m7) = (moments[1], moments[2], moments[3], moments[4], moments[6]);
    let expected = m7 - 35.0 * m3 * m4 - 21.0 * m2 * m5 + 210.0 * m2 * m2 * m3;
    assert_scalar_eq!(kappa, expected, comp = abs, tol = 1e-12);
}

#[test]
fn normal_moments_have_two_nonzero_cumulants() {
    let (mu, s2): (f64, f64) = (0.7, 1.9);
    let moments = [
        mu,
        mu * mu + s2,
        mu.powi(3) + 3.0 * mu * s2,
        mu.powi(4) + 6.0 * mu * mu * s2 + 3.0 * s2 * s2,
        mu.powi(5) + 10.0 * mu.powi(3) * s2 + 15.0 * mu * s2 * s2,
        mu.powi(6) + 15.0 * mu.powi(4) * s2 + 45.0 * mu * mu * s2 * s2 + 15.0 * s2.powi(3),
    ];
    let kappa = cumulants_from_moments(&moments);
    assert_scalar_eq!(kappa[0], mu, comp = abs, tol = 1e-12);
    assert_scalar_eq!(kappa[1], s2, comp = abs, tol = 1e-12);
    for k in &kappa[2..] {
        assert_scalar_eq!(*k, 0.0, comp = abs, tol = 1e-10);
    }
}

#[test]
fn linear_chaos_is_normally_distributed() {
    let alphas = [1.0, 0.5];
    let data = StochasticData::compute(&alphas, 1, 1, 6).unwrap();
    assert_eq!(data.quadrature_points, 4);
    assert_scalar_eq!(data.mean, 1.0, comp = abs, tol = 1e-13);
    assert_scalar_eq!(data.variance, 0.25, comp = abs, tol = 1e-13);
    assert_scalar_eq!(data.std_deviation, 0.5, comp = abs, tol = 1e-13);

    let standard_normal = [0.0, 1.0, 0.0, 3.0, 0.0, 15.0];
    for (m, expected) in data.standardized_moments.iter().zip(&standard_normal) {
        assert_scalar_eq!(*m, *expected, comp = abs, tol = 1e-11);
    }
    assert_scalar_eq!(data.cumulants[0], 1.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(data.cumulants[1], 0.25, comp = abs, tol = 1e-12);
    let standardized_cumulants = [0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
    for (k, expected) in data.standardized_cumulants.iter().zip(&standardized_cumulants) {
        assert_scalar_eq!(*k, *expected, comp = abs, tol = 1e-10);
    }
}

#[test]
fn quadratic_chaos_has_chi_squared_skewness() {
    // Q = H_2(xi) = (xi^2 - 1) / sqrt(2) has skewness 2 sqrt(2)
    let data = StochasticData::compute(&[0.0, 0.0, 1.0], 2, 1, 3).unwrap();
    assert_scalar_eq!(data.mean, 0.0, comp = abs, tol = 1e-13);
    assert_scalar_eq!(data.variance, 1.0, comp = abs, tol = 1e-12);
    assert_scalar_eq!(data.standardized_moments[2], 2.0 * f64::sqrt(2.0), comp = abs, tol = 1e-11);
}

#[test]
fn invalid_input_is_rejected() {
    assert_eq!(StochasticData::compute(&[1.0], 0, 1, 0), Err(StatisticsError::NoMoments));
    assert_eq!(
        StochasticData::compute(&[1.0, 2.0], 2, 1, 4),
        Err(StatisticsError::CoefficientMismatch { expected: 3, actual: 2 })
    );
}

#[test]
fn moment_quadrature_is_capped() {
    let alphas = vec![0.0; 5];
    let data = StochasticData::compute(&alphas, 4, 1, 8);
    assert_eq!(data.unwrap().quadrature_points, MAX_MOMENT_QUADRATURE_POINTS);
}

#[test]
fn histogram_of_normal_quantity_resembles_gaussian() {
    let alphas = [1.0, 0.5];
    let data = StochasticData::compute(&alphas, 1, 1, 4).unwrap();
    let settings = HistogramSettings {
        samples: 20000,
        ..HistogramSettings::default()
    };
    let histogram = histogram_pdf(&alphas, 1, 1, &data, &settings);

    assert_eq!(settings.num_bins(), 33);
    assert_eq!(histogram.pdf.len(), 33);
    assert_eq!(histogram.kde.len(), 33);
    let delta = settings.bin_width();
    assert_scalar_eq!(histogram.pdf.iter().sum::<f64>() * delta, 1.0, comp = abs, tol = 1e-12);

    // Standard normal samples above 3 are outside the bins
    assert!(histogram.uncaptured > 0 && histogram.uncaptured < 100);

    let peak = histogram
        .centers
        .iter()
        .position(|&t| (t - 0.0).abs() <= 0.5 * delta)
        .unwrap();
    let t = histogram.centers[peak];
    let phi = (-0.5 * t * t).exp() / (2.0 * std::f64::consts::PI).sqrt();
    assert_scalar_eq!(histogram.pdf[peak], phi, comp = abs, tol = 0.05);
    assert_scalar_eq!(histogram.kde[peak], phi, comp = abs, tol = 0.05);

    assert_scalar_eq!(histogram.monte_carlo_moments[0], 1.0, comp = abs, tol = 0.02);
    assert_scalar_eq!(histogram.monte_carlo_variance, 0.25, comp = abs, tol = 0.02);
    assert_scalar_eq!(histogram.monte_carlo_standardized_moments[1], 1.0, comp = abs, tol = 0.05);

    let again = histogram_pdf(&alphas, 1, 1, &data, &settings);
    assert_eq!(again, histogram);
}
