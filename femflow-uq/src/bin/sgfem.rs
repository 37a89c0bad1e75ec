use clap::Parser;
use eyre::{eyre, WrapErr};
use femflow::boundary::{BdcKind, BoundaryCondition, BoundaryQuery};
use femflow::config::load_config;
use femflow::element::CellKind;
use femflow::io::vtk::VtkWriter;
use femflow::mesh::procedural::create_rectangle_mesh;
use femflow::mesh::MultiLevelMesh;
use femflow::solution::MultiLevelSolution;
use femflow::system::{ImplicitSystem, SystemKind};
use femflow_uq::config::UqConfig;
use femflow_uq::expansion::{edgeworth, gram_charlier, MAX_EDGEWORTH_TERMS, MAX_GRAM_CHARLIER_TERMS};
use femflow_uq::galerkin::{add_eigenfunction_fields, add_sg_fields, sg_field_name, StochasticGalerkinAssembler, SG_SYSTEM};
use femflow_uq::hermite::gaussian;
use femflow_uq::index_set::compute_index_set_jp;
use femflow_uq::karhunen_loeve::{compute_eigenpairs, orthonormality_check};
use femflow_uq::statistics::{coefficients_for_quantity_of_interest, histogram_pdf, Histogram, StochasticData};
use log::{info, warn, LevelFilter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Stochastic Galerkin solution of a diffusion problem with a log-normal coefficient.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// JSON configuration file. Defaults are used for missing fields.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of the VTK output and the statistics tables.
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Number of mesh levels, overrides the configuration.
    #[arg(long)]
    levels: Option<usize>,

    /// Total degree of the polynomial chaos, overrides the configuration.
    #[arg(long)]
    degree: Option<usize>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn homogeneous_dirichlet(_: &BoundaryQuery) -> BoundaryCondition {
    BoundaryCondition::Dirichlet(0.0)
}

fn main() -> eyre::Result<()> {
    let args = Args::parse();
    let level = args.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new().filter_level(level).init();

    let mut config: UqConfig = load_config(args.config.as_deref())?;
    if let Some(levels) = args.levels {
        config.levels = levels;
    }
    if let Some(degree) = args.degree {
        config.polynomial_degree = degree;
    }
    let (p, m) = (config.polynomial_degree, config.eigenpairs);
    let num_polynomials = compute_index_set_jp(p, m).len();
    info!("Chaos of degree {} in {} variables: {} polynomials", p, m, num_polynomials);

    let n = config.coarse_cells;
    let coarse = create_rectangle_mesh([0.0, 1.0], [0.0, 1.0], n, n, CellKind::Quadrilateral, true);
    let mesh = MultiLevelMesh::new(coarse, config.levels);
    let mut solution = MultiLevelSolution::new(Arc::new(mesh));
    let sg_fields = add_sg_fields(&mut solution, num_polynomials)?;
    let eigenfunctions = add_eigenfunction_fields(&mut solution, m)?;
    solution.initialize_all();
    solution.attach_boundary_condition(Arc::new(homogeneous_dirichlet));
    let names: Vec<String> = (0..num_polynomials).map(sg_field_name).collect();
    for name in &names {
        solution.generate_bdc(name, BdcKind::Steady)?;
    }

    let eigenvalues = compute_eigenpairs(
        &mut solution,
        &eigenfunctions,
        &config.covariance,
        config.eigen_quadrature_order,
    )?;
    let gram = orthonormality_check(&solution, &eigenfunctions);
    info!("Gram matrix of the eigenfunctions: {}", gram);

    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut system = ImplicitSystem::new(SG_SYSTEM, SystemKind::Linear, &solution, &name_refs, 0)?;
    system.set_settings(config.solver.clone());
    let assembler = StochasticGalerkinAssembler::new(
        sg_fields.clone(),
        eigenfunctions,
        &eigenvalues,
        p,
        config.galerkin_quadrature_points,
    );
    let outcome = system
        .solve(&mut solution, &assembler)
        .map_err(|err| eyre!("stochastic Galerkin solve failed: {}", err))?;
    if !outcome.converged {
        warn!("Stochastic Galerkin system did not converge");
    }

    let alphas = coefficients_for_quantity_of_interest(&solution, &sg_fields);
    info!("Chaos coefficients of the quantity of interest: {:?}", alphas);
    let data = StochasticData::compute(&alphas, p, m, config.moments)?;
    data.log_summary();
    let histogram = histogram_pdf(&alphas, p, m, &data, &config.histogram);

    std::fs::create_dir_all(&args.output)
        .wrap_err_with(|| format!("failed to create output directory {}", args.output.display()))?;
    write_stochastic_data(&args.output.join("stochastic_data.txt"), &data, &histogram)?;
    write_pdf_table(&args.output.join("pdf.txt"), &data, &histogram)?;
    VtkWriter::new(&solution).write(&args.output, "biquadratic", &["All"], 0)?;
    Ok(())
}

fn write_stochastic_data(path: &Path, data: &StochasticData, histogram: &Histogram) -> eyre::Result<()> {
    let file = File::create(path).wrap_err_with(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    let row = |values: &[f64]| values.iter().map(|v| format!("{:.14e}", v)).collect::<Vec<_>>().join(" ");
    writeln!(out, "mean {:.14e}", data.mean)?;
    writeln!(out, "variance {:.14e}", data.variance)?;
    writeln!(out, "std_deviation {:.14e}", data.std_deviation)?;
    writeln!(out, "moments {}", row(&data.moments))?;
    writeln!(out, "standardized_moments {}", row(&data.standardized_moments))?;
    writeln!(out, "cumulants {}", row(&data.cumulants))?;
    writeln!(out, "standardized_cumulants {}", row(&data.standardized_cumulants))?;
    writeln!(out, "monte_carlo_moments {}", row(&histogram.monte_carlo_moments))?;
    writeln!(
        out,
        "monte_carlo_standardized_moments {}",
        row(&histogram.monte_carlo_standardized_moments)
    )?;
    writeln!(out, "monte_carlo_variance {:.14e}", histogram.monte_carlo_variance)?;
    out.flush()?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// One row per bin: centre, histogram, KDE, Gaussian, Gram-Charlier and Edgeworth partial sums.
fn write_pdf_table(path: &Path, data: &StochasticData, histogram: &Histogram) -> eyre::Result<()> {
    let file = File::create(path).wrap_err_with(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    let gc_terms = data.moments.len().min(MAX_GRAM_CHARLIER_TERMS);
    let edgeworth_terms = data.moments.len().min(MAX_EDGEWORTH_TERMS);
    for ((&t, pdf), kde) in histogram.centers.iter().zip(&histogram.pdf).zip(&histogram.kde) {
        write!(out, "{} {} {} {}", t, pdf, kde, gaussian(t))?;
        for terms in 1..=gc_terms {
            write!(out, " {}", gram_charlier(t, &data.standardized_cumulants, terms))?;
        }
        for terms in 1..=edgeworth_terms {
            write!(out, " {}", edgeworth(t, &data.cumulants, data.std_deviation, terms))?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    info!("Wrote {}", path.display());
    Ok(())
}
