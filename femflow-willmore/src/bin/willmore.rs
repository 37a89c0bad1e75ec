use clap::Parser;
use eyre::eyre;
use femflow::config::load_config;
use femflow::io::vtk::VtkWriter;
use femflow::mesh::procedural::create_ellipsoid;
use femflow::mesh::MultiLevelMesh;
use femflow::solution::MultiLevelSolution;
use femflow::system::{ImplicitSystem, SystemKind};
use femflow::transient::TransientSystem;
use femflow_willmore::config::WillmoreConfig;
use femflow_willmore::conformal::ConformalAssembler;
use femflow_willmore::curvature::InitYAssembler;
use femflow_willmore::energy::{p_willmore_energy, surface_measures, EnergyHistory};
use femflow_willmore::fields::{
    copy_displacement, element_near_vertex_number, WillmoreFields, CONFORMAL_FIELDS, CONFORMAL_SYSTEM,
    DISPLACEMENT_FIELDS, INIT_Y_FIELDS, INIT_Y_SYSTEM, MCF_FIELDS, MCF_SYSTEM,
};
use femflow_willmore::flow::{geometric_time_interval, PWillmoreAssembler};
use log::{info, warn, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;

/// Curvature flow of an ellipsoid with conformal reparametrization.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// JSON configuration file. Defaults are used for missing fields.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of the VTK and energy output.
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Number of mesh levels, overrides the configuration.
    #[arg(long)]
    levels: Option<usize>,

    /// Number of time steps, overrides the configuration.
    #[arg(long)]
    steps: Option<usize>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> eyre::Result<()> {
    let args = Args::parse();
    let level = args.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new().filter_level(level).init();

    let mut config: WillmoreConfig = load_config(args.config.as_deref())?;
    if let Some(levels) = args.levels {
        config.levels = levels;
    }
    if let Some(steps) = args.steps {
        config.steps = steps;
    }
    info!("Configuration: {:?}", config);

    let mut mesh = MultiLevelMesh::new(create_ellipsoid(config.semi_axes, config.subdivisions), config.levels);
    mesh.erase_coarse_levels(config.erased_levels);
    let mut solution = MultiLevelSolution::new(Arc::new(mesh));
    let fields = WillmoreFields::add_to(&mut solution)?;
    solution.initialize_all();
    element_near_vertex_number(&mut solution, &fields);

    let mut init_y = ImplicitSystem::new(INIT_Y_SYSTEM, SystemKind::Linear, &solution, &INIT_Y_FIELDS, 0)?;
    init_y.set_settings(config.solver.clone());
    let mut mcf = ImplicitSystem::new(
        MCF_SYSTEM,
        SystemKind::Nonlinear,
        &solution,
        &MCF_FIELDS,
        config.constraints.num_global_variables(),
    )?;
    mcf.set_settings(config.solver.clone());
    let mut flow = TransientSystem::new(mcf, config.dt0);
    flow.attach_time_interval(geometric_time_interval(config.dt0, config.dt_growth));
    let mut conformal = ImplicitSystem::new(CONFORMAL_SYSTEM, SystemKind::Nonlinear, &solution, &CONFORMAL_FIELDS, 0)?;
    conformal.set_settings(config.conformal_solver.clone());

    let init_y_assembler = InitYAssembler::new(fields);
    let flow_assembler = PWillmoreAssembler::new(fields, config.constraints);
    let conformal_assembler = ConformalAssembler::new(fields);

    let write_output = |solution: &MultiLevelSolution, step: usize| -> eyre::Result<()> {
        let mut writer = VtkWriter::new(solution);
        writer.set_moving_mesh(&DISPLACEMENT_FIELDS)?;
        writer.write(&args.output, "linear", &["All"], step)?;
        Ok(())
    };
    write_output(&solution, 0)?;

    copy_displacement(&mut solution, &fields, true);
    copy_displacement(&mut solution, &fields, false);
    solution.copy_solution_to_old();
    init_y
        .solve(&mut solution, &init_y_assembler)
        .map_err(|err| eyre!("initial curvature failed: {}", err))?;

    let measures = surface_measures(&solution, &fields);
    info!("Initial area {}, volume {}", measures.area, measures.volume);

    std::fs::create_dir_all(&args.output)?;
    let energy_path = args.output.join("Energy.txt");
    let mut energies = match EnergyHistory::create(&energy_path) {
        Ok(history) => history,
        Err(err) => {
            eprintln!("Error in opening file {}: {:?}", energy_path.display(), err);
            std::process::exit(1);
        }
    };

    for step in 1..=config.steps {
        solution.copy_solution_to_old();
        let outcome = flow
            .solve_step(&mut solution, &flow_assembler)
            .map_err(|err| eyre!("time step {} failed: {}", step, err))?;
        if !outcome.converged {
            warn!(
                "Step {} did not converge in {} iterations (residual {:e})",
                step, outcome.iterations, outcome.residual_norm
            );
        }
        if !flow.system().global_values().is_empty() {
            info!("Multipliers {:?}", flow.system().global_values().as_slice());
        }

        let energy = p_willmore_energy(&solution, &fields, &config.energy);
        energies.record(flow.dt(), flow.time(), energy)?;
        let measures = surface_measures(&solution, &fields);
        info!(
            "Energy {}, area {}, volume {} at time {}",
            energy,
            measures.area,
            measures.volume,
            flow.time()
        );

        if step % config.print_interval.max(1) == 0 {
            write_output(&solution, step)?;
        }

        if config.conformal {
            copy_displacement(&mut solution, &fields, true);
            conformal
                .solve(&mut solution, &conformal_assembler)
                .map_err(|err| eyre!("conformal reparametrization of step {} failed: {}", step, err))?;
            copy_displacement(&mut solution, &fields, false);
        }

        solution.copy_solution_to_old();
        init_y
            .solve(&mut solution, &init_y_assembler)
            .map_err(|err| eyre!("curvature update of step {} failed: {}", step, err))?;
    }
    Ok(())
}
