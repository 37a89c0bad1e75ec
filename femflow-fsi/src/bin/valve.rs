use clap::Parser;
use eyre::{eyre, WrapErr};
use femflow::boundary::BdcKind;
use femflow::config::load_config;
use femflow::io::vtk::VtkWriter;
use femflow::mesh::procedural::create_valve_mesh;
use femflow::mesh::procedural::valve_faces::{INLET, OUTLET};
use femflow::mesh::MultiLevelMesh;
use femflow::solution::MultiLevelSolution;
use femflow::system::{ImplicitSystem, SystemKind};
use femflow::transient::{TimeState, TransientSystem};
use femflow_fsi::assembler::{FsiAssembler, FsiFields, FSI_SYSTEM, SYSTEM_FIELDS};
use femflow_fsi::boundary::{time_interval, valve_boundary_condition};
use femflow_fsi::config::{multigrid_cycle, ValveConfig};
use femflow_fsi::convergence::ConvergenceLog;
use femflow_fsi::flux::{file_name, solution_fluxes, FluxHistory};
use femflow_fsi::mesh_motion::{set_lambda_new, store_mesh_velocity};
use log::{info, warn, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;

/// Venous valve driven by oscillating inlet and outlet pressures.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// JSON configuration file. Defaults are used for missing fields.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of the VTK, flux and convergence output.
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Number of mesh levels, overrides the configuration.
    #[arg(long)]
    levels: Option<usize>,

    /// Number of time steps, overrides the configuration.
    #[arg(long)]
    steps: Option<usize>,

    /// Restart file written by a previous run.
    #[arg(long, requires = "start_step")]
    restart: Option<PathBuf>,

    /// Step at which the restart file was written.
    #[arg(long)]
    start_step: Option<usize>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> eyre::Result<()> {
    let args = Args::parse();
    let level = args.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new().filter_level(level).init();

    let mut config: ValveConfig = load_config(args.config.as_deref())?;
    if let Some(levels) = args.levels {
        config.levels = levels;
    }
    if let Some(steps) = args.steps {
        config.steps = steps;
    }
    info!("Reynolds number: {}", config.fluid.reynolds_number(&config.parameter));
    info!("Vein: {:?}", config.vein);
    info!("Leaflet: {:?}", config.leaflet);
    info!("Fluid: {:?}", config.fluid);

    let mesh = MultiLevelMesh::new(create_valve_mesh(&config.geometry), config.levels);
    let mut solution = MultiLevelSolution::new(Arc::new(mesh));
    let fields = FsiFields::add_to(&mut solution)?;
    solution.initialize_all();
    solution.attach_boundary_condition(Arc::new(valve_boundary_condition));
    for name in SYSTEM_FIELDS {
        solution.generate_bdc(name, BdcKind::Steady)?;
    }

    let mut system = ImplicitSystem::new(FSI_SYSTEM, SystemKind::Nonlinear, &solution, &SYSTEM_FIELDS, 0)?;
    system.set_settings(config.solver.clone());
    let mut transient = TransientSystem::new(system, config.dt);
    transient.attach_time_interval(time_interval(config.dt));

    let mut first_step = 1;
    if let Some(restart) = &args.restart {
        solution.load(restart)?;
        let step = args.start_step.unwrap_or(0);
        let time = solution.time();
        transient.set_time_state(TimeState {
            time,
            dt: config.dt,
            step,
        });
        first_step = step + 1;
        info!("Restarted from {} at step {} (time {})", restart.display(), step, time);
    }

    let assembler = FsiAssembler::new(&solution, fields, config.fluid, config.vein, config.leaflet);
    let moving_mesh = ["DX", "DY"];
    {
        let mut writer = VtkWriter::new(&solution);
        writer.set_moving_mesh(&moving_mesh)?;
        writer.write(&args.output, "biquadratic", &["All"], first_step - 1)?;
    }

    let flux_path = args
        .output
        .join(file_name(config.leaflet.young, config.levels, config.dt));
    let log_path = args.output.join("convergence.csv");
    let opened = if first_step > 1 {
        let q = solution_fluxes(&solution, &fields, &[INLET, OUTLET]);
        FluxHistory::resume(&flux_path, first_step - 1, [q[0], q[1]])
            .and_then(|history| Ok((history, ConvergenceLog::append(&log_path, config.levels)?)))
    } else {
        FluxHistory::create(&flux_path)
            .and_then(|history| Ok((history, ConvergenceLog::create(&log_path, config.levels)?)))
    };
    let (mut fluxes, mut log) = match opened {
        Ok(files) => files,
        Err(err) => {
            eprintln!("Error in opening output files in {}: {:?}", args.output.display(), err);
            std::process::exit(1);
        }
    };

    for step in first_step..=config.steps {
        transient.system_mut().set_mg_type(multigrid_cycle(step));
        solution.copy_solution_to_old();
        set_lambda_new(&mut solution, &fields);

        let outcome = transient
            .solve_step(&mut solution, &assembler)
            .map_err(|err| eyre!("time step {} failed: {}", step, err))?;
        if !outcome.converged {
            warn!(
                "Step {} did not converge in {} iterations (residual {:e})",
                step, outcome.iterations, outcome.residual_norm
            );
        }
        let time = transient.time();
        log.record(time, &outcome)
            .wrap_err("failed to write the convergence log")?;
        store_mesh_velocity(&mut solution, &fields, transient.dt());

        let q = solution_fluxes(&solution, &fields, &[INLET, OUTLET]);
        fluxes.record(step, time, transient.dt(), [q[0], q[1]])?;
        info!(
            "Fluxes {} {}, volumes {:?}, total {}",
            q[0],
            q[1],
            fluxes.volumes(),
            fluxes.total_volume()
        );

        if step % config.print_interval.max(1) == 0 {
            let mut writer = VtkWriter::new(&solution);
            writer.set_moving_mesh(&moving_mesh)?;
            writer.write(&args.output, "biquadratic", &["All"], step)?;
        }
        if let Some(interval) = config.save_interval {
            if interval > 0 && step % interval == 0 {
                let path = args.output.join(format!("restart.{}.json", step));
                solution.save(&path)?;
            }
        }
    }

    info!("Wrote {} and {}", flux_path.display(), log_path.display());
    Ok(())
}
