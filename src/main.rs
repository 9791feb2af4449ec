use clap::Parser;
use fech_rs::config::SimulationConfig;
use fech_rs::discretization::generator::create_emitter_meshes;
use fech_rs::discretization::mesh::{BoundaryId, FACE_VERTICES, Mesh};
use fech_rs::models::currents_heating::CurrentsAndHeating;
use fech_rs::models::laplace::LaplaceSolver;
use fech_rs::numerics::timing;
use fech_rs::numerics::transient::TransientDriver;
use fech_rs::physics::quantities::PhysicalQuantities;
use fech_rs::processing::csv_writer;
use fech_rs::processing::summary::SimulationSummary;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Transient field-emission heating of a conductor block.
#[derive(Parser, Debug)]
#[command(name = "fech-rs")]
#[command(about = "Couple emission currents and Joule/Nottingham heating in a field emitter")]
struct Args {
    /// JSON run configuration; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of timesteps, overriding the configuration
    #[arg(short, long)]
    steps: Option<usize>,

    /// Output directory, overriding the configuration
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fech_rs=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    init_logging();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match SimulationConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                process::exit(1);
            }
        },
        None => SimulationConfig::default(),
    };
    if let Some(steps) = args.steps {
        config.n_steps = steps;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }

    let out = config.output_dir.clone();
    if let Err(e) = fs::create_dir_all(out.join("tables")) {
        error!(dir = %out.display(), "cannot create output directory: {e}");
        process::exit(1);
    }

    let m = &config.mesh;
    let (conductor, vacuum) = create_emitter_meshes(
        m.width,
        m.conductor_height,
        m.vacuum_height,
        m.nx,
        m.ny_conductor,
        m.ny_vacuum,
    );
    info!(
        conductor_cells = conductor.cells.len(),
        vacuum_cells = vacuum.cells.len(),
        "meshes created"
    );

    let pq = match load_physical_quantities(&config) {
        Ok(pq) => pq,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };
    pq.output_to_files(out.join("tables"));

    let mut summary = SimulationSummary::from_problem(&conductor, &config);
    let mut model = CurrentsAndHeating::new(conductor, pq, config.time_step)
        .with_time_integration(config.time_integration);

    if config.map_vacuum_field {
        let mut laplace = LaplaceSolver::new(vacuum, config.mesh.anode_voltage);
        laplace.assemble();
        if let Err(e) = laplace.solve(&config.current_solver) {
            error!("vacuum potential solve failed: {e}");
            process::exit(1);
        }
        let report = model.set_electric_field_from_source(laplace.mesh(), laplace.solution());
        summary.add_mapping_info(&report);
    } else {
        model.set_uniform_electric_field(config.uniform_field);
    }

    let driver = TransientDriver {
        n_steps: config.n_steps,
        current_control: config.current_solver,
        heat_control: config.heat_solver,
    };

    timing::reset_timing();
    let start = Instant::now();

    println!(
        "{:>6} {:>12} {:>8} {:>8} {:>14} {:>14}",
        "step", "time [s]", "it(J)", "it(T)", "max T [K]", "max P [W/nm3]"
    );
    let run = driver.run(&mut model, |report, _| {
        println!(
            "{:>6} {:>12.4e} {:>8} {:>8} {:>14.6} {:>14.4e}",
            report.step,
            report.time,
            report.current.iterations,
            report.heat.iterations,
            report.max_temperature,
            report.max_heating_power
        );
    });
    let reports = match run {
        Ok(reports) => reports,
        Err(e) => {
            error!("transient run aborted: {e}");
            process::exit(1);
        }
    };

    timing::finalize_and_print(start.elapsed());

    summary.add_run_info(&reports);
    if let Err(e) = csv_writer::write_step_log(out.join("steps.csv"), &reports) {
        warn!("cannot write step log: {e}");
    }
    save_surface_temperature(&model, &out.join("surface_temperature.csv"));
    model.output_results_current(out.join("current.vtk"));
    model.output_results_heating(out.join("heating.vtk"));

    let summary_path = out.join("simulation_summary.txt");
    if let Err(e) = summary.write_to_file(&summary_path) {
        warn!("cannot write summary: {e}");
    }
    summary.print_to_console();
    println!("Summary saved to {}", summary_path.display());
}

fn load_physical_quantities(
    config: &SimulationConfig,
) -> Result<PhysicalQuantities, fech_rs::physics::interpolation::TableError> {
    let mut pq = PhysicalQuantities::with_reference_data(config.material);
    if let Some(path) = &config.tables.resistivity {
        pq.load_resistivity_data(path)?;
        info!(path = %path.display(), "resistivity table loaded");
    }
    if let Some(path) = &config.tables.emission {
        pq.load_emission_data(path)?;
        info!(path = %path.display(), "emission table loaded");
    }
    if let Some(path) = &config.tables.nottingham {
        pq.load_nottingham_data(path)?;
        info!(path = %path.display(), "Nottingham table loaded");
    }
    Ok(pq)
}

/// Temperature along the emitting surface, averaged over each face's end points.
fn save_surface_temperature(model: &CurrentsAndHeating, path: &Path) {
    let mesh: &Mesh = model.mesh();
    let (x, temperature): (Vec<f64>, Vec<f64>) = mesh
        .boundary_faces(BoundaryId::Surface)
        .map(|key| {
            let [a, b] = FACE_VERTICES[key.face];
            let t = model.get_temperature(&[(key.cell, a), (key.cell, b)]);
            let centroid = mesh.face_centroid(&mesh.cells[key.cell], key.face);
            (centroid.x, 0.5 * (t[0] + t[1]))
        })
        .unzip();

    if let Err(e) = csv_writer::write_xy(path, "x", "temperature", &x, &temperature) {
        warn!("cannot write surface temperature: {e}");
    }
}
