use super::CliError;
use super::helpers::*;
use heat3d_core::common::config::{HeatFluxModelKind, InputEntries};
use heat3d_core::common::constants::MAX_TRACE_PROCESSES;
use heat3d_core::modules::{
    load_trace_result, FieldLineTraceDriver, HeatFluxModel, ProfileEvaluator, ProfileSpec,
    SampledEquilibrium,
};
use heat3d_core::numerics::linear_grid;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(clap::Args)]
pub(super) struct TraceArgs {
    /// Directory the tracer runs in (default: current directory)
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Directory holding m3dc1sup.in and profile files (default: work dir)
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Driver settings as JSON (launcher, executable, shot, time, ...)
    #[arg(long)]
    driver_config: Option<PathBuf>,

    /// HEAT input file or JSON with the tracer control parameters
    #[arg(long)]
    input: Option<PathBuf>,

    /// Equilibrium JSON supplying the wall polygon
    #[arg(long)]
    equilibrium: PathBuf,

    /// CAD extent as Rmin,Rmax,Zmin,Zmax in m
    #[arg(long)]
    cad_extent: String,

    /// Points file with `R phi Z` rows
    #[arg(long)]
    points: PathBuf,

    /// Requested tracer processes
    #[arg(long, default_value_t = MAX_TRACE_PROCESSES)]
    processes: usize,

    /// Run tag appended to the tracer file names
    #[arg(long, default_value = "")]
    tag: String,

    /// Read the result of an earlier run from this directory instead of tracing
    #[arg(long)]
    reuse: Option<PathBuf>,

    /// Print the driver settings before running
    #[arg(long)]
    describe: bool,
}

#[derive(clap::Args)]
pub(super) struct HeatfluxArgs {
    /// Equilibrium JSON
    #[arg(long)]
    equilibrium: PathBuf,

    /// HEAT input file or JSON with the heat-flux settings
    #[arg(long)]
    input: Option<PathBuf>,

    /// Tracer result table (lam_<tag>.dat)
    #[arg(long)]
    laminar: PathBuf,

    /// Overrides the model tag from the input file
    #[arg(long)]
    model: Option<String>,

    /// PFC divertor code ('O...' outer, 'I...' inner)
    #[arg(long, default_value = "O")]
    divertor_code: String,

    /// Fraction of the SOL power this component receives
    #[arg(long, default_value_t = 1.0)]
    power_fraction: f64,

    /// Directory holding profile files and midplane calibration traces
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Trace the midplane calibration line with the field-line tracer
    #[arg(long)]
    trace_calibration: bool,

    /// Driver settings as JSON, used with --trace-calibration
    #[arg(long)]
    driver_config: Option<PathBuf>,

    /// Tracer control parameters for --trace-calibration (default: --input
    /// when it is a HEAT input file)
    #[arg(long)]
    plasma_input: Option<PathBuf>,

    /// Output file with one `q good pfr` row per point
    #[arg(long)]
    output: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct ProfileArgs {
    /// Profile value as written in a HEAT input file: a number, `[a b c]` or a file name
    #[arg(long)]
    spec: String,

    /// Treat a scalar as a constant (density) instead of a pedestal top
    #[arg(long)]
    constant: bool,

    /// Comma-separated psiN values (default: 0 to 1.2 in 13 steps)
    #[arg(long)]
    psi: Option<String>,

    /// Directory relative profile files are resolved against
    #[arg(long)]
    input_dir: Option<PathBuf>,
}

pub(super) fn run_trace_command(args: TraceArgs) -> Result<i32, CliError> {
    let work_dir = match &args.work_dir {
        Some(path) => path.clone(),
        None => current_working_dir()?,
    };
    let mut config = load_driver_config(
        args.driver_config.as_deref(),
        &work_dir,
        args.input_dir.as_deref(),
    )?;
    let plasma = load_plasma_config(args.input.as_deref())?;
    if let Some(input) = args.input.as_deref().filter(|path| !is_json_path(path)) {
        config.apply_input_entries(&InputEntries::read(input)?)?;
    }
    let equilibrium = SampledEquilibrium::load(&args.equilibrium)?;
    let cad = parse_cad_extent(&args.cad_extent)?;

    let mut driver = FieldLineTraceDriver::new(config);
    driver.set_control_parameters(plasma)?;
    driver.read_supplemental_perturbations()?;
    driver.set_boundary_box(&equilibrium.wall, &cad)?;
    driver.update_points(read_points_file(&args.points)?)?;
    if args.describe {
        print!("{}", driver.describe());
    }

    let result = match &args.reuse {
        Some(directory) => driver.copy_and_read(directory, &args.tag)?,
        None => driver.launch(args.processes, &args.tag)?,
    };
    println!("points: {}", result.len());
    println!("invalid: {}", result.invalid_count());
    driver.clean_up()?;
    Ok(0)
}

pub(super) fn run_heatflux_command(args: HeatfluxArgs) -> Result<i32, CliError> {
    let mut config = load_heatflux_config(args.input.as_deref())?;
    if let Some(tag) = &args.model {
        config.model = Some(HeatFluxModelKind::from_tag(tag)?);
    }
    let equilibrium = SampledEquilibrium::load(&args.equilibrium)?;
    let input_dir = match args.input_dir.clone() {
        Some(path) => path,
        None => current_working_dir()?,
    };
    let trace = load_trace_result(&args.laminar)?;

    let mut model = HeatFluxModel::new(config, equilibrium, input_dir.clone())?;
    if args.trace_calibration {
        let driver = calibration_driver(&args, &input_dir)?;
        model = model.with_calibration_tracer(Box::new(driver));
    }
    model.update_laminar_data(trace);
    let field = model.heatflux(&args.divertor_code, args.power_fraction)?;
    write_flux_field(&args.output, &field)?;

    info!(path = %args.output.display(), points = field.len(), "heat flux written");
    println!("points: {}", field.len());
    println!("scale: {}", field.scale);
    println!("peak: {}", field.peak());
    Ok(0)
}

/// Driver for midplane calibration traces, configured like a `trace` run.
fn calibration_driver(
    args: &HeatfluxArgs,
    input_dir: &Path,
) -> Result<FieldLineTraceDriver, CliError> {
    let mut config = load_driver_config(args.driver_config.as_deref(), input_dir, Some(input_dir))?;
    let heat_input = args.input.as_deref().filter(|path| !is_json_path(path));
    let plasma = load_plasma_config(args.plasma_input.as_deref().or(heat_input))?;
    if let Some(input) = heat_input {
        config.apply_input_entries(&InputEntries::read(input)?)?;
    }
    let mut driver = FieldLineTraceDriver::new(config);
    driver.set_control_parameters(plasma)?;
    driver.read_supplemental_perturbations()?;
    Ok(driver)
}

pub(super) fn run_profile_command(args: ProfileArgs) -> Result<i32, CliError> {
    let scalar: fn(f64) -> ProfileSpec = if args.constant {
        ProfileSpec::Constant
    } else {
        ProfileSpec::ScalarPedestal
    };
    let spec = ProfileSpec::from_input_value(&args.spec, scalar)?;
    let input_dir = match args.input_dir {
        Some(path) => path,
        None => current_working_dir()?,
    };
    let profile = ProfileEvaluator::resolve(&spec, &input_dir)?;
    let psi = match &args.psi {
        Some(raw) => parse_float_list(raw, "--psi")?,
        None => linear_grid(0.0, 1.2, 13)
            .ok_or_else(|| CliError::Usage("default psi grid could not be built".to_string()))?,
    };

    println!("# {}", profile.spec());
    for (point, value) in psi.iter().zip(profile.evaluate_many(&psi)) {
        println!("{}\t{}", point, value);
    }
    Ok(0)
}
