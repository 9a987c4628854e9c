//! Driver for the external field-line tracer (`heatlaminar_mpi`).
//!
//! The driver writes the tracer's points, control and perturbation files,
//! runs the tracer to completion and parses the per-point connection length
//! and minimum flux label it reports.

mod model;
mod parser;
mod process;

pub use model::ControlFile;
pub use process::{TraceProcess, TracerInvocation};

use super::serialization::write_text_artifact;
use super::traits::CalibrationTracer;
use crate::common::config::{DriverConfig, PerturbationSource, PlasmaConfig};
use crate::common::constants::{
    CALIBRATION_POINTS_STEM, CALIBRATION_TRACE_PROCESSES, CONTROL_FILE_STEM, MAX_TRACE_PROCESSES,
    PERTURBATION_FILE_NAME, POINTS_FILE_STEM, RESULT_FILE_PREFIX, TRACER_LOG_PATTERN,
    TRACER_MASTER_LOG_MARKER,
};
use crate::domain::{
    BoundaryBox, CadExtent, DivertorSide, DriverState, Heat3dError, Heat3dResult, PointSet,
    TracePoint, TraceResult,
};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use model::{render_control_file, render_perturbation_file, render_points_file};
use parser::{parse_perturbation_file, read_laminar_file};
use process::{locate_program, remove_matching, tracer_completed};

fn tagged_name(stem: &str, tag: &str) -> String {
    if tag.is_empty() {
        format!("{}.dat", stem)
    } else {
        format!("{}_{}.dat", stem, tag)
    }
}

pub fn points_file_name(tag: &str) -> String {
    tagged_name(POINTS_FILE_STEM, tag)
}

pub fn control_file_name(tag: &str) -> String {
    tagged_name(CONTROL_FILE_STEM, tag)
}

/// `lam_<tag>.dat`; the tracer appends the tag verbatim, so an empty tag
/// gives `lam_.dat`.
pub fn result_file_name(tag: &str) -> String {
    format!("{}{}.dat", RESULT_FILE_PREFIX, tag)
}

/// Reads a tracer result table (`lam_<tag>.dat`) written by an earlier run.
pub fn load_trace_result(path: &Path) -> Heat3dResult<TraceResult> {
    read_laminar_file(path)
}

#[derive(Debug)]
pub struct FieldLineTraceDriver {
    config: DriverConfig,
    plasma: PlasmaConfig,
    perturbations: Vec<PerturbationSource>,
    boundary: Option<BoundaryBox>,
    points: Vec<TracePoint>,
    result: Option<TraceResult>,
    state: DriverState,
}

impl FieldLineTraceDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            plasma: PlasmaConfig::default(),
            perturbations: vec![PerturbationSource::unscaled_default()],
            boundary: None,
            points: Vec::new(),
            result: None,
            state: DriverState::Unconfigured,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn plasma(&self) -> &PlasmaConfig {
        &self.plasma
    }

    pub fn perturbations(&self) -> &[PerturbationSource] {
        &self.perturbations
    }

    pub fn boundary(&self) -> Option<&BoundaryBox> {
        self.boundary.as_ref()
    }

    pub fn points(&self) -> &[TracePoint] {
        &self.points
    }

    pub fn result(&self) -> Option<&TraceResult> {
        self.result.as_ref()
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Validates and stores the tracer control parameters. Perturbation
    /// sources carried by `plasma` replace the current ones.
    pub fn set_control_parameters(&mut self, plasma: PlasmaConfig) -> Heat3dResult<()> {
        plasma.validate()?;
        if !plasma.perturbations.is_empty() {
            self.set_perturbation_sources(plasma.perturbations.clone())?;
        }
        self.plasma = plasma;
        Ok(())
    }

    /// An empty list selects the single unscaled, unshifted default source.
    pub fn set_perturbation_sources(
        &mut self,
        sources: Vec<PerturbationSource>,
    ) -> Heat3dResult<()> {
        if sources.is_empty() {
            self.perturbations = vec![PerturbationSource::unscaled_default()];
            return Ok(());
        }
        if let Some(source) = sources.iter().find(|source| {
            source.path.trim().is_empty() || !source.scale.is_finite() || !source.phase.is_finite()
        }) {
            return Err(Heat3dError::config(
                "CONFIG.PERTURBATION_SOURCE",
                format!("invalid perturbation source {:?}", source),
            ));
        }
        self.perturbations = sources;
        Ok(())
    }

    /// Loads `m3dc1sup.in` from the input directory when present; a missing
    /// or empty file leaves the default source in place.
    pub fn read_supplemental_perturbations(&mut self) -> Heat3dResult<&[PerturbationSource]> {
        let input_dir = self.config.input_dir().to_path_buf();
        let path = input_dir.join(PERTURBATION_FILE_NAME);
        if !path.is_file() {
            info!(path = %path.display(), "perturbation file not found, using default source");
            self.set_perturbation_sources(Vec::new())?;
            return Ok(&self.perturbations);
        }
        let source = fs::read_to_string(&path).map_err(|source| {
            Heat3dError::io_system(
                "IO.PERTURBATION_READ",
                format!("failed to read '{}': {}", path.display(), source),
            )
        })?;
        let sources = parse_perturbation_file(&source, &input_dir)?;
        if sources.is_empty() {
            warn!(path = %path.display(), "perturbation file lists no sources, using default");
        } else {
            info!(path = %path.display(), count = sources.len(), "perturbation file read successfully");
        }
        self.set_perturbation_sources(sources)?;
        Ok(&self.perturbations)
    }

    pub fn set_boundary_box(
        &mut self,
        wall: &[[f64; 2]],
        cad: &CadExtent,
    ) -> Heat3dResult<BoundaryBox> {
        let boundary = BoundaryBox::from_sources(wall, cad)?;
        debug!(bounds = %boundary.launch_argument(), "tracer boundary box set");
        self.boundary = Some(boundary);
        if self.state == DriverState::Unconfigured {
            self.state = DriverState::Configured;
        }
        Ok(boundary)
    }

    /// Replaces the sample points; any loaded result becomes stale.
    pub fn update_points(&mut self, points: PointSet) -> Heat3dResult<usize> {
        if self.state == DriverState::Unconfigured {
            return Err(Heat3dError::config(
                "CONFIG.DRIVER_STATE",
                "set the boundary box before loading trace points",
            ));
        }
        let points = points.into_trace_points()?;
        if points.is_empty() {
            return Err(Heat3dError::config(
                "CONFIG.POINTS_EMPTY",
                "trace point set is empty",
            ));
        }
        self.points = points;
        self.result = None;
        self.state = DriverState::PointsLoaded;
        Ok(self.points.len())
    }

    pub fn write_control_file(&self, tag: &str) -> Heat3dResult<PathBuf> {
        self.write_control_file_in(&self.config.work_dir, tag)
    }

    pub fn write_perturbation_file(&self) -> Heat3dResult<PathBuf> {
        let path = self.config.work_dir.join(PERTURBATION_FILE_NAME);
        write_text_artifact(&path, &render_perturbation_file(&self.perturbations))?;
        debug!(path = %path.display(), "perturbation file written");
        Ok(path)
    }

    pub fn write_points_file(&self, tag: &str) -> Heat3dResult<PathBuf> {
        let path = self.config.work_dir.join(points_file_name(tag));
        write_text_artifact(&path, &render_points_file(&self.points))?;
        debug!(path = %path.display(), count = self.points.len(), "points file written");
        Ok(path)
    }

    fn write_control_file_in(&self, directory: &Path, tag: &str) -> Heat3dResult<PathBuf> {
        let path = directory.join(control_file_name(tag));
        let content = render_control_file(
            self.config.shot,
            self.config.time,
            &self.config.gfile_path(),
            &self.plasma,
        );
        write_text_artifact(&path, &content)?;
        debug!(path = %path.display(), "control file written");
        Ok(path)
    }

    /// Writes all tracer inputs, runs the tracer to completion (restarting it
    /// once if it ends prematurely) and parses `lam_<tag>.dat`.
    pub fn launch(&mut self, process_count: usize, tag: &str) -> Heat3dResult<&TraceResult> {
        let boundary = self.boundary.ok_or_else(|| {
            Heat3dError::config(
                "CONFIG.BOUNDARY_UNSET",
                "boundary box must be set before launching the tracer",
            )
        })?;
        if self.points.is_empty() {
            return Err(Heat3dError::config(
                "CONFIG.POINTS_EMPTY",
                "no trace points loaded; call update_points before launching",
            ));
        }
        let process_count = self.clamp_process_count(process_count);
        let executable = self.locate_tracer()?;

        self.write_control_file(tag)?;
        self.write_perturbation_file()?;
        self.write_points_file(tag)?;

        let mut invocation = TracerInvocation::new(
            &self.config,
            process_count,
            vec![
                "-P".to_string(),
                points_file_name(tag),
                "-B".to_string(),
                boundary.launch_argument(),
                control_file_name(tag),
                tag.to_string(),
            ],
        );
        if self.config.launcher.is_none() {
            invocation.program = executable.display().to_string();
        }

        info!(process_count, tag, points = self.points.len(), "launching 3D field line tracing");
        let previous = self.state;
        self.state = DriverState::Launched;
        let work_dir = self.config.work_dir.clone();
        let outcome = self
            .run_tracer(&invocation, &work_dir, &work_dir.join(result_file_name(tag)))
            .and_then(|()| self.load_result(&work_dir.join(result_file_name(tag))));
        match outcome {
            Ok(()) => {
                info!(tag, "3D field line tracing complete");
                self.result
                    .as_ref()
                    .ok_or_else(|| Heat3dError::internal("SYS.DRIVER_RESULT", "result missing after load"))
            }
            Err(error) => {
                self.state = previous;
                Err(error)
            }
        }
    }

    /// Reads `lam_<tag>.dat` from the work directory. On failure the previous
    /// result and state are kept.
    pub fn parse_result(&mut self, tag: &str) -> Heat3dResult<&TraceResult> {
        let path = self.config.work_dir.join(result_file_name(tag));
        self.load_result(&path)?;
        self.result
            .as_ref()
            .ok_or_else(|| Heat3dError::internal("SYS.DRIVER_RESULT", "result missing after load"))
    }

    /// Copies control, perturbation and result files of an earlier run from
    /// `path` into the work directory, then parses the result.
    pub fn copy_and_read(&mut self, path: &Path, tag: &str) -> Heat3dResult<&TraceResult> {
        let same_directory = match (fs::canonicalize(path), fs::canonicalize(&self.config.work_dir)) {
            (Ok(source), Ok(target)) => source == target,
            _ => false,
        };
        if !same_directory {
            for name in [
                control_file_name(tag),
                PERTURBATION_FILE_NAME.to_string(),
                result_file_name(tag),
            ] {
                let source = path.join(&name);
                if !source.is_file() {
                    warn!(path = %source.display(), "file not found, not copied");
                    continue;
                }
                let target = self.config.work_dir.join(&name);
                fs::copy(&source, &target).map_err(|error| {
                    Heat3dError::io_system(
                        "IO.COPY",
                        format!(
                            "failed to copy '{}' to '{}': {}",
                            source.display(),
                            target.display(),
                            error
                        ),
                    )
                })?;
            }
        }
        info!(path = %path.join(result_file_name(tag)).display(), "loading laminar data from earlier run");
        self.parse_result(tag)
    }

    /// `true` where the tracer could not compute psimin.
    pub fn check_valid_output(&self) -> Heat3dResult<Vec<bool>> {
        let result = self.result.as_ref().ok_or_else(|| {
            Heat3dError::config("CONFIG.DRIVER_STATE", "no trace result loaded")
        })?;
        let invalid = result.invalid_mask();
        info!(
            invalid = result.invalid_count(),
            total = result.len(),
            "points for which the tracer could not compute psimin"
        );
        Ok(invalid)
    }

    /// Removes tracer `log*` files from the work directory.
    pub fn clean_up(&self) -> Heat3dResult<usize> {
        let removed = remove_matching(&self.config.work_dir, TRACER_LOG_PATTERN)?;
        debug!(removed, "tracer log files removed");
        Ok(removed)
    }

    pub fn describe(&self) -> String {
        let mut summary = String::new();
        let _ = writeln!(summary, "# Equilibrium");
        let _ = writeln!(summary, "shot = {}", self.config.shot);
        let _ = writeln!(summary, "time = {}", self.config.time);
        let _ = writeln!(summary, "gFile = {}", self.config.gfile_path().display());
        let _ = writeln!(summary, "cwd = {}", self.config.work_dir.display());
        let _ = writeln!(summary, "# Tracer");
        let _ = writeln!(summary, "itt = {}", self.plasma.itt);
        let _ = writeln!(summary, "useIcoil = {}", self.plasma.use_icoil);
        let _ = writeln!(summary, "sigma = {}", self.plasma.sigma);
        let _ = writeln!(summary, "charge = {}", self.plasma.charge);
        let _ = writeln!(summary, "Ekin = {}", self.plasma.ekin);
        let _ = writeln!(summary, "Lambda = {}", self.plasma.lambda);
        let _ = writeln!(summary, "Mass = {}", self.plasma.mass);
        let _ = writeln!(summary, "MapDirection = {}", self.plasma.map_direction);
        let _ = writeln!(summary, "# Boundary box");
        match &self.boundary {
            Some(boundary) => {
                let _ = writeln!(summary, "Rmin = {}", boundary.r_min);
                let _ = writeln!(summary, "Rmax = {}", boundary.r_max);
                let _ = writeln!(summary, "Zmin = {}", boundary.z_min);
                let _ = writeln!(summary, "Zmax = {}", boundary.z_max);
            }
            None => {
                let _ = writeln!(summary, "unset");
            }
        }
        let _ = writeln!(summary, "# Perturbations");
        let _ = writeln!(summary, "response = {}", self.plasma.response);
        let _ = writeln!(summary, "selectField = {}", self.plasma.select_field);
        for (index, source) in self.perturbations.iter().enumerate() {
            let _ = writeln!(
                summary,
                "File {} = {} (scale {}, phase {})",
                index + 1,
                source.path,
                source.scale,
                source.phase
            );
        }
        let _ = writeln!(summary, "state = {}", self.state);
        summary
    }

    fn clamp_process_count(&self, requested: usize) -> usize {
        let limit = self.config.max_processes.clamp(1, MAX_TRACE_PROCESSES);
        let clamped = requested.clamp(1, limit);
        if clamped != requested {
            debug!(requested, clamped, "tracer process count clamped");
        }
        clamped
    }

    fn locate_tracer(&self) -> Heat3dResult<PathBuf> {
        let work_dir = &self.config.work_dir;
        let environment = &self.config.environment;
        if let Some(launcher) = &self.config.launcher {
            if locate_program(launcher, work_dir, environment).is_none() {
                return Err(Heat3dError::launch(
                    "LAUNCH.EXECUTABLE",
                    format!("launcher '{}' was not found", launcher),
                ));
            }
        }
        locate_program(&self.config.executable, work_dir, environment).ok_or_else(|| {
            Heat3dError::launch(
                "LAUNCH.EXECUTABLE",
                format!("tracer executable '{}' was not found", self.config.executable),
            )
        })
    }

    fn run_tracer(
        &self,
        invocation: &TracerInvocation,
        directory: &Path,
        result_path: &Path,
    ) -> Heat3dResult<()> {
        remove_matching(directory, &format!("*{}", TRACER_MASTER_LOG_MARKER))?;
        if result_path.is_file() {
            fs::remove_file(result_path).map_err(|source| {
                Heat3dError::io_system(
                    "IO.REMOVE",
                    format!("failed to remove stale '{}': {}", result_path.display(), source),
                )
            })?;
        }

        let attempts = if self.config.restart_on_failure { 2 } else { 1 };
        for attempt in 1..=attempts {
            let status = TraceProcess::spawn(invocation, directory, &self.config.environment)?
                .wait()?;
            if !status.success() {
                warn!(code = ?status.code(), attempt, "tracer exited with failure status");
            }
            if result_path.is_file() && tracer_completed(directory)? {
                return Ok(());
            }
            if attempt < attempts {
                warn!("tracer run ended prematurely, attempting restart");
            }
        }

        if !result_path.is_file() {
            return Err(Heat3dError::launch(
                "LAUNCH.NO_RESULT",
                format!(
                    "tracer produced no result file '{}' after {} attempt(s)",
                    result_path.display(),
                    attempts
                ),
            ));
        }
        warn!(
            path = %result_path.display(),
            "tracer did not report normal termination, using result as written"
        );
        Ok(())
    }

    fn load_result(&mut self, path: &Path) -> Heat3dResult<()> {
        let result = read_laminar_file(path)?;
        if !self.points.is_empty() && result.len() != self.points.len() {
            return Err(Heat3dError::parse(
                "PARSE.LAMINAR_COUNT",
                format!(
                    "tracer output '{}' has {} rows but {} points were submitted",
                    path.display(),
                    result.len(),
                    self.points.len()
                ),
            ));
        }
        let invalid = result.invalid_count();
        if invalid > 0 {
            warn!(invalid, total = result.len(), "tracer could not compute psimin for some points");
        }
        self.result = Some(result);
        self.state = DriverState::ResultLoaded;
        Ok(())
    }
}

impl CalibrationTracer for FieldLineTraceDriver {
    /// Traces the midplane calibration line into `lam_<side>_mp.dat` in the
    /// input directory. An existing result file is reused.
    fn trace_calibration_line(
        &mut self,
        side: DivertorSide,
        r: &[f64],
        z: f64,
    ) -> Heat3dResult<Vec<f64>> {
        let tag = side.midplane_tag();
        let directory = self.config.input_dir().to_path_buf();
        let result_path = directory.join(result_file_name(tag));

        if result_path.is_file() {
            info!(path = %result_path.display(), "reusing cached midplane calibration trace");
        } else {
            let executable = self.locate_tracer()?;
            let points: Vec<TracePoint> = r.iter().map(|&r| TracePoint::new(r, 0.0, z)).collect();
            let points_name = tagged_name(CALIBRATION_POINTS_STEM, tag);
            write_text_artifact(&directory.join(&points_name), &render_points_file(&points))?;
            self.write_control_file_in(&directory, tag)?;
            let perturbation_path = directory.join(PERTURBATION_FILE_NAME);
            if !perturbation_path.is_file() {
                write_text_artifact(
                    &perturbation_path,
                    &render_perturbation_file(&self.perturbations),
                )?;
            }

            let mut args = vec!["-P".to_string(), points_name];
            if let Some(boundary) = &self.boundary {
                args.push("-B".to_string());
                args.push(boundary.launch_argument());
            }
            args.push(control_file_name(tag));
            args.push(tag.to_string());
            let process_count = self.clamp_process_count(CALIBRATION_TRACE_PROCESSES);
            let mut invocation = TracerInvocation::new(&self.config, process_count, args);
            if self.config.launcher.is_none() {
                invocation.program = executable.display().to_string();
            }

            info!(side = %side, samples = r.len(), "tracing midplane calibration line");
            self.run_tracer(&invocation, &directory, &result_path)?;
            remove_matching(&directory, TRACER_LOG_PATTERN)?;
        }

        let result = read_laminar_file(&result_path)?;
        if result.len() != r.len() {
            return Err(Heat3dError::parse(
                "PARSE.LAMINAR_COUNT",
                format!(
                    "calibration output '{}' has {} rows, expected {}",
                    result_path.display(),
                    result.len(),
                    r.len()
                ),
            ));
        }
        Ok(result.psimin)
    }
}
