//! External tracer process handling.

use crate::common::config::DriverConfig;
use crate::common::constants::{TRACER_MASTER_LOG_MARKER, TRACER_SUCCESS_MARKER};
use crate::domain::{Heat3dError, Heat3dResult};
use globset::{Glob, GlobMatcher};
use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use tracing::{debug, info};

/// Program plus arguments for one tracer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracerInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl TracerInvocation {
    /// `[launcher -n N] executable <tracer_args...>`
    pub fn new(config: &DriverConfig, process_count: usize, tracer_args: Vec<String>) -> Self {
        match &config.launcher {
            Some(launcher) => {
                let mut args = vec![
                    "-n".to_string(),
                    process_count.to_string(),
                    config.executable.clone(),
                ];
                args.extend(tracer_args);
                Self {
                    program: launcher.clone(),
                    args,
                }
            }
            None => Self {
                program: config.executable.clone(),
                args: tracer_args,
            },
        }
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Handle on a running tracer.
#[derive(Debug)]
pub struct TraceProcess {
    child: Child,
    command_line: String,
}

impl TraceProcess {
    pub fn spawn(
        invocation: &TracerInvocation,
        work_dir: &Path,
        environment: &BTreeMap<String, String>,
    ) -> Heat3dResult<Self> {
        let command_line = invocation.command_line();
        info!(command = %command_line, cwd = %work_dir.display(), "launching field line tracer");
        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(environment)
            .current_dir(work_dir)
            .spawn()
            .map_err(|source| {
                if source.kind() == ErrorKind::NotFound {
                    Heat3dError::launch(
                        "LAUNCH.EXECUTABLE",
                        format!("tracer program '{}' was not found", invocation.program),
                    )
                } else {
                    Heat3dError::launch(
                        "LAUNCH.SPAWN",
                        format!("failed to start '{}': {}", command_line, source),
                    )
                }
            })?;
        Ok(Self {
            child,
            command_line,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// `None` while the tracer is still running.
    pub fn try_wait(&mut self) -> Heat3dResult<Option<ExitStatus>> {
        self.child.try_wait().map_err(|source| self.wait_error(source))
    }

    pub fn wait(mut self) -> Heat3dResult<ExitStatus> {
        let status = self.child.wait().map_err(|source| self.wait_error(source))?;
        debug!(command = %self.command_line, code = ?status.code(), "tracer exited");
        Ok(status)
    }

    fn wait_error(&self, source: std::io::Error) -> Heat3dError {
        Heat3dError::launch(
            "LAUNCH.WAIT",
            format!("failed to wait for '{}': {}", self.command_line, source),
        )
    }
}

/// Resolves `program` the way the operating system will when spawning it,
/// honoring a `PATH` override from the driver environment.
pub fn locate_program(
    program: &str,
    work_dir: &Path,
    environment: &BTreeMap<String, String>,
) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        let path = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            work_dir.join(candidate)
        };
        return path.is_file().then_some(path);
    }
    let search_path = environment
        .get("PATH")
        .map(OsString::from)
        .or_else(|| env::var_os("PATH"))?;
    env::split_paths(&search_path)
        .map(|directory| directory.join(program))
        .find(|path| path.is_file())
}

fn file_matcher(pattern: &str) -> Heat3dResult<GlobMatcher> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|source| {
            Heat3dError::internal(
                "SYS.GLOB_PATTERN",
                format!("invalid file pattern '{}': {}", pattern, source),
            )
        })
}

fn matching_files(directory: &Path, pattern: &str) -> Heat3dResult<Vec<PathBuf>> {
    let matcher = file_matcher(pattern)?;
    let entries = fs::read_dir(directory).map_err(|source| {
        Heat3dError::io_system(
            "IO.READ_DIR",
            format!("failed to list '{}': {}", directory.display(), source),
        )
    })?;
    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && entry.file_name().to_str().is_some_and(|name| matcher.is_match(name))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Deletes the files in `directory` whose names match `pattern`.
pub fn remove_matching(directory: &Path, pattern: &str) -> Heat3dResult<usize> {
    let files = matching_files(directory, pattern)?;
    for path in &files {
        fs::remove_file(path).map_err(|source| {
            Heat3dError::io_system(
                "IO.REMOVE",
                format!("failed to remove '{}': {}", path.display(), source),
            )
        })?;
    }
    Ok(files.len())
}

/// `true` when a `*_Master.dat` tracer log reports normal termination.
pub fn tracer_completed(directory: &Path) -> Heat3dResult<bool> {
    let pattern = format!("*{}", TRACER_MASTER_LOG_MARKER);
    for path in matching_files(directory, &pattern)? {
        let content = fs::read_to_string(&path).map_err(|source| {
            Heat3dError::io_system(
                "IO.TRACER_LOG",
                format!("failed to read tracer log '{}': {}", path.display(), source),
            )
        })?;
        if content.contains(TRACER_SUCCESS_MARKER) {
            return Ok(true);
        }
    }
    Ok(false)
}
