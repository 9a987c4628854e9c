//! Kinetic profiles as functions of normalized poloidal flux.

mod model;
mod parser;

use crate::domain::{Heat3dError, Heat3dResult};
use crate::numerics::{linear_grid, CubicSpline};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use tracing::info;

use model::PedestalProfile;
use parser::{read_profile_table, resolve_profile_path};

/// Upper end of the flux range a bare sample array is spread over.
pub const SAMPLE_ARRAY_PSI_MAX: f64 = 1.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ProfileSpec {
    /// Pedestal-top value of the built-in tanh pedestal profile.
    ScalarPedestal(f64),
    /// Same value everywhere.
    Constant(f64),
    /// Values evenly spaced over psi in `[0, 1.1]`.
    SampleArray(Vec<f64>),
    /// Two-column `psi value` table.
    FilePath(PathBuf),
}

impl ProfileSpec {
    /// Reads an input-file value: `[a b c]` is a sample array, a number goes
    /// through `scalar`, anything else is a file name.
    pub fn from_input_value(raw: &str, scalar: fn(f64) -> Self) -> Heat3dResult<Self> {
        let raw = raw.trim();
        if raw.contains('[') {
            let inner = raw.trim_start_matches('[').trim_end_matches(']');
            let values = inner
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|token| !token.is_empty())
                .map(|token| {
                    token.parse::<f64>().map_err(|_| {
                        Heat3dError::config(
                            "CONFIG.PROFILE_ARRAY",
                            format!("profile array entry '{}' is not a number", token),
                        )
                    })
                })
                .collect::<Heat3dResult<Vec<f64>>>()?;
            return Ok(Self::SampleArray(values));
        }
        match raw.parse::<f64>() {
            Ok(value) => Ok(scalar(value)),
            Err(_) => Ok(Self::FilePath(PathBuf::from(raw))),
        }
    }
}

impl Display for ProfileSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ScalarPedestal(top) => write!(f, "pedestal({})", top),
            Self::Constant(value) => write!(f, "constant({})", value),
            Self::SampleArray(values) => write!(f, "array[{}]", values.len()),
            Self::FilePath(path) => write!(f, "file({})", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Interpolant {
    Pedestal(PedestalProfile),
    Constant(f64),
    Spline(CubicSpline),
}

/// A [`ProfileSpec`] resolved once into a single interpolant.
///
/// Evaluation is shape preserving, holds the end values outside the sampled
/// range and never produces NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEvaluator {
    spec: ProfileSpec,
    interpolant: Interpolant,
}

impl ProfileEvaluator {
    pub fn resolve(spec: &ProfileSpec, input_dir: &Path) -> Heat3dResult<Self> {
        let interpolant = match spec {
            ProfileSpec::ScalarPedestal(top) => {
                require_finite(*top)?;
                Interpolant::Pedestal(PedestalProfile::new(*top))
            }
            ProfileSpec::Constant(value) => {
                require_finite(*value)?;
                Interpolant::Constant(*value)
            }
            ProfileSpec::SampleArray(values) => match values.len() {
                0 => {
                    return Err(Heat3dError::config(
                        "CONFIG.PROFILE_ARRAY",
                        "profile sample array is empty",
                    ));
                }
                1 => {
                    require_finite(values[0])?;
                    Interpolant::Constant(values[0])
                }
                count => {
                    let psi = linear_grid(0.0, SAMPLE_ARRAY_PSI_MAX, count).ok_or_else(|| {
                        Heat3dError::internal("SYS.PROFILE_GRID", "sample grid could not be built")
                    })?;
                    Interpolant::Spline(spline(&psi, values)?)
                }
            },
            ProfileSpec::FilePath(name) => {
                let path = resolve_profile_path(name, input_dir);
                info!(path = %path.display(), "loading profile data");
                let (psi, values) = read_profile_table(&path)?;
                Interpolant::Spline(spline(&psi, &values)?)
            }
        };
        Ok(Self {
            spec: spec.clone(),
            interpolant,
        })
    }

    pub fn spec(&self) -> &ProfileSpec {
        &self.spec
    }

    pub fn evaluate(&self, psi: f64) -> f64 {
        match &self.interpolant {
            Interpolant::Pedestal(profile) => profile.value(psi),
            Interpolant::Constant(value) => *value,
            Interpolant::Spline(spline) => spline.evaluate(psi),
        }
    }

    pub fn evaluate_many(&self, psi: &[f64]) -> Vec<f64> {
        psi.iter().map(|&value| self.evaluate(value)).collect()
    }

    /// Analytic derivative, available for the built-in pedestal profile only.
    pub fn derivative(&self, psi: f64) -> Option<f64> {
        match &self.interpolant {
            Interpolant::Pedestal(profile) => Some(profile.derivative(psi)),
            Interpolant::Constant(_) => Some(0.0),
            Interpolant::Spline(_) => None,
        }
    }
}

fn spline(psi: &[f64], values: &[f64]) -> Heat3dResult<CubicSpline> {
    CubicSpline::interpolating(psi, values).map_err(|source| {
        Heat3dError::config(
            "CONFIG.PROFILE_DATA",
            format!("profile data cannot be interpolated: {}", source),
        )
    })
}

fn require_finite(value: f64) -> Heat3dResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Heat3dError::config(
            "CONFIG.PROFILE_VALUE",
            format!("profile value must be finite, got {}", value),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{ProfileEvaluator, ProfileSpec};
    use crate::domain::Heat3dErrorCategory;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    #[test]
    fn input_values_select_profile_kind() {
        assert_eq!(
            ProfileSpec::from_input_value("[1.0 0.5, 0.25]", ProfileSpec::ScalarPedestal)
                .expect("array"),
            ProfileSpec::SampleArray(vec![1.0, 0.5, 0.25])
        );
        assert_eq!(
            ProfileSpec::from_input_value("3.5", ProfileSpec::ScalarPedestal).expect("scalar"),
            ProfileSpec::ScalarPedestal(3.5)
        );
        assert_eq!(
            ProfileSpec::from_input_value("0.8", ProfileSpec::Constant).expect("constant"),
            ProfileSpec::Constant(0.8)
        );
        assert_eq!(
            ProfileSpec::from_input_value("Te_204118.dat", ProfileSpec::ScalarPedestal)
                .expect("file"),
            ProfileSpec::FilePath(PathBuf::from("Te_204118.dat"))
        );
        let error = ProfileSpec::from_input_value("[1.0 x]", ProfileSpec::ScalarPedestal)
            .expect_err("bad array");
        assert_eq!(error.placeholder(), "CONFIG.PROFILE_ARRAY");
    }

    #[test]
    fn sample_array_spans_zero_to_one_point_one() {
        let spec = ProfileSpec::SampleArray(vec![4.0, 3.0, 2.0, 1.0, 0.5, 0.1]);
        let profile = ProfileEvaluator::resolve(&spec, Path::new(".")).expect("profile");
        assert!((profile.evaluate(0.0) - 4.0).abs() < 1.0e-12);
        assert!((profile.evaluate(0.22) - 3.0).abs() < 1.0e-12);
        assert!((profile.evaluate(1.1) - 0.1).abs() < 1.0e-12);
        assert_eq!(profile.evaluate(1.5), 0.1);
        assert_eq!(profile.evaluate(-0.5), 4.0);
        let values = profile.evaluate_many(&[0.0, f64::NAN, 2.0]);
        assert!(values.iter().all(|value| value.is_finite()));
    }

    #[test]
    fn file_profile_reads_from_input_dir() {
        let temp = TempDir::new().expect("tempdir should be created");
        fs::write(
            temp.path().join("Te.dat"),
            "# psi Te\n0.0 3.0\n0.5 2.5\n0.9 1.5\n1.0 0.8\n1.2 0.1\n",
        )
        .expect("profile should be written");

        let spec = ProfileSpec::FilePath(PathBuf::from("Te.dat"));
        let profile = ProfileEvaluator::resolve(&spec, temp.path()).expect("profile");
        assert!((profile.evaluate(0.9) - 1.5).abs() < 1.0e-12);
        assert_eq!(profile.evaluate(2.0), 0.1);
        assert_eq!(profile.derivative(0.9), None);
    }

    #[test]
    fn missing_profile_file_is_a_config_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let spec = ProfileSpec::FilePath(PathBuf::from("missing.dat"));
        let error = ProfileEvaluator::resolve(&spec, temp.path()).expect_err("missing file");
        assert_eq!(error.category(), Heat3dErrorCategory::ConfigError);
        assert_eq!(error.placeholder(), "CONFIG.PROFILE_FILE");
    }

    #[test]
    fn scalar_profiles_resolve_without_files() {
        let temperature =
            ProfileEvaluator::resolve(&ProfileSpec::ScalarPedestal(2.0), Path::new("."))
                .expect("pedestal");
        assert!((temperature.evaluate(0.935) - 2.0).abs() < 1.0e-12);
        assert!(temperature.derivative(0.975).expect("derivative") < 0.0);

        let density = ProfileEvaluator::resolve(&ProfileSpec::Constant(0.5), Path::new("."))
            .expect("density");
        assert_eq!(density.evaluate(0.3), 0.5);
        assert_eq!(density.evaluate(1.15), 0.5);
    }
}
