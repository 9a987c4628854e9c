use super::CliError;
use anyhow::Context;
use heat3d_core::common::config::{DriverConfig, HeatFluxConfig, PlasmaConfig};
use heat3d_core::domain::{CadExtent, FluxField, PointSet};
use heat3d_core::modules::serialization::{format_float, write_text_artifact};
use std::fs;
use std::path::{Path, PathBuf};

/// Driver settings from an optional JSON file, with the work and input
/// directories from the command line taking precedence.
pub(super) fn load_driver_config(
    path: Option<&Path>,
    work_dir: &Path,
    input_dir: Option<&Path>,
) -> Result<DriverConfig, CliError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read driver config '{}'", path.display()))?;
            serde_json::from_str::<DriverConfig>(&content)
                .with_context(|| format!("failed to parse driver config '{}'", path.display()))?
        }
        None => DriverConfig::default(),
    };
    config.work_dir = work_dir.to_path_buf();
    if let Some(input_dir) = input_dir {
        config.input_dir = Some(input_dir.to_path_buf());
    }
    Ok(config)
}

pub(super) fn load_plasma_config(path: Option<&Path>) -> Result<PlasmaConfig, CliError> {
    Ok(match path {
        Some(path) => PlasmaConfig::load(path)?,
        None => PlasmaConfig::default(),
    })
}

pub(super) fn load_heatflux_config(path: Option<&Path>) -> Result<HeatFluxConfig, CliError> {
    Ok(match path {
        Some(path) => HeatFluxConfig::load(path)?,
        None => HeatFluxConfig::default(),
    })
}

pub(super) fn is_json_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"))
}

/// Whitespace `R phi Z` table with `#` comments.
pub(super) fn read_points_file(path: &Path) -> Result<PointSet, CliError> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read points file '{}'", path.display()))?;
    let mut r = Vec::new();
    let mut phi = Vec::new();
    let mut z = Vec::new();
    for (line_index, line) in content.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let values = line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| {
                CliError::Usage(format!(
                    "points file '{}' line {} is not numeric",
                    path.display(),
                    line_index + 1
                ))
            })?;
        let [point_r, point_phi, point_z] = values[..] else {
            return Err(CliError::Usage(format!(
                "points file '{}' line {} needs exactly R phi Z",
                path.display(),
                line_index + 1
            )));
        };
        r.push(point_r);
        phi.push(point_phi);
        z.push(point_z);
    }
    Ok(PointSet::Cylindrical { r, phi, z })
}

/// `Rmin,Rmax,Zmin,Zmax`
pub(super) fn parse_cad_extent(raw: &str) -> Result<CadExtent, CliError> {
    let values = parse_float_list(raw, "--cad-extent")?;
    let [r_min, r_max, z_min, z_max] = values[..] else {
        return Err(CliError::Usage(format!(
            "--cad-extent expects Rmin,Rmax,Zmin,Zmax, got '{}'",
            raw
        )));
    };
    Ok(CadExtent {
        r_min,
        r_max,
        z_min,
        z_max,
    })
}

pub(super) fn parse_float_list(raw: &str, option: &str) -> Result<Vec<f64>, CliError> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<f64>().map_err(|_| {
                CliError::Usage(format!("{} value '{}' is not a number", option, token))
            })
        })
        .collect()
}

/// One `q good pfr` line per point.
pub(super) fn write_flux_field(path: &Path, field: &FluxField) -> Result<(), CliError> {
    let mut content = String::from("# q[MW/m^2] good pfr\n");
    for ((q, good), pfr) in field.q.iter().zip(&field.good).zip(&field.pfr) {
        content.push_str(&format!(
            "{}\t{}\t{}\n",
            format_float(*q),
            u8::from(*good),
            u8::from(*pfr)
        ));
    }
    write_text_artifact(path, &content)?;
    Ok(())
}

pub(super) fn current_working_dir() -> Result<PathBuf, CliError> {
    Ok(std::env::current_dir().context("failed to read current working directory")?)
}

#[cfg(test)]
mod tests {
    use super::{parse_cad_extent, parse_float_list, read_points_file};
    use heat3d_core::domain::PointSet;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn cad_extent_requires_four_values() {
        let cad = parse_cad_extent("1.0, 2.4,-1.3,1.2").expect("cad");
        assert_eq!(cad.r_max, 2.4);
        assert_eq!(cad.z_min, -1.3);
        assert!(parse_cad_extent("1,2,3").is_err());
        assert!(parse_float_list("1,x", "--psi").is_err());
    }

    #[test]
    fn points_file_skips_comments() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("points.dat");
        fs::write(&path, "# R phi Z\n1.5 0 -1.2\n1.6 90 -1.25 # corner\n").expect("write");
        let PointSet::Cylindrical { r, phi, z } = read_points_file(&path).expect("points") else {
            panic!("points file yields cylindrical points");
        };
        assert_eq!(r, vec![1.5, 1.6]);
        assert_eq!(phi, vec![0.0, 90.0]);
        assert_eq!(z, vec![-1.2, -1.25]);

        fs::write(&path, "1.5 0\n").expect("write");
        assert!(read_points_file(&path).is_err());
    }
}
