use crate::common::config::{PerturbationSource, PlasmaConfig};
use crate::common::constants::{PI, PI2};
use crate::domain::{Heat3dError, ParserResult, TracePoint};
use crate::modules::serialization::format_float;
use std::path::Path;

pub(super) const CONTROL_TITLE: &str = "# Parameterfile for HEAT Programs";

// Entry positions the tracer reads by index.
const ITT_INDEX: usize = 1;
const MAP_DIRECTION_INDEX: usize = 8;
const RESPONSE_INDEX: usize = 9;
const FIELD_INDEX: usize = 10;
const SIGMA_INDEX: usize = 16;
const CHARGE_INDEX: usize = 17;
const EKIN_INDEX: usize = 18;
const LAMBDA_INDEX: usize = 19;
const MASS_INDEX: usize = 20;
const CONTROL_ENTRY_COUNT: usize = 26;

fn control_entries(plasma: &PlasmaConfig) -> Vec<(&'static str, String)> {
    vec![
        ("NZ", "10".to_string()),
        ("itt", plasma.itt.to_string()),
        ("Rmin", "1".to_string()),
        ("Rmax", "2".to_string()),
        ("Zmin", "-1".to_string()),
        ("Zmax", "1".to_string()),
        ("NR", "10".to_string()),
        ("phistart(deg)", "0".to_string()),
        ("MapDirection", plasma.map_direction.to_string()),
        ("PlasmaResponse(0=no,>1=yes)", plasma.response.to_string()),
        (
            "Field(-3=VMEC,-2=SIESTA,-1=gfile,M3DC1:0=Eq,1=I-coil,2=both)",
            plasma.select_field.to_string(),
        ),
        ("target(0=cp,1=inner,2=outer,3=shelf)", "0".to_string()),
        ("createPoints(0=setR,3=setpsi)", "0".to_string()),
        ("unused", "0".to_string()),
        ("unused", "0".to_string()),
        ("unused", "0".to_string()),
        (
            "ParticleDirection(1=co-pass,-1=ctr-pass,0=field-lines)",
            plasma.sigma.to_string(),
        ),
        ("PartileCharge(-1=electrons,>=1=ions)", plasma.charge.to_string()),
        ("Ekin[keV]", format_float(plasma.ekin)),
        ("lambda", format_float(plasma.lambda)),
        ("Mass", plasma.mass.to_string()),
        ("unused", "0".to_string()),
        ("unused", "0".to_string()),
        ("dpinit", "1.0".to_string()),
        ("pi", format_float(PI)),
        ("2*pi", format_float(PI2)),
    ]
}

pub(super) fn render_control_file(shot: u32, time: u32, gfile: &Path, plasma: &PlasmaConfig) -> String {
    let mut content = String::new();
    content.push_str(CONTROL_TITLE);
    content.push('\n');
    content.push_str(&format!("# Shot: {:06}\tTime: {:04}ms\n", shot, time));
    content.push_str(&format!("# Path: {}\n", gfile.display()));
    for (key, value) in control_entries(plasma) {
        content.push_str(&format!("{}=\t{}\n", key, value));
    }
    content
}

pub(super) fn render_points_file(points: &[TracePoint]) -> String {
    let mut content = format!("# Number of points = {}\n", points.len());
    for point in points {
        content.push_str(&format!(
            "{}\t{}\t{}\n",
            format_float(point.r),
            format_float(point.phi),
            format_float(point.z)
        ));
    }
    content
}

pub(super) fn render_perturbation_file(sources: &[PerturbationSource]) -> String {
    sources
        .iter()
        .map(|source| {
            format!(
                "{}\t{}\t{}\n",
                source.path,
                format_float(source.scale),
                format_float(source.phase)
            )
        })
        .collect()
}

/// Parsed tracer control file.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlFile {
    pub shot: Option<u32>,
    pub time: Option<u32>,
    pub gfile: Option<String>,
    pub entries: Vec<(String, String)>,
}

impl ControlFile {
    pub fn parse(source: &str) -> ParserResult<Self> {
        let mut shot = None;
        let mut time = None;
        let mut gfile = None;
        let mut entries = Vec::new();

        for (line_index, line) in source.lines().enumerate() {
            let line = line.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix('#') {
                let comment = comment.trim();
                if let Some(path) = comment.strip_prefix("Path:") {
                    gfile = Some(path.trim().to_string());
                } else if let Some(rest) = comment.strip_prefix("Shot:") {
                    let (shot_text, time_text) = rest.split_once("Time:").unwrap_or((rest, ""));
                    shot = shot_text.trim().parse::<u32>().ok();
                    time = time_text.trim().trim_end_matches("ms").parse::<u32>().ok();
                }
                continue;
            }
            let Some((key, value)) = line.rsplit_once('=') else {
                return Err(Heat3dError::parse(
                    "PARSE.CONTROL_ENTRY",
                    format!("control line {} has no '=' separator: '{}'", line_index + 1, line),
                ));
            };
            entries.push((key.trim().to_string(), value.trim().to_string()));
        }

        if entries.len() != CONTROL_ENTRY_COUNT {
            return Err(Heat3dError::parse(
                "PARSE.CONTROL_ENTRY",
                format!(
                    "control file has {} entries, expected {}",
                    entries.len(),
                    CONTROL_ENTRY_COUNT
                ),
            ));
        }
        Ok(Self {
            shot,
            time,
            gfile,
            entries,
        })
    }

    /// Recovers the tracer control parameters. The I-coil flag and the
    /// perturbation sources are not part of the control file and keep their
    /// defaults.
    pub fn plasma_config(&self) -> ParserResult<PlasmaConfig> {
        Ok(PlasmaConfig {
            itt: self.number(ITT_INDEX)?,
            map_direction: self.number(MAP_DIRECTION_INDEX)?,
            response: self.number(RESPONSE_INDEX)?,
            select_field: self.number(FIELD_INDEX)?,
            sigma: self.number(SIGMA_INDEX)?,
            charge: self.number(CHARGE_INDEX)?,
            ekin: self.number(EKIN_INDEX)?,
            lambda: self.number(LAMBDA_INDEX)?,
            mass: self.number(MASS_INDEX)?,
            ..PlasmaConfig::default()
        })
    }

    fn number<T: std::str::FromStr>(&self, index: usize) -> ParserResult<T> {
        let (key, value) = &self.entries[index];
        value.parse::<T>().map_err(|_| {
            Heat3dError::parse(
                "PARSE.CONTROL_VALUE",
                format!("control entry '{}' has invalid value '{}'", key, value),
            )
        })
    }
}
