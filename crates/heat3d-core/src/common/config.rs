//! Run configuration for the trace driver and the heat-flux models.
//!
//! Values come from the comma-delimited HEAT input file (`name, value`, `#`
//! comments) or from JSON. Every field has the documented default, so a
//! missing file or a missing entry never leaves a value unset.

use crate::common::constants::{
    DEFAULT_LAUNCHER, DEFAULT_PERTURBATION_FILE, DEFAULT_TRACER_EXECUTABLE, MAX_TRACE_PROCESSES,
};
use crate::domain::{Heat3dError, Heat3dResult};
use crate::modules::profile::ProfileSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Explicit replacement for the working-directory and environment lookups
/// the tracer launch depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub work_dir: PathBuf,
    pub input_dir: Option<PathBuf>,
    pub shot: u32,
    pub time: u32,
    pub gfile: Option<PathBuf>,
    /// MPI launcher prepended to the tracer command; `None` runs the tracer
    /// directly.
    pub launcher: Option<String>,
    pub executable: String,
    pub max_processes: usize,
    pub restart_on_failure: bool,
    pub environment: BTreeMap<String, String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            input_dir: None,
            shot: 0,
            time: 0,
            gfile: None,
            launcher: Some(DEFAULT_LAUNCHER.to_string()),
            executable: DEFAULT_TRACER_EXECUTABLE.to_string(),
            max_processes: MAX_TRACE_PROCESSES,
            restart_on_failure: true,
            environment: BTreeMap::new(),
        }
    }
}

impl DriverConfig {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Self::default()
        }
    }

    pub fn input_dir(&self) -> &Path {
        self.input_dir.as_deref().unwrap_or(&self.work_dir)
    }

    /// `<work_dir>/g<shot:06>.<time:05>` unless set explicitly.
    pub fn gfile_path(&self) -> PathBuf {
        self.gfile.clone().unwrap_or_else(|| {
            self.work_dir
                .join(format!("g{:06}.{:05}", self.shot, self.time))
        })
    }

    pub fn apply_input_entries(&mut self, entries: &InputEntries) -> Heat3dResult<()> {
        if let Some(shot) = entries.integer("shot")? {
            self.shot = non_negative_u32("shot", shot)?;
        }
        if let Some(time) = entries.integer("time")? {
            self.time = non_negative_u32("time", time)?;
        }
        if let Some(gfile) = entries.text("gFile") {
            self.gfile = Some(PathBuf::from(gfile));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbationSource {
    pub path: String,
    pub scale: f64,
    pub phase: f64,
}

impl PerturbationSource {
    pub fn new(path: impl Into<String>, scale: f64, phase: f64) -> Self {
        Self {
            path: path.into(),
            scale,
            phase,
        }
    }

    /// Single unscaled, unshifted source used when none is configured.
    pub fn unscaled_default() -> Self {
        Self::new(DEFAULT_PERTURBATION_FILE, 1.0, 0.0)
    }
}

/// Tracer control parameters. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlasmaConfig {
    /// Toroidal iterations.
    pub itt: u32,
    /// Plasma response (0 = no, >= 1 = yes).
    pub response: i32,
    /// -3 = VMEC, -2 = SIESTA, -1 = gfile, 0 = equilibrium, 1 = I-coil, 2 = both.
    pub select_field: i32,
    pub use_icoil: i32,
    /// 1 = co-passing, -1 = counter-passing, 0 = field lines.
    pub sigma: i32,
    /// -1 = electrons, >= 1 = ions.
    pub charge: i32,
    /// keV
    pub ekin: f64,
    /// Ratio of perpendicular to parallel velocity.
    pub lambda: f64,
    pub mass: u32,
    pub map_direction: i32,
    pub perturbations: Vec<PerturbationSource>,
}

impl Default for PlasmaConfig {
    fn default() -> Self {
        Self {
            itt: 300,
            response: 0,
            select_field: -1,
            use_icoil: 0,
            sigma: 0,
            charge: -1,
            ekin: 10.0,
            lambda: 0.1,
            mass: 2,
            map_direction: 0,
            perturbations: Vec::new(),
        }
    }
}

impl PlasmaConfig {
    pub fn validate(&self) -> Heat3dResult<()> {
        if self.itt == 0 {
            return Err(invalid_value("itt", "must be at least 1"));
        }
        if !(-1..=1).contains(&self.sigma) {
            return Err(invalid_value(
                "sigma",
                format!("must be -1, 0 or 1, got {}", self.sigma),
            ));
        }
        if self.charge == 0 || self.charge < -1 {
            return Err(invalid_value(
                "charge",
                format!("must be -1 (electrons) or >= 1 (ions), got {}", self.charge),
            ));
        }
        if !(-3..=2).contains(&self.select_field) {
            return Err(invalid_value(
                "selectField",
                format!("must be within -3..=2, got {}", self.select_field),
            ));
        }
        if !self.ekin.is_finite() || self.ekin < 0.0 {
            return Err(invalid_value(
                "Ekin",
                format!("must be finite and >= 0, got {}", self.ekin),
            ));
        }
        if !self.lambda.is_finite() {
            return Err(invalid_value("Lambda", "must be finite"));
        }
        if self.mass == 0 {
            return Err(invalid_value("Mass", "must be at least 1"));
        }
        if !(-1..=1).contains(&self.map_direction) {
            return Err(invalid_value(
                "MapDirection",
                format!("must be -1, 0 or 1, got {}", self.map_direction),
            ));
        }
        for source in &self.perturbations {
            if source.path.trim().is_empty() || !source.scale.is_finite() || !source.phase.is_finite()
            {
                return Err(invalid_value(
                    "perturbations",
                    format!("invalid perturbation source {:?}", source),
                ));
            }
        }
        Ok(())
    }

    pub fn apply_input_entries(&mut self, entries: &InputEntries) -> Heat3dResult<()> {
        if let Some(value) = entries.integer("itt")? {
            self.itt = non_negative_u32("itt", value)?;
        }
        if let Some(value) = entries.integer("response")? {
            self.response = value as i32;
        }
        if let Some(value) = entries.integer("selectField")? {
            self.select_field = value as i32;
        }
        if let Some(value) = entries.integer("useIcoil")? {
            self.use_icoil = value as i32;
        }
        if let Some(value) = entries.integer("sigma")? {
            self.sigma = value as i32;
        }
        if let Some(value) = entries.integer("charge")? {
            self.charge = value as i32;
        }
        if let Some(value) = entries.float("Ekin")? {
            self.ekin = value;
        }
        if let Some(value) = entries.float("Lambda")? {
            self.lambda = value;
        }
        if let Some(value) = entries.integer("Mass")? {
            self.mass = non_negative_u32("Mass", value)?;
        }
        if let Some(value) = entries.integer("MapDirection")? {
            self.map_direction = value as i32;
        }
        Ok(())
    }

    /// Loads a JSON document or a HEAT input file, by extension.
    pub fn load(path: &Path) -> Heat3dResult<Self> {
        if is_json(path) {
            return load_json(path, "CONFIG.PLASMA_JSON");
        }
        let mut config = Self::default();
        config.apply_input_entries(&InputEntries::read(path)?)?;
        info!(path = %path.display(), "plasma input file read successfully");
        Ok(config)
    }
}

/// Deposition model tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HeatFluxModelKind {
    Layer,
    Conductive,
}

impl HeatFluxModelKind {
    pub fn from_tag(tag: &str) -> Heat3dResult<Self> {
        match tag.trim() {
            "Layer" | "layer" | "eich" | "Eich" | "heuristic" => Ok(Self::Layer),
            "conduct" | "conductive" | "Conductive" => Ok(Self::Conductive),
            other => Err(Heat3dError::config(
                "CONFIG.HF_MODEL",
                format!("no valid model selected: '{}'", other),
            )),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Layer => "layer",
            Self::Conductive => "conductive",
        }
    }
}

impl Display for HeatFluxModelKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl TryFrom<String> for HeatFluxModelKind {
    type Error = Heat3dError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_tag(&value)
    }
}

impl From<HeatFluxModelKind> for String {
    fn from(value: HeatFluxModelKind) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatFluxConfig {
    pub model: Option<HeatFluxModelKind>,
    /// Minimum SOL connection length separating out the PFR, km.
    pub lc_min: f64,
    /// Normalized flux of the last closed surface inside the stochastic layer.
    pub lcfs: f64,
    /// Layer width, mm.
    pub lq: f64,
    /// PFR spreading, mm.
    pub s: f64,
    /// Total power into the SOL, MW.
    pub power: f64,
    pub core_rad_frac: f64,
    /// Background flux, MW/m^2.
    pub q_bg: f64,
    /// Electron conductivity, W/m/eV^3.5.
    pub kappa: f64,
    /// Sheath entrance temperature, keV.
    pub t_sheath: f64,
    pub te_profile: ProfileSpec,
    pub ne_profile: ProfileSpec,
}

impl Default for HeatFluxConfig {
    fn default() -> Self {
        Self {
            model: None,
            lc_min: 0.075,
            lcfs: 0.97,
            lq: 5.0,
            s: 2.0,
            power: 10.0,
            core_rad_frac: 0.0,
            q_bg: 0.0,
            kappa: 2000.0,
            t_sheath: 0.0,
            te_profile: ProfileSpec::ScalarPedestal(2.0),
            ne_profile: ProfileSpec::Constant(0.5),
        }
    }
}

impl HeatFluxConfig {
    /// Power crossing the separatrix after core radiation, MW.
    pub fn sol_power(&self) -> f64 {
        (1.0 - self.core_rad_frac) * self.power
    }

    pub fn validate(&self) -> Heat3dResult<()> {
        let positive = [
            ("lqCN", self.lq),
            ("S", self.s),
            ("kappa", self.kappa),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid_value(name, format!("must be finite and > 0, got {}", value)));
            }
        }
        let finite = [
            ("Lcmin", self.lc_min),
            ("lcfs", self.lcfs),
            ("P", self.power),
            ("qBG", self.q_bg),
            ("T0", self.t_sheath),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(invalid_value(name, format!("must be finite, got {}", value)));
            }
        }
        if !(0.0..=1.0).contains(&self.core_rad_frac) {
            return Err(invalid_value(
                "coreRadFrac",
                format!("must be within [0, 1], got {}", self.core_rad_frac),
            ));
        }
        Ok(())
    }

    pub fn apply_input_entries(&mut self, entries: &InputEntries) -> Heat3dResult<()> {
        let floats: [(&str, &mut f64); 9] = [
            ("Lcmin", &mut self.lc_min),
            ("lcfs", &mut self.lcfs),
            ("lqCN", &mut self.lq),
            ("S", &mut self.s),
            ("P", &mut self.power),
            ("coreRadFrac", &mut self.core_rad_frac),
            ("qBG", &mut self.q_bg),
            ("kappa", &mut self.kappa),
            ("T0", &mut self.t_sheath),
        ];
        for (name, slot) in floats {
            if let Some(value) = entries.float(name)? {
                *slot = value;
            }
        }
        if let Some(tag) = entries.text("model") {
            self.model = Some(HeatFluxModelKind::from_tag(tag)?);
        }
        if let Some(raw) = entries.text("teProfileData") {
            self.te_profile = ProfileSpec::from_input_value(raw, ProfileSpec::ScalarPedestal)?;
        }
        if let Some(raw) = entries.text("neProfileData") {
            self.ne_profile = ProfileSpec::from_input_value(raw, ProfileSpec::Constant)?;
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Heat3dResult<Self> {
        if is_json(path) {
            return load_json(path, "CONFIG.HF_JSON");
        }
        let mut config = Self::default();
        config.apply_input_entries(&InputEntries::read(path)?)?;
        info!(path = %path.display(), "heat flux input file read successfully");
        Ok(config)
    }
}

/// Input-file names this crate consumes. A HEAT input file also carries
/// settings for other stages; those are reported once and otherwise ignored.
pub const KNOWN_INPUT_NAMES: &[&str] = &[
    "shot", "time", "gFile", "itt", "response", "selectField", "useIcoil", "sigma", "charge",
    "Ekin", "Lambda", "Mass", "MapDirection", "Lcmin", "lcfs", "lqCN", "S", "P", "coreRadFrac",
    "qBG", "kappa", "T0", "model", "teProfileData", "neProfileData",
];

/// Entries of a HEAT input file, last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputEntries {
    values: BTreeMap<String, String>,
}

impl InputEntries {
    pub fn read(path: &Path) -> Heat3dResult<Self> {
        let source = fs::read_to_string(path).map_err(|source| {
            Heat3dError::config(
                "CONFIG.INPUT_READ",
                format!("input file '{}' could not be read: {}", path.display(), source),
            )
        })?;
        let entries = Self::parse(&source);
        let unknown = entries.unknown_names();
        if !unknown.is_empty() {
            warn!(
                path = %path.display(),
                ignored = ?unknown,
                "input file names not used by heat3d were ignored"
            );
        }
        Ok(entries)
    }

    pub fn parse(source: &str) -> Self {
        let mut values = BTreeMap::new();
        for line in source.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((name, value)) = line.split_once(',') else {
                debug!(line, "skipping input line without a comma");
                continue;
            };
            values.insert(name.trim().to_string(), value.trim().to_string());
        }
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn unknown_names(&self) -> Vec<&str> {
        self.values
            .keys()
            .map(String::as_str)
            .filter(|name| !KNOWN_INPUT_NAMES.contains(name))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value, with `None`, `nan` and empty values treated as unset.
    pub fn text(&self, name: &str) -> Option<&str> {
        let value = self.values.get(name)?.as_str();
        if value.is_empty() || value.eq_ignore_ascii_case("none") || value.eq_ignore_ascii_case("nan")
        {
            return None;
        }
        Some(value)
    }

    pub fn float(&self, name: &str) -> Heat3dResult<Option<f64>> {
        self.text(name)
            .map(|raw| {
                raw.parse::<f64>().map_err(|_| {
                    invalid_value(name, format!("expected a number, got '{}'", raw))
                })
            })
            .transpose()
    }

    /// Integers are accepted in float notation (`300.0`) and truncated.
    pub fn integer(&self, name: &str) -> Heat3dResult<Option<i64>> {
        match self.float(name)? {
            Some(value) if value.fract() != 0.0 => {
                warn!(name, value, "truncating non-integral input value");
                Ok(Some(value.trunc() as i64))
            }
            Some(value) => Ok(Some(value as i64)),
            None => Ok(None),
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"))
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path, placeholder: &'static str) -> Heat3dResult<T> {
    let source = fs::read_to_string(path).map_err(|source| {
        Heat3dError::config(
            placeholder,
            format!("config file '{}' could not be read: {}", path.display(), source),
        )
    })?;
    serde_json::from_str(&source).map_err(|source| {
        Heat3dError::config(
            placeholder,
            format!("config file '{}' is not valid: {}", path.display(), source),
        )
    })
}

fn non_negative_u32(name: &str, value: i64) -> Heat3dResult<u32> {
    u32::try_from(value)
        .map_err(|_| invalid_value(name, format!("must be a non-negative integer, got {}", value)))
}

fn invalid_value(name: &str, detail: impl Display) -> Heat3dError {
    Heat3dError::config(
        "CONFIG.INVALID_VALUE",
        format!("input variable '{}' {}", name, detail),
    )
}

#[cfg(test)]
mod tests {
    use super::{
        DriverConfig, HeatFluxConfig, HeatFluxModelKind, InputEntries, PlasmaConfig,
    };
    use crate::domain::Heat3dErrorCategory;
    use crate::modules::profile::ProfileSpec;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const INPUT_FIXTURE: &str = "# HEAT input
shot, 204118
time, 4
itt, 200.0
sigma, 1
charge, 1
Ekin, 15
Lambda, 0.25
Mass, 4
plasma3Dmask, 1
model, Eich
lqCN, 3.5
S, 1.2
coreRadFrac, 0.3
teProfileData, [2.0 1.8 1.2 0.4 0.1]
neProfileData, None
";

    #[test]
    fn input_entries_skip_comments_and_blank_values() {
        let entries = InputEntries::parse(INPUT_FIXTURE);
        assert_eq!(entries.text("model"), Some("Eich"));
        assert_eq!(entries.text("neProfileData"), None);
        assert_eq!(entries.integer("itt").unwrap(), Some(200));
        assert!(entries.text("# HEAT input").is_none());
        assert_eq!(entries.unknown_names(), vec!["plasma3Dmask"]);
    }

    #[test]
    fn plasma_config_applies_known_entries() {
        let mut config = PlasmaConfig::default();
        config
            .apply_input_entries(&InputEntries::parse(INPUT_FIXTURE))
            .expect("entries apply");
        assert_eq!(config.itt, 200);
        assert_eq!(config.sigma, 1);
        assert_eq!(config.charge, 1);
        assert_eq!(config.mass, 4);
        assert_eq!(config.ekin, 15.0);
        assert_eq!(config.lambda, 0.25);
        assert_eq!(config.select_field, -1);
        config.validate().expect("valid config");
    }

    #[test]
    fn plasma_config_rejects_invalid_particle_direction() {
        let config = PlasmaConfig {
            sigma: 2,
            ..PlasmaConfig::default()
        };
        let error = config.validate().expect_err("sigma 2 is invalid");
        assert_eq!(error.category(), Heat3dErrorCategory::ConfigError);
        assert_eq!(error.placeholder(), "CONFIG.INVALID_VALUE");
    }

    #[test]
    fn heat_flux_config_reads_model_and_profile() {
        let mut config = HeatFluxConfig::default();
        config
            .apply_input_entries(&InputEntries::parse(INPUT_FIXTURE))
            .expect("entries apply");
        assert_eq!(config.model, Some(HeatFluxModelKind::Layer));
        assert_eq!(config.lq, 3.5);
        assert_eq!(config.s, 1.2);
        assert!((config.sol_power() - 7.0).abs() < 1.0e-12);
        assert_eq!(
            config.te_profile,
            ProfileSpec::SampleArray(vec![2.0, 1.8, 1.2, 0.4, 0.1])
        );
        assert_eq!(config.ne_profile, ProfileSpec::Constant(0.5));
    }

    #[test]
    fn unknown_model_tag_is_a_config_error() {
        let error = HeatFluxModelKind::from_tag("diffusive").expect_err("unknown model");
        assert_eq!(error.category(), Heat3dErrorCategory::ConfigError);
        assert!(error.message().contains("no valid model selected"));
    }

    #[test]
    fn driver_config_derives_gfile_from_shot_and_time() {
        let mut config = DriverConfig::new("/data/run");
        config
            .apply_input_entries(&InputEntries::parse(INPUT_FIXTURE))
            .expect("entries apply");
        assert_eq!(config.gfile_path(), PathBuf::from("/data/run/g204118.00004"));
        assert_eq!(config.input_dir(), PathBuf::from("/data/run").as_path());
    }

    #[test]
    fn json_configs_load_with_defaults() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("hf.json");
        fs::write(&path, r#"{ "model": "conductive", "kappa": 1500.0 }"#).expect("write");
        let config = HeatFluxConfig::load(&path).expect("json config loads");
        assert_eq!(config.model, Some(HeatFluxModelKind::Conductive));
        assert_eq!(config.kappa, 1500.0);
        assert_eq!(config.lcfs, 0.97);

        fs::write(&path, r#"{ "model": "magic" }"#).expect("write");
        let error = HeatFluxConfig::load(&path).expect_err("bad model tag");
        assert_eq!(error.placeholder(), "CONFIG.HF_JSON");
    }
}
