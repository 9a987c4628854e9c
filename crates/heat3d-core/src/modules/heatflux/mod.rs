//! Parallel heat flux from trace results.
//!
//! Two deposition models are available: the empirical flux layer and the
//! conductive limit. Both produce a shape per point that is then scaled so
//! the power crossing the midplane equals the component's share of the SOL
//! power.

mod conductive;
mod layer;
mod mapping;
mod scaling;

pub use layer::eich_profile;

use super::profile::ProfileEvaluator;
use super::traits::{CalibrationTracer, Equilibrium};
use crate::common::config::{HeatFluxConfig, HeatFluxModelKind};
use crate::domain::{
    is_non_converged, DivertorSide, FluxField, Heat3dError, Heat3dResult, TraceResult,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use conductive::{conductive_shape, connection_length, Conduction};
use layer::layer_shape;
use mapping::MidplaneMap;
use scaling::{conductive_calibration_profile, layer_calibration_profile, power_scale};

/// Converged points (`psimin != 10`) and private-flux-region points
/// (`psimin < 1` with a connection length below `lc_min`).
pub fn flux_masks(trace: &TraceResult, lc_min: f64) -> (Vec<bool>, Vec<bool>) {
    let good = trace.psimin.iter().map(|&psi| !is_non_converged(psi)).collect();
    let pfr = trace
        .psimin
        .iter()
        .zip(&trace.lc)
        .map(|(&psi, &lc)| psi < 1.0 && lc < lc_min)
        .collect();
    (good, pfr)
}

/// Unscaled per-point shape and the factor that scales it to the target
/// power.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEvaluation {
    pub shape: Vec<f64>,
    pub scale: f64,
}

pub struct HeatFluxModel<E: Equilibrium> {
    config: HeatFluxConfig,
    equilibrium: E,
    input_dir: PathBuf,
    temperature: ProfileEvaluator,
    density: ProfileEvaluator,
    tracer: Option<Box<dyn CalibrationTracer>>,
    trace: Option<TraceResult>,
    good: Vec<bool>,
    pfr: Vec<bool>,
}

impl<E: Equilibrium> HeatFluxModel<E> {
    /// Validates `config` and resolves its profiles against `input_dir`.
    pub fn new(
        config: HeatFluxConfig,
        equilibrium: E,
        input_dir: impl Into<PathBuf>,
    ) -> Heat3dResult<Self> {
        config.validate()?;
        let input_dir = input_dir.into();
        let temperature = ProfileEvaluator::resolve(&config.te_profile, &input_dir)?;
        let density = ProfileEvaluator::resolve(&config.ne_profile, &input_dir)?;
        Ok(Self {
            config,
            equilibrium,
            input_dir,
            temperature,
            density,
            tracer: None,
            trace: None,
            good: Vec::new(),
            pfr: Vec::new(),
        })
    }

    /// Traces the layer calibration line instead of reading psiN off the
    /// equilibrium.
    pub fn with_calibration_tracer(mut self, tracer: Box<dyn CalibrationTracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn config(&self) -> &HeatFluxConfig {
        &self.config
    }

    pub fn equilibrium(&self) -> &E {
        &self.equilibrium
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Electron temperature in keV.
    pub fn temperature(&self, psi: f64) -> f64 {
        self.temperature.evaluate(psi)
    }

    /// Electron density in 10^20 m^-3.
    pub fn density(&self, psi: f64) -> f64 {
        self.density.evaluate(psi)
    }

    /// Replaces the trace data and recomputes the masks.
    pub fn update_laminar_data(&mut self, trace: TraceResult) {
        let (good, pfr) = flux_masks(&trace, self.config.lc_min);
        info!(
            points = trace.len(),
            converged = good.iter().filter(|good| **good).count(),
            pfr = pfr.iter().filter(|pfr| **pfr).count(),
            "laminar data updated"
        );
        self.good = good;
        self.pfr = pfr;
        self.trace = Some(trace);
    }

    pub fn trace(&self) -> Option<&TraceResult> {
        self.trace.as_ref()
    }

    pub fn good(&self) -> &[bool] {
        &self.good
    }

    pub fn pfr(&self) -> &[bool] {
        &self.pfr
    }

    /// Final parallel heat flux for one component receiving `power_fraction`
    /// of the SOL power.
    pub fn heatflux(&mut self, divertor_code: &str, power_fraction: f64) -> Heat3dResult<FluxField> {
        let kind = self.config.model.ok_or_else(|| {
            Heat3dError::config("CONFIG.HF_MODEL", "no valid model selected")
        })?;
        if !power_fraction.is_finite() || power_fraction < 0.0 {
            return Err(Heat3dError::config(
                "CONFIG.POWER_FRACTION",
                format!("power fraction must be finite and >= 0, got {}", power_fraction),
            ));
        }
        let target_power = self.config.sol_power() * power_fraction;
        info!(model = %kind, target_power, "3D heat flux model");

        let evaluation = self.evaluate(kind, divertor_code, target_power)?;
        let q_bg = self.config.q_bg;
        let q = evaluation
            .shape
            .iter()
            .zip(&self.good)
            .map(|(&shape, &good)| {
                let q = if good {
                    (evaluation.scale * shape).max(0.0)
                } else {
                    0.0
                };
                q + q_bg
            })
            .collect();
        info!(scale = evaluation.scale, q_bg, "heat flux scaled");
        Ok(FluxField {
            q,
            good: self.good.clone(),
            pfr: self.pfr.clone(),
            scale: evaluation.scale,
        })
    }

    /// Evaluates `kind` at every traced point and scales it to
    /// `target_power`.
    pub fn evaluate(
        &mut self,
        kind: HeatFluxModelKind,
        divertor_code: &str,
        target_power: f64,
    ) -> Heat3dResult<ModelEvaluation> {
        let trace = self.trace.as_ref().ok_or_else(|| {
            Heat3dError::config(
                "CONFIG.LAMINAR_DATA",
                "update_laminar_data must be called before evaluating a heat flux model",
            )
        })?;
        let config = &self.config;
        match kind {
            HeatFluxModelKind::Layer => {
                let side = DivertorSide::from_code(divertor_code)?;
                info!(
                    lq = config.lq,
                    s = config.s,
                    lcfs = config.lcfs,
                    side = %side,
                    "flux layer model"
                );
                let map = MidplaneMap::build(&self.equilibrium, side)?;
                let shape =
                    layer_shape(&map, &trace.psimin, &self.pfr, config.lq, config.s, config.lcfs)?;
                let profile = layer_calibration_profile(
                    &self.equilibrium,
                    &map,
                    config,
                    self.tracer.as_deref_mut(),
                )?;
                let scale = power_scale(&self.equilibrium, &profile, target_power)?;
                Ok(ModelEvaluation { shape, scale })
            }
            HeatFluxModelKind::Conductive => {
                let conduction = Conduction {
                    kappa: config.kappa,
                    length: connection_length(trace, config.lcfs)?,
                    t_sheath: config.t_sheath,
                    pfr_ratio: config.lq / config.s,
                };
                info!(
                    length_m = conduction.length,
                    pfr_ratio = conduction.pfr_ratio,
                    lcfs = config.lcfs,
                    "conductive model"
                );
                if conduction.t_sheath > self.temperature.evaluate(config.lcfs) {
                    warn!(
                        t_sheath = conduction.t_sheath,
                        "sheath temperature exceeds the LCFS temperature, flux clamps to zero"
                    );
                }
                let shape = conductive_shape(
                    &self.temperature,
                    &conduction,
                    &trace.psimin,
                    &self.pfr,
                    config.lcfs,
                );
                let profile = conductive_calibration_profile(&self.temperature, &conduction)?;
                let scale = power_scale(&self.equilibrium, &profile, target_power)?;
                Ok(ModelEvaluation { shape, scale })
            }
        }
    }

    pub fn describe(&self) -> String {
        let config = &self.config;
        let mut summary = String::new();
        let model = config.model.map_or("unset", HeatFluxModelKind::as_str);
        let _ = writeln!(summary, "model = {}", model);
        let _ = writeln!(summary, "Lcmin = {}", config.lc_min);
        let _ = writeln!(summary, "lcfs = {}", config.lcfs);
        let _ = writeln!(summary, "lqCN = {}", config.lq);
        let _ = writeln!(summary, "S = {}", config.s);
        let _ = writeln!(summary, "P = {}", config.power);
        let _ = writeln!(summary, "coreRadFrac = {}", config.core_rad_frac);
        let _ = writeln!(summary, "Psol = {}", config.sol_power());
        let _ = writeln!(summary, "qBG = {}", config.q_bg);
        let _ = writeln!(summary, "kappa = {}", config.kappa);
        let _ = writeln!(summary, "T0 = {}", config.t_sheath);
        let _ = writeln!(summary, "Te = {}", self.temperature.spec());
        let _ = writeln!(summary, "ne = {}", self.density.spec());
        match &self.trace {
            Some(trace) => {
                let _ = writeln!(summary, "points = {}", trace.len());
                let _ = writeln!(summary, "invalid = {}", trace.invalid_count());
                let _ = writeln!(
                    summary,
                    "pfr = {}",
                    self.pfr.iter().filter(|pfr| **pfr).count()
                );
            }
            None => {
                let _ = writeln!(summary, "points = 0");
            }
        }
        summary
    }
}

#[cfg(test)]
pub(super) mod tests {
    use super::{flux_masks, HeatFluxModel};
    use crate::common::config::{HeatFluxConfig, HeatFluxModelKind};
    use crate::domain::{Heat3dErrorCategory, TraceResult};
    use crate::modules::traits::Equilibrium;

    /// Concentric circular flux surfaces: psiN = (distance to axis / a)^2.
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct CircularEquilibrium {
        pub r_axis: f64,
        pub minor_radius: f64,
        pub r_min: f64,
        pub r_max: f64,
        wall: Vec<[f64; 2]>,
    }

    impl Default for CircularEquilibrium {
        fn default() -> Self {
            Self {
                r_axis: 1.7,
                minor_radius: 0.6,
                r_min: 1.0,
                r_max: 2.5,
                wall: vec![[1.0, -1.3], [2.5, -1.3], [2.5, 1.3], [1.0, 1.3]],
            }
        }
    }

    impl Equilibrium for CircularEquilibrium {
        fn psi_normalized(&self, r: f64, z: f64) -> f64 {
            ((r - self.r_axis).powi(2) + z * z) / (self.minor_radius * self.minor_radius)
        }

        fn psi_axis(&self) -> f64 {
            0.5
        }

        fn psi_separatrix(&self) -> f64 {
            -0.1
        }

        fn magnetic_axis(&self) -> (f64, f64) {
            (self.r_axis, 0.0)
        }

        fn grid_r_extent(&self) -> (f64, f64) {
            (self.r_min, self.r_max)
        }

        fn wall(&self) -> &[[f64; 2]] {
            &self.wall
        }
    }

    fn scenario_trace() -> TraceResult {
        TraceResult::new(vec![0.05, 0.2, 0.01, 0.3], vec![0.9, 1.0, 10.0, 1.05]).expect("trace")
    }

    fn model(kind: HeatFluxModelKind) -> HeatFluxModel<CircularEquilibrium> {
        let config = HeatFluxConfig {
            model: Some(kind),
            q_bg: 0.25,
            ..HeatFluxConfig::default()
        };
        let mut model =
            HeatFluxModel::new(config, CircularEquilibrium::default(), ".").expect("model");
        model.update_laminar_data(scenario_trace());
        model
    }

    #[test]
    fn masks_follow_convergence_and_connection_length() {
        let (good, pfr) = flux_masks(&scenario_trace(), 0.075);
        assert_eq!(good, vec![true, true, false, true]);
        assert_eq!(pfr, vec![true, false, false, false]);
    }

    #[test]
    fn non_converged_points_carry_background_only() {
        for kind in [HeatFluxModelKind::Layer, HeatFluxModelKind::Conductive] {
            let mut model = model(kind);
            let field = model.heatflux("O", 0.5).expect("heat flux");
            assert_eq!(field.len(), 4);
            assert_eq!(field.q[2], 0.25);
            assert!(field.q.iter().all(|&q| q >= 0.25));
            assert!(field.q[1] > 0.25, "{kind}: {:?}", field.q);
        }
    }

    #[test]
    fn fully_non_converged_trace_is_background_for_both_models() {
        for kind in [HeatFluxModelKind::Layer, HeatFluxModelKind::Conductive] {
            let mut model = model(kind);
            model.update_laminar_data(
                TraceResult::new(vec![0.4, 0.6], vec![10.0, 10.0]).expect("trace"),
            );
            let field = model.heatflux("O", 1.0).expect("lost points are not an error");
            assert_eq!(field.q, vec![0.25, 0.25], "{kind}");
            assert_eq!(field.good, vec![false, false]);
        }
    }

    #[test]
    fn unset_model_and_missing_trace_are_config_errors() {
        let mut model = HeatFluxModel::new(
            HeatFluxConfig::default(),
            CircularEquilibrium::default(),
            ".",
        )
        .expect("model");
        let error = model.heatflux("O", 1.0).expect_err("no model");
        assert_eq!(error.category(), Heat3dErrorCategory::ConfigError);
        assert_eq!(error.placeholder(), "CONFIG.HF_MODEL");

        let error = model
            .evaluate(HeatFluxModelKind::Layer, "O", 1.0)
            .expect_err("no trace");
        assert_eq!(error.placeholder(), "CONFIG.LAMINAR_DATA");
    }

    #[test]
    fn layer_model_rejects_unknown_divertor_code() {
        let mut model = model(HeatFluxModelKind::Layer);
        let error = model.heatflux("X", 1.0).expect_err("bad code");
        assert_eq!(error.placeholder(), "CONFIG.DIVERTOR_CODE");
        // The conductive model does not look at the divertor code.
        let mut model = self::model(HeatFluxModelKind::Conductive);
        model.heatflux("X", 1.0).expect("conductive ignores code");
    }

    #[test]
    fn scale_grows_linearly_with_power_fraction() {
        let mut model = model(HeatFluxModelKind::Layer);
        let half = model.heatflux("I", 0.5).expect("half");
        let full = model.heatflux("I", 1.0).expect("full");
        assert!((full.scale - 2.0 * half.scale).abs() <= 1.0e-12 * full.scale);
    }

    #[test]
    fn describe_reports_settings_and_trace_counts() {
        let model = model(HeatFluxModelKind::Conductive);
        let summary = model.describe();
        assert!(summary.contains("model = conductive"));
        assert!(summary.contains("Psol = 10"));
        assert!(summary.contains("invalid = 1"));
        assert!(summary.contains("pfr = 1"));
        assert!(summary.contains("Te = pedestal(2)"));
    }
}
