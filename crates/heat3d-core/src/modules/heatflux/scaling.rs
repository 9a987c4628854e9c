//! Power-balance normalization.
//!
//! Each model is evaluated along a dense profile at the outboard (or inboard)
//! midplane and integrated over poloidal flux. The scale factor maps that
//! integral onto the power the component receives.

use super::conductive::Conduction;
use super::layer::layer_shape;
use super::mapping::MidplaneMap;
use crate::common::constants::{
    CALIBRATION_SAMPLES, CALIBRATION_WIDTHS, CONDUCTIVE_PSI_RANGE, MM_TO_M, PI2,
};
use crate::common::config::HeatFluxConfig;
use crate::domain::{Heat3dError, Heat3dResult};
use crate::modules::profile::ProfileEvaluator;
use crate::modules::traits::{CalibrationTracer, Equilibrium};
use crate::numerics::{argmin_distance, linear_grid, simpson};
use tracing::{debug, info, warn};

/// Unscaled model flux along a calibration profile.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct CalibrationProfile {
    pub psi_n: Vec<f64>,
    pub q_hat: Vec<f64>,
}

/// `target_power / |2 pi * integral(q_hat dpsi)|`.
pub(super) fn power_scale<E: Equilibrium + ?Sized>(
    equilibrium: &E,
    profile: &CalibrationProfile,
    target_power: f64,
) -> Heat3dResult<f64> {
    let psi: Vec<f64> = profile
        .psi_n
        .iter()
        .map(|&psi_n| equilibrium.psi_flux(psi_n))
        .collect();
    let integral = simpson(&profile.q_hat, &psi).map_err(|source| {
        Heat3dError::computation(
            "COMPUTE.POWER_INTEGRAL",
            format!("power balance integral failed: {}", source),
        )
    })?;
    let mut power = PI2 * integral;
    if power < 0.0 {
        warn!(
            integral = power,
            "negative power balance integral, using its magnitude"
        );
        power = -power;
    }
    if !power.is_finite() || power == 0.0 {
        return Err(Heat3dError::computation(
            "COMPUTE.POWER_BALANCE",
            format!("power balance integral must be finite and nonzero, got {}", power),
        ));
    }
    debug!(power, target_power, "power balance integral");
    Ok(target_power / power)
}

/// Midplane R samples spanning the layer: `20 S` into the private side and
/// `20 lq` into the SOL from `R(lcfs)`, capped by the magnetic axis and the
/// equilibrium grid.
pub(super) fn layer_calibration_line<E: Equilibrium + ?Sized>(
    equilibrium: &E,
    map: &MidplaneMap,
    config: &HeatFluxConfig,
) -> Heat3dResult<Vec<f64>> {
    let r_lcfs = map.radius(config.lcfs);
    let (r_axis, _) = equilibrium.magnetic_axis();
    let (r_grid_min, r_grid_max) = equilibrium.grid_r_extent();
    let private_width = CALIBRATION_WIDTHS * config.s * MM_TO_M;
    let sol_width = CALIBRATION_WIDTHS * config.lq * MM_TO_M;
    let (r_min, r_max) = if map.side().is_high_field() {
        (
            (r_lcfs - sol_width).max(r_grid_min),
            (r_lcfs + private_width).min(r_axis),
        )
    } else {
        (
            (r_lcfs - private_width).max(r_axis),
            (r_lcfs + sol_width).min(r_grid_max),
        )
    };
    linear_grid(r_min, r_max, CALIBRATION_SAMPLES).ok_or_else(|| {
        Heat3dError::internal("SYS.CALIBRATION_GRID", "calibration grid could not be built")
    })
}

/// Layer shape along the calibration line. psimin comes from `tracer` when
/// one is attached, otherwise from the axisymmetric flux itself.
pub(super) fn layer_calibration_profile<E: Equilibrium + ?Sized>(
    equilibrium: &E,
    map: &MidplaneMap,
    config: &HeatFluxConfig,
    tracer: Option<&mut (dyn CalibrationTracer + 'static)>,
) -> Heat3dResult<CalibrationProfile> {
    let r = layer_calibration_line(equilibrium, map, config)?;
    let (_, z_axis) = equilibrium.magnetic_axis();
    let psi_n: Vec<f64> = r
        .iter()
        .map(|&r| equilibrium.psi_normalized(r, z_axis))
        .collect();
    let psimin = match tracer {
        Some(tracer) => {
            let psimin = tracer.trace_calibration_line(map.side(), &r, z_axis)?;
            if psimin.len() != r.len() {
                return Err(Heat3dError::computation(
                    "COMPUTE.CALIBRATION_TRACE",
                    format!(
                        "calibration trace returned {} values for {} points",
                        psimin.len(),
                        r.len()
                    ),
                ));
            }
            psimin
        }
        None => {
            info!(side = %map.side(), "no calibration tracer, using axisymmetric psiN along the midplane");
            psi_n.clone()
        }
    };

    let separatrix = argmin_distance(&psimin, 1.0).ok_or_else(|| {
        Heat3dError::computation(
            "COMPUTE.CALIBRATION_TRACE",
            "calibration psimin has no finite value",
        )
    })?;
    let r_separatrix = r[separatrix];
    let private: Vec<bool> = r
        .iter()
        .map(|&r| {
            if map.side().is_high_field() {
                r > r_separatrix
            } else {
                r < r_separatrix
            }
        })
        .collect();

    let q_hat = layer_shape(map, &psimin, &private, config.lq, config.s, config.lcfs)?;
    Ok(CalibrationProfile { psi_n, q_hat })
}

/// Conductive flux on `psiN` in `[0.85, 1.2]`, private-side samples mapped
/// onto the SOL.
pub(super) fn conductive_calibration_profile(
    temperature: &ProfileEvaluator,
    conduction: &Conduction,
) -> Heat3dResult<CalibrationProfile> {
    let (start, end) = CONDUCTIVE_PSI_RANGE;
    let psi_n = linear_grid(start, end, CALIBRATION_SAMPLES).ok_or_else(|| {
        Heat3dError::internal("SYS.CALIBRATION_GRID", "calibration grid could not be built")
    })?;
    let q_hat = psi_n
        .iter()
        .map(|&psi| {
            let psi = if psi < 1.0 {
                conduction.private_flux_psi(psi)
            } else {
                psi
            };
            conduction.flux(temperature.evaluate(psi))
        })
        .collect();
    Ok(CalibrationProfile { psi_n, q_hat })
}

#[cfg(test)]
mod tests {
    use super::{
        conductive_calibration_profile, layer_calibration_line, layer_calibration_profile,
        power_scale, CalibrationProfile,
    };
    use crate::common::config::HeatFluxConfig;
    use crate::domain::{DivertorSide, Heat3dErrorCategory, Heat3dResult};
    use crate::modules::heatflux::conductive::Conduction;
    use crate::modules::heatflux::mapping::MidplaneMap;
    use crate::modules::heatflux::tests::CircularEquilibrium;
    use crate::modules::profile::{ProfileEvaluator, ProfileSpec};
    use crate::modules::traits::{CalibrationTracer, Equilibrium};
    use crate::numerics::simpson;
    use std::path::Path;

    fn integral(equilibrium: &CircularEquilibrium, profile: &CalibrationProfile) -> f64 {
        let psi: Vec<f64> = profile
            .psi_n
            .iter()
            .map(|&psi_n| equilibrium.psi_flux(psi_n))
            .collect();
        (2.0 * std::f64::consts::PI * simpson(&profile.q_hat, &psi).expect("integral")).abs()
    }

    #[test]
    fn scaled_layer_integrates_to_target_power_for_any_width() {
        let equilibrium = CircularEquilibrium::default();
        let map = MidplaneMap::build(&equilibrium, DivertorSide::LowField).expect("map");
        for (lq, s) in [(5.0, 2.0), (2.5, 1.0), (10.0, 4.0)] {
            let config = HeatFluxConfig {
                lq,
                s,
                ..HeatFluxConfig::default()
            };
            let profile =
                layer_calibration_profile(&equilibrium, &map, &config, None).expect("profile");
            let scale = power_scale(&equilibrium, &profile, 4.5).expect("scale");
            let delivered = scale * integral(&equilibrium, &profile);
            assert!((delivered - 4.5).abs() < 1.0e-9, "lq={lq}: {delivered}");
        }
    }

    #[test]
    fn calibration_line_is_capped_by_axis_and_grid() {
        let equilibrium = CircularEquilibrium::default();
        let config = HeatFluxConfig {
            lq: 100.0,
            s: 100.0,
            ..HeatFluxConfig::default()
        };
        let lfs = MidplaneMap::build(&equilibrium, DivertorSide::LowField).expect("lfs");
        let line = layer_calibration_line(&equilibrium, &lfs, &config).expect("line");
        assert_eq!(line.len(), 1000);
        assert_eq!(line[0], equilibrium.r_axis);
        assert_eq!(line[999], equilibrium.r_max);

        let hfs = MidplaneMap::build(&equilibrium, DivertorSide::HighField).expect("hfs");
        let line = layer_calibration_line(&equilibrium, &hfs, &config).expect("line");
        assert_eq!(line[0], equilibrium.r_min);
        assert_eq!(line[999], equilibrium.r_axis);
    }

    struct RecordingTracer {
        calls: usize,
    }

    impl CalibrationTracer for RecordingTracer {
        fn trace_calibration_line(
            &mut self,
            side: DivertorSide,
            r: &[f64],
            z: f64,
        ) -> Heat3dResult<Vec<f64>> {
            self.calls += 1;
            assert_eq!(side, DivertorSide::HighField);
            let equilibrium = CircularEquilibrium::default();
            Ok(r.iter().map(|&r| equilibrium.psi_normalized(r, z)).collect())
        }
    }

    #[test]
    fn attached_tracer_supplies_psimin() {
        let equilibrium = CircularEquilibrium::default();
        let map = MidplaneMap::build(&equilibrium, DivertorSide::HighField).expect("map");
        let config = HeatFluxConfig::default();
        let mut tracer = RecordingTracer { calls: 0 };

        let traced = layer_calibration_profile(&equilibrium, &map, &config, Some(&mut tracer))
            .expect("traced");
        let fallback = layer_calibration_profile(&equilibrium, &map, &config, None).expect("fallback");
        assert_eq!(tracer.calls, 1);
        assert_eq!(traced, fallback);
    }

    #[test]
    fn conductive_calibration_remaps_the_private_side() {
        let temperature =
            ProfileEvaluator::resolve(&ProfileSpec::ScalarPedestal(2.0), Path::new(".")).expect("te");
        let conduction = Conduction {
            kappa: 2000.0,
            length: 20.0,
            t_sheath: 0.0,
            pfr_ratio: 2.5,
        };
        let profile = conductive_calibration_profile(&temperature, &conduction).expect("profile");
        assert_eq!(profile.psi_n.len(), 1000);
        assert_eq!(profile.psi_n[0], 0.85);
        let expected = conduction.flux(temperature.evaluate(conduction.private_flux_psi(0.85)));
        assert_eq!(profile.q_hat[0], expected);
        assert_eq!(profile.q_hat[999], 0.0);
    }

    #[test]
    fn vanishing_integral_is_a_computation_error() {
        let equilibrium = CircularEquilibrium::default();
        let profile = CalibrationProfile {
            psi_n: vec![0.9, 1.0, 1.1],
            q_hat: vec![0.0, 0.0, 0.0],
        };
        let error = power_scale(&equilibrium, &profile, 1.0).expect_err("zero integral");
        assert_eq!(error.category(), Heat3dErrorCategory::ComputationError);
        assert_eq!(error.placeholder(), "COMPUTE.POWER_BALANCE");
    }

    #[test]
    fn negative_integral_uses_its_magnitude() {
        let equilibrium = CircularEquilibrium::default();
        let ascending = CalibrationProfile {
            psi_n: vec![0.9, 1.0, 1.1],
            q_hat: vec![1.0, 2.0, 1.0],
        };
        let descending = CalibrationProfile {
            psi_n: vec![1.1, 1.0, 0.9],
            q_hat: vec![1.0, 2.0, 1.0],
        };
        let up = power_scale(&equilibrium, &ascending, 2.0).expect("ascending");
        let down = power_scale(&equilibrium, &descending, 2.0).expect("descending");
        assert!((up - down).abs() < 1.0e-12 * up);
    }
}
