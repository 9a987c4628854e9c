//! Conductive-limit deposition model.

use crate::common::constants::{CONDUCTIVE_UNIT_FACTOR, KM_TO_M};
use crate::domain::{Heat3dError, Heat3dResult, TraceResult};
use crate::modules::profile::ProfileEvaluator;
use crate::numerics::stable_mean;

/// Settings shared by the point evaluation and the power balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Conduction {
    /// W/m/eV^3.5
    pub kappa: f64,
    /// Conduction length, m.
    pub length: f64,
    /// Sheath entrance temperature, keV.
    pub t_sheath: f64,
    /// lq / S
    pub pfr_ratio: f64,
}

impl Conduction {
    /// Parallel flux in MW/m^2 for an upstream temperature in keV.
    pub(super) fn flux(&self, temperature: f64) -> f64 {
        let t = temperature.max(0.0);
        let t0 = self.t_sheath.max(0.0);
        2.0 / 7.0 * self.kappa / self.length * (t.powf(3.5) - t0.powf(3.5)) * CONDUCTIVE_UNIT_FACTOR
    }

    /// psi at which a private-flux point reads the SOL temperature.
    pub(super) fn private_flux_psi(&self, psi: f64) -> f64 {
        1.0 + self.pfr_ratio * (1.0 - psi)
    }
}

/// Mean connection length in m over points with psimin above `lcfs`.
/// Non-converged rows carry the sentinel psimin and are part of the mean.
pub(super) fn connection_length(trace: &TraceResult, lcfs: f64) -> Heat3dResult<f64> {
    let open: Vec<f64> = trace
        .lc
        .iter()
        .zip(&trace.psimin)
        .filter(|(_, psimin)| **psimin > lcfs)
        .map(|(lc, _)| *lc)
        .collect();
    let mean = stable_mean(&open).ok_or_else(|| {
        Heat3dError::computation(
            "COMPUTE.CONNECTION_LENGTH",
            format!("no traced point lies outside lcfs = {}", lcfs),
        )
    })?;
    let length = mean * KM_TO_M;
    if !length.is_finite() || length <= 0.0 {
        return Err(Heat3dError::computation(
            "COMPUTE.CONNECTION_LENGTH",
            format!("mean connection length must be positive, got {} m", length),
        ));
    }
    Ok(length)
}

/// Unscaled conductive flux at each point. Temperatures inside `lcfs` are
/// held at T(lcfs); PFR points read the temperature of the mirrored SOL
/// surface.
pub(super) fn conductive_shape(
    temperature: &ProfileEvaluator,
    conduction: &Conduction,
    psi: &[f64],
    pfr: &[bool],
    lcfs: f64,
) -> Vec<f64> {
    let t_lcfs = temperature.evaluate(lcfs);
    psi.iter()
        .zip(pfr)
        .map(|(&psi, &in_pfr)| {
            let t = if in_pfr {
                temperature.evaluate(conduction.private_flux_psi(psi))
            } else if psi < lcfs {
                t_lcfs
            } else {
                temperature.evaluate(psi)
            };
            conduction.flux(t)
        })
        .collect()
}
