//! Equilibrium sampled on a rectilinear (R, Z) grid.

use super::traits::Equilibrium;
use crate::domain::{Heat3dError, Heat3dResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Normalized flux on a rectilinear grid, read from JSON.
///
/// `psi_n[iz][ir]` is the value at `(r[ir], z[iz])`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledEquilibrium {
    pub r: Vec<f64>,
    pub z: Vec<f64>,
    pub psi_n: Vec<Vec<f64>>,
    pub psi_axis: f64,
    pub psi_separatrix: f64,
    pub magnetic_axis: [f64; 2],
    #[serde(default)]
    pub wall: Vec<[f64; 2]>,
}

impl SampledEquilibrium {
    pub fn load(path: &Path) -> Heat3dResult<Self> {
        let source = fs::read_to_string(path).map_err(|source| {
            Heat3dError::config(
                "CONFIG.EQUILIBRIUM_READ",
                format!("equilibrium '{}' could not be read: {}", path.display(), source),
            )
        })?;
        let equilibrium: Self = serde_json::from_str(&source).map_err(|source| {
            Heat3dError::config(
                "CONFIG.EQUILIBRIUM_JSON",
                format!("equilibrium '{}' is not valid: {}", path.display(), source),
            )
        })?;
        equilibrium.validate()?;
        Ok(equilibrium)
    }

    pub fn validate(&self) -> Heat3dResult<()> {
        for (name, axis) in [("r", &self.r), ("z", &self.z)] {
            if axis.len() < 2 {
                return Err(invalid(format!("grid axis '{}' needs at least 2 nodes", name)));
            }
            if axis.iter().any(|value| !value.is_finite())
                || axis.windows(2).any(|pair| pair[1] <= pair[0])
            {
                return Err(invalid(format!(
                    "grid axis '{}' must be finite and strictly increasing",
                    name
                )));
            }
        }
        if self.psi_n.len() != self.z.len()
            || self.psi_n.iter().any(|row| row.len() != self.r.len())
        {
            return Err(invalid(format!(
                "psi_n must have {} rows of {} values",
                self.z.len(),
                self.r.len()
            )));
        }
        if self.psi_n.iter().flatten().any(|value| !value.is_finite()) {
            return Err(invalid("psi_n must contain finite values".to_string()));
        }
        if self.psi_separatrix == self.psi_axis {
            return Err(invalid(
                "psi_axis and psi_separatrix must differ".to_string(),
            ));
        }
        Ok(())
    }
}

fn invalid(message: String) -> Heat3dError {
    Heat3dError::config("CONFIG.EQUILIBRIUM_GRID", message)
}

/// Lower node index and fractional offset of `value` on `axis`, clamped to
/// the grid.
fn locate(axis: &[f64], value: f64) -> (usize, f64) {
    let last = axis.len() - 1;
    let upper = axis.partition_point(|&node| node <= value).clamp(1, last);
    let lower = upper - 1;
    let fraction = ((value - axis[lower]) / (axis[upper] - axis[lower])).clamp(0.0, 1.0);
    (lower, fraction)
}

impl Equilibrium for SampledEquilibrium {
    fn psi_normalized(&self, r: f64, z: f64) -> f64 {
        let (ir, tr) = locate(&self.r, r);
        let (iz, tz) = locate(&self.z, z);

        let v00 = self.psi_n[iz][ir];
        let v01 = self.psi_n[iz][ir + 1];
        let v10 = self.psi_n[iz + 1][ir];
        let v11 = self.psi_n[iz + 1][ir + 1];

        (1.0 - tz) * ((1.0 - tr) * v00 + tr * v01) + tz * ((1.0 - tr) * v10 + tr * v11)
    }

    fn psi_axis(&self) -> f64 {
        self.psi_axis
    }

    fn psi_separatrix(&self) -> f64 {
        self.psi_separatrix
    }

    fn magnetic_axis(&self) -> (f64, f64) {
        (self.magnetic_axis[0], self.magnetic_axis[1])
    }

    fn grid_r_extent(&self) -> (f64, f64) {
        (self.r[0], self.r[self.r.len() - 1])
    }

    fn wall(&self) -> &[[f64; 2]] {
        &self.wall
    }
}
