use crate::domain::{DivertorSide, Heat3dResult};

/// Axisymmetric magnetic equilibrium as seen by the heat-flux models.
pub trait Equilibrium {
    /// Normalized poloidal flux at `(r, z)`: 0 on axis, 1 on the separatrix.
    fn psi_normalized(&self, r: f64, z: f64) -> f64;

    fn psi_axis(&self) -> f64;

    fn psi_separatrix(&self) -> f64;

    /// `(R, Z)` of the magnetic axis.
    fn magnetic_axis(&self) -> (f64, f64);

    /// `(min R, max R)` of the equilibrium grid.
    fn grid_r_extent(&self) -> (f64, f64);

    /// Wall polygon as `[R, Z]` vertices.
    fn wall(&self) -> &[[f64; 2]];

    /// Unnormalized poloidal flux for a normalized value.
    fn psi_flux(&self, psi_normalized: f64) -> f64 {
        psi_normalized * (self.psi_separatrix() - self.psi_axis()) + self.psi_axis()
    }
}

/// Supplies psimin along a midplane line for the layer power balance.
pub trait CalibrationTracer {
    fn trace_calibration_line(
        &mut self,
        side: DivertorSide,
        r: &[f64],
        z: f64,
    ) -> Heat3dResult<Vec<f64>>;
}
