use crate::common::constants::MIDPLANE_MAP_SAMPLES;
use crate::domain::{DivertorSide, Heat3dError, Heat3dResult};
use crate::modules::traits::Equilibrium;
use crate::numerics::{linear_grid, CubicSpline};
use tracing::warn;

/// Inverse of psiN along the midplane `Z = Z_axis`, from the magnetic axis
/// out to the grid boundary on one side.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct MidplaneMap {
    side: DivertorSide,
    radius: CubicSpline,
}

impl MidplaneMap {
    pub(super) fn build<E: Equilibrium + ?Sized>(
        equilibrium: &E,
        side: DivertorSide,
    ) -> Heat3dResult<Self> {
        let (r_axis, z_axis) = equilibrium.magnetic_axis();
        let (r_grid_min, r_grid_max) = equilibrium.grid_r_extent();
        let r_end = if side.is_high_field() {
            r_grid_min
        } else {
            r_grid_max
        };
        let r = linear_grid(r_axis, r_end, MIDPLANE_MAP_SAMPLES).ok_or_else(|| {
            Heat3dError::internal("SYS.MIDPLANE_GRID", "midplane grid could not be built")
        })?;
        let psi: Vec<f64> = r
            .iter()
            .map(|&r| equilibrium.psi_normalized(r, z_axis))
            .collect();

        // psiN turns over again past a second X-point or outside the grid.
        let mut usable = 1;
        while usable < psi.len() && psi[usable] > psi[usable - 1] {
            usable += 1;
        }
        if usable < 2 {
            return Err(Heat3dError::computation(
                "COMPUTE.MIDPLANE_MAP",
                format!(
                    "psiN does not increase from the magnetic axis towards R = {} on the {}",
                    r_end, side
                ),
            ));
        }
        if usable < psi.len() {
            warn!(
                side = %side,
                usable,
                psi_max = psi[usable - 1],
                "midplane psiN is not monotone, mapping truncated"
            );
        }

        let radius = CubicSpline::monotone(&psi[..usable], &r[..usable]).map_err(|source| {
            Heat3dError::computation(
                "COMPUTE.MIDPLANE_MAP",
                format!("midplane map cannot be interpolated: {}", source),
            )
        })?;
        Ok(Self { side, radius })
    }

    pub(super) fn side(&self) -> DivertorSide {
        self.side
    }

    /// Midplane R for a normalized flux, held constant outside the mapped
    /// range.
    pub(super) fn radius(&self, psi: f64) -> f64 {
        self.radius.evaluate(psi)
    }

    pub(super) fn radii(&self, psi: &[f64]) -> Vec<f64> {
        self.radius.evaluate_many(psi)
    }
}

#[cfg(test)]
mod tests {
    use super::MidplaneMap;
    use crate::domain::DivertorSide;
    use crate::modules::heatflux::tests::CircularEquilibrium;

    #[test]
    fn map_inverts_circular_flux_on_both_sides() {
        let equilibrium = CircularEquilibrium::default();
        let lfs = MidplaneMap::build(&equilibrium, DivertorSide::LowField).expect("lfs map");
        let hfs = MidplaneMap::build(&equilibrium, DivertorSide::HighField).expect("hfs map");

        let expected_offset = equilibrium.minor_radius * 0.97_f64.sqrt();
        assert!((lfs.radius(0.97) - (equilibrium.r_axis + expected_offset)).abs() < 1.0e-3);
        assert!((hfs.radius(0.97) - (equilibrium.r_axis - expected_offset)).abs() < 1.0e-3);
        assert_eq!(lfs.side(), DivertorSide::LowField);
    }

    #[test]
    fn map_holds_end_values_outside_the_line() {
        let equilibrium = CircularEquilibrium::default();
        let lfs = MidplaneMap::build(&equilibrium, DivertorSide::LowField).expect("lfs map");
        assert!((lfs.radius(50.0) - equilibrium.r_max).abs() < 1.0e-12);
        assert!((lfs.radius(-1.0) - equilibrium.r_axis).abs() < 1.0e-12);
    }
}
