pub mod errors;

pub use errors::{
    ExitStatusMapping, Heat3dError, Heat3dErrorCategory, Heat3dResult, ParserResult,
};

use crate::common::constants::NON_CONVERGED_PSIMIN;
use std::fmt::{Display, Formatter};

/// Cylindrical sample point handed to the tracer: R and Z in meters,
/// right-handed toroidal angle phi in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TracePoint {
    pub r: f64,
    pub phi: f64,
    pub z: f64,
}

impl TracePoint {
    pub const fn new(r: f64, phi: f64, z: f64) -> Self {
        Self { r, phi, z }
    }

    /// Cartesian center to cylindrical point, phi reported in degrees.
    pub fn from_cartesian(xyz: [f64; 3]) -> Self {
        let [x, y, z] = xyz;
        Self {
            r: x.hypot(y),
            phi: y.atan2(x).to_degrees(),
            z,
        }
    }
}

/// Points as delivered by the geometry collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum PointSet {
    Cylindrical {
        r: Vec<f64>,
        phi: Vec<f64>,
        z: Vec<f64>,
    },
    Cartesian(Vec<[f64; 3]>),
}

impl PointSet {
    pub fn into_trace_points(self) -> Heat3dResult<Vec<TracePoint>> {
        match self {
            Self::Cylindrical { r, phi, z } => {
                if r.len() != phi.len() || r.len() != z.len() {
                    return Err(Heat3dError::config(
                        "CONFIG.POINT_SHAPE",
                        format!(
                            "cylindrical point arrays differ in length: R={}, phi={}, Z={}",
                            r.len(),
                            phi.len(),
                            z.len()
                        ),
                    ));
                }
                Ok(r.into_iter()
                    .zip(phi)
                    .zip(z)
                    .map(|((r, phi), z)| TracePoint::new(r, phi, z))
                    .collect())
            }
            Self::Cartesian(centers) => Ok(centers
                .into_iter()
                .map(TracePoint::from_cartesian)
                .collect()),
        }
    }
}

/// Per-point tracer output, index aligned with the submitted points.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraceResult {
    /// Connection length in km.
    pub lc: Vec<f64>,
    pub psimin: Vec<f64>,
}

impl TraceResult {
    pub fn new(lc: Vec<f64>, psimin: Vec<f64>) -> Heat3dResult<Self> {
        if lc.len() != psimin.len() {
            return Err(Heat3dError::config(
                "CONFIG.TRACE_SHAPE",
                format!(
                    "trace result columns differ in length: Lc={}, psimin={}",
                    lc.len(),
                    psimin.len()
                ),
            ));
        }
        Ok(Self { lc, psimin })
    }

    pub fn len(&self) -> usize {
        self.psimin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.psimin.is_empty()
    }

    /// `true` where the tracer could not compute psimin.
    pub fn invalid_mask(&self) -> Vec<bool> {
        self.psimin
            .iter()
            .map(|&psi| is_non_converged(psi))
            .collect()
    }

    pub fn invalid_count(&self) -> usize {
        self.psimin
            .iter()
            .filter(|&&psi| is_non_converged(psi))
            .count()
    }
}

pub fn is_non_converged(psimin: f64) -> bool {
    psimin == NON_CONVERGED_PSIMIN
}

/// Axis-aligned extent of the CAD model in the poloidal plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CadExtent {
    pub r_min: f64,
    pub r_max: f64,
    pub z_min: f64,
    pub z_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryBox {
    pub r_min: f64,
    pub r_max: f64,
    pub z_min: f64,
    pub z_max: f64,
}

impl BoundaryBox {
    /// Union of the wall polygon extent and the CAD extent.
    pub fn from_sources(wall: &[[f64; 2]], cad: &CadExtent) -> Heat3dResult<Self> {
        if wall.is_empty() {
            return Err(Heat3dError::config(
                "CONFIG.BOUNDARY_WALL",
                "wall geometry is empty; cannot bound the tracer domain",
            ));
        }
        let cad_values = [cad.r_min, cad.r_max, cad.z_min, cad.z_max];
        if wall.iter().flatten().chain(cad_values.iter()).any(|v| !v.is_finite()) {
            return Err(Heat3dError::config(
                "CONFIG.BOUNDARY_FINITE",
                "wall and CAD extents must be finite",
            ));
        }

        let mut bbox = Self {
            r_min: cad.r_min,
            r_max: cad.r_max,
            z_min: cad.z_min,
            z_max: cad.z_max,
        };
        for &[r, z] in wall {
            bbox.r_min = bbox.r_min.min(r);
            bbox.r_max = bbox.r_max.max(r);
            bbox.z_min = bbox.z_min.min(z);
            bbox.z_max = bbox.z_max.max(z);
        }
        Ok(bbox)
    }

    /// `Rmin,Rmax,Zmin,Zmax` as passed on the tracer command line.
    pub fn launch_argument(&self) -> String {
        format!("{},{},{},{}", self.r_min, self.r_max, self.z_min, self.z_max)
    }
}

/// Side of the scrape-off layer a divertor component sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DivertorSide {
    LowField,
    HighField,
}

impl DivertorSide {
    /// Outer divertors ('O') see the low-field side, inner ones ('I') the
    /// high-field side.
    pub fn from_code(code: &str) -> Heat3dResult<Self> {
        if code.contains('O') {
            Ok(Self::LowField)
        } else if code.contains('I') {
            Ok(Self::HighField)
        } else {
            Err(Heat3dError::config(
                "CONFIG.DIVERTOR_CODE",
                format!(
                    "PFC divertor code '{}' cannot be identified; expected an 'O' or 'I' code",
                    code
                ),
            ))
        }
    }

    pub const fn is_high_field(self) -> bool {
        matches!(self, Self::HighField)
    }

    /// Tag used for the midplane calibration files.
    pub const fn midplane_tag(self) -> &'static str {
        match self {
            Self::LowField => "lfs_mp",
            Self::HighField => "hfs_mp",
        }
    }
}

impl Display for DivertorSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::LowField => "LFS",
            Self::HighField => "HFS",
        })
    }
}

/// Parallel heat flux per point together with the masks it was built from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FluxField {
    /// MW/m^2
    pub q: Vec<f64>,
    pub good: Vec<bool>,
    pub pfr: Vec<bool>,
    pub scale: f64,
}

impl FluxField {
    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    pub fn peak(&self) -> f64 {
        self.q.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverState {
    Unconfigured,
    Configured,
    PointsLoaded,
    Launched,
    ResultLoaded,
}

impl DriverState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unconfigured => "UNCONFIGURED",
            Self::Configured => "CONFIGURED",
            Self::PointsLoaded => "POINTS_LOADED",
            Self::Launched => "LAUNCHED",
            Self::ResultLoaded => "RESULT_LOADED",
        }
    }
}

impl Display for DriverState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BoundaryBox, CadExtent, DivertorSide, Heat3dErrorCategory, PointSet, TracePoint,
        TraceResult,
    };

    #[test]
    fn cartesian_centers_convert_to_right_handed_degrees() {
        let point = TracePoint::from_cartesian([0.0, 2.0, -0.5]);
        assert!((point.r - 2.0).abs() < 1.0e-12);
        assert!((point.phi - 90.0).abs() < 1.0e-12);
        assert_eq!(point.z, -0.5);

        let behind = TracePoint::from_cartesian([-1.0, -1.0, 0.0]);
        assert!((behind.phi + 135.0).abs() < 1.0e-12);
    }

    #[test]
    fn cylindrical_point_set_rejects_ragged_arrays() {
        let points = PointSet::Cylindrical {
            r: vec![1.0, 2.0],
            phi: vec![0.0],
            z: vec![0.0, 0.0],
        };
        let error = points
            .into_trace_points()
            .expect_err("ragged arrays should fail");
        assert_eq!(error.category(), Heat3dErrorCategory::ConfigError);
        assert_eq!(error.placeholder(), "CONFIG.POINT_SHAPE");
    }

    #[test]
    fn boundary_box_is_union_of_wall_and_cad() {
        let wall = [[1.0, -1.3], [2.4, 0.0], [1.5, 1.2]];
        let cad = CadExtent {
            r_min: 0.9,
            r_max: 2.0,
            z_min: -1.0,
            z_max: 1.4,
        };
        let bbox = BoundaryBox::from_sources(&wall, &cad).expect("bbox");
        assert_eq!(bbox.r_min, 0.9);
        assert_eq!(bbox.r_max, 2.4);
        assert_eq!(bbox.z_min, -1.3);
        assert_eq!(bbox.z_max, 1.4);
        assert_eq!(bbox.launch_argument(), "0.9,2.4,-1.3,1.4");
    }

    #[test]
    fn divertor_code_maps_to_field_side() {
        assert_eq!(DivertorSide::from_code("O").unwrap(), DivertorSide::LowField);
        assert_eq!(DivertorSide::from_code("IBDH").unwrap(), DivertorSide::HighField);
        let error = DivertorSide::from_code("X").expect_err("unknown code");
        assert_eq!(error.placeholder(), "CONFIG.DIVERTOR_CODE");
    }

    #[test]
    fn invalid_mask_flags_sentinel_only() {
        let result = TraceResult::new(vec![0.1, 0.2, 0.3], vec![0.99, 10.0, 1.02]).unwrap();
        assert_eq!(result.invalid_mask(), vec![false, true, false]);
        assert_eq!(result.invalid_count(), 1);
    }
}
