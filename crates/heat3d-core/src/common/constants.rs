//! Constants shared by the trace driver and the heat-flux models.
//!
//! File names and control-file literals are fixed by the external tracer and
//! must not change without a matching tracer update.

pub const PI: f64 = std::f64::consts::PI;
pub const PI2: f64 = 2.0 * PI;

/// psimin reported by the tracer for points it could not follow.
pub const NON_CONVERGED_PSIMIN: f64 = 10.0;

pub const MAX_TRACE_PROCESSES: usize = 20;
pub const CALIBRATION_TRACE_PROCESSES: usize = 10;

pub const POINTS_FILE_STEM: &str = "points3DHF";
pub const CALIBRATION_POINTS_STEM: &str = "points";
pub const CONTROL_FILE_STEM: &str = "_lamCTL";
pub const PERTURBATION_FILE_NAME: &str = "m3dc1sup.in";
pub const RESULT_FILE_PREFIX: &str = "lam_";
pub const DEFAULT_LAUNCHER: &str = "mpirun";
pub const DEFAULT_TRACER_EXECUTABLE: &str = "heatlaminar_mpi";
pub const TRACER_LOG_PATTERN: &str = "log*";
pub const TRACER_MASTER_LOG_MARKER: &str = "_Master.dat";
pub const TRACER_SUCCESS_MARKER: &str = "Program terminates normally";
pub const DEFAULT_PERTURBATION_FILE: &str = "./C1.h5";

/// Samples used to invert psi(R) along the midplane.
pub const MIDPLANE_MAP_SAMPLES: usize = 100;
/// Samples used to locate the reference Eich peak.
pub const PEAK_SEARCH_SAMPLES: usize = 10_000;
/// Samples of the power-balance calibration grids.
pub const CALIBRATION_SAMPLES: usize = 1_000;
/// Calibration line half-widths in units of lq (SOL side) or S (PFR side).
pub const CALIBRATION_WIDTHS: f64 = 20.0;
pub const CONDUCTIVE_PSI_RANGE: (f64, f64) = (0.85, 1.2);

/// (10^3)^3.5 / 10^6: keV^3.5 to eV^3.5 and W/m^2 to MW/m^2.
pub const CONDUCTIVE_UNIT_FACTOR: f64 = 31_622.776_601_683_793;

pub const MM_TO_M: f64 = 1.0e-3;
pub const KM_TO_M: f64 = 1.0e3;

#[cfg(test)]
mod tests {
    use super::{CONDUCTIVE_UNIT_FACTOR, NON_CONVERGED_PSIMIN, PI, PI2};

    #[test]
    fn constants_match_expected_relationships() {
        assert!((PI2 - 2.0 * PI).abs() <= 1.0e-15);
        assert_eq!(NON_CONVERGED_PSIMIN, 10.0);
        let expected = 1.0e3_f64.powf(3.5) / 1.0e6;
        assert!((CONDUCTIVE_UNIT_FACTOR - expected).abs() <= 1.0e-9 * expected);
    }
}
