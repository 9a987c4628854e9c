//! Field-line trace orchestration and 3D parallel heat-flux models for
//! plasma-facing components.

pub mod common;
pub mod domain;
pub mod modules;
pub mod numerics;

pub use common::{
    DriverConfig, HeatFluxConfig, HeatFluxModelKind, InputEntries, PerturbationSource,
    PlasmaConfig,
};
pub use domain::{
    BoundaryBox, CadExtent, DivertorSide, DriverState, FluxField, Heat3dError,
    Heat3dErrorCategory, Heat3dResult, PointSet, TracePoint, TraceResult,
};
pub use modules::{
    CalibrationTracer, Equilibrium, FieldLineTraceDriver, HeatFluxModel, ModelEvaluation,
    ProfileEvaluator, ProfileSpec, SampledEquilibrium,
};
