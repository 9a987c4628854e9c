pub mod equilibrium;
pub mod heatflux;
pub mod laminar;
pub mod profile;
pub mod serialization;

mod traits;

pub use equilibrium::SampledEquilibrium;
pub use heatflux::{flux_masks, HeatFluxModel, ModelEvaluation};
pub use laminar::{load_trace_result, FieldLineTraceDriver};
pub use profile::{ProfileEvaluator, ProfileSpec};
pub use traits::{CalibrationTracer, Equilibrium};
