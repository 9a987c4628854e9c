pub mod config;
pub mod constants;

pub use config::{
    DriverConfig, HeatFluxConfig, HeatFluxModelKind, InputEntries, PerturbationSource,
    PlasmaConfig,
};
