pub mod error_function;
pub mod integration;
pub mod spline;
pub mod tridiagonal;

pub use error_function::{erfc, exp_erfc};
pub use integration::{simpson, SimpsonError};
pub use spline::{CubicSpline, SplineError};
pub use tridiagonal::{thomas_solve, TridiagonalError};
