pub mod bindings;
pub mod config;
pub mod error;
pub mod processing;
pub mod selection;
pub mod store;
pub mod utils;
pub mod visualization;

pub use error::{Result, RippleError};

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn ripple_lfp(m: &Bound<'_, PyModule>) -> PyResult<()> {
    bindings::python::register(m)
}
