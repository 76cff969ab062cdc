pub mod poisson;

pub use poisson::*;
