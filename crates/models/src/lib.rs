pub mod fixtures;
pub mod predictions;
pub mod estimate;
pub mod accuracy;
pub mod error;

pub use fixtures::*;
pub use predictions::*;
pub use estimate::*;
pub use accuracy::*;
pub use error::*;
