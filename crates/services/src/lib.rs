pub mod analyst;
pub mod generator;
pub mod ledger;
pub mod metrics;
pub mod resolver;
pub mod scheduler;

pub use analyst::*;
pub use generator::*;
pub use ledger::*;
pub use metrics::*;
pub use resolver::*;
pub use scheduler::*;
