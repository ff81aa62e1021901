// Concrete capabilities consumed by the step interpreter

pub mod condition;
pub mod orchestrator;
pub mod transforms;

#[cfg(feature = "database")]
pub mod audit;

pub use condition::*;
pub use orchestrator::*;
pub use transforms::*;

#[cfg(feature = "database")]
pub use audit::*;
