pub mod metrics;
pub mod model;
pub mod prelude;
pub mod run;

pub use prelude::*;
