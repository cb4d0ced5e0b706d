pub mod callgraph;
pub mod config;
pub mod driver;
pub mod step;

pub use callgraph::{CallGraph, FunctionInfo};
pub use config::DriverConfig;
pub use driver::{Driver, DriverReport};
