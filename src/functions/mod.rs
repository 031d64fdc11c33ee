//! Functions module - callable functions and the mid-turn call loop

pub mod executor;
pub mod registry;

pub use executor::{Execution, FunctionExecutor};
pub use registry::{FnHandler, FunctionHandler, FunctionRegistry, FunctionSpec};
