pub mod runtime;
pub mod stepflow;
