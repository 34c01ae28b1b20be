//! Utility modules: bounded retry, cancellable deadlines.

pub mod deadline;
pub mod retry;
