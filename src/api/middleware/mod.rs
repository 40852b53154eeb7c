//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Audit logger, wraps every route
//! 2. Origin guard, detect route only

pub mod audit;
pub mod origin;
