//! API endpoint handlers.

pub mod detect;
pub mod health;
