//! Epidemic membership protocol: every tick, exchange peer views with a few
//! random targets and record who answered.

pub mod cycle;
pub mod diff;
pub mod errors;
pub mod health;
pub mod round;
pub mod service;
pub mod traits;
