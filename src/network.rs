//! TCP transport of the gossip protocol. Every connection carries exactly one
//! request and its answer.

pub mod listener;
pub mod message;
pub mod messenger;
