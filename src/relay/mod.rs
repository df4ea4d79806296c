//! Relay core — the chat flow and the loop that drives it.

pub mod flow;
pub mod runner;

pub use flow::{Delivery, Inbound, Relay, Step};
pub use runner::{run, run_until};
