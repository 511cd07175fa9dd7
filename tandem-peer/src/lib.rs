mod client;
mod config;
mod controller;
mod negotiator;

pub use client::*;
pub use config::*;
pub use controller::*;
pub use negotiator::*;
