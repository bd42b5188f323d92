pub mod agent;
pub mod cli;
pub mod config;
pub mod demos;
pub mod error;
pub mod ledger;
pub mod output;
pub mod providers;
pub mod sandbox;
pub mod session;

pub use error::{AgentpadError, Result};
