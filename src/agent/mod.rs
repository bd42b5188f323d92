pub mod prompt;
pub mod runtime;
pub mod tools;

pub use runtime::AgentHost;
