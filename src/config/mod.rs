pub mod loader;
pub mod types;

pub use loader::{load_config, ResolvedCredentials};
pub use types::AgentpadConfig;
